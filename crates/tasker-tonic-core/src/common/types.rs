//! Canonical types the service is built from.
//!
//! The id layout, clock and generator are fixed at compile time so that every
//! node of a deployment mints ids with the same epoch and bit layout.

use tasker::{AtomicTaskIdGenerator, TASKER_EPOCH, WallClock};

/// The id type minted by the service.
pub type TaskId = tasker::TaskId;

/// The clock used by the generator.
pub type Clock = WallClock;

/// The epoch subtracted from the wall clock. Defaults to [`TASKER_EPOCH`].
pub const EPOCH: core::time::Duration = TASKER_EPOCH;

/// The generator shared by all request handlers of one process.
pub type Generator = AtomicTaskIdGenerator<Clock>;

/// Page size used when neither the request nor its token names one.
pub const DEFAULT_PAGE_SIZE: usize = tasker::DEFAULT_PAGE_SIZE;

/// Builds the service generator for `node`.
///
/// # Errors
///
/// Fails when `node` does not fit the 8-bit node field.
pub fn generator(node: u64) -> tasker::generator::Result<Generator> {
    Generator::try_new(node, Clock::with_epoch(EPOCH))
}
