use std::{sync::Arc, time::Duration};

use crate::{
    TaskId,
    generator::{Error, Result},
};

/// A minimal interface for generating [`TaskId`]s.
pub trait IdGenerator: Send + Sync {
    /// The node number encoded into every id.
    fn node(&self) -> u64;

    /// Generates the next id.
    ///
    /// Never blocks. Ids returned by one generator are strictly increasing in
    /// call order.
    ///
    /// # Errors
    ///
    /// - [`Error::TimestampOverflow`] once the clock has passed the 41-bit
    ///   timestamp capacity.
    /// - [`Error::SequenceOverflow`] when the 14-bit sequence is exhausted for
    ///   the current millisecond.
    fn try_next_id(&self) -> Result<TaskId>;
}

impl<G: IdGenerator + ?Sized> IdGenerator for Arc<G> {
    fn node(&self) -> u64 {
        (**self).node()
    }

    fn try_next_id(&self) -> Result<TaskId> {
        (**self).try_next_id()
    }
}

/// Generates an id, calling the generator at most `attempts` times (at
/// least once).
///
/// After a [`Error::SequenceOverflow`] the caller sleeps for one millisecond,
/// so the next attempt runs in a fresh millisecond with the sequence reset.
/// Any other error is returned immediately. Requires a Tokio runtime with
/// the time driver enabled.
///
/// # Errors
///
/// Returns the last error once the attempts are exhausted.
pub async fn generate_with_retry<G>(generator: &G, attempts: usize) -> Result<TaskId>
where
    G: IdGenerator + ?Sized,
{
    let mut remaining = attempts.max(1);
    loop {
        remaining -= 1;
        match generator.try_next_id() {
            Err(err @ Error::SequenceOverflow { .. }) if remaining > 0 => {
                tracing::debug!(%err, remaining, "retrying id generation");
                tokio::time::sleep(TICK).await;
            }
            other => return other,
        }
    }
}

/// Resolution of the timestamp field.
const TICK: Duration = Duration::from_millis(1);

pub(crate) fn check_node(node: u64) -> Result<()> {
    if node > TaskId::NODE_MASK {
        return Err(Error::InvalidNode { node });
    }
    Ok(())
}

pub(crate) fn check_timestamp(now: u64) -> Result<()> {
    if now > TaskId::TIMESTAMP_MASK {
        return Err(cold_timestamp_overflow(now));
    }
    Ok(())
}

#[cold]
#[inline(never)]
fn cold_timestamp_overflow(millis: u64) -> Error {
    Error::TimestampOverflow { millis }
}
