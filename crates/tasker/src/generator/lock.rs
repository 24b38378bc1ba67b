use parking_lot::Mutex;
use tracing::instrument;

use crate::{
    TaskId,
    generator::{IdGenerator, Result, atomic::successor, check_node, check_timestamp},
    time::TimeSource,
};

/// A lock-based [`TaskId`] generator suitable for multi-threaded
/// environments.
///
/// The last issued id is kept behind a [`Mutex`]; the read of the previous id
/// and the write of its successor form one critical section.
///
/// ## Features
/// - ✅ Thread-safe
/// - ✅ Fair access under contention
///
/// ## Recommended When
/// - Fair access across threads is important
/// - Your target doesn't support 64-bit atomics
///
/// ## See Also
/// - [`AtomicTaskIdGenerator`]
///
/// [`AtomicTaskIdGenerator`]: crate::generator::AtomicTaskIdGenerator
pub struct LockTaskIdGenerator<T>
where
    T: TimeSource,
{
    #[cfg(feature = "cache-padded")]
    state: crossbeam_utils::CachePadded<Mutex<TaskId>>,
    #[cfg(not(feature = "cache-padded"))]
    state: Mutex<TaskId>,
    node: u64,
    time: T,
}

impl<T> LockTaskIdGenerator<T>
where
    T: TimeSource,
{
    /// Creates a new generator for `node`, reading time from `time`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNode`] if `node` does not fit in 8 bits.
    ///
    /// [`Error::InvalidNode`]: crate::generator::Error::InvalidNode
    pub fn try_new(node: u64, time: T) -> Result<Self> {
        Self::from_components(0, node, 0, time)
    }

    /// Creates a generator preloaded with an explicit last-issued state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNode`] if `node` does not fit in 8 bits.
    ///
    /// [`Error::InvalidNode`]: crate::generator::Error::InvalidNode
    pub fn from_components(timestamp: u64, node: u64, sequence: u64, time: T) -> Result<Self> {
        check_node(node)?;
        let id = TaskId::from_components(timestamp, node, sequence);
        Ok(Self {
            #[cfg(feature = "cache-padded")]
            state: crossbeam_utils::CachePadded::new(Mutex::new(id)),
            #[cfg(not(feature = "cache-padded"))]
            state: Mutex::new(id),
            node,
            time,
        })
    }

    /// Generates the next id.
    ///
    /// # Errors
    ///
    /// See [`IdGenerator::try_next_id`].
    #[instrument(level = "trace", skip(self), fields(node = self.node))]
    pub fn try_next_id(&self) -> Result<TaskId> {
        let now = self.time.current_millis();
        check_timestamp(now)?;

        let mut id = self.state.lock();
        let next = successor(*id, now)?;
        *id = next;
        Ok(next)
    }
}

impl<T> IdGenerator for LockTaskIdGenerator<T>
where
    T: TimeSource + Send + Sync,
{
    fn node(&self) -> u64 {
        self.node
    }

    fn try_next_id(&self) -> Result<TaskId> {
        self.try_next_id()
    }
}
