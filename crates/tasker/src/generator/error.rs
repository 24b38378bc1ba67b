use crate::TaskId;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that a [`TaskId`] generator can emit.
#[derive(Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The configured node number does not fit the 8-bit node field.
    #[error("invalid node {node}; must be 0 <= node <= {}", TaskId::NODE_MASK)]
    InvalidNode { node: u64 },

    /// The clock has run past the 41-bit timestamp field.
    #[error("timestamp overflow: {millis}ms since epoch exceeds {}", TaskId::TIMESTAMP_MASK)]
    TimestampOverflow { millis: u64 },

    /// More than 16384 ids were requested within one millisecond.
    ///
    /// Retrying on the next millisecond tick normally succeeds.
    #[error("sequence overflow at timestamp {timestamp}")]
    SequenceOverflow { timestamp: u64 },
}

impl Error {
    /// Returns true for both capacity errors (timestamp or sequence).
    pub const fn is_overflow(&self) -> bool {
        matches!(
            self,
            Self::TimestampOverflow { .. } | Self::SequenceOverflow { .. }
        )
    }
}
