use core::{fmt, num::ParseIntError, str::FromStr};

use serde::{Deserialize, Serialize};

/// A 64-bit Snowflake-style task identifier.
///
/// - 1 bit reserved
/// - 41 bits timestamp (ms since [`TASKER_EPOCH`])
/// - 8 bits node number
/// - 14 bits sequence
///
/// ```text
///  Bit Index:  63           63 62            22 21          14 13             0
///              +--------------+----------------+--------------+---------------+
///  Field:      | reserved (1) | timestamp (41) | node (8)     | sequence (14) |
///              +--------------+----------------+--------------+---------------+
///              |<----------- MSB ---------- 64 bits ----------- LSB --------->|
/// ```
///
/// Ids compare exactly like their raw integer, so ids minted by one node sort in
/// generation order.
///
/// ```
/// use tasker::TaskId;
///
/// let id = TaskId::from_components(1000, 2, 1);
/// assert_eq!(id.timestamp(), 1000);
/// assert_eq!(id.node(), 2);
/// assert_eq!(id.sequence(), 1);
/// assert_eq!(id.to_string(), ((1000u64 << 22) | (2 << 14) | 1).to_string());
/// ```
///
/// [`TASKER_EPOCH`]: crate::TASKER_EPOCH
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId {
    id: u64,
}

impl TaskId {
    /// Bitmask for extracting the 41-bit timestamp field. Occupies bits 22
    /// through 62.
    pub const TIMESTAMP_MASK: u64 = (1 << 41) - 1;

    /// Bitmask for extracting the 8-bit node field. Occupies bits 14 through
    /// 21.
    pub const NODE_MASK: u64 = (1 << 8) - 1;

    /// Bitmask for extracting the 14-bit sequence field. Occupies bits 0
    /// through 13.
    pub const SEQUENCE_MASK: u64 = (1 << 14) - 1;

    /// Number of bits to shift the timestamp to its correct position (bit 22).
    pub const TIMESTAMP_SHIFT: u64 = 22;

    /// Number of bits to shift the node to its correct position (bit 14).
    pub const NODE_SHIFT: u64 = 14;

    /// Number of bits to shift the sequence field (bit 0).
    pub const SEQUENCE_SHIFT: u64 = 0;

    /// Packs the three fields into an id. Out-of-range inputs are masked.
    pub const fn from_components(timestamp: u64, node: u64, sequence: u64) -> Self {
        let timestamp = (timestamp & Self::TIMESTAMP_MASK) << Self::TIMESTAMP_SHIFT;
        let node = (node & Self::NODE_MASK) << Self::NODE_SHIFT;
        let sequence = (sequence & Self::SEQUENCE_MASK) << Self::SEQUENCE_SHIFT;
        Self {
            id: timestamp | node | sequence,
        }
    }

    /// Extracts the timestamp from the packed ID.
    pub const fn timestamp(&self) -> u64 {
        (self.id >> Self::TIMESTAMP_SHIFT) & Self::TIMESTAMP_MASK
    }

    /// Extracts the node number from the packed ID.
    pub const fn node(&self) -> u64 {
        (self.id >> Self::NODE_SHIFT) & Self::NODE_MASK
    }

    /// Extracts the sequence number from the packed ID.
    pub const fn sequence(&self) -> u64 {
        (self.id >> Self::SEQUENCE_SHIFT) & Self::SEQUENCE_MASK
    }

    pub const fn to_raw(&self) -> u64 {
        self.id
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self { id: raw }
    }

    /// Returns true if the current sequence value can be incremented.
    pub const fn has_sequence_room(&self) -> bool {
        self.sequence() < Self::SEQUENCE_MASK
    }

    /// Returns a new ID with the sequence incremented.
    pub const fn increment_sequence(&self) -> Self {
        Self::from_components(self.timestamp(), self.node(), self.sequence() + 1)
    }

    /// Returns a new ID for a newer timestamp with sequence reset to zero.
    pub const fn rollover_to_timestamp(&self, ts: u64) -> Self {
        Self::from_components(ts, self.node(), 0)
    }

    /// The sorted-set score of this id.
    ///
    /// Precision is lost above 2^53; the index relies on member ordering, not
    /// on the score.
    pub fn as_f64(&self) -> f64 {
        self.id as f64
    }

    /// Returns the ID as a zero-padded 20-digit string.
    pub fn to_padded_string(&self) -> String {
        format!("{:020}", self.id)
    }
}

impl From<TaskId> for u64 {
    fn from(id: TaskId) -> Self {
        id.id
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskId")
            .field("raw", &format_args!("0x{:016x}", self.id))
            .field("timestamp", &self.timestamp())
            .field("node", &self.node())
            .field("sequence", &self.sequence())
            .finish()
    }
}

impl FromStr for TaskId {
    type Err = ParseIntError;

    /// Parses the canonical decimal form produced by [`fmt::Display`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self::from_raw)
    }
}
