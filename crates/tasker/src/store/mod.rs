//! The store capability consumed by the record protocol.
//!
//! The protocol needs very little from its store: string keys holding bytes,
//! sorted sets that can be scanned in lexicographic member order, and a way to
//! run a multi-key [`Script`] indivisibly. Anything Redis-compatible provides
//! this surface; [`MemoryStore`] provides it in process.

use async_trait::async_trait;
use bytes::Bytes;

mod error;
mod memory;
mod script;

pub use error::*;
pub use memory::*;
pub use script::*;

/// One end of a lexicographic range scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexBound {
    /// Open towards the start or the end of the set.
    Unbounded,
    Inclusive(String),
    Exclusive(String),
}

impl LexBound {
    /// Renders the bound in `ZRANGEBYLEX` syntax.
    ///
    /// ```
    /// use tasker::LexBound;
    ///
    /// assert_eq!(LexBound::Unbounded.render(true), "-");
    /// assert_eq!(LexBound::Unbounded.render(false), "+");
    /// assert_eq!(LexBound::Exclusive("42".into()).render(true), "(42");
    /// assert_eq!(LexBound::Inclusive("42".into()).render(false), "[42");
    /// ```
    pub fn render(&self, is_start: bool) -> String {
        match self {
            Self::Unbounded if is_start => "-".to_string(),
            Self::Unbounded => "+".to_string(),
            Self::Inclusive(member) => format!("[{member}"),
            Self::Exclusive(member) => format!("({member}"),
        }
    }
}

/// A key-value and sorted-set store.
///
/// Counts follow Redis: `delete` reports the number of keys removed,
/// `sorted_set_add` the number of members newly added, and
/// `sorted_set_remove` the number of members removed.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Returns `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    async fn set(&self, key: &str, value: Bytes) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<u64, StoreError>;

    async fn sorted_set_add(&self, set: &str, score: f64, member: &str) -> Result<u64, StoreError>;

    async fn sorted_set_remove(&self, set: &str, member: &str) -> Result<u64, StoreError>;

    /// Members of `set` between `start` and `stop` in ascending
    /// lexicographic order, skipping `offset` and returning at most `count`.
    async fn range_by_lex(
        &self,
        set: &str,
        start: LexBound,
        stop: LexBound,
        offset: usize,
        count: usize,
    ) -> Result<Vec<String>, StoreError>;

    /// Runs `script` as one indivisible operation.
    ///
    /// No other caller can observe an intermediate state of the script. A
    /// script that fails has undone its own partial work unless the store
    /// itself failed mid-way.
    async fn execute_atomic(
        &self,
        script: Script,
        keys: &[String],
        args: &[Bytes],
    ) -> Result<(), StoreError>;
}
