//! # tasker
//!
//! Task records kept in a key-value + sorted-set store.
//!
//! The crate is built from three pieces:
//!
//! - [`generator`]: lock-free and lock-based Snowflake-style generators that
//!   mint time-ordered [`TaskId`]s from a node number and a [`TimeSource`].
//! - [`TaskManager`]: the create/get/update/delete/list protocol. Creation and
//!   deletion touch both the primary entry and the ordering index through a
//!   single atomic [`Script`], so the two never disagree.
//! - [`PageTokenCodec`]: opaque, HMAC-protected continuation tokens for
//!   cursor-based listing over the index.
//!
//! The store itself is consumed through the [`Store`] capability trait.
//! [`MemoryStore`] is a process-local implementation with fault injection for
//! tests.
//!
//! ```
//! use std::sync::Arc;
//! use tasker::{
//!     AtomicTaskIdGenerator, CreateTaskRequest, MemoryStore, PageTokenCodec, Status,
//!     TaskManager, WallClock,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), tasker::Error> {
//! let generator = AtomicTaskIdGenerator::try_new(7, WallClock::default())?;
//! let manager = TaskManager::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(generator),
//!     PageTokenCodec::with_random_key(),
//! );
//!
//! let task = manager
//!     .create(CreateTaskRequest {
//!         name: "write docs".to_string(),
//!         status: Status::Todo as i32,
//!     })
//!     .await?;
//! assert_eq!(manager.get(&task.id).await?, task);
//! # Ok(())
//! # }
//! ```

mod error;
pub mod generator;
mod id;
mod store;
mod task;
mod time;
mod token;

pub use crate::error::*;
pub use crate::generator::{
    AtomicTaskIdGenerator, IdGenerator, LockTaskIdGenerator, generate_with_retry,
};
pub use crate::id::*;
pub use crate::store::*;
pub use crate::task::*;
pub use crate::time::*;
pub use crate::token::*;
