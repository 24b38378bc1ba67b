//! Snowflake-style [`TaskId`] generators.
//!
//! Both generators keep the last issued id as their only state and derive the
//! next one from it, so uniqueness within one process never depends on the
//! caller. Uniqueness across processes relies on each process being configured
//! with a distinct node number.
//!
//! [`TaskId`]: crate::TaskId

mod atomic;
mod error;
mod interface;
mod lock;

pub use atomic::*;
pub use error::*;
pub use interface::*;
pub use lock::*;
