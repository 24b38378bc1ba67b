//! gRPC service implementation.
//!
//! ## Structure
//!
//! - [`handler`] - gRPC service entry point (`TaskHandler`) and the
//!   translation between wire messages and task requests.

pub mod handler;
