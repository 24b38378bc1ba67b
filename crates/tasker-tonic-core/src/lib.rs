//! # tasker-tonic-core
//!
//! Shared pieces of the tasker gRPC service: the generated protocol bindings
//! under [`proto`], the transport [`Error`] with its `tonic::Status` mapping,
//! and the canonical type aliases the server is built from.

mod common;
pub use common::*;

/// Generated `tasker.v1` messages, client and server.
pub mod proto {
    tonic::include_proto!("tasker.v1");

    /// Encoded file descriptor set for gRPC reflection.
    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("tasker_descriptor");
}

// Public re-export so downstream crates can access `tasker` via
// `tasker_tonic_core::tasker`
pub use tasker;
