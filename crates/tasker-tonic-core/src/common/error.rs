//! Error type for the task service.
//!
//! Wraps the record protocol's [`tasker::Error`] and adds the failure cases
//! that only exist at the transport boundary. `From<Error>` for
//! `tonic::Status` picks the status code; internal failures reach clients
//! with a generic message only.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the task service.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The record protocol rejected or failed the request.
    #[error(transparent)]
    Task(#[from] tasker::Error),

    /// The wire message could not be translated into a request.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Task(err) => match err {
                tasker::Error::RequiredField { .. } | tasker::Error::InvalidValue { .. } => {
                    Status::invalid_argument(err.to_string())
                }
                tasker::Error::NotFound { .. } => Status::not_found(err.to_string()),
                tasker::Error::Overflow(_) => {
                    Status::resource_exhausted("id capacity exhausted, retry shortly")
                }
                tasker::Error::Internal { message } => Status::internal(message),
                // future variants are reported without detail
                _ => Status::internal(tasker::TRY_AGAIN),
            },
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}
