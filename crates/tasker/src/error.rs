use crate::generator;

/// A result type defaulting to the task [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Caller-facing failure text for store and rollback failures.
pub const TRY_AGAIN: &str = "please try again later";

/// All errors the record store protocol surfaces to callers.
///
/// Validation variants are produced before any store access. Store and
/// serialization failures are logged where they happen and reach the caller
/// only as [`Error::Internal`] with a generic message.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A mandatory input was missing or blank.
    #[error("{field} is required")]
    RequiredField { field: &'static str },

    /// An input failed domain validation.
    #[error("invalid value {value:?} for {field}")]
    InvalidValue { field: &'static str, value: String },

    /// The referenced task has no record.
    #[error("task {id} not found")]
    NotFound { id: String },

    /// Store failure, serialization failure, id collision, or rollback.
    #[error("internal error: {message}")]
    Internal { message: &'static str },

    /// The identifier generator ran out of timestamp or sequence capacity.
    #[error(transparent)]
    Overflow(generator::Error),
}

impl Error {
    pub(crate) fn internal(message: &'static str) -> Self {
        Self::Internal { message }
    }

    pub(crate) fn invalid(field: &'static str, value: impl ToString) -> Self {
        Self::InvalidValue {
            field,
            value: value.to_string(),
        }
    }
}

impl From<generator::Error> for Error {
    /// Overflows keep their own kind; a misconfigured node can only surface
    /// here as an internal failure.
    fn from(err: generator::Error) -> Self {
        if err.is_overflow() {
            Self::Overflow(err)
        } else {
            Self::internal(TRY_AGAIN)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_keeps_its_kind() {
        let err = Error::from(generator::Error::SequenceOverflow { timestamp: 9 });
        assert!(matches!(err, Error::Overflow(_)));
        assert_eq!(err.to_string(), "sequence overflow at timestamp 9");
    }

    #[test]
    fn invalid_node_is_internal() {
        let err = Error::from(generator::Error::InvalidNode { node: 300 });
        assert_eq!(err, Error::internal(TRY_AGAIN));
    }
}
