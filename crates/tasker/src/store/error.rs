use crate::Script;

/// Errors reported by a [`Store`](crate::Store).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or refused the command.
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },

    /// A script ran and raised an error after undoing its own writes. The
    /// store is as it was before the call.
    #[error("script {} failed: {reason}", script.id())]
    ScriptFailed { script: Script, reason: String },

    /// A script stopped after `step` without undoing it. The structures the
    /// script touches may disagree until the caller repairs them.
    #[error("script {} aborted after {step}: {reason}", script.id())]
    Aborted {
        script: Script,
        step: &'static str,
        reason: String,
    },

    /// A script was called with the wrong number or shape of keys/args.
    #[error("invalid arguments for script {}: {reason}", script.id())]
    InvalidArguments { script: Script, reason: String },
}

impl StoreError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}
