//! Runtime error taxonomy.
//!
//! Three conditions cover everything the core can fail with:
//! - [`Error::InvalidHookCall`] - a hook primitive used outside an active
//!   component frame, or a call order that diverges from the previous render.
//! - [`Error::InvalidKey`] - a weak-set store mutation with a non-object value.
//! - [`Error::CommitFailure`] - the host backend rejected a patch mid-batch;
//!   the error names the VNode path so the caller can retry from that subtree.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Hook primitive invoked with no active component execution, or at a
    /// cursor position whose slot was allocated by a different primitive.
    #[error("invalid hook call: {reason}")]
    InvalidHookCall { reason: String },

    /// Weak-set stores hold object references only.
    #[error("invalid key: weak sets may only hold object values")]
    InvalidKey,

    /// A patch failed to apply during commit. Patches already applied in the
    /// batch stay applied; the remainder of the batch was abandoned.
    #[error("commit failed at `{path}`: {reason}")]
    CommitFailure { path: String, reason: String },
}

impl Error {
    pub(crate) fn invalid_hook_call(reason: impl Into<String>) -> Self {
        Error::InvalidHookCall {
            reason: reason.into(),
        }
    }

    /// The structural path carried by a `CommitFailure`, if any.
    pub fn commit_path(&self) -> Option<&str> {
        match self {
            Error::CommitFailure { path, .. } => Some(path),
            _ => None,
        }
    }
}
