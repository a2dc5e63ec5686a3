//! Failure taxonomy for engine operations.
//!
//! Every fallible path maps into one of four classes: transient transport
//! failures (retried on explicit user action), authentication expiry
//! (handled uniformly as a forced logout), validation failures (rejected
//! before any network call), and missing referenced entities (resolved by
//! dropping the selection, never by surfacing a crash).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Network-level failure. Recoverable; the failing resource keeps its
    /// last known data and the fetch is retried on the next user action.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend rejected the session (401). The host must log out,
    /// regardless of which operation tripped it.
    #[error("authentication expired")]
    Auth,

    /// Input rejected before any network call was made.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced mailbox/thread/message/task no longer exists.
    #[error("not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
