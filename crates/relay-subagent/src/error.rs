//! Error types for the sub-agent session manager.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubAgentError {
    /// `create` was called while the manager already holds `maxSessions`.
    #[error("sub-agent session limit reached ({0} sessions)")]
    LimitReached(usize),

    /// The requested session id does not exist in the manager.
    #[error("sub-agent session not found: {0}")]
    SessionNotFound(String),

    /// The backend process could not be spawned.
    #[error("failed to spawn backend '{backend}': {reason}")]
    SpawnFailed { backend: String, reason: String },

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Command was rejected by the safety checker.
    #[error("command blocked: {reason}")]
    CommandBlocked { reason: String },
}

pub type Result<T> = std::result::Result<T, SubAgentError>;
