use thiserror::Error;

/// Failure model (§4.F): provider errors, nil responses, tool-execution
/// errors, and marshal errors are all non-fatal *within a turn* — they are
/// folded into the fallback cascade or a canned response, never propagated
/// as an `AgentError`. Only the handful of situations below abort a turn
/// outright.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("no configuration found for agent {0:?}")]
    UnknownAgent(String),

    #[error("session error: {0}")]
    Session(#[from] relay_sessions::SessionError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;
