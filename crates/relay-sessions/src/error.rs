use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The provided session key string is malformed.
    ///
    /// Expected format: `agent:{agentId}:{channelType}:{channelId}:{chatId}`
    #[error("invalid session key: {0}")]
    InvalidKey(String),

    /// The on-disk session file exists but could not be parsed (partial or
    /// garbage line). Per §4.A, this fails the entire load — no silent
    /// truncation of history.
    #[error("corrupt session file {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
