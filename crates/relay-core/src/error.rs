use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("session error: {0}")]
    Session(String),

    #[error("scheduler error: {0}")]
    Scheduler(String),

    #[error("tool error: {0}")]
    Tool(String),

    #[error("sub-agent error: {0}")]
    SubAgent(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("channel error ({channel}): {reason}")]
    Channel { channel: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Short machine-readable error code, independent of the Display message.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::Config(_) => "CONFIG_ERROR",
            RelayError::PermissionDenied { .. } => "PERMISSION_DENIED",
            RelayError::Session(_) => "SESSION_ERROR",
            RelayError::Scheduler(_) => "SCHEDULER_ERROR",
            RelayError::Tool(_) => "TOOL_ERROR",
            RelayError::SubAgent(_) => "SUBAGENT_ERROR",
            RelayError::Provider(_) => "PROVIDER_ERROR",
            RelayError::Channel { .. } => "CHANNEL_ERROR",
            RelayError::Serialization(_) => "SERIALIZATION_ERROR",
            RelayError::Io(_) => "IO_ERROR",
            RelayError::Timeout { .. } => "TIMEOUT",
            RelayError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
