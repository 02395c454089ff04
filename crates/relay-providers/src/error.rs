//! Error types for the Provider Registry.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid model spec '{0}': expected 'providerId:modelName'")]
    InvalidModelSpec(String),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("provider already registered: {0}")]
    DuplicateName(String),

    #[error("provider response could not be parsed: {0}")]
    Parse(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ProviderError>;
