use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookError {
    /// The hook's implementation returned an unrecoverable failure; the
    /// dispatcher treats this the same as an explicit block, fail-closed.
    #[error("security hook failed: {0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, HookError>;
