use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool already registered: {0}")]
    DuplicateName(String),

    #[error("unknown tool: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, ToolError>;
