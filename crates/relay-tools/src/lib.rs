//! Tool Registry (§4.C): name -> Tool, argument dispatch, JSON-encoded result.

pub mod builtin;
pub mod error;
pub mod registry;
pub mod safety;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::ToolError;
pub use registry::ToolRegistry;

/// Result of executing a tool. Serialised to JSON before being fed back to
/// the LLM (§3 Tool).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            is_error: true,
        }
    }
}

/// A single tool definition in the shape providers expect (§4.E `options`
/// carries the tool catalogue built from these).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameter_schema: serde_json::Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameter_schema(&self) -> serde_json::Value;
    async fn execute(&self, arguments: serde_json::Value) -> ToolResult;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameter_schema: self.parameter_schema(),
        }
    }
}
