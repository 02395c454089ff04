//! `Provider` trait — a single `Generate` capability (§4.E).

use async_trait::async_trait;
use relay_sessions::ChatMessage;
use relay_tools::ToolDefinition;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One tool call requested by the model, as carried in
/// [`relay_sessions::ChatMessage::tool_calls`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Tool-choice policy passed alongside the tool catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolChoice {
    /// The model may call zero or more tools (the permissive policy used by
    /// the reason-act loop).
    Auto,
    /// The model must not call any tool — used by the no-tools summary call.
    None,
}

/// Per-call generation options.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerateOptions {
    pub fn with_tools(tools: Vec<ToolDefinition>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            tools,
            tool_choice: ToolChoice::Auto,
            max_tokens,
            temperature,
        }
    }

    pub fn no_tools(max_tokens: u32, temperature: f32) -> Self {
        Self {
            tools: Vec::new(),
            tool_choice: ToolChoice::None,
            max_tokens,
            temperature,
        }
    }
}

/// A single LLM backend. `model_name` is the provider-local model
/// identifier (the right-hand side of a [`crate::ModelSpec`]).
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        model_name: &str,
        messages: &[ChatMessage],
        options: &GenerateOptions,
    ) -> Result<ChatMessage>;
}
