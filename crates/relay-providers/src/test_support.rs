//! A scripted in-memory [`Provider`] for exercising the Agent Core's
//! reason-act loop and fallback cascade without a real LLM backend
//! (scenarios S1-S4).

use std::sync::Mutex;

use async_trait::async_trait;
use relay_sessions::ChatMessage;

use crate::error::{ProviderError, Result};
use crate::provider::{GenerateOptions, ToolCallRequest};
use crate::Provider;

/// One scripted response to return from successive `generate` calls.
pub enum Step {
    /// Return a final assistant message with no tool calls.
    Text(String),
    /// Return an assistant message requesting exactly these tool calls.
    ToolCalls(Vec<ToolCallRequest>),
    /// Return an error, simulating a provider failure.
    Error(String),
}

/// Replays a fixed sequence of [`Step`]s, one per `generate` call. Once the
/// script is exhausted, every further call returns `ProviderError::Unavailable`.
pub struct ScriptedProvider {
    name: String,
    steps: Mutex<std::collections::VecDeque<Step>>,
}

impl ScriptedProvider {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps: Mutex::new(steps.into()),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        _model_name: &str,
        _messages: &[ChatMessage],
        _options: &GenerateOptions,
    ) -> Result<ChatMessage> {
        let next = self.steps.lock().unwrap().pop_front();
        match next {
            Some(Step::Text(content)) => Ok(ChatMessage::assistant(content)),
            Some(Step::ToolCalls(calls)) => {
                let value = serde_json::to_value(calls).map_err(|e| ProviderError::Parse(e.to_string()))?;
                Ok(ChatMessage::assistant_with_tool_calls("", value))
            }
            Some(Step::Error(message)) => Err(ProviderError::Unavailable(message)),
            None => Err(ProviderError::Unavailable("script exhausted".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_steps_in_order() {
        let provider = ScriptedProvider::new(
            "test",
            vec![
                Step::ToolCalls(vec![ToolCallRequest {
                    id: "call-1".into(),
                    name: "read_file".into(),
                    arguments: serde_json::json!({"path": "README.md"}),
                }]),
                Step::Text("done".into()),
            ],
        );

        let opts = GenerateOptions::with_tools(vec![], 1024, 0.7);
        let first = provider.generate("any-model", &[], &opts).await.unwrap();
        assert!(first.tool_calls.is_some());

        let second = provider.generate("any-model", &[], &opts).await.unwrap();
        assert_eq!(second.content, "done");
    }

    #[tokio::test]
    async fn exhausted_script_errors() {
        let provider = ScriptedProvider::new("test", vec![]);
        let opts = GenerateOptions::no_tools(1024, 0.7);
        let result = provider.generate("any-model", &[], &opts).await;
        assert!(matches!(result, Err(ProviderError::Unavailable(_))));
    }
}
