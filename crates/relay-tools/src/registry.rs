use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::instrument;

use crate::error::{Result, ToolError};
use crate::{Tool, ToolDefinition, ToolResult};

/// Concurrent-safe `name -> Tool` registry (§4.C, §9 "shared mutable
/// registries": reader-biased lock, snapshots for `List`).
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, tool: Arc<dyn Tool>) -> Result<()> {
        let mut tools = self.tools.write().await;
        let name = tool.name().to_string();
        if tools.contains_key(&name) {
            return Err(ToolError::DuplicateName(name));
        }
        tools.insert(name, tool);
        Ok(())
    }

    pub async fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    /// Snapshot of all registered tools.
    pub async fn list(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.read().await.values().cloned().collect()
    }

    /// Schemas for the LLM tool catalogue.
    pub async fn list_schemas(&self) -> Vec<ToolDefinition> {
        self.tools.read().await.values().map(|t| t.definition()).collect()
    }

    /// Human-readable `(name, description)` pairs for the agent's system
    /// prompt's "built-in skill descriptions" section.
    pub async fn describe_all(&self) -> Vec<(String, String)> {
        self.tools
            .read()
            .await
            .values()
            .map(|t| (t.name().to_string(), t.description().to_string()))
            .collect()
    }

    #[instrument(skip(self))]
    pub async fn execute(&self, name: &str, arguments: serde_json::Value) -> ToolResult {
        match self.lookup(name).await {
            Some(tool) => tool.execute(arguments).await,
            None => ToolResult::error(format!("unknown tool: {name}")),
        }
    }

    /// Executes from a parsed tool call: a name plus JSON-encoded arguments.
    /// Empty arguments string is treated as an empty object (§4.C).
    pub async fn execute_from_call(&self, name: &str, raw_arguments: &str) -> ToolResult {
        let arguments: serde_json::Value = if raw_arguments.trim().is_empty() {
            serde_json::json!({})
        } else {
            match serde_json::from_str(raw_arguments) {
                Ok(v) => v,
                Err(e) => return ToolResult::error(format!("invalid tool arguments: {e}")),
            }
        };
        self.execute(name, arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn parameter_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, arguments: serde_json::Value) -> ToolResult {
            ToolResult::success(arguments.to_string())
        }
    }

    #[tokio::test]
    async fn register_then_lookup_succeeds() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).await.unwrap();
        assert!(registry.lookup("echo").await.is_some());
    }

    #[tokio::test]
    async fn duplicate_registration_errors() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).await.unwrap();
        let err = registry.register(Arc::new(EchoTool)).await.unwrap_err();
        assert!(matches!(err, ToolError::DuplicateName(_)));
    }

    #[tokio::test]
    async fn execute_unknown_tool_returns_error_result() {
        let registry = ToolRegistry::new();
        let result = registry.execute("nope", serde_json::json!({})).await;
        assert!(result.is_error);
        assert!(result.content.contains("unknown tool"));
    }

    #[tokio::test]
    async fn execute_from_call_treats_empty_args_as_empty_object() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).await.unwrap();
        let result = registry.execute_from_call("echo", "").await;
        assert_eq!(result.content, "{}");
    }
}
