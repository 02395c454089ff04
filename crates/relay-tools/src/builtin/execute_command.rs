use std::time::Duration;

use async_trait::async_trait;

use crate::{safety, Tool, ToolResult};

/// Default timeout for one-shot command execution, matching the gateway's
/// request timeout order of magnitude.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One-shot shell command tool, safety-checked against [`safety::check_command`].
///
/// This is distinct from the sub-agent session manager: that component
/// supervises long-lived interactive CLI processes, while this tool runs a
/// single command to completion and returns its output.
pub struct ExecuteCommandTool;

#[async_trait]
impl Tool for ExecuteCommandTool {
    fn name(&self) -> &str {
        "execute_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its stdout and stderr. \
         Commands are safety-checked (dangerous commands like rm -rf, sudo, etc. \
         are blocked). Default timeout is 30 seconds."
    }

    fn parameter_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "The shell command to execute via sh -c."}
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let command = match input.get("command").and_then(|v| v.as_str()) {
            Some(c) => c,
            None => return ToolResult::error("missing required parameter: command"),
        };

        if let Err(reason) = safety::check_command(command) {
            return ToolResult::error(format!("command blocked: {reason}"));
        }

        let run = async {
            tokio::process::Command::new("sh")
                .arg("-c")
                .arg(command)
                .output()
                .await
        };

        let output = match tokio::time::timeout(DEFAULT_TIMEOUT, run).await {
            Ok(Ok(out)) => out,
            Ok(Err(e)) => return ToolResult::error(format!("failed to spawn command: {e}")),
            Err(_) => return ToolResult::error(format!("command timed out after {:?}", DEFAULT_TIMEOUT)),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut result = String::new();
        if !stdout.is_empty() {
            result.push_str(&stdout);
        }
        if !stderr.is_empty() {
            if !result.is_empty() {
                result.push('\n');
            }
            result.push_str("[stderr]\n");
            result.push_str(&stderr);
        }
        if !output.status.success() {
            result.push_str(&format!("\n[exit code: {}]", output.status.code().unwrap_or(-1)));
        }
        if result.is_empty() {
            result = "(no output)".to_string();
        }

        ToolResult::success(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_allowed_command() {
        let tool = ExecuteCommandTool;
        let result = tool.execute(serde_json::json!({"command": "echo hello"})).await;
        assert!(!result.is_error);
        assert!(result.content.contains("hello"));
    }

    #[tokio::test]
    async fn blocks_denylisted_command() {
        let tool = ExecuteCommandTool;
        let result = tool
            .execute(serde_json::json!({"command": "rm -rf /"}))
            .await;
        assert!(result.is_error);
        assert!(result.content.contains("blocked"));
    }

    #[tokio::test]
    async fn missing_command_errors() {
        let tool = ExecuteCommandTool;
        let result = tool.execute(serde_json::json!({})).await;
        assert!(result.is_error);
    }
}
