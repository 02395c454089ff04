use async_trait::async_trait;

use crate::{Tool, ToolResult};

const MAX_OUTPUT_CHARS: usize = 30_000;

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Optionally limit to a line range with \
         `offset` (1-based first line) and `limit` (number of lines to return)."
    }

    fn parameter_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Absolute or relative path to the file."},
                "offset": {"type": "integer", "description": "1-based line to start reading from."},
                "limit": {"type": "integer", "description": "Maximum number of lines to return."}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let path = match input.get("path").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return ToolResult::error("missing required parameter: path"),
        };

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("failed to read '{path}': {e}")),
        };

        let offset = input
            .get("offset")
            .and_then(|v| v.as_u64())
            .map(|v| v.saturating_sub(1) as usize);
        let limit = input.get("limit").and_then(|v| v.as_u64()).map(|v| v as usize);

        let result = if offset.is_some() || limit.is_some() {
            let start = offset.unwrap_or(0);
            let lines: Vec<&str> = content.lines().skip(start).collect();
            let lines = if let Some(n) = limit { &lines[..n.min(lines.len())] } else { &lines[..] };
            lines.join("\n")
        } else {
            content
        };

        let result = if result.len() > MAX_OUTPUT_CHARS {
            format!("{}\n\n[output truncated at {} characters]", &result[..MAX_OUTPUT_CHARS], MAX_OUTPUT_CHARS)
        } else {
            result
        };

        ToolResult::success(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "line1\nline2\nline3").unwrap();

        let tool = ReadFileTool;
        let result = tool
            .execute(serde_json::json!({"path": path.to_str().unwrap()}))
            .await;
        assert!(!result.is_error);
        assert_eq!(result.content, "line1\nline2\nline3");
    }

    #[tokio::test]
    async fn missing_path_errors() {
        let tool = ReadFileTool;
        let result = tool.execute(serde_json::json!({})).await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn offset_and_limit_slice_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "a\nb\nc\nd").unwrap();

        let tool = ReadFileTool;
        let result = tool
            .execute(serde_json::json!({"path": path.to_str().unwrap(), "offset": 2, "limit": 2}))
            .await;
        assert_eq!(result.content, "b\nc");
    }
}
