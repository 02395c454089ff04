use async_trait::async_trait;

use crate::{Tool, ToolResult};

/// Maximum entries returned to avoid overwhelming the context window.
const MAX_ENTRIES: usize = 1_000;

pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List the contents of a directory. Each entry shows its type (file/dir) \
         and size in bytes. Returns at most 1000 entries."
    }

    fn parameter_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Absolute or relative path to the directory."}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let path = match input.get("path").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return ToolResult::error("missing required parameter: path"),
        };

        let mut read_dir = match tokio::fs::read_dir(&path).await {
            Ok(rd) => rd,
            Err(e) => return ToolResult::error(format!("failed to list '{path}': {e}")),
        };

        let mut entries: Vec<String> = Vec::new();
        let mut truncated = false;

        loop {
            if entries.len() >= MAX_ENTRIES {
                truncated = true;
                break;
            }

            let entry = match read_dir.next_entry().await {
                Ok(Some(e)) => e,
                Ok(None) => break,
                Err(_) => continue,
            };

            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(_) => continue,
            };

            let name = entry.file_name().to_string_lossy().to_string();
            let kind = if metadata.is_dir() { "dir" } else { "file" };
            let size = metadata.len();

            entries.push(format!("[{kind}] {name} ({size} bytes)"));
        }

        entries.sort();

        let mut output = entries.join("\n");
        if truncated {
            output.push_str(&format!("\n\n[truncated at {MAX_ENTRIES} entries]"));
        }

        ToolResult::success(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_directory_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let tool = ListFilesTool;
        let result = tool
            .execute(serde_json::json!({"path": dir.path().to_str().unwrap()}))
            .await;
        assert!(!result.is_error);
        assert!(result.content.contains("[file] a.txt"));
        assert!(result.content.contains("[dir] sub"));
    }

    #[tokio::test]
    async fn missing_directory_errors() {
        let tool = ListFilesTool;
        let result = tool
            .execute(serde_json::json!({"path": "/no/such/dir/hopefully"}))
            .await;
        assert!(result.is_error);
    }
}
