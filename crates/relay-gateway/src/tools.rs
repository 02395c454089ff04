//! Exposes the Sub-agent Session Manager (§4.D) to the Agent Core as a
//! single tool with an `action` discriminator, mirroring how the built-in
//! filesystem/shell tools in `relay-tools` are each a thin wrapper over one
//! capability.

use async_trait::async_trait;
use relay_subagent::{SubAgentManager, SubSessionId};
use relay_tools::{Tool, ToolResult};

pub struct SubAgentTool {
    manager: SubAgentManager,
}

impl SubAgentTool {
    pub fn new(manager: SubAgentManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for SubAgentTool {
    fn name(&self) -> &str {
        "delegate"
    }

    fn description(&self) -> &str {
        "Delegate work to a long-running sub-agent child process. Actions: \
         `create` (backend, args, workdir), `get` (id), `list`, `destroy` (id)."
    }

    fn parameter_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {"type": "string", "enum": ["create", "get", "list", "destroy"]},
                "backend": {"type": "string"},
                "args": {"type": "array", "items": {"type": "string"}},
                "workdir": {"type": "string"},
                "id": {"type": "string"}
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> ToolResult {
        let action = match arguments.get("action").and_then(|v| v.as_str()) {
            Some(a) => a,
            None => return ToolResult::error("missing required parameter: action"),
        };

        match action {
            "create" => {
                let backend = match arguments.get("backend").and_then(|v| v.as_str()) {
                    Some(b) => b,
                    None => return ToolResult::error("missing required parameter: backend"),
                };
                let workdir = arguments.get("workdir").and_then(|v| v.as_str()).unwrap_or(".");
                let args: Vec<String> = arguments
                    .get("args")
                    .and_then(|v| v.as_array())
                    .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                    .unwrap_or_default();

                match self.manager.create(backend, &args, workdir) {
                    Ok(id) => ToolResult::success(id.to_string()),
                    Err(e) => ToolResult::error(e.to_string()),
                }
            }
            "get" => {
                let Some(id) = arguments.get("id").and_then(|v| v.as_str()) else {
                    return ToolResult::error("missing required parameter: id");
                };
                match self.manager.get(&SubSessionId(id.to_string())) {
                    Ok((session, result)) => {
                        ToolResult::success(serde_json::json!({ "session": session, "result": result }).to_string())
                    }
                    Err(e) => ToolResult::error(e.to_string()),
                }
            }
            "list" => {
                let sessions = self.manager.list();
                ToolResult::success(serde_json::to_string(&sessions).unwrap_or_default())
            }
            "destroy" => {
                let Some(id) = arguments.get("id").and_then(|v| v.as_str()) else {
                    return ToolResult::error("missing required parameter: id");
                };
                match self.manager.destroy(&SubSessionId(id.to_string())) {
                    Ok(()) => ToolResult::success("destroyed"),
                    Err(e) => ToolResult::error(e.to_string()),
                }
            }
            other => ToolResult::error(format!("unknown action: {other}")),
        }
    }
}
