//! The reason-act loop (§4.F `runLoop`).
//!
//! Tool-call and tool-result messages exchanged with the provider live only
//! in the working message list passed to each `generate` call; only the
//! final assistant message is meant to be appended to the session by the
//! caller (§4.F step 5, matching scenario S1: one user + one assistant
//! record survives a turn that made no tool calls, and a turn that made
//! some still ends with exactly one new assistant record).

use relay_providers::{GenerateOptions, Provider, ProviderError, ToolCallRequest};
use relay_sessions::ChatMessage;
use relay_tools::ToolRegistry;
use tracing::{debug, warn};

/// Use the default of 25 whenever the configured value isn't a usable cap.
pub const DEFAULT_MAX_ITERATIONS: usize = 25;

pub fn effective_max_iterations(configured: i64) -> usize {
    if configured <= 0 {
        DEFAULT_MAX_ITERATIONS
    } else {
        configured as usize
    }
}

/// The reason-act loop's outcome: the message to append to the session.
pub struct LoopOutcome {
    pub final_message: ChatMessage,
    pub iterations_used: usize,
}

/// Run the loop: call `provider.generate` up to `max_iterations` times,
/// executing any requested tool calls via `tools` between calls. `messages`
/// is the full `[system] + history` list for this turn; it's extended
/// in-place with the intra-turn assistant/tool traffic.
///
/// A provider error on any regular iteration propagates as `Err` — that
/// provider/model is treated as broken for this turn, and it's up to the
/// caller's fallback cascade to try the next one. The only failure this
/// function absorbs itself is the no-tools summary call issued after the
/// iteration cap is hit, since by that point the model has already been
/// producing usable output all turn.
pub async fn run_loop(
    provider: &dyn Provider,
    model_name: &str,
    tools: &ToolRegistry,
    mut messages: Vec<ChatMessage>,
) -> Result<LoopOutcome, ProviderError> {
    run_loop_with_cap(provider, model_name, tools, &mut messages, DEFAULT_MAX_ITERATIONS).await
}

pub async fn run_loop_with_cap(
    provider: &dyn Provider,
    model_name: &str,
    tools: &ToolRegistry,
    messages: &mut Vec<ChatMessage>,
    max_iterations: usize,
) -> Result<LoopOutcome, ProviderError> {
    let catalogue = tools.list_schemas().await;

    let mut iter = 0;
    while iter < max_iterations {
        let options = GenerateOptions::with_tools(catalogue.clone(), 8192, 0.7);
        let assistant = provider.generate(model_name, messages, &options).await.map_err(|e| {
            warn!(iteration = iter, error = %e, "provider call failed mid-loop");
            e
        })?;

        let Some(tool_calls) = parse_tool_calls(&assistant) else {
            debug!(iteration = iter, "loop complete, no tool calls requested");
            return Ok(LoopOutcome {
                final_message: assistant,
                iterations_used: iter + 1,
            });
        };

        messages.push(assistant);

        for call in &tool_calls {
            let content = execute_one(tools, call).await;
            messages.push(ChatMessage::tool_result(
                call.id.clone(),
                call.name.clone(),
                content,
            ));
        }

        iter += 1;
    }

    warn!(max_iterations, "reason-act loop hit the iteration cap");
    let summary = summarize_on_cap(provider, model_name, messages).await;
    Ok(LoopOutcome {
        final_message: summary,
        iterations_used: max_iterations,
    })
}

/// No tool calls present, or the call carries an empty list — either reads
/// as "final answer" per §4.F.
fn parse_tool_calls(message: &ChatMessage) -> Option<Vec<ToolCallRequest>> {
    let raw = message.tool_calls.as_ref()?;
    match serde_json::from_value::<Vec<ToolCallRequest>>(raw.clone()) {
        Ok(calls) if !calls.is_empty() => Some(calls),
        _ => None,
    }
}

/// Execute one tool call and render it into the `tool` message's JSON-string
/// content, per §4.F's exact encoding rules.
async fn execute_one(tools: &ToolRegistry, call: &ToolCallRequest) -> String {
    let result = tools.execute(&call.name, call.arguments.clone()).await;
    if result.is_error {
        return format!("ERROR: {}", result.content);
    }
    match serde_json::to_string(&result.content) {
        Ok(encoded) => encoded,
        Err(_) => "{}".to_string(),
    }
}

/// Cap exhausted without a final assistant message: ask once more with no
/// tools for a progress summary; fall back to a canned message if that
/// call also fails.
async fn summarize_on_cap(
    provider: &dyn Provider,
    model_name: &str,
    messages: &mut Vec<ChatMessage>,
) -> ChatMessage {
    messages.push(ChatMessage::user(
        "You've reached the iteration limit for this turn. Summarise the progress made so far \
         and what work remains, without calling any more tools.",
    ));

    let options = GenerateOptions::no_tools(2048, 0.7);
    match provider.generate(model_name, messages, &options).await {
        Ok(msg) => msg,
        Err(e) => {
            warn!(error = %e, "summary call after iteration cap also failed");
            ChatMessage::assistant(
                "I reached my iteration limit for this turn and couldn't produce a summary.",
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_providers::test_support::{ScriptedProvider, Step};

    #[tokio::test]
    async fn stops_on_first_tool_call_free_response() {
        let provider = ScriptedProvider::new("test", vec![Step::Text("hi there".to_string())]);
        let tools = ToolRegistry::new();
        let outcome = run_loop(&provider, "any-model", &tools, vec![ChatMessage::user("hello")])
            .await
            .unwrap();
        assert_eq!(outcome.final_message.content, "hi there");
        assert_eq!(outcome.iterations_used, 1);
    }

    #[tokio::test]
    async fn provider_error_mid_loop_propagates_instead_of_being_absorbed() {
        let provider = ScriptedProvider::new("test", vec![Step::Error("backend unreachable".to_string())]);
        let tools = ToolRegistry::new();
        let result = run_loop(&provider, "any-model", &tools, vec![ChatMessage::user("hello")]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn executes_requested_tool_then_returns_final_text() {
        let provider = ScriptedProvider::new(
            "test",
            vec![
                Step::ToolCalls(vec![ToolCallRequest {
                    id: "call-1".to_string(),
                    name: "echo".to_string(),
                    arguments: serde_json::json!({"value": "x"}),
                }]),
                Step::Text("done".to_string()),
            ],
        );
        let tools = ToolRegistry::new();
        tools.register(std::sync::Arc::new(EchoTool)).await.unwrap();

        let outcome = run_loop(&provider, "any-model", &tools, vec![ChatMessage::user("hello")])
            .await
            .unwrap();
        assert_eq!(outcome.final_message.content, "done");
        assert_eq!(outcome.iterations_used, 2);
    }

    #[tokio::test]
    async fn unknown_tool_call_produces_error_content() {
        let provider = ScriptedProvider::new(
            "test",
            vec![
                Step::ToolCalls(vec![ToolCallRequest {
                    id: "call-1".to_string(),
                    name: "does_not_exist".to_string(),
                    arguments: serde_json::json!({}),
                }]),
                Step::Text("done".to_string()),
            ],
        );
        let tools = ToolRegistry::new();
        let mut messages = vec![ChatMessage::user("hello")];
        let outcome = run_loop_with_cap(&provider, "any-model", &tools, &mut messages, 25)
            .await
            .unwrap();
        assert_eq!(outcome.final_message.content, "done");

        let tool_msg = messages.iter().find(|m| m.tool_call_id.is_some()).unwrap();
        assert!(tool_msg.content.starts_with("ERROR:"));
    }

    #[tokio::test]
    async fn hitting_iteration_cap_triggers_no_tools_summary_call() {
        let mut steps: Vec<Step> = (0..3)
            .map(|i| {
                Step::ToolCalls(vec![ToolCallRequest {
                    id: format!("call-{i}"),
                    name: "echo".to_string(),
                    arguments: serde_json::json!({}),
                }])
            })
            .collect();
        steps.push(Step::Text("here's the summary".to_string()));
        let provider = ScriptedProvider::new("test", steps);
        let tools = ToolRegistry::new();
        tools.register(std::sync::Arc::new(EchoTool)).await.unwrap();

        let mut messages = vec![ChatMessage::user("hello")];
        let outcome = run_loop_with_cap(&provider, "any-model", &tools, &mut messages, 3)
            .await
            .unwrap();
        assert_eq!(outcome.final_message.content, "here's the summary");
        assert_eq!(outcome.iterations_used, 3);
    }

    struct EchoTool;

    #[async_trait::async_trait]
    impl relay_tools::Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes"
        }
        fn parameter_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, arguments: serde_json::Value) -> relay_tools::ToolResult {
            relay_tools::ToolResult::success(arguments.to_string())
        }
    }
}
