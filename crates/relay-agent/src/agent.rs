//! Agent Core (§4.F): loads/creates the session for a turn, appends the
//! user message, assembles the system prompt, and runs the fallback
//! cascade over the agent's `[primary, ...fallback]` model specs.

use std::sync::Arc;

use relay_core::{AgentConfig, AgentId, Message, RequestId, Response};
use relay_providers::{ModelSpec, ProviderRegistry};
use relay_sessions::{ChatMessage, SessionKey, SessionManager};
use relay_tools::ToolRegistry;
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::prompt::{PromptBuilder, RuntimeContext};
use crate::run_loop::{effective_max_iterations, run_loop_with_cap};

/// One configured agent, bound to the shared registries it draws
/// sessions, tools, and model providers from.
pub struct Agent {
    pub id: AgentId,
    config: AgentConfig,
    sessions: Arc<SessionManager>,
    tools: Arc<ToolRegistry>,
    providers: Arc<ProviderRegistry>,
    prompt_builder: PromptBuilder,
}

impl Agent {
    pub fn new(
        id: AgentId,
        config: AgentConfig,
        sessions: Arc<SessionManager>,
        tools: Arc<ToolRegistry>,
        providers: Arc<ProviderRegistry>,
    ) -> Self {
        let prompt_builder = PromptBuilder::new(id.clone(), config.workspace.clone());
        Self {
            id,
            config,
            sessions,
            tools,
            providers,
            prompt_builder,
        }
    }

    /// Handles one inbound turn (§4.F steps 1-5). The user message is
    /// appended and the session saved regardless of how the cascade below
    /// turns out, so a run of provider outages never loses the turn.
    #[instrument(skip(self, message), fields(agent = %self.id, chat_id = %message.chat_id))]
    pub async fn process_message(&self, message: &Message) -> Result<Response> {
        let session_key = SessionKey::new(
            self.id.as_str(),
            message.channel_type.as_str(),
            &message.channel_id,
            &message.chat_id,
        );

        let session_handle = self.sessions.get_or_create(&session_key).await?;
        let mut session = session_handle.lock().await;

        session.append(ChatMessage::user(user_turn_content(message)));

        let ctx = RuntimeContext::from_message(message);
        let skills = self.tools.describe_all().await;
        let system_prompt = self.prompt_builder.build(&ctx, &skills);

        let mut working: Vec<ChatMessage> = Vec::with_capacity(session.messages.len() + 1);
        working.push(ChatMessage::system(system_prompt));
        working.extend(session.messages.iter().cloned());

        let max_iterations = effective_max_iterations(self.config.config.max_iterations as i64);
        let response = match self.run_fallback_cascade(&working, max_iterations).await {
            Some((spec, outcome)) => {
                session.append(outcome.final_message.clone());
                Response {
                    id: RequestId::new().to_string(),
                    chat_id: message.chat_id.clone(),
                    content: outcome.final_message.content,
                    model: spec.model_name,
                    provider: spec.provider_id,
                    error: None,
                }
            }
            None => {
                warn!(agent = %self.id, "every configured model failed this turn");
                Response {
                    id: RequestId::new().to_string(),
                    chat_id: message.chat_id.clone(),
                    content: UNAVAILABLE_MESSAGE.to_string(),
                    model: String::new(),
                    provider: String::new(),
                    error: Some("all configured providers failed".to_string()),
                }
            }
        };

        self.sessions.save(&mut session).await?;
        info!(agent = %self.id, model = %response.model, "turn handled");
        Ok(response)
    }

    /// Tries each configured model spec in order, skipping unparseable
    /// specs and unknown providers (both warned, not fatal), and returns
    /// the first successful run. Each attempt gets its own clone of the
    /// working message list so a failed model's tool traffic never leaks
    /// into the next attempt.
    async fn run_fallback_cascade(
        &self,
        working: &[ChatMessage],
        max_iterations: usize,
    ) -> Option<(ModelSpec, crate::run_loop::LoopOutcome)> {
        let mut specs = Vec::with_capacity(1 + self.config.models.fallback.len());
        specs.push(self.config.models.primary.clone());
        specs.extend(self.config.models.fallback.iter().cloned());

        for raw_spec in &specs {
            let spec = match ModelSpec::parse(raw_spec) {
                Ok(spec) => spec,
                Err(e) => {
                    warn!(model_spec = %raw_spec, error = %e, "skipping unparseable model spec");
                    continue;
                }
            };

            let Some(provider) = self.providers.lookup(&spec.provider_id).await else {
                warn!(provider = %spec.provider_id, "skipping unknown provider");
                continue;
            };

            let mut attempt = working.to_vec();
            match run_loop_with_cap(
                provider.as_ref(),
                &spec.model_name,
                &self.tools,
                &mut attempt,
                max_iterations,
            )
            .await
            {
                Ok(outcome) => return Some((spec, outcome)),
                Err(e) => {
                    warn!(model_spec = %spec, error = %e, "model attempt failed, trying next fallback");
                    continue;
                }
            }
        }

        None
    }
}

const UNAVAILABLE_MESSAGE: &str =
    "I'm having trouble reaching any configured model right now. Please try again shortly.";

/// Renders a [`Message`] into the text stored in session history. Voice and
/// image attachments have no place in the `ChatMessage::content` string, so
/// each becomes a short descriptive note appended after the text.
fn user_turn_content(message: &Message) -> String {
    if message.attachments.is_empty() {
        return message.content.clone();
    }

    let mut out = message.content.clone();
    for attachment in &message.attachments {
        if !out.is_empty() {
            out.push('\n');
        }
        let label = match attachment.kind {
            relay_core::AttachmentKind::Image => "image",
            relay_core::AttachmentKind::Voice => "voice message",
        };
        out.push_str(&format!("[{label} attachment received, {} bytes]", attachment.data.len()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{AgentModelsConfig, AgentTuningConfig, ChannelType};
    use relay_providers::test_support::{ScriptedProvider, Step};
    use relay_sessions::SessionStore;

    fn agent_config(workspace: &str, primary: &str, fallback: Vec<&str>) -> AgentConfig {
        AgentConfig {
            name: "main".to_string(),
            workspace: workspace.to_string(),
            channels: vec![],
            skills: vec![],
            models: AgentModelsConfig {
                primary: primary.to_string(),
                fallback: fallback.into_iter().map(String::from).collect(),
            },
            config: AgentTuningConfig::default(),
        }
    }

    async fn build_agent(
        config: AgentConfig,
        providers: Vec<(&str, Arc<dyn relay_providers::Provider>)>,
    ) -> (tempfile::TempDir, Agent) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStore::new(dir.path()));
        let sessions = Arc::new(SessionManager::new(store, None));
        let tools = Arc::new(ToolRegistry::new());
        let registry = Arc::new(ProviderRegistry::new());
        for (id, provider) in providers {
            registry.register(id, provider).await.unwrap();
        }
        let agent = Agent::new(AgentId::new("main"), config, sessions, tools, registry);
        (dir, agent)
    }

    #[tokio::test]
    async fn successful_primary_model_produces_response_and_persists_turn() {
        let dir_marker = tempfile::tempdir().unwrap();
        let ws = dir_marker.path().to_str().unwrap().to_string();
        let config = agent_config(&ws, "test:model-a", vec![]);
        let provider = Arc::new(ScriptedProvider::new("test", vec![Step::Text("hello back".to_string())]));
        let (_dir, agent) = build_agent(config, vec![("test", provider)]).await;

        let msg = Message::new("m1", "tg1", ChannelType::Telegram, "u1", "c1", "hi there");
        let response = agent.process_message(&msg).await.unwrap();

        assert_eq!(response.content, "hello back");
        assert_eq!(response.provider, "test");
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn primary_failure_falls_back_to_next_model() {
        let dir_marker = tempfile::tempdir().unwrap();
        let ws = dir_marker.path().to_str().unwrap().to_string();
        let config = agent_config(&ws, "broken:model-a", vec!["test:model-b"]);
        let broken = Arc::new(ScriptedProvider::new("broken", vec![Step::Error("down".to_string())]));
        let healthy = Arc::new(ScriptedProvider::new("test", vec![Step::Text("from fallback".to_string())]));
        let (_dir, agent) = build_agent(config, vec![("broken", broken), ("test", healthy)]).await;

        let msg = Message::new("m1", "tg1", ChannelType::Telegram, "u1", "c1", "hi there");
        let response = agent.process_message(&msg).await.unwrap();

        assert_eq!(response.content, "from fallback");
        assert_eq!(response.provider, "test");
    }

    #[tokio::test]
    async fn all_providers_failing_returns_deterministic_unavailable_response() {
        let dir_marker = tempfile::tempdir().unwrap();
        let ws = dir_marker.path().to_str().unwrap().to_string();
        let config = agent_config(&ws, "broken:model-a", vec![]);
        let broken = Arc::new(ScriptedProvider::new("broken", vec![Step::Error("down".to_string())]));
        let (_dir, agent) = build_agent(config, vec![("broken", broken)]).await;

        let msg = Message::new("m1", "tg1", ChannelType::Telegram, "u1", "c1", "hi there");
        let response = agent.process_message(&msg).await.unwrap();

        assert!(response.error.is_some());
        assert_eq!(response.content, UNAVAILABLE_MESSAGE);
    }

    #[tokio::test]
    async fn unknown_provider_in_spec_is_skipped_not_fatal() {
        let dir_marker = tempfile::tempdir().unwrap();
        let ws = dir_marker.path().to_str().unwrap().to_string();
        let config = agent_config(&ws, "missing:model-a", vec!["test:model-b"]);
        let healthy = Arc::new(ScriptedProvider::new("test", vec![Step::Text("still works".to_string())]));
        let (_dir, agent) = build_agent(config, vec![("test", healthy)]).await;

        let msg = Message::new("m1", "tg1", ChannelType::Telegram, "u1", "c1", "hi there");
        let response = agent.process_message(&msg).await.unwrap();

        assert_eq!(response.content, "still works");
    }
}
