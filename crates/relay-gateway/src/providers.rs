//! A stand-in [`Provider`] for configured provider entries.
//!
//! Concrete LLM wire clients (Anthropic, OpenAI, a local model server, …)
//! are explicitly out of scope here; this repo's job is the runtime core
//! around them, not the clients themselves. `EchoProvider` is what gets
//! registered for every configured provider id so the rest of the
//! pipeline (fallback cascade, tool loop, session persistence) is fully
//! exercisable end to end without a real backend. Unlike
//! `relay_providers::test_support::ScriptedProvider`, it never exhausts —
//! suitable for wiring into a running gateway, not just a test.

use async_trait::async_trait;
use relay_providers::{GenerateOptions, Provider};
use relay_providers::error::Result;
use relay_sessions::ChatMessage;

pub struct EchoProvider {
    name: String,
}

impl EchoProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Provider for EchoProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        model_name: &str,
        messages: &[ChatMessage],
        _options: &GenerateOptions,
    ) -> Result<ChatMessage> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == relay_sessions::Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        Ok(ChatMessage::assistant(format!(
            "[{} via {}] no concrete model backend is wired up yet, but I heard: {}",
            model_name, self.name, last_user
        )))
    }
}
