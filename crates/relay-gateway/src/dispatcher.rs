//! The dispatcher (§4.K `processMessage`): one [`relay_queue::MessageHandler`]
//! fed both by channel adapters and by the scheduler, branching on the
//! dequeued message's [`ChannelType`]. Cron-typed messages route straight to
//! their owning agent with no hook/slash/typing-indicator involvement and a
//! channel send gated on `cron_deliver` metadata and the `HEARTBEAT_OK`
//! sentinel (§4.K "no channel send unless `channelId` is set... if the
//! agent returns the literal sentinel `HEARTBEAT_OK`, nothing is sent").
//! Normal messages get the full treatment: security pre-hook, then
//! slash-command interception, then agent resolution via the channel→agent
//! mapping, a typing indicator for the duration of the turn, and delivery
//! of the reply back through the originating channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay_agent::Agent;
use relay_channels::{ChannelManager, ChatAction};
use relay_core::{ChannelType, Message};
use relay_hooks::{HookContext, HookDecision, SecurityHook};
use relay_queue::MessageHandler;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::job_runner::CRON_DELIVER_METADATA_KEY;

const TYPING_INTERVAL: Duration = Duration::from_secs(3);
const UNAVAILABLE_MESSAGE: &str = "Sorry, something went wrong handling that. Please try again.";
/// Sentinel reply content that suppresses channel delivery for a cron-typed
/// message (§4.K): the agent ran but found nothing worth a reply.
const HEARTBEAT_OK: &str = "HEARTBEAT_OK";

pub struct Dispatcher {
    agents: HashMap<String, Arc<Agent>>,
    channel_agents: HashMap<String, String>,
    hook: Arc<dyn SecurityHook>,
    channels: Arc<ChannelManager>,
}

impl Dispatcher {
    pub fn new(
        agents: HashMap<String, Arc<Agent>>,
        channel_agents: HashMap<String, String>,
        hook: Arc<dyn SecurityHook>,
        channels: Arc<ChannelManager>,
    ) -> Self {
        Self {
            agents,
            channel_agents,
            hook,
            channels,
        }
    }

    async fn deliver(&self, channel_id: &str, chat_id: &str, content: &str) {
        let Some(channel) = self.channels.get(channel_id) else {
            warn!(channel_id, "cannot deliver reply, channel is not registered");
            return;
        };
        let guard = channel.lock().await;
        if let Err(e) = guard.send_message(chat_id, content).await {
            warn!(channel_id, error = %e, "failed to deliver reply");
        }
    }

    fn slash_command_reply(&self, content: &str) -> Option<&'static str> {
        match content.trim() {
            "/start" => Some("Hi, I'm online. Send me a message or /help for what I can do."),
            "/help" => Some("Just talk to me normally. I also understand /start and /status."),
            "/status" => Some("All systems operational."),
            _ => None,
        }
    }

    fn start_typing_indicator(&self, channel_id: String, chat_id: String) -> CancellationToken {
        let token = CancellationToken::new();
        let ticker_token = token.clone();
        let channels = Arc::clone(&self.channels);

        tokio::spawn(async move {
            let Some(channel) = channels.get(&channel_id) else {
                return;
            };
            loop {
                {
                    let guard = channel.lock().await;
                    let _ = guard.send_chat_action(&chat_id, ChatAction::Typing).await;
                }
                tokio::select! {
                    _ = ticker_token.cancelled() => break,
                    _ = tokio::time::sleep(TYPING_INTERVAL) => {}
                }
            }
        });

        token
    }

    async fn handle_cron(&self, message: Message) {
        let Some(agent_id) = message.metadata.get("agent_id") else {
            warn!("cron-typed message is missing its agent_id metadata");
            return;
        };
        let Some(agent) = self.agents.get(agent_id) else {
            warn!(agent_id, "cron job routes to an agent that isn't registered");
            return;
        };

        let deliverable = message.metadata.contains_key(CRON_DELIVER_METADATA_KEY);

        match agent.process_message(&message).await {
            Ok(response) => {
                if deliverable && response.content.trim() != HEARTBEAT_OK {
                    self.deliver(&message.channel_id, &message.chat_id, &response.content).await;
                }
            }
            Err(e) => error!(agent_id, error = %e, "cron-originated agent turn failed fatally"),
        }
    }
}

#[async_trait]
impl MessageHandler<Message> for Dispatcher {
    async fn handle(&self, message: Message) {
        if message.channel_type == ChannelType::Cron {
            self.handle_cron(message).await;
            return;
        }

        let ctx = HookContext::new(&message);
        match self.hook.check(&ctx).await {
            Ok(HookDecision::Allow) => {}
            Ok(HookDecision::Block { reason }) => {
                warn!(channel_id = %message.channel_id, chat_id = %message.chat_id, reason, "security hook blocked message");
                return;
            }
            Err(e) => {
                error!(error = %e, "security hook failed, dropping message");
                return;
            }
        }

        if let Some(reply) = self.slash_command_reply(&message.content) {
            self.deliver(&message.channel_id, &message.chat_id, reply).await;
            return;
        }

        let Some(agent_id) = self.channel_agents.get(&message.channel_id) else {
            warn!(channel_id = %message.channel_id, "no agent bound to this channel");
            return;
        };
        let Some(agent) = self.agents.get(agent_id) else {
            warn!(agent_id, "channel routes to an agent that isn't registered");
            return;
        };

        let typing = self.start_typing_indicator(message.channel_id.clone(), message.chat_id.clone());
        let result = agent.process_message(&message).await;
        typing.cancel();

        match result {
            Ok(response) => self.deliver(&message.channel_id, &message.chat_id, &response.content).await,
            Err(e) => {
                error!(agent_id, error = %e, "agent turn failed fatally");
                self.deliver(&message.channel_id, &message.chat_id, UNAVAILABLE_MESSAGE).await;
            }
        }

        info!(agent_id, channel_id = %message.channel_id, "message dispatched");
    }
}
