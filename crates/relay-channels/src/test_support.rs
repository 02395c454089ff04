//! An in-memory [`Channel`] for exercising the router and gateway dispatch
//! logic (scenarios S1-S2) without a real Telegram/Lark transport.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use relay_core::{ChannelType, Message};
use relay_queue::MessageHandler;
use tokio_util::sync::CancellationToken;

use crate::channel::Channel;
use crate::error::{ChannelError, Result};
use crate::types::{ChannelStatus, ChatAction};

/// One message the test harness wants delivered to `start`'s caller, plus
/// a record of everything sent back out through `send_message`.
pub struct InMemoryChannel {
    id: String,
    channel_type: ChannelType,
    handler: Mutex<Option<Arc<dyn MessageHandler<Message>>>>,
    inbox: Mutex<Vec<Message>>,
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
    status: Mutex<ChannelStatus>,
}

impl InMemoryChannel {
    pub fn new(id: impl Into<String>, channel_type: ChannelType) -> Self {
        Self {
            id: id.into(),
            channel_type,
            handler: Mutex::new(None),
            inbox: Mutex::new(Vec::new()),
            sent: Arc::new(Mutex::new(Vec::new())),
            status: Mutex::new(ChannelStatus::Disconnected),
        }
    }

    /// Queue a message to be delivered to the registered handler the next
    /// time `start` drains the inbox.
    pub fn push_inbound(&self, msg: Message) {
        self.inbox.lock().unwrap().push(msg);
    }
}

#[async_trait]
impl Channel for InMemoryChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    fn register_message_handler(&mut self, handler: Arc<dyn MessageHandler<Message>>) {
        *self.handler.lock().unwrap() = Some(handler);
    }

    async fn start(&mut self, ctx: CancellationToken) -> Result<()> {
        *self.status.lock().unwrap() = ChannelStatus::Connected;

        loop {
            let pending: Vec<Message> = self.inbox.lock().unwrap().drain(..).collect();
            let handler = self.handler.lock().unwrap().clone();
            if let Some(handler) = handler {
                for msg in pending {
                    handler.handle(msg).await;
                }
            }

            tokio::select! {
                _ = ctx.cancelled() => {
                    *self.status.lock().unwrap() = ChannelStatus::Disconnected;
                    return Ok(());
                }
                _ = tokio::time::sleep(std::time::Duration::from_millis(10)) => {}
            }
        }
    }

    async fn stop(&mut self, _ctx: CancellationToken) -> Result<()> {
        *self.status.lock().unwrap() = ChannelStatus::Disconnected;
        Ok(())
    }

    async fn send_message(&self, chat_id: &str, content: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), content.to_string()));
        Ok(())
    }

    async fn send_chat_action(&self, _chat_id: &str, _action: ChatAction) -> Result<()> {
        Err(ChannelError::UnsupportedOperation {
            operation: "send_chat_action".to_string(),
        })
    }

    async fn react_message(&self, _chat_id: &str, _message_id: &str, _reaction: &str) -> Result<()> {
        Err(ChannelError::UnsupportedOperation {
            operation: "react_message".to_string(),
        })
    }

    fn status(&self) -> ChannelStatus {
        self.status.lock().unwrap().clone()
    }
}
