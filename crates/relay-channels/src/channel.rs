use std::sync::Arc;

use async_trait::async_trait;
use relay_core::{ChannelType, Message};
use relay_queue::MessageHandler;
use tokio_util::sync::CancellationToken;

use crate::{
    error::Result,
    types::{ChannelStatus, ChatAction},
};

/// Common interface implemented by every channel adapter (Telegram, Lark,
/// the HTTP webhook surface, …).
///
/// `start` is expected to block until `ctx` is cancelled or the adapter
/// hits a fatal error; callers run it on its own task. Implementations
/// must be `Send + Sync` so they can be stored in a [`crate::ChannelManager`]
/// and driven from multiple Tokio tasks.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Stable identifier for this channel instance (e.g. `"telegram"`).
    /// Used as the key inside [`crate::ChannelManager`] and must be unique
    /// across all registered adapters.
    fn id(&self) -> &str;

    /// The channel family this adapter belongs to (`relay_core::ChannelType`).
    fn channel_type(&self) -> ChannelType;

    /// Register the callback invoked for every normalised inbound `Message`.
    /// Must be called before `start`; adapters that receive inbound traffic
    /// before a handler is registered should buffer or drop it, not panic.
    fn register_message_handler(&mut self, handler: Arc<dyn MessageHandler<Message>>);

    /// Run the adapter's receive loop until `ctx` is cancelled or a fatal
    /// error occurs. Returns `Ok(())` on clean cancellation.
    async fn start(&mut self, ctx: CancellationToken) -> Result<()>;

    /// Ask a running adapter to wind down; `start`'s caller still awaits
    /// that call's return to know the loop actually exited.
    async fn stop(&mut self, ctx: CancellationToken) -> Result<()>;

    /// Deliver a single outbound text message.
    async fn send_message(&self, chat_id: &str, content: &str) -> Result<()>;

    /// Send a transient indicator (e.g. "typing…"). `UnsupportedOperation`
    /// is a legitimate return on platforms without the concept.
    async fn send_chat_action(&self, chat_id: &str, action: ChatAction) -> Result<()>;

    /// React to a previously sent message. `UnsupportedOperation` is a
    /// legitimate return on platforms without the concept.
    async fn react_message(&self, chat_id: &str, message_id: &str, reaction: &str) -> Result<()>;

    /// Return the current runtime status without blocking.
    fn status(&self) -> ChannelStatus;
}
