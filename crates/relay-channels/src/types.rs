use serde::{Deserialize, Serialize};

/// The normalised inbound event handed to `registerMessageHandler`'s
/// callback. Owned by `relay-core` so every crate on the pipeline (queue,
/// agent, gateway) can name it without depending on the channel layer.
pub use relay_core::Message;

/// A "typing…"-style transient indicator, sent via `sendChatAction`.
/// Platforms with no concept of this return
/// [`crate::ChannelError::UnsupportedOperation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatAction {
    Typing,
}

/// Runtime connection state of a channel adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// Fully connected and ready to send/receive.
    Connected,

    /// Attempting to establish or re-establish the connection.
    Connecting,

    /// Cleanly disconnected (not an error condition).
    Disconnected,

    /// An unrecoverable (or pre-retry) error occurred.
    Error(String),
}
