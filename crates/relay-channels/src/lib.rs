//! Channel Router (§4.H, external interface only): the adapter contract
//! every messaging surface (Telegram, Lark, HTTP webhook, …) implements,
//! plus the manager that drives each adapter's receive loop.

pub mod channel;
pub mod error;
pub mod manager;
pub mod test_support;
pub mod types;

pub use channel::Channel;
pub use error::ChannelError;
pub use manager::ChannelManager;
pub use types::{ChannelStatus, ChatAction, Message};
