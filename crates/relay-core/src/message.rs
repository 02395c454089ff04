//! The `Message`/`Attachment`/`Response` data model (§3): the shapes that
//! flow between the Channel Router, the Message Queue, and the Agent Core.
//! Shared here rather than owned by any one of those crates so that none of
//! them needs to depend on another just to name the pipeline's transient
//! value types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Which external surface a [`Message`] arrived on (or, for `Cron`, was
/// synthesised by the scheduler rather than received).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Telegram,
    Lark,
    Http,
    Cron,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Telegram => "telegram",
            ChannelType::Lark => "lark",
            ChannelType::Http => "http",
            ChannelType::Cron => "cron",
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// image|voice attachment carried alongside a [`Message`]. Size-bounded by
/// the channel adapter that produced it; never persisted to session history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub data: Vec<u8>,
    pub mime_type: String,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Voice,
}

/// A normalised inbound chat event. Produced by a Channel adapter (or
/// synthesised by the Scheduler for a fired cron job), enqueued on the lane
/// named by `session_key`, and eventually dispatched to the bound Agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    pub channel_type: ChannelType,
    pub user_id: String,
    pub chat_id: String,
    pub content: String,
    /// Filled in by the router if absent. Uniquely identifies the
    /// conversation lane; two messages with the same `session_key` are
    /// processed in strict receipt order.
    pub session_key: Option<String>,
    pub metadata: HashMap<String, String>,
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// A message with no attachments and no metadata, for the common case.
    pub fn new(
        id: impl Into<String>,
        channel_id: impl Into<String>,
        channel_type: ChannelType,
        user_id: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            channel_id: channel_id.into(),
            channel_type,
            user_id: user_id.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            session_key: None,
            metadata: HashMap::new(),
            attachments: Vec::new(),
        }
    }

    /// Per the message ingestion contract (§7): well-formed iff the
    /// identity fields are non-empty and there's either text or an
    /// attachment to act on.
    pub fn is_well_formed(&self) -> bool {
        !self.id.is_empty()
            && !self.channel_id.is_empty()
            && !self.user_id.is_empty()
            && !self.chat_id.is_empty()
            && (!self.content.is_empty() || !self.attachments.is_empty())
    }
}

/// The Agent Core's reply to a [`Message`], ready for the Channel Router to
/// deliver (or, on `error`, to suppress).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub chat_id: String,
    pub content: String,
    pub model: String,
    pub provider: String,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_requires_identity_and_content_or_attachment() {
        let msg = Message::new("m1", "tg1", ChannelType::Telegram, "42", "100", "hello");
        assert!(msg.is_well_formed());

        let mut empty = msg.clone();
        empty.content.clear();
        assert!(!empty.is_well_formed());

        empty.attachments.push(Attachment {
            kind: AttachmentKind::Image,
            data: vec![1, 2, 3],
            mime_type: "image/png".to_string(),
            file_name: None,
        });
        assert!(empty.is_well_formed());
    }

    #[test]
    fn channel_type_display_matches_ingestion_contract_names() {
        assert_eq!(ChannelType::Telegram.to_string(), "telegram");
        assert_eq!(ChannelType::Cron.to_string(), "cron");
    }
}
