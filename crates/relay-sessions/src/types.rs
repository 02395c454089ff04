use serde::{Deserialize, Serialize};

use crate::key::SessionKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One turn in a session's history. Messages are append-only except for
/// `Session::clear` (§3 Session invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: serde_json::Value) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            tool_name: Some(tool_name.into()),
        }
    }
}

/// A persisted conversation session (§3 Session, §4.A/§4.B).
///
/// `dirty`, `version`, `persisted_msg_count`, and `append_saves_since_compact`
/// are bookkeeping only — they drive save strategy and are never themselves
/// persisted as session data (Open Question in spec.md §9: `version` does
/// not survive save/load by design).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub key: SessionKey,
    pub messages: Vec<ChatMessage>,
    pub created_at: String,
    pub updated_at: String,
    /// Zero means no expiry.
    pub expire_at: i64,
    pub msg_count: u32,
    pub tool_call_count: u32,

    #[serde(skip)]
    pub dirty: bool,
    #[serde(skip)]
    pub version: u64,
    #[serde(skip)]
    pub persisted_msg_count: usize,
    #[serde(skip)]
    pub append_saves_since_compact: u32,
}

impl Session {
    /// A fresh, empty session for a key with no on-disk file yet.
    pub fn new(key: SessionKey) -> Self {
        let now = crate::now_rfc3339();
        Self {
            key,
            messages: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
            expire_at: 0,
            msg_count: 0,
            tool_call_count: 0,
            dirty: false,
            version: 0,
            persisted_msg_count: 0,
            append_saves_since_compact: 0,
        }
    }

    pub fn append(&mut self, msg: ChatMessage) {
        if msg.role == Role::Tool {
            self.tool_call_count += 1;
        }
        self.messages.push(msg);
        self.msg_count = self.messages.len() as u32;
        self.updated_at = crate::now_rfc3339();
        self.version += 1;
        self.dirty = true;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.msg_count = 0;
        self.tool_call_count = 0;
        self.persisted_msg_count = 0;
        self.append_saves_since_compact = 0;
        self.updated_at = crate::now_rfc3339();
        self.version += 1;
        self.dirty = true;
    }

    /// Sets `expire_at` only when it actually changes the value, so TTL
    /// refreshes on reads that observed no change do not force a save
    /// (§4.B `Save`: "only when it changed, to avoid gratuitous dirty marks").
    pub fn set_expire_at(&mut self, expire_at: i64) {
        if self.expire_at != expire_at {
            self.expire_at = expire_at;
            self.version += 1;
            self.dirty = true;
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expire_at != 0 && self.expire_at <= now
    }
}
