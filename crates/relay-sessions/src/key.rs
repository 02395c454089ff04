use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// Channel-centric session key.
///
/// Unlike a user-centric scheme, a relay session belongs to a single
/// channel conversation: the same human talking to the same agent from
/// two different channels gets two distinct sessions.
///
/// Format: `agent:{agentId}:{channelType}:{channelId}:{chatId}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub agent_id: String,
    pub channel_type: String,
    pub channel_id: String,
    pub chat_id: String,
}

impl SessionKey {
    pub fn new(
        agent_id: impl Into<String>,
        channel_type: impl Into<String>,
        channel_id: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            channel_type: channel_type.into(),
            channel_id: channel_id.into(),
            chat_id: chat_id.into(),
        }
    }

    /// Session key for a cron-fired, isolated-session job: `cron:<jobId>`.
    /// Not itself a well-formed `agent:...` key — callers that need this
    /// shortcut build the raw string directly (see relay-scheduler).
    pub fn format(&self) -> String {
        format!(
            "agent:{}:{}:{}:{}",
            self.agent_id, self.channel_type, self.channel_id, self.chat_id
        )
    }

    /// Parse a wire-format key string back into a `SessionKey`.
    ///
    /// Expects exactly five colon-separated segments:
    /// `agent:<agentId>:<channelType>:<channelId>:<chatId>`.
    pub fn parse(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix("agent:")
            .ok_or_else(|| SessionError::InvalidKey(format!("missing 'agent:' prefix: {s}")))?;

        let parts: Vec<&str> = rest.splitn(3, ':').collect();
        if parts.len() != 3 {
            return Err(SessionError::InvalidKey(format!(
                "expected agent:<id>:<channelType>:<channelId>:<chatId>, got: {s}"
            )));
        }
        let agent_id = parts[0];
        let remainder = parts[2];

        let rem_parts: Vec<&str> = remainder.splitn(2, ':').collect();
        if rem_parts.len() != 2 {
            return Err(SessionError::InvalidKey(format!(
                "missing channelId/chatId segment: {s}"
            )));
        }
        let channel_type = parts[1];
        let channel_id = rem_parts[0];
        let chat_id = rem_parts[1];

        if agent_id.is_empty()
            || channel_type.is_empty()
            || channel_id.is_empty()
            || chat_id.is_empty()
        {
            return Err(SessionError::InvalidKey(format!(
                "key components must not be empty: {s}"
            )));
        }

        Ok(Self {
            agent_id: agent_id.to_string(),
            channel_type: channel_type.to_string(),
            channel_id: channel_id.to_string(),
            chat_id: chat_id.to_string(),
        })
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_simple_key() {
        let key = SessionKey::new("main", "telegram", "tg1", "100");
        let s = key.format();
        assert_eq!(s, "agent:main:telegram:tg1:100");
        let parsed = SessionKey::parse(&s).expect("parse failed");
        assert_eq!(parsed, key);
    }

    #[test]
    fn roundtrip_chat_id_with_colons() {
        let key = SessionKey::new("main", "http", "webhook1", "room:general:1");
        let s = key.format();
        let parsed = SessionKey::parse(&s).expect("parse failed");
        assert_eq!(parsed.chat_id, "room:general:1");
    }

    #[test]
    fn parse_missing_prefix_returns_err() {
        assert!(SessionKey::parse("main:telegram:tg1:100").is_err());
    }

    #[test]
    fn parse_missing_segment_returns_err() {
        assert!(SessionKey::parse("agent:main:telegram").is_err());
    }

    #[test]
    fn parse_empty_component_returns_err() {
        assert!(SessionKey::parse("agent::telegram:tg1:100").is_err());
    }
}
