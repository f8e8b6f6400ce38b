use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a channel is shared by a community or is a direct conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChannelKind {
    Community,
    Direct,
}

impl ChannelKind {
    pub fn is_direct(self) -> bool {
        matches!(self, Self::Direct)
    }
}

// The chat backend tags channels with single letters: O/P for open and
// private channels, D/G for one-to-one and group direct messages.
impl From<String> for ChannelKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "D" | "G" => Self::Direct,
            _ => Self::Community,
        }
    }
}

impl From<ChannelKind> for String {
    fn from(kind: ChannelKind) -> Self {
        match kind {
            ChannelKind::Community => "O".to_string(),
            ChannelKind::Direct => "D".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ChannelKind,
    #[serde(default)]
    pub display_name: String,
    /// Marker the unread count is computed against. `None` until the user
    /// has opened the channel once.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_viewed_at: Option<DateTime<Utc>>,
}

/// A chat message. Edits and deletes are soft state: the client keeps the
/// message and renders the flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub channel_id: String,
    #[serde(rename = "user_id")]
    pub author: String,
    #[serde(rename = "message", default)]
    pub body: String,
    #[serde(rename = "create_at", with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "edit_at", default, with = "chrono::serde::ts_milliseconds_option")]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted: bool,
    /// emoji name -> users who reacted with it
    #[serde(default)]
    pub reactions: BTreeMap<String, Vec<String>>,
}

impl ChatMessage {
    pub fn reacted(&self, emoji: &str, user: &str) -> bool {
        self.reactions
            .get(emoji)
            .is_some_and(|users| users.iter().any(|u| u == user))
    }
}

/// Per-channel unread summary as reported by the chat backend.
/// Snake-case like the rest of the chat wire types; camelCase spellings are
/// accepted on input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnreadSummary {
    #[serde(default, alias = "totalUnread")]
    pub total_unread: Option<u64>,
    #[serde(default)]
    pub channels: Vec<ChannelUnread>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelUnread {
    #[serde(alias = "channelId")]
    pub channel_id: String,
    #[serde(default, alias = "unreadCount")]
    pub unread_count: u64,
}

/// Unread totals shown on the chat badge.
///
/// `community + direct == total` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UnreadCounts {
    pub total: u64,
    pub community: u64,
    pub direct: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_kind_from_backend_tags() {
        let raw = r#"[
            {"id": "a", "type": "O", "display_name": "HiveSnaps"},
            {"id": "b", "type": "D", "last_viewed_at": 1700000000000},
            {"id": "c", "type": "G"},
            {"id": "d", "type": "X"}
        ]"#;
        let channels: Vec<Channel> = serde_json::from_str(raw).unwrap();
        let kinds: Vec<_> = channels.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChannelKind::Community,
                ChannelKind::Direct,
                ChannelKind::Direct,
                ChannelKind::Community
            ]
        );
        assert_eq!(channels[1].last_viewed_at.unwrap().timestamp(), 1_700_000_000);
        assert!(channels[0].last_viewed_at.is_none());
    }

    #[test]
    fn message_wire_fields() {
        let raw = r#"{
            "id": "m1",
            "channel_id": "c1",
            "user_id": "alice",
            "message": "gm",
            "create_at": 1700000000123,
            "reactions": {"fire": ["bob", "carol"]}
        }"#;
        let msg: ChatMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.author, "alice");
        assert_eq!(msg.body, "gm");
        assert_eq!(msg.created_at.timestamp_millis(), 1_700_000_000_123);
        assert!(msg.edited_at.is_none());
        assert!(!msg.deleted);
        assert!(msg.reacted("fire", "bob"));
        assert!(!msg.reacted("fire", "alice"));
    }

    #[test]
    fn unread_summary_uses_snake_case() {
        let raw = r#"{"total_unread":4,"channels":[{"channel_id":"c1","unread_count":4}]}"#;
        let summary: UnreadSummary = serde_json::from_str(raw).unwrap();
        assert_eq!(summary.total_unread, Some(4));
        assert_eq!(summary.channels[0].channel_id, "c1");

        let out = serde_json::to_value(&summary).unwrap();
        assert_eq!(out["channels"][0]["unread_count"], 4);
        assert!(out.get("totalUnread").is_none());

        let legacy: UnreadSummary =
            serde_json::from_str(r#"{"totalUnread":2,"channels":[{"channelId":"c2","unreadCount":2}]}"#)
                .unwrap();
        assert_eq!(legacy.channels[0].unread_count, 2);
    }
}
