use async_trait::async_trait;

use snaps_types::models::{Channel, ChatMessage, UnreadSummary};

use crate::ChatError;

/// An established chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub token: String,
}

/// Operations the client needs from the chat backend.
///
/// Implementations keep the session token from [`bootstrap`](Self::bootstrap)
/// and authenticate later calls with it.
#[async_trait]
pub trait ChatApi: Send + Sync + 'static {
    async fn bootstrap(&self, username: &str, access_token: Option<&str>) -> Result<Session, ChatError>;

    async fn channels(&self) -> Result<Vec<Channel>, ChatError>;

    async fn messages(&self, channel_id: &str) -> Result<Vec<ChatMessage>, ChatError>;

    async fn send_message(&self, channel_id: &str, body: &str) -> Result<ChatMessage, ChatError>;

    async fn edit_message(&self, message_id: &str, body: &str) -> Result<ChatMessage, ChatError>;

    async fn delete_message(&self, message_id: &str) -> Result<(), ChatError>;

    /// Adds (`add = true`) or removes a reaction by the session user.
    async fn react(&self, message_id: &str, emoji: &str, add: bool) -> Result<(), ChatError>;

    async fn mark_viewed(&self, channel_id: &str) -> Result<(), ChatError>;

    async fn unread(&self) -> Result<UnreadSummary, ChatError>;
}
