use serde::{Deserialize, Serialize};

use crate::models::{Channel, ChatMessage};

// -- Session --

#[derive(Debug, Clone, Serialize)]
pub struct BootstrapRequest {
    pub username: String,
    /// Token issued by the Hive login flow, forwarded to the chat backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapResponse {
    pub ok: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// -- Channels --

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelListResponse {
    #[serde(default)]
    pub channels: Vec<Channel>,
}

// -- Messages --

#[derive(Debug, Clone, Deserialize)]
pub struct MessageListResponse {
    #[serde(default)]
    pub posts: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditMessageRequest {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub post: ChatMessage,
}

// -- Reactions --

#[derive(Debug, Clone, Serialize)]
pub struct ReactionRequest {
    pub emoji: String,
    /// `true` adds the reaction, `false` removes it.
    pub add: bool,
}
