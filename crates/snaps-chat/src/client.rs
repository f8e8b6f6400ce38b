use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use snaps_types::api::{
    BootstrapRequest, BootstrapResponse, ChannelListResponse, EditMessageRequest,
    MessageListResponse, MessageResponse, ReactionRequest, SendMessageRequest,
};
use snaps_types::models::{Channel, ChatMessage, UnreadSummary};

use crate::api::{ChatApi, Session};
use crate::ChatError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// REST client for the chat backend.
pub struct ChatClient {
    http: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Result<Self, ChatError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/chat{}", self.base_url, path)
    }

    fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = token;
    }

    pub fn has_session(&self) -> bool {
        self.token().is_some()
    }

    /// Forgets the session token.
    pub fn clear_session(&self) {
        self.set_token(None);
    }

    fn authed(&self, request: RequestBuilder) -> Result<RequestBuilder, ChatError> {
        let token = self.token().ok_or(ChatError::NotInitialized)?;
        Ok(request.bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ChatError> {
        let response = self.authed(request)?.send().await?;
        let body = checked_body(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn send_empty(&self, request: RequestBuilder) -> Result<(), ChatError> {
        let response = self.authed(request)?.send().await?;
        checked_body(response).await?;
        Ok(())
    }
}

async fn checked_body(response: Response) -> Result<String, ChatError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ChatError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

fn bootstrap_session(response: BootstrapResponse) -> Result<Session, ChatError> {
    if !response.ok {
        return Err(ChatError::Bootstrap(
            response.error.unwrap_or_else(|| "unknown error".to_string()),
        ));
    }
    let token = response
        .token
        .ok_or_else(|| ChatError::Bootstrap("no session token in response".to_string()))?;
    Ok(Session {
        user_id: response.user_id.unwrap_or_default(),
        token,
    })
}

#[async_trait]
impl ChatApi for ChatClient {
    async fn bootstrap(&self, username: &str, access_token: Option<&str>) -> Result<Session, ChatError> {
        let request = BootstrapRequest {
            username: username.to_string(),
            access_token: access_token.map(str::to_string),
        };
        let response = self
            .http
            .post(self.url("/bootstrap"))
            .json(&request)
            .send()
            .await?;
        let body = checked_body(response).await?;
        let session = bootstrap_session(serde_json::from_str(&body)?)?;

        self.set_token(Some(session.token.clone()));
        info!("Chat session established for {}", username);
        Ok(session)
    }

    async fn channels(&self) -> Result<Vec<Channel>, ChatError> {
        let response: ChannelListResponse = self.send(self.http.get(self.url("/channels"))).await?;
        debug!("Loaded {} channels", response.channels.len());
        Ok(response.channels)
    }

    async fn messages(&self, channel_id: &str) -> Result<Vec<ChatMessage>, ChatError> {
        let url = self.url(&format!("/channels/{}/posts", channel_id));
        let response: MessageListResponse = self.send(self.http.get(url)).await?;
        Ok(response.posts)
    }

    async fn send_message(&self, channel_id: &str, body: &str) -> Result<ChatMessage, ChatError> {
        let url = self.url(&format!("/channels/{}/posts", channel_id));
        let request = SendMessageRequest {
            message: body.to_string(),
            root_id: None,
        };
        let response: MessageResponse = self.send(self.http.post(url).json(&request)).await?;
        Ok(response.post)
    }

    async fn edit_message(&self, message_id: &str, body: &str) -> Result<ChatMessage, ChatError> {
        let url = self.url(&format!("/posts/{}", message_id));
        let request = EditMessageRequest {
            message: body.to_string(),
        };
        let response: MessageResponse = self.send(self.http.patch(url).json(&request)).await?;
        Ok(response.post)
    }

    async fn delete_message(&self, message_id: &str) -> Result<(), ChatError> {
        let url = self.url(&format!("/posts/{}", message_id));
        self.send_empty(self.http.delete(url)).await
    }

    async fn react(&self, message_id: &str, emoji: &str, add: bool) -> Result<(), ChatError> {
        let url = self.url(&format!("/posts/{}/reactions", message_id));
        let request = ReactionRequest {
            emoji: emoji.to_string(),
            add,
        };
        self.send_empty(self.http.post(url).json(&request)).await
    }

    async fn mark_viewed(&self, channel_id: &str) -> Result<(), ChatError> {
        let url = self.url(&format!("/channels/{}/view", channel_id));
        self.send_empty(self.http.post(url)).await
    }

    async fn unread(&self) -> Result<UnreadSummary, ChatError> {
        self.send(self.http.get(self.url("/unreads"))).await
    }
}
