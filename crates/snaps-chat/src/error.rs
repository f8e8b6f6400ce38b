#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Chat service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed chat response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Chat session rejected: {0}")]
    Bootstrap(String),

    #[error("Chat session not initialized")]
    NotInitialized,

    #[error("No channel selected")]
    NoChannel,

    #[error("Message {0} not found")]
    UnknownMessage(String),
}
