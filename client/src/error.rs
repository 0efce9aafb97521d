//! Unified error handling for the client.

use crate::config::ConfigError;

/// Client error type.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The credential was rejected. Terminal for the session.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Engine error: {0}")]
    Engine(#[from] stockroom_engine::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized)
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
