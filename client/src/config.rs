//! Configuration management for the client.

use std::env;

use stockroom_engine::{DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_DEBOUNCE_MS};

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// REST API base, e.g. `https://app.example.com/api/v1`
    pub api_url: String,
    /// Realtime endpoint including the credential
    pub ws_url: String,
    /// Session credential, sent as the `token` query parameter
    pub token: String,
    /// Rows per page of document tables
    pub page_size: usize,
    /// Quiet period before a typed search is sent
    pub search_debounce_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup("STOCKROOM_API_URL")
            .ok_or(ConfigError::MissingApiUrl)?
            .trim_end_matches('/')
            .to_string();

        let token = lookup("STOCKROOM_TOKEN")
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let ws_url = match lookup("STOCKROOM_WS_URL") {
            Some(url) => url,
            None => derive_ws_url(&api_url, &token)?,
        };

        let page_size = match lookup("STOCKROOM_PAGE_SIZE") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidPageSize(raw))?,
            None => DEFAULT_PAGE_SIZE,
        };

        let search_debounce_ms = match lookup("STOCKROOM_SEARCH_DEBOUNCE_MS") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidDebounce(raw))?,
            None => DEFAULT_SEARCH_DEBOUNCE_MS,
        };

        Ok(Self {
            api_url,
            ws_url,
            token,
            page_size,
            search_debounce_ms,
        })
    }
}

/// `https://host/api/v1` becomes `wss://host/api/v1/ws/{token}/`.
fn derive_ws_url(api_url: &str, token: &str) -> Result<String, ConfigError> {
    let swapped = if let Some(rest) = api_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = api_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(ConfigError::InvalidApiUrl(api_url.to_string()));
    };
    Ok(format!("{swapped}/ws/{token}/"))
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("STOCKROOM_API_URL environment variable is required")]
    MissingApiUrl,

    #[error("STOCKROOM_TOKEN environment variable is required")]
    MissingToken,

    #[error("STOCKROOM_API_URL must start with http:// or https://, got {0}")]
    InvalidApiUrl(String),

    #[error("Invalid STOCKROOM_PAGE_SIZE value: {0}")]
    InvalidPageSize(String),

    #[error("Invalid STOCKROOM_SEARCH_DEBOUNCE_MS value: {0}")]
    InvalidDebounce(String),
}
