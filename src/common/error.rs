//! Error types for the application.

use thiserror::Error;

/// Top-level application error.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Slack error: {0}")]
    Slack(#[from] SlackError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Slack Web API and Socket Mode errors.
#[derive(Debug, Error)]
pub enum SlackError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} failed: {error}")]
    Api { method: String, error: String },

    #[error("Malformed {method} response: {message}")]
    MalformedResponse { method: String, message: String },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

impl SlackError {
    /// Whether the API reported that the requested user does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { error, .. } if error == "user_not_found" || error == "users_not_found")
    }
}

/// Errors talking to the external trivia engine process.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to start engine '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Engine link closed")]
    Closed,

    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Engine framing error: {0}")]
    Codec(#[from] tokio_util::codec::LinesCodecError),

    #[error("Engine JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Slack operations.
pub type SlackResult<T> = std::result::Result<T, SlackError>;

/// Result type alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
