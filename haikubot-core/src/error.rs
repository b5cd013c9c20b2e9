//! Error types for haikubot-core

use thiserror::Error;

/// Main error type for the haikubot-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Secret key could not be parsed or used
    #[error("key error: {0}")]
    Key(String),

    /// Relay connection or protocol failure
    #[error("relay {relay}: {message}")]
    Transport { relay: String, message: String },

    /// Relay sent a frame we could not understand
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Relay answered but refused the event
    #[error("relay {relay} rejected event: {reason}")]
    Rejected { relay: String, reason: String },

    /// No relay accepted a published event
    #[error("failed to publish: none of {attempted} relay(s) accepted the event")]
    Delivery { attempted: usize },

    /// Phonetic analyzer could not tokenize the input
    #[error("analyzer error: {0}")]
    Analyzer(String),

    /// Heartbeat push failed
    #[error("heartbeat error: {0}")]
    Heartbeat(String),
}

impl Error {
    /// Shorthand for a transport error against a relay URL.
    pub fn transport(relay: &str, message: impl std::fmt::Display) -> Self {
        Error::Transport {
            relay: relay.to_string(),
            message: message.to_string(),
        }
    }
}

/// Result type alias for haikubot-core
pub type Result<T> = std::result::Result<T, Error>;
