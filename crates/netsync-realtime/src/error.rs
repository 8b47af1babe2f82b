//! Listener and transport error types.

use std::time::Duration;

use thiserror::Error;

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid realtime endpoint {url}: {reason}")]
    Endpoint { url: String, reason: String },

    #[error("failed to connect to realtime server: {0}")]
    Connect(String),

    #[error("failed to send message: {0}")]
    Send(String),

    #[error("failed to read message: {0}")]
    Receive(String),
}

pub type ListenerResult<T> = Result<T, ListenerError>;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error(
        "unsafe table identifier {0:?}: only alphanumeric characters and underscores allowed, \
         must start with a letter or underscore"
    )]
    UnsafeIdentifier(String),

    #[error("database query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database query timed out after {0:?}")]
    QueryTimeout(Duration),

    #[error("failed to decode row: {0}")]
    Row(String),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("realtime stream ended")]
    StreamEnded,

    #[error("listener already subscribed or closed")]
    AlreadySubscribed,
}
