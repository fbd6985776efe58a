//! Error types for the chat server
//!
//! Defines authentication, configuration, transport, and message send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Authentication failures at the connection-attempt boundary
///
/// Checked before any session state exists. None of these touch a room.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Token is not a 60-character `[A-Za-z0-9._-]` string
    #[error("auth token verification failed: expected 60 characters of [A-Za-z0-9._-]")]
    MalformedToken,

    /// Token is well-formed but not registered on this server
    #[error("auth token does not exist on this server")]
    UnknownToken,

    /// Username is empty
    #[error("username verification failed: must be a non-empty string")]
    InvalidUsername,
}

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    /// ROOM_KEYS environment variable missing
    #[error("ROOM_KEYS is not set; expected a JSON array of room tokens")]
    MissingRoomKeys,

    /// ROOM_KEYS is not valid JSON
    #[error("ROOM_KEYS is not a JSON array of strings: {0}")]
    InvalidRoomKeys(#[from] serde_json::Error),

    /// A configured token fails the 60-character pattern
    #[error("ROOM_KEYS entry {index} is not a valid room token")]
    MalformedToken { index: usize },

    /// PORT is not a valid port number
    #[error("invalid PORT value: {0}")]
    InvalidPort(std::num::ParseIntError),
}

/// Transport-level errors
///
/// Fatal for the one connection they occur on; never propagated to others.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal channel to the session actor is broken
    #[error("Channel send error")]
    ChannelSend,
}

/// Message send errors
///
/// Occurs when attempting to send events through closed channels.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}
