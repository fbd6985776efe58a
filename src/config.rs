//! Server configuration
//!
//! Room tokens come from the `ROOM_KEYS` environment variable as a JSON
//! array of strings; the listen port from `PORT` (default 7500).

use std::env;

use crate::error::ConfigError;
use crate::types::RoomToken;

/// Default listen port
pub const DEFAULT_PORT: u16 = 7500;

/// Startup configuration, read once in `main`
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Registered room tokens, in configuration order
    pub tokens: Vec<RoomToken>,
    /// TCP listen port
    pub port: u16,
}

impl ServerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let room_keys = env::var("ROOM_KEYS").map_err(|_| ConfigError::MissingRoomKeys)?;
        Self::from_values(&room_keys, env::var("PORT").ok().as_deref())
    }

    /// Build configuration from raw values (separated from `from_env`
    /// so tests never mutate the process environment)
    fn from_values(room_keys: &str, port: Option<&str>) -> Result<Self, ConfigError> {
        let entries: Vec<String> = serde_json::from_str(room_keys)?;
        let mut tokens = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let token = RoomToken::parse(entry).ok_or(ConfigError::MalformedToken { index })?;
            tokens.push(token);
        }

        let port = match port {
            Some(raw) => raw.parse().map_err(ConfigError::InvalidPort)?,
            None => DEFAULT_PORT,
        };

        Ok(Self { tokens, port })
    }

    /// Bind address for the TCP listener
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}
