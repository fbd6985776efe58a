//! Token-authenticated multi-room WebSocket chat server library
//!
//! Rooms are pre-registered via 60-character shared tokens: presenting a
//! registered token both names the room and authorizes entry. The server
//! keeps per-room membership and message history in process memory and
//! relays chat messages and presence changes to room members.
//!
//! # Features
//! - Token-gated connections (the token is the room)
//! - Join snapshot: full member list and message history for new arrivals
//! - Room-wide chat relay with per-room message ordering
//! - Presence events on join and leave
//! - Per-connection error policy: notify, then disconnect
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor managing all state
//! - Each connection has a `handler` task communicating with the server
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use tokenchat::{handle_connection, ChatServer, ServerConfig, TokenRegistry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::from_env().unwrap();
//!     let registry = Arc::new(TokenRegistry::new(config.tokens.clone()));
//!     let listener = TcpListener::bind(config.bind_addr()).await.unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!
//!     tokio::spawn(ChatServer::new(config.tokens, cmd_rx).run());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         tokio::spawn(handle_connection(stream, registry.clone(), cmd_tx.clone()));
//!     }
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod ids;
pub mod message;
pub mod room;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use auth::{authorize, TokenRegistry};
pub use client::Client;
pub use config::ServerConfig;
pub use error::{AppError, AuthError, ConfigError, SendError};
pub use handler::handle_connection;
pub use ids::IdAllocator;
pub use message::{ClientMessage, ConnectSnapshot, ServerMessage};
pub use room::{RoomState, RoomStore, StoredMessage, User};
pub use server::{ChatServer, ServerCommand};
pub use types::{MessageId, RoomToken, UserId};
