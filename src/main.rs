//! Token-authenticated multi-room chat server - Entry Point
//!
//! Loads the room-token configuration, starts the ChatServer actor, and
//! accepts connections.

use std::env;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tokenchat::{handle_connection, ChatServer, ServerConfig, TokenRegistry};

/// Channel buffer size for server commands
const CHANNEL_BUFFER_SIZE: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=tokenchat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tokenchat=info")),
        )
        .init();

    // Room tokens and port come from the environment (ROOM_KEYS, PORT)
    let config = ServerConfig::from_env()?;
    info!("Loaded {} room tokens", config.tokens.len());

    // Bind address from command line, or derived from the configured port
    let addr = env::args().nth(1).unwrap_or_else(|| config.bind_addr());

    let listener = TcpListener::bind(&addr).await?;
    info!("WebSocket chat server listening on {}", addr);

    // Create ChatServer actor channel and start
    let registry = Arc::new(TokenRegistry::new(config.tokens.clone()));
    let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    let server = ChatServer::new(config.tokens, cmd_rx);
    tokio::spawn(server.run());

    info!("Server status: online");

    // Connection accept loop
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let registry = registry.clone();
                let cmd_tx = cmd_tx.clone();

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, registry, cmd_tx).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
