//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake, the join
//! handshake through the authorization gate, message parsing, and
//! bidirectional communication with the ChatServer.

use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

use crate::auth::{self, TokenRegistry};
use crate::error::AppError;
use crate::message::{ClientMessage, ServerMessage};
use crate::server::ServerCommand;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake, waits for the join frame, runs the
/// authorization gate, and only then registers the connection with the
/// ChatServer. Rejected attempts receive the reason and a close frame;
/// no session state exists for them at any point.
pub async fn handle_connection(
    stream: TcpStream,
    registry: Arc<TokenRegistry>,
    cmd_tx: mpsc::Sender<ServerCommand>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Credentials arrive as the first text frame; nothing is registered
    // until they pass the gate.
    let first = loop {
        match ws_receiver.next().await {
            Some(Ok(Message::Text(text))) => break text,
            Some(Ok(Message::Close(_))) | None => {
                debug!("Connection from {} closed before joining", peer_addr);
                return Ok(());
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    };

    let (token, user_name) = match serde_json::from_str::<ClientMessage>(&first) {
        Ok(ClientMessage::Join { token, user_name }) => (token, user_name),
        Ok(_) => {
            warn!("Connection from {} sent a message before joining", peer_addr);
            return reject(&mut ws_sender, "expected a join message".to_string()).await;
        }
        Err(e) => {
            warn!("Invalid join frame from {}: {}", peer_addr, e);
            return reject(&mut ws_sender, "expected a join message".to_string()).await;
        }
    };

    let token = match auth::authorize(&registry, &token, &user_name) {
        Ok(token) => token,
        Err(e) => {
            warn!("Rejected connection from {}: {}", peer_addr, e);
            return reject(&mut ws_sender, e.to_string()).await;
        }
    };

    // Create channel for server -> client messages and register
    let (msg_tx, mut msg_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let (reply_tx, reply_rx) = oneshot::channel();
    if cmd_tx
        .send(ServerCommand::Join {
            token,
            user_name,
            sender: msg_tx,
            reply: reply_tx,
        })
        .await
        .is_err()
    {
        error!(
            "Failed to register connection from {} - server closed",
            peer_addr
        );
        return Err(AppError::ChannelSend);
    }
    let Ok(user_id) = reply_rx.await else {
        error!("Session registration dropped for {}", peer_addr);
        return Err(AppError::ChannelSend);
    };

    // Clone cmd_tx for read task
    let cmd_tx_read = cmd_tx.clone();

    // Spawn read task (WebSocket -> ServerCommand)
    let read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Chat { message_text }) => {
                        let cmd = ServerCommand::Chat {
                            user_id,
                            message_text,
                        };
                        if cmd_tx_read.send(cmd).await.is_err() {
                            debug!("Server closed, ending read task for {}", user_id);
                            break;
                        }
                    }
                    Ok(ClientMessage::Join { .. }) => {
                        // Protocol violation; terminates only this connection
                        warn!("User {} sent a join on a live connection", user_id);
                        break;
                    }
                    Err(e) => {
                        warn!("Invalid frame from {}: {}", user_id, e);
                        break;
                    }
                },
                Ok(Message::Close(_)) => {
                    debug!("User {} sent close frame", user_id);
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    // Pong is handled automatically by tungstenite
                }
                Ok(_) => {
                    // Binary or other message types - ignore
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", user_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", user_id);
    });

    // Spawn write task (ServerMessage -> WebSocket)
    let write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    // Continue - don't break on serialization errors
                }
            }
        }
        debug!("Write task ended for client");

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = read_task => {
            debug!("Read task completed for {}", user_id);
        }
        _ = write_task => {
            debug!("Write task completed for {}", user_id);
        }
    }

    // Send disconnect command; the server treats repeats as no-ops, so
    // this is safe even after a forced disconnect already removed us
    let _ = cmd_tx.send(ServerCommand::Disconnect { user_id }).await;

    info!("Connection for user {} closed", user_id);

    Ok(())
}

/// Refuse an unauthenticated connection attempt
async fn reject(ws_sender: &mut WsSink, reason: String) -> Result<(), AppError> {
    let msg = ServerMessage::RequestError {
        error_message: reason,
    };
    let json = serde_json::to_string(&msg)?;
    ws_sender.send(Message::Text(json.into())).await?;
    ws_sender.close().await?;
    Ok(())
}
