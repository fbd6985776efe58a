//! Connection handle
//!
//! The session core's only view of a live connection. Holds the outbound
//! event channel; dropping the handle closes the channel, which unwinds
//! the connection's write task and closes the socket.

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::{RoomToken, UserId};

/// A live, authenticated connection
#[derive(Debug)]
pub struct Client {
    /// Identifier of the user this connection belongs to
    pub user_id: UserId,
    /// Username captured at join time
    pub user_name: String,
    /// The one room this connection is a member of
    pub room: RoomToken,
    /// Server → Client event channel
    sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Client {
    pub fn new(
        user_id: UserId,
        user_name: String,
        room: RoomToken,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> Self {
        Self {
            user_id,
            user_name,
            room,
            sender,
        }
    }

    /// Queue an event for this connection
    ///
    /// Never blocks; the channel is unbounded so the session actor is not
    /// stalled by a slow consumer. Returns an error only if the connection's
    /// write task is already gone.
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender.send(msg).map_err(|_| SendError::ChannelClosed)
    }
}
