//! Room state and the room store
//!
//! A room owns its member list (join order) and message history (send
//! order). Rooms exist one per registered token for the whole process
//! lifetime; they are never created on demand or torn down.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{MessageId, RoomToken, UserId};

/// A connected user, owned by exactly one room's member list
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub user_id: UserId,
    pub user_name: String,
    pub connected_at: DateTime<Utc>,
}

/// A stored chat message; append-only, never removed
#[derive(Debug, Clone, Serialize)]
pub struct StoredMessage {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub sender_name: String,
    pub message_text: String,
    pub sent_at: DateTime<Utc>,
}

/// Per-room state: members in join order, messages in send order
#[derive(Debug, Default)]
pub struct RoomState {
    users: Vec<User>,
    messages: Vec<StoredMessage>,
}

impl RoomState {
    /// Append a user to the member list
    pub fn add_user(&mut self, user: User) {
        self.users.push(user);
    }

    /// Remove the first member matching `user_id`
    ///
    /// Returns the removed entry, or `None` if the user is not present
    /// (already removed or never joined); callers treat that as a no-op.
    pub fn remove_user(&mut self, user_id: UserId) -> Option<User> {
        let index = self.users.iter().position(|u| u.user_id == user_id)?;
        Some(self.users.remove(index))
    }

    /// Append a message to the history
    pub fn push_message(&mut self, message: StoredMessage) {
        self.messages.push(message);
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn messages(&self) -> &[StoredMessage] {
        &self.messages
    }
}

/// All rooms, keyed by their token
///
/// Built eagerly at startup with one entry per registered token. Entries
/// are never added or removed afterwards, so a lookup miss means the
/// caller bypassed the authorization gate.
#[derive(Debug)]
pub struct RoomStore {
    rooms: HashMap<RoomToken, RoomState>,
}

impl RoomStore {
    pub fn new(tokens: impl IntoIterator<Item = RoomToken>) -> Self {
        Self {
            rooms: tokens
                .into_iter()
                .map(|token| (token, RoomState::default()))
                .collect(),
        }
    }

    pub fn get(&self, token: &RoomToken) -> Option<&RoomState> {
        self.rooms.get(token)
    }

    pub fn get_mut(&mut self, token: &RoomToken) -> Option<&mut RoomState> {
        self.rooms.get_mut(token)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
