//! Identifier allocation
//!
//! Two independent global namespaces: user ids and message ids. Each draw
//! is a fresh UUID v4 checked against the ids already handed out in that
//! namespace, retrying on collision. Allocated ids stay reserved for the
//! process lifetime, so an id never repeats even after its user leaves.

use std::collections::HashSet;

use uuid::Uuid;

use crate::types::{MessageId, UserId};

/// Collision-checked allocator for user and message identifiers
#[derive(Debug, Default)]
pub struct IdAllocator {
    user_ids: HashSet<Uuid>,
    message_ids: HashSet<Uuid>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a user id unused across all rooms
    pub fn allocate_user_id(&mut self) -> UserId {
        UserId(Self::draw(&mut self.user_ids))
    }

    /// Allocate a message id unused across all rooms
    pub fn allocate_message_id(&mut self) -> MessageId {
        MessageId(Self::draw(&mut self.message_ids))
    }

    // `insert` returning false means the draw collided; try again.
    fn draw(used: &mut HashSet<Uuid>) -> Uuid {
        loop {
            let id = Uuid::new_v4();
            if used.insert(id) {
                break id;
            }
        }
    }
}
