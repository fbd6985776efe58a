//! Basic type definitions for the chat server
//!
//! Provides newtype wrappers for type safety:
//! - `UserId`: UUID-based unique user identifier
//! - `MessageId`: UUID-based unique message identifier
//! - `RoomToken`: pre-shared 60-character room token

use serde::Serialize;
use uuid::Uuid;

/// Unique user identifier (newtype pattern)
///
/// Wraps a UUID v4. Unique across all rooms for the process lifetime;
/// allocation goes through [`crate::ids::IdAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct UserId(pub Uuid);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique message identifier (newtype pattern)
///
/// Same global-uniqueness rules as [`UserId`], in its own namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MessageId(pub Uuid);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pre-shared room token
///
/// Doubles as the room identifier and the room's authentication secret.
/// Exactly 60 characters from `[A-Za-z0-9._-]`; anything else fails to parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomToken(String);

impl RoomToken {
    /// Required token length
    pub const LEN: usize = 60;

    /// Parse a proposed token string, returning `None` unless it is
    /// exactly 60 characters of `[A-Za-z0-9._-]`.
    pub fn parse(s: &str) -> Option<Self> {
        if Self::is_well_formed(s) {
            Some(Self(s.to_string()))
        } else {
            None
        }
    }

    /// Check the token shape without allocating
    pub fn is_well_formed(s: &str) -> bool {
        s.len() == Self::LEN
            && s.bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
