//! Connection authentication
//!
//! The token registry and the authorization gate every connection attempt
//! passes through before any session state is created.

use std::collections::HashSet;

use crate::error::AuthError;
use crate::types::RoomToken;

/// Immutable set of registered room tokens
///
/// Built once at startup from configuration; never modified afterwards.
/// Shared read-only with every connection handler.
#[derive(Debug)]
pub struct TokenRegistry {
    tokens: HashSet<RoomToken>,
}

impl TokenRegistry {
    pub fn new(tokens: impl IntoIterator<Item = RoomToken>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }

    pub fn contains(&self, token: &RoomToken) -> bool {
        self.tokens.contains(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Validate a connection attempt's credentials
///
/// Checks run in order: token shape, registry membership, non-empty
/// username. The first failure rejects the attempt with its reason; nothing
/// is created or mutated here. This is the sole authorization gate; the
/// session actor assumes every `Join` it receives has passed it.
pub fn authorize(
    registry: &TokenRegistry,
    token: &str,
    user_name: &str,
) -> Result<RoomToken, AuthError> {
    let token = RoomToken::parse(token).ok_or(AuthError::MalformedToken)?;
    if !registry.contains(&token) {
        return Err(AuthError::UnknownToken);
    }
    if user_name.is_empty() {
        return Err(AuthError::InvalidUsername);
    }
    Ok(token)
}
