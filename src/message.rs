//! Message protocol definitions
//!
//! JSON-based bidirectional message protocol using Serde's tagged enum
//! for type-safe serialization/deserialization.

use serde::{Deserialize, Serialize};

use crate::room::{StoredMessage, User};

/// Client → Server message
///
/// All messages from client to server. Uses tagged enum with snake_case naming.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Authenticate and enter a room (must be the first frame)
    Join { token: String, user_name: String },
    /// Send a chat message to the current room
    Chat { message_text: String },
}

/// Server → Client message
///
/// All messages from server to client. Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Join accepted; full room state, sent only to the new connection
    Connected(ConnectSnapshot),
    /// Another user entered the room
    UserJoined { user: User },
    /// A user left the room
    UserLeft { user: User },
    /// A chat message, delivered to every room member
    ChatMessage { message: StoredMessage },
    /// Fatal per-connection error; the connection is closed right after
    RequestError { error_message: String },
}

/// Full room state delivered to a newly joined connection
#[derive(Debug, Clone, Serialize)]
pub struct ConnectSnapshot {
    /// The new user's own entry
    pub user: User,
    /// Current members, join order (includes the new user)
    pub user_list: Vec<User>,
    /// Message history, send order
    pub message_list: Vec<StoredMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageId, UserId};
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_user() -> User {
        User {
            user_id: UserId(Uuid::new_v4()),
            user_name: "alice".to_string(),
            connected_at: Utc::now(),
        }
    }

    #[test]
    fn test_join_deserialize() {
        let json = r#"{"type": "join", "token": "abc", "user_name": "alice"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Join { token, user_name } => {
                assert_eq!(token, "abc");
                assert_eq!(user_name, "alice");
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_chat_deserialize() {
        let json = r#"{"type": "chat", "message_text": "hello"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Chat { message_text } => assert_eq!(message_text, "hello"),
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_connected_serializes_snapshot_fields() {
        let user = sample_user();
        let msg = ServerMessage::Connected(ConnectSnapshot {
            user: user.clone(),
            user_list: vec![user],
            message_list: vec![],
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"connected\""));
        assert!(json.contains("\"user_list\""));
        assert!(json.contains("\"message_list\":[]"));
    }

    #[test]
    fn test_chat_message_serialize() {
        let msg = ServerMessage::ChatMessage {
            message: StoredMessage {
                message_id: MessageId(Uuid::new_v4()),
                user_id: UserId(Uuid::new_v4()),
                sender_name: "alice".to_string(),
                message_text: "hello".to_string(),
                sent_at: Utc::now(),
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"chat_message\""));
        assert!(json.contains("\"sender_name\":\"alice\""));
        assert!(json.contains("\"message_text\":\"hello\""));
    }

    #[test]
    fn test_request_error_serialize() {
        let msg = ServerMessage::RequestError {
            error_message: "bad input".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"request_error\""));
        assert!(json.contains("\"error_message\":\"bad input\""));
    }
}
