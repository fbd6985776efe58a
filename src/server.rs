//! ChatServer Actor implementation
//!
//! The central actor that owns all mutable state: the room store, the
//! identifier namespaces, and the live connection handles. Commands from
//! connection handlers arrive over an mpsc channel and are processed one
//! at a time to completion, so room mutation needs no locks and every
//! room's members observe chat messages in the order they were accepted.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::client::Client;
use crate::ids::IdAllocator;
use crate::message::{ConnectSnapshot, ServerMessage};
use crate::room::{RoomStore, StoredMessage, User};
use crate::types::{RoomToken, UserId};

/// Notice sent on the error path before a forced disconnect
const FORCED_DISCONNECT_NOTICE: &str =
    "An error has occurred. You will be disconnected now. If this issue persists, please contact the developer.";

/// Commands sent from connection handlers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// Authenticated connection entering its room. The handler has already
    /// run the authorization gate; `reply` carries back the allocated id.
    Join {
        token: RoomToken,
        user_name: String,
        sender: mpsc::UnboundedSender<ServerMessage>,
        reply: oneshot::Sender<UserId>,
    },
    /// Connection closed
    Disconnect { user_id: UserId },
    /// Chat message from a live connection
    Chat {
        user_id: UserId,
        message_text: String,
    },
}

/// The main ChatServer actor
pub struct ChatServer {
    /// One room per registered token, for the process lifetime
    store: RoomStore,
    /// Global user/message id namespaces
    ids: IdAllocator,
    /// Live connection handles: UserId -> Client
    clients: HashMap<UserId, Client>,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a ChatServer with one room per registered token
    pub fn new(
        tokens: impl IntoIterator<Item = RoomToken>,
        receiver: mpsc::Receiver<ServerCommand>,
    ) -> Self {
        Self {
            store: RoomStore::new(tokens),
            ids: IdAllocator::new(),
            clients: HashMap::new(),
            receiver,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are
    /// dropped. Command processing itself never awaits: outbound delivery
    /// is fire-and-forget, so one slow connection cannot stall the loop.
    pub async fn run(mut self) {
        info!("ChatServer started with {} registered rooms", self.store.len());

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("ChatServer shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Join {
                token,
                user_name,
                sender,
                reply,
            } => {
                self.handle_join(token, user_name, sender, reply);
            }
            ServerCommand::Disconnect { user_id } => {
                self.handle_disconnect(user_id);
            }
            ServerCommand::Chat {
                user_id,
                message_text,
            } => {
                self.handle_chat(user_id, message_text);
            }
        }
    }

    /// Handle an authenticated connection entering its room
    fn handle_join(
        &mut self,
        token: RoomToken,
        user_name: String,
        sender: mpsc::UnboundedSender<ServerMessage>,
        reply: oneshot::Sender<UserId>,
    ) {
        let user_id = self.ids.allocate_user_id();
        let user = User {
            user_id,
            user_name,
            connected_at: Utc::now(),
        };

        let Some(room) = self.store.get_mut(&token) else {
            // The store holds every registered token, so this only fires if
            // a handler bypassed the gate. Dropping `reply` tells it to give
            // up on the connection.
            error!("Join for unregistered room {}", token);
            return;
        };
        room.add_user(user.clone());
        let snapshot = ConnectSnapshot {
            user: user.clone(),
            user_list: room.users().to_vec(),
            message_list: room.messages().to_vec(),
        };

        let client = Client::new(user_id, user.user_name.clone(), token.clone(), sender);
        self.clients.insert(user_id, client);

        self.broadcast_room(
            &token,
            ServerMessage::UserJoined { user: user.clone() },
            Some(user_id),
        );
        self.send_to(user_id, ServerMessage::Connected(snapshot));

        info!("User {} has connected to room {}", user.user_name, token);

        if reply.send(user_id).is_err() {
            // Handler went away before learning its id and will never send
            // a Disconnect for it; undo the join now.
            self.handle_disconnect(user_id);
        }
    }

    /// Handle a closed connection
    ///
    /// Idempotent: a repeat disconnect (or one following a forced
    /// termination) finds no handle and does nothing.
    fn handle_disconnect(&mut self, user_id: UserId) {
        let Some(client) = self.clients.remove(&user_id) else {
            return;
        };
        self.remove_from_room(user_id, &client.room);
    }

    /// Handle a chat message from a live connection
    fn handle_chat(&mut self, user_id: UserId, message_text: String) {
        // A message can race a disconnect; without a live handle there is
        // nothing to relay and no one to notify.
        let Some(client) = self.clients.get(&user_id) else {
            return;
        };
        let token = client.room.clone();
        let sender_name = client.user_name.clone();

        if message_text.is_empty() {
            warn!("User {} sent an empty message", sender_name);
            self.force_disconnect(user_id, FORCED_DISCONNECT_NOTICE);
            return;
        }

        let message = StoredMessage {
            message_id: self.ids.allocate_message_id(),
            user_id,
            sender_name,
            message_text,
            sent_at: Utc::now(),
        };
        let Some(room) = self.store.get_mut(&token) else {
            return;
        };
        room.push_message(message.clone());

        info!(
            "User {} has sent a message: [{}]",
            message.sender_name, message.message_text
        );

        self.broadcast_room(&token, ServerMessage::ChatMessage { message }, None);
    }

    /// Notify the offending connection, then terminate it unconditionally
    ///
    /// There is no retry path on the connection; the client must establish
    /// a new one. Remaining room members see a normal departure.
    fn force_disconnect(&mut self, user_id: UserId, reason: &str) {
        let Some(client) = self.clients.remove(&user_id) else {
            return;
        };
        let _ = client.send(ServerMessage::RequestError {
            error_message: reason.to_string(),
        });
        // Dropping the handle closes the outbound channel; the write task
        // drains the error event and then closes the socket.
        self.remove_from_room(user_id, &client.room);
    }

    /// Helper: remove a user from their room and notify remaining members
    fn remove_from_room(&mut self, user_id: UserId, token: &RoomToken) {
        let removed = match self.store.get_mut(token) {
            Some(room) => room.remove_user(user_id),
            None => None,
        };
        let Some(user) = removed else {
            return;
        };

        info!("User {} has disconnected from room {}", user.user_name, token);

        self.broadcast_room(token, ServerMessage::UserLeft { user }, None);
    }

    /// Deliver an event to a single connection
    fn send_to(&self, user_id: UserId, message: ServerMessage) {
        if let Some(client) = self.clients.get(&user_id) {
            let _ = client.send(message);
        }
    }

    /// Deliver an event to every member of a room, optionally excluding one
    fn broadcast_room(&self, token: &RoomToken, message: ServerMessage, exclude: Option<UserId>) {
        let Some(room) = self.store.get(token) else {
            return;
        };
        for member in room.users() {
            if exclude == Some(member.user_id) {
                continue;
            }
            if let Some(client) = self.clients.get(&member.user_id) {
                let _ = client.send(message.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn token(c: char) -> RoomToken {
        RoomToken::parse(&c.to_string().repeat(60)).unwrap()
    }

    fn new_server(tokens: Vec<RoomToken>) -> ChatServer {
        let (_tx, rx) = mpsc::channel(16);
        ChatServer::new(tokens, rx)
    }

    /// Drive a Join command directly, returning the allocated id and the
    /// receiver standing in for the connection's write task
    fn join(
        server: &mut ChatServer,
        token: &RoomToken,
        name: &str,
    ) -> (UserId, UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (reply_tx, mut reply_rx) = oneshot::channel();
        server.handle_command(ServerCommand::Join {
            token: token.clone(),
            user_name: name.to_string(),
            sender: tx,
            reply: reply_tx,
        });
        let user_id = reply_rx.try_recv().expect("join should report a user id");
        (user_id, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<ServerMessage>) {
        while rx.try_recv().is_ok() {}
    }

    #[test]
    fn test_connect_snapshot_flow() {
        let t = token('a');
        let mut server = new_server(vec![t.clone()]);

        let (_alice_id, mut alice_rx) = join(&mut server, &t, "alice");
        match alice_rx.try_recv().unwrap() {
            ServerMessage::Connected(snapshot) => {
                assert_eq!(snapshot.user.user_name, "alice");
                assert_eq!(snapshot.user_list.len(), 1);
                assert!(snapshot.message_list.is_empty());
            }
            other => panic!("expected connected, got {other:?}"),
        }

        let (_bob_id, mut bob_rx) = join(&mut server, &t, "bob");
        match alice_rx.try_recv().unwrap() {
            ServerMessage::UserJoined { user } => assert_eq!(user.user_name, "bob"),
            other => panic!("expected user_joined, got {other:?}"),
        }
        match bob_rx.try_recv().unwrap() {
            ServerMessage::Connected(snapshot) => {
                let names: Vec<&str> = snapshot
                    .user_list
                    .iter()
                    .map(|u| u.user_name.as_str())
                    .collect();
                assert_eq!(names, ["alice", "bob"]);
            }
            other => panic!("expected connected, got {other:?}"),
        }
        // The new user does not receive their own join event
        assert!(bob_rx.try_recv().is_err());
    }

    #[test]
    fn test_n_connects_build_membership() {
        let t = token('a');
        let mut server = new_server(vec![t.clone()]);

        let mut ids = std::collections::HashSet::new();
        for i in 0..5 {
            let (user_id, _rx) = join(&mut server, &t, &format!("user{i}"));
            assert!(ids.insert(user_id));
        }

        assert_eq!(server.store.get(&t).unwrap().users().len(), 5);
    }

    #[test]
    fn test_chat_broadcast_includes_sender() {
        let t = token('a');
        let mut server = new_server(vec![t.clone()]);
        let (alice_id, mut alice_rx) = join(&mut server, &t, "alice");
        let (_bob_id, mut bob_rx) = join(&mut server, &t, "bob");
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        server.handle_command(ServerCommand::Chat {
            user_id: alice_id,
            message_text: "hello".to_string(),
        });

        for rx in [&mut alice_rx, &mut bob_rx] {
            match rx.try_recv().unwrap() {
                ServerMessage::ChatMessage { message } => {
                    assert_eq!(message.sender_name, "alice");
                    assert_eq!(message.message_text, "hello");
                    assert_eq!(message.user_id, alice_id);
                }
                other => panic!("expected chat_message, got {other:?}"),
            }
        }
        assert_eq!(server.store.get(&t).unwrap().messages().len(), 1);
    }

    #[test]
    fn test_messages_observed_in_send_order() {
        let t = token('a');
        let mut server = new_server(vec![t.clone()]);
        let (alice_id, mut alice_rx) = join(&mut server, &t, "alice");
        let (_bob_id, mut bob_rx) = join(&mut server, &t, "bob");
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        for text in ["first", "second"] {
            server.handle_command(ServerCommand::Chat {
                user_id: alice_id,
                message_text: text.to_string(),
            });
        }

        for rx in [&mut alice_rx, &mut bob_rx] {
            for expected in ["first", "second"] {
                match rx.try_recv().unwrap() {
                    ServerMessage::ChatMessage { message } => {
                        assert_eq!(message.message_text, expected);
                    }
                    other => panic!("expected chat_message, got {other:?}"),
                }
            }
        }
    }

    #[test]
    fn test_empty_message_triggers_forced_disconnect() {
        let t = token('a');
        let mut server = new_server(vec![t.clone()]);
        let (alice_id, mut alice_rx) = join(&mut server, &t, "alice");
        let (_bob_id, mut bob_rx) = join(&mut server, &t, "bob");
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        server.handle_command(ServerCommand::Chat {
            user_id: alice_id,
            message_text: String::new(),
        });

        // Sender gets the error, then their channel closes
        match alice_rx.try_recv().unwrap() {
            ServerMessage::RequestError { error_message } => {
                assert!(!error_message.is_empty());
            }
            other => panic!("expected request_error, got {other:?}"),
        }
        assert!(matches!(
            alice_rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));

        // The rest of the room sees a normal departure; nothing was stored
        match bob_rx.try_recv().unwrap() {
            ServerMessage::UserLeft { user } => assert_eq!(user.user_name, "alice"),
            other => panic!("expected user_left, got {other:?}"),
        }
        let room = server.store.get(&t).unwrap();
        assert_eq!(room.users().len(), 1);
        assert_eq!(room.users()[0].user_name, "bob");
        assert!(room.messages().is_empty());
    }

    #[test]
    fn test_disconnect_notifies_remaining_members() {
        let t = token('a');
        let mut server = new_server(vec![t.clone()]);
        let (alice_id, mut alice_rx) = join(&mut server, &t, "alice");
        let (_bob_id, mut bob_rx) = join(&mut server, &t, "bob");
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        server.handle_command(ServerCommand::Disconnect { user_id: alice_id });

        match bob_rx.try_recv().unwrap() {
            ServerMessage::UserLeft { user } => assert_eq!(user.user_name, "alice"),
            other => panic!("expected user_left, got {other:?}"),
        }
        assert_eq!(server.store.get(&t).unwrap().users().len(), 1);
    }

    #[test]
    fn test_double_disconnect_is_noop() {
        let t = token('a');
        let mut server = new_server(vec![t.clone()]);
        let (alice_id, _alice_rx) = join(&mut server, &t, "alice");
        let (_bob_id, mut bob_rx) = join(&mut server, &t, "bob");
        drain(&mut bob_rx);

        server.handle_command(ServerCommand::Disconnect { user_id: alice_id });
        server.handle_command(ServerCommand::Disconnect { user_id: alice_id });

        // Exactly one user_left reaches bob
        assert!(matches!(
            bob_rx.try_recv(),
            Ok(ServerMessage::UserLeft { .. })
        ));
        assert!(bob_rx.try_recv().is_err());
    }

    #[test]
    fn test_user_ids_unique_across_rooms() {
        let (ta, tb) = (token('a'), token('b'));
        let mut server = new_server(vec![ta.clone(), tb.clone()]);

        let mut ids = std::collections::HashSet::new();
        for i in 0..10 {
            let room = if i % 2 == 0 { &ta } else { &tb };
            let (user_id, _rx) = join(&mut server, room, &format!("user{i}"));
            assert!(ids.insert(user_id), "duplicate user id across rooms");
        }
    }

    #[test]
    fn test_message_ids_unique_across_rooms() {
        let (ta, tb) = (token('a'), token('b'));
        let mut server = new_server(vec![ta.clone(), tb.clone()]);
        let (alice_id, _alice_rx) = join(&mut server, &ta, "alice");
        let (bob_id, _bob_rx) = join(&mut server, &tb, "bob");

        for i in 0..5 {
            server.handle_command(ServerCommand::Chat {
                user_id: alice_id,
                message_text: format!("a{i}"),
            });
            server.handle_command(ServerCommand::Chat {
                user_id: bob_id,
                message_text: format!("b{i}"),
            });
        }

        let mut ids = std::collections::HashSet::new();
        for t in [&ta, &tb] {
            for message in server.store.get(t).unwrap().messages() {
                assert!(ids.insert(message.message_id), "duplicate message id");
            }
        }
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn test_rooms_do_not_leak_events() {
        let (ta, tb) = (token('a'), token('b'));
        let mut server = new_server(vec![ta.clone(), tb.clone()]);
        let (alice_id, mut alice_rx) = join(&mut server, &ta, "alice");
        let (_carol_id, mut carol_rx) = join(&mut server, &tb, "carol");
        drain(&mut alice_rx);
        drain(&mut carol_rx);

        server.handle_command(ServerCommand::Chat {
            user_id: alice_id,
            message_text: "hello".to_string(),
        });

        assert!(matches!(
            alice_rx.try_recv(),
            Ok(ServerMessage::ChatMessage { .. })
        ));
        assert!(carol_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_commands_processed_in_order_through_channel() {
        let t = token('a');
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let server = ChatServer::new(vec![t.clone()], cmd_rx);
        tokio::spawn(server.run());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = oneshot::channel();
        cmd_tx
            .send(ServerCommand::Join {
                token: t.clone(),
                user_name: "alice".to_string(),
                sender: tx,
                reply: reply_tx,
            })
            .await
            .unwrap();
        let user_id = reply_rx.await.unwrap();
        assert!(matches!(
            rx.recv().await.unwrap(),
            ServerMessage::Connected(_)
        ));

        for text in ["one", "two", "three"] {
            cmd_tx
                .send(ServerCommand::Chat {
                    user_id,
                    message_text: text.to_string(),
                })
                .await
                .unwrap();
        }
        for expected in ["one", "two", "three"] {
            match rx.recv().await.unwrap() {
                ServerMessage::ChatMessage { message } => {
                    assert_eq!(message.message_text, expected);
                }
                other => panic!("expected chat_message, got {other:?}"),
            }
        }
    }
}
