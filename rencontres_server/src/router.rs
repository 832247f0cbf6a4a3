//! Offer/answer state machine
//!
//! The router owns both registries and decides, for every inbound request,
//! which registry mutation happens and which connections hear about it.
//! Each registry sits behind its own lock and every lock is held for one
//! registry operation at most; sends happen after the session lock is
//! released and never wait on the receiving connection.

use crate::connections::{ConnectionRegistry, PeerConnection};
use crate::sessions::{Session, SessionRegistry};
use parking_lot::Mutex;
use rencontres_protocol::{ClientMessage, ConnectionId, JsonClientMessage, JsonServerMessage, OfferId};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Routes requests between the parties of each session
#[derive(Debug, Default)]
pub struct MessageRouter {
    sessions: Mutex<SessionRegistry<Value>>,
    connections: Mutex<ConnectionRegistry>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a connection reachable for routing and offer announcements
    pub fn connect(&self, connection: Arc<PeerConnection>) {
        let id = connection.id();
        let mut connections = self.connections.lock();
        if !connections.add(connection) {
            warn!(conn_id = %id, "replaced a connection registered under the same id");
        }
        info!(conn_id = %id, connections = connections.count(), "connection registered");
    }

    /// Process one decoded request from `sender`
    pub fn handle(&self, sender: ConnectionId, message: JsonClientMessage) {
        debug!(conn_id = %sender, kind = message.kind(), offer_id = %message.offer_id(), "request");

        match message {
            ClientMessage::Offer {
                offer_id,
                offer_message,
            } => self.offer(sender, offer_id, offer_message),
            ClientMessage::Answer {
                offer_id,
                answer_message,
            } => self.answer(sender, offer_id, answer_message),
            ClientMessage::DataMessage { offer_id, payload } => {
                self.data_message(sender, offer_id, payload)
            }
            ClientMessage::Close { offer_id } => self.close(sender, offer_id),
        }
    }

    fn offer(&self, sender: ConnectionId, offer_id: OfferId, offer_message: Value) {
        {
            let mut sessions = self.sessions.lock();
            if let Err(e) = sessions.create(offer_id.clone(), offer_message.clone(), sender) {
                warn!(conn_id = %sender, error = %e, "offer rejected");
                return;
            }
            info!(conn_id = %sender, offer_id = %offer_id, sessions = sessions.count(), "offer registered");
        }

        self.broadcast_from(
            sender,
            &JsonServerMessage::Offer {
                offer_id,
                offer_message,
            },
        );
    }

    fn answer(&self, sender: ConnectionId, offer_id: OfferId, answer_message: Value) {
        // Decide the outcome under the lock, send once it is released
        let outbound = {
            let mut sessions = self.sessions.lock();
            match sessions.find_by_id_mut(&offer_id) {
                None => {
                    info!(conn_id = %sender, offer_id = %offer_id, "answer to unknown offer");
                    vec![(sender, rejection(offer_id))]
                }
                Some(session) => {
                    // Only the first answer fills the slot
                    if session.complete(sender, answer_message.clone()) {
                        info!(conn_id = %sender, offer_id = %offer_id, "offer answered");
                        vec![
                            (
                                session.offerer(),
                                JsonServerMessage::Answer {
                                    offer_id: offer_id.clone(),
                                    answer_message,
                                },
                            ),
                            (
                                sender,
                                JsonServerMessage::Confirmation {
                                    offer_id,
                                    status: true,
                                    offer_message: Some(session.offer_payload().clone()),
                                },
                            ),
                        ]
                    } else {
                        // Already answered, the session is left as is
                        info!(conn_id = %sender, offer_id = %offer_id, "offer already answered");
                        vec![(sender, rejection(offer_id))]
                    }
                }
            }
        };

        for (recipient, message) in outbound {
            self.deliver(recipient, &message);
        }
    }

    fn data_message(&self, sender: ConnectionId, offer_id: OfferId, payload: Value) {
        let recipient = {
            let sessions = self.sessions.lock();
            let Some(session) = sessions.find_by_id(&offer_id) else {
                debug!(conn_id = %sender, offer_id = %offer_id, "data message for unknown session");
                return;
            };
            // Never echo back to the sender, even on a self-answered session
            match session.peer_of(sender) {
                Some(peer) if peer != sender => peer,
                _ if session.involves(sender) => {
                    debug!(conn_id = %sender, offer_id = %offer_id, "data message with no peer to receive it");
                    return;
                }
                _ => {
                    warn!(conn_id = %sender, offer_id = %offer_id, "data message from a connection outside the session");
                    return;
                }
            }
        };

        self.deliver(recipient, &JsonServerMessage::DataMessage { offer_id, payload });
    }

    fn close(&self, sender: ConnectionId, offer_id: OfferId) {
        let removed = self.sessions.lock().remove_by_id(&offer_id);
        let Some(session) = removed else {
            debug!(conn_id = %sender, offer_id = %offer_id, "close for unknown session");
            return;
        };

        if !session.involves(sender) {
            warn!(conn_id = %sender, offer_id = %offer_id, "session closed by a connection outside it");
        }
        info!(conn_id = %sender, offer_id = %offer_id, sessions = self.session_count(), "session closed");

        let notice = JsonServerMessage::Close { offer_id };
        for party in parties(&session).filter(|party| *party != sender) {
            self.deliver(party, &notice);
        }
    }

    /// Tear down everything `connection` took part in.
    ///
    /// The remaining party of each of its sessions receives a `close`. The
    /// peers are collected and the sessions purged inside one critical
    /// section, so no session can be completed in between.
    pub fn disconnect(&self, connection: ConnectionId) {
        // Unregister first so nothing new is queued for this connection
        let connections = {
            let mut registry = self.connections.lock();
            let _ = registry.remove(connection);
            registry.count()
        };

        let (notices, removed, remaining) = {
            let mut sessions = self.sessions.lock();
            // Capture the other party of each session before purging.
            // A self-answered session has no other party.
            let notices: Vec<(ConnectionId, OfferId)> = sessions
                .sessions_for(connection)
                .filter_map(|session| {
                    session
                        .peer_of(connection)
                        .filter(|peer| *peer != connection)
                        .map(|peer| (peer, session.id().clone()))
                })
                .collect();
            let removed = sessions.remove_all_for(connection);
            (notices, removed, sessions.count())
        };

        // Tell the survivors
        for (peer, offer_id) in notices {
            self.deliver(peer, &JsonServerMessage::Close { offer_id });
        }

        info!(
            conn_id = %connection,
            removed,
            connections,
            sessions = remaining,
            "connection closed"
        );
    }

    /// Drop offers nobody answered within `ttl`, telling their offerers.
    ///
    /// Returns the number of offers dropped.
    pub fn expire_pending(&self, ttl: Duration) -> usize {
        let expired = self.sessions.lock().remove_expired(ttl);
        for session in &expired {
            self.deliver(
                session.offerer(),
                &JsonServerMessage::Close {
                    offer_id: session.id().clone(),
                },
            );
        }
        if !expired.is_empty() {
            info!(expired = expired.len(), sessions = self.session_count(), "expired pending offers");
        }
        expired.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().count()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().count()
    }

    /// Run `f` against a session while holding the registry lock
    pub fn with_session<R>(&self, id: &OfferId, f: impl FnOnce(&Session<Value>) -> R) -> Option<R> {
        self.sessions.lock().find_by_id(id).map(f)
    }

    fn broadcast_from(&self, sender: ConnectionId, message: &JsonServerMessage) {
        let frame = match message.to_json() {
            Ok(json) => Arc::new(json),
            Err(e) => {
                warn!(kind = message.kind(), error = %e, "failed to encode message");
                return;
            }
        };

        let connections = self.connections.lock();
        let mut recipients = 0usize;
        connections.for_each_other(sender, |connection| {
            recipients += 1;
            if let Err(e) = connection.send(Arc::clone(&frame)) {
                warn!(conn_id = %connection.id(), error = %e, drops = connection.drop_count(), "announcement dropped");
            }
        });
        debug!(kind = message.kind(), offer_id = %message.offer_id(), recipients, "broadcast");
    }

    fn deliver(&self, recipient: ConnectionId, message: &JsonServerMessage) {
        let connection = self.connections.lock().get(recipient).cloned();
        let Some(connection) = connection else {
            debug!(
                conn_id = %recipient,
                kind = message.kind(),
                offer_id = %message.offer_id(),
                "recipient no longer connected, message dropped"
            );
            return;
        };

        if let Err(e) = connection.send_message(message) {
            warn!(
                conn_id = %recipient,
                kind = message.kind(),
                offer_id = %message.offer_id(),
                error = %e,
                "message dropped"
            );
        }
    }
}

fn rejection(offer_id: OfferId) -> JsonServerMessage {
    JsonServerMessage::Confirmation {
        offer_id,
        status: false,
        offer_message: None,
    }
}

/// Offerer, then the answerer if it is a different connection
fn parties<P>(session: &Session<P>) -> impl Iterator<Item = ConnectionId> {
    let offerer = session.offerer();
    std::iter::once(offerer).chain(
        session
            .answerer()
            .map(|answerer| answerer.connection)
            .filter(|connection| *connection != offerer),
    )
}
