//! Live transport connections and their outbound queues

use crate::error::SignalingError;
use rencontres_protocol::{ConnectionId, JsonServerMessage};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Sending half of one connection.
///
/// Sends never wait: a full or closed queue drops the message. The socket
/// itself is owned by the connection's task, dropping this handle does not
/// close it.
#[derive(Debug)]
pub struct PeerConnection {
    id: ConnectionId,
    tx: mpsc::Sender<Arc<String>>,
    dropped: AtomicU64,
}

impl PeerConnection {
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            tx,
            dropped: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue an already encoded frame
    pub fn send(&self, frame: Arc<String>) -> Result<(), SignalingError> {
        self.tx.try_send(frame).map_err(|e| {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "outbound queue full",
                mpsc::error::TrySendError::Closed(_) => "connection closed",
            };
            SignalingError::SendError(format!("{reason} ({})", self.id))
        })
    }

    /// Encode and queue a relay event
    pub fn send_message(&self, message: &JsonServerMessage) -> Result<(), SignalingError> {
        self.send(Arc::new(message.to_json()?))
    }

    /// Messages lost to a full or closed queue
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Every connection currently attached to the relay
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Arc<PeerConnection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if a connection with the same id was replaced
    pub fn add(&mut self, connection: Arc<PeerConnection>) -> bool {
        self.connections
            .insert(connection.id(), connection)
            .is_none()
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<Arc<PeerConnection>> {
        self.connections.remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Arc<PeerConnection>> {
        self.connections.get(&id)
    }

    /// Call `f` once for every connection except `excluding`, in no
    /// particular order
    pub fn for_each_other(&self, excluding: ConnectionId, mut f: impl FnMut(&PeerConnection)) {
        self.connections
            .values()
            .filter(|connection| connection.id() != excluding)
            .for_each(|connection| f(connection.as_ref()));
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }
}
