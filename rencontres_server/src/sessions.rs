//! Registry of pending and active offer/answer sessions
//!
//! Sessions refer to their parties by [`ConnectionId`] only; the registry
//! never owns or closes a transport. The registry is not synchronised on its
//! own, the router keeps it behind a lock so that every method call is one
//! critical section.

use crate::error::SignalingError;
use rencontres_protocol::{ConnectionId, OfferId};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// The party that completed a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answerer<P> {
    pub connection: ConnectionId,
    pub payload: P,
}

/// One offer and, once answered, its answer
#[derive(Debug, Clone)]
pub struct Session<P> {
    id: OfferId,
    offerer: ConnectionId,
    offer_payload: P,
    // Connection and payload are set together, exactly once
    answerer: Option<Answerer<P>>,
    created_at: Instant,
}

impl<P> Session<P> {
    pub fn id(&self) -> &OfferId {
        &self.id
    }

    pub fn offerer(&self) -> ConnectionId {
        self.offerer
    }

    pub fn offer_payload(&self) -> &P {
        &self.offer_payload
    }

    pub fn answerer(&self) -> Option<&Answerer<P>> {
        self.answerer.as_ref()
    }

    /// `true` until an answer completes the session
    pub fn is_pending(&self) -> bool {
        self.answerer.is_none()
    }

    /// Whether `connection` is the offerer or the answerer
    pub fn involves(&self, connection: ConnectionId) -> bool {
        self.offerer == connection
            || self
                .answerer
                .as_ref()
                .is_some_and(|answerer| answerer.connection == connection)
    }

    /// The other party of `connection` in this session.
    ///
    /// `None` when `connection` is not a party, or when it is the offerer of
    /// a session nobody answered yet.
    pub fn peer_of(&self, connection: ConnectionId) -> Option<ConnectionId> {
        let answerer = self.answerer.as_ref().map(|answerer| answerer.connection);
        if connection == self.offerer {
            answerer
        } else if answerer == Some(connection) {
            Some(self.offerer)
        } else {
            None
        }
    }

    /// Time since the offer was registered
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Fill in the answering side.
    ///
    /// Returns `false`, leaving the session untouched, if it was already
    /// answered.
    pub fn complete(&mut self, connection: ConnectionId, payload: P) -> bool {
        if self.answerer.is_some() {
            return false;
        }
        self.answerer = Some(Answerer {
            connection,
            payload,
        });
        true
    }
}

/// Sessions keyed by their offer id
#[derive(Debug)]
pub struct SessionRegistry<P> {
    sessions: HashMap<OfferId, Session<P>>,
}

impl<P> Default for SessionRegistry<P> {
    fn default() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }
}

impl<P> SessionRegistry<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending session owned by `offerer`.
    ///
    /// An id already held by an active session is rejected and the existing
    /// session is left as it was.
    pub fn create(
        &mut self,
        id: OfferId,
        offer_payload: P,
        offerer: ConnectionId,
    ) -> Result<&Session<P>, SignalingError> {
        use std::collections::hash_map::Entry;

        match self.sessions.entry(id) {
            Entry::Occupied(entry) => Err(SignalingError::DuplicateOfferId(entry.key().clone())),
            Entry::Vacant(entry) => {
                let id = entry.key().clone();
                Ok(entry.insert(Session {
                    id,
                    offerer,
                    offer_payload,
                    answerer: None,
                    created_at: Instant::now(),
                }))
            }
        }
    }

    pub fn find_by_id(&self, id: &OfferId) -> Option<&Session<P>> {
        self.sessions.get(id)
    }

    pub fn find_by_id_mut(&mut self, id: &OfferId) -> Option<&mut Session<P>> {
        self.sessions.get_mut(id)
    }

    /// Remove and return a session. Removing an unknown id yields `None`.
    pub fn remove_by_id(&mut self, id: &OfferId) -> Option<Session<P>> {
        self.sessions.remove(id)
    }

    /// Every session in which `connection` takes part, pending or active
    pub fn sessions_for(&self, connection: ConnectionId) -> impl Iterator<Item = &Session<P>> {
        self.sessions
            .values()
            .filter(move |session| session.involves(connection))
    }

    /// Drop every session in which `connection` takes part.
    ///
    /// Registry-only: callers notify the other parties first.
    /// Returns how many sessions were removed.
    pub fn remove_all_for(&mut self, connection: ConnectionId) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| !session.involves(connection));
        before - self.sessions.len()
    }

    /// Remove sessions that are still unanswered after `ttl`
    pub fn remove_expired(&mut self, ttl: Duration) -> Vec<Session<P>> {
        let expired: Vec<OfferId> = self
            .sessions
            .values()
            .filter(|session| session.is_pending() && session.age() >= ttl)
            .map(|session| session.id.clone())
            .collect();

        expired
            .iter()
            .filter_map(|id| self.sessions.remove(id))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SessionRegistry<&'static str> {
        SessionRegistry::new()
    }

    #[test]
    fn create_then_find() {
        let mut sessions = registry();
        let offerer = ConnectionId::new();
        sessions.create("x".into(), "m1", offerer).unwrap();

        let session = sessions.find_by_id(&"x".into()).unwrap();
        assert_eq!(session.offerer(), offerer);
        assert_eq!(*session.offer_payload(), "m1");
        assert!(session.is_pending());
        assert!(session.answerer().is_none());
        assert_eq!(sessions.count(), 1);
    }

    #[test]
    fn duplicate_id_is_rejected_without_touching_existing_session() {
        let mut sessions = registry();
        let first = ConnectionId::new();
        let second = ConnectionId::new();
        sessions.create("x".into(), "m1", first).unwrap();

        let err = sessions.create("x".into(), "other", second).unwrap_err();
        assert!(matches!(err, SignalingError::DuplicateOfferId(id) if id.as_str() == "x"));

        let session = sessions.find_by_id(&"x".into()).unwrap();
        assert_eq!(session.offerer(), first);
        assert_eq!(*session.offer_payload(), "m1");
        assert_eq!(sessions.count(), 1);
    }

    #[test]
    fn id_can_be_reused_after_removal() {
        let mut sessions = registry();
        let offerer = ConnectionId::new();
        sessions.create("x".into(), "m1", offerer).unwrap();
        sessions.remove_by_id(&"x".into()).unwrap();
        assert!(sessions.create("x".into(), "m2", offerer).is_ok());
    }

    #[test]
    fn remove_is_idempotent() {
        let mut sessions = registry();
        sessions.create("x".into(), "m1", ConnectionId::new()).unwrap();

        assert!(sessions.remove_by_id(&"x".into()).is_some());
        assert!(sessions.remove_by_id(&"x".into()).is_none());
        assert!(sessions.find_by_id(&"x".into()).is_none());
        assert_eq!(sessions.count(), 0);
    }

    #[test]
    fn complete_only_once() {
        let mut sessions = registry();
        let (offerer, first, second) = (ConnectionId::new(), ConnectionId::new(), ConnectionId::new());
        sessions.create("x".into(), "m1", offerer).unwrap();

        let session = sessions.find_by_id_mut(&"x".into()).unwrap();
        assert!(session.complete(first, "m2"));
        assert!(!session.complete(second, "m3"));

        let answerer = session.answerer().unwrap();
        assert_eq!(answerer.connection, first);
        assert_eq!(answerer.payload, "m2");
        assert!(!session.is_pending());
    }

    #[test]
    fn peer_of_follows_roles() {
        let mut sessions = registry();
        let (offerer, answerer, stranger) = (ConnectionId::new(), ConnectionId::new(), ConnectionId::new());
        sessions.create("x".into(), "m1", offerer).unwrap();

        let session = sessions.find_by_id_mut(&"x".into()).unwrap();
        assert_eq!(session.peer_of(offerer), None);
        assert_eq!(session.peer_of(answerer), None);

        assert!(session.complete(answerer, "m2"));
        assert_eq!(session.peer_of(offerer), Some(answerer));
        assert_eq!(session.peer_of(answerer), Some(offerer));
        assert_eq!(session.peer_of(stranger), None);
        assert!(!session.involves(stranger));
    }

    #[test]
    fn sessions_for_covers_both_roles() {
        let mut sessions = registry();
        let (a, b, c) = (ConnectionId::new(), ConnectionId::new(), ConnectionId::new());
        sessions.create("a-offers".into(), "m", a).unwrap();
        sessions.create("b-offers".into(), "m", b).unwrap();
        sessions.create("c-offers".into(), "m", c).unwrap();
        assert!(sessions.find_by_id_mut(&"b-offers".into()).unwrap().complete(a, "r"));

        let mut ids: Vec<&str> = sessions.sessions_for(a).map(|s| s.id().as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a-offers", "b-offers"]);

        assert_eq!(sessions.remove_all_for(a), 2);
        assert_eq!(sessions.count(), 1);
        assert!(sessions.find_by_id(&"c-offers".into()).is_some());
        assert_eq!(sessions.sessions_for(a).count(), 0);
    }

    #[test]
    fn remove_all_for_unknown_connection_is_noop() {
        let mut sessions = registry();
        sessions.create("x".into(), "m", ConnectionId::new()).unwrap();
        assert_eq!(sessions.remove_all_for(ConnectionId::new()), 0);
        assert_eq!(sessions.count(), 1);
    }

    #[test]
    fn expiry_only_takes_pending_sessions() {
        let mut sessions = registry();
        let (a, b) = (ConnectionId::new(), ConnectionId::new());
        sessions.create("pending".into(), "m", a).unwrap();
        sessions.create("active".into(), "m", a).unwrap();
        assert!(sessions.find_by_id_mut(&"active".into()).unwrap().complete(b, "r"));

        let expired = sessions.remove_expired(Duration::ZERO);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id().as_str(), "pending");
        assert!(sessions.find_by_id(&"active".into()).is_some());
    }

    #[test]
    fn expiry_respects_ttl() {
        let mut sessions = registry();
        sessions.create("x".into(), "m", ConnectionId::new()).unwrap();
        assert!(sessions.remove_expired(Duration::from_secs(3600)).is_empty());
        assert_eq!(sessions.count(), 1);
    }
}
