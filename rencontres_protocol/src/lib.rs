//! Wire contracts for the rencontres signaling relay.
//!
//! Every frame on the relay socket carries exactly one envelope of the form
//! `{"type": "<kind>", "data": {...}}`. Clients send [`ClientMessage`]s and the
//! relay answers with [`ServerMessage`]s. Both are generic over the payload
//! type so the relay never has to look inside negotiation data; enable the
//! `json` feature for the [`serde_json::Value`] flavoured aliases used on the
//! wire.
//!
//! ```text
//! -> {"type":"offer","data":{"offerId":"x","offerMessage":"m1"}}
//! <- {"type":"confirmation","data":{"offerId":"x","status":true,"offerMessage":"m1"}}
//! ```

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "json")]
mod json;
#[cfg(feature = "json")]
pub use json::*;

/// Application-chosen identifier of an offer/answer session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferId(pub String);

impl OfferId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OfferId {
    fn from(id: &str) -> Self {
        OfferId(id.to_string())
    }
}

impl From<String> for OfferId {
    fn from(id: String) -> Self {
        OfferId(id)
    }
}

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Relay-side handle identifying one transport connection.
///
/// Never sent over the wire; the relay does not reveal peer identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub uuid::Uuid);

impl ConnectionId {
    /// Allocate a fresh random id
    pub fn new() -> Self {
        ConnectionId(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<uuid::Uuid> for ConnectionId {
    fn from(uuid: uuid::Uuid) -> Self {
        ConnectionId(uuid)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Requests sent from a client to the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientMessage<P> {
    /// Publish a new offer to every other connected client
    #[serde(rename_all = "camelCase")]
    Offer { offer_id: OfferId, offer_message: P },
    /// Claim a pending offer
    #[serde(rename_all = "camelCase")]
    Answer { offer_id: OfferId, answer_message: P },
    /// Post-negotiation traffic for the other party of a session
    #[serde(rename_all = "camelCase")]
    DataMessage { offer_id: OfferId, payload: P },
    /// Cooperative teardown of a session
    #[serde(rename_all = "camelCase")]
    Close { offer_id: OfferId },
}

impl<P> ClientMessage<P> {
    /// Session the message refers to
    pub fn offer_id(&self) -> &OfferId {
        match self {
            ClientMessage::Offer { offer_id, .. }
            | ClientMessage::Answer { offer_id, .. }
            | ClientMessage::DataMessage { offer_id, .. }
            | ClientMessage::Close { offer_id } => offer_id,
        }
    }

    /// The `type` tag used on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Offer { .. } => "offer",
            ClientMessage::Answer { .. } => "answer",
            ClientMessage::DataMessage { .. } => "dataMessage",
            ClientMessage::Close { .. } => "close",
        }
    }
}

/// Events sent from the relay to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerMessage<P> {
    /// Another client published an offer
    #[serde(rename_all = "camelCase")]
    Offer { offer_id: OfferId, offer_message: P },
    /// Your offer was answered
    #[serde(rename_all = "camelCase")]
    Answer { offer_id: OfferId, answer_message: P },
    /// Outcome of your answer; carries the offerer's payload on success
    #[serde(rename_all = "camelCase")]
    Confirmation {
        offer_id: OfferId,
        status: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offer_message: Option<P>,
    },
    /// Traffic from the other party of a session
    #[serde(rename_all = "camelCase")]
    DataMessage { offer_id: OfferId, payload: P },
    /// The session is gone
    #[serde(rename_all = "camelCase")]
    Close { offer_id: OfferId },
}

impl<P> ServerMessage<P> {
    /// Session the message refers to
    pub fn offer_id(&self) -> &OfferId {
        match self {
            ServerMessage::Offer { offer_id, .. }
            | ServerMessage::Answer { offer_id, .. }
            | ServerMessage::Confirmation { offer_id, .. }
            | ServerMessage::DataMessage { offer_id, .. }
            | ServerMessage::Close { offer_id } => offer_id,
        }
    }

    /// The `type` tag used on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Offer { .. } => "offer",
            ServerMessage::Answer { .. } => "answer",
            ServerMessage::Confirmation { .. } => "confirmation",
            ServerMessage::DataMessage { .. } => "dataMessage",
            ServerMessage::Close { .. } => "close",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_id_is_a_bare_string_on_the_wire() {
        let json = serde_json::to_string(&OfferId::from("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }

    #[test]
    fn client_message_tags_use_camel_case() {
        let message: ClientMessage<String> = serde_json::from_str(
            r#"{"type":"dataMessage","data":{"offerId":"x","payload":"ice"}}"#,
        )
        .unwrap();
        assert_eq!(
            message,
            ClientMessage::DataMessage {
                offer_id: "x".into(),
                payload: "ice".to_string(),
            }
        );
        assert_eq!(message.kind(), "dataMessage");
        assert_eq!(message.offer_id().as_str(), "x");
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result: Result<ClientMessage<String>, _> =
            serde_json::from_str(r#"{"type":"renegotiate","data":{"offerId":"x"}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn missing_field_is_rejected() {
        let result: Result<ClientMessage<String>, _> =
            serde_json::from_str(r#"{"type":"answer","data":{"offerId":"x"}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn failed_confirmation_omits_offer_message() {
        let message: ServerMessage<String> = ServerMessage::Confirmation {
            offer_id: "x".into(),
            status: false,
            offer_message: None,
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "confirmation", "data": {"offerId": "x", "status": false}})
        );
    }

    #[test]
    fn confirmation_without_offer_message_parses() {
        let message: ServerMessage<String> = serde_json::from_str(
            r#"{"type":"confirmation","data":{"offerId":"x","status":false}}"#,
        )
        .unwrap();
        assert!(matches!(
            message,
            ServerMessage::Confirmation { status: false, offer_message: None, .. }
        ));
    }

    #[test]
    fn connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }
}
