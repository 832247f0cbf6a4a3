use crate::{ClientMessage, ServerMessage};
use std::str::FromStr;

/// A client request whose payloads are arbitrary JSON values
pub type JsonClientMessage = ClientMessage<serde_json::Value>;

/// A relay event whose payloads are arbitrary JSON values
pub type JsonServerMessage = ServerMessage<serde_json::Value>;

impl JsonServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl FromStr for JsonClientMessage {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

impl FromStr for JsonServerMessage {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}
