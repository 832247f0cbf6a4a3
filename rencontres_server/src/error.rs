//! Error types for the signaling relay

use rencontres_protocol::OfferId;
use thiserror::Error;

/// Errors raised while routing between connections
#[derive(Error, Debug)]
pub enum SignalingError {
    /// An active session already uses this offer id
    #[error("Offer id already in use: {0}")]
    DuplicateOfferId(OfferId),

    /// Failed to queue a message for a peer
    #[error("Failed to send message: {0}")]
    SendError(String),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Listener I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why an inbound frame did not yield a request
#[derive(Error, Debug)]
pub enum ClientRequestError {
    /// The peer closed the socket or the stream ended
    #[error("Connection closed")]
    Closed,

    /// The frame was not a valid message envelope
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Binary frames carry no envelope
    #[error("Binary frames are not supported")]
    BinaryFrame,

    /// The transport failed underneath the socket
    #[error("WebSocket error: {0}")]
    Transport(String),
}
