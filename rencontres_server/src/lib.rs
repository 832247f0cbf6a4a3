//! Rendezvous relay for establishing WebRTC peer-to-peer connections
//!
//! Clients hold a WebSocket to the relay. One client publishes an offer under
//! an id of its choosing, every other client hears about it, and the first
//! one to answer is paired with the offerer. From then on the relay forwards
//! messages between the two until either side closes or disconnects.
//!
//! # Protocol
//!
//! Every text frame carries one JSON envelope `{"type": ..., "data": ...}`:
//!
//! | type (in) | data | relay emits |
//! |---|---|---|
//! | `offer` | `offerId`, `offerMessage` | `offer` to every other connection |
//! | `answer` | `offerId`, `answerMessage` | `answer` to the offerer and `confirmation {status: true, offerMessage}` to the sender, or `confirmation {status: false}` if the offer is unknown or taken |
//! | `dataMessage` | `offerId`, `payload` | `dataMessage` to the other party |
//! | `close` | `offerId` | `close` to the other party |
//!
//! A disconnect sends `close` to the remaining party of every session the
//! connection took part in. Payloads are opaque and passed through as-is.
//!
//! # Example
//!
//! ```bash
//! # Start the relay
//! rencontres --port 8999
//!
//! # Talk to it
//! websocat ws://127.0.0.1:8999/signal
//! {"type":"offer","data":{"offerId":"x","offerMessage":"m1"}}
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod connections;
pub mod error;
pub mod handler;
pub mod router;
pub mod sessions;
pub mod state;

pub use config::ServerConfig;
pub use error::{ClientRequestError, SignalingError};
pub use handler::{app, serve};
pub use router::MessageRouter;
pub use state::ServerState;
