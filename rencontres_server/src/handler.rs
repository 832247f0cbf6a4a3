//! HTTP and WebSocket handlers for the relay
//!
//! Clients upgrade `GET /signal` to a WebSocket. Each socket gets its own
//! task that decodes frames and feeds them to the [`MessageRouter`], plus a
//! writer task draining the connection's outbound queue, so a slow reader
//! never holds up anyone else.
//!
//! [`MessageRouter`]: crate::router::MessageRouter

use crate::connections::PeerConnection;
use crate::error::{ClientRequestError, SignalingError};
use crate::state::{HealthResponse, ServerState};
use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use futures::{SinkExt, Stream, StreamExt};
use rencontres_protocol::{ConnectionId, JsonClientMessage};
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

const INFO_PAGE: &str = "rencontres signaling relay\n\
    \n\
    Endpoints:\n\
    - GET /health - Health check\n\
    - GET /signal - WebSocket relay endpoint\n\
    \n\
    Protocol (one JSON envelope {\"type\", \"data\"} per text frame):\n\
    - offer {offerId, offerMessage} - announced to every other client\n\
    - answer {offerId, answerMessage} - forwarded to the offerer, confirmed to you\n\
    - dataMessage {offerId, payload} - forwarded to the other party\n\
    - close {offerId} - forwarded to the other party\n";

/// Build the HTTP router with all routes
pub fn app(state: ServerState) -> Router {
    Router::new()
        .route("/", get(info_page))
        .route("/health", get(health))
        .route("/signal", get(signal))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the relay on an already bound listener until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    state: ServerState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), SignalingError> {
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn info_page() -> &'static str {
    INFO_PAGE
}

async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(state.health())
}

async fn signal(ws: WebSocketUpgrade, State(state): State<ServerState>) -> Response {
    ws.max_message_size(state.config().max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
        .into_response()
}

/// Drive one connection from upgrade to cleanup
async fn handle_socket(socket: WebSocket, state: ServerState) {
    let id = ConnectionId::new();
    let router = Arc::clone(state.router());
    let (tx, mut rx) = mpsc::channel::<Arc<String>>(state.config().outbound_buffer.max(1));
    let (mut sink, mut stream) = socket.split();

    router.connect(Arc::new(PeerConnection::new(id, tx)));

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = sink.send(Message::Text(frame.as_str().into())).await {
                debug!(conn_id = %id, error = %e, "write failed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        match next_request(&mut stream).await {
            Ok(Some(request)) => router.handle(id, request),
            Ok(None) => {}
            Err(ClientRequestError::Malformed(e)) => {
                warn!(conn_id = %id, error = %e, "dropping malformed message");
            }
            Err(ClientRequestError::BinaryFrame) => {
                warn!(conn_id = %id, "dropping binary frame");
            }
            Err(ClientRequestError::Closed) => break,
            Err(e @ ClientRequestError::Transport(_)) => {
                warn!(conn_id = %id, error = %e, "closing connection");
                break;
            }
        }
    }

    router.disconnect(id);
    writer.abort();
}

/// Read the next frame and decode it.
///
/// `Ok(None)` stands for control frames with nothing to route.
async fn next_request<S>(stream: &mut S) -> Result<Option<JsonClientMessage>, ClientRequestError>
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    match stream.next().await {
        Some(Ok(message)) => parse_frame(message),
        Some(Err(e)) => Err(ClientRequestError::Transport(e.to_string())),
        None => Err(ClientRequestError::Closed),
    }
}

fn parse_frame(message: Message) -> Result<Option<JsonClientMessage>, ClientRequestError> {
    match message {
        Message::Text(text) => Ok(Some(JsonClientMessage::from_str(text.as_str())?)),
        Message::Binary(_) => Err(ClientRequestError::BinaryFrame),
        Message::Ping(_) | Message::Pong(_) => Ok(None),
        Message::Close(_) => Err(ClientRequestError::Closed),
    }
}
