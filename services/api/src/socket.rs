//! WebSocket transport for interview sessions.

use crate::state::AppState;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use interview_core::{EventSink, InterviewSession};
use interview_types::ClientMessage;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, warn};

const INBOUND_CAPACITY: usize = 256;
const OUTBOUND_CAPACITY: usize = 256;

/// Handles WebSocket upgrade requests.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Runs one interview over an established connection.
///
/// The socket is split between a reader task that parses client messages
/// and a writer task that serializes session events. The session itself
/// runs on this task until the client goes away.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (events, mut outbound) = EventSink::channel(OUTBOUND_CAPACITY);
    let session = InterviewSession::new(state.session.clone(), (state.collaborators)(), events);
    let span = tracing::info_span!("session", id = %session.id());
    span.in_scope(|| info!("WebSocket connection established"));

    let (mut sender, mut receiver) = socket.split();
    let (inbound_tx, inbound_rx) = mpsc::channel::<ClientMessage>(INBOUND_CAPACITY);

    let writer = tokio::spawn(
        async move {
            while let Some(event) = outbound.recv().await {
                let text = match event.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("failed to serialize {} event: {}", event.kind(), e);
                        continue;
                    }
                };
                if let Err(e) = sender.send(Message::Text(text.into())).await {
                    debug!("failed to send to client: {}", e);
                    break;
                }
            }
            let _ = sender.close().await;
        }
        .instrument(span.clone()),
    );

    let reader = tokio::spawn(
        async move {
            while let Some(frame) = receiver.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<ClientMessage>(text.as_str()) {
                            Ok(message) => {
                                if inbound_tx.send(message).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("ignoring malformed client message: {}", e),
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!("WebSocket error: {}", e);
                        break;
                    }
                }
            }
        }
        .instrument(span.clone()),
    );

    session.run(inbound_rx).instrument(span.clone()).await;
    reader.abort();
    // Every event sink is gone once the session is, so the writer drains and exits.
    let _ = writer.await;
    span.in_scope(|| info!("WebSocket connection closed"));
}
