//! `WebSocket` handler for the push-only observer channel.
//!
//! Clients connect to `GET /ws`. On upgrade the connection is registered
//! with the hub, which queues an `init` frame carrying the current state;
//! after that the client receives one text frame per applied report.
//!
//! When the registry is full the upgrade still completes, but the socket
//! is closed straight away with code 1013 ("try again later").

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin streaming
/// state updates.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_observe(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Handle the `WebSocket` lifecycle: register, forward frames, and
/// unregister on disconnect or delivery failure.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let mut session = match state.dashboard.connect_observer() {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "Refusing WebSocket observer");
            let close = Message::Close(Some(CloseFrame {
                code: close_code::AGAIN,
                reason: "observer capacity reached".into(),
            }));
            if socket.send(close).await.is_err() {
                debug!("Refused observer already gone");
            }
            return;
        }
    };

    info!(observer = %session.id(), "WebSocket observer connected");

    loop {
        tokio::select! {
            // Next frame queued by the hub.
            frame = session.next_frame() => {
                let Some(frame) = frame else {
                    debug!(observer = %session.id(), "Observer dropped by hub");
                    if socket.send(Message::Close(None)).await.is_err() {
                        debug!(observer = %session.id(), "Close frame not delivered");
                    }
                    break;
                };
                // Shares the hub's buffer; only the UTF-8 check touches the bytes.
                let text = match Utf8Bytes::try_from(frame) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(observer = %session.id(), error = %e, "Skipping non-UTF-8 frame");
                        continue;
                    }
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    debug!(observer = %session.id(), "WebSocket client disconnected (send failed)");
                    break;
                }
            }
            // Inbound traffic: only close and ping matter.
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(observer = %session.id(), "WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(observer = %session.id(), "WebSocket client disconnected (pong failed)");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(observer = %session.id(), "WebSocket error: {e}");
                        break;
                    }
                    _ => {
                        // Push-only channel: text and binary from the client are ignored.
                    }
                }
            }
        }
    }

    session.close();
    info!(observer = %session.id(), "WebSocket observer disconnected");
}
