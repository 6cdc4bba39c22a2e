//! WebSocket handler: per-connection relay loop.
//!
//! DESIGN
//! ======
//! On upgrade, registers the connection and enters a `select!` loop:
//! - Incoming client frames → decode + dispatch to the session handlers
//! - Outbound queue items → forward to the client (JSON or transport ping)
//! - Eviction signal from the liveness monitor → drop the socket
//!
//! Handlers never write to the socket. Everything a client receives, its own
//! acknowledgements included, goes through its outbound queue, so per-client
//! ordering is the order handlers enqueued it.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → fresh player identity, no session
//! 2. Client sends frames → validate → dispatch
//! 3. Malformed frame → close 1008 "Protocol violation"
//! 4. Close handshake completes (either side) before the socket is dropped
//! 5. Close, error, violation, or eviction → disconnect cleanup

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tower_http::services::ServeFile;
use tracing::{debug, info, warn};

use crate::protocol::{self, ClientMessage, ErrorCode, POLICY_VIOLATION_REASON, PlayerId, ProtocolError};
use crate::services::connection::Accepted;
use crate::services::game;
use crate::state::{AppState, Outbound, Outbox};

// =============================================================================
// UPGRADE
// =============================================================================

/// How long to wait for the peer's side of a close handshake.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// `GET /`: websocket upgrade, or the client's `index.html` for plain HTTP
/// when static serving is enabled.
pub async fn handle_ws(
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    request: Request,
) -> Response {
    match ws {
        Ok(ws) => ws.on_upgrade(move |socket| run_ws(socket, state)),
        Err(rejection) => match &state.config.static_dir {
            Some(dir) => match ServeFile::new(dir.join("index.html")).try_call(request).await {
                Ok(response) => response.into_response(),
                Err(e) => {
                    warn!(error = %e, dir = %dir.display(), "static: failed to serve index.html");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            },
            None => rejection.into_response(),
        },
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let Accepted { player_id, outbox, mut inbox, evicted } =
        state.connections.on_accept().await;
    info!(%player_id, "ws: client connected");

    let reason = loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break "closed" };
                let result = match msg {
                    Message::Text(text) => process_inbound_text(&state, &player_id, &outbox, text.as_str()).await,
                    Message::Binary(bytes) => process_inbound_binary(&state, &player_id, &outbox, &bytes).await,
                    Message::Pong(_) => {
                        state.connections.mark_alive(&player_id).await;
                        Ok(())
                    }
                    Message::Ping(_) => Ok(()),
                    Message::Close(_) => {
                        finish_close(&mut socket).await;
                        break "closed";
                    }
                };
                if let Err(e) = result {
                    warn!(%player_id, code = e.error_code(), error = %e, "ws: protocol violation");
                    if socket.send(policy_close()).await.is_ok() {
                        finish_close(&mut socket).await;
                    }
                    break "protocol violation";
                }
            }
            Some(item) = inbox.recv() => {
                if send_outbound(&mut socket, &player_id, item).await.is_err() {
                    break "send failed";
                }
            }
            () = evicted.notified() => break "evicted",
        }
    };
    drop(socket);

    game::disconnect(&state, &player_id).await;
    info!(%player_id, reason, "ws: client disconnected");
}

fn policy_close() -> Message {
    Message::Close(Some(CloseFrame { code: close_code::POLICY, reason: POLICY_VIOLATION_REASON.into() }))
}

/// Poll the socket until the transport reports the close handshake done.
/// Reading is what flushes the automatic close reply to a peer-initiated close.
async fn finish_close(socket: &mut WebSocket) {
    let drained = tokio::time::timeout(CLOSE_HANDSHAKE_TIMEOUT, async {
        while let Some(Ok(_)) = socket.recv().await {}
    })
    .await;
    if drained.is_err() {
        debug!("ws: close handshake timed out");
    }
}

// =============================================================================
// INBOUND
// =============================================================================

/// Decode one text frame and dispatch it.
///
/// # Errors
///
/// Returns the `ProtocolError` that should close the connection.
pub(crate) async fn process_inbound_text(
    state: &AppState,
    player_id: &PlayerId,
    outbox: &Outbox,
    text: &str,
) -> Result<(), ProtocolError> {
    let msg = protocol::decode(text)?;
    dispatch(state, player_id, outbox, msg).await;
    Ok(())
}

/// Binary frames carry the same UTF-8 JSON as text frames.
///
/// # Errors
///
/// Returns the `ProtocolError` that should close the connection.
pub(crate) async fn process_inbound_binary(
    state: &AppState,
    player_id: &PlayerId,
    outbox: &Outbox,
    bytes: &[u8],
) -> Result<(), ProtocolError> {
    let msg = protocol::decode_binary(bytes)?;
    dispatch(state, player_id, outbox, msg).await;
    Ok(())
}

async fn dispatch(state: &AppState, player_id: &PlayerId, outbox: &Outbox, msg: ClientMessage) {
    match &msg {
        ClientMessage::Update { .. } | ClientMessage::Shoot { .. } | ClientMessage::Ping => {
            debug!(%player_id, kind = msg.kind(), "ws: recv");
        }
        _ => info!(%player_id, kind = msg.kind(), "ws: recv"),
    }
    game::dispatch(state, player_id, outbox, msg).await;
}

// =============================================================================
// OUTBOUND
// =============================================================================

async fn send_outbound(socket: &mut WebSocket, player_id: &str, item: Outbound) -> Result<(), axum::Error> {
    let msg = match item {
        Outbound::Message(msg) => match protocol::encode(&msg) {
            Ok(json) => Message::Text(json.into()),
            Err(e) => {
                warn!(%player_id, kind = msg.kind(), error = %e, "ws: failed to serialize message");
                return Ok(());
            }
        },
        Outbound::Ping => Message::Ping(Bytes::new()),
    };
    socket.send(msg).await
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
