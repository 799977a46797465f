//! WebSocket upgrade and connection handling.
//!
//! Browsers cannot set an `Authorization` header on a WebSocket handshake,
//! so the session token travels as the `token` query parameter. The session
//! is checked again before every forwarded event and on a timer; once it is
//! gone (logout, expiry, account deletion) the socket is closed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::auth::hash_session_token;
use crate::logging::short_id;
use crate::web_client::config::{MAX_WS_CONNECTIONS, WS_SESSION_CHECK_SECS};
use crate::web_client::state::{AddressedEvent, SharedState};
use crate::web_client::utils::{api_error, authenticate_token, now_secs};

#[derive(Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// One unit of the connection cap, released when dropped.
struct ConnectionSlot(Arc<AtomicUsize>);

impl ConnectionSlot {
    fn reserve(count: &Arc<AtomicUsize>) -> Option<Self> {
        count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < MAX_WS_CONNECTIONS).then_some(n + 1)
            })
            .ok()?;
        Some(Self(Arc::clone(count)))
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
    Query(query): Query<WsQuery>,
) -> Response {
    let token = match query.token.as_deref() {
        Some(token) if !token.is_empty() => token,
        _ => return api_error(StatusCode::UNAUTHORIZED, "missing token"),
    };

    // Subscribed before the upgrade so no event sent after the handshake is missed.
    let (user_id, slot, rx) = {
        let st = state.lock().await;
        let caller = match authenticate_token(&st, token) {
            Ok(caller) => caller,
            Err(resp) => return resp,
        };
        let Some(slot) = ConnectionSlot::reserve(&st.ws_connection_count) else {
            return api_error(
                StatusCode::SERVICE_UNAVAILABLE,
                format!("too many WebSocket connections (max {MAX_WS_CONNECTIONS})"),
            );
        };
        (caller.user.id, slot, st.ws_tx.subscribe())
    };
    let token_hash = hash_session_token(token);

    ws.on_upgrade(move |socket| ws_connection(socket, state, user_id, token_hash, rx, slot))
        .into_response()
}

async fn session_alive(state: &SharedState, token_hash: &str) -> bool {
    let st = state.lock().await;
    match st.storage.get_session(token_hash, now_secs()) {
        Ok(session) => session.is_some(),
        Err(e) => {
            tracing::warn!("ws: session check failed: {e}");
            false
        }
    }
}

async fn ws_connection(
    mut socket: WebSocket,
    state: SharedState,
    user_id: String,
    token_hash: String,
    mut rx: broadcast::Receiver<AddressedEvent>,
    _slot: ConnectionSlot,
) {
    tracing::debug!("ws: {} connected", short_id(&user_id));
    let mut session_check = tokio::time::interval(Duration::from_secs(WS_SESSION_CHECK_SECS));
    session_check.tick().await;

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(addressed) => {
                        if addressed.recipient_id != user_id {
                            continue;
                        }
                        if !session_alive(&state, &token_hash).await {
                            close_expired(&mut socket, &user_id).await;
                            break;
                        }
                        if let Ok(json) = serde_json::to_string(&addressed.event) {
                            if socket.send(WsMessage::Text(json)).await.is_err() {
                                break; // client disconnected
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws client {} lagged, skipped {n} events", short_id(&user_id));
                        // Client should refetch its friend lists
                        let lag_msg = serde_json::json!({
                            "type": "events_missed",
                            "count": n,
                        });
                        if socket.send(WsMessage::Text(lag_msg.to_string())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = session_check.tick() => {
                if !session_alive(&state, &token_hash).await {
                    close_expired(&mut socket, &user_id).await;
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(WsMessage::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = socket.send(WsMessage::Pong(data)).await;
                    }
                    _ => {}
                }
            }
        }
    }

    tracing::debug!("ws: {} disconnected", short_id(&user_id));
}

async fn close_expired(socket: &mut WebSocket, user_id: &str) {
    tracing::debug!("ws: {} session ended, closing", short_id(user_id));
    let frame = CloseFrame {
        code: close_code::POLICY,
        reason: "session expired or invalid".into(),
    };
    let _ = socket.send(WsMessage::Close(Some(frame))).await;
}
