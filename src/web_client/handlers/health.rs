//! Health check endpoint.

use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::web_client::state::SharedState;

pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.lock().await;
    let ws_connections = state.ws_connection_count.load(Ordering::Relaxed);

    let (status, body) = match state.storage.count_users() {
        Ok(users) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "ok",
                "users": users,
                "ws_connections": ws_connections,
            }),
        ),
        Err(e) => {
            tracing::warn!("health: database unavailable: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({
                    "status": "degraded",
                    "users": null,
                    "ws_connections": ws_connections,
                }),
            )
        }
    };
    (status, axum::Json(body))
}
