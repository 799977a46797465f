//! Axum router construction.

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::web_client::config::MAX_BODY_BYTES;
use crate::web_client::handlers;
use crate::web_client::state::SharedState;
use crate::web_client::static_files::static_handler;

/// Build the complete Axum router with all API routes and static file serving.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        // Health
        .route("/api/health", get(handlers::health::health_handler))
        // Auth API
        .route("/api/auth/signup", post(handlers::auth::signup_handler))
        .route("/api/auth/login", post(handlers::auth::login_handler))
        .route("/api/auth/logout", post(handlers::auth::logout_handler))
        .route("/api/auth/me", get(handlers::auth::me_handler))
        .route(
            "/api/account",
            delete(handlers::auth::delete_account_handler),
        )
        // Pages API
        .route("/api/dashboard", get(handlers::pages::dashboard_handler))
        .route(
            "/api/pages/:page/message",
            get(handlers::pages::get_message_handler)
                .put(handlers::pages::save_message_handler)
                .delete(handlers::pages::delete_message_handler),
        )
        // Friends API
        .route("/api/friends", get(handlers::friends::list_friends_handler))
        .route(
            "/api/friends/messages",
            get(handlers::friends::friend_messages_handler),
        )
        .route(
            "/api/friend-requests",
            post(handlers::friends::send_friend_request_handler),
        )
        .route(
            "/api/friend-requests/:id",
            delete(handlers::friends::delete_friend_request_handler),
        )
        .route(
            "/api/friend-requests/:id/accept",
            post(handlers::friends::accept_friend_request_handler),
        )
        .route(
            "/api/friend-requests/:id/reject",
            post(handlers::friends::reject_friend_request_handler),
        )
        // WebSocket
        .route("/api/ws", get(handlers::websocket::ws_handler))
        // Static fallback
        .fallback(get(static_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
