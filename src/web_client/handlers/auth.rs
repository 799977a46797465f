//! Sign-up, login, logout and account deletion.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::auth::{
    generate_session_token, generate_user_id, hash_password, hash_session_token, validate_email,
    validate_password, verify_login,
};
use crate::logging::short_id;
use crate::storage::{SessionRow, StorageError, UserRow};
use crate::web_client::state::{AppState, SharedState, WsEvent};
use crate::web_client::utils::{
    api_error, authenticate, now_secs, storage_error, user_json, ApiJson,
};

#[derive(Deserialize)]
pub struct CredentialsPayload {
    email: String,
    password: String,
}

/// Create a session for `user` and build the `{token, user}` body.
fn open_session(st: &AppState, user: &UserRow) -> Result<serde_json::Value, Response> {
    let token = generate_session_token();
    let now = now_secs();
    let session = SessionRow {
        token_hash: hash_session_token(&token),
        user_id: user.id.clone(),
        created_at: now,
        expires_at: now + st.session_ttl_secs,
    };
    st.storage
        .insert_session(&session)
        .map_err(|e| storage_error("failed to create session", e))?;
    Ok(serde_json::json!({
        "token": token,
        "expires_at": session.expires_at,
        "user": user_json(user),
    }))
}

/// POST /api/auth/signup - Create an account and log it in.
pub async fn signup_handler(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<CredentialsPayload>,
) -> Response {
    let email = match validate_email(&req.email) {
        Ok(email) => email,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, e.to_string()),
    };
    if let Err(e) = validate_password(&req.password) {
        return api_error(StatusCode::BAD_REQUEST, e.to_string());
    }

    // Hashed on the blocking pool, outside the state lock.
    let password = req.password;
    let password_hash = match tokio::task::spawn_blocking(move || hash_password(&password)).await {
        Ok(Ok(hash)) => hash,
        Ok(Err(e)) => {
            tracing::error!("signup: {e}");
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
        }
        Err(e) => {
            tracing::error!("signup: hashing task failed: {e}");
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
        }
    };

    let st = state.lock().await;
    let user = UserRow {
        id: generate_user_id(),
        email,
        password_hash,
        created_at: now_secs(),
    };
    match st.storage.create_user(&user) {
        Ok(()) => {}
        Err(StorageError::AlreadyExists(_)) => {
            return api_error(StatusCode::CONFLICT, "an account with this email already exists")
        }
        Err(e) => return storage_error("signup failed", e),
    }
    tracing::info!("signup: created account {}", short_id(&user.id));

    match open_session(&st, &user) {
        Ok(body) => (StatusCode::CREATED, axum::Json(body)).into_response(),
        Err(resp) => resp,
    }
}

/// POST /api/auth/login - Exchange email + password for a session token.
pub async fn login_handler(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<CredentialsPayload>,
) -> Response {
    let user = {
        let st = state.lock().await;
        match st.storage.get_user_by_email(&req.email) {
            Ok(user) => user,
            Err(e) => return storage_error("login lookup failed", e),
        }
    };

    let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
    let password = req.password;
    let verified =
        match tokio::task::spawn_blocking(move || verify_login(&password, stored_hash.as_deref()))
            .await
        {
            Ok(verified) => verified,
            Err(e) => {
                tracing::error!("login: verification task failed: {e}");
                return api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
            }
        };

    let user = match user {
        Some(user) if verified => user,
        _ => {
            tracing::debug!("login: rejected credentials");
            return api_error(StatusCode::UNAUTHORIZED, "invalid email or password");
        }
    };

    let st = state.lock().await;
    tracing::info!("login: {}", short_id(&user.id));
    match open_session(&st, &user) {
        Ok(body) => (StatusCode::OK, axum::Json(body)).into_response(),
        Err(resp) => resp,
    }
}

/// POST /api/auth/logout - End the current session.
pub async fn logout_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let st = state.lock().await;
    let caller = match authenticate(&st, &headers) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    if let Err(e) = st.storage.delete_session(&caller.token_hash) {
        return storage_error("logout failed", e);
    }
    tracing::info!("logout: {}", short_id(&caller.user.id));
    (
        StatusCode::OK,
        axum::Json(serde_json::json!({ "logged_out": true })),
    )
        .into_response()
}

/// GET /api/auth/me - The logged-in account.
pub async fn me_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let st = state.lock().await;
    match authenticate(&st, &headers) {
        Ok(caller) => (StatusCode::OK, axum::Json(user_json(&caller.user))).into_response(),
        Err(resp) => resp,
    }
}

/// DELETE /api/account - Delete the caller's account and everything it owns.
pub async fn delete_account_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let caller = match authenticate(&st, &headers) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };

    // Collected before the cascade removes the linking rows.
    let friendships = match st.storage.list_friendships(&caller.user.id) {
        Ok(friendships) => friendships,
        Err(e) => return storage_error("account deletion failed", e),
    };

    match st.storage.delete_user(&caller.user.id) {
        Ok(true) => {}
        Ok(false) => return api_error(StatusCode::NOT_FOUND, "account not found"),
        Err(e) => return storage_error("account deletion failed", e),
    }
    for friendship in &friendships {
        st.notify(
            &friendship.friend.id,
            WsEvent::FriendshipRemoved {
                request_id: friendship.request_id,
                user_id: caller.user.id.clone(),
            },
        );
    }
    tracing::info!(
        "account: deleted {} ({} friendship(s) removed)",
        short_id(&caller.user.id),
        friendships.len()
    );
    (
        StatusCode::OK,
        axum::Json(serde_json::json!({ "deleted": true })),
    )
        .into_response()
}
