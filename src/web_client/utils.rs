//! Shared utility functions for the web client.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;

use crate::auth::{hash_session_token, parse_bearer};
use crate::storage::{StorageError, UserRow};
use crate::web_client::state::AppState;

/// Build a standard JSON error response.
pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = serde_json::json!({ "error": message.into() });
    (status, axum::Json(body)).into_response()
}

/// Log a storage failure and turn it into a 500. The detail stays in the log.
pub fn storage_error(context: &str, e: StorageError) -> Response {
    tracing::error!("{context}: {e}");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

/// `axum::Json` whose rejections use the API's JSON error body.
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(api_error(StatusCode::BAD_REQUEST, rejection.body_text())),
        }
    }
}

/// `Path` whose rejections use the API's JSON error body.
pub struct ApiPath<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(api_error(StatusCode::BAD_REQUEST, rejection.body_text())),
        }
    }
}

/// Current time as seconds since UNIX epoch.
pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// The caller's session token and the account it belongs to.
pub struct Caller {
    pub token_hash: String,
    pub user: UserRow,
}

/// Resolve the `Authorization: Bearer` header to a live session.
pub fn authenticate(st: &AppState, headers: &HeaderMap) -> Result<Caller, Response> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_bearer)
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "missing bearer token"))?;
    authenticate_token(st, token)
}

/// Resolve a raw session token to a live session.
pub fn authenticate_token(st: &AppState, token: &str) -> Result<Caller, Response> {
    let token_hash = hash_session_token(token);
    let session = match st.storage.get_session(&token_hash, now_secs()) {
        Ok(Some(session)) => session,
        Ok(None) => {
            return Err(api_error(
                StatusCode::UNAUTHORIZED,
                "session expired or invalid",
            ))
        }
        Err(e) => return Err(storage_error("session lookup failed", e)),
    };
    match st.storage.get_user(&session.user_id) {
        Ok(Some(user)) => Ok(Caller { token_hash, user }),
        Ok(None) => Err(api_error(
            StatusCode::UNAUTHORIZED,
            "session expired or invalid",
        )),
        Err(e) => Err(storage_error("user lookup failed", e)),
    }
}

pub fn user_json(user: &UserRow) -> serde_json::Value {
    serde_json::json!({
        "id": user.id,
        "email": user.email,
        "created_at": user.created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn storage_errors_hide_database_detail() {
        let err = StorageError::Sqlite(rusqlite::Error::InvalidQuery);
        let resp = storage_error("lookup failed", err);
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(resp).await, serde_json::json!({ "error": "internal error" }));
    }

    #[tokio::test]
    async fn api_errors_are_json() {
        let resp = api_error(StatusCode::CONFLICT, "taken");
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(resp).await["error"], "taken");
    }
}
