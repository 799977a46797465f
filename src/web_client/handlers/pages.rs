//! Dashboard and per-page secret message handlers.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::logging::short_id;
use crate::pages::{validate_message, PageNumber};
use crate::storage::SecretMessageRow;
use crate::web_client::state::{AppState, SharedState, WsEvent};
use crate::web_client::utils::{
    api_error, authenticate, now_secs, storage_error, ApiJson, ApiPath, Caller,
};

#[derive(Deserialize)]
pub struct SaveMessagePayload {
    message: String,
}

fn parse_page(raw: &str) -> Result<PageNumber, Response> {
    raw.parse::<PageNumber>()
        .map_err(|e| api_error(StatusCode::NOT_FOUND, e))
}

fn message_json(page: PageNumber, row: Option<&SecretMessageRow>) -> serde_json::Value {
    serde_json::json!({
        "page": page.get(),
        "message": row.map(|r| r.message.as_str()),
        "updated_at": row.map(|r| r.updated_at),
    })
}

/// Tell every friend that the caller's social-page message changed. The write
/// has already happened, so a failed lookup is only logged.
fn notify_friends_of_social_message(st: &AppState, caller: &Caller) {
    let friends = match st.storage.list_friends(&caller.user.id) {
        Ok(friends) => friends,
        Err(e) => {
            tracing::warn!("page {}: friend lookup for notify failed: {e}", PageNumber::SOCIAL);
            return;
        }
    };
    for friend in friends {
        st.notify(
            &friend.id,
            WsEvent::FriendMessageUpdated {
                user_id: caller.user.id.clone(),
                email: caller.user.email.clone(),
            },
        );
    }
}

/// GET /api/dashboard - Greeting plus one card per page.
pub async fn dashboard_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let st = state.lock().await;
    let caller = match authenticate(&st, &headers) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    let saved = match st.storage.list_secret_messages(&caller.user.id) {
        Ok(rows) => rows,
        Err(e) => return storage_error("dashboard lookup failed", e),
    };

    let pages: Vec<serde_json::Value> = PageNumber::all()
        .map(|page| {
            let info = page.info();
            serde_json::json!({
                "number": page.get(),
                "title": info.title,
                "description": info.description,
                "has_message": saved.iter().any(|m| m.page_number == page.get()),
            })
        })
        .collect();

    let json = serde_json::json!({
        "email": caller.user.email,
        "pages": pages,
    });
    (StatusCode::OK, axum::Json(json)).into_response()
}

/// GET /api/pages/:page/message - The caller's message for a page.
pub async fn get_message_handler(
    State(state): State<SharedState>,
    ApiPath(page): ApiPath<String>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let caller = match authenticate(&st, &headers) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    let page = match parse_page(&page) {
        Ok(page) => page,
        Err(resp) => return resp,
    };
    match st.storage.get_secret_message(&caller.user.id, page.get()) {
        Ok(row) => (StatusCode::OK, axum::Json(message_json(page, row.as_ref()))).into_response(),
        Err(e) => storage_error("message lookup failed", e),
    }
}

/// PUT /api/pages/:page/message - Add or replace the caller's message.
pub async fn save_message_handler(
    State(state): State<SharedState>,
    ApiPath(page): ApiPath<String>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<SaveMessagePayload>,
) -> Response {
    let st = state.lock().await;
    let caller = match authenticate(&st, &headers) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    let page = match parse_page(&page) {
        Ok(page) => page,
        Err(resp) => return resp,
    };
    if let Err(e) = validate_message(&req.message) {
        return api_error(StatusCode::BAD_REQUEST, e.to_string());
    }

    let row = SecretMessageRow {
        user_id: caller.user.id.clone(),
        page_number: page.get(),
        message: req.message,
        updated_at: now_secs(),
    };
    if let Err(e) = st.storage.upsert_secret_message(&row) {
        return storage_error("message save failed", e);
    }
    tracing::info!("page {}: message saved by {}", page, short_id(&row.user_id));

    if page == PageNumber::SOCIAL {
        notify_friends_of_social_message(&st, &caller);
    }

    (StatusCode::OK, axum::Json(message_json(page, Some(&row)))).into_response()
}

/// DELETE /api/pages/:page/message - Clear the caller's message.
pub async fn delete_message_handler(
    State(state): State<SharedState>,
    ApiPath(page): ApiPath<String>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let caller = match authenticate(&st, &headers) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    let page = match parse_page(&page) {
        Ok(page) => page,
        Err(resp) => return resp,
    };
    let deleted = match st.storage.delete_secret_message(&caller.user.id, page.get()) {
        Ok(deleted) => deleted,
        Err(e) => return storage_error("message delete failed", e),
    };
    if deleted && page == PageNumber::SOCIAL {
        notify_friends_of_social_message(&st, &caller);
    }
    (
        StatusCode::OK,
        axum::Json(serde_json::json!({ "page": page.get(), "deleted": deleted })),
    )
        .into_response()
}
