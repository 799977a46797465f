//! Friend request handlers.
//!
//! A request row links a sender and a receiver. While it is `pending` only
//! the receiver may accept or reject it; once `accepted` both users see each
//! other's social-page message. Either participant may delete the row, which
//! cancels a pending request or ends a friendship.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::logging::short_id;
use crate::pages::PageNumber;
use crate::storage::{FriendRequestRow, PendingRequestView, RequestStatus};
use crate::web_client::state::{AppState, SharedState, WsEvent};
use crate::web_client::utils::{
    api_error, authenticate, now_secs, storage_error, ApiJson, ApiPath, Caller,
};

#[derive(Deserialize)]
pub struct SendFriendRequestPayload {
    email: String,
}

fn request_json(r: &FriendRequestRow) -> serde_json::Value {
    serde_json::json!({
        "id": r.id,
        "sender_id": r.sender_id,
        "receiver_id": r.receiver_id,
        "status": r.status.as_str(),
        "created_at": r.created_at,
        "updated_at": r.updated_at,
    })
}

fn pending_json(r: &PendingRequestView, role: &str) -> serde_json::Value {
    serde_json::json!({
        "id": r.id,
        role: { "id": r.other.id, "email": r.other.email },
        "created_at": r.created_at,
    })
}

/// Load a request and check that the caller takes part in it. Requests the
/// caller cannot see are reported as missing.
fn load_request(st: &AppState, caller: &Caller, id: i64) -> Result<FriendRequestRow, Response> {
    match st.storage.get_friend_request(id) {
        Ok(Some(fr)) if fr.involves(&caller.user.id) => Ok(fr),
        Ok(_) => Err(api_error(StatusCode::NOT_FOUND, "friend request not found")),
        Err(e) => Err(storage_error("friend request lookup failed", e)),
    }
}

/// POST /api/friend-requests - Send a request to the user with `email`.
pub async fn send_friend_request_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<SendFriendRequestPayload>,
) -> Response {
    let st = state.lock().await;
    let caller = match authenticate(&st, &headers) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };

    if req.email.trim().is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "Please enter an email");
    }

    let target = match st.storage.find_profile_by_email(&req.email) {
        Ok(Some(profile)) => profile,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "User not found"),
        Err(e) => return storage_error("profile lookup failed", e),
    };

    if target.id == caller.user.id {
        return api_error(
            StatusCode::BAD_REQUEST,
            "You cannot send a friend request to yourself",
        );
    }

    match st.storage.find_request_between(&caller.user.id, &target.id) {
        Ok(Some(_)) => {
            return api_error(
                StatusCode::CONFLICT,
                "Friend request already exists or you are already friends",
            )
        }
        Ok(None) => {}
        Err(e) => return storage_error("friend request lookup failed", e),
    }

    let id = match st
        .storage
        .insert_friend_request(&caller.user.id, &target.id, now_secs())
    {
        Ok(id) => id,
        Err(e) => return storage_error("friend request insert failed", e),
    };
    let fr = match st.storage.get_friend_request(id) {
        Ok(Some(fr)) => fr,
        Ok(None) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, "friend request vanished"),
        Err(e) => return storage_error("friend request lookup failed", e),
    };

    tracing::info!(
        "friend-request: {} -> {} (id={})",
        short_id(&caller.user.id),
        short_id(&target.id),
        id
    );
    st.notify(
        &target.id,
        WsEvent::FriendRequestReceived {
            request_id: id,
            sender_id: caller.user.id.clone(),
            sender_email: caller.user.email.clone(),
        },
    );

    (StatusCode::CREATED, axum::Json(request_json(&fr))).into_response()
}

/// GET /api/friends - Friends plus pending requests in both directions.
pub async fn list_friends_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let st = state.lock().await;
    let caller = match authenticate(&st, &headers) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    let user_id = &caller.user.id;

    let friends = match st.storage.list_friendships(user_id) {
        Ok(friends) => friends,
        Err(e) => return storage_error("friend list failed", e),
    };
    let incoming = match st.storage.list_incoming_requests(user_id) {
        Ok(rows) => rows,
        Err(e) => return storage_error("incoming request list failed", e),
    };
    let outgoing = match st.storage.list_outgoing_requests(user_id) {
        Ok(rows) => rows,
        Err(e) => return storage_error("outgoing request list failed", e),
    };

    let json = serde_json::json!({
        "friends": friends
            .iter()
            .map(|f| serde_json::json!({
                "id": f.friend.id,
                "email": f.friend.email,
                "request_id": f.request_id,
                "since": f.since,
            }))
            .collect::<Vec<_>>(),
        "incoming": incoming.iter().map(|r| pending_json(r, "sender")).collect::<Vec<_>>(),
        "outgoing": outgoing.iter().map(|r| pending_json(r, "receiver")).collect::<Vec<_>>(),
    });
    (StatusCode::OK, axum::Json(json)).into_response()
}

/// GET /api/friends/messages - Friends' messages on the social page.
pub async fn friend_messages_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let caller = match authenticate(&st, &headers) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    match st
        .storage
        .list_friend_messages(&caller.user.id, PageNumber::SOCIAL.get())
    {
        Ok(messages) => (StatusCode::OK, axum::Json(serde_json::json!(messages))).into_response(),
        Err(e) => storage_error("friend messages failed", e),
    }
}

/// POST /api/friend-requests/:id/accept
pub async fn accept_friend_request_handler(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let caller = match authenticate(&st, &headers) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    let fr = match load_request(&st, &caller, id) {
        Ok(fr) => fr,
        Err(resp) => return resp,
    };

    if fr.receiver_id != caller.user.id {
        return api_error(
            StatusCode::FORBIDDEN,
            "only the receiver can accept a friend request",
        );
    }
    if fr.status != RequestStatus::Pending {
        return api_error(
            StatusCode::BAD_REQUEST,
            format!("friend request is already {}", fr.status.as_str()),
        );
    }

    if let Err(e) = st
        .storage
        .update_friend_request_status(id, RequestStatus::Accepted, now_secs())
    {
        return storage_error("friend request accept failed", e);
    }

    tracing::info!(
        "friend-accept: {} accepted {} (id={})",
        short_id(&caller.user.id),
        short_id(&fr.sender_id),
        id
    );
    st.notify(
        &fr.sender_id,
        WsEvent::FriendRequestAccepted {
            request_id: id,
            user_id: caller.user.id.clone(),
            email: caller.user.email.clone(),
        },
    );

    (
        StatusCode::OK,
        axum::Json(serde_json::json!({"status": "accepted", "id": id})),
    )
        .into_response()
}

/// POST /api/friend-requests/:id/reject - Receiver declines; the row is removed.
pub async fn reject_friend_request_handler(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let caller = match authenticate(&st, &headers) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    let fr = match load_request(&st, &caller, id) {
        Ok(fr) => fr,
        Err(resp) => return resp,
    };

    if fr.receiver_id != caller.user.id {
        return api_error(
            StatusCode::FORBIDDEN,
            "only the receiver can reject a friend request",
        );
    }
    if fr.status != RequestStatus::Pending {
        return api_error(
            StatusCode::BAD_REQUEST,
            format!("friend request is already {}", fr.status.as_str()),
        );
    }

    if let Err(e) = st.storage.delete_friend_request(id) {
        return storage_error("friend request reject failed", e);
    }
    tracing::info!(
        "friend-reject: {} rejected {} (id={})",
        short_id(&caller.user.id),
        short_id(&fr.sender_id),
        id
    );

    (
        StatusCode::OK,
        axum::Json(serde_json::json!({"status": "rejected", "id": id})),
    )
        .into_response()
}

/// DELETE /api/friend-requests/:id - Cancel a pending request or unfriend.
pub async fn delete_friend_request_handler(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<i64>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let caller = match authenticate(&st, &headers) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    let fr = match load_request(&st, &caller, id) {
        Ok(fr) => fr,
        Err(resp) => return resp,
    };

    if let Err(e) = st.storage.delete_friend_request(id) {
        return storage_error("friend request delete failed", e);
    }

    let other = fr.other_party(&caller.user.id).to_string();
    let outcome = match fr.status {
        RequestStatus::Pending => "cancelled",
        RequestStatus::Accepted => {
            st.notify(
                &other,
                WsEvent::FriendshipRemoved {
                    request_id: id,
                    user_id: caller.user.id.clone(),
                },
            );
            "unfriended"
        }
    };
    tracing::info!(
        "friend-delete: {} {} {} (id={})",
        short_id(&caller.user.id),
        outcome,
        short_id(&other),
        id
    );

    (
        StatusCode::OK,
        axum::Json(serde_json::json!({"status": outcome, "id": id})),
    )
        .into_response()
}
