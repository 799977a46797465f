//! Shared application state and WebSocket event types.

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};

use crate::storage::Storage;

/// Events pushed to a user's open WebSocket connections.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsEvent {
    FriendRequestReceived {
        request_id: i64,
        sender_id: String,
        sender_email: String,
    },
    FriendRequestAccepted {
        request_id: i64,
        user_id: String,
        email: String,
    },
    FriendshipRemoved {
        request_id: i64,
        user_id: String,
    },
    FriendMessageUpdated {
        user_id: String,
        email: String,
    },
}

/// A [`WsEvent`] together with the one user allowed to see it.
#[derive(Clone, Debug)]
pub struct AddressedEvent {
    pub recipient_id: String,
    pub event: WsEvent,
}

pub struct AppState {
    pub storage: Storage,
    pub session_ttl_secs: u64,
    pub ws_tx: broadcast::Sender<AddressedEvent>,
    pub ws_connection_count: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(storage: Storage, session_ttl_secs: u64, ws_channel_capacity: usize) -> Self {
        let (ws_tx, _) = broadcast::channel(ws_channel_capacity);
        Self {
            storage,
            session_ttl_secs,
            ws_tx,
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue an event for `recipient_id`. Dropped silently when nobody is
    /// listening.
    pub fn notify(&self, recipient_id: &str, event: WsEvent) {
        let _ = self.ws_tx.send(AddressedEvent {
            recipient_id: recipient_id.to_string(),
            event,
        });
    }
}

pub type SharedState = Arc<Mutex<AppState>>;
