//! secret-pages-web: the web server.
//!
//! Serves an embedded SPA, provides a REST API + WebSocket for accounts,
//! secret messages and friend requests, and persists state in SQLite.

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
pub mod static_files;
pub mod utils;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use crate::storage::{db_path, Storage, StorageError};

use config::{Cli, Config, SESSION_PURGE_INTERVAL_SECS, WS_CHANNEL_CAPACITY};
use state::{AppState, SharedState};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Wrap an open database in the shared state the router expects.
pub fn shared_state(storage: Storage, session_ttl_secs: u64) -> SharedState {
    Arc::new(tokio::sync::Mutex::new(AppState::new(
        storage,
        session_ttl_secs,
        WS_CHANNEL_CAPACITY,
    )))
}

/// Sweep expired sessions forever.
pub async fn session_purge_loop(state: SharedState, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let st = state.lock().await;
        match st.storage.purge_expired_sessions(utils::now_secs()) {
            Ok(0) => {}
            Ok(n) => tracing::info!("sessions: purged {n} expired session(s)"),
            Err(e) => tracing::warn!("sessions: purge failed: {e}"),
        }
    }
}

/// Entry point: parse CLI, open the database, start server.
pub async fn run() -> Result<(), ServerError> {
    let cli = Cli::parse();
    let config = Config::from_cli_and_env(cli);

    crate::logging::init(&config.log_filter);

    tracing::info!("secret-pages-web starting");
    tracing::info!("  data directory: {}", config.data_dir.display());

    let path = db_path(&config.data_dir);
    let storage = Storage::open(&path)?;
    tracing::info!("  database: {}", path.display());
    tracing::info!("  accounts: {}", storage.count_users()?);
    tracing::info!("  session lifetime: {}s", config.session_ttl_secs);

    let state = shared_state(storage, config.session_ttl_secs);

    let purge_state = Arc::clone(&state);
    tokio::spawn(async move {
        session_purge_loop(purge_state, Duration::from_secs(SESSION_PURGE_INTERVAL_SECS)).await;
    });

    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("secret-pages-web listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
