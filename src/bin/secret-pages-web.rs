//! secret-pages-web: Web server binary for the secret pages app.
//!
//! Serves an embedded SPA, provides a REST API + WebSocket, and persists
//! state in SQLite.

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match secret_pages::web_client::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("secret-pages-web: {e}");
            eprintln!("secret-pages-web: {e}");
            ExitCode::FAILURE
        }
    }
}
