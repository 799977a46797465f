//! Configuration types and constants for the secret-pages web server.

use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_SESSION_TTL_SECS: u64 = 7 * 24 * 3600;
/// How often expired sessions are swept from the database.
pub(crate) const SESSION_PURGE_INTERVAL_SECS: u64 = 15 * 60;
pub(crate) const WS_CHANNEL_CAPACITY: usize = 256;
pub const MAX_WS_CONNECTIONS: usize = 64;
/// How often an idle socket re-checks that its session is still live.
pub(crate) const WS_SESSION_CHECK_SECS: u64 = 30;
/// Upper bound on JSON request bodies. Messages are short.
pub(crate) const MAX_BODY_BYTES: usize = 64 * 1024;

/// Web server for secret pages: per-page secret messages shared with friends.
///
/// Serves an embedded SPA, provides a REST API + WebSocket, and persists
/// state in SQLite.
///
/// Configuration can be set via CLI arguments or environment variables.
/// CLI arguments take precedence over environment variables.
#[derive(Parser, Debug, Default)]
#[command(name = "secret-pages-web", version, about)]
pub struct Cli {
    /// HTTP server bind address [env: SECRET_PAGES_BIND] [default: 127.0.0.1:3000]
    #[arg(long, short = 'b')]
    pub bind: Option<String>,

    /// Data directory for the database [env: SECRET_PAGES_HOME] [default: ~/.secret-pages]
    #[arg(long, short = 'd')]
    pub data_dir: Option<PathBuf>,

    /// Session lifetime in seconds [env: SECRET_PAGES_SESSION_TTL] [default: 604800]
    #[arg(long)]
    pub session_ttl: Option<u64>,

    /// Log filter used when RUST_LOG is unset [env: SECRET_PAGES_LOG] [default: info]
    #[arg(long)]
    pub log: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub session_ttl_secs: u64,
    pub log_filter: String,
}

impl Config {
    pub fn from_cli_and_env(cli: Cli) -> Self {
        let data_dir = cli
            .data_dir
            .or_else(|| std::env::var("SECRET_PAGES_HOME").ok().map(PathBuf::from))
            .unwrap_or_else(|| {
                std::env::var("HOME")
                    .map(|h| PathBuf::from(h).join(".secret-pages"))
                    .unwrap_or_else(|_| PathBuf::from(".secret-pages"))
            });

        let bind_addr = cli
            .bind
            .or_else(|| std::env::var("SECRET_PAGES_BIND").ok())
            .unwrap_or_else(|| "127.0.0.1:3000".to_string());

        let session_ttl_secs = cli
            .session_ttl
            .or_else(|| {
                std::env::var("SECRET_PAGES_SESSION_TTL")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .filter(|ttl| *ttl > 0)
            .unwrap_or(DEFAULT_SESSION_TTL_SECS);

        let log_filter = cli
            .log
            .or_else(|| std::env::var("SECRET_PAGES_LOG").ok())
            .unwrap_or_else(|| "info".to_string());

        Self {
            bind_addr,
            data_dir,
            session_ttl_secs,
            log_filter,
        }
    }
}
