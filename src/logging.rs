//! Log setup and helpers for consistent log lines.
//!
//! Output goes through `tracing`; [`init`] installs a `tracing-subscriber`
//! formatter on stderr with ANSI colour only when stderr is a terminal.
//! Lines look like:
//!
//! ```text
//! 2026-10-17T21:33:12.000Z  INFO secret_pages::web_client::handlers::friends: friend-request: u-3f9a1c2 -> u-81be0d4 (id=7)
//! ```

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

const LOG_ID_TRUNCATE_LEN: usize = 7;

/// Install the global subscriber. `default_filter` is used when `RUST_LOG`
/// is unset. Calling this more than once is harmless; later calls are ignored.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();
}

fn truncate_id(id: &str) -> &str {
    let end = id
        .char_indices()
        .nth(LOG_ID_TRUNCATE_LEN)
        .map(|(i, _)| i)
        .unwrap_or(id.len());
    &id[..end]
}

/// Format a user ID for logs, e.g. `u-3f9a1c2`.
pub fn short_id(id: &str) -> String {
    format!("u-{}", truncate_id(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_ids_are_truncated() {
        assert_eq!(short_id("3f9a1c2d8e7b"), "u-3f9a1c2");
        assert_eq!(short_id("abc"), "u-abc");
        assert_eq!(short_id(""), "u-");
    }
}
