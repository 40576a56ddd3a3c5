//! Natural-language query router for Alliance of Genome Resources workers.
//!
//! Free-text queries are classified into an [`router::Intent`], sent as a
//! single JSON-RPC request to a freshly spawned worker process, and the
//! decoded response is rendered for the terminal.

pub mod config;
pub mod presenter;
pub mod router;
pub mod rpc;
pub mod shell;

/// Build the log filter for a `-v` count. `RUST_LOG` wins when set.
fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "alliance_query=info,warn",
        2 => "alliance_query=debug,warn",
        _ => "alliance_query=trace,info",
    }
}

/// Initialize the tracing subscriber.
///
/// Logs go to stderr; stdout carries results only.
pub fn init_tracing(verbosity: u8) {
    use std::io::IsTerminal;
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

    let _ = fmt::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true)
        .with_thread_ids(false)
        .try_init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        "=== alliance-query starting ==="
    );
}
