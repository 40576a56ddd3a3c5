//! Worker RPC error types.

use thiserror::Error;

/// Transport-level failures of a worker session.
///
/// Application errors reported by the worker itself are not `RpcError`s;
/// they arrive as [`super::types::WorkerResponse::Error`].
#[derive(Debug, Error)]
pub enum RpcError {
    /// The intent cannot be turned into a request (e.g. it is unrecognized).
    #[error("cannot encode request: {reason}")]
    Encoding { reason: String },

    /// The worker process failed to start.
    #[error("failed to spawn worker '{command}': {reason}")]
    Spawn { command: String, reason: String },

    /// Reading from or writing to the worker's stdio failed.
    #[error("worker i/o error: {reason}")]
    Io { reason: String },

    /// No valid response arrived before the deadline.
    #[error("worker did not respond within {timeout_ms}ms{}", diagnostics_suffix(diagnostics))]
    Timeout { timeout_ms: u64, diagnostics: String },

    /// The worker exited before producing a valid response.
    #[error("worker exited ({status}) without a response{}", diagnostics_suffix(diagnostics))]
    WorkerExited { status: String, diagnostics: String },

    /// The session was cancelled from outside.
    #[error("request cancelled")]
    Cancelled,
}

impl RpcError {
    /// Whether a fresh, independent attempt could reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, RpcError::Timeout { .. } | RpcError::WorkerExited { .. })
    }

    /// Captured worker output attached to the error, if any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            RpcError::Timeout { diagnostics, .. } | RpcError::WorkerExited { diagnostics, .. }
                if !diagnostics.is_empty() =>
            {
                Some(diagnostics)
            }
            _ => None,
        }
    }
}

/// Format a diagnostics suffix for error messages (empty if none captured).
fn diagnostics_suffix(diagnostics: &str) -> String {
    if diagnostics.trim().is_empty() {
        String::new()
    } else {
        format!(" | output: {}", diagnostics.trim())
    }
}
