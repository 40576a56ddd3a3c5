//! Worker RPC: one short-lived process per request, JSON-RPC over stdio.
//!
//! This module handles:
//! - Encoding an `Intent` into a request line
//! - Decoding the worker's stdout, which mixes the response with log output
//! - Spawning, awaiting and terminating the worker process
//!
//! Application errors reported by the worker pass through as
//! `WorkerResponse::Error`; everything else that can go wrong is an `RpcError`.

pub mod codec;
pub mod errors;
pub mod lifecycle;
pub mod types;

// Re-exports for convenience
pub use codec::{encode, DecodeResult, EncodedRequest, LineDecoder};
pub use errors::RpcError;
pub use lifecycle::{run, run_many, run_with_cancel, SessionState, WorkerSession};
pub use types::{Payload, WorkerResponse};
