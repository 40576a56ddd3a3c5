//! Wire types for the worker protocol.
//!
//! JSON-RPC 2.0 envelopes carrying MCP-style `tools/call` requests, plus the
//! decoded response handed back to callers.

use serde::{Deserialize, Serialize};

// ─── Constants ──────────────────────────────────────────────────────────────

/// Protocol version carried in every envelope.
pub const PROTOCOL_VERSION: &str = "2.0";

/// Method used for every operation; the operation itself is `params.name`.
pub const CALL_METHOD: &str = "tools/call";

// ─── Request ────────────────────────────────────────────────────────────────

/// Request envelope written to the worker's stdin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: CallParams,
}

/// The operation and its arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallParams {
    pub name: String,
    pub arguments: serde_json::Value,
}

impl RequestEnvelope {
    pub fn new(id: u64, operation: &str, arguments: serde_json::Value) -> Self {
        Self {
            jsonrpc: PROTOCOL_VERSION.to_string(),
            id,
            method: CALL_METHOD.to_string(),
            params: CallParams {
                name: operation.to_string(),
                arguments,
            },
        }
    }

    pub fn operation(&self) -> &str {
        &self.params.name
    }
}

// ─── Response ───────────────────────────────────────────────────────────────

/// Response envelope as read from the worker's stdout.
///
/// Every field is optional here so shape checks happen in the codec, where a
/// malformed line becomes `Invalid` noise instead of a parse error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<u64>,
    /// `Some(Value::Null)` for `"result": null`, `None` when the key is absent.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
    /// Present on requests and notifications; never on a response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl ResponseEnvelope {
    /// A success response, as a worker would write it.
    pub fn success(id: u64, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: Some(PROTOCOL_VERSION.to_string()),
            id: Some(id),
            result: Some(result),
            error: None,
            method: None,
        }
    }

    /// An error response, as a worker would write it.
    pub fn failure(id: u64, code: i32, message: &str) -> Self {
        Self {
            jsonrpc: Some(PROTOCOL_VERSION.to_string()),
            id: Some(id),
            result: None,
            error: Some(RpcErrorObject {
                code,
                message: message.to_string(),
                data: None,
            }),
            method: None,
        }
    }
}

/// Keep a present key as `Some`, even when its value is `null`.
fn present_value<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

// ─── Decoded outcome ────────────────────────────────────────────────────────

/// A correlated response from the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerResponse {
    /// The operation's result.
    Payload(Payload),
    /// An application-level error reported by the worker, passed through.
    Error {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },
}

impl WorkerResponse {
    /// Convert a shape-checked envelope into the caller-facing outcome.
    ///
    /// MCP results flagged `isError` are treated as worker errors.
    pub fn from_envelope(envelope: ResponseEnvelope) -> Self {
        if let Some(err) = envelope.error {
            return WorkerResponse::Error {
                code: err.code,
                message: err.message,
                data: err.data,
            };
        }

        let result = envelope.result.unwrap_or(serde_json::Value::Null);
        let payload = Payload(result);
        if payload.is_tool_error() {
            return WorkerResponse::Error {
                code: error_codes::TOOL_ERROR,
                message: payload
                    .content_text()
                    .unwrap_or("worker reported a tool error")
                    .to_string(),
                data: Some(payload.0),
            };
        }
        WorkerResponse::Payload(payload)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, WorkerResponse::Error { .. })
    }
}

/// The JSON result of an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload(pub serde_json::Value);

impl Payload {
    pub fn raw(&self) -> &serde_json::Value {
        &self.0
    }

    /// Text of the first MCP text content block, if the result has one.
    pub fn content_text(&self) -> Option<&str> {
        self.0
            .get("content")?
            .as_array()?
            .iter()
            .find(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))?
            .get("text")?
            .as_str()
    }

    /// The data the operation produced.
    ///
    /// MCP results wrap their data as JSON text inside a content block; that
    /// text is parsed when possible. Otherwise the raw result is returned.
    pub fn content_json(&self) -> serde_json::Value {
        match self.content_text() {
            Some(text) => serde_json::from_str(text)
                .unwrap_or_else(|_| serde_json::Value::String(text.to_string())),
            None => self.0.clone(),
        }
    }

    fn is_tool_error(&self) -> bool {
        self.0.get("isError").and_then(|v| v.as_bool()) == Some(true)
    }
}

// ─── Error codes ────────────────────────────────────────────────────────────

/// Well-known JSON-RPC error codes.
pub mod error_codes {
    /// The method does not exist or is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Tool result flagged with `isError` (no JSON-RPC code of its own).
    pub const TOOL_ERROR: i32 = -32000;
}

// ─── Tests ──────────────────────────────────────────────────────────────────
