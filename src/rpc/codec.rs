//! Envelope codec: intent to request line, output stream to response.
//!
//! Workers write log lines to stdout alongside the one line that matters,
//! so decoding is a scan: every complete line is classified as `Valid` (a
//! well-formed response correlated to our request id) or `Invalid` (noise,
//! skipped), and a trailing partial line leaves the decoder `Incomplete`
//! until more bytes arrive.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::json;

use super::errors::RpcError;
use super::types::{RequestEnvelope, ResponseEnvelope, PROTOCOL_VERSION};
use crate::router::{Action, Intent};

// ─── Constants ──────────────────────────────────────────────────────────────

/// Discarded lines kept for diagnostics.
const MAX_DISCARDED_LINES: usize = 50;

/// Characters kept per discarded line.
const MAX_DISCARDED_CHARS: usize = 200;

/// An unterminated line longer than this is dropped as noise.
const MAX_PENDING_BYTES: usize = 16 * 1024 * 1024;

// ─── Request ID Generator ───────────────────────────────────────────────────

/// Process-wide monotonic request id counter.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Generate a unique, increasing request id.
pub fn next_request_id() -> u64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

// ─── Encoding ───────────────────────────────────────────────────────────────

/// A serialized request ready to be written to the worker.
#[derive(Debug, Clone)]
pub struct EncodedRequest {
    pub id: u64,
    pub operation: String,
    /// One JSON object followed by `\n`.
    pub line: Vec<u8>,
}

/// Map an intent to its operation name and arguments.
pub fn request_for(intent: &Intent, id: u64) -> Result<RequestEnvelope, RpcError> {
    let (operation, arguments) = match &intent.action {
        Action::SearchGenes {
            query,
            species,
            limit,
        } => {
            let mut args = json!({ "query": query, "limit": limit });
            if let Some(species) = species {
                args["species"] = json!(species);
            }
            ("search_genes", args)
        }
        Action::SearchDiseases { query, limit } => {
            ("search_diseases", json!({ "query": query, "limit": limit }))
        }
        Action::GetEntityInfo { entity_id } => ("get_gene_info", json!({ "gene_id": entity_id })),
        Action::BlastSequence { sequence } => ("blast_sequence", json!({ "sequence": sequence })),
        Action::GetCacheStats => ("get_cache_stats", json!({})),
        Action::Unrecognized => {
            return Err(RpcError::Encoding {
                reason: "unrecognized intent has no operation".into(),
            })
        }
    };

    Ok(RequestEnvelope::new(id, operation, arguments))
}

/// Encode an intent as a newline-terminated request with a fresh id.
pub fn encode(intent: &Intent) -> Result<EncodedRequest, RpcError> {
    let envelope = request_for(intent, next_request_id())?;

    let mut line = serde_json::to_vec(&envelope).map_err(|e| RpcError::Encoding {
        reason: format!("failed to serialize request: {e}"),
    })?;
    line.push(b'\n');

    Ok(EncodedRequest {
        id: envelope.id,
        operation: envelope.params.name,
        line,
    })
}

// ─── Decoding ───────────────────────────────────────────────────────────────

/// Classification of worker output.
#[derive(Debug, Clone)]
pub enum DecodeResult {
    /// No complete line is available yet.
    Incomplete,
    /// A complete line that is not our response; skip it and keep scanning.
    Invalid(String),
    /// The correlated response.
    Valid(ResponseEnvelope),
}

/// Classify one complete line of worker output.
pub fn decode_line(line: &str, expected_id: u64) -> DecodeResult {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return DecodeResult::Invalid("blank line".into());
    }

    let value: serde_json::Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(_) => return DecodeResult::Invalid("not JSON".into()),
    };
    if !value.is_object() {
        return DecodeResult::Invalid("JSON is not an object".into());
    }

    let envelope: ResponseEnvelope = match serde_json::from_value(value) {
        Ok(env) => env,
        Err(e) => return DecodeResult::Invalid(format!("unexpected envelope shape: {e}")),
    };

    if envelope.method.is_some() {
        return DecodeResult::Invalid("request or notification, not a response".into());
    }
    if envelope.jsonrpc.as_deref() != Some(PROTOCOL_VERSION) {
        return DecodeResult::Invalid("missing or unsupported protocol version".into());
    }
    match envelope.id {
        Some(id) if id == expected_id => {}
        Some(id) => {
            return DecodeResult::Invalid(format!(
                "uncorrelated response id {id} (expected {expected_id})"
            ))
        }
        None => return DecodeResult::Invalid("response has no id".into()),
    }
    if envelope.result.is_none() && envelope.error.is_none() {
        return DecodeResult::Invalid("response has neither result nor error".into());
    }

    DecodeResult::Valid(envelope)
}

/// Incremental decoder over a worker's stdout.
///
/// Owns the output buffer of one session. Noise lines are kept (bounded and
/// truncated) for diagnostics only; they are never surfaced as a result.
#[derive(Debug)]
pub struct LineDecoder {
    expected_id: u64,
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to contain no newline.
    searched: usize,
    discarded: Vec<String>,
    discarded_total: usize,
}

impl LineDecoder {
    pub fn new(expected_id: u64) -> Self {
        Self {
            expected_id,
            buffer: Vec::new(),
            searched: 0,
            discarded: Vec::new(),
            discarded_total: 0,
        }
    }

    /// Append raw bytes from the stream.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Classify the next complete line in the buffer.
    ///
    /// Call repeatedly: `Invalid` means "skipped one line, keep going",
    /// `Incomplete` means "wait for more input".
    pub fn try_decode(&mut self) -> DecodeResult {
        let newline = self.buffer[self.searched..]
            .iter()
            .position(|b| *b == b'\n')
            .map(|offset| self.searched + offset);

        let Some(end) = newline else {
            self.searched = self.buffer.len();
            if self.buffer.len() > MAX_PENDING_BYTES {
                let dropped = self.buffer.len();
                self.buffer.clear();
                self.searched = 0;
                let reason = format!("unterminated line exceeded {MAX_PENDING_BYTES} bytes");
                self.record(&format!("<{dropped} bytes>"), &reason);
                return DecodeResult::Invalid(reason);
            }
            return DecodeResult::Incomplete;
        };

        let line: Vec<u8> = self.buffer.drain(..=end).collect();
        self.searched = 0;
        let text = String::from_utf8_lossy(&line);

        let result = decode_line(&text, self.expected_id);
        if let DecodeResult::Invalid(reason) = &result {
            if !text.trim().is_empty() {
                self.record(&text, reason);
            }
        }
        result
    }

    /// Skip noise until the correlated response or the end of the buffer.
    pub fn scan(&mut self) -> Option<ResponseEnvelope> {
        loop {
            match self.try_decode() {
                DecodeResult::Valid(envelope) => return Some(envelope),
                DecodeResult::Invalid(_) => continue,
                DecodeResult::Incomplete => return None,
            }
        }
    }

    /// Treat a trailing unterminated line as complete (end of stream).
    pub fn finish(&mut self) -> Option<ResponseEnvelope> {
        if !self.buffer.is_empty() && self.buffer.last() != Some(&b'\n') {
            self.buffer.push(b'\n');
        }
        self.scan()
    }

    /// Noise lines seen so far (bounded, truncated).
    pub fn discarded_lines(&self) -> &[String] {
        &self.discarded
    }

    /// Total number of noise lines seen, including ones no longer kept.
    pub fn discarded_total(&self) -> usize {
        self.discarded_total
    }

    /// Discarded output joined for error messages.
    pub fn diagnostics(&self) -> String {
        let mut out = self.discarded.join("\n");
        let omitted = self.discarded_total.saturating_sub(self.discarded.len());
        if omitted > 0 {
            out.push_str(&format!("\n...({omitted} more lines)"));
        }
        out
    }

    fn record(&mut self, text: &str, reason: &str) {
        let line = text.trim_end();
        tracing::debug!(
            request_id = self.expected_id,
            reason,
            line = %truncate_chars(line, MAX_DISCARDED_CHARS),
            "skipped worker output line"
        );
        self.discarded_total += 1;
        if self.discarded.len() < MAX_DISCARDED_LINES {
            self.discarded.push(truncate_chars(line, MAX_DISCARDED_CHARS));
        }
    }
}

/// Truncate to at most `max` characters, marking the cut.
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::classify;

    fn response_line(id: u64) -> String {
        let env = ResponseEnvelope::success(id, json!({"results": [{"symbol": "BRCA1"}]}));
        format!("{}\n", serde_json::to_string(&env).unwrap())
    }

    #[test]
    fn test_next_request_id_is_monotonic() {
        let id1 = next_request_id();
        let id2 = next_request_id();
        assert!(id2 > id1);
    }

    #[test]
    fn test_encode_search_genes() {
        let intent = classify("find BRCA1 genes in mouse");
        let req = encode(&intent).unwrap();
        assert_eq!(req.operation, "search_genes");
        assert_eq!(req.line.last(), Some(&b'\n'));
        assert_eq!(req.line.iter().filter(|b| **b == b'\n').count(), 1);

        let parsed: RequestEnvelope = serde_json::from_slice(&req.line).unwrap();
        assert_eq!(parsed.id, req.id);
        assert_eq!(parsed.jsonrpc, "2.0");
        assert_eq!(parsed.params.arguments["query"], "brca1");
        assert_eq!(parsed.params.arguments["species"], "Mus musculus");
        assert_eq!(parsed.params.arguments["limit"], 10);
    }

    #[test]
    fn test_encode_omits_missing_species() {
        let req = request_for(&classify("find BRCA1 genes"), 1).unwrap();
        assert!(req.params.arguments.get("species").is_none());
    }

    #[test]
    fn test_operation_per_kind() {
        let cases = [
            ("find diseases related to asthma", "search_diseases"),
            ("info about HGNC:1100", "get_gene_info"),
            ("blast ACGTACGTACGT", "blast_sequence"),
            ("cache stats", "get_cache_stats"),
        ];
        for (text, operation) in cases {
            let req = request_for(&classify(text), 1).unwrap();
            assert_eq!(req.operation(), operation, "for {text:?}");
        }
    }

    #[test]
    fn test_encode_unrecognized_is_error() {
        let err = encode(&Intent::unrecognized()).unwrap_err();
        assert!(matches!(err, RpcError::Encoding { .. }));
    }

    #[test]
    fn test_decode_line_classification() {
        assert!(matches!(decode_line("INFO starting up", 1), DecodeResult::Invalid(_)));
        assert!(matches!(decode_line("[1, 2]", 1), DecodeResult::Invalid(_)));
        assert!(matches!(decode_line(r#"{"hello": "world"}"#, 1), DecodeResult::Invalid(_)));
        assert!(matches!(
            decode_line(r#"{"jsonrpc":"2.0","method":"notifications/progress"}"#, 1),
            DecodeResult::Invalid(_)
        ));
        assert!(matches!(
            decode_line(r#"{"jsonrpc":"2.0","id":2,"result":{}}"#, 1),
            DecodeResult::Invalid(_)
        ));
        assert!(matches!(
            decode_line(r#"{"jsonrpc":"2.0","result":{}}"#, 1),
            DecodeResult::Invalid(_)
        ));
        assert!(matches!(
            decode_line(r#"{"jsonrpc":"2.0","id":1}"#, 1),
            DecodeResult::Invalid(_)
        ));
        assert!(matches!(
            decode_line(r#"{"jsonrpc":"2.0","id":1,"result":{"ok":true}}"#, 1),
            DecodeResult::Valid(_)
        ));
        assert!(matches!(
            decode_line(r#"{"jsonrpc":"2.0","id":1,"result":null}"#, 1),
            DecodeResult::Valid(_)
        ));
        assert!(matches!(
            decode_line(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-1,"message":"x"}}"#, 1),
            DecodeResult::Valid(_)
        ));
    }

    #[test]
    fn test_incomplete_until_newline() {
        let mut decoder = LineDecoder::new(5);
        let line = response_line(5);
        let (head, tail) = line.split_at(10);
        decoder.feed(head.as_bytes());
        assert!(matches!(decoder.try_decode(), DecodeResult::Incomplete));
        decoder.feed(tail.as_bytes());
        assert!(matches!(decoder.try_decode(), DecodeResult::Valid(_)));
    }

    #[test]
    fn test_round_trip_with_noise_in_any_position() {
        let req = encode(&classify("find BRCA1 genes")).unwrap();
        let response = response_line(req.id);
        let noise = "Loading cache...\nWARNING: slow network\n{\"log\": \"json but not a response\"}\n";

        let streams = [
            format!("{noise}{response}"),
            format!("{response}{noise}"),
            format!("{noise}{response}{noise}"),
        ];
        for stream in streams {
            let mut decoder = LineDecoder::new(req.id);
            decoder.feed(stream.as_bytes());
            let envelope = decoder.scan().expect("response should decode");
            assert_eq!(envelope.id, Some(req.id));
        }
    }

    #[test]
    fn test_byte_by_byte_feeding() {
        let mut decoder = LineDecoder::new(9);
        let stream = format!("noise line\n{}", response_line(9));
        let mut found = None;
        for byte in stream.as_bytes() {
            decoder.feed(std::slice::from_ref(byte));
            if let Some(env) = decoder.scan() {
                found = Some(env);
                break;
            }
        }
        assert_eq!(found.unwrap().id, Some(9));
        assert_eq!(decoder.discarded_lines(), ["noise line"]);
    }

    #[test]
    fn test_uncorrelated_response_is_noise() {
        let mut decoder = LineDecoder::new(2);
        decoder.feed(response_line(1).as_bytes());
        assert!(decoder.scan().is_none());
        assert_eq!(decoder.discarded_total(), 1);
    }

    #[test]
    fn test_finish_accepts_unterminated_last_line() {
        let mut decoder = LineDecoder::new(4);
        let line = response_line(4);
        decoder.feed(line.trim_end().as_bytes());
        assert!(decoder.scan().is_none());
        assert!(decoder.finish().is_some());
    }

    #[test]
    fn test_blank_lines_are_not_recorded() {
        let mut decoder = LineDecoder::new(1);
        decoder.feed(b"\n\n  \n");
        assert!(decoder.scan().is_none());
        assert!(decoder.discarded_lines().is_empty());
    }

    #[test]
    fn test_diagnostics_are_bounded() {
        let mut decoder = LineDecoder::new(1);
        for i in 0..(MAX_DISCARDED_LINES + 5) {
            decoder.feed(format!("log line {i}\n").as_bytes());
        }
        assert!(decoder.scan().is_none());
        assert_eq!(decoder.discarded_lines().len(), MAX_DISCARDED_LINES);
        assert_eq!(decoder.discarded_total(), MAX_DISCARDED_LINES + 5);
        assert!(decoder.diagnostics().ends_with("...(5 more lines)"));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("abc", 3), "abc");
        assert_eq!(truncate_chars("héllo", 2), "hé...");
    }
}
