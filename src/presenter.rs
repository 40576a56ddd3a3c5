//! Result presentation.
//!
//! Dispatches a decoded worker response to a text renderer per intent kind.
//! Worker data shapes are not guaranteed, so every renderer reads the JSON
//! loosely: missing fields print as `-`, and a shape no renderer
//! understands falls back to pretty-printed JSON.

use serde_json::Value;

use crate::router::{Intent, IntentKind};
use crate::rpc::WorkerResponse;

/// Placeholder for a missing field.
const MISSING: &str = "-";

/// Render a response for the terminal.
pub fn render(intent: &Intent, response: &WorkerResponse) -> String {
    let payload = match response {
        WorkerResponse::Error { code, message, .. } => return render_error(*code, message),
        WorkerResponse::Payload(payload) => payload,
    };

    let data = payload.content_json();
    let rendered = match intent.kind() {
        IntentKind::SearchGenes => render_genes(intent, &data),
        IntentKind::SearchDiseases => render_diseases(intent, &data),
        IntentKind::GetEntityInfo => render_entity(&data),
        IntentKind::BlastSequence => render_blast(&data),
        IntentKind::GetCacheStats => render_cache_stats(&data),
        IntentKind::Unrecognized => None,
    };
    rendered.unwrap_or_else(|| pretty(&data))
}

/// Render a response as raw JSON (`--json`).
pub fn render_json(response: &WorkerResponse) -> String {
    match response {
        WorkerResponse::Payload(payload) => pretty(payload.raw()),
        WorkerResponse::Error {
            code,
            message,
            data,
        } => pretty(&serde_json::json!({
            "error": { "code": code, "message": message, "data": data }
        })),
    }
}

pub fn render_error(code: i32, message: &str) -> String {
    format!("error [{code}]: {message}")
}

// ─── Per-kind renderers ─────────────────────────────────────────────────────

fn render_genes(intent: &Intent, data: &Value) -> Option<String> {
    let results = results_array(data)?;
    let query = intent.primary_argument().unwrap_or(MISSING);
    let scope = intent.species().unwrap_or("all species");

    let mut out = format!(
        "Genes matching '{query}' in {scope}: {}\n",
        count_summary(data, results.len())
    );
    for gene in results {
        out.push_str(&format!(
            "  {:<16} {:<12} {}  [{}]\n",
            field(gene, &["id", "primaryKey", "curie"]),
            field(gene, &["symbol"]),
            field(gene, &["name", "full_name"]),
            field(gene, &["species", "speciesName"]),
        ));
    }
    Some(out.trim_end().to_string())
}

fn render_diseases(intent: &Intent, data: &Value) -> Option<String> {
    let results = results_array(data)?;
    let query = intent.primary_argument().unwrap_or(MISSING);

    let mut out = format!(
        "Diseases matching '{query}': {}\n",
        count_summary(data, results.len())
    );
    for disease in results {
        out.push_str(&format!(
            "  {:<16} {}\n",
            field(disease, &["id", "primaryKey", "curie"]),
            field(disease, &["name"]),
        ));
    }
    Some(out.trim_end().to_string())
}

fn render_entity(data: &Value) -> Option<String> {
    let entity = data.as_object()?;
    if !entity.contains_key("symbol") && !entity.contains_key("name") {
        return None;
    }

    let mut out = format!(
        "{} ({})\n",
        field(data, &["symbol", "name"]),
        field(data, &["id", "primaryKey", "curie"])
    );
    for (label, keys) in [
        ("Name", &["name"][..]),
        ("Species", &["species", "speciesName"][..]),
        ("Type", &["soTermName", "type"][..]),
        ("Location", &["genomeLocation", "location"][..]),
        ("Synopsis", &["geneSynopsis", "automatedGeneSynopsis", "description"][..]),
    ] {
        let value = field(data, keys);
        if value != MISSING {
            out.push_str(&format!("  {label:<9} {value}\n"));
        }
    }
    Some(out.trim_end().to_string())
}

fn render_blast(data: &Value) -> Option<String> {
    let hits = data
        .get("hits")
        .and_then(Value::as_array)
        .or_else(|| results_array(data))?;

    if hits.is_empty() {
        return Some("No BLAST hits.".to_string());
    }

    let mut out = format!("{} BLAST hit(s)\n", hits.len());
    for hit in hits {
        out.push_str(&format!(
            "  {:<16} e={:<10} identity={:<7} {}\n",
            field(hit, &["id", "accession"]),
            field(hit, &["evalue", "e_value"]),
            field(hit, &["identity", "percent_identity"]),
            field(hit, &["description", "title"]),
        ));
    }
    Some(out.trim_end().to_string())
}

fn render_cache_stats(data: &Value) -> Option<String> {
    let stats = data.as_object()?;
    let mut keys: Vec<&String> = stats.keys().collect();
    keys.sort();

    let mut out = String::from("Cache statistics\n");
    for key in keys {
        let value = &stats[key];
        if value.is_object() || value.is_array() {
            continue;
        }
        out.push_str(&format!("  {key:<20} {}\n", scalar(value)));
    }
    Some(out.trim_end().to_string())
}

// ─── JSON helpers ───────────────────────────────────────────────────────────

/// The list of results: `results`, `data` or a top-level array.
fn results_array(data: &Value) -> Option<&Vec<Value>> {
    data.get("results")
        .and_then(Value::as_array)
        .or_else(|| data.get("data").and_then(Value::as_array))
        .or_else(|| data.as_array())
}

/// "N result(s)" or "N of TOTAL result(s)" when the worker reports a total.
fn count_summary(data: &Value, shown: usize) -> String {
    match data.get("total").and_then(Value::as_u64) {
        Some(total) if total as usize != shown => format!("{shown} of {total} result(s)"),
        _ => format!("{shown} result(s)"),
    }
}

/// First present key, rendered as text. Objects contribute their `name`.
fn field(item: &Value, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| item.get(*key))
        .find_map(|value| match value {
            Value::Null => None,
            Value::Object(map) => map.get("name").map(scalar),
            other => Some(scalar(other)),
        })
        .unwrap_or_else(|| MISSING.to_string())
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => MISSING.to_string(),
        other => other.to_string(),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::Payload;
    use serde_json::json;

    fn payload(value: Value) -> WorkerResponse {
        WorkerResponse::Payload(Payload(value))
    }

    #[test]
    fn test_gene_list() {
        let intent = Intent::search_genes("BRCA1", Some("Mus musculus".into()), 10);
        let out = render(
            &intent,
            &payload(json!({
                "total": 12,
                "results": [
                    {"id": "MGI:104537", "symbol": "Brca1", "name": "breast cancer 1",
                     "species": {"name": "Mus musculus"}}
                ]
            })),
        );
        assert!(out.starts_with("Genes matching 'BRCA1' in Mus musculus: 1 of 12 result(s)"));
        assert!(out.contains("MGI:104537"));
        assert!(out.contains("[Mus musculus]"));
    }

    #[test]
    fn test_missing_fields_render_placeholder() {
        let intent = Intent::search_diseases("asthma", 10);
        let out = render(&intent, &payload(json!({"results": [{"name": "asthma"}]})));
        assert!(out.contains("  -"));
        assert!(out.contains("asthma"));
    }

    #[test]
    fn test_mcp_text_content_is_unwrapped() {
        let intent = Intent::search_diseases("asthma", 10);
        let out = render(
            &intent,
            &payload(json!({
                "content": [{"type": "text", "text": "{\"results\": [{\"id\": \"DOID:2841\", \"name\": \"asthma\"}]}"}]
            })),
        );
        assert!(out.contains("DOID:2841"));
    }

    #[test]
    fn test_entity_summary() {
        let intent = Intent::entity_info("HGNC:1100");
        let out = render(
            &intent,
            &payload(json!({"id": "HGNC:1100", "symbol": "BRCA1", "species": "Homo sapiens"})),
        );
        assert!(out.starts_with("BRCA1 (HGNC:1100)"));
        assert!(out.contains("Species   Homo sapiens"));
        assert!(!out.contains("Synopsis"));
    }

    #[test]
    fn test_blast_hits() {
        let intent = Intent::blast_sequence("ATGCGATACGCTTGA");
        let out = render(
            &intent,
            &payload(json!({"hits": [{"accession": "NM_007294", "evalue": 1e-30}]})),
        );
        assert!(out.starts_with("1 BLAST hit(s)"));
        assert!(out.contains("NM_007294"));

        let empty = render(&intent, &payload(json!({"hits": []})));
        assert_eq!(empty, "No BLAST hits.");
    }

    #[test]
    fn test_cache_stats_sorted() {
        let out = render(
            &Intent::cache_stats(),
            &payload(json!({"misses": 2, "hits": 10, "nested": {"x": 1}})),
        );
        let hits = out.find("hits").unwrap();
        let misses = out.find("misses").unwrap();
        assert!(hits < misses);
        assert!(!out.contains("nested"));
    }

    #[test]
    fn test_unknown_shape_falls_back_to_json() {
        let intent = Intent::search_genes("BRCA1", None, 10);
        let out = render(&intent, &payload(json!({"unexpected": true})));
        assert!(out.contains("\"unexpected\": true"));
    }

    #[test]
    fn test_worker_error() {
        let response = WorkerResponse::Error {
            code: -32602,
            message: "bad gene id".into(),
            data: None,
        };
        assert_eq!(
            render(&Intent::entity_info("HGNC:1"), &response),
            "error [-32602]: bad gene id"
        );
        assert!(render_json(&response).contains("\"code\": -32602"));
    }

    #[test]
    fn test_render_json_is_raw_payload() {
        let out = render_json(&payload(json!({"results": []})));
        assert_eq!(out, "{\n  \"results\": []\n}");
    }
}
