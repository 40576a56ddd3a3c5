//! Shared types for the command router.

use serde::Serialize;

// ─── Constants ──────────────────────────────────────────────────────────────

/// Smallest result limit a search may request.
pub const MIN_RESULT_LIMIT: u32 = 1;

/// Largest result limit a search may request.
pub const MAX_RESULT_LIMIT: u32 = 20;

// ─── IntentKind ─────────────────────────────────────────────────────────────

/// The closed set of operations a query can be classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    SearchGenes,
    SearchDiseases,
    GetEntityInfo,
    BlastSequence,
    GetCacheStats,
    Unrecognized,
}

impl IntentKind {
    /// Short label used in history listings and logs.
    pub fn label(self) -> &'static str {
        match self {
            IntentKind::SearchGenes => "gene search",
            IntentKind::SearchDiseases => "disease search",
            IntentKind::GetEntityInfo => "entity info",
            IntentKind::BlastSequence => "sequence search",
            IntentKind::GetCacheStats => "cache stats",
            IntentKind::Unrecognized => "unrecognized",
        }
    }
}

// ─── Action ─────────────────────────────────────────────────────────────────

/// A classified operation together with exactly the arguments it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    SearchGenes {
        query: String,
        /// Canonical species name; `None` searches all species.
        species: Option<String>,
        limit: u32,
    },
    SearchDiseases {
        query: String,
        limit: u32,
    },
    GetEntityInfo {
        entity_id: String,
    },
    BlastSequence {
        sequence: String,
    },
    GetCacheStats,
    Unrecognized,
}

// ─── Intent ─────────────────────────────────────────────────────────────────

/// The structured interpretation of one free-text query.
///
/// Constructors fail closed: a required argument that is empty after
/// trimming yields [`Intent::unrecognized`] instead of a half-built intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Intent {
    pub action: Action,
    /// Human-readable summary of the interpreted action.
    pub description: String,
}

impl Intent {
    /// Gene search, optionally restricted to one canonical species.
    pub fn search_genes(query: &str, species: Option<String>, limit: u32) -> Self {
        let query = query.trim();
        if query.is_empty() {
            return Self::unrecognized();
        }
        let species = species.filter(|s| !s.trim().is_empty());
        let description = match &species {
            Some(s) => format!("Searching for genes matching '{query}' in {s}"),
            None => format!("Searching for genes matching '{query}' across all species"),
        };
        Self {
            action: Action::SearchGenes {
                query: query.to_string(),
                species,
                limit: clamp_limit(limit),
            },
            description,
        }
    }

    /// Disease search by keyword.
    pub fn search_diseases(query: &str, limit: u32) -> Self {
        let query = query.trim();
        if query.is_empty() {
            return Self::unrecognized();
        }
        Self {
            action: Action::SearchDiseases {
                query: query.to_string(),
                limit: clamp_limit(limit),
            },
            description: format!("Searching for diseases related to '{query}'"),
        }
    }

    /// Detail lookup for a single entity identifier.
    pub fn entity_info(entity_id: &str) -> Self {
        let entity_id = entity_id.trim();
        if entity_id.is_empty() {
            return Self::unrecognized();
        }
        Self {
            action: Action::GetEntityInfo {
                entity_id: entity_id.to_string(),
            },
            description: format!("Fetching details for {entity_id}"),
        }
    }

    /// BLAST search for a nucleotide or protein sequence.
    pub fn blast_sequence(sequence: &str) -> Self {
        let sequence: String = sequence
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();
        if sequence.is_empty() {
            return Self::unrecognized();
        }
        Self {
            description: format!("Running BLAST for a {}-residue sequence", sequence.len()),
            action: Action::BlastSequence { sequence },
        }
    }

    /// Worker cache statistics.
    pub fn cache_stats() -> Self {
        Self {
            action: Action::GetCacheStats,
            description: "Fetching worker cache statistics".to_string(),
        }
    }

    /// Input that no rule (and no fallback) could interpret.
    pub fn unrecognized() -> Self {
        Self {
            action: Action::Unrecognized,
            description: "Could not interpret the request".to_string(),
        }
    }

    /// Replace the description, keeping the action.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn kind(&self) -> IntentKind {
        match self.action {
            Action::SearchGenes { .. } => IntentKind::SearchGenes,
            Action::SearchDiseases { .. } => IntentKind::SearchDiseases,
            Action::GetEntityInfo { .. } => IntentKind::GetEntityInfo,
            Action::BlastSequence { .. } => IntentKind::BlastSequence,
            Action::GetCacheStats => IntentKind::GetCacheStats,
            Action::Unrecognized => IntentKind::Unrecognized,
        }
    }

    /// The main free-text argument, for kinds that carry one.
    pub fn primary_argument(&self) -> Option<&str> {
        match &self.action {
            Action::SearchGenes { query, .. } | Action::SearchDiseases { query, .. } => {
                Some(query)
            }
            Action::GetEntityInfo { entity_id } => Some(entity_id),
            Action::BlastSequence { sequence } => Some(sequence),
            Action::GetCacheStats | Action::Unrecognized => None,
        }
    }

    /// The species filter; only gene searches carry one.
    pub fn species(&self) -> Option<&str> {
        match &self.action {
            Action::SearchGenes { species, .. } => species.as_deref(),
            _ => None,
        }
    }

    pub fn result_limit(&self) -> Option<u32> {
        match self.action {
            Action::SearchGenes { limit, .. } | Action::SearchDiseases { limit, .. } => {
                Some(limit)
            }
            _ => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        self.kind() != IntentKind::Unrecognized
    }
}

/// Clamp a requested limit into the supported range.
pub fn clamp_limit(limit: u32) -> u32 {
    limit.clamp(MIN_RESULT_LIMIT, MAX_RESULT_LIMIT)
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_required_argument_fails_closed() {
        assert_eq!(Intent::search_genes("  ", None, 10).kind(), IntentKind::Unrecognized);
        assert_eq!(Intent::search_diseases("", 10).kind(), IntentKind::Unrecognized);
        assert_eq!(Intent::entity_info(" ").kind(), IntentKind::Unrecognized);
        assert_eq!(Intent::blast_sequence(" \t").kind(), IntentKind::Unrecognized);
    }

    #[test]
    fn test_limit_is_clamped() {
        let intent = Intent::search_genes("brca1", None, 500);
        assert_eq!(intent.result_limit(), Some(MAX_RESULT_LIMIT));
        let intent = Intent::search_diseases("asthma", 0);
        assert_eq!(intent.result_limit(), Some(MIN_RESULT_LIMIT));
    }

    #[test]
    fn test_blank_species_is_dropped() {
        let intent = Intent::search_genes("brca1", Some(" ".into()), 10);
        assert_eq!(intent.species(), None);
        assert!(intent.description.contains("all species"));
    }

    #[test]
    fn test_blast_sequence_is_uppercased_and_compacted() {
        let intent = Intent::blast_sequence("acgt acgt ac");
        assert_eq!(intent.primary_argument(), Some("ACGTACGTAC"));
    }

    #[test]
    fn test_accessors_for_argumentless_kinds() {
        let stats = Intent::cache_stats();
        assert_eq!(stats.primary_argument(), None);
        assert_eq!(stats.result_limit(), None);
        assert!(stats.is_recognized());
        assert!(!Intent::unrecognized().is_recognized());
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let intent = Intent::search_genes("brca1", Some("Mus musculus".into()), 10);
        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["action"]["kind"], "search_genes");
        assert_eq!(json["action"]["query"], "brca1");
        assert_eq!(json["action"]["species"], "Mus musculus");
        assert!(json["description"].as_str().unwrap().contains("brca1"));
    }
}
