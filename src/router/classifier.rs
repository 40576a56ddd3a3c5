//! Command classifier: turns free text into an [`Intent`].
//!
//! One generic loop walks the rule sets from [`super::rules`] in order and
//! stops at the first rule that yields a well-formed intent. When nothing
//! matches, a permissive best-guess heuristic treats the first
//! gene-symbol-shaped token as a gene search. Classification never fails:
//! the worst outcome is [`Intent::unrecognized`].

use std::sync::OnceLock;

use regex::{Captures, Regex};

use super::rules::{self, GroupRole, PatternRule, Scan};
use super::species;
use super::types::{Intent, IntentKind};

// ─── Constants ──────────────────────────────────────────────────────────────

/// Result limit for best-guess gene searches.
const BEST_GUESS_LIMIT: u32 = 10;

/// Minimum length (exclusive) of a best-guess token.
const BEST_GUESS_MIN_LEN: usize = 2;

/// Trailing decoration such as "in the Alliance" or "from AGR".
static DECORATIVE_SUFFIX: OnceLock<Option<Regex>> = OnceLock::new();

fn decorative_suffix() -> Option<&'static Regex> {
    DECORATIVE_SUFFIX
        .get_or_init(|| {
            Regex::new(
                r"(?i)\s+(?:in|from|on|using|via|with)\s+(?:the\s+)?(?:alliance(?:\s+of\s+genome\s+resources)?|agr)$",
            )
            .map_err(|e| tracing::error!(error = %e, "suffix pattern failed to compile"))
            .ok()
        })
        .as_ref()
}

// ─── Prepared text ──────────────────────────────────────────────────────────

/// The two copies of the input the rules scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedText {
    /// Suffix-stripped, trimmed, original case.
    pub original: String,
    /// Lower-cased copy of `original`.
    pub lowered: String,
}

impl PreparedText {
    pub fn new(text: &str) -> Self {
        let original = strip_decorations(text);
        let lowered = original.to_lowercase();
        Self { original, lowered }
    }

    fn view(&self, scan: Scan) -> &str {
        match scan {
            Scan::Lowered => &self.lowered,
            Scan::Original => &self.original,
        }
    }
}

/// Trim whitespace, trailing punctuation and a decorative suffix.
fn strip_decorations(text: &str) -> String {
    let trim_tail = |s: &str| -> String {
        s.trim()
            .trim_end_matches(['?', '.', '!'])
            .trim_end()
            .to_string()
    };

    let mut out = trim_tail(text);
    if let Some(re) = decorative_suffix() {
        if let Some(m) = re.find(&out) {
            out.truncate(m.start());
            out = trim_tail(&out);
        }
    }
    out
}

// ─── Classification ─────────────────────────────────────────────────────────

/// Classify free text into exactly one intent.
pub fn classify(text: &str) -> Intent {
    let prepared = PreparedText::new(text);
    if prepared.original.is_empty() {
        return Intent::unrecognized();
    }

    for set in rules::rule_sets() {
        for rule in &set.rules {
            let Some(caps) = rule.matcher.captures(prepared.view(rule.scan)) else {
                continue;
            };
            if let Some(intent) = intent_from_match(rule, &caps) {
                tracing::debug!(
                    rule = rule.name,
                    kind = ?intent.kind(),
                    "query classified"
                );
                return intent;
            }
            tracing::trace!(rule = rule.name, "rule matched but declined");
        }
    }

    let intent = best_guess(&prepared.original);
    tracing::debug!(kind = ?intent.kind(), "no rule matched, used fallback");
    intent
}

/// Build an intent from a rule match, or `None` if the captures are unusable.
fn intent_from_match(rule: &PatternRule, caps: &Captures<'_>) -> Option<Intent> {
    let mut primary: Option<&str> = None;
    let mut species_raw: Option<&str> = None;

    for (i, role) in rule.roles.iter().enumerate() {
        let Some(m) = caps.get(i + 1) else {
            continue;
        };
        match role {
            GroupRole::Primary => primary = Some(m.as_str().trim()),
            GroupRole::Species => species_raw = Some(m.as_str().trim()),
        }
    }

    let primary = primary.filter(|p| !p.is_empty() && !rules::is_filler(p));

    let intent = match rule.kind {
        IntentKind::SearchGenes => Intent::search_genes(
            primary?,
            species_raw.filter(|s| !s.is_empty()).map(species::normalize),
            rule.limit,
        ),
        IntentKind::SearchDiseases => Intent::search_diseases(primary?, rule.limit),
        IntentKind::GetEntityInfo => Intent::entity_info(&species::normalize_entity_id(primary?)),
        IntentKind::BlastSequence => Intent::blast_sequence(primary?),
        IntentKind::GetCacheStats => Intent::cache_stats(),
        IntentKind::Unrecognized => return None,
    };

    intent.is_recognized().then_some(intent)
}

/// Permissive fallback: the first token shaped like a gene symbol.
fn best_guess(original: &str) -> Intent {
    let token = original
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-'))
        .find(|t| looks_like_symbol(t));

    match token {
        Some(symbol) => Intent::search_genes(symbol, None, BEST_GUESS_LIMIT).with_description(
            format!("Best guess: searching for genes matching '{symbol}' across all species"),
        ),
        None => Intent::unrecognized(),
    }
}

/// Uppercase letters, digits and hyphens, at least one letter, length > 2.
fn looks_like_symbol(token: &str) -> bool {
    token.len() > BEST_GUESS_MIN_LEN
        && token
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        && token
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
        && token.chars().any(|c| c.is_ascii_uppercase())
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_genes_without_species() {
        let intent = classify("find BRCA1 genes");
        assert_eq!(intent.kind(), IntentKind::SearchGenes);
        assert_eq!(intent.primary_argument(), Some("brca1"));
        assert_eq!(intent.species(), None);
    }

    #[test]
    fn test_find_genes_in_species() {
        let intent = classify("find BRCA1 genes in mouse");
        assert_eq!(intent.kind(), IntentKind::SearchGenes);
        assert_eq!(intent.primary_argument(), Some("brca1"));
        assert_eq!(intent.species(), Some("Mus musculus"));
    }

    #[test]
    fn test_decorative_suffix_is_ignored() {
        let intent = classify("Find BRCA1 genes in the Alliance?");
        assert_eq!(intent.kind(), IntentKind::SearchGenes);
        assert_eq!(intent.primary_argument(), Some("brca1"));
        assert_eq!(intent.species(), None);

        let intent = classify("search for tp53 genes in zebrafish from AGR");
        assert_eq!(intent.species(), Some("Danio rerio"));
    }

    #[test]
    fn test_gene_rule_variants() {
        let intent = classify("show me genes named pax6 in flies");
        assert_eq!(intent.primary_argument(), Some("pax6"));
        assert_eq!(intent.species(), Some("Drosophila melanogaster"));

        let intent = classify("search shh in mice");
        assert_eq!(intent.primary_argument(), Some("shh"));
        assert_eq!(intent.species(), Some("Mus musculus"));
        assert_eq!(intent.result_limit(), Some(5));

        let intent = classify("list all hox genes");
        assert_eq!(intent.primary_argument(), Some("hox"));
        assert_eq!(intent.result_limit(), Some(20));
    }

    #[test]
    fn test_unknown_species_passes_through() {
        let intent = classify("find brca2 genes in axolotl");
        assert_eq!(intent.species(), Some("axolotl"));
    }

    #[test]
    fn test_entity_info_preserves_case() {
        let intent = classify("info about HGNC:1100");
        assert_eq!(intent.kind(), IntentKind::GetEntityInfo);
        assert_eq!(intent.primary_argument(), Some("HGNC:1100"));
    }

    #[test]
    fn test_entity_bare_id_and_prefix_normalization() {
        let intent = classify("MGI:97490");
        assert_eq!(intent.kind(), IntentKind::GetEntityInfo);
        assert_eq!(intent.primary_argument(), Some("MGI:97490"));

        let intent = classify("details for Hgnc:1100");
        assert_eq!(intent.primary_argument(), Some("HGNC:1100"));
    }

    #[test]
    fn test_lowercase_identifier_is_not_entity_info() {
        let intent = classify("info about hgnc:1100");
        assert_ne!(intent.kind(), IntentKind::GetEntityInfo);
    }

    #[test]
    fn test_disease_rules() {
        let intent = classify("find diseases related to breast cancer");
        assert_eq!(intent.kind(), IntentKind::SearchDiseases);
        assert_eq!(intent.primary_argument(), Some("breast cancer"));

        let intent = classify("Which diseases are associated with insulin resistance?");
        assert_eq!(intent.kind(), IntentKind::SearchDiseases);
        assert_eq!(intent.primary_argument(), Some("insulin resistance"));

        let intent = classify("tell me about Alzheimer's disease");
        assert_eq!(intent.kind(), IntentKind::SearchDiseases);
        assert_eq!(intent.primary_argument(), Some("alzheimer's disease"));
        assert_eq!(intent.result_limit(), Some(3));
    }

    #[test]
    fn test_genes_take_precedence_over_diseases() {
        let text = "find diseases associated with brca1 genes";
        let disease_rule_matches = rules::rule_sets()
            .iter()
            .find(|set| set.kind == IntentKind::SearchDiseases)
            .unwrap()
            .rules
            .iter()
            .any(|rule| rule.matcher.is_match(text));
        assert!(disease_rule_matches, "input should match a disease rule too");

        let intent = classify(text);
        assert_eq!(intent.kind(), IntentKind::SearchGenes);
        assert_eq!(intent.primary_argument(), Some("brca1"));
    }

    #[test]
    fn test_blast_sequence() {
        let intent = classify("blast ATGCGTACGTTAGC");
        assert_eq!(intent.kind(), IntentKind::BlastSequence);
        assert_eq!(intent.primary_argument(), Some("ATGCGTACGTTAGC"));

        let intent = classify("acgtacgtacgtacgt");
        assert_eq!(intent.kind(), IntentKind::BlastSequence);
    }

    #[test]
    fn test_short_sequence_is_not_blast() {
        let intent = classify("blast ACGTACG");
        assert_ne!(intent.kind(), IntentKind::BlastSequence);
        let intent = classify("ACGT");
        assert_ne!(intent.kind(), IntentKind::BlastSequence);
    }

    #[test]
    fn test_cache_stats() {
        assert_eq!(classify("cache stats").kind(), IntentKind::GetCacheStats);
        assert_eq!(classify("Show cache statistics").kind(), IntentKind::GetCacheStats);
        assert_eq!(classify("stats").kind(), IntentKind::GetCacheStats);
    }

    #[test]
    fn test_filler_capture_falls_through() {
        let intent = classify("find all genes");
        assert_eq!(intent.kind(), IntentKind::Unrecognized);
    }

    #[test]
    fn test_best_guess_fallback() {
        let intent = classify("what does TP53 do?");
        assert_eq!(intent.kind(), IntentKind::SearchGenes);
        assert_eq!(intent.primary_argument(), Some("TP53"));
        assert!(intent.description.starts_with("Best guess"));
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(classify("asdkjfh").kind(), IntentKind::Unrecognized);
        assert_eq!(classify("ok").kind(), IntentKind::Unrecognized);
        assert_eq!(classify("").kind(), IntentKind::Unrecognized);
        assert_eq!(classify("   ").kind(), IntentKind::Unrecognized);
    }

    #[test]
    fn test_description_always_populated() {
        for text in ["find BRCA1 genes", "cache stats", "asdkjfh", "info about HGNC:1100"] {
            assert!(!classify(text).description.is_empty());
        }
    }

    #[test]
    fn test_strip_decorations() {
        assert_eq!(strip_decorations("  find x genes in the Alliance of Genome Resources. "), "find x genes");
        assert_eq!(strip_decorations("cache stats!!"), "cache stats");
        assert_eq!(strip_decorations("alliance"), "alliance");
    }

    #[test]
    fn test_looks_like_symbol() {
        assert!(looks_like_symbol("TP53"));
        assert!(looks_like_symbol("BRCA1"));
        assert!(looks_like_symbol("HOX-A1"));
        assert!(!looks_like_symbol("AB"));
        assert!(!looks_like_symbol("asdkjfh"));
        assert!(!looks_like_symbol("1234"));
    }

    #[test]
    fn test_trailing_gene_word_does_not_split_identifiers() {
        for text in ["get HGNC:1100 gene", "info about HGNC:1100 genes"] {
            let intent = classify(text);
            assert_eq!(intent.kind(), IntentKind::GetEntityInfo, "for {text:?}");
            assert_eq!(intent.primary_argument(), Some("HGNC:1100"));
        }
    }

    #[test]
    fn test_gene_word_is_never_the_symbol() {
        let intent = classify("find genes in mouse");
        assert_ne!(intent.primary_argument(), Some("genes"));
        assert_eq!(intent.kind(), IntentKind::Unrecognized);
    }

    #[test]
    fn test_spaced_sequence_is_blast() {
        let intent = classify("blast ACGTACGTAC GTACGTAC");
        assert_eq!(intent.kind(), IntentKind::BlastSequence);
        assert_eq!(intent.primary_argument(), Some("ACGTACGTACGTACGTAC"));

        let bare = classify("acgtacgtac gtac");
        assert_eq!(bare.kind(), IntentKind::BlastSequence);
        assert_eq!(bare.primary_argument(), Some("ACGTACGTACGTAC"));
    }
}
