//! Classification rule table.
//!
//! Every rule is data: the intent kind it produces, a regex with up to two
//! capture groups, the role of each group, which copy of the input it scans
//! and the result limit it implies. Rules are grouped into rule sets, one per
//! kind, and the rule sets are stored in evaluation order:
//!
//! gene search → disease search → entity info → sequence search → cache stats
//!
//! The fallback heuristic is not a rule; it lives in the classifier and only
//! runs when every rule set declines.

use std::sync::OnceLock;

use regex::Regex;

use super::types::IntentKind;

// ─── Rule model ─────────────────────────────────────────────────────────────

/// Which intent field a capture group fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRole {
    Primary,
    Species,
}

/// Which copy of the input a rule is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// Lower-cased working copy, for free text.
    Lowered,
    /// Original-case copy, for case-sensitive identifiers.
    Original,
}

/// One compiled classification rule.
#[derive(Debug)]
pub struct PatternRule {
    /// Stable name used in logs and tests.
    pub name: &'static str,
    pub kind: IntentKind,
    pub matcher: Regex,
    /// Role of capture group `i + 1`.
    pub roles: &'static [GroupRole],
    pub scan: Scan,
    /// Result limit for search kinds; ignored by the others.
    pub limit: u32,
}

/// An ordered group of rules that all produce the same kind.
#[derive(Debug)]
pub struct RuleSet {
    pub kind: IntentKind,
    pub rules: Vec<PatternRule>,
}

/// Uncompiled rule, as written in the tables below.
struct RuleSpec {
    name: &'static str,
    pattern: &'static str,
    roles: &'static [GroupRole],
    scan: Scan,
    limit: u32,
}

// ─── Rule tables ────────────────────────────────────────────────────────────

use GroupRole::{Primary, Species};

// Building blocks, spliced into the patterns with `concat!`.
macro_rules! verb {
    () => {
        r"(?:please\s+)?(?:find|search(?:\s+for)?|show(?:\s+me)?|get|look\s*up|list|fetch)"
    };
}
macro_rules! symbol {
    () => {
        r"([a-z0-9][a-z0-9_.\-]*)"
    };
}
macro_rules! species {
    () => {
        r"((?:fruit\s+)?[a-z]+(?:\s+[a-z]+)?)"
    };
}
// At least 10 residues up front; later blocks may be split by whitespace.
macro_rules! residues {
    () => {
        r"([acdefghiklmnpqrstuvwy]{10,}(?:\s+[acdefghiklmnpqrstuvwy]+)*)"
    };
}

const GENE_RULES: &[RuleSpec] = &[
    RuleSpec {
        name: "genes.list_all",
        pattern: concat!(
            r"^(?:list|show)\s+all\s+",
            symbol!(),
            r"\s+genes?(?:\s+in\s+(?:the\s+)?",
            species!(),
            r")?$"
        ),
        roles: &[Primary, Species],
        scan: Scan::Lowered,
        limit: 20,
    },
    RuleSpec {
        name: "genes.symbol_in_species",
        pattern: concat!(
            r"^",
            verb!(),
            r"\s+(?:all\s+)?(?:the\s+)?",
            symbol!(),
            r"\s+genes?\s+(?:in|from|for)\s+(?:the\s+)?",
            species!(),
            r"$"
        ),
        roles: &[Primary, Species],
        scan: Scan::Lowered,
        limit: 10,
    },
    RuleSpec {
        name: "genes.symbol",
        pattern: concat!(
            r"^",
            verb!(),
            r"\s+(?:all\s+)?(?:the\s+)?",
            symbol!(),
            r"\s+genes?$"
        ),
        roles: &[Primary],
        scan: Scan::Lowered,
        limit: 10,
    },
    RuleSpec {
        name: "genes.named",
        pattern: concat!(
            r"^",
            verb!(),
            r"\s+(?:all\s+)?genes?\s+(?:named|called|matching|like|for|with\s+symbol)\s+",
            symbol!(),
            r"(?:\s+in\s+(?:the\s+)?",
            species!(),
            r")?$"
        ),
        roles: &[Primary, Species],
        scan: Scan::Lowered,
        limit: 10,
    },
    RuleSpec {
        name: "genes.bare_symbol_in_species",
        pattern: concat!(
            r"^",
            verb!(),
            r"\s+",
            symbol!(),
            r"\s+in\s+(?:the\s+)?(humans?|mouse|mice|rats?|zebrafish|xenopus|frogs?|fly|flies|worms?|yeast)$"
        ),
        roles: &[Primary, Species],
        scan: Scan::Lowered,
        limit: 5,
    },
    RuleSpec {
        name: "genes.trailing_symbol",
        pattern: concat!(r"(?:^|\s)", symbol!(), r"\s+genes?$"),
        roles: &[Primary],
        scan: Scan::Lowered,
        limit: 5,
    },
];

const DISEASE_RULES: &[RuleSpec] = &[
    RuleSpec {
        name: "diseases.related_to",
        pattern: concat!(
            r"^",
            verb!(),
            r"\s+(?:all\s+)?(?:the\s+)?(?:diseases?|disorders?|conditions?)\s+",
            r"(?:related\s+to|associated\s+with|linked\s+to|involving|for|about|like|matching|named|called)\s+(.+)$"
        ),
        roles: &[Primary],
        scan: Scan::Lowered,
        limit: 10,
    },
    RuleSpec {
        name: "diseases.question",
        pattern: concat!(
            r"^(?:what|which)\s+(?:diseases?|disorders?|conditions?)\s+(?:are\s+|is\s+)?",
            r"(?:related\s+to|associated\s+with|linked\s+to|caused\s+by|involve|involving)\s+(.+)$"
        ),
        roles: &[Primary],
        scan: Scan::Lowered,
        limit: 10,
    },
    RuleSpec {
        name: "diseases.list_all",
        pattern: r"^(?:list|show)\s+all\s+(.+?)\s+(?:diseases?|disorders?)$",
        roles: &[Primary],
        scan: Scan::Lowered,
        limit: 20,
    },
    RuleSpec {
        name: "diseases.keyword",
        pattern: concat!(
            r"^",
            verb!(),
            r"\s+(?:all\s+)?(.+?)\s+(?:diseases?|disorders?|conditions?)$"
        ),
        roles: &[Primary],
        scan: Scan::Lowered,
        limit: 5,
    },
    RuleSpec {
        name: "diseases.describe",
        pattern: r"^(?:tell\s+me\s+about|what\s+is|describe)\s+(.+?\s+(?:disease|disorder|syndrome))$",
        roles: &[Primary],
        scan: Scan::Lowered,
        limit: 3,
    },
    RuleSpec {
        name: "diseases.trailing_relation",
        pattern: r"\b(?:diseases?|disorders?)\s+(?:related\s+to|associated\s+with|linked\s+to)\s+(.+)$",
        roles: &[Primary],
        scan: Scan::Lowered,
        limit: 5,
    },
];

const ENTITY_RULES: &[RuleSpec] = &[
    RuleSpec {
        name: "entity.keyword_id",
        pattern: concat!(
            r"(?i:\b(?:info(?:rmation)?|details?|describe|about|look\s*up|show|get|fetch|summar(?:y|ize))\b)",
            r".*?\b([A-Z][A-Za-z]*:\d+)\b"
        ),
        roles: &[Primary],
        scan: Scan::Original,
        limit: 1,
    },
    RuleSpec {
        name: "entity.bare_id",
        pattern: r"^([A-Z][A-Za-z]*:\d+)$",
        roles: &[Primary],
        scan: Scan::Original,
        limit: 1,
    },
];

const SEQUENCE_RULES: &[RuleSpec] = &[
    RuleSpec {
        name: "sequence.blast",
        pattern: concat!(
            r"^(?:blast[np]?|align)(?:\s+(?:this\s+|the\s+)?(?:sequence|seq))?\s*:?\s+",
            residues!(),
            r"$"
        ),
        roles: &[Primary],
        scan: Scan::Lowered,
        limit: 1,
    },
    RuleSpec {
        name: "sequence.similar_to",
        pattern: concat!(
            r"^(?:find|search(?:\s+for)?)\s+(?:similar\s+)?sequences?\s+(?:similar\s+)?(?:to|like|matching|for)\s+",
            residues!(),
            r"$"
        ),
        roles: &[Primary],
        scan: Scan::Lowered,
        limit: 1,
    },
    RuleSpec {
        name: "sequence.bare_nucleotides",
        pattern: r"^([acgtu]{10,}(?:\s+[acgtu]+)*)$",
        roles: &[Primary],
        scan: Scan::Lowered,
        limit: 1,
    },
];

const CACHE_RULES: &[RuleSpec] = &[
    RuleSpec {
        name: "cache.stats",
        pattern: r"^(?:show\s+|get\s+|display\s+|view\s+)?(?:the\s+)?(?:worker\s+)?cache\s+(?:stats|statistics|status|info|usage)$",
        roles: &[],
        scan: Scan::Lowered,
        limit: 1,
    },
    RuleSpec {
        name: "cache.bare",
        pattern: r"^(?:cache|stats)$",
        roles: &[],
        scan: Scan::Lowered,
        limit: 1,
    },
];

/// Rule sets in global evaluation order.
const RULE_TABLE: &[(IntentKind, &[RuleSpec])] = &[
    (IntentKind::SearchGenes, GENE_RULES),
    (IntentKind::SearchDiseases, DISEASE_RULES),
    (IntentKind::GetEntityInfo, ENTITY_RULES),
    (IntentKind::BlastSequence, SEQUENCE_RULES),
    (IntentKind::GetCacheStats, CACHE_RULES),
];

/// Captures that carry no meaning on their own. A rule whose primary
/// capture is one of these declines the input.
const FILLER_WORDS: &[&str] = &[
    "a", "an", "the", "all", "any", "some", "my", "these", "those", "many", "more", "other",
    "which", "what", "related", "associated", "known", "of", "for", "with", "and", "or", "in",
    "find", "search", "show", "get", "list", "gene", "genes",
];

// ─── Compilation ────────────────────────────────────────────────────────────

static RULE_SETS: OnceLock<Vec<RuleSet>> = OnceLock::new();

/// The compiled rule sets, in evaluation order. Compiled once.
pub fn rule_sets() -> &'static [RuleSet] {
    RULE_SETS.get_or_init(compile_rule_table)
}

fn compile_rule_table() -> Vec<RuleSet> {
    RULE_TABLE
        .iter()
        .map(|(kind, specs)| RuleSet {
            kind: *kind,
            rules: specs.iter().filter_map(|spec| compile(*kind, spec)).collect(),
        })
        .collect()
}

fn compile(kind: IntentKind, spec: &RuleSpec) -> Option<PatternRule> {
    match Regex::new(spec.pattern) {
        Ok(matcher) => Some(PatternRule {
            name: spec.name,
            kind,
            matcher,
            roles: spec.roles,
            scan: spec.scan,
            limit: spec.limit,
        }),
        Err(e) => {
            tracing::error!(rule = spec.name, error = %e, "classification rule failed to compile");
            None
        }
    }
}

/// Whether a captured term is a filler word rather than a real argument.
pub fn is_filler(term: &str) -> bool {
    FILLER_WORDS.contains(&term.trim())
}

// ─── Tests ──────────────────────────────────────────────────────────────────
