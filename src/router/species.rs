//! Species and entity normalization.
//!
//! Maps informal species names ("mouse", "flies") to the canonical binomial
//! names the Alliance uses as species filters, and data-provider prefixes of
//! entity identifiers to their canonical spelling. Both lookups are
//! best-effort: unknown input passes through so normalization can never
//! block classification.

// ─── Species ────────────────────────────────────────────────────────────────

/// Informal name (lower-case) → canonical binomial name.
///
/// Canonical names are listed in lower case too so that normalization is
/// idempotent and fixes the capitalization of hand-typed binomials.
const SPECIES_TABLE: &[(&str, &str)] = &[
    ("human", "Homo sapiens"),
    ("humans", "Homo sapiens"),
    ("homo sapiens", "Homo sapiens"),
    ("mouse", "Mus musculus"),
    ("mice", "Mus musculus"),
    ("mus musculus", "Mus musculus"),
    ("rat", "Rattus norvegicus"),
    ("rats", "Rattus norvegicus"),
    ("rattus norvegicus", "Rattus norvegicus"),
    ("zebrafish", "Danio rerio"),
    ("danio rerio", "Danio rerio"),
    ("xenopus", "Xenopus laevis"),
    ("frog", "Xenopus laevis"),
    ("frogs", "Xenopus laevis"),
    ("xenopus laevis", "Xenopus laevis"),
    ("fly", "Drosophila melanogaster"),
    ("flies", "Drosophila melanogaster"),
    ("fruit fly", "Drosophila melanogaster"),
    ("fruit flies", "Drosophila melanogaster"),
    ("drosophila melanogaster", "Drosophila melanogaster"),
    ("worm", "Caenorhabditis elegans"),
    ("worms", "Caenorhabditis elegans"),
    ("caenorhabditis elegans", "Caenorhabditis elegans"),
    ("yeast", "Saccharomyces cerevisiae"),
    ("saccharomyces cerevisiae", "Saccharomyces cerevisiae"),
];

/// Normalize an informal species name to its canonical binomial name.
///
/// Matching is case-insensitive and ignores surrounding whitespace. Unknown
/// names are returned trimmed but otherwise unchanged.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let key = trimmed.to_lowercase();

    SPECIES_TABLE
        .iter()
        .find(|(informal, _)| *informal == key)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Whether `raw` names a species this normalizer knows about.
pub fn is_known_species(raw: &str) -> bool {
    let key = raw.trim().to_lowercase();
    SPECIES_TABLE.iter().any(|(informal, _)| *informal == key)
}

// ─── Entity identifiers ─────────────────────────────────────────────────────

/// Canonical spelling of the data-provider prefixes used in Alliance ids.
const ENTITY_PREFIXES: &[&str] = &[
    "HGNC", "MGI", "RGD", "ZFIN", "FB", "WB", "SGD", "Xenbase", "DOID",
];

/// Normalize the provider prefix of an identifier such as `Hgnc:1100`.
///
/// Only the part before the first `:` is touched; the local id is
/// case-sensitive and kept verbatim. Unknown prefixes pass through.
pub fn normalize_entity_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some((prefix, local)) = trimmed.split_once(':') else {
        return trimmed.to_string();
    };

    match ENTITY_PREFIXES
        .iter()
        .find(|known| known.eq_ignore_ascii_case(prefix))
    {
        Some(known) => format!("{known}:{local}"),
        None => trimmed.to_string(),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
