//! Fuzzy matching of extracted insurer / ramo names against the tenant's
//! reference tables.
//!
//! Rules run in priority order and the first one that produces a candidate
//! wins: exact case-insensitive equality, then the keyword-category table,
//! then bidirectional substring. Within a rule, ties are broken by the
//! longest reference name, then by list position. The result is binary —
//! a row or nothing, no confidence score.

use crate::models::ReferenceEntry;

/// Category keyword table for ramo/insurer names. A synonym found inside
/// the extracted name selects reference rows that mention the category key
/// or any of its synonyms.
const KEYWORD_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "auto",
        &["auto", "automóvel", "automovel", "veículo", "veiculo", "carro"],
    ),
    ("vida", &["vida"]),
    (
        "residencial",
        &["residencial", "residência", "residencia", "casa", "imóvel", "imovel"],
    ),
    ("empresarial", &["empresarial", "empresa", "comercial"]),
    ("saúde", &["saúde", "saude", "médico", "medico", "odonto"]),
    ("viagem", &["viagem", "travel"]),
    ("rural", &["rural", "agrícola", "agricola"]),
];

/// Find the best-matching reference row for a name extracted from a
/// document, or `None` when every rule misses.
pub fn match_reference<'a>(
    extracted_name: &str,
    references: &'a [ReferenceEntry],
) -> Option<&'a ReferenceEntry> {
    let needle = extracted_name.trim().to_lowercase();
    if needle.is_empty() || references.is_empty() {
        return None;
    }

    // Rule 1: exact case-insensitive equality
    if let Some(exact) = references
        .iter()
        .find(|r| r.name.trim().to_lowercase() == needle)
    {
        return Some(exact);
    }

    // Rule 2: keyword-category table
    for (category, synonyms) in KEYWORD_CATEGORIES {
        if !synonyms.iter().any(|s| needle.contains(s)) {
            continue;
        }
        let hit = longest(references.iter().filter(|r| {
            let name = r.name.to_lowercase();
            name.contains(category) || synonyms.iter().any(|s| name.contains(s))
        }));
        if hit.is_some() {
            return hit;
        }
    }

    // Rule 3: bidirectional substring
    longest(references.iter().filter(|r| {
        let name = r.name.trim().to_lowercase();
        !name.is_empty() && (name.contains(&needle) || needle.contains(&name))
    }))
}

/// Longest reference name wins; on equal length the earlier row wins.
fn longest<'a>(
    candidates: impl Iterator<Item = &'a ReferenceEntry>,
) -> Option<&'a ReferenceEntry> {
    let mut best: Option<&ReferenceEntry> = None;
    for candidate in candidates {
        let len = candidate.name.chars().count();
        match best {
            Some(b) if b.name.chars().count() >= len => {}
            _ => best = Some(candidate),
        }
    }
    best
}
