//! Technology autocomplete from FTS5 prefix matches.
//!
//! Titles matching the prefix are mined for frequent 2- and 3-grams that
//! contain the query; stopword-bounded ngrams are dropped so the
//! suggestions read as technology terms rather than title fragments.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::AppState;
use crate::db;
use crate::repositories::{CordisRepository, PatentRepository};
use crate::utils::ApiResult;

const PATENT_TITLE_LIMIT: i64 = 500;
const PROJECT_TITLE_LIMIT: i64 = 200;
const MAX_TERMS: usize = 30;

static WORD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9äöüÄÖÜß-]+").expect("valid word regex"));

/// Generic words that never bound a technology term.
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    let words: &[&str] = &[
        // English
        "a", "an", "the", "of", "for", "and", "or", "in", "on", "to", "with", "by", "from",
        "at", "its", "is", "are", "was", "were", "be", "been", "has", "have", "had", "do",
        "does", "did", "not", "no", "nor", "but", "if", "than", "that", "this", "these",
        "those", "such", "as", "based", "method", "methods", "using", "use", "used", "system",
        "systems", "device", "devices", "apparatus", "process", "processes", "comprising",
        "related", "new", "novel", "improved", "thereof", "therein", "wherein", "means",
        "including", "particularly", "especially", "via",
        // German
        "und", "fuer", "der", "die", "das", "ein", "eine", "von", "mit", "zur", "zum", "auf",
        "aus", "bei", "nach", "ueber",
        // French
        "le", "la", "les", "de", "du", "des", "un", "une", "et", "en", "au", "aux", "pour",
        "par", "sur", "dans", "avec",
        // Spanish
        "el", "lo", "los", "las", "del", "al", "su", "sus", "con", "por", "para", "se", "que",
        "es",
        // Italian
        "il", "di", "da", "nel", "nei", "per", "che",
        // Single letters
        "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r",
        "s", "t", "u", "v", "w", "x", "y", "z",
    ];
    words.iter().copied().collect()
});

/// Curated fallback shown for an empty search field.
const DEFAULT_SUGGESTIONS: [&str; 24] = [
    "Artificial Intelligence",
    "Autonomous Vehicles",
    "Battery Technology",
    "Blockchain",
    "Carbon Capture",
    "CRISPR",
    "Cybersecurity",
    "Electric Vehicles",
    "Fuel Cells",
    "Gene Therapy",
    "Graphene",
    "Hydrogen Energy",
    "Internet of Things",
    "Laser Technology",
    "Machine Learning",
    "Nanotechnology",
    "Perovskite Solar",
    "Photovoltaic",
    "Quantum Computing",
    "Robotics",
    "Semiconductor",
    "Solid-State Batteries",
    "Superconductor",
    "Wind Energy",
];

#[derive(Debug, Deserialize)]
pub struct SuggestionParams {
    pub q: Option<String>,
    pub limit: Option<usize>,
}

/// Technology suggestions via FTS5 prefix search.
#[utoipa::path(
    get,
    path = "/api/v1/suggestions",
    params(
        ("q" = Option<String>, Query, description = "Search prefix"),
        ("limit" = Option<usize>, Query, description = "Maximum suggestions (1-20, default 8)")
    ),
    responses((status = 200, description = "Suggested technology terms", body = Vec<String>)),
    tag = "Data"
)]
pub async fn suggest_technologies(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SuggestionParams>,
) -> ApiResult<Json<Vec<String>>> {
    let limit = params.limit.unwrap_or(8).clamp(1, 20);

    let query = params.q.as_deref().map(str::trim).unwrap_or("");
    if query.len() < 2 {
        let defaults: Vec<String> =
            DEFAULT_SUGGESTIONS.iter().take(limit).map(|s| s.to_string()).collect();
        return Ok(Json(defaults));
    }
    let query: String = query.chars().take(100).collect();

    let mut titles: Vec<String> = Vec::new();

    if state.config.data.patents_db_available() {
        match db::open_read_only(&state.config.data.patents_db_path).await {
            Ok(pool) => {
                let repo = PatentRepository::new(pool);
                match repo.suggest_titles(&query, PATENT_TITLE_LIMIT).await {
                    Ok(found) => titles.extend(found),
                    Err(err) => tracing::warn!("Patent suggestions failed: {}", err),
                }
            },
            Err(err) => tracing::warn!("Patent store unavailable for suggestions: {}", err),
        }
    }

    if state.config.data.cordis_db_available() {
        match db::open_read_only(&state.config.data.cordis_db_path).await {
            Ok(pool) => {
                let repo = CordisRepository::new(pool);
                match repo.suggest_titles(&query, PROJECT_TITLE_LIMIT).await {
                    Ok(found) => titles.extend(found),
                    Err(err) => tracing::warn!("CORDIS suggestions failed: {}", err),
                }
            },
            Err(err) => tracing::warn!("CORDIS store unavailable for suggestions: {}", err),
        }
    }

    if titles.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let mut terms = extract_terms(&titles, &query);
    terms.truncate(limit);
    Ok(Json(terms))
}

/// Most frequent 2-/3-grams containing the prefix, best spelling first.
///
/// Variant spellings of the same term are grouped case-insensitively; the
/// most frequent original form wins and is then case-normalized.
fn extract_terms(titles: &[String], prefix: &str) -> Vec<String> {
    let prefix_lower = prefix.to_lowercase();

    // normalized ngram -> original form -> count
    let mut forms: HashMap<String, HashMap<String, i64>> = HashMap::new();

    for title in titles {
        let words: Vec<&str> = WORD_PATTERN.find_iter(title).map(|m| m.as_str()).collect();
        for n in [2usize, 3] {
            if words.len() < n {
                continue;
            }
            for window in words.windows(n) {
                let ngram = window.join(" ");
                let ngram_lower = ngram.to_lowercase();
                if !ngram_lower.contains(&prefix_lower) {
                    continue;
                }
                // Real technology terms never start or end on a stopword
                let first = window[0].to_lowercase();
                let last = window[n - 1].to_lowercase();
                if STOPWORDS.contains(first.as_str()) || STOPWORDS.contains(last.as_str()) {
                    continue;
                }
                *forms.entry(ngram_lower).or_default().entry(ngram).or_default() += 1;
            }
        }
    }

    let mut scored: Vec<(String, i64)> = forms
        .into_iter()
        .map(|(_, variants)| {
            let total: i64 = variants.values().sum();
            let best = variants
                .into_iter()
                .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
                .map(|(form, _)| form)
                .unwrap_or_default();
            (normalize_case(&best), total)
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    scored.into_iter().take(MAX_TERMS).map(|(term, _)| term).collect()
}

/// Smart casing: ALL-CAPS or lowercase terms get title case, short ALL-CAPS
/// tokens stay as acronyms (LED, IoT, CPC), mixed-case terms pass through.
fn normalize_case(term: &str) -> String {
    let is_upper = term.chars().filter(|c| c.is_alphabetic()).all(|c| c.is_uppercase());
    let is_lower = term.chars().filter(|c| c.is_alphabetic()).all(|c| c.is_lowercase());
    if !is_upper && !is_lower {
        return term.to_string();
    }

    term.split(' ')
        .map(|word| {
            let word_is_upper =
                word.chars().filter(|c| c.is_alphabetic()).all(|c| c.is_uppercase());
            let is_acronym = word_is_upper
                && word.len() <= 4
                && !word.chars().all(|c| c.is_ascii_digit())
                && !STOPWORDS.contains(word.to_lowercase().as_str());
            if is_acronym {
                word.to_string()
            } else {
                capitalize(word)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::{extract_terms, normalize_case};

    #[test]
    fn extracts_frequent_ngrams_containing_prefix() {
        let titles = vec![
            "Quantum computing device for error correction".to_string(),
            "Method for quantum computing with qubits".to_string(),
            "Quantum computing apparatus".to_string(),
        ];
        let terms = extract_terms(&titles, "quantum");
        assert!(!terms.is_empty());
        assert_eq!(terms[0], "Quantum Computing");
    }

    #[test]
    fn stopword_bounded_ngrams_are_dropped() {
        let titles = vec!["A quantum sensor for the measurement of fields".to_string()];
        let terms = extract_terms(&titles, "quantum");
        assert!(terms.iter().all(|t| !t.to_lowercase().starts_with("a ")));
        assert!(terms.iter().all(|t| !t.to_lowercase().ends_with(" the")));
    }

    #[test]
    fn case_normalization_keeps_acronyms() {
        assert_eq!(normalize_case("LASER CUTTING"), "Laser Cutting");
        assert_eq!(normalize_case("LED lighting"), "LED lighting");
        assert_eq!(normalize_case("quantum computing"), "Quantum Computing");
        assert_eq!(normalize_case("Quantum Computing"), "Quantum Computing");
    }
}
