//! Read-only repositories over the patent and project stores.

pub mod cordis;
pub mod patent;
pub mod rows;

pub use cordis::CordisRepository;
pub use patent::PatentRepository;

/// Wrap a user query for FTS5 so operator characters (hyphens, slashes,
/// colons) are matched literally. Embedded double quotes are doubled.
pub fn sanitize_fts_query(query: &str) -> String {
    format!("\"{}\"", query.replace('"', "\"\""))
}

/// FTS5 prefix query for autocomplete.
pub fn fts_prefix_query(prefix: &str) -> String {
    format!("\"{}\"*", prefix.replace('"', "\"\""))
}
