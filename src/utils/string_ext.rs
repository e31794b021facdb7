//! String helpers shared across services.

/// Trim a string and return None when nothing is left.
#[inline]
pub fn clean_optional_string(s: Option<&String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Uppercased, trimmed form used as the merge key for actor names.
#[inline]
pub fn actor_key(name: &str) -> String {
    name.trim().to_uppercase()
}
