//! API key and token health checks — pure functions, no network access.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::models::ApiAlert;

const EXPIRY_WARNING_SECONDS: f64 = 3.0 * 24.0 * 3600.0;

/// Check a JWT access token for (approaching) expiry.
///
/// Decodes the `exp` claim locally (base64url, no signature verification —
/// this is a health probe, not authentication). With a refresh token
/// configured, expiry is handled by the adapter's auto-refresh and no alert
/// is raised.
///
/// Returns an error-level alert when expired, a warning when fewer than
/// three days remain, None otherwise (including non-JWT tokens).
pub fn check_jwt_expiry(
    token: &str,
    source_name: &str,
    now: f64,
    has_refresh_token: bool,
) -> Option<ApiAlert> {
    if token.is_empty() || !token.contains('.') {
        return None;
    }
    let exp = decode_exp_claim(token)?;
    let remaining = exp - now;

    if remaining <= 0.0 {
        if has_refresh_token {
            return None;
        }
        let hours_ago = remaining.abs() / 3600.0;
        return Some(ApiAlert {
            source: source_name.to_string(),
            level: "error".to_string(),
            message: format!("{} token expired {:.0}h ago", source_name, hours_ago),
        });
    }

    if remaining < EXPIRY_WARNING_SECONDS {
        if has_refresh_token {
            return None;
        }
        let hours_left = remaining / 3600.0;
        let time_str = if hours_left >= 24.0 {
            format!("{:.1} days", hours_left / 24.0)
        } else {
            format!("{:.0} hours", hours_left)
        };
        return Some(ApiAlert {
            source: source_name.to_string(),
            level: "warning".to_string(),
            message: format!("{} token expires in {}", source_name, time_str),
        });
    }

    None
}

/// Extract the `exp` claim from a JWT payload. None for malformed tokens.
pub fn decode_exp_claim(token: &str) -> Option<f64> {
    let payload_b64 = token.split('.').nth(1)?;
    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&payload).ok()?;
    claims.get("exp")?.as_f64()
}

/// Warning substrings that indicate a remote API failed at request time.
const FAILURE_PATTERNS: [(&str, &str); 3] = [
    ("Semantic Scholar query failed", "Semantic Scholar"),
    ("GLEIF entity resolution failed", "GLEIF"),
    ("publication_years", "OpenAIRE"),
];

/// Scan the aggregated panel warnings for remote-API failures.
///
/// Each source is reported at most once per request.
pub fn detect_runtime_failures(warnings: &[String]) -> Vec<ApiAlert> {
    let mut alerts = Vec::new();
    let mut seen: Vec<&str> = Vec::new();

    for warning in warnings {
        for (pattern, source) in FAILURE_PATTERNS {
            if warning.contains(pattern) && !seen.contains(&source) {
                alerts.push(ApiAlert {
                    source: source.to_string(),
                    level: "error".to_string(),
                    message: format!("{}: data unavailable", source),
                });
                seen.push(source);
            }
        }
    }

    alerts
}
