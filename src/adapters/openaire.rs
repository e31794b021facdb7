//! OpenAIRE Search API adapter for publication counts.
//!
//! One header-only request per year in the window, all years in parallel.
//! The access token is cached process-wide behind a mutex: the first task
//! that finds it about to expire refreshes it, everyone else re-reads the
//! refreshed value. A failed refresh falls back to whatever token exists.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::future::join_all;
use once_cell::sync::Lazy;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::analytics::api_health::decode_exp_claim;
use crate::repositories::rows::YearCount;
use crate::utils::{ApiError, ApiResult};

const BASE_URL: &str = "https://api.openaire.eu/search/publications";
const REFRESH_URL: &str =
    "https://services.openaire.eu/uoa-user-management/api/users/getAccessToken";
const TIMEOUT: Duration = Duration::from_secs(10);

/// Refresh when fewer than this many seconds remain on the token.
const REFRESH_MARGIN_SECS: f64 = 60.0;

/// Process-wide token cache so parallel per-year requests never refresh
/// redundantly.
#[derive(Default)]
struct TokenCache {
    access_token: Option<String>,
}

static TOKEN_CACHE: Lazy<Mutex<TokenCache>> = Lazy::new(Mutex::default);

#[derive(Clone)]
pub struct OpenAireClient {
    http: reqwest::Client,
    access_token: String,
    refresh_token: String,
    base_url: String,
    refresh_url: String,
}

impl OpenAireClient {
    pub fn new(access_token: &str, refresh_token: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            http,
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            base_url: BASE_URL.to_string(),
            refresh_url: REFRESH_URL.to_string(),
        }
    }

    /// Publication counts per year, ascending. Failed years are skipped with
    /// a log entry; the call errors only when every single year failed.
    pub async fn count_by_year(
        &self,
        query: &str,
        start_year: i32,
        end_year: i32,
    ) -> ApiResult<Vec<YearCount>> {
        let token = self.ensure_fresh_token().await;

        let tasks = (start_year..=end_year)
            .map(|year| self.count_single_year(query, year, token.clone()));
        let results = join_all(tasks).await;

        let mut yearly = Vec::new();
        let mut failures = 0usize;
        for result in results {
            match result {
                Ok(count) => yearly.push(count),
                Err(err) => {
                    failures += 1;
                    tracing::warn!("OpenAIRE year query failed: {}", err);
                },
            }
        }

        if yearly.is_empty() && failures > 0 {
            return Err(ApiError::bad_gateway("OpenAIRE publication counts unavailable"));
        }

        yearly.sort_by_key(|entry| entry.year);
        Ok(yearly)
    }

    async fn count_single_year(
        &self,
        query: &str,
        year: i32,
        token: String,
    ) -> ApiResult<YearCount> {
        let from_date = format!("{}-01-01", year);
        let to_date = format!("{}-12-31", year);
        let mut request = self.http.get(&self.base_url).query(&[
            ("keywords", query),
            ("fromDateAccepted", from_date.as_str()),
            ("toDateAccepted", to_date.as_str()),
            ("format", "json"),
            ("size", "1"),
        ]);
        if !token.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await?.error_for_status()?;
        let body: Value = response.json().await?;
        let count = parse_total_count(&body).ok_or_else(|| {
            ApiError::bad_gateway("OpenAIRE response missing total count header")
        })?;
        Ok(YearCount { year, count })
    }

    /// Current access token, refreshed opportunistically.
    ///
    /// The mutex serialises the refresh path: concurrent callers either see
    /// the old-but-valid token or wait for the one refresh in flight.
    async fn ensure_fresh_token(&self) -> String {
        let mut cache = TOKEN_CACHE.lock().await;
        let current = cache
            .access_token
            .clone()
            .unwrap_or_else(|| self.access_token.clone());

        if self.refresh_token.is_empty() {
            return current;
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let needs_refresh = match decode_exp_claim(&current) {
            Some(exp) => exp - now < REFRESH_MARGIN_SECS,
            // Opaque or empty token with a refresh token configured: try to
            // obtain a proper one
            None => true,
        };
        if !needs_refresh {
            return current;
        }

        match self.refresh_access_token().await {
            Ok(fresh) => {
                tracing::info!("OpenAIRE access token refreshed");
                cache.access_token = Some(fresh.clone());
                fresh
            },
            Err(err) => {
                tracing::warn!("OpenAIRE token refresh failed: {}", err);
                current
            },
        }
    }

    async fn refresh_access_token(&self) -> ApiResult<String> {
        let response = self
            .http
            .get(&self.refresh_url)
            .query(&[("refreshToken", self.refresh_token.as_str())])
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response.json().await?;
        body.get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_gateway("OpenAIRE refresh response missing access_token"))
    }
}

/// Total count from the response envelope: `response.header.total.$` as a
/// decimal string.
fn parse_total_count(body: &Value) -> Option<i64> {
    body.get("response")?
        .get("header")?
        .get("total")?
        .get("$")?
        .as_str()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::parse_total_count;
    use serde_json::json;

    #[test]
    fn parses_total_from_envelope() {
        let body = json!({"response": {"header": {"total": {"$": "1234"}}}});
        assert_eq!(parse_total_count(&body), Some(1234));
    }

    #[test]
    fn missing_or_malformed_total_is_none() {
        assert_eq!(parse_total_count(&json!({})), None);
        let body = json!({"response": {"header": {"total": {"$": "abc"}}}});
        assert_eq!(parse_total_count(&body), None);
    }
}
