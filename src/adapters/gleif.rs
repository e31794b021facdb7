//! GLEIF LEI lookup adapter with a persistent SQLite cache.
//!
//! The remote API is rate-limited aggressively, so lookups run strictly one
//! at a time (semaphore of 1) with a one-second pause after every outbound
//! call. Positive and negative results are both cached, keyed by the
//! uppercased trimmed query name; entries older than 90 days count as
//! misses.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::Semaphore;

use crate::utils::{ApiError, ApiResult};

const BASE_URL: &str = "https://api.gleif.org/api/v1";
const TIMEOUT: Duration = Duration::from_secs(10);
const PACING_DELAY: Duration = Duration::from_secs(1);
const CACHE_TTL_DAYS: i64 = 90;

/// Default hard cap on remote lookups per batch.
pub const DEFAULT_MAX_API_CALLS: usize = 20;

/// A resolved legal entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntity {
    pub lei: String,
    pub legal_name: String,
    pub country: String,
    pub city: String,
}

enum CacheLookup {
    Miss,
    Negative,
    Hit(ResolvedEntity),
}

#[derive(Clone)]
pub struct GleifResolver {
    http: reqwest::Client,
    cache: SqlitePool,
    semaphore: Arc<Semaphore>,
    base_url: String,
}

impl GleifResolver {
    /// Create the resolver over an opened cache pool, ensuring the cache
    /// table exists.
    pub async fn new(cache: SqlitePool) -> ApiResult<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS gleif_cache ( \
                 raw_name TEXT PRIMARY KEY, \
                 lei TEXT, \
                 legal_name TEXT, \
                 country TEXT, \
                 city TEXT, \
                 resolved_at TEXT \
             )",
        )
        .execute(&cache)
        .await?;

        let http = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Ok(Self {
            http,
            cache,
            semaphore: Arc::new(Semaphore::new(1)),
            base_url: BASE_URL.to_string(),
        })
    }

    fn cache_key(name: &str) -> String {
        name.trim().to_uppercase()
    }

    async fn get_cached(&self, name: &str) -> ApiResult<CacheLookup> {
        let row: Option<(Option<String>, Option<String>, Option<String>, Option<String>, String)> =
            sqlx::query_as(
                "SELECT lei, legal_name, country, city, resolved_at \
                 FROM gleif_cache WHERE raw_name = ?",
            )
            .bind(Self::cache_key(name))
            .fetch_optional(&self.cache)
            .await?;

        let Some((lei, legal_name, country, city, resolved_at)) = row else {
            return Ok(CacheLookup::Miss);
        };

        let age_ok = DateTime::parse_from_rfc3339(&resolved_at)
            .map(|ts| Utc::now().signed_duration_since(ts) < chrono::Duration::days(CACHE_TTL_DAYS))
            .unwrap_or(false);
        if !age_ok {
            return Ok(CacheLookup::Miss);
        }

        match (lei, legal_name) {
            (Some(lei), Some(legal_name)) => Ok(CacheLookup::Hit(ResolvedEntity {
                lei,
                legal_name,
                country: country.unwrap_or_default(),
                city: city.unwrap_or_default(),
            })),
            _ => Ok(CacheLookup::Negative),
        }
    }

    async fn write_cache(&self, name: &str, result: Option<&ResolvedEntity>) -> ApiResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO gleif_cache \
             (raw_name, lei, legal_name, country, city, resolved_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Self::cache_key(name))
        .bind(result.map(|r| r.lei.clone()))
        .bind(result.map(|r| r.legal_name.clone()))
        .bind(result.map(|r| r.country.clone()))
        .bind(result.map(|r| r.city.clone()))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.cache)
        .await?;
        Ok(())
    }

    /// Resolve one entity name, cache first.
    ///
    /// Remote failures resolve to None after a log entry; the radar treats
    /// entity resolution as strictly best-effort.
    pub async fn resolve_entity(&self, name: &str) -> ApiResult<Option<ResolvedEntity>> {
        match self.get_cached(name).await? {
            CacheLookup::Hit(entity) => return Ok(Some(entity)),
            CacheLookup::Negative => return Ok(None),
            CacheLookup::Miss => {},
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ApiError::internal_error("GLEIF semaphore closed"))?;

        let outcome = self.fetch_entity(name).await;
        let resolved = match outcome {
            Ok(resolved) => {
                self.write_cache(name, resolved.as_ref()).await?;
                resolved
            },
            Err(err) => {
                tracing::warn!("GLEIF resolve failed for '{}': {}", name, err);
                None
            },
        };

        tokio::time::sleep(PACING_DELAY).await;
        Ok(resolved)
    }

    async fn fetch_entity(&self, name: &str) -> ApiResult<Option<ResolvedEntity>> {
        let response = self
            .http
            .get(format!("{}/lei-records", self.base_url))
            .query(&[("filter[entity.legalName]", name)])
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response.json().await?;
        Ok(parse_first_record(&body))
    }

    /// Resolve a batch of names with a hard cap on remote calls.
    ///
    /// Cache hits are free; beyond `max_api_calls` pending names resolve to
    /// None. Output order follows the input.
    pub async fn resolve_batch(
        &self,
        names: &[String],
        max_api_calls: usize,
    ) -> ApiResult<Vec<(String, Option<ResolvedEntity>)>> {
        let mut results: Vec<(String, Option<ResolvedEntity>)> = Vec::with_capacity(names.len());
        let mut api_calls = 0usize;

        for name in names {
            let resolved = match self.get_cached(name).await? {
                CacheLookup::Hit(entity) => Some(entity),
                CacheLookup::Negative => None,
                CacheLookup::Miss => {
                    if api_calls < max_api_calls {
                        api_calls += 1;
                        self.resolve_entity(name).await?
                    } else {
                        None
                    }
                },
            };
            results.push((name.clone(), resolved));
        }

        Ok(results)
    }
}

/// First LEI record of a lookup response, if any.
fn parse_first_record(body: &Value) -> Option<ResolvedEntity> {
    let record = body.get("data")?.as_array()?.first()?;
    let attributes = record.get("attributes")?;
    let entity = attributes.get("entity")?;
    let address = entity.get("legalAddress");

    Some(ResolvedEntity {
        lei: attributes.get("lei")?.as_str()?.to_string(),
        legal_name: entity.get("legalName")?.get("name")?.as_str()?.to_string(),
        country: address
            .and_then(|a| a.get("country"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        city: address
            .and_then(|a| a.get("city"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}
