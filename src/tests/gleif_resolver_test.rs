// GLEIF resolver cache behavior (no network: batch cap forced to zero)

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::adapters::GleifResolver;
use crate::db;

async fn cache_pool(dir: &TempDir) -> SqlitePool {
    let path = dir.path().join("gleif_cache.db");
    db::open_cache(&path.display().to_string()).await.unwrap()
}

async fn insert_cache_row(
    pool: &SqlitePool,
    name: &str,
    lei: Option<&str>,
    legal_name: Option<&str>,
    age_days: i64,
) {
    let resolved_at = (Utc::now() - Duration::days(age_days)).to_rfc3339();
    sqlx::query(
        "INSERT OR REPLACE INTO gleif_cache \
         (raw_name, lei, legal_name, country, city, resolved_at) \
         VALUES (?, ?, ?, 'DE', 'Berlin', ?)",
    )
    .bind(name)
    .bind(lei)
    .bind(legal_name)
    .bind(resolved_at)
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn fresh_positive_entries_hit_the_cache() {
    let dir = TempDir::new().unwrap();
    let pool = cache_pool(&dir).await;
    let resolver = GleifResolver::new(pool.clone()).await.unwrap();

    insert_cache_row(&pool, "QUANTUM DEVICES", Some("529900AAA"), Some("Quantum Devices GmbH"), 1)
        .await;

    // Cap of zero: anything not cached must resolve to None without a
    // remote call
    let results = resolver
        .resolve_batch(&["Quantum Devices".to_string()], 0)
        .await
        .unwrap();
    let entity = results[0].1.as_ref().expect("cache hit");
    assert_eq!(entity.lei, "529900AAA");
    assert_eq!(entity.country, "DE");
}

#[tokio::test]
async fn cache_keys_are_uppercased_and_trimmed() {
    let dir = TempDir::new().unwrap();
    let pool = cache_pool(&dir).await;
    let resolver = GleifResolver::new(pool.clone()).await.unwrap();

    insert_cache_row(&pool, "PHOTON LABS", Some("529900BBB"), Some("Photon Labs SA"), 1).await;

    let results = resolver
        .resolve_batch(&["  photon labs ".to_string()], 0)
        .await
        .unwrap();
    assert!(results[0].1.is_some());
}

#[tokio::test]
async fn negative_entries_short_circuit() {
    let dir = TempDir::new().unwrap();
    let pool = cache_pool(&dir).await;
    let resolver = GleifResolver::new(pool.clone()).await.unwrap();

    insert_cache_row(&pool, "UNKNOWN CORP", None, None, 1).await;

    let results = resolver
        .resolve_batch(&["Unknown Corp".to_string()], 0)
        .await
        .unwrap();
    assert!(results[0].1.is_none());
}

#[tokio::test]
async fn stale_entries_expire_after_ttl() {
    let dir = TempDir::new().unwrap();
    let pool = cache_pool(&dir).await;
    let resolver = GleifResolver::new(pool.clone()).await.unwrap();

    insert_cache_row(&pool, "OLD ENTRY", Some("529900CCC"), Some("Old Entry AG"), 120).await;

    // Expired entry counts as a miss; with the cap exhausted it resolves to
    // None instead of reaching the API
    let results = resolver.resolve_batch(&["Old Entry".to_string()], 0).await.unwrap();
    assert!(results[0].1.is_none());
}

#[tokio::test]
async fn uncached_names_beyond_the_cap_resolve_to_none() {
    let dir = TempDir::new().unwrap();
    let pool = cache_pool(&dir).await;
    let resolver = GleifResolver::new(pool).await.unwrap();

    let names: Vec<String> = (0..5).map(|i| format!("Pending Name {}", i)).collect();
    let results = resolver.resolve_batch(&names, 0).await.unwrap();
    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|(_, entity)| entity.is_none()));
}
