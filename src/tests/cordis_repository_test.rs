// CORDIS repository tests over the FTS5 fixture

use tempfile::TempDir;

use crate::repositories::cordis::CROSS_BORDER_MIN_COUNTRIES;
use crate::tests::common::{create_cordis_store, current_year, open_cordis_repo};

#[tokio::test]
async fn year_histogram_counts_quantum_projects() {
    let dir = TempDir::new().unwrap();
    let path = create_cordis_store(&dir).await;
    let repo = open_cordis_repo(&path).await;
    let year = current_year();

    let rows = repo
        .count_by_year("quantum computing", Some(year - 10), Some(year))
        .await
        .unwrap();
    let total: i64 = rows.iter().map(|r| r.count).sum();
    assert_eq!(total, 4);
}

#[tokio::test]
async fn country_histogram_counts_distinct_projects() {
    let dir = TempDir::new().unwrap();
    let path = create_cordis_store(&dir).await;
    let repo = open_cordis_repo(&path).await;
    let year = current_year();

    let rows = repo
        .count_by_country("quantum computing", Some(year - 10), Some(year))
        .await
        .unwrap();
    // Quantum Research Institute participates in three projects
    assert_eq!(rows[0].country, "DE");
    assert_eq!(rows[0].count, 3);
    let fr = rows.iter().find(|r| r.country == "FR").unwrap();
    assert_eq!(fr.count, 2);
}

#[tokio::test]
async fn top_organizations_carry_flags() {
    let dir = TempDir::new().unwrap();
    let path = create_cordis_store(&dir).await;
    let repo = open_cordis_repo(&path).await;
    let year = current_year();

    let rows = repo
        .top_organizations_detailed("quantum computing", Some(year - 10), Some(year), 20)
        .await
        .unwrap();
    let top = &rows[0];
    assert_eq!(top.name, "Quantum Research Institute");
    assert_eq!(top.count, 3);
    assert_eq!(top.country, "DE");
    assert_eq!(top.sme, 0);
    assert_eq!(top.coordinator, 1);

    let photon = rows.iter().find(|r| r.name == "Photon Labs SA").unwrap();
    assert_eq!(photon.sme, 1);
    assert_eq!(photon.coordinator, 0);
}

#[tokio::test]
async fn funding_by_year_sums_contributions() {
    let dir = TempDir::new().unwrap();
    let path = create_cordis_store(&dir).await;
    let repo = open_cordis_repo(&path).await;
    let year = current_year();

    let rows = repo
        .funding_by_year("quantum computing", Some(year - 10), Some(year))
        .await
        .unwrap();
    let total: f64 = rows.iter().map(|r| r.funding).sum();
    assert_eq!(total, 5_000_000.0);
    let projects: i64 = rows.iter().map(|r| r.count).sum();
    assert_eq!(projects, 4);
}

#[tokio::test]
async fn funding_by_programme_orders_by_funding() {
    let dir = TempDir::new().unwrap();
    let path = create_cordis_store(&dir).await;
    let repo = open_cordis_repo(&path).await;
    let year = current_year();

    let rows = repo
        .funding_by_programme("quantum computing", Some(year - 10), Some(year))
        .await
        .unwrap();
    assert_eq!(rows[0].programme, "H2020");
    assert_eq!(rows[0].funding, 3_000_000.0);
    let horizon = rows.iter().find(|r| r.programme == "HORIZON").unwrap();
    assert_eq!(horizon.funding, 2_000_000.0);
    assert_eq!(horizon.count, 2);
}

#[tokio::test]
async fn instrument_breakdown_groups_by_scheme_and_year() {
    let dir = TempDir::new().unwrap();
    let path = create_cordis_store(&dir).await;
    let repo = open_cordis_repo(&path).await;
    let year = current_year();

    let rows = repo
        .funding_by_instrument("quantum computing", Some(year - 10), Some(year))
        .await
        .unwrap();
    let ria_total: i64 = rows.iter().filter(|r| r.scheme == "RIA").map(|r| r.count).sum();
    assert_eq!(ria_total, 2);
    assert!(rows.iter().any(|r| r.scheme == "CSA"));
}

#[tokio::test]
async fn co_participation_pairs_count_shared_projects() {
    let dir = TempDir::new().unwrap();
    let path = create_cordis_store(&dir).await;
    let repo = open_cordis_repo(&path).await;
    let year = current_year();

    let rows = repo
        .co_participation("quantum computing", Some(year - 10), Some(year), 100)
        .await
        .unwrap();
    // QRI and Photon Labs collaborate in two projects
    let pair = rows
        .iter()
        .find(|p| {
            (p.actor_a == "Quantum Research Institute" && p.actor_b == "Photon Labs SA")
                || (p.actor_a == "Photon Labs SA" && p.actor_b == "Quantum Research Institute")
        })
        .unwrap();
    assert_eq!(pair.co_count, 2);
}

#[tokio::test]
async fn collaboration_pairs_are_lexicographic() {
    let dir = TempDir::new().unwrap();
    let path = create_cordis_store(&dir).await;
    let repo = open_cordis_repo(&path).await;
    let year = current_year();

    let rows = repo
        .country_collaboration_pairs("quantum computing", Some(year - 10), Some(year), 30)
        .await
        .unwrap();
    assert!(!rows.is_empty());
    for pair in &rows {
        assert!(pair.country_a < pair.country_b);
    }
    let de_fr = rows.iter().find(|p| p.country_a == "DE" && p.country_b == "FR").unwrap();
    assert_eq!(de_fr.count, 2);
}

#[tokio::test]
async fn cross_border_share_uses_min_countries() {
    let dir = TempDir::new().unwrap();
    let path = create_cordis_store(&dir).await;
    let repo = open_cordis_repo(&path).await;
    let year = current_year();

    let stats = repo
        .cross_border_projects(
            "quantum computing",
            Some(year - 10),
            Some(year),
            CROSS_BORDER_MIN_COUNTRIES,
        )
        .await
        .unwrap();
    assert_eq!(stats.total_projects, 4);
    // Only the hardware platform project spans three countries
    assert_eq!(stats.cross_border_projects, 1);
    assert_eq!(stats.cross_border_share, 0.25);
}

#[tokio::test]
async fn cities_and_last_full_year() {
    let dir = TempDir::new().unwrap();
    let path = create_cordis_store(&dir).await;
    let repo = open_cordis_repo(&path).await;
    let year = current_year();

    let cities = repo
        .orgs_by_city("quantum computing", Some(year - 10), Some(year), 30)
        .await
        .unwrap();
    assert_eq!(cities.len(), 5);
    assert_eq!(cities[0].city, "Berlin");

    // Max start date is February of last year: only the year before counts
    // as complete
    assert_eq!(repo.last_full_year().await.unwrap(), Some(year - 2));
    assert_eq!(repo.total_count().await.unwrap(), 5);
}
