// End-to-end radar orchestration over the fixture stores.
//
// Remote APIs are unconfigured; their panels degrade to warnings, which is
// exactly the graceful-degradation contract under test.

use tempfile::TempDir;

use crate::models::RadarRequest;
use crate::services::RadarService;
use crate::tests::common::{create_cordis_store, create_patent_store, current_year, test_config};

#[tokio::test]
async fn full_fixture_produces_the_expected_dashboard() {
    let dir = TempDir::new().unwrap();
    let patents = create_patent_store(&dir, true, false).await;
    let cordis = create_cordis_store(&dir).await;
    let service = RadarService::new(test_config(&patents, &cordis));

    let response = service
        .analyze(RadarRequest { technology: "quantum computing".to_string(), years: 10 })
        .await
        .unwrap();

    assert_eq!(response.landscape.total_patents, 8);
    assert_eq!(response.landscape.total_projects, 4);
    assert_eq!(response.competitive.top_actors[0].name, "QUANTUM DEVICES");
    assert!(
        matches!(response.maturity.phase.as_str(), "Emerging" | "Growing"),
        "phase = {}",
        response.maturity.phase
    );
    assert!(response.explainability.deterministic);
    assert!(response.explainability.query_time_ms >= 0);
    assert_eq!(response.explainability.data_complete_until, Some(current_year() - 1));
    assert!(
        response
            .explainability
            .sources_used
            .iter()
            .any(|s| s == "EPO DOCDB (local)")
    );

    // Additivity: every year series sums to its reported total
    let patents_from_series: i64 =
        response.landscape.time_series.iter().map(|e| e.patents).sum();
    assert_eq!(patents_from_series, response.landscape.total_patents);
    let projects_from_series: i64 =
        response.landscape.time_series.iter().map(|e| e.projects).sum();
    assert_eq!(projects_from_series, response.landscape.total_projects);
}

#[tokio::test]
async fn nonexistent_term_yields_a_well_formed_empty_dashboard() {
    let dir = TempDir::new().unwrap();
    let patents = create_patent_store(&dir, true, false).await;
    let cordis = create_cordis_store(&dir).await;
    let service = RadarService::new(test_config(&patents, &cordis));

    let response = service
        .analyze(RadarRequest { technology: "nonexistent_xyz_123".to_string(), years: 5 })
        .await
        .unwrap();

    assert_eq!(response.landscape.total_patents, 0);
    assert_eq!(response.landscape.total_projects, 0);
    assert!(response.landscape.top_countries.is_empty());
    assert!(response.competitive.top_actors.is_empty());
    assert_eq!(response.competitive.hhi_index, 0.0);
    assert_eq!(response.funding.total_funding_eur, 0.0);
    assert!(response.cpc_flow.labels.is_empty());
    assert!(response.geographic.country_distribution.is_empty());
    assert!(response.temporal.actor_timeline.is_empty());
    assert!(response.explainability.deterministic);

    // The envelope still serialises completely
    let json = serde_json::to_value(&response).unwrap();
    for panel in [
        "landscape",
        "maturity",
        "competitive",
        "funding",
        "cpc_flow",
        "geographic",
        "research_impact",
        "temporal",
        "explainability",
    ] {
        assert!(json.get(panel).is_some(), "missing panel {}", panel);
    }
}

#[tokio::test]
async fn partial_year_data_is_pruned_with_a_warning() {
    let dir = TempDir::new().unwrap();
    let patents = create_patent_store(&dir, true, true).await;
    let cordis = create_cordis_store(&dir).await;
    let service = RadarService::new(test_config(&patents, &cordis));
    let year = current_year();

    let response = service
        .analyze(RadarRequest { technology: "quantum computing".to_string(), years: 10 })
        .await
        .unwrap();

    // The store holds nine quantum patents, but the current year is
    // incomplete and stays out of the clamped landscape window
    assert_eq!(response.explainability.data_complete_until, Some(year - 1));
    assert_eq!(response.landscape.total_patents, 8);
    assert!(
        response
            .explainability
            .warnings
            .iter()
            .any(|w| w.contains(&format!("incomplete from {}", year))),
        "warnings = {:?}",
        response.explainability.warnings
    );
}

#[tokio::test]
async fn missing_patent_store_degrades_gracefully() {
    let dir = TempDir::new().unwrap();
    let cordis = create_cordis_store(&dir).await;
    let service =
        RadarService::new(test_config("/nonexistent/ti-radar-test/patents.db", &cordis));

    let response = service
        .analyze(RadarRequest { technology: "quantum computing".to_string(), years: 10 })
        .await
        .unwrap();

    // Project-side panels still deliver; patent-side panels are empty with
    // warnings
    assert_eq!(response.landscape.total_patents, 0);
    assert_eq!(response.landscape.total_projects, 4);
    assert!(response.funding.total_funding_eur > 0.0);
    assert!(response.cpc_flow.labels.is_empty());
    assert!(
        response
            .explainability
            .warnings
            .iter()
            .any(|w| w.contains("Patent store unavailable") || w.contains("CPC analysis skipped")),
        "warnings = {:?}",
        response.explainability.warnings
    );
    assert_eq!(response.explainability.data_complete_until, None);
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let dir = TempDir::new().unwrap();
    let patents = create_patent_store(&dir, true, false).await;
    let cordis = create_cordis_store(&dir).await;
    let service = RadarService::new(test_config(&patents, &cordis));

    let too_short = service
        .analyze(RadarRequest { technology: "".to_string(), years: 10 })
        .await;
    assert!(too_short.is_err());

    let bad_years = service
        .analyze(RadarRequest { technology: "quantum computing".to_string(), years: 2 })
        .await;
    assert!(bad_years.is_err());

    let too_long = service
        .analyze(RadarRequest { technology: "x".repeat(201), years: 10 })
        .await;
    assert!(too_long.is_err());
}
