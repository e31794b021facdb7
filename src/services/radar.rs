//! The radar orchestrator.
//!
//! Per-request state machine: validate, build the composition root, clamp
//! the window to the last fully covered patent year, dispatch all eight
//! panel engines concurrently with individual deadlines, substitute empty
//! panels for timeouts and failures, aggregate provenance, and attach
//! API-health alerts.
//!
//! This is the only place that enforces panel independence; engines never
//! call each other, and no panel failure cancels a sibling.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::Datelike;
use tokio::time::timeout;
use validator::Validate;

use crate::analytics::api_health::{check_jwt_expiry, detect_runtime_failures};
use crate::config::Config;
use crate::models::{ExplainabilityMetadata, RadarRequest, RadarResponse};
use crate::services::DataContext;
use crate::services::panels::{
    PanelOutput, competitive, cpc_flow, funding, geographic, landscape, maturity,
    research_impact, temporal,
};
use crate::utils::{ApiError, ApiResult, unique_ordered};

pub struct RadarService {
    config: Config,
}

/// Provenance accumulated while collecting panel results.
#[derive(Default)]
struct Provenance {
    sources: Vec<String>,
    methods: Vec<String>,
    warnings: Vec<String>,
}

impl Provenance {
    /// Fold one panel outcome into the aggregate, substituting the default
    /// panel on timeout or failure.
    fn collect<T: Default>(
        &mut self,
        name: &str,
        deadline: Duration,
        outcome: Result<ApiResult<PanelOutput<T>>, tokio::time::error::Elapsed>,
    ) -> T {
        match outcome {
            Ok(Ok(output)) => {
                self.sources.extend(output.sources);
                self.methods.extend(output.methods);
                self.warnings.extend(output.warnings);
                output.panel
            },
            Ok(Err(err)) => {
                tracing::warn!("{} panel failed: {}", name, err);
                self.warnings.push(format!("{} panel failed: {}", name, err.kind()));
                T::default()
            },
            Err(_) => {
                tracing::warn!("{} panel timed out", name);
                self.warnings
                    .push(format!("{} panel timed out after {}s", name, deadline.as_secs()));
                T::default()
            },
        }
    }
}

impl RadarService {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the full radar analysis for one request.
    pub async fn analyze(&self, request: RadarRequest) -> ApiResult<RadarResponse> {
        request
            .validate()
            .map_err(|err| ApiError::validation_error(err.to_string()))?;

        let started = Instant::now();
        let technology = request.technology.trim().to_string();
        let end_year = chrono::Utc::now().year();
        let start_year = end_year - request.years;

        tracing::info!("Radar analysis for '{}' ({}-{})", technology, start_year, end_year);

        let ctx = DataContext::build(&self.config).await;

        // Freshness probe, propagated to every engine that computes growth
        // or fit metrics
        let patent_last_full = match &ctx.patent_repo {
            Some(repo) => repo.last_full_year().await.unwrap_or_default(),
            None => None,
        };

        let deadline = Duration::from_secs(self.config.radar.panel_timeout_secs);
        let cpc_deadline = Duration::from_secs(self.config.radar.cpc_timeout_secs);

        let (
            landscape_out,
            maturity_out,
            competitive_out,
            funding_out,
            cpc_out,
            geographic_out,
            research_out,
            temporal_out,
        ) = tokio::join!(
            timeout(
                deadline,
                landscape::analyze(&ctx, &technology, start_year, end_year, patent_last_full)
            ),
            timeout(
                deadline,
                maturity::analyze(&ctx, &technology, start_year, end_year, patent_last_full)
            ),
            timeout(
                deadline,
                competitive::analyze(&ctx, &technology, start_year, end_year, patent_last_full)
            ),
            timeout(deadline, funding::analyze(&ctx, &technology, start_year, end_year)),
            timeout(
                cpc_deadline,
                cpc_flow::analyze(&ctx, &technology, start_year, end_year, patent_last_full)
            ),
            timeout(
                deadline,
                geographic::analyze(&ctx, &technology, start_year, end_year, patent_last_full)
            ),
            timeout(deadline, research_impact::analyze(&ctx, &technology, start_year, end_year)),
            timeout(
                deadline,
                temporal::analyze(&ctx, &technology, start_year, end_year, patent_last_full)
            ),
        );

        let mut provenance = Provenance::default();
        let landscape = provenance.collect("Landscape", deadline, landscape_out);
        let maturity = provenance.collect("Maturity", deadline, maturity_out);
        let competitive = provenance.collect("Competitive", deadline, competitive_out);
        let funding = provenance.collect("Funding", deadline, funding_out);
        let cpc_flow = provenance.collect("CpcFlow", cpc_deadline, cpc_out);
        let geographic = provenance.collect("Geographic", deadline, geographic_out);
        let research_impact = provenance.collect("ResearchImpact", deadline, research_out);
        let temporal = provenance.collect("Temporal", deadline, temporal_out);

        let api_alerts = self.compute_api_alerts(&provenance.warnings);

        let explainability = ExplainabilityMetadata {
            sources_used: unique_ordered(provenance.sources),
            methods: unique_ordered(provenance.methods),
            deterministic: true,
            warnings: provenance.warnings,
            api_alerts,
            query_time_ms: started.elapsed().as_millis() as i64,
            data_complete_until: patent_last_full,
        };

        Ok(RadarResponse {
            technology,
            analysis_period: format!("{}-{}", start_year, end_year),
            landscape,
            maturity,
            competitive,
            funding,
            cpc_flow,
            geographic,
            research_impact,
            temporal,
            explainability,
        })
    }

    fn compute_api_alerts(&self, warnings: &[String]) -> Vec<crate::models::ApiAlert> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let has_refresh = !self.config.apis.openaire_refresh_token.is_empty();

        let mut alerts = Vec::new();
        if let Some(alert) = check_jwt_expiry(
            &self.config.apis.openaire_access_token,
            "OpenAIRE",
            now,
            has_refresh,
        ) {
            alerts.push(alert);
        }
        alerts.extend(detect_runtime_failures(warnings));
        alerts
    }
}
