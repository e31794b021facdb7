//! Technology maturity assessment via S-curve analysis.

use std::collections::HashMap;

use crate::analytics::metrics::{
    cagr, classify_phase_from_fit, classify_phase_heuristic, round_to, s_curve_confidence,
};
use crate::analytics::scurve::fit_best_model;
use crate::models::{MaturityPanel, MaturityYear};
use crate::services::DataContext;
use crate::services::panels::{
    PanelOutput, SOURCE_PATENTS, WARN_NO_PATENT_STORE, effective_patent_end_year,
};
use crate::utils::ApiResult;

/// Minimum cumulative patents before an S-curve fit is meaningful.
const MIN_PATENTS_FOR_FIT: i64 = 30;

/// Analyze technology maturity from the cumulative patent series.
///
/// Patent families are preferred over raw counts (OECD 2009) so an
/// invention filed in several jurisdictions is counted once. The fit runs
/// only over fully covered years; with too little data the growth-pattern
/// heuristic takes over.
pub async fn analyze(
    ctx: &DataContext,
    technology: &str,
    start_year: i32,
    end_year: i32,
    patent_last_full: Option<i32>,
) -> ApiResult<PanelOutput<MaturityPanel>> {
    let mut sources = Vec::new();
    let mut methods = Vec::new();
    let mut warnings = Vec::new();

    let mut patent_years: HashMap<i32, i64> = HashMap::new();

    match &ctx.patent_repo {
        Some(repo) => {
            let family_rows = repo
                .count_families_by_year(technology, Some(start_year), Some(end_year))
                .await;
            match family_rows {
                Ok(rows) if !rows.is_empty() => {
                    patent_years = rows.into_iter().map(|r| (r.year, r.count)).collect();
                    methods.push("Patent family deduplication (DISTINCT family_id)".to_string());
                },
                Ok(_) => {
                    match repo.count_by_year(technology, Some(start_year), Some(end_year)).await {
                        Ok(rows) => {
                            patent_years = rows.into_iter().map(|r| (r.year, r.count)).collect()
                        },
                        Err(err) => warnings.push(format!("Patent query failed: {}", err)),
                    }
                },
                Err(err) => warnings.push(format!("Patent query failed: {}", err)),
            }
            if !patent_years.is_empty() {
                sources.push(SOURCE_PATENTS.to_string());
            }
        },
        None => warnings.push(WARN_NO_PATENT_STORE.to_string()),
    }

    let effective_end = effective_patent_end_year(patent_last_full, end_year, &mut warnings);

    // Full-window series with cumulative sums
    let all_years: Vec<i32> = (start_year..=end_year).collect();
    let counts: Vec<i64> = all_years
        .iter()
        .map(|year| *patent_years.get(year).unwrap_or(&0))
        .collect();
    let mut cumulative = Vec::with_capacity(counts.len());
    let mut running = 0i64;
    for &count in &counts {
        running += count;
        cumulative.push(running);
    }

    let time_series: Vec<MaturityYear> = all_years
        .iter()
        .zip(counts.iter().zip(cumulative.iter()))
        .map(|(&year, (&patents, &cumulative))| MaturityYear { year, patents, cumulative })
        .collect();

    // Growth metrics only over complete years
    let fit_len = all_years.iter().take_while(|&&y| y <= effective_end).count();
    let fit_years = &all_years[..fit_len];
    let fit_counts = &counts[..fit_len];
    let fit_cumulative = &cumulative[..fit_len];

    // CAGR between the first and last non-zero observations, over the
    // calendar-year span
    let mut growth_rate = 0.0;
    let non_zero: Vec<usize> =
        fit_counts.iter().enumerate().filter(|(_, &c)| c > 0).map(|(i, _)| i).collect();
    if non_zero.len() >= 2 {
        let (first_idx, last_idx) = (non_zero[0], non_zero[non_zero.len() - 1]);
        let year_span = fit_years[last_idx] - fit_years[first_idx];
        if year_span > 0 {
            growth_rate =
                cagr(fit_counts[first_idx] as f64, fit_counts[last_idx] as f64, year_span);
            methods.push(format!(
                "CAGR over {} years ({}-{})",
                year_span, fit_years[first_idx], fit_years[last_idx]
            ));
        }
    }

    let fit_total = fit_cumulative.last().copied().unwrap_or(0);
    let fit_result = if fit_total >= MIN_PATENTS_FOR_FIT {
        fit_best_model(fit_years, fit_cumulative)
    } else {
        if fit_total > 0 {
            warnings.push(format!(
                "Too few patents ({}) for an S-curve fit (minimum: {}) — falling back to heuristic",
                fit_total, MIN_PATENTS_FOR_FIT
            ));
        }
        None
    };

    let panel = match fit_result {
        Some(fit) => {
            methods.push(format!("S-curve ({}, R²={})", fit.model, fit.r_squared));
            methods.push("Phase classification (Gao et al. 2013)".to_string());

            let confidence = s_curve_confidence(fit.r_squared, fit_years.len(), fit_total);
            let classification = classify_phase_from_fit(fit.maturity_percent, fit.r_squared);

            MaturityPanel {
                phase: classification.phase.to_string(),
                phase_de: classification.phase_de.to_string(),
                confidence,
                cagr: round_to(growth_rate, 2),
                maturity_percent: fit.maturity_percent,
                saturation_level: fit.saturation,
                inflection_year: fit.inflection,
                r_squared: fit.r_squared,
                fit_model: fit.model.to_string(),
                time_series,
                s_curve_fitted: fit.fitted,
            }
        },
        None => {
            if fit_total >= MIN_PATENTS_FOR_FIT {
                warnings.push("S-curve fit failed — falling back to heuristic".to_string());
            }
            let classification = classify_phase_heuristic(&counts);
            methods.push("Phase classification (growth-pattern heuristic)".to_string());

            MaturityPanel {
                phase: classification.phase.to_string(),
                phase_de: classification.phase_de.to_string(),
                confidence: classification.confidence,
                cagr: round_to(growth_rate, 2),
                time_series,
                ..Default::default()
            }
        },
    };

    Ok(PanelOutput { panel, sources, methods, warnings })
}
