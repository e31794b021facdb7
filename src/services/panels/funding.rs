//! EU funding radar: CORDIS funding aggregation.

use crate::analytics::metrics::{cagr, round_to};
use crate::models::{
    FundingPanel, FundingYear, InstrumentFunding, ProgrammeFunding, ProgrammeYearFunding,
};
use crate::services::DataContext;
use crate::services::panels::{PanelOutput, SOURCE_CORDIS, WARN_NO_CORDIS_STORE};
use crate::utils::ApiResult;

/// Analyze EU funding for a technology, exclusively from the project store
/// (FP7, H2020, Horizon Europe).
pub async fn analyze(
    ctx: &DataContext,
    technology: &str,
    start_year: i32,
    end_year: i32,
) -> ApiResult<PanelOutput<FundingPanel>> {
    let mut sources = Vec::new();
    let mut methods = Vec::new();
    let mut warnings = Vec::new();

    let Some(repo) = &ctx.cordis_repo else {
        warnings.push(WARN_NO_CORDIS_STORE.to_string());
        return Ok(PanelOutput { panel: FundingPanel::default(), sources, methods, warnings });
    };

    // Completeness cutoff for the growth metric
    let last_full = match repo.last_full_year().await {
        Ok(last_full) => {
            if let Some(last) = last_full {
                if last < end_year {
                    warnings.push(format!(
                        "CORDIS data complete through {} (incomplete from {})",
                        last,
                        last + 1
                    ));
                }
            }
            last_full
        },
        Err(err) => {
            tracing::warn!("CORDIS completeness probe failed: {}", err);
            None
        },
    };

    let (funding_years, programme_rows, year_programme_rows, instrument_rows) = tokio::join!(
        repo.funding_by_year(technology, Some(start_year), Some(end_year)),
        repo.funding_by_programme(technology, Some(start_year), Some(end_year)),
        repo.funding_by_year_and_programme(technology, Some(start_year), Some(end_year)),
        repo.funding_by_instrument(technology, Some(start_year), Some(end_year)),
    );

    let funding_years = match funding_years {
        Ok(rows) => {
            sources.push(SOURCE_CORDIS.to_string());
            rows
        },
        Err(err) => {
            warnings.push(format!("Funding series query failed: {}", err));
            Vec::new()
        },
    };
    let programme_rows = programme_rows.unwrap_or_else(|err| {
        warnings.push(format!("Programme query failed: {}", err));
        Vec::new()
    });
    let year_programme_rows = year_programme_rows.unwrap_or_else(|err| {
        warnings.push(format!("Programme series query failed: {}", err));
        Vec::new()
    });
    let instrument_rows = instrument_rows.unwrap_or_else(|err| {
        warnings.push(format!("Instrument query failed: {}", err));
        Vec::new()
    });

    let total_funding: f64 = funding_years.iter().map(|f| f.funding).sum();
    let total_projects: i64 = funding_years.iter().map(|f| f.count).sum();
    let avg_size = if total_projects > 0 { total_funding / total_projects as f64 } else { 0.0 };

    // CAGR only over complete years, between the first and last non-zero
    // funding years, spanning actual calendar years
    let mut funding_cagr = 0.0;
    let mut cagr_period = String::new();
    let cagr_cutoff = last_full.unwrap_or(end_year);
    let non_zero: Vec<_> = funding_years
        .iter()
        .filter(|f| f.funding > 0.0 && f.year <= cagr_cutoff)
        .collect();
    if non_zero.len() >= 2 {
        let first = non_zero[0];
        let last = non_zero[non_zero.len() - 1];
        let year_span = last.year - first.year;
        if year_span > 0 {
            funding_cagr = cagr(first.funding, last.funding, year_span);
            cagr_period = format!("{}–{}", first.year, last.year);
            methods.push(format!(
                "Funding CAGR over {} years ({}-{}, complete years only)",
                year_span, first.year, last.year
            ));
        }
    }

    let time_series: Vec<FundingYear> = funding_years
        .iter()
        .map(|f| FundingYear {
            year: f.year,
            funding: round_to(f.funding, 2),
            projects: f.count,
        })
        .collect();

    let by_programme: Vec<ProgrammeFunding> = programme_rows
        .iter()
        .map(|p| ProgrammeFunding {
            programme: p.programme.clone(),
            funding: round_to(p.funding, 2),
            projects: p.count,
        })
        .collect();

    let time_series_by_programme: Vec<ProgrammeYearFunding> = year_programme_rows
        .iter()
        .map(|yp| ProgrammeYearFunding {
            year: yp.year,
            programme: yp.programme.clone(),
            funding: round_to(yp.funding, 2),
            projects: yp.count,
        })
        .collect();

    let instrument_breakdown: Vec<InstrumentFunding> = instrument_rows
        .iter()
        .map(|inst| InstrumentFunding {
            instrument: inst.scheme.clone(),
            year: inst.year,
            count: inst.count,
            funding: round_to(inst.funding, 2),
        })
        .collect();

    methods.push("EU funding aggregation (FP7, H2020, Horizon Europe)".to_string());

    let panel = FundingPanel {
        total_funding_eur: round_to(total_funding, 2),
        funding_cagr: round_to(funding_cagr, 2),
        funding_cagr_period: cagr_period,
        avg_project_size: round_to(avg_size, 2),
        by_programme,
        time_series,
        time_series_by_programme,
        instrument_breakdown,
    };

    Ok(PanelOutput { panel, sources, methods, warnings })
}
