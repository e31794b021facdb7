//! CPC technology flow: co-classification analysis via Jaccard index.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::analytics::cpc::{
    DEFAULT_CPC_LEVEL, assign_colors, build_cooccurrence_with_years, build_jaccard_from_sql,
    build_year_data_from_aggregates, extract_cpc_sets_with_years,
};
use crate::analytics::describe_cpc;
use crate::analytics::sampling::{
    CENSUS_THRESHOLD, DEFAULT_SAMPLE_SIZE, estimate_jaccard_confidence, stratified_sample,
};
use crate::models::{CpcFlowPanel, CpcYearData};
use crate::repositories::PatentRepository;
use crate::services::DataContext;
use crate::services::panels::{PanelOutput, SOURCE_PATENTS, effective_patent_end_year};
use crate::utils::ApiResult;

const TOP_N_CODES: usize = 15;
/// Fetch bound for the in-process fallback; the sampler reduces to
/// `DEFAULT_SAMPLE_SIZE` afterwards.
const FALLBACK_FETCH_LIMIT: i64 = 50_000;

/// Analyze CPC co-classification flows.
///
/// Prefers the SQL-native path over `patent_cpc` (full population, no
/// sampling). Without that table, falls back to parsing the denormalized
/// CPC strings in-process with a deterministic year-stratified sample.
pub async fn analyze(
    ctx: &DataContext,
    technology: &str,
    start_year: i32,
    end_year: i32,
    patent_last_full: Option<i32>,
) -> ApiResult<PanelOutput<CpcFlowPanel>> {
    let mut sources = Vec::new();
    let mut methods = Vec::new();
    let mut warnings = Vec::new();

    let Some(repo) = &ctx.patent_repo else {
        warnings.push("Patent store unavailable — CPC analysis skipped".to_string());
        return Ok(PanelOutput { panel: CpcFlowPanel::default(), sources, methods, warnings });
    };

    let effective_end = effective_patent_end_year(patent_last_full, end_year, &mut warnings);

    let panel = if repo.has_cpc_table().await? {
        analyze_sql_path(
            repo,
            technology,
            start_year,
            effective_end,
            &mut sources,
            &mut methods,
            &mut warnings,
        )
        .await?
    } else {
        tracing::info!("patent_cpc table missing — falling back to in-process path");
        analyze_fallback_path(
            repo,
            technology,
            start_year,
            effective_end,
            &mut sources,
            &mut methods,
            &mut warnings,
        )
        .await?
    };

    Ok(PanelOutput { panel, sources, methods, warnings })
}

/// SQL-native Jaccard over the normalized `patent_cpc` table.
async fn analyze_sql_path(
    repo: &PatentRepository,
    technology: &str,
    start_year: i32,
    end_year: i32,
    sources: &mut Vec<String>,
    methods: &mut Vec<String>,
    warnings: &mut Vec<String>,
) -> ApiResult<CpcFlowPanel> {
    let aggregates = repo
        .compute_cpc_aggregates(technology, Some(start_year), Some(end_year), TOP_N_CODES)
        .await?;

    let labels: Vec<String> = aggregates
        .ranked_codes
        .iter()
        .take(TOP_N_CODES)
        .map(|c| c.name.clone())
        .collect();
    if labels.len() < 2 {
        warnings.push("Too few CPC codes for a flow analysis".to_string());
        return Ok(CpcFlowPanel::default());
    }
    sources.push(SOURCE_PATENTS.to_string());

    let code_counts: HashMap<String, i64> = aggregates
        .ranked_codes
        .iter()
        .map(|c| (c.name.clone(), c.count))
        .collect();
    let pair_tuples: Vec<(String, String, i64)> = aggregates
        .pair_counts
        .iter()
        .map(|p| (p.actor_a.clone(), p.actor_b.clone(), p.co_count))
        .collect();
    let (matrix, total_connections) = build_jaccard_from_sql(&labels, &code_counts, &pair_tuples);

    let all_codes: Vec<String> =
        aggregates.ranked_codes.iter().map(|c| c.name.clone()).collect();
    let year_data = build_year_data_from_aggregates(
        all_codes,
        &aggregates.cpc_year_counts,
        &aggregates.pair_year_counts,
    );

    let colors = assign_colors(&labels);
    let cpc_descriptions = describe_labels(&labels, &year_data);

    methods.push("CPC co-classification (Jaccard index, SQL-native)".to_string());
    methods.push(format!(
        "CPC level {} (top {} codes, {} patents)",
        DEFAULT_CPC_LEVEL,
        labels.len(),
        aggregates.total_patents
    ));

    Ok(CpcFlowPanel {
        matrix,
        labels,
        colors,
        total_patents_analyzed: aggregates.total_patents,
        total_connections,
        cpc_level: DEFAULT_CPC_LEVEL as i32,
        year_data,
        cpc_descriptions,
    })
}

/// In-process fallback over the denormalized CPC strings.
async fn analyze_fallback_path(
    repo: &PatentRepository,
    technology: &str,
    start_year: i32,
    end_year: i32,
    sources: &mut Vec<String>,
    methods: &mut Vec<String>,
    warnings: &mut Vec<String>,
) -> ApiResult<CpcFlowPanel> {
    let rows = repo
        .cpc_codes_with_years(technology, Some(start_year), Some(end_year), FALLBACK_FETCH_LIMIT)
        .await?;
    if rows.is_empty() {
        warnings.push("No CPC codes found for this technology".to_string());
        return Ok(CpcFlowPanel::default());
    }
    sources.push(SOURCE_PATENTS.to_string());

    let patent_data = extract_cpc_sets_with_years(&rows, DEFAULT_CPC_LEVEL);
    if patent_data.len() < 2 {
        warnings.push("Too few patents with multiple CPC codes for a flow analysis".to_string());
        return Ok(CpcFlowPanel::default());
    }

    let sample = stratified_sample(&patent_data, DEFAULT_SAMPLE_SIZE, CENSUS_THRESHOLD);
    if sample.was_sampled {
        methods.push("Year-stratified sampling (proportional, systematic midpoint)".to_string());
    }
    warnings.push(format!(
        "Sample capped at {} patents (patent_cpc migration recommended)",
        DEFAULT_SAMPLE_SIZE
    ));

    let (labels, matrix, total_connections, year_data) =
        build_cooccurrence_with_years(&sample.sampled_data, TOP_N_CODES);
    if labels.len() < 2 {
        warnings.push("Too few CPC codes for a flow analysis".to_string());
        return Ok(CpcFlowPanel::default());
    }

    if sample.was_sampled {
        if let Some(confidence) = strongest_pair_confidence(&labels, &matrix, &sample.sampled_data, sample.population_size) {
            methods.push(confidence);
        }
    }

    let colors = assign_colors(&labels);
    let cpc_descriptions = describe_labels(&labels, &year_data);

    methods.push("CPC co-classification (Jaccard index)".to_string());
    methods.push(format!("CPC level {} (top {} codes)", DEFAULT_CPC_LEVEL, labels.len()));

    Ok(CpcFlowPanel {
        matrix,
        labels,
        colors,
        total_patents_analyzed: sample.sample_size as i64,
        total_connections,
        cpc_level: DEFAULT_CPC_LEVEL as i32,
        year_data,
        cpc_descriptions,
    })
}

/// 95% CI of the strongest observed pair, as a method annotation.
fn strongest_pair_confidence(
    labels: &[String],
    matrix: &[Vec<f64>],
    sampled: &[(BTreeSet<String>, i32)],
    population_size: usize,
) -> Option<String> {
    let mut best: Option<(usize, usize)> = None;
    let mut best_value = 0.0f64;
    for (i, row) in matrix.iter().enumerate() {
        for (j, &value) in row.iter().enumerate().skip(i + 1) {
            if value > best_value {
                best_value = value;
                best = Some((i, j));
            }
        }
    }
    let (i, j) = best?;

    let code_a = &labels[i];
    let code_b = &labels[j];
    let mut intersection = 0usize;
    let mut union = 0usize;
    for (codes, _) in sampled {
        let has_a = codes.contains(code_a);
        let has_b = codes.contains(code_b);
        if has_a && has_b {
            intersection += 1;
        }
        if has_a || has_b {
            union += 1;
        }
    }

    let confidence =
        estimate_jaccard_confidence(intersection, union, sampled.len(), population_size);
    Some(format!(
        "Strongest pair {}|{}: Jaccard {:.4} (95% CI {:.4}-{:.4})",
        code_a, code_b, confidence.jaccard, confidence.ci_lower, confidence.ci_upper
    ))
}

fn describe_labels(labels: &[String], year_data: &CpcYearData) -> BTreeMap<String, String> {
    labels
        .iter()
        .chain(year_data.all_labels.iter())
        .map(|label| (label.clone(), describe_cpc(label)))
        .collect()
}
