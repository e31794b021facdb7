//! Research impact: academic footprint of a technology.

use crate::analytics::metrics::round_to;
use crate::analytics::research::{
    citation_trend, h_index, publication_types, top_papers, venue_distribution,
};
use crate::models::ResearchImpactPanel;
use crate::services::DataContext;
use crate::services::panels::{PanelOutput, SOURCE_SEMANTIC_SCHOLAR};
use crate::utils::ApiResult;

const PAPER_LIMIT: usize = 200;
const TOP_PAPERS: usize = 10;
const TOP_VENUES: usize = 8;

/// Analyze research impact from the paper-search sample.
pub async fn analyze(
    ctx: &DataContext,
    technology: &str,
    start_year: i32,
    end_year: i32,
) -> ApiResult<PanelOutput<ResearchImpactPanel>> {
    let mut sources = Vec::new();
    let mut methods = Vec::new();
    let mut warnings = Vec::new();

    let result = ctx
        .semantic_scholar
        .search_papers(technology, start_year, end_year, PAPER_LIMIT)
        .await;
    if let Some(err) = &result.error {
        warnings.push(format!("Semantic Scholar query failed: {}", err));
    }
    let papers = result.papers;

    if papers.is_empty() {
        return Ok(PanelOutput {
            panel: ResearchImpactPanel::default(),
            sources,
            methods,
            warnings,
        });
    }
    sources.push(SOURCE_SEMANTIC_SCHOLAR.to_string());

    let citations: Vec<i64> = papers.iter().map(|p| p.citation_count.unwrap_or(0)).collect();
    let influential: Vec<i64> =
        papers.iter().map(|p| p.influential_citation_count.unwrap_or(0)).collect();

    let h = h_index(&citations);
    let total_citations: i64 = citations.iter().sum();
    let total_influential: i64 = influential.iter().sum();
    let avg_citations = total_citations as f64 / papers.len() as f64;
    let influential_ratio = if total_citations > 0 {
        total_influential as f64 / total_citations as f64
    } else {
        0.0
    };

    methods.push("h-index (Hirsch 2005; topic-level adaptation)".to_string());
    methods.push(format!("Sample: {} papers (top-{} by relevance)", papers.len(), PAPER_LIMIT));
    methods.push("Influential citations (Valenzuela et al. 2015)".to_string());
    if papers.len() >= PAPER_LIMIT {
        warnings.push(format!(
            "h-index based on the top {} most relevant papers — approximation, not a full corpus",
            PAPER_LIMIT
        ));
    }

    let panel = ResearchImpactPanel {
        h_index: h,
        avg_citations: round_to(avg_citations, 1),
        total_papers: papers.len() as i64,
        influential_ratio: round_to(influential_ratio, 4),
        citation_trend: citation_trend(&papers),
        top_papers: top_papers(&papers, TOP_PAPERS),
        top_venues: venue_distribution(&papers, TOP_VENUES),
        publication_types: publication_types(&papers),
    };

    Ok(PanelOutput { panel, sources, methods, warnings })
}
