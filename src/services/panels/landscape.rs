//! Technology landscape: patents, projects, and publications at a glance.

use crate::analytics::metrics::{merge_country_data, merge_time_series};
use crate::models::LandscapePanel;
use crate::repositories::rows::{CountryCount, YearCount};
use crate::services::DataContext;
use crate::services::panels::{
    PanelOutput, SOURCE_CORDIS, SOURCE_OPENAIRE, SOURCE_PATENTS, WARN_NO_CORDIS_STORE,
    WARN_NO_PATENT_STORE, effective_patent_end_year,
};
use crate::utils::ApiResult;

/// Analyze the overall technology landscape.
///
/// Patent queries run against the clamped window; project queries keep the
/// full window because projects are forward-looking. All five queries are
/// dispatched concurrently.
pub async fn analyze(
    ctx: &DataContext,
    technology: &str,
    start_year: i32,
    end_year: i32,
    patent_last_full: Option<i32>,
) -> ApiResult<PanelOutput<LandscapePanel>> {
    let mut sources = Vec::new();
    let mut methods = Vec::new();
    let mut warnings = Vec::new();

    let patent_end = effective_patent_end_year(patent_last_full, end_year, &mut warnings);

    let patents_fut = async {
        match &ctx.patent_repo {
            Some(repo) => Some(tokio::join!(
                repo.count_by_year(technology, Some(start_year), Some(patent_end)),
                repo.count_by_country(technology, Some(start_year), Some(patent_end)),
            )),
            None => None,
        }
    };
    let projects_fut = async {
        match &ctx.cordis_repo {
            Some(repo) => Some(tokio::join!(
                repo.count_by_year(technology, Some(start_year), Some(end_year)),
                repo.count_by_country(technology, Some(start_year), Some(end_year)),
            )),
            None => None,
        }
    };
    let publications_fut = ctx.openaire.count_by_year(technology, start_year, end_year);

    let (patent_results, project_results, publication_result) =
        tokio::join!(patents_fut, projects_fut, publications_fut);

    let mut patent_years: Vec<YearCount> = Vec::new();
    let mut patent_countries: Vec<CountryCount> = Vec::new();
    match patent_results {
        Some((years, countries)) => {
            match years {
                Ok(rows) => patent_years = rows,
                Err(err) => warnings.push(format!("Query 'patent_years' failed: {}", err)),
            }
            match countries {
                Ok(rows) => patent_countries = rows,
                Err(err) => warnings.push(format!("Query 'patent_countries' failed: {}", err)),
            }
        },
        None => warnings.push(WARN_NO_PATENT_STORE.to_string()),
    }

    let mut project_years: Vec<YearCount> = Vec::new();
    let mut project_countries: Vec<CountryCount> = Vec::new();
    match project_results {
        Some((years, countries)) => {
            match years {
                Ok(rows) => project_years = rows,
                Err(err) => warnings.push(format!("Query 'project_years' failed: {}", err)),
            }
            match countries {
                Ok(rows) => project_countries = rows,
                Err(err) => warnings.push(format!("Query 'project_countries' failed: {}", err)),
            }
        },
        None => warnings.push(WARN_NO_CORDIS_STORE.to_string()),
    }

    let mut publication_years: Vec<YearCount> = Vec::new();
    match publication_result {
        Ok(rows) => publication_years = rows,
        Err(err) => warnings.push(format!("Query 'publication_years' failed: {}", err)),
    }

    let total_patents: i64 = patent_years.iter().map(|y| y.count).sum();
    let total_projects: i64 = project_years.iter().map(|y| y.count).sum();
    let total_publications: i64 = publication_years.iter().map(|y| y.count).sum();

    if !patent_years.is_empty() || !patent_countries.is_empty() {
        sources.push(SOURCE_PATENTS.to_string());
    }
    if !project_years.is_empty() || !project_countries.is_empty() {
        sources.push(SOURCE_CORDIS.to_string());
    }
    if !publication_years.is_empty() {
        sources.push(SOURCE_OPENAIRE.to_string());
    }

    methods.push("FTS5 full-text search".to_string());
    methods.push("Yearly aggregation".to_string());
    if !publication_years.is_empty() {
        methods.push("Normalized growth rates (YoY %)".to_string());
    }

    let time_series = merge_time_series(
        &patent_years,
        &project_years,
        &publication_years,
        start_year,
        end_year,
    );
    let top_countries = merge_country_data(&patent_countries, &project_countries, Some(20));

    let panel = LandscapePanel {
        total_patents,
        total_projects,
        total_publications,
        time_series,
        top_countries,
    };

    Ok(PanelOutput { panel, sources, methods, warnings })
}
