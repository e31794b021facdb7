//! Geographic intelligence: where a technology is being developed.

use crate::analytics::metrics::{merge_country_data, round_to};
use crate::models::{CityCount, CountryPair, GeographicPanel};
use crate::repositories::cordis::CROSS_BORDER_MIN_COUNTRIES;
use crate::repositories::rows::{CountryCount, CrossBorderStats};
use crate::services::DataContext;
use crate::services::panels::{
    PanelOutput, SOURCE_CORDIS, SOURCE_PATENTS, effective_patent_end_year,
};
use crate::utils::ApiResult;

/// Analyze the geographic distribution of patents and projects.
///
/// Applicant countries are preferred over the filing country; the filing
/// country is only a fallback because one office serves many applicants.
pub async fn analyze(
    ctx: &DataContext,
    technology: &str,
    start_year: i32,
    end_year: i32,
    patent_last_full: Option<i32>,
) -> ApiResult<PanelOutput<GeographicPanel>> {
    let mut sources = Vec::new();
    let mut methods = Vec::new();
    let mut warnings = Vec::new();

    let patent_end = effective_patent_end_year(patent_last_full, end_year, &mut warnings);

    let mut patent_countries: Vec<CountryCount> = Vec::new();
    let mut applicant_countries: Vec<CountryCount> = Vec::new();
    if let Some(repo) = &ctx.patent_repo {
        let (filing, applicants) = tokio::join!(
            repo.count_by_country(technology, Some(start_year), Some(patent_end)),
            repo.count_by_applicant_country(technology, Some(start_year), Some(patent_end)),
        );
        match filing {
            Ok(rows) => patent_countries = rows,
            Err(err) => warnings.push(format!("Patent geography query failed: {}", err)),
        }
        match applicants {
            Ok(rows) => applicant_countries = rows,
            Err(err) => warnings.push(format!("Applicant country query failed: {}", err)),
        }
        if !patent_countries.is_empty() || !applicant_countries.is_empty() {
            sources.push(SOURCE_PATENTS.to_string());
        }
    }

    let mut cordis_countries: Vec<CountryCount> = Vec::new();
    let mut city_distribution: Vec<CityCount> = Vec::new();
    let mut collaboration_pairs: Vec<CountryPair> = Vec::new();
    let mut cross_border = CrossBorderStats::default();
    if let Some(repo) = &ctx.cordis_repo {
        let (countries, cities, pairs, cross) = tokio::join!(
            repo.count_by_country(technology, Some(start_year), Some(end_year)),
            repo.orgs_by_city(technology, Some(start_year), Some(end_year), 30),
            repo.country_collaboration_pairs(technology, Some(start_year), Some(end_year), 30),
            repo.cross_border_projects(
                technology,
                Some(start_year),
                Some(end_year),
                CROSS_BORDER_MIN_COUNTRIES
            ),
        );
        match countries {
            Ok(rows) => {
                if !rows.is_empty() {
                    sources.push(SOURCE_CORDIS.to_string());
                }
                cordis_countries = rows;
            },
            Err(err) => warnings.push(format!("CORDIS geography query failed: {}", err)),
        }
        match cities {
            Ok(rows) => {
                city_distribution = rows
                    .into_iter()
                    .map(|c| CityCount { city: c.city, country: c.country, count: c.count })
                    .collect();
            },
            Err(err) => warnings.push(format!("City query failed: {}", err)),
        }
        match pairs {
            Ok(rows) => {
                collaboration_pairs = rows
                    .into_iter()
                    .map(|p| CountryPair {
                        country_a: p.country_a,
                        country_b: p.country_b,
                        count: p.count,
                    })
                    .collect();
            },
            Err(err) => warnings.push(format!("Collaboration pair query failed: {}", err)),
        }
        match cross {
            Ok(stats) => cross_border = stats,
            Err(err) => warnings.push(format!("Cross-border query failed: {}", err)),
        }
    }

    let country_source = if applicant_countries.is_empty() {
        &patent_countries
    } else {
        &applicant_countries
    };
    let country_distribution = merge_country_data(country_source, &cordis_countries, None);

    methods.push(
        "Country aggregation (applicant countries + project organization locations)".to_string(),
    );
    if !collaboration_pairs.is_empty() {
        methods.push("Country collaboration pairs (project partners)".to_string());
    }

    let panel = GeographicPanel {
        total_countries: country_distribution.len() as i64,
        total_cities: city_distribution.len() as i64,
        cross_border_share: round_to(cross_border.cross_border_share, 4),
        country_distribution,
        city_distribution,
        collaboration_pairs,
    };

    Ok(PanelOutput { panel, sources, methods, warnings })
}
