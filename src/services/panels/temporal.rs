//! Temporal dynamics: how the actor field and technology breadth evolve.

use std::collections::{BTreeMap, HashMap};

use crate::analytics::temporal::{
    ActorsByYear, actor_dynamics, actor_timeline, programme_evolution, technology_breadth,
};
use crate::models::{InstrumentFunding, TemporalPanel};
use crate::repositories::rows::InstrumentRow;
use crate::services::DataContext;
use crate::services::panels::{PanelOutput, SOURCE_CORDIS, SOURCE_PATENTS, effective_patent_end_year};
use crate::utils::{ApiResult, actor_key};

const TIMELINE_ACTORS: usize = 10;

/// Analyze the temporal dynamics of a technology field.
pub async fn analyze(
    ctx: &DataContext,
    technology: &str,
    start_year: i32,
    end_year: i32,
    patent_last_full: Option<i32>,
) -> ApiResult<PanelOutput<TemporalPanel>> {
    let mut sources = Vec::new();
    let mut methods = Vec::new();
    let mut warnings = Vec::new();

    let patent_end = effective_patent_end_year(patent_last_full, end_year, &mut warnings);

    let mut actors_by_year: ActorsByYear = BTreeMap::new();
    let mut cpc_by_year: BTreeMap<i32, Vec<String>> = BTreeMap::new();
    let mut instrument_data: Vec<InstrumentRow> = Vec::new();

    if let Some(repo) = &ctx.patent_repo {
        let (applicants, cpc_rows) = tokio::join!(
            repo.top_applicants_by_year(technology, Some(start_year), Some(patent_end)),
            repo.cpc_codes_with_years(technology, Some(start_year), Some(patent_end), 10_000),
        );
        match applicants {
            Ok(rows) => {
                if !rows.is_empty() {
                    sources.push(SOURCE_PATENTS.to_string());
                }
                for row in rows {
                    let name = actor_key(&row.name);
                    if name.is_empty() {
                        continue;
                    }
                    *actors_by_year.entry(row.year).or_default().entry(name).or_default() +=
                        row.count;
                }
            },
            Err(err) => warnings.push(format!("Patent temporal query failed: {}", err)),
        }
        match cpc_rows {
            Ok(rows) => {
                for row in rows {
                    cpc_by_year.entry(row.year).or_default().push(row.cpc_codes);
                }
            },
            Err(err) => warnings.push(format!("CPC temporal query failed: {}", err)),
        }
    }

    if let Some(repo) = &ctx.cordis_repo {
        let (organizations, instruments) = tokio::join!(
            repo.orgs_by_year(technology, Some(start_year), Some(end_year)),
            repo.funding_by_instrument(technology, Some(start_year), Some(end_year)),
        );
        match organizations {
            Ok(rows) => {
                if !rows.is_empty() {
                    sources.push(SOURCE_CORDIS.to_string());
                }
                for row in rows {
                    let name = actor_key(&row.name);
                    if name.is_empty() {
                        continue;
                    }
                    *actors_by_year.entry(row.year).or_default().entry(name).or_default() +=
                        row.count;
                }
            },
            Err(err) => warnings.push(format!("CORDIS temporal query failed: {}", err)),
        }
        match instruments {
            Ok(rows) => instrument_data = rows,
            Err(err) => warnings.push(format!("Instrument query failed: {}", err)),
        }
    }

    let entrant_persistence = actor_dynamics(&actors_by_year);
    let tech_breadth = technology_breadth(&cpc_by_year);
    let timeline = actor_timeline(&actors_by_year, TIMELINE_ACTORS);
    let programme_evo = programme_evolution(&instrument_data);

    let latest = entrant_persistence.last();
    let new_entrant_rate = latest.map(|e| e.new_entrant_rate).unwrap_or(0.0);
    let persistence_rate = latest.map(|e| e.persistence_rate).unwrap_or(0.0);

    // Dominant funding instrument over the whole window
    let mut programme_counts: HashMap<&str, i64> = HashMap::new();
    for row in &instrument_data {
        *programme_counts.entry(row.scheme.as_str()).or_default() += row.count;
    }
    let dominant_programme = programme_counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(scheme, _)| scheme.to_string())
        .unwrap_or_default();

    methods.push("Actor dynamics (new entrant rate, persistence rate)".to_string());
    if !tech_breadth.is_empty() {
        methods.push("Technology breadth (unique CPC sections per year)".to_string());
    }

    let instrument_evolution: Vec<InstrumentFunding> = instrument_data
        .into_iter()
        .map(|row| InstrumentFunding {
            instrument: row.scheme,
            year: row.year,
            count: row.count,
            funding: row.funding,
        })
        .collect();

    let panel = TemporalPanel {
        new_entrant_rate,
        persistence_rate,
        dominant_programme,
        actor_timeline: timeline,
        programme_evolution: programme_evo,
        entrant_persistence_trend: entrant_persistence,
        instrument_evolution,
        technology_breadth: tech_breadth,
    };

    Ok(PanelOutput { panel, sources, methods, warnings })
}
