//! Competitive intelligence: actors, concentration, co-activity network.

use std::collections::{HashMap, HashSet};

use crate::adapters::gleif::DEFAULT_MAX_API_CALLS;
use crate::analytics::metrics::{hhi_concentration_level, hhi_index, round_to};
use crate::models::{ActorRecord, ActorShare, CompetitivePanel, NetworkEdge, NetworkNode};
use crate::repositories::rows::CoCountRow;
use crate::services::DataContext;
use crate::services::panels::{
    PanelOutput, SOURCE_CORDIS, SOURCE_GLEIF, SOURCE_PATENTS, effective_patent_end_year,
};
use crate::utils::{ApiResult, actor_key};

const TOP_ACTORS_CHART: usize = 20;
const NETWORK_MAX_NODES: usize = 40;
const NETWORK_MAX_EDGES: usize = 100;
/// Top actors submitted to opportunistic entity resolution.
const GLEIF_LOOKUPS: usize = 10;

#[derive(Default, Clone)]
struct ActorAggregate {
    patents: i64,
    projects: i64,
    country: String,
    sme: Option<bool>,
    coordinator: bool,
}

/// Analyze the competitive landscape.
///
/// Patent applicants and project organizations merge into one
/// uppercase-keyed actor map; concentration (HHI) is computed over all
/// actors, not only the charted top 20.
pub async fn analyze(
    ctx: &DataContext,
    technology: &str,
    start_year: i32,
    end_year: i32,
    patent_last_full: Option<i32>,
) -> ApiResult<PanelOutput<CompetitivePanel>> {
    let mut sources = Vec::new();
    let mut methods = Vec::new();
    let mut warnings = Vec::new();

    let patent_end = effective_patent_end_year(patent_last_full, end_year, &mut warnings);

    let mut actors: HashMap<String, ActorAggregate> = HashMap::new();
    let mut co_pairs: Vec<CoCountRow> = Vec::new();

    if let Some(repo) = &ctx.patent_repo {
        let (applicants, pairs) = tokio::join!(
            repo.top_applicants(technology, Some(start_year), Some(patent_end), 50),
            repo.co_applicants(technology, Some(start_year), Some(patent_end), 200),
        );
        match applicants {
            Ok(rows) => {
                if !rows.is_empty() {
                    sources.push(SOURCE_PATENTS.to_string());
                }
                for row in rows {
                    let key = actor_key(&row.name);
                    if key.is_empty() {
                        continue;
                    }
                    actors.entry(key).or_default().patents += row.count;
                }
            },
            Err(err) => warnings.push(format!("Patent query failed: {}", err)),
        }
        match pairs {
            Ok(rows) => co_pairs.extend(rows),
            Err(err) => warnings.push(format!("Co-applicant query failed: {}", err)),
        }
    }

    if let Some(repo) = &ctx.cordis_repo {
        let (organizations, pairs) = tokio::join!(
            repo.top_organizations_detailed(technology, Some(start_year), Some(end_year), 50),
            repo.co_participation(technology, Some(start_year), Some(end_year), 200),
        );
        match organizations {
            Ok(rows) => {
                if !rows.is_empty() {
                    sources.push(SOURCE_CORDIS.to_string());
                }
                for row in rows {
                    let key = actor_key(&row.name);
                    if key.is_empty() {
                        continue;
                    }
                    let entry = actors.entry(key).or_default();
                    entry.projects += row.count;
                    if entry.country.is_empty() {
                        entry.country = row.country;
                    }
                    if entry.sme.is_none() {
                        entry.sme = Some(row.sme != 0);
                    }
                    entry.coordinator |= row.coordinator != 0;
                }
            },
            Err(err) => warnings.push(format!("CORDIS query failed: {}", err)),
        }
        match pairs {
            Ok(rows) => co_pairs.extend(rows),
            Err(err) => warnings.push(format!("Co-participation query failed: {}", err)),
        }
    }

    if actors.is_empty() {
        return Ok(PanelOutput { panel: CompetitivePanel::default(), sources, methods, warnings });
    }

    // Rank by combined activity, name ascending on ties for stable output
    let mut ranked: Vec<(String, ActorAggregate)> = actors.into_iter().collect();
    ranked.sort_by(|a, b| {
        let total_a = a.1.patents + a.1.projects;
        let total_b = b.1.patents + b.1.projects;
        total_b.cmp(&total_a).then_with(|| a.0.cmp(&b.0))
    });

    let total_activity: i64 = ranked.iter().map(|(_, a)| a.patents + a.projects).sum();

    let top_actors: Vec<ActorShare> = ranked
        .iter()
        .take(TOP_ACTORS_CHART)
        .map(|(name, agg)| {
            let count = agg.patents + agg.projects;
            ActorShare {
                name: name.clone(),
                count,
                share: if total_activity > 0 {
                    round_to(count as f64 / total_activity as f64, 4)
                } else {
                    0.0
                },
            }
        })
        .collect();

    let shares: Vec<f64> = ranked
        .iter()
        .map(|(_, agg)| (agg.patents + agg.projects) as f64 / total_activity as f64)
        .collect();
    let hhi = hhi_index(&shares);
    let (level, _level_de) = hhi_concentration_level(hhi);
    methods.push("HHI index (Herfindahl-Hirschman)".to_string());

    let top_3: i64 = ranked.iter().take(3).map(|(_, a)| a.patents + a.projects).sum();
    let top_3_share = if total_activity > 0 {
        round_to(top_3 as f64 / total_activity as f64, 4)
    } else {
        0.0
    };

    methods.push("Actor aggregation (patent applicants + project organizations)".to_string());

    let mut full_actors: Vec<ActorRecord> = ranked
        .iter()
        .map(|(name, agg)| ActorRecord {
            name: name.clone(),
            patents: agg.patents,
            projects: agg.projects,
            total: agg.patents + agg.projects,
            country: agg.country.clone(),
            sme: agg.sme,
            coordinator: agg.coordinator,
            lei: None,
        })
        .collect();

    // Opportunistic entity resolution of the leading actors, cache-backed
    // and strictly capped
    if let Some(gleif) = &ctx.gleif {
        let names: Vec<String> =
            full_actors.iter().take(GLEIF_LOOKUPS).map(|a| a.name.clone()).collect();
        match gleif.resolve_batch(&names, DEFAULT_MAX_API_CALLS).await {
            Ok(resolved) => {
                let by_name: HashMap<String, _> = resolved.into_iter().collect();
                let mut any_hit = false;
                for actor in full_actors.iter_mut().take(GLEIF_LOOKUPS) {
                    if let Some(Some(entity)) = by_name.get(&actor.name) {
                        any_hit = true;
                        actor.lei = Some(entity.lei.clone());
                        if actor.country.is_empty() {
                            actor.country = entity.country.clone();
                        }
                    }
                }
                if any_hit {
                    sources.push(SOURCE_GLEIF.to_string());
                    methods.push("Entity resolution (GLEIF LEI, cached)".to_string());
                }
            },
            Err(err) => {
                warnings.push(format!("GLEIF entity resolution failed: {}", err));
            },
        }
    }

    let (network_nodes, network_edges) = build_network(&ranked, &co_pairs);
    if !network_edges.is_empty() {
        methods.push("Co-activity network (co-applicants + co-participation)".to_string());
    }

    let panel = CompetitivePanel {
        hhi_index: round_to(hhi, 1),
        concentration_level: level.to_string(),
        top_actors,
        top_3_share,
        network_nodes,
        network_edges,
        full_actors,
    };

    Ok(PanelOutput { panel, sources, methods, warnings })
}

/// Build the co-activity graph: top nodes by activity, top edges by
/// co-count, isolated nodes dropped.
fn build_network(
    ranked: &[(String, ActorAggregate)],
    co_pairs: &[CoCountRow],
) -> (Vec<NetworkNode>, Vec<NetworkEdge>) {
    let node_names: HashSet<String> = ranked
        .iter()
        .take(NETWORK_MAX_NODES)
        .map(|(name, _)| name.clone())
        .collect();

    // Merge duplicate pairs from both stores, keyed on the uppercased names
    let mut edge_weights: HashMap<(String, String), i64> = HashMap::new();
    for pair in co_pairs {
        let a = actor_key(&pair.actor_a);
        let b = actor_key(&pair.actor_b);
        if a == b || !node_names.contains(&a) || !node_names.contains(&b) {
            continue;
        }
        let key = if a < b { (a, b) } else { (b, a) };
        *edge_weights.entry(key).or_default() += pair.co_count;
    }

    let mut edges: Vec<NetworkEdge> = edge_weights
        .into_iter()
        .map(|((source, target), weight)| NetworkEdge { source, target, weight })
        .collect();
    edges.sort_by(|a, b| {
        b.weight
            .cmp(&a.weight)
            .then_with(|| a.source.cmp(&b.source))
            .then_with(|| a.target.cmp(&b.target))
    });
    edges.truncate(NETWORK_MAX_EDGES);

    let connected: HashSet<&str> = edges
        .iter()
        .flat_map(|e| [e.source.as_str(), e.target.as_str()])
        .collect();

    let nodes: Vec<NetworkNode> = ranked
        .iter()
        .take(NETWORK_MAX_NODES)
        .filter(|(name, _)| connected.contains(name.as_str()))
        .map(|(name, agg)| NetworkNode {
            id: name.clone(),
            label: name.clone(),
            size: agg.patents + agg.projects,
        })
        .collect();

    (nodes, edges)
}
