//! Temporal dynamics of a technology field.
//!
//! Stateless functions over per-year actor and CPC aggregates; no I/O.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::analytics::metrics::round_to;
use crate::models::{ActorDynamicsYear, ActorTimeline, BreadthYear, ProgrammeEvolutionYear};
use crate::repositories::rows::InstrumentRow;

/// Per-year actor activity: year -> actor name -> count.
pub type ActorsByYear = BTreeMap<i32, HashMap<String, i64>>;

/// New-entrant and persistence rates between consecutive years.
///
/// The first observed year counts fully as new entrants; persistence is the
/// share of the previous year's actors still active.
pub fn actor_dynamics(actors_by_year: &ActorsByYear) -> Vec<ActorDynamicsYear> {
    let mut result = Vec::new();
    let mut prev_actors: HashSet<&str> = HashSet::new();

    for (&year, actors) in actors_by_year {
        let current: HashSet<&str> = actors.keys().map(|s| s.as_str()).collect();

        let (new_entrant_rate, persistence_rate) = if prev_actors.is_empty() {
            (1.0, 0.0)
        } else {
            let new_entrants = current.difference(&prev_actors).count();
            let persisting = current.intersection(&prev_actors).count();
            let entrant = if current.is_empty() {
                0.0
            } else {
                new_entrants as f64 / current.len() as f64
            };
            (entrant, persisting as f64 / prev_actors.len() as f64)
        };

        result.push(ActorDynamicsYear {
            year,
            new_entrant_rate: round_to(new_entrant_rate, 4),
            persistence_rate: round_to(persistence_rate, 4),
            total_actors: current.len() as i64,
        });

        prev_actors = current;
    }

    result
}

/// Technology breadth per year (Leydesdorff et al. 2015).
///
/// Two granularities: CPC sections (A-H, at most 9) and subclass-level
/// codes (first 4 characters).
pub fn technology_breadth(cpc_by_year: &BTreeMap<i32, Vec<String>>) -> Vec<BreadthYear> {
    let mut result = Vec::new();

    for (&year, cpc_strings) in cpc_by_year {
        let mut sections: HashSet<char> = HashSet::new();
        let mut subclasses: HashSet<&str> = HashSet::new();
        for cpc_string in cpc_strings {
            for code in cpc_string.split(',') {
                let code = code.trim();
                if code.is_empty() {
                    continue;
                }
                if let Some(section) = code.chars().next() {
                    sections.insert(section);
                }
                if let Some(subclass) = code.get(..4) {
                    subclasses.insert(subclass);
                }
            }
        }
        result.push(BreadthYear {
            year,
            unique_cpc_sections: sections.len() as i64,
            unique_cpc_subclasses: subclasses.len() as i64,
        });
    }

    result
}

/// Top-N actors with the years they were active in.
pub fn actor_timeline(actors_by_year: &ActorsByYear, top_n: usize) -> Vec<ActorTimeline> {
    let mut total_counts: HashMap<&str, i64> = HashMap::new();
    let mut actor_years: HashMap<&str, Vec<i32>> = HashMap::new();

    for (&year, actors) in actors_by_year {
        for (name, &count) in actors {
            *total_counts.entry(name.as_str()).or_default() += count;
            actor_years.entry(name.as_str()).or_default().push(year);
        }
    }

    let mut ranked: Vec<(&str, i64)> = total_counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    ranked
        .into_iter()
        .take(top_n)
        .map(|(name, total_count)| {
            let mut years_active = actor_years.remove(name).unwrap_or_default();
            years_active.sort_unstable();
            ActorTimeline { name: name.to_string(), years_active, total_count }
        })
        .collect()
}

/// Funding-scheme distribution per year, for a stacked area chart.
pub fn programme_evolution(instrument_data: &[InstrumentRow]) -> Vec<ProgrammeEvolutionYear> {
    let mut by_year: BTreeMap<i32, BTreeMap<String, i64>> = BTreeMap::new();
    for row in instrument_data {
        *by_year
            .entry(row.year)
            .or_default()
            .entry(row.scheme.clone())
            .or_default() += row.count;
    }

    by_year
        .into_iter()
        .map(|(year, schemes)| ProgrammeEvolutionYear { year, schemes })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actors(entries: &[(i32, &[(&str, i64)])]) -> ActorsByYear {
        entries
            .iter()
            .map(|&(year, actors)| {
                (year, actors.iter().map(|&(n, c)| (n.to_string(), c)).collect())
            })
            .collect()
    }

    #[test]
    fn first_year_is_all_new_entrants() {
        let data = actors(&[(2020, &[("A", 1), ("B", 2)])]);
        let dynamics = actor_dynamics(&data);
        assert_eq!(dynamics.len(), 1);
        assert_eq!(dynamics[0].new_entrant_rate, 1.0);
        assert_eq!(dynamics[0].persistence_rate, 0.0);
        assert_eq!(dynamics[0].total_actors, 2);
    }

    #[test]
    fn rates_between_consecutive_years() {
        let data = actors(&[
            (2020, &[("A", 1), ("B", 1)]),
            (2021, &[("B", 2), ("C", 1)]),
        ]);
        let dynamics = actor_dynamics(&data);
        // 2021: C is new out of {B, C}; B persists out of {A, B}
        assert_eq!(dynamics[1].new_entrant_rate, 0.5);
        assert_eq!(dynamics[1].persistence_rate, 0.5);
    }

    #[test]
    fn breadth_counts_sections_and_subclasses() {
        let mut cpc = BTreeMap::new();
        cpc.insert(2020, vec!["H01L33/00,G06N10/00".to_string(), "H01M4/00".to_string()]);
        let breadth = technology_breadth(&cpc);
        assert_eq!(breadth[0].unique_cpc_sections, 2); // H, G
        assert_eq!(breadth[0].unique_cpc_subclasses, 3); // H01L, G06N, H01M
    }

    #[test]
    fn timeline_ranks_by_total_activity() {
        let data = actors(&[
            (2020, &[("A", 5), ("B", 1)]),
            (2021, &[("A", 3), ("B", 10)]),
        ]);
        let timeline = actor_timeline(&data, 10);
        assert_eq!(timeline[0].name, "B");
        assert_eq!(timeline[0].total_count, 11);
        assert_eq!(timeline[0].years_active, vec![2020, 2021]);
    }

    #[test]
    fn evolution_groups_by_year_and_scheme() {
        let rows = vec![
            InstrumentRow { scheme: "RIA".into(), year: 2020, count: 2, funding: 1000.0 },
            InstrumentRow { scheme: "RIA".into(), year: 2020, count: 1, funding: 500.0 },
            InstrumentRow { scheme: "CSA".into(), year: 2021, count: 4, funding: 800.0 },
        ];
        let evolution = programme_evolution(&rows);
        assert_eq!(evolution.len(), 2);
        assert_eq!(evolution[0].schemes["RIA"], 3);
        assert_eq!(evolution[1].schemes["CSA"], 4);
    }
}
