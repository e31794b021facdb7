//! CPC co-classification: Jaccard index over subclass-level code sets.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::analytics::metrics::round_to;
use crate::models::CpcYearData;
use crate::repositories::rows::CpcCodesRow;

/// Hierarchy depth used everywhere: level 4 = subclass (e.g. "H01L").
pub const DEFAULT_CPC_LEVEL: usize = 4;

/// Section colors (sections A-H plus Y).
const CPC_COLORS: [(&str, &str); 9] = [
    ("A", "#ef4444"),
    ("B", "#f97316"),
    ("C", "#eab308"),
    ("D", "#22c55e"),
    ("E", "#06b6d4"),
    ("F", "#3b82f6"),
    ("G", "#8b5cf6"),
    ("H", "#ec4899"),
    ("Y", "#6b7280"),
];

const FALLBACK_COLOR: &str = "#9ca3af";

/// Truncate a CPC code to a hierarchy level after stripping spaces.
///
/// Level 4 yields the subclass ("H01L"), level 3 the class ("H01").
pub fn normalize_cpc(code: &str, level: usize) -> String {
    let clean: String = code.trim().chars().filter(|c| !c.is_whitespace()).collect();
    if clean.len() >= level {
        clean[..level].to_string()
    } else {
        clean
    }
}

/// Parse comma-separated CPC strings into per-patent code sets with years.
///
/// Patents with fewer than two distinct normalized codes are dropped; they
/// cannot contribute to co-classification.
pub fn extract_cpc_sets_with_years(
    rows: &[CpcCodesRow],
    level: usize,
) -> Vec<(BTreeSet<String>, i32)> {
    let mut result = Vec::new();
    for row in rows {
        if row.cpc_codes.is_empty() || row.year == 0 {
            continue;
        }
        let codes: BTreeSet<String> = row
            .cpc_codes
            .split(',')
            .filter(|c| !c.trim().is_empty())
            .map(|c| normalize_cpc(c, level))
            .collect();
        if codes.len() >= 2 {
            result.push((codes, row.year));
        }
    }
    result
}

/// Rank codes by document frequency, most frequent first.
///
/// Ties break on the code itself so the ranking is reproducible.
fn rank_codes(patent_sets: &[&BTreeSet<String>]) -> Vec<String> {
    let mut counter: HashMap<&str, i64> = HashMap::new();
    for codes in patent_sets {
        for code in codes.iter() {
            *counter.entry(code.as_str()).or_default() += 1;
        }
    }
    let mut ranked: Vec<(&str, i64)> = counter.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked.into_iter().map(|(code, _)| code.to_string()).collect()
}

/// Co-occurrence with per-year tracking for frontend time-slice recomputation.
///
/// Returns `(labels, jaccard_matrix, total_connections, year_data)`. The
/// matrix covers the top-N codes only; the year data tracks every code so a
/// frontend can recompute arbitrary windows.
pub fn build_cooccurrence_with_years(
    patent_data: &[(BTreeSet<String>, i32)],
    top_n: usize,
) -> (Vec<String>, Vec<Vec<f64>>, i64, CpcYearData) {
    let patent_sets: Vec<&BTreeSet<String>> = patent_data.iter().map(|(codes, _)| codes).collect();

    let all_codes = rank_codes(&patent_sets);
    let top_codes: Vec<String> = all_codes.iter().take(top_n).cloned().collect();
    if top_codes.len() < 2 {
        return (top_codes, Vec::new(), 0, CpcYearData::default());
    }

    let n = top_codes.len();
    let code_index: HashMap<&str, usize> =
        top_codes.iter().enumerate().map(|(i, c)| (c.as_str(), i)).collect();
    let all_code_set: HashSet<&str> = all_codes.iter().map(|c| c.as_str()).collect();

    let mut pair_counts: HashMap<(usize, usize), i64> = HashMap::new();
    let mut code_patent_sets: Vec<HashSet<usize>> = vec![HashSet::new(); n];

    let mut pair_counts_by_year: BTreeMap<i32, BTreeMap<String, i64>> = BTreeMap::new();
    let mut cpc_counts_by_year: BTreeMap<i32, BTreeMap<String, i64>> = BTreeMap::new();

    for (patent_id, (codes, year)) in patent_data.iter().enumerate() {
        // Year-level counts cover every ranked code, not only the top-N
        let year_counts = cpc_counts_by_year.entry(*year).or_default();
        for code in codes.iter() {
            if all_code_set.contains(code.as_str()) {
                *year_counts.entry(code.clone()).or_default() += 1;
            }
        }

        let year_pairs = pair_counts_by_year.entry(*year).or_default();
        let relevant_all: Vec<&String> =
            codes.iter().filter(|c| all_code_set.contains(c.as_str())).collect();
        for (i, a) in relevant_all.iter().enumerate() {
            for b in &relevant_all[i + 1..] {
                *year_pairs.entry(format!("{}|{}", a, b)).or_default() += 1;
            }
        }

        // Overall matrix, top-N only
        let mut relevant: Vec<usize> =
            codes.iter().filter_map(|c| code_index.get(c.as_str()).copied()).collect();
        relevant.sort_unstable();
        for &idx in &relevant {
            code_patent_sets[idx].insert(patent_id);
        }
        for (i, &a) in relevant.iter().enumerate() {
            for &b in &relevant[i + 1..] {
                *pair_counts.entry((a, b)).or_default() += 1;
            }
        }
    }

    let mut matrix = vec![vec![0.0f64; n]; n];
    let mut total_connections = 0i64;
    for (&(a, b), &count) in &pair_counts {
        if count < 1 {
            continue;
        }
        let union_size = code_patent_sets[a].union(&code_patent_sets[b]).count();
        let jaccard = if union_size > 0 { count as f64 / union_size as f64 } else { 0.0 };
        let rounded = round_to(jaccard, 4);
        matrix[a][b] = rounded;
        matrix[b][a] = rounded;
        total_connections += 1;
    }

    let min_year = cpc_counts_by_year.keys().next().copied().unwrap_or(0);
    let max_year = cpc_counts_by_year.keys().next_back().copied().unwrap_or(0);
    let year_data = CpcYearData {
        min_year,
        max_year,
        all_labels: all_codes,
        pair_counts: pair_counts_by_year
            .into_iter()
            .map(|(year, counts)| (year.to_string(), counts))
            .collect(),
        cpc_counts: cpc_counts_by_year
            .into_iter()
            .map(|(year, counts)| (year.to_string(), counts))
            .collect(),
    };

    (top_codes, matrix, total_connections, year_data)
}

/// Jaccard matrix from SQL-side aggregates.
///
/// `J(a, b) = co / (count_a + count_b - co)` over the per-code patent
/// counts and the co-occurrence pair counts.
pub fn build_jaccard_from_sql(
    top_codes: &[String],
    code_counts: &HashMap<String, i64>,
    pair_counts: &[(String, String, i64)],
) -> (Vec<Vec<f64>>, i64) {
    let n = top_codes.len();
    if n < 2 {
        return (Vec::new(), 0);
    }

    let code_index: HashMap<&str, usize> =
        top_codes.iter().enumerate().map(|(i, c)| (c.as_str(), i)).collect();
    let mut matrix = vec![vec![0.0f64; n]; n];
    let mut total_connections = 0i64;

    for (code_a, code_b, co_count) in pair_counts {
        if *co_count < 1 {
            continue;
        }
        let (Some(&ia), Some(&ib)) =
            (code_index.get(code_a.as_str()), code_index.get(code_b.as_str()))
        else {
            continue;
        };
        let count_a = *code_counts.get(code_a).unwrap_or(&0);
        let count_b = *code_counts.get(code_b).unwrap_or(&0);
        let union = count_a + count_b - co_count;
        let jaccard = if union > 0 { *co_count as f64 / union as f64 } else { 0.0 };
        let rounded = round_to(jaccard, 4);
        matrix[ia][ib] = rounded;
        matrix[ib][ia] = rounded;
        total_connections += 1;
    }

    (matrix, total_connections)
}

/// Assemble the per-year payload from SQL aggregates.
///
/// Output shape matches `build_cooccurrence_with_years` so the frontend
/// contract is identical on both computation paths.
pub fn build_year_data_from_aggregates(
    all_codes: Vec<String>,
    cpc_year_counts: &[(String, i32, i64)],
    pair_year_counts: &[(String, String, i32, i64)],
) -> CpcYearData {
    let mut years_seen: BTreeSet<i32> = BTreeSet::new();
    let mut cpc_counts: BTreeMap<String, BTreeMap<String, i64>> = BTreeMap::new();
    let mut pair_counts: BTreeMap<String, BTreeMap<String, i64>> = BTreeMap::new();

    for (code, year, count) in cpc_year_counts {
        years_seen.insert(*year);
        cpc_counts.entry(year.to_string()).or_default().insert(code.clone(), *count);
    }

    for (code_a, code_b, year, co_count) in pair_year_counts {
        years_seen.insert(*year);
        let key = if code_a < code_b {
            format!("{}|{}", code_a, code_b)
        } else {
            format!("{}|{}", code_b, code_a)
        };
        pair_counts.entry(year.to_string()).or_default().insert(key, *co_count);
    }

    CpcYearData {
        min_year: years_seen.iter().next().copied().unwrap_or(0),
        max_year: years_seen.iter().next_back().copied().unwrap_or(0),
        all_labels: all_codes,
        pair_counts,
        cpc_counts,
    }
}

/// Section color per label, keyed on the first letter.
pub fn assign_colors(labels: &[String]) -> Vec<String> {
    labels
        .iter()
        .map(|label| {
            label
                .chars()
                .next()
                .and_then(|section| {
                    CPC_COLORS
                        .iter()
                        .find(|(s, _)| s.chars().next() == Some(section))
                        .map(|(_, color)| color.to_string())
                })
                .unwrap_or_else(|| FALLBACK_COLOR.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(codes: &[&str]) -> BTreeSet<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn normalize_truncates_to_subclass() {
        assert_eq!(normalize_cpc("H01L33/00", 4), "H01L");
        assert_eq!(normalize_cpc(" G06N ", 4), "G06N");
        assert_eq!(normalize_cpc("H01L 33/00", 4), "H01L");
        assert_eq!(normalize_cpc("G06", 4), "G06");
        assert_eq!(normalize_cpc("H01L", 3), "H01");
    }

    #[test]
    fn extract_drops_single_code_patents() {
        let rows = vec![
            CpcCodesRow { cpc_codes: "H01L33/00,G06N10/00".into(), year: 2020 },
            CpcCodesRow { cpc_codes: "H01L33/00,H01L35/00".into(), year: 2020 },
            CpcCodesRow { cpc_codes: "B82Y10/00".into(), year: 2021 },
            CpcCodesRow { cpc_codes: "".into(), year: 2021 },
        ];
        let sets = extract_cpc_sets_with_years(&rows, 4);
        // Second row collapses to a single subclass and is dropped too
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].0, set(&["G06N", "H01L"]));
    }

    #[test]
    fn jaccard_on_six_documents() {
        // Documents: {A,B} {A,B} {A,C} {B,C} {B,D} {A,B,C}
        let data = vec![
            (set(&["A", "B"]), 2020),
            (set(&["A", "B"]), 2020),
            (set(&["A", "C"]), 2021),
            (set(&["B", "C"]), 2021),
            (set(&["B", "D"]), 2022),
            (set(&["A", "B", "C"]), 2022),
        ];
        let (labels, matrix, connections, year_data) = build_cooccurrence_with_years(&data, 4);

        assert_eq!(labels.len(), 4);
        let idx = |c: &str| labels.iter().position(|l| l == c).unwrap();
        let (a, b) = (idx("A"), idx("B"));
        // A and B co-occur in three documents; six documents carry at least
        // one of them
        assert_eq!(matrix[a][b], 0.5);
        assert_eq!(matrix[b][a], 0.5);
        for (i, row) in matrix.iter().enumerate() {
            assert_eq!(row[i], 0.0);
            for (j, &v) in row.iter().enumerate() {
                assert_eq!(v, matrix[j][i]);
            }
        }
        assert!(connections > 0);
        assert_eq!(year_data.min_year, 2020);
        assert_eq!(year_data.max_year, 2022);
        assert_eq!(year_data.all_labels.len(), 4);
    }

    #[test]
    fn perfect_cooccurrence_is_one() {
        let data = vec![
            (set(&["A", "B"]), 2020),
            (set(&["A", "B"]), 2021),
            (set(&["A", "B"]), 2022),
        ];
        let (labels, matrix, _, _) = build_cooccurrence_with_years(&data, 5);
        let a = labels.iter().position(|l| l == "A").unwrap();
        let b = labels.iter().position(|l| l == "B").unwrap();
        assert_eq!(matrix[a][b], 1.0);
    }

    #[test]
    fn values_stay_in_unit_range() {
        let data = vec![
            (set(&["A", "B"]), 2020),
            (set(&["A", "B"]), 2020),
            (set(&["A", "C"]), 2021),
            (set(&["B", "C"]), 2021),
        ];
        let (_, matrix, _, _) = build_cooccurrence_with_years(&data, 5);
        for row in &matrix {
            for &value in row {
                assert!((0.0..=1.0).contains(&value));
            }
        }
    }

    #[test]
    fn fewer_than_two_codes_yields_empty_matrix() {
        let data = vec![(set(&["A", "B"]), 2020)];
        let (labels, matrix, connections, _) = build_cooccurrence_with_years(&data, 1);
        assert_eq!(labels.len(), 1);
        assert!(matrix.is_empty());
        assert_eq!(connections, 0);
    }

    #[test]
    fn sql_aggregate_matrix_matches_formula() {
        let top = vec!["G06N".to_string(), "H01L".to_string()];
        let counts: HashMap<String, i64> =
            [("G06N".to_string(), 10), ("H01L".to_string(), 8)].into();
        let pairs = vec![("G06N".to_string(), "H01L".to_string(), 4)];
        let (matrix, connections) = build_jaccard_from_sql(&top, &counts, &pairs);
        // 4 / (10 + 8 - 4)
        assert_eq!(matrix[0][1], 0.2857);
        assert_eq!(matrix[1][0], 0.2857);
        assert_eq!(connections, 1);
    }

    #[test]
    fn year_data_from_aggregates_orders_pair_keys() {
        let year_data = build_year_data_from_aggregates(
            vec!["A".into(), "B".into()],
            &[("A".into(), 2020, 5), ("B".into(), 2021, 3)],
            &[("B".into(), "A".into(), 2020, 2)],
        );
        assert_eq!(year_data.min_year, 2020);
        assert_eq!(year_data.max_year, 2021);
        assert_eq!(year_data.pair_counts["2020"]["A|B"], 2);
    }

    #[test]
    fn colors_follow_sections() {
        let labels = vec!["H01L".to_string(), "G06N".to_string(), "Z999".to_string()];
        let colors = assign_colors(&labels);
        assert_eq!(colors[0], "#ec4899");
        assert_eq!(colors[1], "#8b5cf6");
        assert_eq!(colors[2], FALLBACK_COLOR);
    }
}
