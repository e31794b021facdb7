//! Deterministic metrics for technology intelligence.
//!
//! Pure functions without I/O, reproducible for identical inputs.

use std::collections::HashMap;

use crate::models::{CountryActivity, LandscapeYear};
use crate::repositories::rows::{CountryCount, YearCount};

/// Round to `digits` decimal places.
pub(crate) fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

/// Compound Annual Growth Rate as a percentage.
///
/// `periods` is the calendar-year span between the first and last non-zero
/// observations, never the number of observations. Returns 0.0 when the span
/// or either endpoint is non-positive: CAGR is undefined there and a zero
/// reads as "no usable trend" downstream.
pub fn cagr(first_value: f64, last_value: f64, periods: i32) -> f64 {
    if periods <= 0 || first_value <= 0.0 || last_value <= 0.0 {
        return 0.0;
    }
    ((last_value / first_value).powf(1.0 / periods as f64) - 1.0) * 100.0
}

/// Herfindahl-Hirschman Index for market concentration.
///
/// Input: market shares in [0, 1]. Output: 0..=10000.
pub fn hhi_index(shares: &[f64]) -> f64 {
    shares.iter().map(|s| s * s).sum::<f64>() * 10_000.0
}

/// Translate an HHI value into a concentration level (EN, DE).
pub fn hhi_concentration_level(hhi: f64) -> (&'static str, &'static str) {
    if hhi < 1500.0 {
        ("Low", "Gering")
    } else if hhi < 2500.0 {
        ("Moderate", "Moderat")
    } else {
        ("High", "Hoch")
    }
}

/// Weighted confidence for an S-curve based phase classification.
///
/// R² carries 60% of the weight, data coverage (15+ years = full) 20%, and
/// sample size (200+ patents = full) 20%. Clamped to [0.1, 0.95].
pub fn s_curve_confidence(r_squared: f64, n_years: usize, total_patents: i64) -> f64 {
    let data_factor = (n_years as f64 / 15.0).min(1.0);
    let sample_factor = (total_patents as f64 / 200.0).min(1.0);
    let raw = r_squared * 0.6 + data_factor * 0.2 + sample_factor * 0.2;
    round_to(raw.clamp(0.1, 0.95), 2)
}

/// Result of a maturity phase classification.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseClassification {
    pub phase: &'static str,
    pub phase_de: &'static str,
    pub confidence: f64,
}

/// Phase from a fitted maturity ratio, thresholds after Gao et al. (2013).
pub fn classify_phase_from_fit(maturity_percent: f64, r_squared: f64) -> PhaseClassification {
    let confidence = round_to(r_squared.min(0.95), 2);
    let (phase, phase_de) = if maturity_percent < 10.0 {
        ("Emerging", "Aufkommend")
    } else if maturity_percent < 50.0 {
        ("Growing", "Wachsend")
    } else if maturity_percent < 90.0 {
        ("Mature", "Ausgereift")
    } else {
        ("Saturation", "Sättigung")
    };
    PhaseClassification { phase, phase_de, confidence }
}

/// Fallback phase classification from the raw yearly counts.
///
/// Four-way decision on halves-mean growth, recent three-year slope, and the
/// coefficient of variation of the second half. Used when the S-curve fit is
/// refused or fails to converge.
pub fn classify_phase_heuristic(yearly_counts: &[i64]) -> PhaseClassification {
    let unknown =
        PhaseClassification { phase: "Unknown", phase_de: "Unbekannt", confidence: 0.0 };
    if yearly_counts.len() < 3 {
        return unknown;
    }

    let n = yearly_counts.len();
    let mid = n / 2;
    let first_half = if mid > 0 { &yearly_counts[..mid] } else { &yearly_counts[..1] };
    let second_half = &yearly_counts[mid..];

    let avg = |xs: &[i64]| -> f64 {
        if xs.is_empty() {
            0.0
        } else {
            xs.iter().sum::<i64>() as f64 / xs.len() as f64
        }
    };
    let avg_first = avg(first_half);
    let avg_second = avg(second_half);

    // Recent three-year trend
    let recent = &yearly_counts[n.saturating_sub(3)..];
    let recent_growth = if recent.len() >= 2 && recent[0] > 0 {
        (recent[recent.len() - 1] - recent[0]) as f64 / recent[0] as f64
    } else {
        0.0
    };

    let overall_growth = if avg_first > 0.0 {
        (avg_second - avg_first) / avg_first
    } else if avg_second > 0.0 {
        1.0
    } else {
        0.0
    };

    // Coefficient of variation of the second half (stability)
    let cv = if !second_half.is_empty() && avg_second > 0.0 {
        let variance = second_half
            .iter()
            .map(|&x| (x as f64 - avg_second).powi(2))
            .sum::<f64>()
            / second_half.len() as f64;
        variance.sqrt() / avg_second
    } else {
        1.0
    };

    if yearly_counts.iter().sum::<i64>() == 0 {
        return unknown;
    }

    let (phase, phase_de, confidence) = if overall_growth > 0.5 && recent_growth > 0.1 {
        ("Emerging", "Aufkommend", (0.5 + overall_growth * 0.3).min(0.9))
    } else if overall_growth > 0.1 && recent_growth > -0.1 {
        ("Growing", "Wachsend", (0.5 + (1.0 - cv) * 0.3).min(0.9))
    } else if overall_growth.abs() <= 0.2 && cv < 0.4 {
        ("Mature", "Ausgereift", (0.6 + (1.0 - cv) * 0.3).min(0.9))
    } else if overall_growth < -0.1 || recent_growth < -0.2 {
        ("Declining", "Rückläufig", (0.5 + overall_growth.abs() * 0.3).min(0.9))
    } else {
        ("Growing", "Wachsend", 0.4)
    };

    PhaseClassification { phase, phase_de, confidence: round_to(confidence, 2) }
}

/// Year-over-year change in percent. None when the previous year is zero.
pub fn yoy_growth(current: i64, previous: i64) -> Option<f64> {
    if previous == 0 {
        return None;
    }
    Some(round_to((current - previous) as f64 / previous as f64 * 100.0, 1))
}

/// Merge patent, project, and publication year series into one timeline with
/// YoY growth per source. Years are emitted in ascending order over the full
/// requested window.
pub fn merge_time_series(
    patent_years: &[YearCount],
    project_years: &[YearCount],
    publication_years: &[YearCount],
    start_year: i32,
    end_year: i32,
) -> Vec<LandscapeYear> {
    let to_map =
        |ys: &[YearCount]| -> HashMap<i32, i64> { ys.iter().map(|y| (y.year, y.count)).collect() };
    let patent_map = to_map(patent_years);
    let project_map = to_map(project_years);
    let publication_map = to_map(publication_years);

    let mut series = Vec::new();
    for (i, year) in (start_year..=end_year).enumerate() {
        let patents = *patent_map.get(&year).unwrap_or(&0);
        let projects = *project_map.get(&year).unwrap_or(&0);
        let publications = *publication_map.get(&year).unwrap_or(&0);

        let mut entry = LandscapeYear {
            year,
            patents,
            projects,
            publications,
            ..Default::default()
        };

        if i > 0 {
            let prev = year - 1;
            entry.patents_growth = yoy_growth(patents, *patent_map.get(&prev).unwrap_or(&0));
            entry.projects_growth = yoy_growth(projects, *project_map.get(&prev).unwrap_or(&0));
            entry.publications_growth =
                yoy_growth(publications, *publication_map.get(&prev).unwrap_or(&0));
        }

        series.push(entry);
    }
    series
}

/// Merge patent-side and project-side country histograms.
///
/// Sorted by combined total descending (country code ascending on ties, so
/// the output is stable across runs), optionally truncated.
pub fn merge_country_data(
    patent_countries: &[CountryCount],
    project_countries: &[CountryCount],
    limit: Option<usize>,
) -> Vec<CountryActivity> {
    let mut data: HashMap<String, (i64, i64)> = HashMap::new();

    for entry in patent_countries {
        data.entry(entry.country.clone()).or_default().0 = entry.count;
    }
    for entry in project_countries {
        data.entry(entry.country.clone()).or_default().1 = entry.count;
    }

    let mut result: Vec<CountryActivity> = data
        .into_iter()
        .map(|(country, (patents, projects))| CountryActivity {
            country,
            patents,
            projects,
            total: patents + projects,
        })
        .collect();

    result.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.country.cmp(&b.country)));
    if let Some(limit) = limit {
        result.truncate(limit);
    }
    result
}

/// Last fully covered calendar year for a store's max date (YYYY-MM-DD).
///
/// A year counts as complete once data reaches November; otherwise the
/// previous year is the last one safe to use for growth and fit metrics.
/// Malformed input yields None.
pub fn last_full_year_from_date(max_date: &str) -> Option<i32> {
    if max_date.len() < 7 {
        return None;
    }
    let year: i32 = max_date.get(0..4)?.parse().ok()?;
    let month: u32 = max_date.get(5..7)?.parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    Some(if month >= 11 { year } else { year - 1 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn years(pairs: &[(i32, i64)]) -> Vec<YearCount> {
        pairs.iter().map(|&(year, count)| YearCount { year, count }).collect()
    }

    #[test]
    fn cagr_positive_growth() {
        assert!((cagr(100.0, 200.0, 5) - 14.87).abs() < 0.01);
    }

    #[test]
    fn cagr_one_period() {
        assert!((cagr(100.0, 150.0, 1) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn cagr_invalid_inputs_return_zero() {
        assert_eq!(cagr(100.0, 200.0, 0), 0.0);
        assert_eq!(cagr(100.0, 200.0, -1), 0.0);
        assert_eq!(cagr(0.0, 200.0, 5), 0.0);
        assert_eq!(cagr(100.0, 0.0, 5), 0.0);
    }

    #[test]
    fn hhi_monopoly_is_10000() {
        assert_eq!(hhi_index(&[1.0]), 10_000.0);
    }

    #[test]
    fn hhi_duopoly_is_5000_and_high() {
        let hhi = hhi_index(&[0.5, 0.5]);
        assert_eq!(hhi, 5000.0);
        assert_eq!(hhi_concentration_level(hhi).0, "High");
    }

    #[test]
    fn hhi_empty_is_zero() {
        assert_eq!(hhi_index(&[]), 0.0);
    }

    #[test]
    fn hhi_bounds() {
        let shares = [0.25, 0.25, 0.25, 0.25];
        let hhi = hhi_index(&shares);
        assert!((0.0..=10_000.0).contains(&hhi));
        assert_eq!(hhi, 2500.0);
        assert_eq!(hhi_concentration_level(hhi).0, "High");
        assert_eq!(hhi_concentration_level(2499.9).0, "Moderate");
        assert_eq!(hhi_concentration_level(1499.9).0, "Low");
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(s_curve_confidence(0.0, 0, 0), 0.1);
        assert_eq!(s_curve_confidence(1.0, 20, 500), 0.95);
        // 0.9*0.6 + 10/15*0.2 + 100/200*0.2
        assert_eq!(s_curve_confidence(0.9, 10, 100), 0.77);
    }

    #[test]
    fn phase_thresholds_from_fit() {
        assert_eq!(classify_phase_from_fit(5.0, 0.9).phase, "Emerging");
        assert_eq!(classify_phase_from_fit(30.0, 0.9).phase, "Growing");
        assert_eq!(classify_phase_from_fit(70.0, 0.9).phase, "Mature");
        assert_eq!(classify_phase_from_fit(95.0, 0.9).phase, "Saturation");
    }

    #[test]
    fn phase_heuristic_needs_three_years() {
        assert_eq!(classify_phase_heuristic(&[1, 2]).phase, "Unknown");
        assert_eq!(classify_phase_heuristic(&[]).phase, "Unknown");
    }

    #[test]
    fn phase_heuristic_detects_strong_growth() {
        let counts = [1, 2, 4, 10, 25, 60];
        assert_eq!(classify_phase_heuristic(&counts).phase, "Emerging");
    }

    #[test]
    fn phase_heuristic_detects_decline() {
        let counts = [50, 45, 40, 20, 10, 5];
        assert_eq!(classify_phase_heuristic(&counts).phase, "Declining");
    }

    #[test]
    fn yoy_growth_basics() {
        assert_eq!(yoy_growth(110, 100), Some(10.0));
        assert_eq!(yoy_growth(90, 100), Some(-10.0));
        assert_eq!(yoy_growth(5, 0), None);
    }

    #[test]
    fn merged_series_covers_window_and_sums_match() {
        let patents = years(&[(2020, 3), (2021, 6)]);
        let projects = years(&[(2021, 2)]);
        let pubs = years(&[(2020, 1), (2022, 4)]);
        let series = merge_time_series(&patents, &projects, &pubs, 2020, 2022);

        assert_eq!(series.len(), 3);
        assert_eq!(series.iter().map(|e| e.patents).sum::<i64>(), 9);
        assert_eq!(series.iter().map(|e| e.projects).sum::<i64>(), 2);
        assert_eq!(series.iter().map(|e| e.publications).sum::<i64>(), 5);
        // First year never carries growth fields
        assert!(series[0].patents_growth.is_none());
        // 3 -> 6 is +100%
        assert_eq!(series[1].patents_growth, Some(100.0));
        // previous year zero -> no growth value
        assert!(series[1].projects_growth.is_none());
    }

    #[test]
    fn country_merge_sorts_by_total() {
        let patents = vec![
            CountryCount { country: "DE".into(), count: 10 },
            CountryCount { country: "US".into(), count: 5 },
        ];
        let projects = vec![
            CountryCount { country: "FR".into(), count: 8 },
            CountryCount { country: "US".into(), count: 7 },
        ];
        let merged = merge_country_data(&patents, &projects, None);
        assert_eq!(merged[0].country, "US");
        assert_eq!(merged[0].total, 12);
        assert_eq!(merged[1].country, "DE");
        assert_eq!(merged[2].country, "FR");

        let limited = merge_country_data(&patents, &projects, Some(2));
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn last_full_year_rule() {
        assert_eq!(last_full_year_from_date("2023-11-02"), Some(2023));
        assert_eq!(last_full_year_from_date("2023-12-31"), Some(2023));
        assert_eq!(last_full_year_from_date("2023-08-10"), Some(2022));
        assert_eq!(last_full_year_from_date("2023-01-01"), Some(2022));
        assert_eq!(last_full_year_from_date("garbage"), None);
        assert_eq!(last_full_year_from_date(""), None);
        assert_eq!(last_full_year_from_date("2023-99-01"), None);
    }
}
