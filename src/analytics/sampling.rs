//! Deterministic year-stratified sampling for patent analyses.
//!
//! Proportional allocation with systematic selection:
//!
//! 1. Stratify the population by publication year.
//! 2. Allocate the target proportionally: n_h = n * N_h / N, floored, with
//!    small strata (N_h <= census threshold) taken in full, and rounding
//!    corrected by the largest-remainder (Hare quota) method.
//! 3. Select systematically inside each stratum with a midpoint start:
//!    step k = N_h / n_h, start s = k / 2, indices floor(s + i * k).
//!
//! The midpoint rule avoids edge effects and needs no random number
//! generator: identical input always yields the identical sample, across
//! runs and platforms.
//!
//! References: Cochran (1977) ch. 5/7; Madow & Madow (1944).

use std::collections::BTreeMap;

/// Default sample cap for CPC co-classification.
pub const DEFAULT_SAMPLE_SIZE: usize = 10_000;

/// Strata of at most this size are taken in full.
pub const CENSUS_THRESHOLD: usize = 5;

/// Per-stratum population and sample counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StratumInfo {
    pub population_count: usize,
    pub sample_count: usize,
    pub is_census: bool,
}

/// Result of a stratified sample draw.
#[derive(Debug, Clone)]
pub struct SamplingResult<T> {
    /// Selected items, ordered by year then original index.
    pub sampled_data: Vec<(T, i32)>,
    pub population_size: usize,
    pub sample_size: usize,
    pub sampling_fraction: f64,
    pub strata_info: BTreeMap<i32, StratumInfo>,
    /// True when a reduction actually happened.
    pub was_sampled: bool,
}

/// Draw a proportional year-stratified sample.
///
/// `data` pairs each item with its publication year. When the population
/// already fits the target the input is returned unchanged.
///
/// Panics when `target_size` is zero; that is a caller bug, not a data
/// condition.
pub fn stratified_sample<T: Clone>(
    data: &[(T, i32)],
    target_size: usize,
    census_threshold: usize,
) -> SamplingResult<T> {
    assert!(target_size >= 1, "target_size must be >= 1, got {}", target_size);

    let population_size = data.len();

    if population_size <= target_size {
        let strata = group_by_year(data);
        let strata_info = strata
            .iter()
            .map(|(&year, indices)| {
                (
                    year,
                    StratumInfo {
                        population_count: indices.len(),
                        sample_count: indices.len(),
                        is_census: true,
                    },
                )
            })
            .collect();
        return SamplingResult {
            sampled_data: data.to_vec(),
            population_size,
            sample_size: population_size,
            sampling_fraction: 1.0,
            strata_info,
            was_sampled: false,
        };
    }

    let strata = group_by_year(data);
    let strata_sizes: BTreeMap<i32, usize> =
        strata.iter().map(|(&year, indices)| (year, indices.len())).collect();
    let allocation = allocate_proportional(&strata_sizes, target_size, census_threshold);

    let mut selected_indices: Vec<usize> = Vec::new();
    let mut strata_info: BTreeMap<i32, StratumInfo> = BTreeMap::new();

    for (&year, indices) in &strata {
        let n_h = *allocation.get(&year).unwrap_or(&0);
        let is_census = n_h >= indices.len();
        strata_info.insert(
            year,
            StratumInfo {
                population_count: indices.len(),
                sample_count: n_h,
                is_census,
            },
        );

        if is_census {
            selected_indices.extend_from_slice(indices);
        } else {
            selected_indices.extend(systematic_select(indices, n_h));
        }
    }

    let sampled_data: Vec<(T, i32)> =
        selected_indices.iter().map(|&i| data[i].clone()).collect();
    let sample_size = sampled_data.len();

    SamplingResult {
        sampled_data,
        population_size,
        sample_size,
        sampling_fraction: sample_size as f64 / population_size as f64,
        strata_info,
        was_sampled: true,
    }
}

/// Group item indices by year, ascending years, ascending indices.
fn group_by_year<T>(data: &[(T, i32)]) -> BTreeMap<i32, Vec<usize>> {
    let mut groups: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (idx, (_, year)) in data.iter().enumerate() {
        groups.entry(*year).or_default().push(idx);
    }
    groups
}

/// Proportional allocation with census strata and Hare-quota correction.
fn allocate_proportional(
    strata_sizes: &BTreeMap<i32, usize>,
    target_size: usize,
    census_threshold: usize,
) -> BTreeMap<i32, usize> {
    let mut census_total = 0usize;
    let mut census_years: Vec<i32> = Vec::new();
    for (&year, &size) in strata_sizes {
        if size <= census_threshold {
            census_years.push(year);
            census_total += size;
        }
    }

    let remaining_target = target_size.saturating_sub(census_total);
    let non_census_total: usize = strata_sizes
        .iter()
        .filter(|(year, _)| !census_years.contains(year))
        .map(|(_, &size)| size)
        .sum();

    // Census strata already exhaust the target
    if remaining_target == 0 || non_census_total == 0 {
        return strata_sizes
            .iter()
            .map(|(&year, &size)| {
                if census_years.contains(&year) {
                    (year, size)
                } else {
                    (year, 0)
                }
            })
            .collect();
    }

    let mut allocation: BTreeMap<i32, usize> = BTreeMap::new();
    let mut remainders: Vec<(i32, f64)> = Vec::new();

    for (&year, &size) in strata_sizes {
        if census_years.contains(&year) {
            allocation.insert(year, size);
            continue;
        }
        let exact = remaining_target as f64 * size as f64 / non_census_total as f64;
        let floored = (exact.floor() as usize).min(size);
        allocation.insert(year, floored);
        remainders.push((year, exact - floored as f64));
    }

    // Distribute the rounding deficit by largest remainder, never exceeding a
    // stratum's population. Ties break on the lower year so the allocation is
    // reproducible.
    let current_sum: usize = allocation.values().sum();
    let mut deficit = target_size.saturating_sub(current_sum);
    remainders.sort_by(|a, b| {
        b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0))
    });

    for (year, _) in remainders {
        if deficit == 0 {
            break;
        }
        let size = strata_sizes[&year];
        let slot = allocation.get_mut(&year).expect("allocated above");
        if *slot < size {
            *slot += 1;
            deficit -= 1;
        }
    }

    allocation
}

/// Systematic selection with midpoint start from a sorted index list.
fn systematic_select(indices: &[usize], n: usize) -> Vec<usize> {
    let total = indices.len();
    if n >= total {
        return indices.to_vec();
    }
    if n == 0 {
        return Vec::new();
    }
    let step = total as f64 / n as f64;
    let start = step / 2.0;
    (0..n).map(|i| indices[(start + i as f64 * step) as usize]).collect()
}

/// Confidence estimate for a Jaccard index computed from a sample.
#[derive(Debug, Clone, PartialEq)]
pub struct JaccardConfidence {
    pub jaccard: f64,
    pub standard_error: f64,
    pub margin_of_error_95: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub effective_n: usize,
}

/// 95% confidence interval for a sampled Jaccard index.
///
/// J = |A ∩ B| / |A ∪ B| is treated as a proportion over the union set,
/// with a finite population correction:
///
///   SE(p) = sqrt(p * (1-p) / (n-1)) * sqrt(1 - n/N)
///
/// where n is the union size in the sample and N the union size scaled to
/// the population. With a full census the standard error is zero.
pub fn estimate_jaccard_confidence(
    intersection_count: usize,
    union_count: usize,
    sample_size: usize,
    population_size: usize,
) -> JaccardConfidence {
    if union_count == 0 {
        return JaccardConfidence {
            jaccard: 0.0,
            standard_error: 0.0,
            margin_of_error_95: 0.0,
            ci_lower: 0.0,
            ci_upper: 0.0,
            effective_n: 0,
        };
    }

    let p = intersection_count as f64 / union_count as f64;
    let rounded = |v: f64| (v * 1e6).round() / 1e6;

    if sample_size >= population_size || union_count <= 1 {
        return JaccardConfidence {
            jaccard: rounded(p),
            standard_error: 0.0,
            margin_of_error_95: 0.0,
            ci_lower: rounded(p),
            ci_upper: rounded(p),
            effective_n: union_count,
        };
    }

    let scaling = population_size as f64 / sample_size as f64;
    let estimated_union_pop = union_count as f64 * scaling;
    let fpc = (1.0 - union_count as f64 / estimated_union_pop).max(0.0).sqrt();

    let variance = p * (1.0 - p) / (union_count as f64 - 1.0);
    let se = variance.sqrt() * fpc;
    let moe = 1.96 * se;

    JaccardConfidence {
        jaccard: rounded(p),
        standard_error: rounded(se),
        margin_of_error_95: rounded(moe),
        ci_lower: rounded((p - moe).max(0.0)),
        ci_upper: rounded((p + moe).min(1.0)),
        effective_n: union_count,
    }
}
