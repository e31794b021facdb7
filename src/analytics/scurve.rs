//! S-curve fitting with logistic and Gompertz growth models.
//!
//! Two models are fitted against the cumulative patent series by bounded
//! least squares and the one with the higher R² wins:
//! - Logistic: f(x) = L / (1 + exp(-k*(x - x0))) — symmetric
//! - Gompertz: f(x) = L * exp(-b * exp(-k*(x - x0))) — asymmetric
//!
//! Phase classification after Gao et al. (2013), model selection after
//! Franses (1994). The solver is a seedless Levenberg-Marquardt with
//! parameter projection onto the bounds, so identical inputs always produce
//! identical fits.

use nalgebra::{DMatrix, DVector};

use crate::analytics::metrics::round_to;
use crate::models::FittedPoint;

const MAX_ITERATIONS: usize = 300;

/// Logistic function: f(x) = L / (1 + exp(-k * (x - x0))).
pub fn logistic(x: f64, l: f64, k: f64, x0: f64) -> f64 {
    l / (1.0 + (-k * (x - x0)).exp())
}

/// Gompertz function: f(x) = L * exp(-b * exp(-k * (x - x0))).
///
/// Asymmetric S-curve; growth slows down earlier than with the logistic.
pub fn gompertz(x: f64, l: f64, b: f64, k: f64, x0: f64) -> f64 {
    l * (-b * (-k * (x - x0)).exp()).exp()
}

/// Result of a converged S-curve fit.
#[derive(Debug, Clone)]
pub struct ScurveFit {
    /// Saturation level L.
    pub saturation: f64,
    /// Growth rate k.
    pub growth_rate: f64,
    /// Inflection year x0.
    pub inflection: f64,
    pub r_squared: f64,
    /// Current cumulative value relative to the saturation, capped at 100.
    pub maturity_percent: f64,
    pub model: &'static str,
    pub fitted: Vec<FittedPoint>,
}

/// Initial parameter estimates (saturation, growth rate, inflection year).
pub fn estimate_initial_params(years: &[f64], cumulative: &[f64]) -> (f64, f64, f64) {
    let y_max = *cumulative.last().unwrap_or(&0.0);
    let sat = if y_max > 0.0 { y_max * 1.5 } else { 1.0 };

    let argmin_distance = |target: f64| -> usize {
        let mut best = 0;
        let mut best_d = f64::INFINITY;
        for (i, &c) in cumulative.iter().enumerate() {
            let d = (c - target).abs();
            if d < best_d {
                best_d = d;
                best = i;
            }
        }
        best
    };

    // Inflection guess: year where cumulative is closest to half saturation
    let x0 = years[argmin_distance(sat / 2.0)];

    // Growth rate guess from the 10%-90% transition width
    let idx_10 = argmin_distance(sat * 0.1);
    let idx_90 = argmin_distance(sat * 0.9);
    let width = years[idx_90] - years[idx_10];
    let k0 = if width > 0.0 { 4.0 / width } else { 0.5 };

    (sat, k0, x0)
}

/// Bounded Levenberg-Marquardt least squares.
///
/// Finite-difference Jacobian, Marquardt diagonal scaling, and projection of
/// every trial step onto `[lower, upper]`. Returns the parameter vector or
/// None when no finite solution is reachable.
fn fit_bounded<F>(
    x: &[f64],
    y: &[f64],
    p0: Vec<f64>,
    lower: &[f64],
    upper: &[f64],
    model: &F,
) -> Option<Vec<f64>>
where
    F: Fn(f64, &[f64]) -> f64,
{
    let n = x.len();
    let n_params = p0.len();

    let clamp = |p: &mut [f64]| {
        for j in 0..n_params {
            p[j] = p[j].clamp(lower[j], upper[j]);
        }
    };

    let sse = |p: &[f64]| -> f64 {
        x.iter()
            .zip(y.iter())
            .map(|(&xi, &yi)| {
                let r = yi - model(xi, p);
                r * r
            })
            .sum()
    };

    let mut params = p0;
    clamp(&mut params);
    let mut current_sse = sse(&params);
    if !current_sse.is_finite() {
        return None;
    }

    let mut lambda = 1e-3;

    for _ in 0..MAX_ITERATIONS {
        // Residuals and forward-difference Jacobian
        let mut residuals = DVector::<f64>::zeros(n);
        let mut jacobian = DMatrix::<f64>::zeros(n, n_params);
        for i in 0..n {
            let fi = model(x[i], &params);
            residuals[i] = y[i] - fi;
            for j in 0..n_params {
                let h = 1e-7 * params[j].abs().max(1.0);
                let mut shifted = params.clone();
                shifted[j] += h;
                jacobian[(i, j)] = (model(x[i], &shifted) - fi) / h;
            }
        }

        let jt = jacobian.transpose();
        let mut normal = &jt * &jacobian;
        let gradient = &jt * &residuals;

        // Marquardt scaling needs strictly positive diagonal entries
        for j in 0..n_params {
            if normal[(j, j)] <= 0.0 {
                normal[(j, j)] = 1e-12;
            }
        }

        let mut improved = false;
        while lambda < 1e12 {
            let mut damped = normal.clone();
            for j in 0..n_params {
                damped[(j, j)] = normal[(j, j)] * (1.0 + lambda);
            }

            let Some(step) = damped.lu().solve(&gradient) else {
                lambda *= 5.0;
                continue;
            };

            let mut candidate = params.clone();
            for j in 0..n_params {
                candidate[j] += step[j];
            }
            clamp(&mut candidate);

            let candidate_sse = sse(&candidate);
            if candidate_sse.is_finite() && candidate_sse < current_sse {
                let step_norm = step.amax();
                let relative_gain = (current_sse - candidate_sse) / (current_sse + 1e-12);
                params = candidate;
                current_sse = candidate_sse;
                lambda = (lambda / 3.0).max(1e-12);
                improved = true;
                if relative_gain < 1e-10 || step_norm < 1e-10 {
                    return Some(params);
                }
                break;
            }
            lambda *= 5.0;
        }

        if !improved {
            break;
        }
    }

    current_sse.is_finite().then_some(params)
}

fn r_squared_of(y: &[f64], fitted: &[f64]) -> f64 {
    let mean = y.iter().sum::<f64>() / y.len() as f64;
    let ss_res: f64 = y.iter().zip(fitted).map(|(&yi, &fi)| (yi - fi).powi(2)).sum();
    let ss_tot: f64 = y.iter().map(|&yi| (yi - mean).powi(2)).sum();
    if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        0.0
    }
}

fn assemble_fit(
    years: &[i32],
    y: &[f64],
    l: f64,
    k: f64,
    x0: f64,
    fitted: Vec<f64>,
    model: &'static str,
) -> ScurveFit {
    let r_squared = r_squared_of(y, &fitted);
    let y_last = *y.last().unwrap_or(&0.0);
    let maturity = if l > 0.0 { (y_last / l * 100.0).min(100.0) } else { 0.0 };
    ScurveFit {
        saturation: round_to(l, 2),
        growth_rate: round_to(k, 6),
        inflection: round_to(x0, 2),
        r_squared: round_to(r_squared, 4),
        maturity_percent: round_to(maturity, 2),
        model,
        fitted: years
            .iter()
            .zip(fitted)
            .map(|(&year, value)| FittedPoint { year, fitted: round_to(value, 1) })
            .collect(),
    }
}

/// Fit the logistic model against a cumulative series.
///
/// Requires at least 3 points and a positive final value; returns None when
/// the data is insufficient or the solver cannot converge.
pub fn fit_logistic(years: &[i32], cumulative: &[i64]) -> Option<ScurveFit> {
    if years.len() < 3 || cumulative.len() < 3 {
        return None;
    }
    let x: Vec<f64> = years.iter().map(|&y| y as f64).collect();
    let y: Vec<f64> = cumulative.iter().map(|&c| c as f64).collect();
    let y_last = *y.last()?;
    if y_last <= 0.0 {
        return None;
    }

    let (sat0, k0, x0_init) = estimate_initial_params(&x, &y);
    let lower = [y_last * 0.5, 0.001, x[0] - 10.0];
    let upper = [y_last * 10.0, 5.0, x[x.len() - 1] + 10.0];

    let model = |xi: f64, p: &[f64]| logistic(xi, p[0], p[1], p[2]);
    let params = fit_bounded(&x, &y, vec![sat0, k0, x0_init], &lower, &upper, &model)?;
    let (l, k, x0) = (params[0], params[1], params[2]);
    let fitted: Vec<f64> = x.iter().map(|&xi| logistic(xi, l, k, x0)).collect();

    Some(assemble_fit(years, &y, l, k, x0, fitted, "Logistic"))
}

/// Fit the Gompertz model against a cumulative series.
pub fn fit_gompertz(years: &[i32], cumulative: &[i64]) -> Option<ScurveFit> {
    if years.len() < 3 || cumulative.len() < 3 {
        return None;
    }
    let x: Vec<f64> = years.iter().map(|&y| y as f64).collect();
    let y: Vec<f64> = cumulative.iter().map(|&c| c as f64).collect();
    let y_last = *y.last()?;
    if y_last <= 0.0 {
        return None;
    }

    let sat0 = y_last * 1.5;
    // Shift parameter so the curve starts near 5% of saturation
    let b0 = 5.0;
    let argmin_distance = |target: f64| -> usize {
        let mut best = 0;
        let mut best_d = f64::INFINITY;
        for (i, &c) in y.iter().enumerate() {
            let d = (c - target).abs();
            if d < best_d {
                best_d = d;
                best = i;
            }
        }
        best
    };
    let width = x[argmin_distance(sat0 * 0.9)] - x[argmin_distance(sat0 * 0.1)];
    let k0 = if width > 0.0 { 4.0 / width } else { 0.3 };

    let lower = [y_last * 0.5, 0.1, 0.001, x[0] - 10.0];
    let upper = [y_last * 10.0, 50.0, 5.0, x[x.len() - 1] + 10.0];

    let model = |xi: f64, p: &[f64]| gompertz(xi, p[0], p[1], p[2], p[3]);
    let params = fit_bounded(&x, &y, vec![sat0, b0, k0, x[0]], &lower, &upper, &model)?;
    let (l, b, k, x0) = (params[0], params[1], params[2], params[3]);
    let fitted: Vec<f64> = x.iter().map(|&xi| gompertz(xi, l, b, k, x0)).collect();

    Some(assemble_fit(years, &y, l, k, x0, fitted, "Gompertz"))
}

/// Fit both models and select the one with the higher R².
///
/// If one model fails to converge the other is returned; None when both
/// fail or the series is unusable.
pub fn fit_best_model(years: &[i32], cumulative: &[i64]) -> Option<ScurveFit> {
    let logistic_fit = fit_logistic(years, cumulative);
    let gompertz_fit = fit_gompertz(years, cumulative);

    match (logistic_fit, gompertz_fit) {
        (None, None) => None,
        (Some(l), None) => Some(l),
        (None, Some(g)) => Some(g),
        (Some(l), Some(g)) => {
            if g.r_squared > l.r_squared {
                Some(g)
            } else {
                Some(l)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_logistic(l: f64, k: f64, x0: f64, years: std::ops::RangeInclusive<i32>) -> (Vec<i32>, Vec<i64>) {
        let ys: Vec<i32> = years.collect();
        let cumulative =
            ys.iter().map(|&y| logistic(y as f64, l, k, x0).round() as i64).collect();
        (ys, cumulative)
    }

    #[test]
    fn logistic_shape() {
        let xs = [0.0, 5.0, 10.0, 15.0, 20.0];
        let values: Vec<f64> = xs.iter().map(|&x| logistic(x, 100.0, 0.5, 10.0)).collect();
        for pair in values.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        // Inflection point sits at L/2
        assert!((logistic(10.0, 100.0, 1.0, 10.0) - 50.0).abs() < 0.01);
        // Symmetry around the inflection
        let left = logistic(5.0, 100.0, 0.5, 10.0);
        let right = logistic(15.0, 100.0, 0.5, 10.0);
        assert!((left + right - 100.0).abs() < 0.01);
    }

    #[test]
    fn gompertz_is_monotone_and_bounded() {
        let values: Vec<f64> =
            (0..30).map(|x| gompertz(x as f64, 100.0, 5.0, 0.4, 0.0)).collect();
        for pair in values.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert!(values.iter().all(|&v| v <= 100.0));
    }

    #[test]
    fn initial_params_above_max() {
        let years = [2010.0, 2011.0, 2012.0];
        let cumulative = [10.0, 50.0, 100.0];
        let (l0, k0, x0) = estimate_initial_params(&years, &cumulative);
        assert!(l0 > 100.0);
        assert!(k0 > 0.0);
        assert!((2010.0..=2012.0).contains(&x0));
    }

    #[test]
    fn fit_recovers_synthetic_logistic() {
        let (years, cumulative) = synthetic_logistic(1000.0, 0.5, 2010.0, 2000..=2020);
        let fit = fit_best_model(&years, &cumulative).expect("fit should converge");

        assert!(fit.r_squared >= 0.99, "r_squared = {}", fit.r_squared);
        let y_last = *cumulative.last().unwrap() as f64;
        let expected_maturity = y_last / 1000.0 * 100.0;
        assert!(
            (fit.maturity_percent - expected_maturity).abs() < 1.0,
            "maturity {} vs expected {}",
            fit.maturity_percent,
            expected_maturity
        );
        // Fitted curve is monotone and bounded by the saturation
        for pair in fit.fitted.windows(2) {
            assert!(pair[0].fitted <= pair[1].fitted + 1e-9);
        }
        assert!(fit.fitted.iter().all(|p| p.fitted <= fit.saturation + 0.1));
    }

    #[test]
    fn fit_requires_three_points() {
        assert!(fit_best_model(&[2020, 2021], &[1, 2]).is_none());
    }

    #[test]
    fn fit_refuses_all_zero_series() {
        assert!(fit_best_model(&[2019, 2020, 2021], &[0, 0, 0]).is_none());
    }

    #[test]
    fn fit_is_deterministic() {
        let (years, cumulative) = synthetic_logistic(500.0, 0.4, 2015.0, 2005..=2024);
        let a = fit_best_model(&years, &cumulative).unwrap();
        let b = fit_best_model(&years, &cumulative).unwrap();
        assert_eq!(a.saturation, b.saturation);
        assert_eq!(a.growth_rate, b.growth_rate);
        assert_eq!(a.inflection, b.inflection);
        assert_eq!(a.r_squared, b.r_squared);
    }
}
