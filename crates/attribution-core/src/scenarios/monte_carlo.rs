use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use std::time::Instant;

use crate::analytics::returns::{mean, portfolio_series, sample_std};
use crate::error::AttributionError;
use crate::types::*;
use crate::AttributionResult;

const HISTOGRAM_BINS: usize = 20;
const MIN_SIMULATIONS: u32 = 100;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloInput {
    /// Number of simulated years (minimum 100).
    #[serde(default = "default_num_simulations")]
    pub num_simulations: u32,
    /// Optional seed for reproducibility.
    pub seed: Option<u64>,
    /// Months compounded into each simulated return.
    #[serde(default = "default_horizon_months")]
    pub horizon_months: u32,
    /// Return every simulated annual return, in draw order.
    #[serde(default)]
    pub include_paths: bool,
}

fn default_num_simulations() -> u32 {
    1_000
}

fn default_horizon_months() -> u32 {
    12
}

impl Default for MonteCarloInput {
    fn default() -> Self {
        Self {
            num_simulations: default_num_simulations(),
            seed: None,
            horizon_months: default_horizon_months(),
            include_paths: false,
        }
    }
}

/// A single histogram bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u32,
    pub frequency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloOutput {
    pub num_simulations: u32,
    /// Mean of the historical monthly portfolio returns
    pub monthly_mean: f64,
    /// Sample standard deviation of the historical monthly returns
    pub monthly_std: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub percentile_5: f64,
    pub percentile_95: f64,
    /// 95% value at risk, the loss at the 5th percentile
    pub var_95: f64,
    pub histogram: Vec<HistogramBin>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub simulated_returns: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Statistics helpers
// ---------------------------------------------------------------------------

/// Percentile of a **sorted** slice with linear interpolation.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// Equal-width histogram of a **sorted**, non-empty slice.
fn build_histogram(sorted: &[f64], num_bins: usize) -> Vec<HistogramBin> {
    let min_val = sorted[0];
    let max_val = sorted[sorted.len() - 1];

    if (max_val - min_val).abs() < f64::EPSILON {
        return vec![HistogramBin {
            lower: min_val,
            upper: max_val,
            count: sorted.len() as u32,
            frequency: 1.0,
        }];
    }

    let bin_width = (max_val - min_val) / num_bins as f64;
    let n = sorted.len() as f64;

    let mut bins: Vec<HistogramBin> = (0..num_bins)
        .map(|i| HistogramBin {
            lower: min_val + i as f64 * bin_width,
            upper: if i == num_bins - 1 {
                max_val
            } else {
                min_val + (i + 1) as f64 * bin_width
            },
            count: 0,
            frequency: 0.0,
        })
        .collect();

    for &val in sorted {
        let idx = (((val - min_val) / bin_width).floor() as usize).min(num_bins - 1);
        bins[idx].count += 1;
    }
    for bin in &mut bins {
        bin.frequency = bin.count as f64 / n;
    }
    bins
}

fn median_sorted(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Simulate annual portfolio returns by compounding normally distributed
/// monthly returns fitted to the historical weighted series.
pub fn run_monte_carlo(
    records: &[SectorRecord],
    input: &MonteCarloInput,
) -> AttributionResult<ComputationOutput<MonteCarloOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.num_simulations < MIN_SIMULATIONS {
        return Err(AttributionError::InvalidInput {
            field: "num_simulations".into(),
            reason: format!("Must be at least {MIN_SIMULATIONS}"),
        });
    }
    if input.horizon_months == 0 {
        return Err(AttributionError::InvalidInput {
            field: "horizon_months".into(),
            reason: "Must be at least 1".into(),
        });
    }

    let history = portfolio_series(records)?;
    if history.len() < 2 {
        return Err(AttributionError::InsufficientData(
            "At least 2 periods are needed to fit the return distribution".into(),
        ));
    }
    let monthly_mean = mean(&history).to_f64().unwrap_or(0.0);
    let monthly_std = sample_std(&history).to_f64().unwrap_or(0.0);
    // zero variance: every path compounds the historical mean
    let dist = if monthly_std == 0.0 {
        warnings.push(
            "Historical portfolio returns are constant; every simulated path compounds the mean"
                .into(),
        );
        None
    } else {
        Some(Normal::new(monthly_mean, monthly_std).map_err(|e| {
            AttributionError::InsufficientData(format!(
                "Cannot fit a normal distribution to the portfolio returns: {e}"
            ))
        })?)
    };

    let mut rng = match input.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let n = input.num_simulations as usize;
    let mut simulated = Vec::with_capacity(n);
    for _ in 0..n {
        let mut growth = 1.0_f64;
        for _ in 0..input.horizon_months {
            let monthly: f64 = match &dist {
                Some(d) => rng.sample(d),
                None => monthly_mean,
            };
            growth *= 1.0 + monthly;
        }
        simulated.push(growth - 1.0);
    }

    let mut sorted = simulated.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let count = sorted.len() as f64;
    let sim_mean = sorted.iter().sum::<f64>() / count;
    let std_dev = (sorted.iter().map(|v| (v - sim_mean).powi(2)).sum::<f64>() / count).sqrt();
    let percentile_5 = percentile_sorted(&sorted, 5.0);

    let output = MonteCarloOutput {
        num_simulations: input.num_simulations,
        monthly_mean,
        monthly_std,
        mean: sim_mean,
        median: median_sorted(&sorted),
        std_dev,
        percentile_5,
        percentile_95: percentile_sorted(&sorted, 95.0),
        var_95: -percentile_5,
        histogram: build_histogram(&sorted, HISTOGRAM_BINS),
        simulated_returns: if input.include_paths { simulated } else { Vec::new() },
    };
    tracing::info!(
        simulations = input.num_simulations,
        mean = output.mean,
        var_95 = output.var_95,
        "monte carlo simulation complete"
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata_f64(
        "Monte Carlo simulation of compounded annual portfolio returns",
        &serde_json::json!({
            "num_simulations": input.num_simulations,
            "seed": input.seed,
            "horizon_months": input.horizon_months,
            "monthly_distribution": "normal(mean, sample std) of weighted portfolio returns",
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn history() -> Vec<SectorRecord> {
        let returns = [
            dec!(0.02), dec!(-0.01), dec!(0.015), dec!(0.03), dec!(-0.02), dec!(0.01),
            dec!(0.005), dec!(0.025), dec!(-0.005), dec!(0.012), dec!(0.018), dec!(-0.008),
        ];
        crate::data::month_ends(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
        .into_iter()
        .zip(returns)
        .map(|(date, r)| SectorRecord {
            sector: Sector::Mining,
            date,
            portfolio_weight: Decimal::ONE,
            portfolio_return: r,
            benchmark_weight: Decimal::ONE,
            benchmark_return: dec!(0.01),
        })
        .collect()
    }

    fn seeded(n: u32) -> MonteCarloInput {
        MonteCarloInput {
            num_simulations: n,
            seed: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn test_reproducible_with_seed() {
        let a = run_monte_carlo(&history(), &seeded(500)).unwrap();
        let b = run_monte_carlo(&history(), &seeded(500)).unwrap();
        assert_eq!(a.result, b.result);
    }

    #[test]
    fn test_statistics_ordering() {
        let out = run_monte_carlo(&history(), &seeded(1_000)).unwrap().result;
        assert!(out.percentile_5 < out.median);
        assert!(out.median < out.percentile_95);
        assert_eq!(out.var_95, -out.percentile_5);
        assert!(out.std_dev > 0.0);
    }

    #[test]
    fn test_mean_near_compounded_monthly_mean() {
        let out = run_monte_carlo(&history(), &seeded(5_000)).unwrap().result;
        let expected = (1.0 + out.monthly_mean).powi(12) - 1.0;
        assert!((out.mean - expected).abs() < 0.01, "mean {} vs {}", out.mean, expected);
    }

    #[test]
    fn test_histogram_counts_all_paths() {
        let out = run_monte_carlo(&history(), &seeded(1_000)).unwrap().result;
        assert_eq!(out.histogram.len(), HISTOGRAM_BINS);
        let total: u32 = out.histogram.iter().map(|b| b.count).sum();
        assert_eq!(total, 1_000);
        let freq: f64 = out.histogram.iter().map(|b| b.frequency).sum();
        assert!((freq - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_paths_only_when_requested() {
        let out = run_monte_carlo(&history(), &seeded(200)).unwrap().result;
        assert!(out.simulated_returns.is_empty());
        let input = MonteCarloInput {
            include_paths: true,
            ..seeded(200)
        };
        let out = run_monte_carlo(&history(), &input).unwrap().result;
        assert_eq!(out.simulated_returns.len(), 200);
    }

    #[test]
    fn test_minimum_simulations() {
        assert!(matches!(
            run_monte_carlo(&history(), &seeded(99)),
            Err(AttributionError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_constant_history_gives_degenerate_distribution() {
        let mut records = history();
        for r in &mut records {
            r.portfolio_return = dec!(0.01);
        }
        let out = run_monte_carlo(&records, &seeded(100)).unwrap();
        let expected = 1.01_f64.powi(12) - 1.0;
        let r = &out.result;
        assert_eq!(r.monthly_std, 0.0);
        assert!((r.mean - expected).abs() < 1e-12);
        assert!((r.percentile_5 - r.percentile_95).abs() < 1e-12);
        assert!(r.std_dev < 1e-12);
        assert_eq!(r.histogram.len(), 1);
        assert_eq!(r.histogram[0].count, 100);
        assert!(out.warnings.iter().any(|w| w.contains("constant")));
    }

    #[test]
    fn test_percentile_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile_sorted(&sorted, 50.0), 3.0);
        assert!((percentile_sorted(&sorted, 5.0) - 1.2).abs() < 1e-12);
        assert_eq!(median_sorted(&[1.0, 2.0, 3.0, 4.0]), 2.5);
    }
}
