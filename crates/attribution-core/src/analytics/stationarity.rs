use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;
use std::f64::consts::SQRT_2;
use std::time::Instant;

use super::returns::{mean, portfolio_series, sqrt_decimal};
use crate::error::AttributionError;
use crate::types::*;
use crate::AttributionResult;

pub const MIN_OBSERVATIONS: usize = 10;

/// MacKinnon asymptotic critical values, regression with constant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalValues {
    pub one_percent: Decimal,
    pub five_percent: Decimal,
    pub ten_percent: Decimal,
}

pub const CRITICAL_VALUES: CriticalValues = CriticalValues {
    one_percent: dec!(-3.43),
    five_percent: dec!(-2.86),
    ten_percent: dec!(-2.57),
};

/// Significance level for the unit root decision.
pub const SIGNIFICANCE: f64 = 0.05;

// MacKinnon (1994) response surface, constant-only regression, one series.
const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const TAU_SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationarityOutput {
    pub observations: u32,
    /// Slope on the lagged level
    pub gamma: Decimal,
    pub intercept: Decimal,
    pub standard_error: Decimal,
    /// gamma / standard_error
    pub statistic: Decimal,
    pub critical_values: CriticalValues,
    /// MacKinnon approximate p-value of the statistic
    pub p_value: Decimal,
    /// Unit root rejected at the 5% level
    pub is_stationary: bool,
}

fn standard_normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Approximate p-value of a Dickey-Fuller statistic: the normal CDF of a
/// polynomial in the statistic, clamped to 0 and 1 outside the fitted range.
pub fn mackinnon_p_value(statistic: f64) -> f64 {
    if statistic > TAU_MAX {
        return 1.0;
    }
    if statistic < TAU_MIN {
        return 0.0;
    }
    let coefficients: &[f64] = if statistic <= TAU_STAR {
        &TAU_SMALL_P
    } else {
        &TAU_LARGE_P
    };
    let z = coefficients
        .iter()
        .rev()
        .fold(0.0, |acc, c| acc * statistic + c);
    standard_normal_cdf(z)
}

/// Dickey-Fuller test of `series` via the OLS regression
/// dy_t = alpha + gamma * y_{t-1} + e_t.
pub fn dickey_fuller(series: &[Decimal]) -> AttributionResult<StationarityOutput> {
    if series.len() < MIN_OBSERVATIONS {
        return Err(AttributionError::InsufficientData(format!(
            "Dickey-Fuller test needs at least {} observations, got {}",
            MIN_OBSERVATIONS,
            series.len()
        )));
    }

    let lagged: Vec<Decimal> = series[..series.len() - 1].to_vec();
    let diffs: Vec<Decimal> = series.windows(2).map(|w| w[1] - w[0]).collect();
    let n = diffs.len();

    let x_mean = mean(&lagged);
    let y_mean = mean(&diffs);
    let sxx: Decimal = lagged.iter().map(|x| (x - x_mean) * (x - x_mean)).sum();
    if sxx.is_zero() {
        return Err(AttributionError::InsufficientData(
            "Series is constant; Dickey-Fuller regression is undefined".into(),
        ));
    }
    let sxy: Decimal = lagged
        .iter()
        .zip(&diffs)
        .map(|(x, y)| (x - x_mean) * (y - y_mean))
        .sum();

    let gamma = sxy / sxx;
    let intercept = y_mean - gamma * x_mean;
    let ssr: Decimal = lagged
        .iter()
        .zip(&diffs)
        .map(|(x, y)| {
            let e = y - intercept - gamma * x;
            e * e
        })
        .sum();
    let standard_error = sqrt_decimal(ssr / Decimal::from((n - 2) as u64) / sxx);
    if standard_error.is_zero() {
        return Err(AttributionError::InvalidInput {
            field: "series".into(),
            reason: "Regression fits exactly; test statistic is undefined".into(),
        });
    }
    let statistic = gamma / standard_error;
    let p = mackinnon_p_value(statistic.to_f64().unwrap_or(0.0));
    let p_value = Decimal::from_f64(p).unwrap_or(Decimal::ONE).round_dp(6);

    Ok(StationarityOutput {
        observations: series.len() as u32,
        gamma,
        intercept,
        standard_error,
        statistic,
        critical_values: CRITICAL_VALUES,
        p_value,
        is_stationary: p < SIGNIFICANCE,
    })
}

/// Dickey-Fuller test on the weighted portfolio return series.
pub fn analyze_stationarity(records: &[SectorRecord]) -> AttributionResult<ComputationOutput<StationarityOutput>> {
    let start = Instant::now();
    let series = portfolio_series(records)?;
    let output = dickey_fuller(&series)?;
    tracing::debug!(
        statistic = %output.statistic,
        p_value = %output.p_value,
        stationary = output.is_stationary,
        "stationarity test complete"
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Dickey-Fuller unit root test (constant, no lags) on portfolio returns",
        &serde_json::json!({
            "regression": "dy_t = alpha + gamma * y_{t-1}",
            "lags": 0,
            "decision_level": "5%",
            "p_value": "MacKinnon (1994) approximation",
        }),
        Vec::new(),
        elapsed,
        output,
    ))
}
