use chrono::NaiveDate;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::data::group_by_period;
use crate::error::AttributionError;
use crate::types::*;
use crate::AttributionResult;

pub const PERIODS_PER_YEAR: Decimal = dec!(12);

/// Weighted portfolio and benchmark return of one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodReturn {
    pub date: NaiveDate,
    pub portfolio_return: Rate,
    pub benchmark_return: Rate,
    pub active_return: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStatistics {
    pub observations: u32,
    pub mean_return: Rate,
    /// (1 + mean)^12 - 1
    pub annualised_return: Rate,
    /// Sample standard deviation of the periodic returns
    pub volatility: Rate,
    /// volatility * sqrt(12)
    pub annualised_volatility: Rate,
    /// (mean - rf/12) / volatility, zero when volatility is zero
    pub sharpe_ratio: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorRisk {
    pub sector: Sector,
    pub annualised_return: Rate,
    pub annualised_volatility: Rate,
    pub sharpe_ratio: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskOutput {
    pub portfolio: ReturnStatistics,
    pub benchmark: ReturnStatistics,
    /// Annualised standard deviation of active returns
    pub tracking_error: Rate,
    pub sectors: Vec<SectorRisk>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Arithmetic mean; sums saturate at the decimal range.
pub fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    let total = values.iter().fold(Decimal::ZERO, |acc, v| acc.saturating_add(*v));
    total / Decimal::from(values.len() as u64)
}

/// Sample variance (n-1 denominator), saturating at the decimal range
pub fn sample_variance(values: &[Decimal]) -> Decimal {
    let n = values.len();
    if n < 2 {
        return Decimal::ZERO;
    }
    let m = mean(values);
    let sum_sq = values.iter().fold(Decimal::ZERO, |acc, x| {
        let diff = x.saturating_sub(m);
        acc.saturating_add(diff.saturating_mul(diff))
    });
    sum_sq / Decimal::from((n - 1) as u64)
}

pub fn sqrt_decimal(val: Decimal) -> Decimal {
    if val <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    val.sqrt().unwrap_or(Decimal::ZERO)
}

pub fn sample_std(values: &[Decimal]) -> Decimal {
    sqrt_decimal(sample_variance(values))
}

fn weighted_sum(rows: &[&SectorRecord], f: fn(&SectorRecord) -> (Weight, Rate)) -> Option<Rate> {
    rows.iter().try_fold(Decimal::ZERO, |acc, r| {
        let (w, ret) = f(r);
        acc.checked_add(w.checked_mul(ret)?)
    })
}

/// Weighted returns of every period, in date order.
pub fn period_returns(records: &[SectorRecord]) -> AttributionResult<Vec<PeriodReturn>> {
    group_by_period(records)
        .into_iter()
        .map(|(date, rows)| {
            let overflow = || AttributionError::InvalidInput {
                field: "records".into(),
                reason: format!("Weighted return on {} overflows the decimal range", date),
            };
            let portfolio_return = weighted_sum(&rows, |r| (r.portfolio_weight, r.portfolio_return))
                .ok_or_else(overflow)?;
            let benchmark_return = weighted_sum(&rows, |r| (r.benchmark_weight, r.benchmark_return))
                .ok_or_else(overflow)?;
            Ok(PeriodReturn {
                date,
                portfolio_return,
                benchmark_return,
                active_return: portfolio_return.checked_sub(benchmark_return).ok_or_else(overflow)?,
            })
        })
        .collect()
}

/// Portfolio column of [`period_returns`].
pub fn portfolio_series(records: &[SectorRecord]) -> AttributionResult<Vec<Rate>> {
    Ok(period_returns(records)?
        .into_iter()
        .map(|p| p.portfolio_return)
        .collect())
}

/// Monthly return series of one sector, in date order.
pub fn sector_returns(records: &[SectorRecord]) -> BTreeMap<Sector, Vec<Rate>> {
    let mut by_sector: BTreeMap<Sector, Vec<(NaiveDate, Rate)>> = BTreeMap::new();
    for r in records {
        by_sector
            .entry(r.sector)
            .or_default()
            .push((r.date, r.portfolio_return));
    }
    by_sector
        .into_iter()
        .map(|(sector, mut series)| {
            series.sort_by_key(|(d, _)| *d);
            (sector, series.into_iter().map(|(_, r)| r).collect())
        })
        .collect()
}

/// (1 + mean)^12 - 1, `None` when the compounded value overflows.
pub fn annualise(mean_return: Rate) -> Option<Rate> {
    Decimal::ONE
        .checked_add(mean_return)?
        .checked_powi(12)?
        .checked_sub(Decimal::ONE)
}

/// Summary statistics of a monthly return series.
pub fn return_statistics(returns: &[Rate], risk_free_rate: Rate) -> AttributionResult<ReturnStatistics> {
    if returns.len() < 2 {
        return Err(AttributionError::InsufficientData(
            "At least 2 return observations required".into(),
        ));
    }
    let mean_return = mean(returns);
    let volatility = sample_std(returns);
    let sharpe_ratio = if volatility.is_zero() {
        Decimal::ZERO
    } else {
        mean_return
            .checked_sub(risk_free_rate / PERIODS_PER_YEAR)
            .and_then(|excess| excess.checked_div(volatility))
            .ok_or_else(|| AttributionError::InvalidInput {
                field: "returns".into(),
                reason: "Sharpe ratio overflows the decimal range".into(),
            })?
    };
    Ok(ReturnStatistics {
        observations: returns.len() as u32,
        mean_return,
        annualised_return: annualise(mean_return).ok_or_else(|| AttributionError::InvalidInput {
            field: "returns".into(),
            reason: format!("Annualising mean return {} overflows the decimal range", mean_return),
        })?,
        volatility,
        annualised_volatility: volatility * sqrt_decimal(PERIODS_PER_YEAR),
        sharpe_ratio,
    })
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Portfolio, benchmark and per-sector risk-adjusted returns.
pub fn analyze_risk(
    records: &[SectorRecord],
    risk_free_rate: Rate,
) -> AttributionResult<ComputationOutput<RiskOutput>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    let periods = period_returns(records)?;
    let portfolio: Vec<Rate> = periods.iter().map(|p| p.portfolio_return).collect();
    let benchmark: Vec<Rate> = periods.iter().map(|p| p.benchmark_return).collect();
    let active: Vec<Rate> = periods.iter().map(|p| p.active_return).collect();

    let portfolio_stats = return_statistics(&portfolio, risk_free_rate)?;
    let benchmark_stats = return_statistics(&benchmark, risk_free_rate)?;

    let mut sectors = Vec::new();
    for (sector, series) in sector_returns(records) {
        match return_statistics(&series, risk_free_rate) {
            Ok(stats) => sectors.push(SectorRisk {
                sector,
                annualised_return: stats.annualised_return,
                annualised_volatility: stats.annualised_volatility,
                sharpe_ratio: stats.sharpe_ratio,
            }),
            Err(_) => warnings.push(format!(
                "Sector '{}' has fewer than 2 observations; skipped",
                sector
            )),
        }
    }
    if portfolio_stats.volatility.is_zero() {
        warnings.push("Portfolio returns are constant; Sharpe ratio set to zero".into());
    }

    let output = RiskOutput {
        portfolio: portfolio_stats,
        benchmark: benchmark_stats,
        tracking_error: sample_std(&active) * sqrt_decimal(PERIODS_PER_YEAR),
        sectors,
    };
    tracing::debug!(
        periods = periods.len(),
        sharpe = %output.portfolio.sharpe_ratio,
        "risk metrics computed"
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Risk-adjusted returns (annualised return, volatility, Sharpe) of the weighted monthly series",
        &serde_json::json!({
            "periods_per_year": 12,
            "risk_free_rate": risk_free_rate.to_string(),
            "annualisation": "(1 + mean)^12 - 1",
            "volatility": "sample std * sqrt(12)",
        }),
        warnings,
        elapsed,
        output,
    ))
}
