use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::returns::{mean, period_returns, sample_std, sqrt_decimal, PERIODS_PER_YEAR};
use crate::error::AttributionError;
use crate::types::*;
use crate::AttributionResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingPoint {
    /// Last period of the window
    pub date: NaiveDate,
    pub mean_return: Rate,
    pub volatility: Rate,
    /// mean / volatility * sqrt(12); absent for a flat window
    pub sharpe_ratio: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingOutput {
    pub window: usize,
    pub points: Vec<RollingPoint>,
}

/// Rolling mean, volatility and Sharpe ratio of the portfolio return series.
/// The first `window - 1` periods have no full window and are omitted.
pub fn rolling_performance(
    records: &[SectorRecord],
    window: usize,
) -> AttributionResult<ComputationOutput<RollingOutput>> {
    let start = Instant::now();

    if window < 2 {
        return Err(AttributionError::InvalidInput {
            field: "window".into(),
            reason: "Rolling window must be at least 2 periods".into(),
        });
    }
    let periods = period_returns(records)?;
    if periods.len() < window {
        return Err(AttributionError::InsufficientData(format!(
            "{} periods available, rolling window needs {}",
            periods.len(),
            window
        )));
    }

    let series: Vec<Rate> = periods.iter().map(|p| p.portfolio_return).collect();
    let annualiser = sqrt_decimal(PERIODS_PER_YEAR);
    let points: Vec<RollingPoint> = series
        .windows(window)
        .zip(periods.iter().skip(window - 1))
        .map(|(slice, period)| {
            let mean_return = mean(slice);
            let volatility = sample_std(slice);
            RollingPoint {
                date: period.date,
                mean_return,
                volatility,
                sharpe_ratio: mean_return
                    .checked_div(volatility)
                    .and_then(|s| s.checked_mul(annualiser)),
            }
        })
        .collect();

    tracing::debug!(window, points = points.len(), "rolling performance computed");

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Rolling-window mean, sample volatility and annualised Sharpe of portfolio returns",
        &serde_json::json!({ "window": window }),
        Vec::new(),
        elapsed,
        RollingOutput { window, points },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn single_sector(returns: &[Decimal]) -> Vec<SectorRecord> {
        crate::data::month_ends(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
        )
        .into_iter()
        .zip(returns)
        .map(|(date, r)| SectorRecord {
            sector: Sector::Energy,
            date,
            portfolio_weight: Decimal::ONE,
            portfolio_return: *r,
            benchmark_weight: Decimal::ONE,
            benchmark_return: Decimal::ZERO,
        })
        .collect()
    }

    #[test]
    fn test_points_count_and_dates() {
        let returns: Vec<Decimal> = (0..24).map(|i| Decimal::from(i % 5) / dec!(100)).collect();
        let out = rolling_performance(&single_sector(&returns), 12).unwrap();
        assert_eq!(out.result.points.len(), 13);
        assert_eq!(
            out.result.points[0].date,
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
        );
    }

    #[test]
    fn test_window_mean() {
        let returns = [dec!(0.01), dec!(0.03), dec!(0.05), dec!(0.07)];
        let out = rolling_performance(&single_sector(&returns), 2).unwrap();
        let means: Vec<Decimal> = out.result.points.iter().map(|p| p.mean_return).collect();
        assert_eq!(means, vec![dec!(0.02), dec!(0.04), dec!(0.06)]);
    }

    #[test]
    fn test_flat_window_has_no_sharpe() {
        let out = rolling_performance(&single_sector(&[dec!(0.01); 4]), 3).unwrap();
        assert!(out.result.points.iter().all(|p| p.sharpe_ratio.is_none()));
    }

    #[test]
    fn test_window_longer_than_series() {
        assert!(matches!(
            rolling_performance(&single_sector(&[dec!(0.01); 5]), 12),
            Err(AttributionError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_window_too_small() {
        assert!(rolling_performance(&single_sector(&[dec!(0.01); 5]), 1).is_err());
    }
}
