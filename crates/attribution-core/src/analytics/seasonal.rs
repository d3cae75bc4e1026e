use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::returns::{mean, period_returns, sample_variance};
use crate::error::AttributionError;
use crate::types::*;
use crate::AttributionResult;

/// Monthly data, yearly cycle.
pub const SEASONAL_PERIOD: usize = 12;

/// Additive split of a series into trend, seasonal and residual parts.
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    /// Centred moving average; `None` for the first and last half period
    pub trend: Vec<Option<Decimal>>,
    pub seasonal: Vec<Decimal>,
    pub residual: Vec<Option<Decimal>>,
    /// One factor per position in the cycle, summing to zero
    pub factors: Vec<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompositionPoint {
    pub date: NaiveDate,
    pub observed: Rate,
    pub trend: Option<Rate>,
    pub seasonal: Rate,
    pub residual: Option<Rate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompositionOutput {
    pub period: usize,
    /// Seasonal factor by position in the cycle, starting at the first period
    pub seasonal_factors: Vec<Rate>,
    /// 1 - var(residual) / var(seasonal + residual), floored at zero
    pub seasonal_strength: Decimal,
    pub points: Vec<DecompositionPoint>,
}

/// Centred moving average over one full cycle. Even periods use the 2 x p
/// filter, halving the weight of the two end points.
fn centred_moving_average(values: &[Decimal], period: usize) -> Vec<Option<Decimal>> {
    let half = period / 2;
    let divisor = Decimal::from(period as u64);
    let two = Decimal::TWO;
    (0..values.len())
        .map(|i| {
            if i < half || i + half >= values.len() {
                return None;
            }
            let total = if period % 2 == 0 {
                let ends = (values[i - half] / two).saturating_add(values[i + half] / two);
                values[i + 1 - half..i + half]
                    .iter()
                    .fold(ends, |acc, v| acc.saturating_add(*v))
            } else {
                values[i - half..=i + half]
                    .iter()
                    .fold(Decimal::ZERO, |acc, v| acc.saturating_add(*v))
            };
            Some(total / divisor)
        })
        .collect()
}

/// Classical additive decomposition. Needs at least two full cycles.
pub fn seasonal_decompose(values: &[Decimal], period: usize) -> AttributionResult<Decomposition> {
    if period < 2 {
        return Err(AttributionError::InvalidInput {
            field: "period".into(),
            reason: format!("Seasonal period must be at least 2, got {period}"),
        });
    }
    if values.len() < 2 * period {
        return Err(AttributionError::InsufficientData(format!(
            "Seasonal decomposition with period {} needs at least {} observations, got {}",
            period,
            2 * period,
            values.len()
        )));
    }

    let trend = centred_moving_average(values, period);

    let mut by_position: Vec<Vec<Decimal>> = vec![Vec::new(); period];
    for (i, (v, t)) in values.iter().zip(&trend).enumerate() {
        if let Some(t) = t {
            by_position[i % period].push(v.saturating_sub(*t));
        }
    }
    let averages: Vec<Decimal> = by_position.iter().map(|d| mean(d)).collect();
    let centre = mean(&averages);
    let factors: Vec<Decimal> = averages.iter().map(|a| a.saturating_sub(centre)).collect();

    let seasonal: Vec<Decimal> = (0..values.len()).map(|i| factors[i % period]).collect();
    let residual = values
        .iter()
        .zip(&trend)
        .zip(&seasonal)
        .map(|((v, t), s)| t.map(|t| v.saturating_sub(t).saturating_sub(*s)))
        .collect();

    Ok(Decomposition {
        trend,
        seasonal,
        residual,
        factors,
    })
}

fn seasonal_strength(decomposition: &Decomposition) -> Decimal {
    let (residual, detrended): (Vec<Decimal>, Vec<Decimal>) = decomposition
        .residual
        .iter()
        .zip(&decomposition.seasonal)
        .filter_map(|(r, s)| r.map(|r| (r, r.saturating_add(*s))))
        .unzip();
    let total = sample_variance(&detrended);
    if total.is_zero() {
        return Decimal::ZERO;
    }
    (Decimal::ONE - sample_variance(&residual) / total).max(Decimal::ZERO)
}

/// Decompose the weighted portfolio return series.
pub fn decompose_returns(
    records: &[SectorRecord],
    period: usize,
) -> AttributionResult<ComputationOutput<DecompositionOutput>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    let series = period_returns(records)?;
    let values: Vec<Rate> = series.iter().map(|p| p.portfolio_return).collect();
    let decomposition = seasonal_decompose(&values, period)?;
    let strength = seasonal_strength(&decomposition);
    if values.len() < 3 * period {
        warnings.push(format!(
            "Only {} full cycles; seasonal factors rest on very few observations per position",
            values.len() / period
        ));
    }

    let points = series
        .iter()
        .enumerate()
        .map(|(i, p)| DecompositionPoint {
            date: p.date,
            observed: p.portfolio_return,
            trend: decomposition.trend[i],
            seasonal: decomposition.seasonal[i],
            residual: decomposition.residual[i],
        })
        .collect();

    tracing::debug!(
        observations = values.len(),
        period,
        seasonal_strength = %strength,
        "seasonal decomposition complete"
    );

    let output = DecompositionOutput {
        period,
        seasonal_factors: decomposition.factors,
        seasonal_strength: strength,
        points,
    };
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Classical additive seasonal decomposition (centred moving average trend)",
        &serde_json::json!({
            "model": "observed = trend + seasonal + residual",
            "period": period,
            "trend": "centred moving average over one cycle",
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const PATTERN: [Decimal; 4] = [dec!(0.03), dec!(-0.01), dec!(-0.04), dec!(0.02)];

    fn trended(n: usize) -> Vec<Decimal> {
        (0..n)
            .map(|i| Decimal::new(i as i64, 2) + PATTERN[i % 4])
            .collect()
    }

    #[test]
    fn test_linear_trend_and_pattern_separated() {
        let d = seasonal_decompose(&trended(12), 4).unwrap();
        assert_eq!(d.factors, PATTERN.to_vec());
        assert_eq!(d.trend[..2], [None, None]);
        assert_eq!(d.trend[10..], [None, None]);
        for i in 2..10 {
            assert_eq!(d.trend[i], Some(Decimal::new(i as i64, 2)), "trend at {i}");
            assert_eq!(d.residual[i], Some(Decimal::ZERO), "residual at {i}");
        }
        assert_eq!(d.seasonal[5], dec!(-0.01));
    }

    #[test]
    fn test_odd_period_uses_plain_average() {
        let values: Vec<Decimal> = (0..6).map(|i| [dec!(1), dec!(2), dec!(6)][i % 3]).collect();
        let d = seasonal_decompose(&values, 3).unwrap();
        assert_eq!(d.trend[0], None);
        assert_eq!(d.trend[1], Some(dec!(3)));
        assert_eq!(d.trend[5], None);
        assert_eq!(d.factors, vec![dec!(-2), dec!(-1), dec!(3)]);
    }

    #[test]
    fn test_needs_two_cycles() {
        assert!(matches!(
            seasonal_decompose(&trended(7), 4),
            Err(AttributionError::InsufficientData(_))
        ));
        assert!(matches!(
            seasonal_decompose(&trended(8), 1),
            Err(AttributionError::InvalidInput { .. })
        ));
    }

    fn monthly_records(months: usize) -> Vec<SectorRecord> {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2030, 12, 31).unwrap();
        crate::data::month_ends(start, end)
            .into_iter()
            .take(months)
            .enumerate()
            .map(|(i, date)| SectorRecord {
                sector: Sector::Agriculture,
                date,
                portfolio_weight: Decimal::ONE,
                // December rally over a flat base
                portfolio_return: if i % 12 == 11 { dec!(0.06) } else { dec!(0.01) },
                benchmark_weight: Decimal::ONE,
                benchmark_return: dec!(0.01),
            })
            .collect()
    }

    #[test]
    fn test_decompose_returns_finds_year_end_effect() {
        let out = decompose_returns(&monthly_records(36), SEASONAL_PERIOD).unwrap();
        let result = &out.result;
        assert_eq!(result.points.len(), 36);
        assert_eq!(result.seasonal_factors.len(), 12);
        let december = result.seasonal_factors[11];
        assert!(result.seasonal_factors[..11].iter().all(|f| *f < december));
        assert!(december > dec!(0.04));
        assert!(result.seasonal_strength > dec!(0.99));
        assert!(result.points[0].trend.is_none());
        assert!(result.points[6].trend.is_some());
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_short_history_rejected() {
        assert!(matches!(
            decompose_returns(&monthly_records(23), SEASONAL_PERIOD),
            Err(AttributionError::InsufficientData(_))
        ));
        let out = decompose_returns(&monthly_records(24), SEASONAL_PERIOD).unwrap();
        assert_eq!(out.warnings.len(), 1);
    }
}
