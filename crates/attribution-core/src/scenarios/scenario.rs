use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use crate::analytics::returns::{mean, portfolio_series, sector_returns, PERIODS_PER_YEAR};
use crate::attribution::{brinson_attribution, AttributionRequest};
use crate::data::filter_range;
use crate::error::AttributionError;
use crate::types::*;
use crate::AttributionResult;

/// Share of an average commodity price move passed through to Mining returns
pub const COMMODITY_PASS_THROUGH: Decimal = dec!(0.5);

/// Allowed deviation of reallocation weights from 1
pub const REALLOCATION_TOLERANCE: Decimal = dec!(0.001);

pub const DEFAULT_MARKET_DECLINE: Decimal = dec!(-0.30);

fn default_market_decline() -> Decimal {
    DEFAULT_MARKET_DECLINE
}

/// A what-if transformation of the portfolio records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Scenario {
    /// Commodity name -> fractional price change (e.g. Gold: -0.20)
    CommodityShock { changes: BTreeMap<String, Decimal> },
    /// Target portfolio weight per sector, applied to every period
    SectorReallocation { weights: BTreeMap<Sector, Weight> },
    /// Annual market move, spread evenly over the months and scaled by
    /// each sector's beta
    MarketDownturn {
        #[serde(default = "default_market_decline")]
        decline: Rate,
    },
}

impl Scenario {
    pub fn name(&self) -> &'static str {
        match self {
            Scenario::CommodityShock { .. } => "Commodity Price Shock",
            Scenario::SectorReallocation { .. } => "Sector Reallocation",
            Scenario::MarketDownturn { .. } => "Market Downturn",
        }
    }

    /// Apply the scenario to a copy of `records`.
    pub fn apply(&self, records: &[SectorRecord], warnings: &mut Vec<String>) -> AttributionResult<Vec<SectorRecord>> {
        let mut shocked = records.to_vec();
        match self {
            Scenario::CommodityShock { changes } => {
                if changes.is_empty() {
                    return Err(AttributionError::InvalidInput {
                        field: "changes".into(),
                        reason: "At least one commodity change is required".into(),
                    });
                }
                let avg: Decimal = changes.values().sum::<Decimal>() / Decimal::from(changes.len() as u64);
                let factor = Decimal::ONE + avg * COMMODITY_PASS_THROUGH;
                for r in shocked.iter_mut().filter(|r| r.sector == Sector::Mining) {
                    r.portfolio_return = r
                        .portfolio_return
                        .checked_mul(factor)
                        .ok_or_else(|| shock_overflow(r))?;
                }
                if !records.iter().any(|r| r.sector == Sector::Mining) {
                    warnings.push("No Mining records; commodity shock has no effect".into());
                }
            }
            Scenario::SectorReallocation { weights } => {
                validate_reallocation(weights)?;
                let present: BTreeSet<Sector> = records.iter().map(|r| r.sector).collect();
                for sector in weights.keys().filter(|s| !present.contains(*s)) {
                    warnings.push(format!(
                        "Sector '{}' has no records; its target weight is not invested",
                        sector
                    ));
                }
                for sector in present.iter().filter(|s| !weights.contains_key(*s)) {
                    warnings.push(format!(
                        "Sector '{}' not in reallocation; weight set to zero",
                        sector
                    ));
                }
                for r in shocked.iter_mut() {
                    r.portfolio_weight = weights.get(&r.sector).copied().unwrap_or(Decimal::ZERO);
                }
            }
            Scenario::MarketDownturn { decline } => {
                let monthly = *decline / PERIODS_PER_YEAR;
                for r in shocked.iter_mut() {
                    r.portfolio_return = r
                        .portfolio_return
                        .checked_add(monthly * sector_beta(r.sector))
                        .ok_or_else(|| shock_overflow(r))?;
                }
            }
        }
        Ok(shocked)
    }
}

fn shock_overflow(record: &SectorRecord) -> AttributionError {
    AttributionError::InvalidInput {
        field: "records".into(),
        reason: format!(
            "Shocked return for sector '{}' on {} overflows the decimal range",
            record.sector, record.date
        ),
    }
}

/// Sensitivity of each sector to a broad market move.
pub fn sector_beta(sector: Sector) -> Decimal {
    match sector {
        Sector::Mining => dec!(1.3),
        Sector::Financials => dec!(1.2),
        Sector::RealEstate => dec!(0.9),
        Sector::Energy => dec!(1.1),
        Sector::Ict => dec!(1.15),
        Sector::Transport => dec!(1.0),
        Sector::Agriculture => dec!(0.8),
        Sector::Manufacturing => dec!(1.05),
    }
}

fn validate_reallocation(weights: &BTreeMap<Sector, Weight>) -> AttributionResult<()> {
    if weights.is_empty() {
        return Err(AttributionError::InvalidInput {
            field: "weights".into(),
            reason: "At least one sector weight is required".into(),
        });
    }
    if let Some((sector, w)) = weights.iter().find(|(_, w)| **w < Decimal::ZERO) {
        return Err(AttributionError::InvalidInput {
            field: format!("weights:{sector}"),
            reason: format!("Weight must be non-negative (got {w})"),
        });
    }
    let total: Decimal = weights.values().sum();
    if (total - Decimal::ONE).abs() > REALLOCATION_TOLERANCE {
        return Err(AttributionError::InvalidInput {
            field: "weights".into(),
            reason: format!("Weights must sum to 1.0 (got {total})"),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorImpact {
    pub sector: Sector,
    /// Mean monthly portfolio return x 12
    pub original_return: Rate,
    pub scenario_return: Rate,
    pub impact: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutput {
    pub scenario: String,
    /// Mean weighted monthly portfolio return x 12
    pub original_return: Rate,
    pub scenario_return: Rate,
    pub impact: Rate,
    pub original_active_return: Decimal,
    pub scenario_active_return: Decimal,
    pub active_impact: Decimal,
    pub sector_impacts: Vec<SectorImpact>,
}

fn annualised_mean_return(records: &[SectorRecord]) -> AttributionResult<Rate> {
    Ok(mean(&portfolio_series(records)?).saturating_mul(PERIODS_PER_YEAR))
}

fn sector_annualised_returns(records: &[SectorRecord]) -> BTreeMap<Sector, Rate> {
    sector_returns(records)
        .into_iter()
        .map(|(s, returns)| (s, mean(&returns).saturating_mul(PERIODS_PER_YEAR)))
        .collect()
}

/// Apply `scenario` to the records in the request range and compare
/// returns and attribution against the unshocked data.
pub fn run_scenario(
    records: &[SectorRecord],
    scenario: &Scenario,
    request: &AttributionRequest,
) -> AttributionResult<ComputationOutput<ScenarioOutput>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    let base: Vec<SectorRecord> = filter_range(records, request.start_date, request.end_date)
        .into_iter()
        .cloned()
        .collect();
    let shocked = scenario.apply(&base, &mut warnings)?;

    let original = brinson_attribution(&base, request)?;
    let stressed = brinson_attribution(&shocked, request)?;
    // only warnings the scenario introduces
    warnings.extend(
        stressed
            .warnings
            .into_iter()
            .filter(|w| !original.warnings.contains(w)),
    );

    let original_return = annualised_mean_return(&base)?;
    let scenario_return = annualised_mean_return(&shocked)?;
    let before = sector_annualised_returns(&base);
    let after = sector_annualised_returns(&shocked);
    let sector_impacts = before
        .iter()
        .map(|(sector, orig)| {
            let new = after.get(sector).copied().unwrap_or(*orig);
            SectorImpact {
                sector: *sector,
                original_return: *orig,
                scenario_return: new,
                impact: new.saturating_sub(*orig),
            }
        })
        .collect();

    let original_active_return = original.result.total_active_return;
    let scenario_active_return = stressed.result.total_active_return;
    let output = ScenarioOutput {
        scenario: scenario.name().to_string(),
        original_return,
        scenario_return,
        impact: scenario_return.saturating_sub(original_return),
        original_active_return,
        scenario_active_return,
        active_impact: scenario_active_return.saturating_sub(original_active_return),
        sector_impacts,
    };
    tracing::info!(
        scenario = scenario.name(),
        impact = %output.impact,
        "scenario evaluated"
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        &format!("Scenario analysis: {}", scenario.name()),
        &serde_json::json!({
            "scenario": scenario,
            "return_measure": "mean weighted monthly portfolio return x 12",
            "commodity_pass_through": COMMODITY_PASS_THROUGH.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}
