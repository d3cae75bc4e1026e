use chrono::NaiveDate;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Instant;

use crate::data::{filter_range, group_by_period};
use crate::error::AttributionError;
use crate::types::*;
use crate::AttributionResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Allowed deviation of per-period weight sums from 1 before a warning
    #[serde(default = "default_weight_tolerance")]
    pub weight_tolerance: Decimal,
}

fn default_weight_tolerance() -> Decimal {
    dec!(0.000001)
}

impl AttributionRequest {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            weight_tolerance: default_weight_tolerance(),
        }
    }
}

/// The three Brinson effects for one sector in one period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Effects {
    pub allocation: Decimal,
    pub selection: Decimal,
    pub interaction: Decimal,
}

impl Effects {
    pub fn total(&self) -> Decimal {
        self.allocation + self.selection + self.interaction
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorPeriodAttribution {
    pub sector: Sector,
    pub date: NaiveDate,
    pub portfolio_weight: Weight,
    pub benchmark_weight: Weight,
    pub portfolio_return: Rate,
    pub benchmark_return: Rate,
    pub allocation_effect: Decimal,
    pub selection_effect: Decimal,
    pub interaction_effect: Decimal,
    pub total_effect: Decimal,
    pub portfolio_contribution: Decimal,
    pub benchmark_contribution: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodAttribution {
    pub date: NaiveDate,
    pub portfolio_return: Rate,
    pub benchmark_return: Rate,
    pub active_return: Rate,
    pub allocation: Decimal,
    pub selection: Decimal,
    pub interaction: Decimal,
    pub portfolio_weight_sum: Weight,
    pub benchmark_weight_sum: Weight,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorAttribution {
    pub sector: Sector,
    pub allocation_effect: Decimal,
    pub selection_effect: Decimal,
    pub interaction_effect: Decimal,
    pub total_effect: Decimal,
    pub average_portfolio_weight: Weight,
    pub average_benchmark_weight: Weight,
    pub average_portfolio_return: Rate,
    pub average_benchmark_return: Rate,
    pub periods: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedPeriod {
    pub date: NaiveDate,
    pub coefficient: Decimal,
    pub allocation: Decimal,
    pub selection: Decimal,
    pub interaction: Decimal,
}

/// Period effects scaled so they add up to the compounded active return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedAttribution {
    pub compounded_portfolio_return: Rate,
    pub compounded_benchmark_return: Rate,
    pub compounded_active_return: Rate,
    pub allocation: Decimal,
    pub selection: Decimal,
    pub interaction: Decimal,
    pub periods: Vec<LinkedPeriod>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionOutput {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub num_periods: u32,
    /// Sum of period portfolio returns over the range
    pub portfolio_return: Rate,
    /// Sum of period benchmark returns over the range
    pub benchmark_return: Rate,
    pub active_return: Rate,
    pub total_allocation: Decimal,
    pub total_selection: Decimal,
    pub total_interaction: Decimal,
    /// Sum of every sector-period effect
    pub total_active_return: Decimal,
    pub sector_attribution: Vec<SectorAttribution>,
    pub period_attribution: Vec<PeriodAttribution>,
    pub details: Vec<SectorPeriodAttribution>,
    pub linked: Option<LinkedAttribution>,
    pub information_ratio: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// Brinson effects of one sector record:
///
/// - allocation  = (w_p - w_b) * r_b
/// - selection   = w_b * (r_p - r_b)
/// - interaction = (w_p - w_b) * (r_p - r_b)
///
/// Fails with `InvalidInput` when an effect overflows the decimal range.
pub fn sector_effects(record: &SectorRecord) -> AttributionResult<Effects> {
    let weight_diff = checked(record.portfolio_weight.checked_sub(record.benchmark_weight), record)?;
    let return_diff = checked(record.portfolio_return.checked_sub(record.benchmark_return), record)?;
    let effects = Effects {
        allocation: checked(weight_diff.checked_mul(record.benchmark_return), record)?,
        selection: checked(record.benchmark_weight.checked_mul(return_diff), record)?,
        interaction: checked(weight_diff.checked_mul(return_diff), record)?,
    };
    checked(
        effects
            .allocation
            .checked_add(effects.selection)
            .and_then(|s| s.checked_add(effects.interaction)),
        record,
    )?;
    Ok(effects)
}

fn checked(value: Option<Decimal>, record: &SectorRecord) -> AttributionResult<Decimal> {
    value.ok_or_else(|| AttributionError::InvalidInput {
        field: "records".into(),
        reason: format!(
            "Weight or return for sector '{}' on {} overflows the decimal range",
            record.sector, record.date
        ),
    })
}

/// Overflow-checked sum.
fn checked_sum(values: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
}

fn attribute_record(record: &SectorRecord) -> AttributionResult<SectorPeriodAttribution> {
    let effects = sector_effects(record)?;
    Ok(SectorPeriodAttribution {
        sector: record.sector,
        date: record.date,
        portfolio_weight: record.portfolio_weight,
        benchmark_weight: record.benchmark_weight,
        portfolio_return: record.portfolio_return,
        benchmark_return: record.benchmark_return,
        allocation_effect: effects.allocation,
        selection_effect: effects.selection,
        interaction_effect: effects.interaction,
        total_effect: effects.total(),
        portfolio_contribution: checked(record.portfolio_weight.checked_mul(record.portfolio_return), record)?,
        benchmark_contribution: checked(record.benchmark_weight.checked_mul(record.benchmark_return), record)?,
    })
}

fn summarise_period(date: NaiveDate, rows: &[SectorPeriodAttribution]) -> AttributionResult<PeriodAttribution> {
    let sum = |f: fn(&SectorPeriodAttribution) -> Decimal| {
        checked_sum(rows.iter().map(f)).ok_or_else(|| AttributionError::InvalidInput {
            field: "records".into(),
            reason: format!("Period {} totals overflow the decimal range", date),
        })
    };
    let portfolio_return = sum(|r| r.portfolio_contribution)?;
    let benchmark_return = sum(|r| r.benchmark_contribution)?;
    let active_return = portfolio_return
        .checked_sub(benchmark_return)
        .ok_or_else(|| AttributionError::InvalidInput {
            field: "records".into(),
            reason: format!("Period {} active return overflows the decimal range", date),
        })?;
    Ok(PeriodAttribution {
        date,
        portfolio_return,
        benchmark_return,
        active_return,
        allocation: sum(|r| r.allocation_effect)?,
        selection: sum(|r| r.selection_effect)?,
        interaction: sum(|r| r.interaction_effect)?,
        portfolio_weight_sum: sum(|r| r.portfolio_weight)?,
        benchmark_weight_sum: sum(|r| r.benchmark_weight)?,
    })
}

fn summarise_sectors(details: &[SectorPeriodAttribution]) -> AttributionResult<Vec<SectorAttribution>> {
    let mut by_sector: BTreeMap<Sector, Vec<&SectorPeriodAttribution>> = BTreeMap::new();
    for d in details {
        by_sector.entry(d.sector).or_default().push(d);
    }
    by_sector
        .into_iter()
        .map(|(sector, rows)| {
            let sum = |f: fn(&SectorPeriodAttribution) -> Decimal| {
                checked_sum(rows.iter().map(|r| f(r))).ok_or_else(|| AttributionError::InvalidInput {
                    field: "records".into(),
                    reason: format!("Totals for sector '{}' overflow the decimal range", sector),
                })
            };
            let n = Decimal::from(rows.len() as u64);
            let allocation_effect = sum(|r| r.allocation_effect)?;
            let selection_effect = sum(|r| r.selection_effect)?;
            let interaction_effect = sum(|r| r.interaction_effect)?;
            Ok(SectorAttribution {
                sector,
                allocation_effect,
                selection_effect,
                interaction_effect,
                total_effect: sum(|r| r.total_effect)?,
                average_portfolio_weight: sum(|r| r.portfolio_weight)? / n,
                average_benchmark_weight: sum(|r| r.benchmark_weight)? / n,
                average_portfolio_return: sum(|r| r.portfolio_return)? / n,
                average_benchmark_return: sum(|r| r.benchmark_return)? / n,
                periods: rows.len() as u32,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Multi-period linking (Carino method)
// ---------------------------------------------------------------------------

/// Carino coefficient (ln(1+r_p) - ln(1+r_b)) / (r_p - r_b), falling back to
/// 1/(1+r) when the two returns coincide.
fn carino_coefficient(rp: Decimal, rb: Decimal) -> Option<Decimal> {
    if rp == rb {
        let base = Decimal::ONE.checked_add(rp)?;
        return if base > Decimal::ZERO {
            Some(Decimal::ONE / base)
        } else {
            None
        };
    }
    let ln_p = Decimal::ONE.checked_add(rp)?.checked_ln()?;
    let ln_b = Decimal::ONE.checked_add(rb)?.checked_ln()?;
    (ln_p - ln_b).checked_div(rp.checked_sub(rb)?)
}

/// `None` when a return is at or below -100% or a compounded product
/// overflows the decimal range.
fn link_periods(periods: &[PeriodAttribution]) -> Option<LinkedAttribution> {
    let compound = |f: fn(&PeriodAttribution) -> Decimal| {
        periods
            .iter()
            .try_fold(Decimal::ONE, |acc, p| {
                acc.checked_mul(Decimal::ONE.checked_add(f(p))?)
            })
            .map(|growth| growth - Decimal::ONE)
    };
    let compounded_portfolio_return = compound(|p| p.portfolio_return)?;
    let compounded_benchmark_return = compound(|p| p.benchmark_return)?;
    let total_k = carino_coefficient(compounded_portfolio_return, compounded_benchmark_return)?;
    if total_k.is_zero() {
        return None;
    }

    let mut linked = Vec::with_capacity(periods.len());
    for p in periods {
        let k = carino_coefficient(p.portfolio_return, p.benchmark_return)?;
        let scale = k.checked_div(total_k)?;
        linked.push(LinkedPeriod {
            date: p.date,
            coefficient: scale,
            allocation: p.allocation.checked_mul(scale)?,
            selection: p.selection.checked_mul(scale)?,
            interaction: p.interaction.checked_mul(scale)?,
        });
    }

    Some(LinkedAttribution {
        compounded_portfolio_return,
        compounded_benchmark_return,
        compounded_active_return: compounded_portfolio_return.checked_sub(compounded_benchmark_return)?,
        allocation: checked_sum(linked.iter().map(|l| l.allocation))?,
        selection: checked_sum(linked.iter().map(|l| l.selection))?,
        interaction: checked_sum(linked.iter().map(|l| l.interaction))?,
        periods: linked,
    })
}

/// mean(active) / std(active), population standard deviation.
fn information_ratio(periods: &[PeriodAttribution]) -> Option<Decimal> {
    if periods.len() < 2 {
        return None;
    }
    let n = Decimal::from(periods.len() as u64);
    let mean = checked_sum(periods.iter().map(|p| p.active_return))? / n;
    let squares = periods
        .iter()
        .map(|p| {
            let diff = p.active_return.checked_sub(mean)?;
            diff.checked_mul(diff)
        })
        .collect::<Option<Vec<Decimal>>>()?;
    let std = (checked_sum(squares)? / n).sqrt()?;
    if std > Decimal::ZERO {
        Some(mean / std)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn check_weights(
    period: &PeriodAttribution,
    tolerance: Decimal,
    warnings: &mut Vec<String>,
) {
    for (which, sum) in [
        ("portfolio", period.portfolio_weight_sum),
        ("benchmark", period.benchmark_weight_sum),
    ] {
        if (sum - Decimal::ONE).abs() > tolerance {
            warnings.push(format!(
                "{} weights for {} sum to {} (tolerance {})",
                which, period.date, sum, tolerance
            ));
        }
    }
}

fn check_records(records: &[&SectorRecord], warnings: &mut Vec<String>) -> AttributionResult<()> {
    let mut seen: HashSet<(Sector, NaiveDate)> = HashSet::with_capacity(records.len());
    for r in records {
        if !seen.insert((r.sector, r.date)) {
            return Err(AttributionError::InvalidInput {
                field: "records".into(),
                reason: format!("Duplicate record for sector '{}' on {}", r.sector, r.date),
            });
        }
        for (which, w) in [
            ("portfolio", r.portfolio_weight),
            ("benchmark", r.benchmark_weight),
        ] {
            if w < Decimal::ZERO {
                warnings.push(format!(
                    "Negative {} weight in sector '{}' on {}: {} (short position)",
                    which, r.sector, r.date, w
                ));
            }
        }
    }

    let sectors: BTreeSet<Sector> = records.iter().map(|r| r.sector).collect();
    for (date, rows) in group_by_period(records.iter().copied()) {
        if rows.len() < sectors.len() {
            let present: BTreeSet<Sector> = rows.iter().map(|r| r.sector).collect();
            let missing: Vec<&str> = sectors.difference(&present).map(|s| s.name()).collect();
            warnings.push(format!("Sectors absent on {}: {}", date, missing.join(", ")));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Perform Brinson-Fachler attribution over every period in
/// `[start_date, end_date]`.
///
/// Effects are computed per sector per period and summed per sector, per
/// period and in total. Ranges spanning several periods are also linked
/// geometrically with the Carino method.
pub fn brinson_attribution(
    records: &[SectorRecord],
    request: &AttributionRequest,
) -> AttributionResult<ComputationOutput<AttributionOutput>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    if request.start_date > request.end_date {
        return Err(AttributionError::InvalidInput {
            field: "start_date".into(),
            reason: format!(
                "start_date {} is after end_date {}",
                request.start_date, request.end_date
            ),
        });
    }

    let in_range = filter_range(records, request.start_date, request.end_date);
    if in_range.is_empty() {
        return Err(AttributionError::InsufficientData(format!(
            "No records between {} and {}",
            request.start_date, request.end_date
        )));
    }
    check_records(&in_range, &mut warnings)?;

    let mut details = Vec::with_capacity(in_range.len());
    let mut period_attribution = Vec::new();
    for (date, rows) in group_by_period(in_range.iter().copied()) {
        let mut rows = rows
            .into_iter()
            .map(attribute_record)
            .collect::<AttributionResult<Vec<SectorPeriodAttribution>>>()?;
        rows.sort_by_key(|r| r.sector);
        let period = summarise_period(date, &rows)?;
        check_weights(&period, request.weight_tolerance, &mut warnings);
        period_attribution.push(period);
        details.extend(rows);
    }

    let overflow = |what: &str| AttributionError::InvalidInput {
        field: "records".into(),
        reason: format!("Total {} overflows the decimal range", what),
    };
    let total_allocation = checked_sum(details.iter().map(|d| d.allocation_effect))
        .ok_or_else(|| overflow("allocation"))?;
    let total_selection = checked_sum(details.iter().map(|d| d.selection_effect))
        .ok_or_else(|| overflow("selection"))?;
    let total_interaction = checked_sum(details.iter().map(|d| d.interaction_effect))
        .ok_or_else(|| overflow("interaction"))?;
    let total_active_return = checked_sum([total_allocation, total_selection, total_interaction])
        .ok_or_else(|| overflow("active return"))?;
    let portfolio_return = checked_sum(period_attribution.iter().map(|p| p.portfolio_return))
        .ok_or_else(|| overflow("portfolio return"))?;
    let benchmark_return = checked_sum(period_attribution.iter().map(|p| p.benchmark_return))
        .ok_or_else(|| overflow("benchmark return"))?;
    let active_return = portfolio_return
        .checked_sub(benchmark_return)
        .ok_or_else(|| overflow("active return"))?;

    let linked = if period_attribution.len() > 1 {
        let linked = link_periods(&period_attribution);
        if linked.is_none() {
            warnings.push(
                "Carino linking skipped: a period return at or below -100% has no logarithm, \
                 or compounding overflows the decimal range"
                    .into(),
            );
        }
        linked
    } else {
        None
    };

    let output = AttributionOutput {
        start_date: request.start_date,
        end_date: request.end_date,
        num_periods: period_attribution.len() as u32,
        portfolio_return,
        benchmark_return,
        active_return,
        total_allocation,
        total_selection,
        total_interaction,
        total_active_return,
        sector_attribution: summarise_sectors(&details)?,
        information_ratio: information_ratio(&period_attribution),
        period_attribution,
        details,
        linked,
    };

    tracing::debug!(
        periods = output.num_periods,
        records = output.details.len(),
        total_active_return = %output.total_active_return,
        "brinson attribution complete"
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Brinson-Fachler sector attribution with Carino multi-period linking",
        &serde_json::json!({
            "model": "Brinson-Fachler",
            "allocation": "(w_p - w_b) * r_b",
            "linking_method": "Carino",
            "aggregation": "arithmetic sum of sector-period effects",
            "weight_tolerance": request.weight_tolerance.to_string(),
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
    use rust_decimal_macros::dec;

    fn date(m: u32) -> NaiveDate {
        crate::data::month_end(NaiveDate::from_ymd_opt(2024, m, 1).unwrap())
    }

    fn make_record(
        sector: Sector,
        m: u32,
        pw: Decimal,
        bw: Decimal,
        pr: Decimal,
        br: Decimal,
    ) -> SectorRecord {
        SectorRecord {
            sector,
            date: date(m),
            portfolio_weight: pw,
            portfolio_return: pr,
            benchmark_weight: bw,
            benchmark_return: br,
        }
    }

    fn three_sector_month(m: u32) -> Vec<SectorRecord> {
        vec![
            make_record(Sector::Mining, m, dec!(0.60), dec!(0.50), dec!(0.10), dec!(0.08)),
            make_record(Sector::Energy, m, dec!(0.30), dec!(0.40), dec!(0.04), dec!(0.05)),
            make_record(Sector::Financials, m, dec!(0.10), dec!(0.10), dec!(0.02), dec!(0.02)),
        ]
    }

    fn full_year() -> AttributionRequest {
        AttributionRequest::new(date(1), date(12))
    }

    // ---- Known single-sector example ----

    #[test]
    fn test_known_single_sector_effects() {
        let r = make_record(Sector::Mining, 1, dec!(0.5), dec!(0.3), dec!(0.10), dec!(0.05));
        let e = sector_effects(&r).unwrap();
        assert_eq!(e.allocation, dec!(0.01));
        assert_eq!(e.selection, dec!(0.015));
        assert_eq!(e.interaction, dec!(0.01));
        assert_eq!(e.total(), dec!(0.035));
    }

    #[test]
    fn test_known_single_sector_through_calculator() {
        let records = vec![make_record(
            Sector::Mining,
            1,
            dec!(0.5),
            dec!(0.3),
            dec!(0.10),
            dec!(0.05),
        )];
        let out = brinson_attribution(&records, &full_year()).unwrap();
        assert_eq!(out.result.total_active_return, dec!(0.035));
        // 0.5*0.10 - 0.3*0.05
        assert_eq!(out.result.active_return, dec!(0.035));
        // weights do not sum to one: reported, not rejected
        assert_eq!(out.warnings.len(), 2);
    }

    // ---- Basic 3-sector attribution ----

    #[test]
    fn test_basic_3_sector_returns() {
        let out = brinson_attribution(&three_sector_month(3), &full_year()).unwrap();
        let p = &out.result.period_attribution[0];
        // R_p = 0.60*0.10 + 0.30*0.04 + 0.10*0.02 = 0.074
        assert_eq!(p.portfolio_return, dec!(0.074));
        // R_b = 0.50*0.08 + 0.40*0.05 + 0.10*0.02 = 0.062
        assert_eq!(p.benchmark_return, dec!(0.062));
        assert_eq!(p.active_return, dec!(0.012));
    }

    #[test]
    fn test_basic_3_sector_sum_identity() {
        let out = brinson_attribution(&three_sector_month(3), &full_year()).unwrap();
        let r = &out.result;
        let sum = r.total_allocation + r.total_selection + r.total_interaction;
        assert_eq!(sum, r.active_return);
        assert_eq!(r.total_active_return, r.active_return);
    }

    #[test]
    fn test_allocation_uses_sector_benchmark_return() {
        let out = brinson_attribution(&three_sector_month(3), &full_year()).unwrap();
        let mining = &out.result.details[0];
        assert_eq!(mining.sector, Sector::Mining);
        // (0.60 - 0.50) * 0.08
        assert_eq!(mining.allocation_effect, dec!(0.008));
        // 0.50 * (0.10 - 0.08)
        assert_eq!(mining.selection_effect, dec!(0.010));
        // 0.10 * 0.02
        assert_eq!(mining.interaction_effect, dec!(0.002));
    }

    #[test]
    fn test_sector_effects_sum_to_totals() {
        let mut records = three_sector_month(1);
        records.extend(three_sector_month(2));
        let out = brinson_attribution(&records, &full_year()).unwrap();
        let r = &out.result;
        let alloc: Decimal = r.sector_attribution.iter().map(|s| s.allocation_effect).sum();
        let sel: Decimal = r.sector_attribution.iter().map(|s| s.selection_effect).sum();
        let inter: Decimal = r.sector_attribution.iter().map(|s| s.interaction_effect).sum();
        assert_eq!(alloc, r.total_allocation);
        assert_eq!(sel, r.total_selection);
        assert_eq!(inter, r.total_interaction);
        for s in &r.sector_attribution {
            assert_eq!(s.periods, 2);
            assert_eq!(
                s.total_effect,
                s.allocation_effect + s.selection_effect + s.interaction_effect
            );
        }
    }

    #[test]
    fn test_period_effects_reconcile_to_active_return() {
        let mut records = three_sector_month(1);
        records.push(make_record(Sector::Ict, 2, dec!(0.7), dec!(0.4), dec!(-0.03), dec!(0.01)));
        records.push(make_record(Sector::Energy, 2, dec!(0.3), dec!(0.6), dec!(0.05), dec!(-0.02)));
        let out = brinson_attribution(&records, &full_year()).unwrap();
        for p in &out.result.period_attribution {
            assert_eq!(p.allocation + p.selection + p.interaction, p.active_return);
        }
    }

    #[test]
    fn test_sectors_ordered_by_enumeration() {
        let mut records = three_sector_month(1);
        records.reverse();
        let out = brinson_attribution(&records, &full_year()).unwrap();
        let order: Vec<Sector> = out.result.sector_attribution.iter().map(|s| s.sector).collect();
        assert_eq!(order, vec![Sector::Mining, Sector::Energy, Sector::Financials]);
    }

    // ---- Zero active return ----

    #[test]
    fn test_identical_portfolios() {
        let records = vec![
            make_record(Sector::Mining, 1, dec!(0.60), dec!(0.60), dec!(0.08), dec!(0.08)),
            make_record(Sector::Energy, 1, dec!(0.40), dec!(0.40), dec!(0.05), dec!(0.05)),
        ];
        let out = brinson_attribution(&records, &full_year()).unwrap();
        assert_eq!(out.result.active_return, Decimal::ZERO);
        for d in &out.result.details {
            assert_eq!(d.allocation_effect, Decimal::ZERO);
            assert_eq!(d.selection_effect, Decimal::ZERO);
            assert_eq!(d.interaction_effect, Decimal::ZERO);
        }
    }

    #[test]
    fn test_only_selection_when_weights_match() {
        let records = vec![
            make_record(Sector::Mining, 1, dec!(0.50), dec!(0.50), dec!(0.12), dec!(0.08)),
            make_record(Sector::Energy, 1, dec!(0.50), dec!(0.50), dec!(0.06), dec!(0.04)),
        ];
        let out = brinson_attribution(&records, &full_year()).unwrap();
        assert_eq!(out.result.total_allocation, Decimal::ZERO);
        assert_eq!(out.result.total_interaction, Decimal::ZERO);
        assert_eq!(out.result.active_return, out.result.total_selection);
    }

    #[test]
    fn test_negative_returns_still_reconcile() {
        let records = vec![
            make_record(Sector::Mining, 1, dec!(0.60), dec!(0.50), dec!(-0.05), dec!(-0.03)),
            make_record(Sector::Energy, 1, dec!(0.40), dec!(0.50), dec!(0.02), dec!(0.04)),
        ];
        let out = brinson_attribution(&records, &full_year()).unwrap();
        let r = &out.result;
        assert_eq!(
            r.total_allocation + r.total_selection + r.total_interaction,
            r.active_return
        );
    }

    // ---- Date range ----

    #[test]
    fn test_date_range_filters_periods() {
        let mut records = Vec::new();
        for m in 1..=12 {
            records.extend(three_sector_month(m));
        }
        let request = AttributionRequest::new(date(6), date(12));
        let out = brinson_attribution(&records, &request).unwrap();
        assert_eq!(out.result.num_periods, 7);
        assert!(out.result.details.iter().all(|d| d.date >= date(6)));
    }

    #[test]
    fn test_range_bounds_inclusive() {
        let records = three_sector_month(4);
        let request = AttributionRequest::new(date(4), date(4));
        assert_eq!(
            brinson_attribution(&records, &request).unwrap().result.num_periods,
            1
        );
    }

    #[test]
    fn test_empty_range_error() {
        let records = three_sector_month(1);
        let request = AttributionRequest::new(date(6), date(12));
        match brinson_attribution(&records, &request) {
            Err(AttributionError::InsufficientData(msg)) => assert!(msg.contains("No records")),
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }

    #[test]
    fn test_reversed_range_error() {
        let request = AttributionRequest::new(date(12), date(1));
        assert!(matches!(
            brinson_attribution(&three_sector_month(1), &request),
            Err(AttributionError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_empty_records_error() {
        assert!(brinson_attribution(&[], &full_year()).is_err());
    }

    // ---- Validation ----

    #[test]
    fn test_duplicate_record_rejected() {
        let mut records = three_sector_month(1);
        records.push(records[0].clone());
        let err = brinson_attribution(&records, &full_year()).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_weight_sum_warning() {
        let records = vec![
            make_record(Sector::Mining, 1, dec!(0.30), dec!(0.50), dec!(0.10), dec!(0.08)),
            make_record(Sector::Energy, 1, dec!(0.30), dec!(0.50), dec!(0.05), dec!(0.04)),
        ];
        let out = brinson_attribution(&records, &full_year()).unwrap();
        assert!(out.warnings.iter().any(|w| w.starts_with("portfolio weights")));
        assert!(!out.warnings.iter().any(|w| w.starts_with("benchmark weights")));
    }

    #[test]
    fn test_custom_tolerance_silences_warning() {
        let records = vec![
            make_record(Sector::Mining, 1, dec!(0.51), dec!(0.50), dec!(0.10), dec!(0.08)),
            make_record(Sector::Energy, 1, dec!(0.50), dec!(0.50), dec!(0.05), dec!(0.04)),
        ];
        let request = AttributionRequest {
            weight_tolerance: dec!(0.02),
            ..full_year()
        };
        let out = brinson_attribution(&records, &request).unwrap();
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_negative_weight_warns() {
        let records = vec![
            make_record(Sector::Mining, 1, dec!(1.20), dec!(1.0), dec!(0.10), dec!(0.08)),
            make_record(Sector::Energy, 1, dec!(-0.20), dec!(0.0), dec!(0.05), dec!(0.02)),
        ];
        let out = brinson_attribution(&records, &full_year()).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("short position")));
    }

    #[test]
    fn test_missing_sector_warns() {
        let mut records = three_sector_month(1);
        records.extend(three_sector_month(2).into_iter().take(2));
        let out = brinson_attribution(&records, &full_year()).unwrap();
        assert!(out
            .warnings
            .iter()
            .any(|w| w.contains("Sectors absent") && w.contains("Financials")));
    }

    #[test]
    fn test_no_warnings_for_clean_input() {
        let out = brinson_attribution(&three_sector_month(1), &full_year()).unwrap();
        assert!(out.warnings.is_empty());
    }

    // ---- Multi-period linking ----

    #[test]
    fn test_single_period_not_linked() {
        let out = brinson_attribution(&three_sector_month(1), &full_year()).unwrap();
        assert!(out.result.linked.is_none());
        assert!(out.result.information_ratio.is_none());
    }

    #[test]
    fn test_linked_effects_sum_to_compounded_active_return() {
        let mut records = Vec::new();
        for (m, shift) in [(1, dec!(0.00)), (2, dec!(0.01)), (3, dec!(-0.02))] {
            records.push(make_record(Sector::Mining, m, dec!(0.60), dec!(0.50), dec!(0.05) + shift, dec!(0.04)));
            records.push(make_record(Sector::Energy, m, dec!(0.40), dec!(0.50), dec!(0.02), dec!(0.03) - shift));
        }
        let out = brinson_attribution(&records, &full_year()).unwrap();
        let linked = out.result.linked.unwrap();
        assert_eq!(linked.periods.len(), 3);
        let sum = linked.allocation + linked.selection + linked.interaction;
        let diff = (sum - linked.compounded_active_return).abs();
        assert!(diff < dec!(0.0000000001), "linking residual {diff}");
    }

    #[test]
    fn test_carino_coefficient_equal_returns() {
        assert_eq!(carino_coefficient(dec!(0.25), dec!(0.25)), Some(dec!(0.8)));
        assert_eq!(carino_coefficient(dec!(-1), dec!(-1)), None);
    }

    #[test]
    fn test_information_ratio_positive_when_outperforming() {
        let mut records = Vec::new();
        for (m, pr) in [(1, dec!(0.05)), (2, dec!(0.06)), (3, dec!(0.09))] {
            records.push(make_record(Sector::Mining, m, dec!(0.5), dec!(0.5), pr, dec!(0.04)));
            records.push(make_record(Sector::Energy, m, dec!(0.5), dec!(0.5), dec!(0.03), dec!(0.03)));
        }
        let out = brinson_attribution(&records, &full_year()).unwrap();
        assert!(out.result.information_ratio.unwrap() > Decimal::ZERO);
    }

    #[test]
    fn test_information_ratio_none_for_constant_active_return() {
        let mut records = three_sector_month(1);
        records.extend(three_sector_month(2));
        let out = brinson_attribution(&records, &full_year()).unwrap();
        assert!(out.result.information_ratio.is_none());
    }

    // ---- Overflow ----

    #[test]
    fn test_overflowing_effects_rejected() {
        let huge = Decimal::from(1_000_000_000_000_000_i64);
        let r = make_record(Sector::Mining, 1, huge, Decimal::ZERO, huge, Decimal::ZERO);
        assert!(matches!(sector_effects(&r), Err(AttributionError::InvalidInput { .. })));
        match brinson_attribution(&[r], &full_year()) {
            Err(AttributionError::InvalidInput { reason, .. }) => {
                assert!(reason.contains("overflows"), "{reason}")
            }
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_linking_skipped_when_compounding_overflows() {
        let mut records = Vec::new();
        for year in 2020..2025 {
            for m in 1..=12 {
                let mut r = make_record(Sector::Mining, m, Decimal::ONE, Decimal::ONE, dec!(3.0), dec!(0.01));
                r.date = crate::data::month_end(NaiveDate::from_ymd_opt(year, m, 1).unwrap());
                records.push(r);
            }
        }
        let request = AttributionRequest::new(
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        );
        let out = brinson_attribution(&records, &request).unwrap();
        assert_eq!(out.result.num_periods, 60);
        assert!(out.result.linked.is_none());
        assert!(out.warnings.iter().any(|w| w.contains("overflows")));
        // arithmetic totals are still reported
        assert_eq!(out.result.portfolio_return, dec!(180.0));
    }

    // ---- Determinism ----

    #[test]
    fn test_idempotent() {
        let mut records = three_sector_month(1);
        records.extend(three_sector_month(2));
        let a = brinson_attribution(&records, &full_year()).unwrap();
        let b = brinson_attribution(&records, &full_year()).unwrap();
        assert_eq!(a.result, b.result);
        assert_eq!(a.warnings, b.warnings);
    }

    #[test]
    fn test_methodology_and_assumptions() {
        let out = brinson_attribution(&three_sector_month(1), &full_year()).unwrap();
        assert!(out.methodology.contains("Brinson-Fachler"));
        assert_eq!(out.assumptions["linking_method"], "Carino");
    }
}
