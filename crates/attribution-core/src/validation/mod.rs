use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::time::Instant;

use crate::analytics::returns::{annualise, mean, portfolio_series, return_statistics, sector_returns};
use crate::attribution::{brinson_attribution, AttributionRequest};
use crate::data::date_bounds;
use crate::error::AttributionError;
use crate::types::*;
use crate::AttributionResult;

/// Reconciliation and weight-sum tolerance
pub const CONSISTENCY_TOLERANCE: Decimal = dec!(0.000001);

const MIN_PERIOD_GAP_DAYS: i64 = 28;
const MAX_PERIOD_GAP_DAYS: i64 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed,
    Warning,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckStatus::Passed => "PASSED",
            CheckStatus::Failed => "FAILED",
            CheckStatus::Warning => "WARNING",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationCheck {
    pub name: String,
    pub status: CheckStatus,
    pub issues: Vec<String>,
}

impl ValidationCheck {
    fn from_issues(name: &str, issues: Vec<String>) -> Self {
        let status = if issues.is_empty() {
            CheckStatus::Passed
        } else {
            CheckStatus::Failed
        };
        Self {
            name: name.to_string(),
            status,
            issues,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub checks: Vec<ValidationCheck>,
    /// Checks that passed or only warned
    pub passed: u32,
    pub total: u32,
    pub all_passed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationInput {
    /// Attribution range; defaults to the first and last period in the data
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub risk_free_rate: Rate,
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn check_data_quality(records: &[SectorRecord]) -> ValidationCheck {
    let mut issues = Vec::new();

    let negative = records
        .iter()
        .filter(|r| r.portfolio_weight < Decimal::ZERO || r.benchmark_weight < Decimal::ZERO)
        .count();
    if negative > 0 {
        issues.push(format!("Negative weights found: {negative} records"));
    }

    let extreme = records
        .iter()
        .filter(|r| {
            [r.portfolio_return, r.benchmark_return]
                .iter()
                .any(|x| *x > Decimal::ONE || *x < -Decimal::ONE)
        })
        .count();
    if extreme > 0 {
        issues.push(format!("Extreme returns found: {extreme} records"));
    }

    let mut seen = HashSet::with_capacity(records.len());
    let duplicates = records
        .iter()
        .filter(|r| !seen.insert((r.sector, r.date)))
        .count();
    if duplicates > 0 {
        issues.push(format!("Duplicate sector-period records: {duplicates}"));
    }

    let dates: Vec<NaiveDate> = records
        .iter()
        .map(|r| r.date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let gaps: Vec<String> = dates
        .windows(2)
        .filter(|w| {
            let days = (w[1] - w[0]).num_days();
            !(MIN_PERIOD_GAP_DAYS..=MAX_PERIOD_GAP_DAYS).contains(&days)
        })
        .map(|w| format!("{} -> {}", w[0], w[1]))
        .collect();
    if !gaps.is_empty() {
        issues.push(format!("Date continuity issues detected: {}", gaps.join(", ")));
    }

    ValidationCheck::from_issues("Data Quality", issues)
}

fn check_attribution_consistency(records: &[SectorRecord], request: &AttributionRequest) -> ValidationCheck {
    let name = "Attribution Consistency";
    let out = match brinson_attribution(records, request) {
        Ok(out) => out.result,
        Err(e) => return ValidationCheck::from_issues(name, vec![format!("Attribution failed: {e}")]),
    };

    let mut issues = Vec::new();
    let components = out.total_allocation + out.total_selection + out.total_interaction;
    let diff = (components - out.active_return).abs();
    if diff > CONSISTENCY_TOLERANCE {
        issues.push(format!(
            "Attribution components don't sum to active return (diff: {diff})"
        ));
    }
    for p in &out.period_attribution {
        for (which, sum) in [
            ("Portfolio", p.portfolio_weight_sum),
            ("Benchmark", p.benchmark_weight_sum),
        ] {
            if (sum - Decimal::ONE).abs() > CONSISTENCY_TOLERANCE {
                issues.push(format!("{which} weights on {} sum to {sum}", p.date));
            }
        }
    }
    ValidationCheck::from_issues(name, issues)
}

fn check_return_calculations(records: &[SectorRecord]) -> ValidationCheck {
    let mut issues = Vec::new();
    match portfolio_series(records) {
        Ok(series) => match annualise(mean(&series)) {
            Some(annual) if annual < -Decimal::ONE || annual > dec!(5) => issues.push(format!(
                "Unrealistic annualised return: {}%",
                (annual * dec!(100)).round_dp(2)
            )),
            Some(_) => {}
            None => issues.push("Annualised return overflows the decimal range".into()),
        },
        Err(e) => issues.push(e.to_string()),
    }
    ValidationCheck::from_issues("Return Calculations", issues)
}

fn check_risk_metrics(records: &[SectorRecord], risk_free_rate: Rate) -> ValidationCheck {
    let mut issues = Vec::new();
    if let Err(e) = portfolio_series(records).and_then(|s| return_statistics(&s, risk_free_rate)) {
        issues.push(format!("Portfolio Sharpe ratio not computable: {e}"));
    }
    for (sector, returns) in sector_returns(records) {
        if let Err(e) = return_statistics(&returns, risk_free_rate) {
            issues.push(format!("Sharpe ratio for {sector} not computable: {e}"));
        }
    }
    ValidationCheck::from_issues("Risk Metrics", issues)
}

fn check_sector_coverage(records: &[SectorRecord]) -> ValidationCheck {
    let present: BTreeSet<Sector> = records.iter().map(|r| r.sector).collect();
    let missing: Vec<&str> = Sector::ALL
        .iter()
        .filter(|s| !present.contains(*s))
        .map(|s| s.name())
        .collect();
    if missing.is_empty() {
        ValidationCheck::from_issues("Sector Coverage", Vec::new())
    } else {
        ValidationCheck {
            name: "Sector Coverage".into(),
            status: CheckStatus::Warning,
            issues: vec![format!("Missing sectors: {}", missing.join(", "))],
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run the five result checks. A warning counts as passed.
pub fn validate_results(
    records: &[SectorRecord],
    input: &ValidationInput,
) -> AttributionResult<ComputationOutput<ValidationReport>> {
    let start = Instant::now();

    let (first, last) = date_bounds(records)
        .ok_or_else(|| AttributionError::InsufficientData("No records to validate".into()))?;
    let request = AttributionRequest {
        start_date: input.start_date.unwrap_or(first),
        end_date: input.end_date.unwrap_or(last),
        weight_tolerance: CONSISTENCY_TOLERANCE,
    };

    let checks = vec![
        check_data_quality(records),
        check_attribution_consistency(records, &request),
        check_return_calculations(records),
        check_risk_metrics(records, input.risk_free_rate),
        check_sector_coverage(records),
    ];
    for c in &checks {
        match c.status {
            CheckStatus::Failed => tracing::warn!(check = %c.name, issues = ?c.issues, "validation check failed"),
            _ => tracing::debug!(check = %c.name, status = %c.status, "validation check"),
        }
    }

    let passed = checks
        .iter()
        .filter(|c| c.status != CheckStatus::Failed)
        .count() as u32;
    let total = checks.len() as u32;
    let report = ValidationReport {
        checks,
        passed,
        total,
        all_passed: passed == total,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Result validation: data quality, attribution consistency, returns, risk metrics, sector coverage",
        &serde_json::json!({
            "consistency_tolerance": CONSISTENCY_TOLERANCE.to_string(),
            "annualised_return_bounds": ["-1", "5"],
            "period_gap_days": [MIN_PERIOD_GAP_DAYS, MAX_PERIOD_GAP_DAYS],
            "start_date": request.start_date,
            "end_date": request.end_date,
        }),
        Vec::new(),
        elapsed,
        report,
    ))
}
