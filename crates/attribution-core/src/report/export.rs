use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::path::Path;
use std::time::Instant;

use crate::analytics::returns::{annualise, mean, portfolio_series, return_statistics, sector_returns};
use crate::attribution::{brinson_attribution, AttributionRequest};
use crate::error::AttributionError;
use crate::types::*;
use crate::AttributionResult;

pub const FACT_PERFORMANCE: &str = "fact_performance.csv";
pub const DIM_SECTORS: &str = "dim_sectors.csv";
pub const FACT_ATTRIBUTION: &str = "fact_attribution.csv";
pub const FACT_SECTOR_ATTRIBUTION: &str = "fact_sector_attribution.csv";
pub const KPIS: &str = "kpis.csv";
pub const DIM_COMPANIES: &str = "dim_companies.csv";
pub const FACT_COMMODITIES: &str = "fact_commodities.csv";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRow {
    pub sector: Sector,
    pub date: NaiveDate,
    pub portfolio_weight: Weight,
    pub portfolio_return: Rate,
    pub benchmark_weight: Weight,
    pub benchmark_return: Rate,
    pub year: i32,
    pub month: u32,
    pub quarter: u32,
    pub year_month: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorDimRow {
    pub sector_id: u32,
    pub sector: Sector,
    pub average_portfolio_weight: Weight,
    pub average_benchmark_weight: Weight,
    pub periods: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterAttributionRow {
    pub year: i32,
    pub quarter: u32,
    pub period: String,
    pub allocation_effect: Decimal,
    pub selection_effect: Decimal,
    pub interaction_effect: Decimal,
    pub total_active_return: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorAttributionRow {
    pub sector: Sector,
    pub allocation_effect: Decimal,
    pub selection_effect: Decimal,
    pub interaction_effect: Decimal,
    pub total_effect: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KpiFormat {
    Percentage,
    Number,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiRow {
    pub kpi_name: String,
    pub value: Decimal,
    pub format: KpiFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyDimRow {
    pub company_id: u32,
    pub sector: Sector,
    pub company: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommodityFactRow {
    pub date: NaiveDate,
    pub commodity: String,
    pub price: Decimal,
    pub unit: String,
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedFile {
    pub name: String,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub directory: String,
    pub files: Vec<ExportedFile>,
}

// ---------------------------------------------------------------------------
// Table builders
// ---------------------------------------------------------------------------

fn quarter_of(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}

pub fn fact_performance(records: &[SectorRecord]) -> Vec<PerformanceRow> {
    let mut rows: Vec<PerformanceRow> = records
        .iter()
        .map(|r| PerformanceRow {
            sector: r.sector,
            date: r.date,
            portfolio_weight: r.portfolio_weight,
            portfolio_return: r.portfolio_return,
            benchmark_weight: r.benchmark_weight,
            benchmark_return: r.benchmark_return,
            year: r.date.year(),
            month: r.date.month(),
            quarter: quarter_of(r.date),
            year_month: r.date.format("%Y-%m").to_string(),
        })
        .collect();
    rows.sort_by_key(|r| (r.date, r.sector));
    rows
}

pub fn dim_sectors(records: &[SectorRecord]) -> Vec<SectorDimRow> {
    let mut by_sector: BTreeMap<Sector, Vec<&SectorRecord>> = BTreeMap::new();
    for r in records {
        by_sector.entry(r.sector).or_default().push(r);
    }
    by_sector
        .into_iter()
        .enumerate()
        .map(|(i, (sector, rows))| {
            let pw: Vec<Decimal> = rows.iter().map(|r| r.portfolio_weight).collect();
            let bw: Vec<Decimal> = rows.iter().map(|r| r.benchmark_weight).collect();
            SectorDimRow {
                sector_id: i as u32 + 1,
                sector,
                average_portfolio_weight: mean(&pw),
                average_benchmark_weight: mean(&bw),
                periods: rows.len() as u32,
            }
        })
        .collect()
}

/// One row per distinct (sector, company), ids in sector then name order.
pub fn dim_companies(companies: &[CompanyRecord]) -> Vec<CompanyDimRow> {
    let distinct: BTreeSet<(Sector, &str)> = companies
        .iter()
        .map(|c| (c.sector, c.company.as_str()))
        .collect();
    distinct
        .into_iter()
        .enumerate()
        .map(|(i, (sector, company))| CompanyDimRow {
            company_id: i as u32 + 1,
            sector,
            company: company.to_string(),
        })
        .collect()
}

pub fn fact_commodities(prices: &[CommodityPrice]) -> Vec<CommodityFactRow> {
    let mut rows: Vec<CommodityFactRow> = prices
        .iter()
        .map(|p| CommodityFactRow {
            date: p.date,
            commodity: p.commodity.clone(),
            price: p.price,
            unit: p.unit.clone(),
            year: p.date.year(),
            month: p.date.month(),
        })
        .collect();
    rows.sort_by(|a, b| (a.date, &a.commodity).cmp(&(b.date, &b.commodity)));
    rows
}

fn quarter_bounds(year: i32, quarter: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first_month = (quarter - 1) * 3 + 1;
    let start = NaiveDate::from_ymd_opt(year, first_month, 1)?;
    let end = crate::data::month_end(NaiveDate::from_ymd_opt(year, first_month + 2, 1)?);
    Some((start, end))
}

/// Attribution per calendar quarter; quarters without records are skipped.
pub fn fact_attribution(records: &[SectorRecord]) -> AttributionResult<Vec<QuarterAttributionRow>> {
    let years: BTreeSet<i32> = records.iter().map(|r| r.date.year()).collect();
    let mut rows = Vec::new();
    for year in years {
        for quarter in 1..=4 {
            let Some((start, end)) = quarter_bounds(year, quarter) else {
                continue;
            };
            let out = match brinson_attribution(records, &AttributionRequest::new(start, end)) {
                Ok(out) => out.result,
                Err(AttributionError::InsufficientData(_)) => continue,
                Err(e) => return Err(e),
            };
            rows.push(QuarterAttributionRow {
                year,
                quarter,
                period: format!("{year} Q{quarter}"),
                allocation_effect: out.total_allocation,
                selection_effect: out.total_selection,
                interaction_effect: out.total_interaction,
                total_active_return: out.total_active_return,
            });
        }
    }
    Ok(rows)
}

pub fn fact_sector_attribution(
    records: &[SectorRecord],
    request: &AttributionRequest,
) -> AttributionResult<Vec<SectorAttributionRow>> {
    let out = brinson_attribution(records, request)?.result;
    Ok(out
        .sector_attribution
        .into_iter()
        .map(|s| SectorAttributionRow {
            sector: s.sector,
            allocation_effect: s.allocation_effect,
            selection_effect: s.selection_effect,
            interaction_effect: s.interaction_effect,
            total_effect: s.total_effect,
        })
        .collect())
}

pub fn kpis(records: &[SectorRecord], risk_free_rate: Rate) -> AttributionResult<Vec<KpiRow>> {
    let series = portfolio_series(records)?;
    let stats = return_statistics(&series, risk_free_rate)?;
    let mut rows = vec![
        KpiRow {
            kpi_name: "Portfolio_Annualized_Return".into(),
            value: stats.annualised_return,
            format: KpiFormat::Percentage,
        },
        KpiRow {
            kpi_name: "Portfolio_Volatility".into(),
            value: stats.annualised_volatility,
            format: KpiFormat::Percentage,
        },
        KpiRow {
            kpi_name: "Portfolio_Sharpe_Ratio".into(),
            value: stats.sharpe_ratio,
            format: KpiFormat::Number,
        },
    ];
    for (sector, returns) in sector_returns(records) {
        rows.push(KpiRow {
            kpi_name: format!("{}_Return", sector.name().replace(' ', "_")),
            value: annualise(mean(&returns)).ok_or_else(|| AttributionError::InvalidInput {
                field: "records".into(),
                reason: format!("Annualised return of {} overflows the decimal range", sector),
            })?,
            format: KpiFormat::Percentage,
        });
    }
    Ok(rows)
}

fn write_table<T: Serialize>(dir: &Path, name: &str, rows: &[T]) -> AttributionResult<ExportedFile> {
    let path = dir.join(name);
    let mut wtr = csv::Writer::from_writer(File::create(&path)?);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    tracing::debug!(path = %path.display(), rows = rows.len(), "wrote dashboard table");
    Ok(ExportedFile {
        name: name.to_string(),
        rows: rows.len(),
    })
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Write the dashboard tables as CSV files into `dir`. The company and
/// commodity tables are written only when `market` carries those rows.
pub fn export_dashboard(
    records: &[SectorRecord],
    market: &MarketData,
    dir: &Path,
    request: &AttributionRequest,
    risk_free_rate: Rate,
) -> AttributionResult<ComputationOutput<ExportSummary>> {
    let start = Instant::now();
    let mut warnings = Vec::new();
    if records.is_empty() {
        return Err(AttributionError::InsufficientData("No records to export".into()));
    }
    fs::create_dir_all(dir)?;

    let quarters = fact_attribution(records)?;
    if quarters.is_empty() {
        warnings.push("No complete quarter found; fact_attribution is empty".into());
    }
    let mut files = vec![
        write_table(dir, FACT_PERFORMANCE, &fact_performance(records))?,
        write_table(dir, DIM_SECTORS, &dim_sectors(records))?,
        write_table(dir, FACT_ATTRIBUTION, &quarters)?,
        write_table(dir, FACT_SECTOR_ATTRIBUTION, &fact_sector_attribution(records, request)?)?,
        write_table(dir, KPIS, &kpis(records, risk_free_rate)?)?,
    ];
    if market.companies.is_empty() {
        warnings.push(format!("No company rows; {DIM_COMPANIES} not written"));
    } else {
        files.push(write_table(dir, DIM_COMPANIES, &dim_companies(&market.companies))?);
    }
    if market.commodities.is_empty() {
        warnings.push(format!("No commodity prices; {FACT_COMMODITIES} not written"));
    } else {
        files.push(write_table(dir, FACT_COMMODITIES, &fact_commodities(&market.commodities))?);
    }
    tracing::info!(dir = %dir.display(), files = files.len(), "dashboard export complete");

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Dashboard fact and dimension tables",
        &serde_json::json!({
            "format": "csv",
            "attribution_range": [request.start_date, request.end_date],
            "quarterly_attribution": "calendar quarters, empty quarters skipped",
        }),
        warnings,
        elapsed,
        ExportSummary {
            directory: dir.display().to_string(),
            files,
        },
    ))
}
