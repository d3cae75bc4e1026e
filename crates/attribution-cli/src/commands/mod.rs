pub mod analytics;
pub mod attribution;
pub mod data;
pub mod outputs;
pub mod scenarios;

use attribution_core::attribution::AttributionRequest;
use attribution_core::config::AnalysisConfig;
use attribution_core::data::market_io::{read_market_data, MarketDataPaths};
use attribution_core::data::{date_bounds, filter_range};
use attribution_core::{MarketData, SectorRecord};
use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};

use crate::input;

/// Data source and period range shared by every analysis command
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Sector records CSV; "-" reads piped CSV from stdin
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// First period included (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Last period included (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub end_date: Option<NaiveDate>,
}

/// Companion tables: company returns, market index and commodity prices
#[derive(Args, Debug, Clone, Default)]
pub struct MarketArgs {
    /// Company returns CSV (defaults to the config path, skipped if absent)
    #[arg(long)]
    pub companies: Option<PathBuf>,

    /// Market index CSV (defaults to the config path, skipped if absent)
    #[arg(long)]
    pub market_index: Option<PathBuf>,

    /// Commodity prices CSV (defaults to the config path, skipped if absent)
    #[arg(long)]
    pub commodities: Option<PathBuf>,
}

/// A flagged path must exist; a config default is used only when present.
fn market_path(flag: Option<&Path>, default: &Path) -> Result<Option<PathBuf>, Box<dyn std::error::Error>> {
    match flag {
        Some(p) if !p.exists() => Err(format!("File not found: {}", p.display()).into()),
        Some(p) => Ok(Some(p.to_path_buf())),
        None if default.exists() => Ok(Some(default.to_path_buf())),
        None => {
            tracing::debug!(path = %default.display(), "market table not found, skipping");
            Ok(None)
        }
    }
}

/// Load the companion tables and keep the rows inside the request range.
pub fn load_market(
    args: &MarketArgs,
    config: &AnalysisConfig,
    request: &AttributionRequest,
) -> Result<MarketData, Box<dyn std::error::Error>> {
    let companies = market_path(args.companies.as_deref(), &config.companies_path)?;
    let market_index = market_path(args.market_index.as_deref(), &config.market_index_path)?;
    let commodities = market_path(args.commodities.as_deref(), &config.commodities_path)?;
    let mut data = read_market_data(&MarketDataPaths {
        companies: companies.as_deref(),
        market_index: market_index.as_deref(),
        commodities: commodities.as_deref(),
    })?;
    let in_range = |d: NaiveDate| d >= request.start_date && d <= request.end_date;
    data.companies.retain(|c| in_range(c.date));
    data.market_index.retain(|l| in_range(l.date));
    data.commodities.retain(|p| in_range(p.date));
    Ok(data)
}

/// Records in range plus the matching attribution request.
pub struct Loaded {
    pub records: Vec<SectorRecord>,
    pub request: AttributionRequest,
}

fn read_source(path: &Path) -> Result<Vec<SectorRecord>, Box<dyn std::error::Error>> {
    if path == Path::new("-") {
        return input::stdin::read_stdin_records()?
            .ok_or_else(|| "--data - given but no CSV was piped on stdin".into());
    }
    input::file::read_records_file(path)
}

/// Load the dataset and resolve the range: flags, then config, then the
/// first and last period in the data.
pub fn load(args: &DataArgs, config: &AnalysisConfig) -> Result<Loaded, Box<dyn std::error::Error>> {
    let path = args.data.clone().unwrap_or_else(|| config.data_path.clone());
    let all = read_source(&path)?;
    let (first, last) = date_bounds(&all).ok_or("Data file contains no records")?;

    let start_date = args.start_date.or(config.start_date).unwrap_or(first);
    let end_date = args.end_date.or(config.end_date).unwrap_or(last);
    if start_date > end_date {
        return Err(format!("start date {start_date} is after end date {end_date}").into());
    }
    let records: Vec<SectorRecord> = filter_range(&all, start_date, end_date)
        .into_iter()
        .cloned()
        .collect();
    tracing::debug!(
        path = %path.display(),
        total = all.len(),
        in_range = records.len(),
        "loaded sector records"
    );

    let request = AttributionRequest {
        start_date,
        end_date,
        weight_tolerance: config.weight_tolerance,
    };
    Ok(Loaded { records, request })
}

/// `NAME=VALUE` pairs such as `Gold=-0.2`.
pub fn parse_key_value(raw: &str) -> Result<(String, Decimal), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing name in '{raw}'"));
    }
    let value = value
        .trim()
        .parse::<Decimal>()
        .map_err(|e| format!("invalid value '{}': {}", value.trim(), e))?;
    Ok((key.to_string(), value))
}
