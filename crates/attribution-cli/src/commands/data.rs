use attribution_core::config::AnalysisConfig;
use attribution_core::data::csv_io::write_records_path;
use attribution_core::data::generator::{generate_dataset, GeneratorInput, SimulatedDataset};
use attribution_core::data::market_io::write_rows_path;
use attribution_core::validation::{validate_results, ValidationInput};
use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::DataArgs;

/// Arguments for simulating a sample dataset
#[derive(Args)]
pub struct GenerateArgs {
    /// Output CSV (defaults to the config data path)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Company returns CSV (defaults to the config companies path)
    #[arg(long)]
    pub companies_out: Option<PathBuf>,

    /// Market index CSV (defaults to the config market index path)
    #[arg(long)]
    pub market_index_out: Option<PathBuf>,

    /// Commodity prices CSV (defaults to the config commodities path)
    #[arg(long)]
    pub commodities_out: Option<PathBuf>,

    /// Random seed (defaults to the config seed)
    #[arg(long)]
    pub seed: Option<u64>,

    /// First month simulated
    #[arg(long, default_value = "2020-01-01")]
    pub start: NaiveDate,

    /// Last month simulated
    #[arg(long, default_value = "2024-12-31")]
    pub end: NaiveDate,
}

/// Arguments for result validation
#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Annual risk-free rate (defaults to the config value)
    #[arg(long)]
    pub risk_free_rate: Option<Decimal>,
}

fn create_parent(path: &Path) -> std::io::Result<()> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => std::fs::create_dir_all(parent),
        None => Ok(()),
    }
}

pub fn run_generate(args: GenerateArgs, config: &AnalysisConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let path = args.out.unwrap_or_else(|| config.data_path.clone());
    let companies_path = args.companies_out.unwrap_or_else(|| config.companies_path.clone());
    let index_path = args.market_index_out.unwrap_or_else(|| config.market_index_path.clone());
    let commodities_path = args.commodities_out.unwrap_or_else(|| config.commodities_path.clone());
    let input = GeneratorInput {
        start: args.start,
        end: args.end,
        seed: args.seed.unwrap_or(config.seed),
        ..Default::default()
    };
    let SimulatedDataset { records, market } = generate_dataset(&input)?;
    for p in [&path, &companies_path, &index_path, &commodities_path] {
        create_parent(p)?;
    }
    write_records_path(&path, &records)?;
    write_rows_path(&companies_path, &market.companies)?;
    write_rows_path(&index_path, &market.market_index)?;
    write_rows_path(&commodities_path, &market.commodities)?;

    let periods: BTreeSet<NaiveDate> = records.iter().map(|r| r.date).collect();
    Ok(json!({
        "result": {
            "path": path.display().to_string(),
            "records": records.len(),
            "companies_path": companies_path.display().to_string(),
            "company_rows": market.companies.len(),
            "market_index_path": index_path.display().to_string(),
            "commodities_path": commodities_path.display().to_string(),
            "commodity_rows": market.commodities.len(),
            "periods": periods.len(),
            "sectors": input.profiles.len(),
            "seed": input.seed,
            "start_date": periods.first(),
            "end_date": periods.last(),
        }
    }))
}

pub fn run_validate(args: ValidateArgs, config: &AnalysisConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let loaded = super::load(&args.data, config)?;
    let input = ValidationInput {
        start_date: Some(loaded.request.start_date),
        end_date: Some(loaded.request.end_date),
        risk_free_rate: args.risk_free_rate.unwrap_or(config.risk_free_rate),
    };
    let output = validate_results(&loaded.records, &input)?;
    if !output.result.all_passed {
        tracing::warn!(
            passed = output.result.passed,
            total = output.result.total,
            "validation failed"
        );
    }
    Ok(serde_json::to_value(output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use attribution_core::data::market_io::{read_market_data, MarketDataPaths};

    #[test]
    fn test_generate_writes_every_table() {
        let dir = tempfile::tempdir().unwrap();
        let config = AnalysisConfig {
            data_path: dir.path().join("out/portfolio_data.csv"),
            companies_path: dir.path().join("out/company_returns.csv"),
            market_index_path: dir.path().join("out/market_index.csv"),
            commodities_path: dir.path().join("out/commodity_prices.csv"),
            ..Default::default()
        };
        let args = GenerateArgs {
            out: None,
            companies_out: None,
            market_index_out: None,
            commodities_out: None,
            seed: Some(7),
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        };
        let value = run_generate(args, &config).unwrap();
        assert_eq!(value["result"]["periods"], 6);
        assert_eq!(value["result"]["company_rows"], 23 * 6);
        assert_eq!(value["result"]["commodity_rows"], 5 * 6);

        let market = read_market_data(&MarketDataPaths {
            companies: Some(&config.companies_path),
            market_index: Some(&config.market_index_path),
            commodities: Some(&config.commodities_path),
        })
        .unwrap();
        assert_eq!(market.market_index.len(), 6);
        assert!(config.data_path.exists());
    }
}
