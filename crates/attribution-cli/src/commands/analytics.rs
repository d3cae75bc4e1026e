use attribution_core::analytics::{
    analyze_factors, analyze_risk, analyze_stationarity, decompose_returns, rolling_performance, SEASONAL_PERIOD,
};
use attribution_core::config::AnalysisConfig;
use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use super::{DataArgs, MarketArgs};

/// Arguments for risk-adjusted return metrics
#[derive(Args)]
pub struct RiskArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Annual risk-free rate (defaults to the config value, 0.02)
    #[arg(long)]
    pub risk_free_rate: Option<Decimal>,
}

/// Arguments for rolling-window performance
#[derive(Args)]
pub struct RollingArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Window length in periods
    #[arg(long)]
    pub window: Option<usize>,
}

/// Arguments for the Dickey-Fuller stationarity test
#[derive(Args)]
pub struct StationarityArgs {
    #[command(flatten)]
    pub data: DataArgs,
}

/// Arguments for the market, commodity and momentum factor regressions
#[derive(Args)]
pub struct FactorArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub market: MarketArgs,
}

/// Arguments for the seasonal decomposition
#[derive(Args)]
pub struct DecomposeArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Cycle length in periods
    #[arg(long, default_value_t = SEASONAL_PERIOD)]
    pub period: usize,
}

pub fn run_risk(args: RiskArgs, config: &AnalysisConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let loaded = super::load(&args.data, config)?;
    let rf = args.risk_free_rate.unwrap_or(config.risk_free_rate);
    let output = analyze_risk(&loaded.records, rf)?;
    Ok(serde_json::to_value(output)?)
}

pub fn run_rolling(args: RollingArgs, config: &AnalysisConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let loaded = super::load(&args.data, config)?;
    let window = args.window.unwrap_or(config.rolling_window);
    let output = rolling_performance(&loaded.records, window)?;
    Ok(serde_json::to_value(output)?)
}

pub fn run_stationarity(
    args: StationarityArgs,
    config: &AnalysisConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let loaded = super::load(&args.data, config)?;
    let output = analyze_stationarity(&loaded.records)?;
    Ok(serde_json::to_value(output)?)
}

pub fn run_factors(args: FactorArgs, config: &AnalysisConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let loaded = super::load(&args.data, config)?;
    let market = super::load_market(&args.market, config, &loaded.request)?;
    let output = analyze_factors(&loaded.records, &market)?;
    Ok(serde_json::to_value(output)?)
}

pub fn run_decompose(args: DecomposeArgs, config: &AnalysisConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let loaded = super::load(&args.data, config)?;
    let output = decompose_returns(&loaded.records, args.period)?;
    Ok(serde_json::to_value(output)?)
}
