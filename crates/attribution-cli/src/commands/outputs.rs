use attribution_core::config::AnalysisConfig;
use attribution_core::report::{export_dashboard, generate_report, ReportInput};
use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;
use std::path::PathBuf;

use super::{DataArgs, MarketArgs};

/// Arguments for the dashboard CSV export
#[derive(Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub market: MarketArgs,

    /// Output directory (defaults to the config export dir)
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Annual risk-free rate for the KPI table
    #[arg(long)]
    pub risk_free_rate: Option<Decimal>,
}

/// Arguments for the PDF report
#[derive(Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Output PDF (defaults to the config report path)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Fund name on the title page
    #[arg(long, default_value = "Sectoral Investment Fund")]
    pub fund_name: String,

    /// Date printed on the report (defaults to today)
    #[arg(long)]
    pub report_date: Option<NaiveDate>,

    /// Annual risk-free rate
    #[arg(long)]
    pub risk_free_rate: Option<Decimal>,
}

pub fn run_export(args: ExportArgs, config: &AnalysisConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let loaded = super::load(&args.data, config)?;
    let dir = args.dir.unwrap_or_else(|| config.export_dir.clone());
    let rf = args.risk_free_rate.unwrap_or(config.risk_free_rate);
    let market = super::load_market(&args.market, config, &loaded.request)?;
    let output = export_dashboard(&loaded.records, &market, &dir, &loaded.request, rf)?;
    Ok(serde_json::to_value(output)?)
}

pub fn run_report(args: ReportArgs, config: &AnalysisConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let loaded = super::load(&args.data, config)?;
    let path = args.out.unwrap_or_else(|| config.report_path.clone());
    let input = ReportInput {
        fund_name: args.fund_name,
        report_date: args
            .report_date
            .unwrap_or_else(|| chrono::Local::now().date_naive()),
        start_date: loaded.request.start_date,
        end_date: loaded.request.end_date,
        risk_free_rate: args.risk_free_rate.unwrap_or(config.risk_free_rate),
    };
    let output = generate_report(&loaded.records, &input, &path)?;
    Ok(serde_json::to_value(output)?)
}
