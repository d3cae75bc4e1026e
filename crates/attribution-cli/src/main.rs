mod commands;
mod input;
mod output;

use attribution_core::config::AnalysisConfig;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

use commands::analytics::{DecomposeArgs, FactorArgs, RiskArgs, RollingArgs, StationarityArgs};
use commands::attribution::AttributionArgs;
use commands::data::{GenerateArgs, ValidateArgs};
use commands::outputs::{ExportArgs, ReportArgs};
use commands::scenarios::{MonteCarloArgs, ScenarioCommand};

/// Sector performance attribution
#[derive(Parser)]
#[command(
    name = "attrib",
    version,
    about = "Sector performance attribution, scenarios and reporting",
    long_about = "A CLI for Brinson-Fachler sector performance attribution with decimal \
                  precision. Supports risk analytics, rolling performance, stationarity \
                  tests, factor regressions, seasonal decomposition, what-if scenarios, Monte Carlo simulation, result validation, \
                  dashboard CSV export and PDF reports."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Analysis config file (.yaml, .yml or .json); flags override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug events to stderr (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a monthly sector dataset and write it as CSV
    Generate(GenerateArgs),
    /// Brinson-Fachler attribution over a date range
    Attribution(AttributionArgs),
    /// Annualised return, volatility and Sharpe ratios
    Risk(RiskArgs),
    /// Rolling-window mean, volatility and Sharpe ratio
    Rolling(RollingArgs),
    /// Dickey-Fuller test on the portfolio return series
    Stationarity(StationarityArgs),
    /// Market, commodity and momentum factor regressions
    Factors(FactorArgs),
    /// Additive seasonal decomposition of the portfolio return series
    Decompose(DecomposeArgs),
    /// Run a what-if scenario against the data
    #[command(subcommand)]
    Scenario(ScenarioCommand),
    /// Monte Carlo simulation of annual portfolio returns
    MonteCarlo(MonteCarloArgs),
    /// Run the result validation checks (exit code 1 when any fails)
    Validate(ValidateArgs),
    /// Write the dashboard tables as CSV files
    Export(ExportArgs),
    /// Write the PDF performance report
    Report(ReportArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig, Box<dyn std::error::Error>> {
    match path {
        Some(p) => Ok(AnalysisConfig::from_path(p)?),
        None => Ok(AnalysisConfig::default()),
    }
}

/// A validation run whose report did not pass.
fn failed_validation(value: &serde_json::Value) -> bool {
    value.pointer("/result/all_passed") == Some(&serde_json::Value::Bool(false))
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    };

    let is_validate = matches!(cli.command, Commands::Validate(_));
    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Generate(args) => commands::data::run_generate(args, &config),
        Commands::Attribution(args) => commands::attribution::run_attribution(args, &config),
        Commands::Risk(args) => commands::analytics::run_risk(args, &config),
        Commands::Rolling(args) => commands::analytics::run_rolling(args, &config),
        Commands::Stationarity(args) => commands::analytics::run_stationarity(args, &config),
        Commands::Factors(args) => commands::analytics::run_factors(args, &config),
        Commands::Decompose(args) => commands::analytics::run_decompose(args, &config),
        Commands::Scenario(command) => commands::scenarios::run_scenario_command(command, &config),
        Commands::MonteCarlo(args) => commands::scenarios::run_monte_carlo_command(args, &config),
        Commands::Validate(args) => commands::data::run_validate(args, &config),
        Commands::Export(args) => commands::outputs::run_export(args, &config),
        Commands::Report(args) => commands::outputs::run_report(args, &config),
        Commands::Version => {
            println!("attrib {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            if is_validate && failed_validation(&value) {
                process::exit(1);
            }
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "attrib", "attribution", "--data", "d.csv", "--output", "table", "--config", "c.yaml",
        ])
        .unwrap();
        assert!(matches!(cli.output, OutputFormat::Table));
        assert_eq!(cli.config, Some(PathBuf::from("c.yaml")));
        match cli.command {
            Commands::Attribution(args) => {
                assert_eq!(args.data.data, Some(PathBuf::from("d.csv")));
                assert!(!args.details);
            }
            _ => panic!("expected attribution"),
        }
    }

    #[test]
    fn test_scenario_subcommands() {
        let cli = Cli::try_parse_from([
            "attrib", "scenario", "commodity-shock", "--change", "Gold=-0.2", "--change", "Copper=0.1",
        ])
        .unwrap();
        match cli.command {
            Commands::Scenario(ScenarioCommand::CommodityShock(args)) => {
                assert_eq!(args.changes.len(), 2);
                assert_eq!(args.changes[0].0, "Gold");
            }
            _ => panic!("expected commodity shock"),
        }

        let cli = Cli::try_parse_from(["attrib", "scenario", "downturn", "--decline", "-0.15"]).unwrap();
        match cli.command {
            Commands::Scenario(ScenarioCommand::Downturn(args)) => {
                assert_eq!(args.decline.to_string(), "-0.15");
            }
            _ => panic!("expected downturn"),
        }
    }

    #[test]
    fn test_commodity_shock_needs_a_change() {
        assert!(Cli::try_parse_from(["attrib", "scenario", "commodity-shock"]).is_err());
    }

    #[test]
    fn test_factor_and_decompose_flags() {
        let cli = Cli::try_parse_from([
            "attrib", "factors", "--market-index", "idx.csv", "--commodities", "com.csv",
        ])
        .unwrap();
        match cli.command {
            Commands::Factors(args) => {
                assert_eq!(args.market.market_index, Some(PathBuf::from("idx.csv")));
                assert_eq!(args.market.companies, None);
            }
            _ => panic!("expected factors"),
        }

        let cli = Cli::try_parse_from(["attrib", "decompose"]).unwrap();
        match cli.command {
            Commands::Decompose(args) => assert_eq!(args.period, 12),
            _ => panic!("expected decompose"),
        }
    }

    #[test]
    fn test_bad_date_rejected() {
        assert!(Cli::try_parse_from(["attrib", "risk", "--start-date", "2024-13-01"]).is_err());
    }

    #[test]
    fn test_failed_validation_detection() {
        let failed = serde_json::json!({"result": {"all_passed": false}});
        let passed = serde_json::json!({"result": {"all_passed": true}});
        assert!(failed_validation(&failed));
        assert!(!failed_validation(&passed));
        assert!(!failed_validation(&serde_json::json!({"result": {}})));
    }
}
