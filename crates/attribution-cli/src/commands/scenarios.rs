use attribution_core::config::AnalysisConfig;
use attribution_core::scenarios::{run_monte_carlo, run_scenario, MonteCarloInput, Scenario};
use attribution_core::{Sector, Weight};
use clap::{Args, Subcommand};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{parse_key_value, DataArgs};
use crate::input;

/// What-if scenarios
#[derive(Subcommand)]
pub enum ScenarioCommand {
    /// Scale Mining returns by an average commodity price move
    CommodityShock(CommodityShockArgs),
    /// Replace portfolio weights in every period
    Reallocation(ReallocationArgs),
    /// Beta-scaled market decline spread over twelve months
    Downturn(DownturnArgs),
}

#[derive(Args)]
pub struct CommodityShockArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Commodity price change, repeatable (e.g. --change Gold=-0.2 --change Copper=0.1)
    #[arg(long = "change", value_parser = parse_key_value, allow_hyphen_values = true, required = true)]
    pub changes: Vec<(String, Decimal)>,
}

#[derive(Args)]
pub struct ReallocationArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Target portfolio weight, repeatable (e.g. --weight Mining=0.3)
    #[arg(long = "weight", value_parser = parse_key_value)]
    pub weights: Vec<(String, Decimal)>,

    /// JSON object of sector -> weight
    #[arg(long, conflicts_with = "weights")]
    pub weights_file: Option<PathBuf>,
}

#[derive(Args)]
pub struct DownturnArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Annual market move (negative for a decline)
    #[arg(long, default_value = "-0.30", allow_hyphen_values = true)]
    pub decline: Decimal,
}

/// Arguments for Monte Carlo simulation of annual returns
#[derive(Args)]
pub struct MonteCarloArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Number of simulated years (minimum 100)
    #[arg(long)]
    pub simulations: Option<u32>,

    /// Random seed (defaults to the config seed)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Months compounded into each simulated return
    #[arg(long, default_value = "12")]
    pub horizon: u32,

    /// Include every simulated return in the output
    #[arg(long)]
    pub paths: bool,
}

fn reallocation_weights(args: &ReallocationArgs) -> Result<BTreeMap<Sector, Weight>, Box<dyn std::error::Error>> {
    if let Some(ref path) = args.weights_file {
        return input::file::read_json(path);
    }
    if args.weights.is_empty() {
        return Err("Provide --weight SECTOR=WEIGHT (repeatable) or --weights-file".into());
    }
    let mut weights = BTreeMap::new();
    for (name, weight) in &args.weights {
        let sector: Sector = name.parse()?;
        if weights.insert(sector, *weight).is_some() {
            return Err(format!("Sector '{sector}' given more than once").into());
        }
    }
    Ok(weights)
}

pub fn run_scenario_command(
    command: ScenarioCommand,
    config: &AnalysisConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let (data, scenario) = match command {
        ScenarioCommand::CommodityShock(args) => {
            let changes = args.changes.into_iter().collect();
            (args.data, Scenario::CommodityShock { changes })
        }
        ScenarioCommand::Reallocation(args) => {
            let weights = reallocation_weights(&args)?;
            (args.data, Scenario::SectorReallocation { weights })
        }
        ScenarioCommand::Downturn(args) => (args.data, Scenario::MarketDownturn { decline: args.decline }),
    };
    let loaded = super::load(&data, config)?;
    let output = run_scenario(&loaded.records, &scenario, &loaded.request)?;
    Ok(serde_json::to_value(output)?)
}

pub fn run_monte_carlo_command(
    args: MonteCarloArgs,
    config: &AnalysisConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let loaded = super::load(&args.data, config)?;
    let input = MonteCarloInput {
        num_simulations: args.simulations.unwrap_or(config.num_simulations),
        seed: Some(args.seed.unwrap_or(config.seed)),
        horizon_months: args.horizon,
        include_paths: args.paths,
    };
    let output = run_monte_carlo(&loaded.records, &input)?;
    Ok(serde_json::to_value(output)?)
}
