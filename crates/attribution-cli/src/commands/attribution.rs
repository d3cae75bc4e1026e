use attribution_core::attribution::brinson_attribution;
use attribution_core::config::AnalysisConfig;
use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use super::DataArgs;

/// Arguments for Brinson-Fachler attribution
#[derive(Args)]
pub struct AttributionArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Allowed deviation of per-period weight sums from 1
    #[arg(long)]
    pub weight_tolerance: Option<Decimal>,

    /// Include every sector-period row in the output
    #[arg(long)]
    pub details: bool,
}

pub fn run_attribution(
    args: AttributionArgs,
    config: &AnalysisConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut loaded = super::load(&args.data, config)?;
    if let Some(tolerance) = args.weight_tolerance {
        if tolerance < Decimal::ZERO {
            return Err("--weight-tolerance must be non-negative".into());
        }
        loaded.request.weight_tolerance = tolerance;
    }

    let output = brinson_attribution(&loaded.records, &loaded.request)?;
    let mut value = serde_json::to_value(output)?;
    if !args.details {
        if let Some(result) = value.get_mut("result").and_then(Value::as_object_mut) {
            result.remove("details");
        }
    }
    Ok(value)
}
