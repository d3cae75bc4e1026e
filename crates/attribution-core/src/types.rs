use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AttributionError;

/// Rates and returns expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Fractions of AUM (0.25 = 25% of the portfolio).
pub type Weight = Decimal;

/// The fixed set of sectors the fund invests in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sector {
    Mining,
    Energy,
    #[serde(rename = "ICT")]
    Ict,
    Transport,
    Agriculture,
    Financials,
    #[serde(rename = "Real Estate", alias = "Real_Estate", alias = "RealEstate")]
    RealEstate,
    Manufacturing,
}

impl Sector {
    pub const ALL: [Sector; 8] = [
        Sector::Mining,
        Sector::Energy,
        Sector::Ict,
        Sector::Transport,
        Sector::Agriculture,
        Sector::Financials,
        Sector::RealEstate,
        Sector::Manufacturing,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Sector::Mining => "Mining",
            Sector::Energy => "Energy",
            Sector::Ict => "ICT",
            Sector::Transport => "Transport",
            Sector::Agriculture => "Agriculture",
            Sector::Financials => "Financials",
            Sector::RealEstate => "Real Estate",
            Sector::Manufacturing => "Manufacturing",
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Sector {
    type Err = AttributionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_lowercase();
        Sector::ALL
            .iter()
            .copied()
            .find(|sector| sector.name().replace(' ', "").to_lowercase() == normalised)
            .ok_or_else(|| AttributionError::InvalidInput {
                field: "sector".into(),
                reason: format!(
                    "Unknown sector '{}'. Expected one of: {}",
                    s.trim(),
                    Sector::ALL
                        .iter()
                        .map(|s| s.name())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            })
    }
}

/// One sector in one period: portfolio and benchmark weight/return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorRecord {
    pub sector: Sector,
    pub date: NaiveDate,
    pub portfolio_weight: Weight,
    pub portfolio_return: Rate,
    pub benchmark_weight: Weight,
    pub benchmark_return: Rate,
}

/// One company in one period; sector records aggregate these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub date: NaiveDate,
    pub sector: Sector,
    pub company: String,
    pub monthly_return: Rate,
    /// Asset value in currency units
    pub asset_value: Decimal,
}

/// Month-end level of the market benchmark index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexLevel {
    pub date: NaiveDate,
    pub level: Decimal,
    pub monthly_return: Rate,
}

/// Month-end price of one commodity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommodityPrice {
    pub date: NaiveDate,
    pub commodity: String,
    pub price: Decimal,
    pub unit: String,
}

/// Series that accompany the sector records. Any of them may be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub companies: Vec<CompanyRecord>,
    pub market_index: Vec<IndexLevel>,
    pub commodities: Vec<CommodityPrice>,
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    wrap(methodology, assumptions, warnings, elapsed_us, "rust_decimal_128bit", result)
}

/// Same as [`with_metadata`] for computations carried out in `f64`.
pub fn with_metadata_f64<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    wrap(methodology, assumptions, warnings, elapsed_us, "ieee754_f64", result)
}

fn wrap<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    precision: &str,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: precision.to_string(),
        },
    }
}
