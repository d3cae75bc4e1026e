use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AttributionError;
use crate::types::Rate;
use crate::AttributionResult;

/// Settings shared by every analysis run. Every field has a default so a
/// config file only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Sector records CSV
    pub data_path: PathBuf,
    /// Company-level returns and asset values
    pub companies_path: PathBuf,
    pub market_index_path: PathBuf,
    pub commodities_path: PathBuf,
    /// First period included in attribution (inclusive)
    pub start_date: Option<NaiveDate>,
    /// Last period included in attribution (inclusive)
    pub end_date: Option<NaiveDate>,
    /// Annual risk-free rate used by Sharpe ratios
    pub risk_free_rate: Rate,
    /// Allowed deviation of per-period weight sums from 1
    pub weight_tolerance: Decimal,
    /// Seed for the data generator and Monte Carlo
    pub seed: u64,
    pub num_simulations: u32,
    pub rolling_window: usize,
    pub export_dir: PathBuf,
    pub report_path: PathBuf,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("portfolio_data.csv"),
            companies_path: PathBuf::from("company_returns.csv"),
            market_index_path: PathBuf::from("market_index.csv"),
            commodities_path: PathBuf::from("commodity_prices.csv"),
            start_date: None,
            end_date: None,
            risk_free_rate: dec!(0.02),
            weight_tolerance: dec!(0.000001),
            seed: 42,
            num_simulations: 1_000,
            rolling_window: 12,
            export_dir: PathBuf::from("dashboard"),
            report_path: PathBuf::from("performance_attribution_report.pdf"),
        }
    }
}

impl AnalysisConfig {
    /// Load from a YAML (`.yaml`/`.yml`) or JSON file, chosen by extension.
    pub fn from_path(path: &Path) -> AttributionResult<Self> {
        let contents = fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let config: AnalysisConfig = match ext.as_deref() {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)?,
            Some("json") => serde_json::from_str(&contents)?,
            _ => {
                return Err(AttributionError::InvalidInput {
                    field: "config".into(),
                    reason: format!(
                        "Unsupported config format '{}' (use .yaml, .yml or .json)",
                        path.display()
                    ),
                })
            }
        };
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded analysis config");
        Ok(config)
    }

    pub fn validate(&self) -> AttributionResult<()> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(AttributionError::InvalidInput {
                    field: "start_date".into(),
                    reason: format!("start_date {start} is after end_date {end}"),
                });
            }
        }
        if self.weight_tolerance < Decimal::ZERO {
            return Err(AttributionError::InvalidInput {
                field: "weight_tolerance".into(),
                reason: "Must be non-negative".into(),
            });
        }
        if self.rolling_window < 2 {
            return Err(AttributionError::InvalidInput {
                field: "rolling_window".into(),
                reason: "Must be at least 2".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AnalysisConfig::default();
        assert_eq!(cfg.risk_free_rate, dec!(0.02));
        assert_eq!(cfg.seed, 42);
        assert_eq!(cfg.rolling_window, 12);
        assert_eq!(cfg.market_index_path, PathBuf::from("market_index.csv"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_yaml_partial_override() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "seed: 7\nstart_date: 2024-01-01\nend_date: 2024-12-31").unwrap();
        let cfg = AnalysisConfig::from_path(file.path()).unwrap();
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.start_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(cfg.num_simulations, 1_000);
    }

    #[test]
    fn test_json_config() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"risk_free_rate": "0.03", "rolling_window": 6}}"#).unwrap();
        let cfg = AnalysisConfig::from_path(file.path()).unwrap();
        assert_eq!(cfg.risk_free_rate, dec!(0.03));
        assert_eq!(cfg.rolling_window, 6);
    }

    #[test]
    fn test_reversed_dates_rejected() {
        let cfg = AnalysisConfig {
            start_date: NaiveDate::from_ymd_opt(2024, 6, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        assert!(AnalysisConfig::from_path(file.path()).is_err());
    }
}
