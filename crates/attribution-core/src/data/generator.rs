use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Normal, Uniform};

use super::month_ends;
use crate::error::AttributionError;
use crate::types::{CommodityPrice, CompanyRecord, IndexLevel, MarketData, Sector, SectorRecord};
use crate::AttributionResult;

const DECIMAL_PLACES: u32 = 6;
const MARKET_FACTOR_STD: f64 = 0.02;
const INDEX_BASE: f64 = 100.0;
const INDEX_RETURN_MEAN: f64 = 0.005;
const INDEX_RETURN_STD: f64 = 0.08;
/// Simulated prices never fall below this share of the starting price.
const PRICE_FLOOR: f64 = 0.5;

/// Simulation characteristics of one sector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectorProfile {
    pub sector: Sector,
    pub companies: u32,
    /// Annualised volatility
    pub volatility: f64,
    /// Annualised expected return
    pub base_return: f64,
}

impl SectorProfile {
    pub fn defaults() -> Vec<SectorProfile> {
        let p = |sector, companies, volatility, base_return| SectorProfile {
            sector,
            companies,
            volatility,
            base_return,
        };
        vec![
            p(Sector::Mining, 7, 0.25, 0.12),
            p(Sector::Energy, 2, 0.20, 0.08),
            p(Sector::Ict, 4, 0.22, 0.15),
            p(Sector::Transport, 3, 0.18, 0.06),
            p(Sector::Agriculture, 2, 0.28, 0.10),
            p(Sector::Financials, 2, 0.16, 0.09),
            p(Sector::RealEstate, 1, 0.12, 0.07),
            p(Sector::Manufacturing, 2, 0.19, 0.08),
        ]
    }
}

/// Random-walk parameters of one commodity price series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommodityProfile {
    pub commodity: String,
    pub start_price: f64,
    /// Monthly volatility
    pub volatility: f64,
    /// Monthly drift
    pub trend: f64,
    pub unit: String,
}

impl CommodityProfile {
    pub fn defaults() -> Vec<CommodityProfile> {
        let p = |commodity: &str, start_price, volatility, trend, unit: &str| CommodityProfile {
            commodity: commodity.into(),
            start_price,
            volatility,
            trend,
            unit: unit.into(),
        };
        vec![
            p("Gold", 1500.0, 0.03, 0.001, "troy_oz"),
            p("Platinum", 900.0, 0.05, -0.0005, "troy_oz"),
            p("Lithium", 10000.0, 0.12, 0.008, "ton"),
            p("Nickel", 14000.0, 0.07, 0.002, "ton"),
            p("Chrome", 300.0, 0.06, 0.0015, "ton"),
        ]
    }
}

/// Benchmark monthly return distribution (mean, std) per sector.
fn benchmark_distribution(sector: Sector) -> (f64, f64) {
    match sector {
        Sector::Mining => (0.010, 0.040),
        Sector::Financials => (0.008, 0.030),
        Sector::Energy => (0.006, 0.035),
        _ => (0.007, 0.032),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorInput {
    /// First month (any day in the month; records are dated at month end)
    pub start: NaiveDate,
    /// Last month (inclusive)
    pub end: NaiveDate,
    pub seed: u64,
    pub profiles: Vec<SectorProfile>,
    #[serde(default = "CommodityProfile::defaults")]
    pub commodities: Vec<CommodityProfile>,
}

impl Default for GeneratorInput {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default(),
            seed: 42,
            profiles: SectorProfile::defaults(),
            commodities: CommodityProfile::defaults(),
        }
    }
}

/// Sector records together with the series they were simulated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedDataset {
    pub records: Vec<SectorRecord>,
    pub market: MarketData,
}

fn to_decimal(value: f64, field: &str) -> AttributionResult<Decimal> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(DECIMAL_PLACES))
        .ok_or_else(|| AttributionError::InvalidInput {
            field: field.into(),
            reason: format!("Simulated value {value} is not representable"),
        })
}

/// Round weights to 6 dp and push the rounding residual onto the largest
/// weight so the set sums to exactly 1.
fn normalise_weights(raw: &[f64]) -> AttributionResult<Vec<Decimal>> {
    let total: f64 = raw.iter().sum();
    if total <= 0.0 {
        return Err(AttributionError::InvalidInput {
            field: "weights".into(),
            reason: "Simulated asset values sum to zero".into(),
        });
    }
    let mut weights = raw
        .iter()
        .map(|v| to_decimal(v / total, "weight"))
        .collect::<AttributionResult<Vec<_>>>()?;
    let residual = Decimal::ONE - weights.iter().copied().sum::<Decimal>();
    if let Some(largest) = weights.iter_mut().max() {
        *largest += residual;
    }
    Ok(weights)
}

fn normal(mean: f64, std_dev: f64) -> AttributionResult<Normal> {
    Normal::new(mean, std_dev).map_err(|e| AttributionError::InvalidInput {
        field: "distribution".into(),
        reason: format!("Invalid Normal parameters: {e}"),
    })
}

/// Simulate a monthly sector dataset.
///
/// Portfolio weights come from simulated company asset values, benchmark
/// weights are equal across sectors. Identical input always produces
/// identical records.
pub fn generate_portfolio_data(input: &GeneratorInput) -> AttributionResult<Vec<SectorRecord>> {
    Ok(generate_dataset(input)?.records)
}

/// Simulate the sector dataset plus its company rows, a market index and
/// commodity prices. The index and commodity walks draw from the same
/// generator after the portfolio, so the sector records do not depend on
/// the commodity profiles.
pub fn generate_dataset(input: &GeneratorInput) -> AttributionResult<SimulatedDataset> {
    if input.profiles.is_empty() {
        return Err(AttributionError::InvalidInput {
            field: "profiles".into(),
            reason: "At least one sector profile is required".into(),
        });
    }
    if input.start > input.end {
        return Err(AttributionError::InvalidInput {
            field: "start".into(),
            reason: format!("start {} is after end {}", input.start, input.end),
        });
    }
    if let Some(p) = input.profiles.iter().find(|p| p.companies == 0) {
        return Err(AttributionError::InvalidInput {
            field: "companies".into(),
            reason: format!("Sector '{}' must have at least one company", p.sector),
        });
    }

    let mut rng = StdRng::seed_from_u64(input.seed);
    let market = normal(0.0, MARKET_FACTOR_STD)?;
    let asset_value = Uniform::new(50.0, 500.0).map_err(|e| AttributionError::InvalidInput {
        field: "asset_value".into(),
        reason: format!("Invalid Uniform parameters: {e}"),
    })?;
    let n_sectors = input.profiles.len();
    let benchmark_weights = normalise_weights(&vec![1.0; n_sectors])?;

    if let Some(c) = input
        .commodities
        .iter()
        .find(|c| c.start_price <= 0.0 || c.volatility < 0.0)
    {
        return Err(AttributionError::InvalidInput {
            field: "commodities".into(),
            reason: format!(
                "Commodity '{}' needs a positive start price and non-negative volatility",
                c.commodity
            ),
        });
    }

    let dates = month_ends(input.start, input.end);
    let mut records = Vec::with_capacity(dates.len() * n_sectors);
    let mut companies = Vec::new();

    for &date in &dates {
        let mut sector_values = Vec::with_capacity(n_sectors);
        let mut portfolio_returns = Vec::with_capacity(n_sectors);
        let mut benchmark_returns = Vec::with_capacity(n_sectors);

        for profile in &input.profiles {
            let monthly_base = profile.base_return / 12.0;
            let specific = normal(0.0, profile.volatility / 12f64.sqrt())?;

            let mut value_sum = 0.0_f64;
            let mut return_sum = 0.0_f64;
            for n in 0..profile.companies {
                let market_move: f64 = rng.sample(&market);
                let company_move: f64 = rng.sample(&specific);
                let value: f64 = rng.sample(&asset_value);
                let monthly_return = monthly_base + market_move + company_move;
                return_sum += monthly_return;
                value_sum += value * 1e6;
                companies.push(CompanyRecord {
                    date,
                    sector: profile.sector,
                    company: format!("{}_Company_{}", profile.sector.name(), n + 1),
                    monthly_return: to_decimal(monthly_return, "monthly_return")?,
                    asset_value: to_decimal(value * 1e6, "asset_value")?,
                });
            }
            sector_values.push(value_sum);
            portfolio_returns.push(return_sum / profile.companies as f64);

            let (mean, std_dev) = benchmark_distribution(profile.sector);
            let benchmark_return: f64 = rng.sample(normal(mean, std_dev)?);
            benchmark_returns.push(benchmark_return);
        }

        let portfolio_weights = normalise_weights(&sector_values)?;
        for (i, profile) in input.profiles.iter().enumerate() {
            records.push(SectorRecord {
                sector: profile.sector,
                date,
                portfolio_weight: portfolio_weights[i],
                portfolio_return: to_decimal(portfolio_returns[i], "portfolio_return")?,
                benchmark_weight: benchmark_weights[i],
                benchmark_return: to_decimal(benchmark_returns[i], "benchmark_return")?,
            });
        }
    }

    let market_index = simulate_index(&dates, &mut rng)?;
    let commodities = simulate_commodities(&dates, &input.commodities, &mut rng)?;

    tracing::info!(
        records = records.len(),
        companies = companies.len(),
        commodity_prices = commodities.len(),
        sectors = n_sectors,
        seed = input.seed,
        "generated simulated portfolio data"
    );
    Ok(SimulatedDataset {
        records,
        market: MarketData {
            companies,
            market_index,
            commodities,
        },
    })
}

/// Index level compounded from normal monthly returns, based at 100.
fn simulate_index(dates: &[NaiveDate], rng: &mut StdRng) -> AttributionResult<Vec<IndexLevel>> {
    let dist = normal(INDEX_RETURN_MEAN, INDEX_RETURN_STD)?;
    let mut level = INDEX_BASE;
    dates
        .iter()
        .map(|&date| {
            let monthly_return: f64 = rng.sample(&dist);
            level *= 1.0 + monthly_return;
            Ok(IndexLevel {
                date,
                level: to_decimal(level, "level")?,
                monthly_return: to_decimal(monthly_return, "monthly_return")?,
            })
        })
        .collect()
}

/// One price walk per commodity, price_t = price_{t-1} * (1 + trend + e_t),
/// starting at the profile price and floored at half of it.
fn simulate_commodities(
    dates: &[NaiveDate],
    profiles: &[CommodityProfile],
    rng: &mut StdRng,
) -> AttributionResult<Vec<CommodityPrice>> {
    let shocks = profiles
        .iter()
        .map(|p| {
            if p.volatility == 0.0 {
                Ok(None)
            } else {
                normal(0.0, p.volatility).map(Some)
            }
        })
        .collect::<AttributionResult<Vec<_>>>()?;
    let mut prices: Vec<f64> = profiles.iter().map(|p| p.start_price).collect();
    let mut rows = Vec::with_capacity(dates.len() * profiles.len());

    for (t, &date) in dates.iter().enumerate() {
        for (i, profile) in profiles.iter().enumerate() {
            if t > 0 {
                let shock: f64 = match &shocks[i] {
                    Some(d) => rng.sample(d),
                    None => 0.0,
                };
                let floor = profile.start_price * PRICE_FLOOR;
                prices[i] = (prices[i] * (1.0 + profile.trend + shock)).max(floor);
            }
            rows.push(CommodityPrice {
                date,
                commodity: profile.commodity.clone(),
                price: to_decimal(prices[i], "price")?,
                unit: profile.unit.clone(),
            });
        }
    }
    Ok(rows)
}
