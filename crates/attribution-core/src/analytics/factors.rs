use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use super::returns::{mean, period_returns, sqrt_decimal};
use crate::data::group_by_period;
use crate::error::AttributionError;
use crate::types::*;
use crate::AttributionResult;

/// Minimum aligned observations for a factor regression.
pub const MIN_OBSERVATIONS: usize = 12;
const MOMENTUM_WINDOW: usize = 3;
const HML_SECTORS: usize = 3;

/// Weights of the composite commodity factor, by the fund's mining exposure.
pub const COMMODITY_WEIGHTS: [(&str, Decimal); 5] = [
    ("Gold", dec!(0.35)),
    ("Platinum", dec!(0.30)),
    ("Lithium", dec!(0.20)),
    ("Nickel", dec!(0.10)),
    ("Chrome", dec!(0.05)),
];

/// A factor or return series keyed by period.
pub type FactorSeries = BTreeMap<NaiveDate, Decimal>;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorModel {
    /// r = alpha + b1 MKT + b2 COMM + b3 MOM
    MarketCommodityMomentum,
    /// r = alpha + b1 MKT + b2 SMB + b3 HML
    FamaFrench,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorLoading {
    pub factor: String,
    pub beta: Decimal,
    pub standard_error: Decimal,
    /// Zero when the standard error is zero
    pub t_stat: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorRegression {
    /// "Portfolio" or the sector name
    pub subject: String,
    pub model: FactorModel,
    pub observations: u32,
    /// Intercept, the return not explained by the factors
    pub alpha: Decimal,
    pub alpha_t_stat: Decimal,
    pub loadings: Vec<FactorLoading>,
    pub r_squared: Decimal,
    pub adjusted_r_squared: Decimal,
    pub residual_std_error: Decimal,
}

impl FactorRegression {
    pub fn beta(&self, factor: &str) -> Option<Decimal> {
        self.loadings
            .iter()
            .find(|l| l.factor == factor)
            .map(|l| l.beta)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorAnalysisOutput {
    pub portfolio: FactorRegression,
    /// Present when company rows are available for the size factor
    pub fama_french: Option<FactorRegression>,
    pub sectors: Vec<FactorRegression>,
}

// ---------------------------------------------------------------------------
// Factor construction
// ---------------------------------------------------------------------------

/// Monthly returns of the market index.
pub fn market_factor(index: &[IndexLevel]) -> FactorSeries {
    index.iter().map(|l| (l.date, l.monthly_return)).collect()
}

/// Weighted sum of commodity price changes. Commodities missing in a
/// period contribute nothing; the first period of each series has no change.
pub fn commodity_factor(prices: &[CommodityPrice]) -> FactorSeries {
    let mut composite = FactorSeries::new();
    for (name, weight) in COMMODITY_WEIGHTS {
        let mut series: Vec<(NaiveDate, Decimal)> = prices
            .iter()
            .filter(|p| p.commodity.trim().eq_ignore_ascii_case(name))
            .map(|p| (p.date, p.price))
            .collect();
        series.sort_by_key(|(d, _)| *d);
        for pair in series.windows(2) {
            let (_, previous) = pair[0];
            let (date, price) = pair[1];
            let Some(change) = price
                .checked_div(previous)
                .and_then(|ratio| ratio.checked_sub(Decimal::ONE))
                .and_then(|r| r.checked_mul(weight))
            else {
                continue;
            };
            let slot = composite.entry(date).or_insert(Decimal::ZERO);
            *slot = slot.saturating_add(change);
        }
    }
    composite
}

/// Mean of the previous three returns, from the fourth period on.
pub fn momentum_factor(returns: &FactorSeries) -> FactorSeries {
    let ordered: Vec<(NaiveDate, Decimal)> = returns.iter().map(|(d, r)| (*d, *r)).collect();
    ordered
        .windows(MOMENTUM_WINDOW + 1)
        .map(|w| {
            let lagged: Vec<Decimal> = w[..MOMENTUM_WINDOW].iter().map(|(_, r)| *r).collect();
            (w[MOMENTUM_WINDOW].0, mean(&lagged))
        })
        .collect()
}

/// Mean return of the three best sectors minus the three worst, per period.
pub fn hml_factor(records: &[SectorRecord]) -> FactorSeries {
    group_by_period(records)
        .into_iter()
        .filter_map(|(date, rows)| {
            let mut returns: Vec<Decimal> = rows.iter().map(|r| r.portfolio_return).collect();
            returns.sort();
            let k = HML_SECTORS.min(returns.len());
            if k == 0 {
                return None;
            }
            let low = mean(&returns[..k]);
            let high = mean(&returns[returns.len() - k..]);
            Some((date, high.saturating_sub(low)))
        })
        .collect()
}

/// Mean return of companies at or below the median asset value minus the
/// mean of those above it. The median is taken over every company row.
pub fn smb_factor(companies: &[CompanyRecord]) -> FactorSeries {
    if companies.is_empty() {
        return FactorSeries::new();
    }
    let mut values: Vec<Decimal> = companies.iter().map(|c| c.asset_value).collect();
    values.sort();
    let mid = values.len() / 2;
    let median = if values.len() % 2 == 1 {
        values[mid]
    } else {
        values[mid - 1] / dec!(2) + values[mid] / dec!(2)
    };

    let mut groups: BTreeMap<NaiveDate, (Vec<Rate>, Vec<Rate>)> = BTreeMap::new();
    for c in companies {
        let (small, big) = groups.entry(c.date).or_default();
        if c.asset_value <= median {
            small.push(c.monthly_return);
        } else {
            big.push(c.monthly_return);
        }
    }
    groups
        .into_iter()
        .filter(|(_, (small, big))| !small.is_empty() && !big.is_empty())
        .map(|(date, (small, big))| (date, mean(&small).saturating_sub(mean(&big))))
        .collect()
}

fn sector_series(records: &[SectorRecord]) -> BTreeMap<Sector, FactorSeries> {
    let mut by_sector: BTreeMap<Sector, FactorSeries> = BTreeMap::new();
    for r in records {
        by_sector
            .entry(r.sector)
            .or_default()
            .insert(r.date, r.portfolio_return);
    }
    by_sector
}

// ---------------------------------------------------------------------------
// OLS (normal equations, checked decimal arithmetic)
// ---------------------------------------------------------------------------

struct OlsFit {
    coefficients: Vec<Decimal>,
    standard_errors: Vec<Decimal>,
    r_squared: Decimal,
    adjusted_r_squared: Decimal,
    residual_std_error: Decimal,
}

fn dot(pairs: impl Iterator<Item = (Decimal, Decimal)>) -> Option<Decimal> {
    pairs.fold(Some(Decimal::ZERO), |acc, (a, b)| acc?.checked_add(a.checked_mul(b)?))
}

/// Gauss-Jordan inverse with partial pivoting; `None` when singular.
#[allow(clippy::needless_range_loop)]
fn mat_inverse(a: &[Vec<Decimal>]) -> Option<Vec<Vec<Decimal>>> {
    let n = a.len();
    let mut aug: Vec<Vec<Decimal>> = a
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut r = row.clone();
            r.extend((0..n).map(|j| if i == j { Decimal::ONE } else { Decimal::ZERO }));
            r
        })
        .collect();

    for col in 0..n {
        let pivot_row = (col..n).max_by_key(|&r| aug[r][col].abs())?;
        if aug[pivot_row][col].is_zero() {
            return None;
        }
        aug.swap(col, pivot_row);

        let pivot = aug[col][col];
        for j in 0..2 * n {
            aug[col][j] = aug[col][j].checked_div(pivot)?;
        }
        for row in 0..n {
            let factor = aug[row][col];
            if row == col || factor.is_zero() {
                continue;
            }
            for j in 0..2 * n {
                let update = factor.checked_mul(aug[col][j])?;
                aug[row][j] = aug[row][j].checked_sub(update)?;
            }
        }
    }
    Some(aug.into_iter().map(|row| row[n..].to_vec()).collect())
}

/// Fit `y = X b`; `x` rows start with the intercept column. Needs more
/// rows than columns.
fn ols(x: &[Vec<Decimal>], y: &[Decimal]) -> Option<OlsFit> {
    let n = x.len();
    let cols = x.first()?.len();
    if n <= cols {
        return None;
    }

    let mut xtx = vec![vec![Decimal::ZERO; cols]; cols];
    for i in 0..cols {
        for j in 0..cols {
            xtx[i][j] = dot(x.iter().map(|row| (row[i], row[j])))?;
        }
    }
    let xty = (0..cols)
        .map(|i| dot(x.iter().zip(y).map(|(row, v)| (row[i], *v))))
        .collect::<Option<Vec<Decimal>>>()?;
    let inverse = mat_inverse(&xtx)?;
    let coefficients = inverse
        .iter()
        .map(|row| dot(row.iter().copied().zip(xty.iter().copied())))
        .collect::<Option<Vec<Decimal>>>()?;

    let y_mean = mean(y);
    let mut ss_res = Decimal::ZERO;
    let mut ss_tot = Decimal::ZERO;
    for (row, v) in x.iter().zip(y) {
        let fitted = dot(row.iter().copied().zip(coefficients.iter().copied()))?;
        let e = v.checked_sub(fitted)?;
        ss_res = ss_res.checked_add(e.checked_mul(e)?)?;
        let d = v.checked_sub(y_mean)?;
        ss_tot = ss_tot.checked_add(d.checked_mul(d)?)?;
    }

    let dof = Decimal::from((n - cols) as u64);
    let r_squared = if ss_tot.is_zero() {
        Decimal::ONE
    } else {
        Decimal::ONE - ss_res.checked_div(ss_tot)?
    };
    let adjusted_r_squared = if ss_tot.is_zero() {
        r_squared
    } else {
        let scale = Decimal::from((n - 1) as u64).checked_div(dof)?;
        Decimal::ONE - (Decimal::ONE - r_squared).checked_mul(scale)?
    };
    let sigma_sq = ss_res / dof;
    let standard_errors = (0..cols)
        .map(|j| sigma_sq.checked_mul(inverse[j][j]).map(sqrt_decimal))
        .collect::<Option<Vec<Decimal>>>()?;

    Some(OlsFit {
        coefficients,
        standard_errors,
        r_squared,
        adjusted_r_squared,
        residual_std_error: sqrt_decimal(sigma_sq),
    })
}

fn t_stat(value: Decimal, standard_error: Decimal) -> Decimal {
    value.checked_div(standard_error).unwrap_or(Decimal::ZERO)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Regress `returns` on the named factors over the periods every series
/// shares.
pub fn regress(
    subject: &str,
    model: FactorModel,
    returns: &FactorSeries,
    factors: &[(&str, &FactorSeries)],
) -> AttributionResult<FactorRegression> {
    let dates: Vec<NaiveDate> = returns
        .keys()
        .filter(|d| factors.iter().all(|(_, f)| f.contains_key(d)))
        .copied()
        .collect();
    let required = MIN_OBSERVATIONS.max(factors.len() + 2);
    if dates.len() < required {
        return Err(AttributionError::InsufficientData(format!(
            "{}: {} periods shared by the returns and factors, regression needs {}",
            subject,
            dates.len(),
            required
        )));
    }

    let y: Vec<Decimal> = dates.iter().map(|d| returns[d]).collect();
    let x: Vec<Vec<Decimal>> = dates
        .iter()
        .map(|d| {
            let mut row = Vec::with_capacity(factors.len() + 1);
            row.push(Decimal::ONE);
            row.extend(factors.iter().map(|(_, f)| f[d]));
            row
        })
        .collect();
    let fit = ols(&x, &y).ok_or_else(|| AttributionError::InvalidInput {
        field: "factors".into(),
        reason: format!("{subject}: factor design matrix is singular or overflows"),
    })?;

    let loadings = factors
        .iter()
        .enumerate()
        .map(|(j, (name, _))| FactorLoading {
            factor: name.to_string(),
            beta: fit.coefficients[j + 1],
            standard_error: fit.standard_errors[j + 1],
            t_stat: t_stat(fit.coefficients[j + 1], fit.standard_errors[j + 1]),
        })
        .collect();

    Ok(FactorRegression {
        subject: subject.to_string(),
        model,
        observations: dates.len() as u32,
        alpha: fit.coefficients[0],
        alpha_t_stat: t_stat(fit.coefficients[0], fit.standard_errors[0]),
        loadings,
        r_squared: fit.r_squared,
        adjusted_r_squared: fit.adjusted_r_squared,
        residual_std_error: fit.residual_std_error,
    })
}

fn market_commodity_momentum(
    subject: &str,
    returns: &FactorSeries,
    market: &FactorSeries,
    commodity: &FactorSeries,
) -> AttributionResult<FactorRegression> {
    let momentum = momentum_factor(returns);
    regress(
        subject,
        FactorModel::MarketCommodityMomentum,
        returns,
        &[("MKT", market), ("COMM", commodity), ("MOM", &momentum)],
    )
}

/// Factor regressions of the weighted portfolio return series and of each
/// sector's return series, plus a Fama-French style MKT/SMB/HML regression
/// of the portfolio when company rows are available.
pub fn analyze_factors(
    records: &[SectorRecord],
    market: &MarketData,
) -> AttributionResult<ComputationOutput<FactorAnalysisOutput>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    if records.is_empty() {
        return Err(AttributionError::InsufficientData(
            "No sector records for factor analysis".into(),
        ));
    }
    if market.market_index.is_empty() {
        return Err(AttributionError::InvalidInput {
            field: "market_index".into(),
            reason: "A market index series is required for the market factor".into(),
        });
    }
    let mkt = market_factor(&market.market_index);
    let comm = commodity_factor(&market.commodities);
    if comm.is_empty() {
        return Err(AttributionError::InvalidInput {
            field: "commodities".into(),
            reason: format!(
                "At least two prices of one of {} are required for the commodity factor",
                COMMODITY_WEIGHTS.map(|(name, _)| name).join(", ")
            ),
        });
    }

    let portfolio_returns: FactorSeries = period_returns(records)?
        .into_iter()
        .map(|p| (p.date, p.portfolio_return))
        .collect();
    let portfolio = market_commodity_momentum("Portfolio", &portfolio_returns, &mkt, &comm)?;
    if portfolio.observations < 36 {
        warnings.push(format!(
            "Only {} observations, fewer than the 36 recommended for stable loadings",
            portfolio.observations
        ));
    }

    let fama_french = if market.companies.is_empty() {
        warnings.push("No company rows; size factor and Fama-French regression skipped".into());
        None
    } else {
        let smb = smb_factor(&market.companies);
        let hml = hml_factor(records);
        match regress(
            "Portfolio",
            FactorModel::FamaFrench,
            &portfolio_returns,
            &[("MKT", &mkt), ("SMB", &smb), ("HML", &hml)],
        ) {
            Ok(r) => Some(r),
            Err(e) => {
                warnings.push(format!("Fama-French regression skipped: {e}"));
                None
            }
        }
    };

    let mut sectors = Vec::new();
    for (sector, series) in sector_series(records) {
        match market_commodity_momentum(sector.name(), &series, &mkt, &comm) {
            Ok(r) => sectors.push(r),
            Err(e) => warnings.push(format!("Sector '{sector}' regression skipped: {e}")),
        }
    }

    tracing::debug!(
        observations = portfolio.observations,
        alpha = %portfolio.alpha,
        r_squared = %portfolio.r_squared,
        sectors = sectors.len(),
        "factor regressions complete"
    );

    let output = FactorAnalysisOutput {
        portfolio,
        fama_french,
        sectors,
    };
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "OLS multi-factor regression of portfolio and sector returns (normal equations)",
        &serde_json::json!({
            "market_factor": "monthly return of the market index",
            "commodity_factor": COMMODITY_WEIGHTS
                .iter()
                .map(|(name, w)| (name.to_string(), w.to_string()))
                .collect::<BTreeMap<String, String>>(),
            "momentum_factor": "mean of the previous 3 period returns",
            "smb_factor": "small minus big companies, split at the median asset value",
            "hml_factor": "top 3 minus bottom 3 sector returns per period",
            "min_observations": MIN_OBSERVATIONS,
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MARKET: [Decimal; 12] = [
        dec!(0.04), dec!(-0.02), dec!(0.03), dec!(0.01), dec!(-0.01), dec!(0.05),
        dec!(0.02), dec!(-0.04), dec!(0.06), dec!(0.01), dec!(-0.03), dec!(0.04),
    ];
    const GOLD: [Decimal; 12] = [
        dec!(0.01), dec!(-0.03), dec!(0.02), dec!(0.05), dec!(-0.01), dec!(0.00),
        dec!(0.03), dec!(-0.02), dec!(0.01), dec!(0.04), dec!(-0.05), dec!(0.02),
    ];

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        crate::data::month_ends(start, NaiveDate::from_ymd_opt(2030, 12, 31).unwrap())
            .into_iter()
            .take(n)
            .collect()
    }

    fn market_return(i: usize) -> Decimal {
        MARKET[i % 12] + Decimal::new(i as i64 * 5, 4)
    }

    /// Index, Gold prices and a single-sector portfolio built as
    /// 0.002 + 1.5 MKT + 0.8 COMM + noise.
    fn fixture(n: usize) -> (Vec<SectorRecord>, MarketData) {
        let dates = dates(n);
        let mut market = MarketData::default();
        let mut records = Vec::new();
        let mut level = dec!(100);
        let mut gold = dec!(1000);
        for (i, &date) in dates.iter().enumerate() {
            let mkt = market_return(i);
            level *= Decimal::ONE + mkt;
            market.market_index.push(IndexLevel {
                date,
                level,
                monthly_return: mkt,
            });
            let g = if i == 0 { Decimal::ZERO } else { GOLD[i % 12] };
            gold *= Decimal::ONE + g;
            market.commodities.push(CommodityPrice {
                date,
                commodity: "Gold".into(),
                price: gold,
                unit: "troy_oz".into(),
            });
            let noise = [dec!(0.001), dec!(-0.001), Decimal::ZERO][i % 3];
            records.push(SectorRecord {
                sector: Sector::Mining,
                date,
                portfolio_weight: Decimal::ONE,
                portfolio_return: dec!(0.002) + dec!(1.5) * mkt + dec!(0.8) * dec!(0.35) * g + noise,
                benchmark_weight: Decimal::ONE,
                benchmark_return: mkt,
            });
        }
        (records, market)
    }

    fn series(values: &[(u32, Decimal)]) -> FactorSeries {
        values
            .iter()
            .map(|(m, v)| (NaiveDate::from_ymd_opt(2024, *m, 28).unwrap(), *v))
            .collect()
    }

    #[test]
    fn test_commodity_factor_weights_price_changes() {
        let d1 = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let price = |date, commodity: &str, price| CommodityPrice {
            date,
            commodity: commodity.into(),
            price,
            unit: "ton".into(),
        };
        let prices = vec![
            price(d2, "Gold", dec!(110)),
            price(d1, "Gold", dec!(100)),
            price(d1, "Platinum", dec!(50)),
            price(d2, "Platinum", dec!(45)),
            price(d1, "Copper", dec!(10)),
            price(d2, "Copper", dec!(20)),
        ];
        let factor = commodity_factor(&prices);
        assert_eq!(factor.len(), 1);
        // 0.35 * 0.10 + 0.30 * -0.10
        assert_eq!(factor[&d2], dec!(0.005));
    }

    #[test]
    fn test_momentum_uses_previous_three_periods() {
        let returns = series(&[(1, dec!(0.01)), (2, dec!(0.02)), (3, dec!(0.06)), (4, dec!(0.5)), (5, dec!(0))]);
        let mom = momentum_factor(&returns);
        assert_eq!(mom.len(), 2);
        let april = NaiveDate::from_ymd_opt(2024, 4, 28).unwrap();
        let may = NaiveDate::from_ymd_opt(2024, 5, 28).unwrap();
        assert_eq!(mom[&april], dec!(0.03));
        assert_eq!(mom[&may], dec!(0.58) / dec!(3));
    }

    #[test]
    fn test_hml_top_minus_bottom_three() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let records: Vec<SectorRecord> = Sector::ALL[..6]
            .iter()
            .enumerate()
            .map(|(i, s)| SectorRecord {
                sector: *s,
                date,
                portfolio_weight: dec!(0.1),
                portfolio_return: Decimal::new(i as i64 + 1, 2),
                benchmark_weight: dec!(0.1),
                benchmark_return: Decimal::ZERO,
            })
            .collect();
        // mean(0.04, 0.05, 0.06) - mean(0.01, 0.02, 0.03)
        assert_eq!(hml_factor(&records)[&date], dec!(0.03));
    }

    #[test]
    fn test_smb_splits_at_median_asset_value() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let company = |name: &str, r, value| CompanyRecord {
            date,
            sector: Sector::Ict,
            company: name.into(),
            monthly_return: r,
            asset_value: value,
        };
        let companies = vec![
            company("a", dec!(0.04), dec!(100)),
            company("b", dec!(0.02), dec!(200)),
            company("c", dec!(0.01), dec!(300)),
            company("d", dec!(-0.01), dec!(400)),
        ];
        // median 250: small {0.04, 0.02}, big {0.01, -0.01}
        assert_eq!(smb_factor(&companies)[&date], dec!(0.03));
        assert!(smb_factor(&[]).is_empty());
    }

    #[test]
    fn test_regression_recovers_loadings() {
        let (records, market) = fixture(36);
        let out = analyze_factors(&records, &market).unwrap();
        let p = &out.result.portfolio;
        assert_eq!(p.model, FactorModel::MarketCommodityMomentum);
        // commodity changes start in month 2, momentum in month 4
        assert_eq!(p.observations, 33);
        let mkt = p.beta("MKT").unwrap();
        let comm = p.beta("COMM").unwrap();
        assert!((mkt - dec!(1.5)).abs() < dec!(0.05), "market beta {mkt}");
        assert!((comm - dec!(0.8)).abs() < dec!(0.1), "commodity beta {comm}");
        assert!(p.r_squared > dec!(0.99));
        assert!(p.adjusted_r_squared <= p.r_squared);
        assert!(p.loadings[0].t_stat > dec!(10));
        assert_eq!(out.result.sectors.len(), 1);
        assert_eq!(out.result.sectors[0].subject, "Mining");
    }

    #[test]
    fn test_without_companies_fama_french_skipped() {
        let (records, market) = fixture(24);
        let out = analyze_factors(&records, &market).unwrap();
        assert!(out.result.fama_french.is_none());
        assert!(out.warnings.iter().any(|w| w.contains("Fama-French")));
        assert!(out.warnings.iter().any(|w| w.contains("fewer than the 36")));
    }

    #[test]
    fn test_too_few_shared_periods() {
        let (records, market) = fixture(14);
        // 14 months leave 11 usable rows
        match analyze_factors(&records, &market) {
            Err(AttributionError::InsufficientData(msg)) => assert!(msg.contains("Portfolio"), "{msg}"),
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }

    #[test]
    fn test_constant_factor_is_singular() {
        let (records, mut market) = fixture(24);
        for level in &mut market.market_index {
            level.monthly_return = Decimal::ZERO;
        }
        assert!(matches!(
            analyze_factors(&records, &market),
            Err(AttributionError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_market_series_required() {
        let (records, mut market) = fixture(24);
        market.market_index.clear();
        assert!(matches!(
            analyze_factors(&records, &market),
            Err(AttributionError::InvalidInput { field, .. }) if field == "market_index"
        ));
    }
}
