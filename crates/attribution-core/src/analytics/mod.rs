pub mod factors;
pub mod returns;
pub mod rolling;
pub mod seasonal;
pub mod stationarity;

pub use factors::{analyze_factors, FactorAnalysisOutput, FactorModel, FactorRegression};
pub use returns::{analyze_risk, period_returns, return_statistics, PeriodReturn, ReturnStatistics};
pub use rolling::rolling_performance;
pub use seasonal::{decompose_returns, seasonal_decompose, SEASONAL_PERIOD};
pub use stationarity::{dickey_fuller, analyze_stationarity};
