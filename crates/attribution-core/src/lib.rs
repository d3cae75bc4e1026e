pub mod config;
pub mod data;
pub mod error;
pub mod types;

#[cfg(feature = "attribution")]
pub mod attribution;

#[cfg(feature = "analytics")]
pub mod analytics;

#[cfg(feature = "scenarios")]
pub mod scenarios;

#[cfg(feature = "validation")]
pub mod validation;

#[cfg(feature = "reporting")]
pub mod report;

pub use error::AttributionError;
pub use types::*;

/// Standard result type for all attribution operations
pub type AttributionResult<T> = Result<T, AttributionError>;
