pub mod brinson;

pub use brinson::{brinson_attribution, sector_effects, AttributionOutput, AttributionRequest};
