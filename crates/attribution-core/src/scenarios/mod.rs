pub mod monte_carlo;
pub mod scenario;

pub use monte_carlo::{run_monte_carlo, MonteCarloInput, MonteCarloOutput};
pub use scenario::{run_scenario, sector_beta, Scenario, ScenarioOutput};
