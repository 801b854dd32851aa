pub mod results;
pub mod engine;
pub mod delivered;
pub mod oracle;

pub use results::SimulationResults;
pub use engine::{bias_error, compare, Comparison, FuelComparison};
pub use delivered::{simplified_annual_usage, DeliveredFuelInputs};
pub use oracle::ComparisonOracle;
