pub mod traits;
pub mod genetic_algorithm;
pub mod acceptance;
pub mod bill_criteria;
pub mod value_choices;
pub mod simulation;
pub mod manager;

pub use manager::{CalibrationConfig, ConfigManager};
pub use genetic_algorithm::GeneticAlgorithmConfig;
pub use acceptance::{AcceptanceCriteriaConfig, FuelThresholds};
pub use bill_criteria::UtilityBillCriteriaConfig;
pub use value_choices::ValueChoicesConfig;
pub use simulation::SimulationConfig;
pub use traits::ConfigSection;
