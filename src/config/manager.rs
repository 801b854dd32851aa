use super::{
    acceptance::AcceptanceCriteriaConfig,
    bill_criteria::UtilityBillCriteriaConfig,
    genetic_algorithm::GeneticAlgorithmConfig,
    simulation::SimulationConfig,
    traits::ConfigSection,
    value_choices::ValueChoicesConfig,
};
use crate::error::CalibrationError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

pub const ENV_PREFIX: &str = "CALIBRATION";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub genetic_algorithm: GeneticAlgorithmConfig,
    pub acceptance_criteria: AcceptanceCriteriaConfig,
    pub utility_bill_criteria: UtilityBillCriteriaConfig,
    pub value_choices: ValueChoicesConfig,
    pub simulation: SimulationConfig,
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<(), CalibrationError> {
        self.genetic_algorithm.validate()?;
        self.acceptance_criteria.validate()?;
        self.utility_bill_criteria.validate()?;
        self.value_choices.validate()?;
        self.simulation.validate()?;
        Ok(())
    }

    /// Read a TOML or JSON file (by extension), then apply `CALIBRATION_*` environment overrides.
    ///
    /// Nested keys use a double underscore, e.g. `CALIBRATION_GENETIC_ALGORITHM__GENERATIONS=30`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CalibrationError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CalibrationError::Configuration(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let config: CalibrationConfig = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<CalibrationConfig>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(CalibrationConfig::default())),
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CalibrationError> {
        let config = CalibrationConfig::from_file(path)?;
        *self.write_lock()? = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CalibrationError> {
        let config = self.get()?;
        let toml_str = toml::to_string_pretty(&config)
            .map_err(|e| CalibrationError::Configuration(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, toml_str).map_err(|e| {
            CalibrationError::Configuration(format!("Failed to write config: {}", e))
        })?;

        Ok(())
    }

    pub fn get(&self) -> Result<CalibrationConfig, CalibrationError> {
        self.config
            .read()
            .map(|c| c.clone())
            .map_err(|_| CalibrationError::Configuration("Config lock poisoned".to_string()))
    }

    /// Apply `f` and keep the result only if it still validates
    pub fn update<F>(&self, f: F) -> Result<(), CalibrationError>
    where
        F: FnOnce(&mut CalibrationConfig),
    {
        let mut config = self.write_lock()?;
        let mut candidate = config.clone();
        f(&mut candidate);
        candidate.validate()?;
        *config = candidate;
        Ok(())
    }

    fn write_lock(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, CalibrationConfig>, CalibrationError> {
        self.config
            .write()
            .map_err(|_| CalibrationError::Configuration("Config lock poisoned".to_string()))
    }
}
