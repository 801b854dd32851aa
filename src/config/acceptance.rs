use super::traits::ConfigSection;
use crate::error::CalibrationError;
use crate::types::FuelType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-fuel override of the global thresholds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuelThresholds {
    pub bias_error_threshold: Option<f64>,
    pub abs_error_threshold: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptanceCriteriaConfig {
    /// Percent
    pub bias_error_threshold: f64,
    /// kWh
    pub abs_error_elec_threshold: f64,
    /// MMBtu
    pub abs_error_fuel_threshold: f64,
    /// Fraction, e.g. 0.20 for BPI-2400
    pub bill_regression_max_cvrmse: Option<f64>,
    /// Keyed by fuel name, e.g. "natural gas"
    pub per_fuel: BTreeMap<String, FuelThresholds>,
}

impl Default for AcceptanceCriteriaConfig {
    fn default() -> Self {
        Self {
            bias_error_threshold: 5.0,
            abs_error_elec_threshold: 500.0,
            abs_error_fuel_threshold: 5.0,
            bill_regression_max_cvrmse: None,
            per_fuel: BTreeMap::new(),
        }
    }
}

impl AcceptanceCriteriaConfig {
    fn overrides_for(&self, fuel: FuelType) -> Option<&FuelThresholds> {
        self.per_fuel
            .get(fuel.as_str())
            .or_else(|| self.per_fuel.get(fuel.key()))
    }

    pub fn bias_threshold_for(&self, fuel: FuelType) -> f64 {
        self.overrides_for(fuel)
            .and_then(|t| t.bias_error_threshold)
            .unwrap_or(self.bias_error_threshold)
    }

    /// Electricity thresholds are in kWh, all other fuels in MMBtu
    pub fn abs_threshold_for(&self, fuel: FuelType) -> f64 {
        let global = if fuel == FuelType::Electricity {
            self.abs_error_elec_threshold
        } else {
            self.abs_error_fuel_threshold
        };
        self.overrides_for(fuel)
            .and_then(|t| t.abs_error_threshold)
            .unwrap_or(global)
    }
}

impl ConfigSection for AcceptanceCriteriaConfig {
    fn section_name() -> &'static str {
        "acceptance_criteria"
    }

    fn validate(&self) -> Result<(), CalibrationError> {
        let globals = [
            ("bias_error_threshold", self.bias_error_threshold),
            ("abs_error_elec_threshold", self.abs_error_elec_threshold),
            ("abs_error_fuel_threshold", self.abs_error_fuel_threshold),
        ];
        for (name, value) in globals {
            if !(value >= 0.0) {
                return Err(CalibrationError::Configuration(format!(
                    "{} must be non-negative, got {}",
                    name, value
                )));
            }
        }
        if let Some(cvrmse) = self.bill_regression_max_cvrmse {
            if !(cvrmse > 0.0) {
                return Err(CalibrationError::Configuration(
                    "bill_regression_max_cvrmse must be positive".to_string(),
                ));
            }
        }
        for (fuel, overrides) in &self.per_fuel {
            fuel.parse::<FuelType>().map_err(|_| {
                CalibrationError::Configuration(format!("Unknown fuel in per_fuel: '{}'", fuel))
            })?;
            let values = [overrides.bias_error_threshold, overrides.abs_error_threshold];
            if values.iter().flatten().any(|v| !(*v >= 0.0)) {
                return Err(CalibrationError::Configuration(format!(
                    "Thresholds for {} must be non-negative",
                    fuel
                )));
            }
        }
        Ok(())
    }
}
