use super::traits::ConfigSection;
use crate::error::CalibrationError;
use serde::{Deserialize, Serialize};

/// Discrete values each calibration gene may take
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueChoicesConfig {
    pub misc_load_multiplier_choices: Vec<f64>,
    /// Degrees F added to the heating setpoint
    pub heating_setpoint_choices: Vec<f64>,
    /// Degrees F added to the cooling setpoint
    pub cooling_setpoint_choices: Vec<f64>,
    pub air_leakage_multiplier_choices: Vec<f64>,
    pub heating_efficiency_multiplier_choices: Vec<f64>,
    pub cooling_efficiency_multiplier_choices: Vec<f64>,
    pub roof_r_value_multiplier_choices: Vec<f64>,
    pub ceiling_r_value_multiplier_choices: Vec<f64>,
    pub above_ground_walls_r_value_multiplier_choices: Vec<f64>,
    pub below_ground_walls_r_value_multiplier_choices: Vec<f64>,
    pub slab_r_value_multiplier_choices: Vec<f64>,
    pub floor_r_value_multiplier_choices: Vec<f64>,
    pub water_heater_efficiency_multiplier_choices: Vec<f64>,
    pub water_fixtures_usage_multiplier_choices: Vec<f64>,
    pub window_u_factor_multiplier_choices: Vec<f64>,
    pub window_shgc_multiplier_choices: Vec<f64>,
    pub appliance_usage_multiplier_choices: Vec<f64>,
    pub lighting_load_multiplier_choices: Vec<f64>,
}

fn multipliers() -> Vec<f64> {
    vec![0.6, 0.7, 0.8, 0.9, 1.0, 1.1, 1.2, 1.3, 1.4]
}

fn narrow_multipliers() -> Vec<f64> {
    vec![0.8, 0.9, 1.0, 1.1, 1.2]
}

fn setpoint_offsets() -> Vec<f64> {
    vec![-5.0, -4.0, -3.0, -2.0, -1.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0]
}

impl Default for ValueChoicesConfig {
    fn default() -> Self {
        Self {
            misc_load_multiplier_choices: multipliers(),
            heating_setpoint_choices: setpoint_offsets(),
            cooling_setpoint_choices: setpoint_offsets(),
            air_leakage_multiplier_choices: vec![0.5, 0.75, 1.0, 1.25, 1.5, 2.0],
            heating_efficiency_multiplier_choices: narrow_multipliers(),
            cooling_efficiency_multiplier_choices: narrow_multipliers(),
            roof_r_value_multiplier_choices: multipliers(),
            ceiling_r_value_multiplier_choices: multipliers(),
            above_ground_walls_r_value_multiplier_choices: multipliers(),
            below_ground_walls_r_value_multiplier_choices: multipliers(),
            slab_r_value_multiplier_choices: multipliers(),
            floor_r_value_multiplier_choices: multipliers(),
            water_heater_efficiency_multiplier_choices: narrow_multipliers(),
            water_fixtures_usage_multiplier_choices: multipliers(),
            window_u_factor_multiplier_choices: narrow_multipliers(),
            window_shgc_multiplier_choices: narrow_multipliers(),
            appliance_usage_multiplier_choices: multipliers(),
            lighting_load_multiplier_choices: multipliers(),
        }
    }
}

impl ValueChoicesConfig {
    /// Choice lists in gene order
    pub fn lists(&self) -> Vec<&[f64]> {
        vec![
            self.misc_load_multiplier_choices.as_slice(),
            self.heating_setpoint_choices.as_slice(),
            self.cooling_setpoint_choices.as_slice(),
            self.air_leakage_multiplier_choices.as_slice(),
            self.heating_efficiency_multiplier_choices.as_slice(),
            self.cooling_efficiency_multiplier_choices.as_slice(),
            self.roof_r_value_multiplier_choices.as_slice(),
            self.ceiling_r_value_multiplier_choices.as_slice(),
            self.above_ground_walls_r_value_multiplier_choices.as_slice(),
            self.below_ground_walls_r_value_multiplier_choices.as_slice(),
            self.slab_r_value_multiplier_choices.as_slice(),
            self.floor_r_value_multiplier_choices.as_slice(),
            self.water_heater_efficiency_multiplier_choices.as_slice(),
            self.water_fixtures_usage_multiplier_choices.as_slice(),
            self.window_u_factor_multiplier_choices.as_slice(),
            self.window_shgc_multiplier_choices.as_slice(),
            self.appliance_usage_multiplier_choices.as_slice(),
            self.lighting_load_multiplier_choices.as_slice(),
        ]
    }
}

fn distinct_values(list: &[f64]) -> usize {
    let mut sorted = list.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted.len()
}

impl ConfigSection for ValueChoicesConfig {
    fn section_name() -> &'static str {
        "value_choices"
    }

    fn validate(&self) -> Result<(), CalibrationError> {
        for (index, list) in self.lists().iter().enumerate() {
            if list.is_empty() {
                return Err(CalibrationError::Configuration(format!(
                    "Choice list for gene {} is empty",
                    index
                )));
            }
            if list.iter().any(|v| !v.is_finite()) {
                return Err(CalibrationError::Configuration(format!(
                    "Choice list for gene {} contains a non-finite value",
                    index
                )));
            }
            if distinct_values(list) < 2 {
                return Err(CalibrationError::Configuration(format!(
                    "Choice list for gene {} needs at least 2 distinct values",
                    index
                )));
            }
        }
        Ok(())
    }
}
