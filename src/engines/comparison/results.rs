use crate::error::{CalibrationError, Result};
use crate::types::{EndUse, FuelType};
use crate::units::round_to;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Simulated annual use per fuel and end use, MBtu
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResults {
    pub by_fuel: BTreeMap<FuelType, BTreeMap<EndUse, f64>>,
}

impl SimulationResults {
    pub fn get(&self, fuel: FuelType, end_use: EndUse) -> Option<f64> {
        self.by_fuel.get(&fuel).and_then(|m| m.get(&end_use)).copied()
    }

    pub fn fuel_total(&self, fuel: FuelType) -> f64 {
        self.by_fuel
            .get(&fuel)
            .map(|m| m.values().sum())
            .unwrap_or(0.0)
    }

    pub fn load<P: AsRef<Path>>(path: P, electricity_heats: bool) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CalibrationError::ResultsFormat(format!(
                "Cannot read annual results {}: {}",
                path.display(),
                e
            ))
        })?;
        let json: serde_json::Value = serde_json::from_str(&contents)?;
        Self::from_json(&json, electricity_heats)
    }

    /// Parse an annual results document.
    ///
    /// `"End Use"` keys look like `"Natural Gas: Heating"`. Anything that is not heating or
    /// cooling counts as baseload. Electric heating end uses (fans, pumps) are dropped when
    /// electricity does not heat the building.
    pub fn from_json(json: &serde_json::Value, electricity_heats: bool) -> Result<Self> {
        if json.get("Time").is_some() {
            return Err(CalibrationError::ResultsFormat(
                "Results are a time series, not an annual results file".to_string(),
            ));
        }
        let end_uses = json
            .get("End Use")
            .and_then(|v| v.as_object())
            .ok_or_else(|| {
                CalibrationError::ResultsFormat("Results have no 'End Use' mapping".to_string())
            })?;

        let mut by_fuel: BTreeMap<FuelType, BTreeMap<EndUse, f64>> = BTreeMap::new();
        for (key, value) in end_uses {
            let (fuel_name, end_use_name) = key.split_once(':').ok_or_else(|| {
                CalibrationError::ResultsFormat(format!("Malformed end use key '{}'", key))
            })?;
            let fuel: FuelType = fuel_name.parse().map_err(|_| {
                CalibrationError::ResultsFormat(format!("Unknown fuel in end use '{}'", key))
            })?;
            let consumption = value.as_f64().ok_or_else(|| {
                CalibrationError::ResultsFormat(format!("End use '{}' is not a number", key))
            })?;

            let end_use = if end_use_name.contains("Heating") {
                EndUse::Heating
            } else if end_use_name.contains("Cooling") {
                EndUse::Cooling
            } else {
                EndUse::Baseload
            };
            if fuel == FuelType::Electricity && end_use == EndUse::Heating && !electricity_heats {
                continue;
            }

            let slot = by_fuel.entry(fuel).or_default().entry(end_use).or_insert(0.0);
            *slot = round_to(*slot + consumption, 3);
        }

        Ok(Self { by_fuel })
    }
}
