use super::delivered::{simplified_annual_usage, DeliveredFuelInputs};
use super::engine::{compare, Comparison};
use super::results::SimulationResults;
use crate::error::Result;
use crate::types::{DisaggregatedUsage, FuelType};
use std::collections::BTreeMap;
use std::path::Path;

/// Bill-derived reference every evaluation is scored against.
///
/// Built once per run and shared read-only between workers.
#[derive(Debug, Clone, Default)]
pub struct ComparisonOracle {
    /// Regression fuels: weather-normalised annual use, MBtu
    normalized: BTreeMap<FuelType, DisaggregatedUsage>,
    /// Delivered or under-billed fuels
    delivered: Vec<DeliveredFuelInputs>,
    electricity_heats: bool,
}

impl ComparisonOracle {
    pub fn new(
        normalized: BTreeMap<FuelType, DisaggregatedUsage>,
        delivered: Vec<DeliveredFuelInputs>,
        electricity_heats: bool,
    ) -> Self {
        Self {
            normalized,
            delivered,
            electricity_heats,
        }
    }

    pub fn normalized(&self) -> &BTreeMap<FuelType, DisaggregatedUsage> {
        &self.normalized
    }

    pub fn delivered(&self) -> &[DeliveredFuelInputs] {
        &self.delivered
    }

    pub fn fuels(&self) -> Vec<FuelType> {
        let mut fuels: Vec<FuelType> = self
            .normalized
            .keys()
            .copied()
            .chain(self.delivered.iter().map(|d| d.fuel))
            .collect();
        fuels.sort();
        fuels.dedup();
        fuels
    }

    pub fn load_results<P: AsRef<Path>>(&self, path: P) -> Result<SimulationResults> {
        SimulationResults::load(path, self.electricity_heats)
    }

    /// Merged comparison: regression fuels first, then the ratio-method fuels
    pub fn compare(&self, simulated: &SimulationResults) -> Result<Comparison> {
        let mut comparison = compare(&self.normalized, simulated);
        for inputs in &self.delivered {
            let result = simplified_annual_usage(inputs, simulated)?;
            if !result.is_empty() {
                comparison.insert(inputs.fuel, result);
            }
        }
        Ok(comparison)
    }
}
