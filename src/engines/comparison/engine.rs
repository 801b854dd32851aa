use super::results::SimulationResults;
use crate::types::{DisaggregatedUsage, EndUse, FuelType};
use crate::units::{mbtu_to_kwh, round_to};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Errors for one fuel. Electricity values are in kWh, other fuels in MMBtu.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuelComparison {
    /// Percent; NaN when the bill-derived use is zero (incomparable)
    #[serde(rename = "Bias Error")]
    pub bias_error: BTreeMap<EndUse, f64>,
    #[serde(rename = "Absolute Error")]
    pub absolute_error: BTreeMap<EndUse, f64>,
}

impl FuelComparison {
    pub fn is_empty(&self) -> bool {
        self.absolute_error.is_empty()
    }

    pub fn insert(&mut self, end_use: EndUse, normalized: f64, simulated: f64) {
        self.bias_error
            .insert(end_use, bias_error(normalized, simulated));
        self.absolute_error
            .insert(end_use, round_to((normalized - simulated).abs(), 1));
    }
}

pub type Comparison = BTreeMap<FuelType, FuelComparison>;

/// `(normalized - simulated) / normalized * 100` to 0.1, NaN when `normalized` is zero
pub fn bias_error(normalized: f64, simulated: f64) -> f64 {
    if normalized == 0.0 {
        f64::NAN
    } else {
        round_to((normalized - simulated) / normalized * 100.0, 1)
    }
}

/// Compare weather-normalised annual use (MBtu) with simulated annual use (MBtu).
///
/// Only end uses the simulation reports as non-zero are compared. Fuels with nothing
/// to compare are left out.
pub fn compare(
    normalized: &BTreeMap<FuelType, DisaggregatedUsage>,
    simulated: &SimulationResults,
) -> Comparison {
    let mut comparison = Comparison::new();

    for (fuel, usage) in normalized {
        let mut result = FuelComparison::default();
        for end_use in EndUse::all() {
            let Some(sim) = simulated.get(*fuel, end_use).filter(|v| *v != 0.0) else {
                continue;
            };
            let mut norm = round_to(usage.get(end_use), 1);
            let mut sim = sim;
            if *fuel == FuelType::Electricity {
                norm = mbtu_to_kwh(norm);
                sim = mbtu_to_kwh(sim);
            }
            result.insert(end_use, norm, sim);
        }
        if !result.is_empty() {
            comparison.insert(*fuel, result);
        }
    }

    comparison
}
