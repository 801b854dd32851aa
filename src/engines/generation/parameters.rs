use crate::types::{EndUse, FuelType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of genes in a calibration genome
pub const GENE_COUNT: usize = 18;

/// Model inputs adjusted by the search, in gene order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationParameter {
    MiscLoadMultiplier,
    HeatingSetpointOffset,
    CoolingSetpointOffset,
    AirLeakageMultiplier,
    HeatingEfficiencyMultiplier,
    CoolingEfficiencyMultiplier,
    RoofRValueMultiplier,
    CeilingRValueMultiplier,
    AboveGroundWallsRValueMultiplier,
    BelowGroundWallsRValueMultiplier,
    SlabRValueMultiplier,
    FloorRValueMultiplier,
    WaterHeaterEfficiencyMultiplier,
    WaterFixturesUsageMultiplier,
    WindowUFactorMultiplier,
    WindowShgcMultiplier,
    ApplianceUsageMultiplier,
    LightingLoadMultiplier,
}

use CalibrationParameter::*;

const ALL: [CalibrationParameter; GENE_COUNT] = [
    MiscLoadMultiplier,
    HeatingSetpointOffset,
    CoolingSetpointOffset,
    AirLeakageMultiplier,
    HeatingEfficiencyMultiplier,
    CoolingEfficiencyMultiplier,
    RoofRValueMultiplier,
    CeilingRValueMultiplier,
    AboveGroundWallsRValueMultiplier,
    BelowGroundWallsRValueMultiplier,
    SlabRValueMultiplier,
    FloorRValueMultiplier,
    WaterHeaterEfficiencyMultiplier,
    WaterFixturesUsageMultiplier,
    WindowUFactorMultiplier,
    WindowShgcMultiplier,
    ApplianceUsageMultiplier,
    LightingLoadMultiplier,
];

const HEATING_GENES: &[CalibrationParameter] = &[
    HeatingSetpointOffset,
    AirLeakageMultiplier,
    HeatingEfficiencyMultiplier,
    RoofRValueMultiplier,
    CeilingRValueMultiplier,
    AboveGroundWallsRValueMultiplier,
    SlabRValueMultiplier,
    WindowUFactorMultiplier,
    WindowShgcMultiplier,
];

const COOLING_GENES: &[CalibrationParameter] = &[
    CoolingSetpointOffset,
    AirLeakageMultiplier,
    CoolingEfficiencyMultiplier,
    RoofRValueMultiplier,
    CeilingRValueMultiplier,
    AboveGroundWallsRValueMultiplier,
    SlabRValueMultiplier,
    WindowUFactorMultiplier,
    WindowShgcMultiplier,
];

const ELECTRIC_BASELOAD_GENES: &[CalibrationParameter] = &[
    MiscLoadMultiplier,
    ApplianceUsageMultiplier,
    LightingLoadMultiplier,
];

const FUEL_BASELOAD_GENES: &[CalibrationParameter] = &[
    WaterHeaterEfficiencyMultiplier,
    WaterFixturesUsageMultiplier,
];

impl CalibrationParameter {
    pub fn all() -> &'static [CalibrationParameter; GENE_COUNT] {
        &ALL
    }

    /// Position of this parameter in a genome
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        ALL.get(index).copied()
    }

    /// Argument name handed to the model-modification measure
    pub fn name(&self) -> &'static str {
        match self {
            MiscLoadMultiplier => "misc_load_multiplier",
            HeatingSetpointOffset => "heating_setpoint_offset",
            CoolingSetpointOffset => "cooling_setpoint_offset",
            AirLeakageMultiplier => "air_leakage_multiplier",
            HeatingEfficiencyMultiplier => "heating_efficiency_multiplier",
            CoolingEfficiencyMultiplier => "cooling_efficiency_multiplier",
            RoofRValueMultiplier => "roof_r_value_multiplier",
            CeilingRValueMultiplier => "ceiling_r_value_multiplier",
            AboveGroundWallsRValueMultiplier => "above_ground_walls_r_value_multiplier",
            BelowGroundWallsRValueMultiplier => "below_ground_walls_r_value_multiplier",
            SlabRValueMultiplier => "slab_r_value_multiplier",
            FloorRValueMultiplier => "floor_r_value_multiplier",
            WaterHeaterEfficiencyMultiplier => "water_heater_efficiency_multiplier",
            WaterFixturesUsageMultiplier => "water_fixtures_usage_multiplier",
            WindowUFactorMultiplier => "window_u_factor_multiplier",
            WindowShgcMultiplier => "window_shgc_multiplier",
            ApplianceUsageMultiplier => "appliance_usage_multiplier",
            LightingLoadMultiplier => "lighting_load_multiplier",
        }
    }

    /// Setpoint offsets are additive (°F); everything else scales a model input
    pub fn is_offset(&self) -> bool {
        matches!(self, HeatingSetpointOffset | CoolingSetpointOffset)
    }

    /// Value that leaves the model unchanged
    pub fn neutral_value(&self) -> f64 {
        if self.is_offset() {
            0.0
        } else {
            1.0
        }
    }
}

impl fmt::Display for CalibrationParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Genes that plausibly move the simulated use of one fuel / end use.
pub fn impacted_parameters(fuel: FuelType, end_use: EndUse) -> &'static [CalibrationParameter] {
    match end_use {
        EndUse::Heating => HEATING_GENES,
        EndUse::Cooling => COOLING_GENES,
        EndUse::Baseload if fuel == FuelType::Electricity => ELECTRIC_BASELOAD_GENES,
        EndUse::Baseload => FUEL_BASELOAD_GENES,
    }
}
