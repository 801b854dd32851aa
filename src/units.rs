use crate::error::{CalibrationError, Result};
use crate::types::{EnergyUnit, FuelType};

pub const BTU_PER_KWH: f64 = 3412.14;
pub const BTU_PER_MBTU: f64 = 1_000_000.0;
pub const BTU_PER_THERM: f64 = 100_000.0;
pub const BTU_PER_CCF: f64 = 103_700.0;
pub const BTU_PER_KCF: f64 = 1_037_000.0;
pub const BTU_PER_GAL_FUEL_OIL: f64 = 139_000.0;
pub const BTU_PER_GAL_PROPANE: f64 = 91_600.0;
pub const BTU_PER_CORD: f64 = 20_000_000.0;

/// Convert a bill quantity into Btu
pub fn to_btu(value: f64, unit: EnergyUnit, fuel: FuelType) -> Result<f64> {
    let factor = match unit {
        EnergyUnit::Kwh => BTU_PER_KWH,
        EnergyUnit::Mwh => BTU_PER_KWH * 1000.0,
        EnergyUnit::Therms => BTU_PER_THERM,
        EnergyUnit::Btu => 1.0,
        EnergyUnit::KBtu => 1000.0,
        EnergyUnit::MBtu => BTU_PER_MBTU,
        EnergyUnit::Ccf => BTU_PER_CCF,
        EnergyUnit::Kcf | EnergyUnit::Mcf => BTU_PER_KCF,
        EnergyUnit::Gallons => match fuel {
            FuelType::FuelOil => BTU_PER_GAL_FUEL_OIL,
            FuelType::Propane => BTU_PER_GAL_PROPANE,
            other => {
                return Err(CalibrationError::BillData(format!(
                    "Gallons are not a valid unit for {}",
                    other
                )))
            }
        },
        EnergyUnit::Cords => BTU_PER_CORD,
    };
    Ok(value * factor)
}

pub fn btu_to_mbtu(btu: f64) -> f64 {
    btu / BTU_PER_MBTU
}

pub fn mbtu_to_kwh(mbtu: f64) -> f64 {
    mbtu * BTU_PER_MBTU / BTU_PER_KWH
}

pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
