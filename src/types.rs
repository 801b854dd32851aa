use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CalibrationError;

/// Fuel types that can appear on utility bills and in simulator output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FuelType {
    #[serde(rename = "electricity")]
    Electricity,
    #[serde(rename = "natural gas")]
    NaturalGas,
    #[serde(rename = "propane")]
    Propane,
    #[serde(rename = "fuel oil")]
    FuelOil,
    #[serde(rename = "wood cord")]
    WoodCord,
    #[serde(rename = "wood pellets")]
    WoodPellets,
    #[serde(rename = "coal")]
    Coal,
}

impl FuelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electricity => "electricity",
            Self::NaturalGas => "natural gas",
            Self::Propane => "propane",
            Self::FuelOil => "fuel oil",
            Self::WoodCord => "wood cord",
            Self::WoodPellets => "wood pellets",
            Self::Coal => "coal",
        }
    }

    /// Snake-case key used in logbook columns and the end-use gene table
    pub fn key(&self) -> &'static str {
        match self {
            Self::Electricity => "electricity",
            Self::NaturalGas => "natural_gas",
            Self::Propane => "propane",
            Self::FuelOil => "fuel_oil",
            Self::WoodCord => "wood_cord",
            Self::WoodPellets => "wood_pellets",
            Self::Coal => "coal",
        }
    }

    /// Fuels bought in bulk deliveries rather than metered per period
    pub fn is_delivered(&self) -> bool {
        matches!(
            self,
            Self::Propane | Self::FuelOil | Self::WoodCord | Self::WoodPellets
        )
    }

    pub fn all() -> Vec<Self> {
        vec![
            Self::Electricity,
            Self::NaturalGas,
            Self::Propane,
            Self::FuelOil,
            Self::WoodCord,
            Self::WoodPellets,
            Self::Coal,
        ]
    }
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FuelType {
    type Err = CalibrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Self::all()
            .into_iter()
            .find(|fuel| fuel.as_str() == normalized || fuel.key() == normalized)
            .ok_or_else(|| CalibrationError::BillData(format!("Unknown fuel type: '{}'", s)))
    }
}

/// Disaggregated end-use categories compared during calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndUse {
    Baseload,
    Heating,
    Cooling,
}

impl EndUse {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Baseload => "baseload",
            Self::Heating => "heating",
            Self::Cooling => "cooling",
        }
    }

    pub fn all() -> [Self; 3] {
        [Self::Baseload, Self::Heating, Self::Cooling]
    }
}

impl fmt::Display for EndUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Units a utility bill can be reported in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnergyUnit {
    Kwh,
    Mwh,
    Therms,
    Btu,
    KBtu,
    MBtu,
    Ccf,
    Kcf,
    Mcf,
    Gallons,
    Cords,
}

impl EnergyUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kwh => "kWh",
            Self::Mwh => "MWh",
            Self::Therms => "therms",
            Self::Btu => "Btu",
            Self::KBtu => "kBtu",
            Self::MBtu => "MBtu",
            Self::Ccf => "ccf",
            Self::Kcf => "kcf",
            Self::Mcf => "Mcf",
            Self::Gallons => "gal",
            Self::Cords => "cord",
        }
    }

    /// Units accepted on bills for a given fuel
    pub fn valid_for(fuel: FuelType) -> &'static [EnergyUnit] {
        match fuel {
            FuelType::Electricity => &[Self::Kwh, Self::Mwh],
            FuelType::NaturalGas => &[
                Self::Therms,
                Self::Btu,
                Self::KBtu,
                Self::MBtu,
                Self::Ccf,
                Self::Kcf,
                Self::Mcf,
            ],
            FuelType::FuelOil | FuelType::Propane => {
                &[Self::Gallons, Self::Btu, Self::KBtu, Self::MBtu]
            }
            FuelType::WoodCord | FuelType::WoodPellets => {
                &[Self::Cords, Self::Btu, Self::KBtu, Self::MBtu]
            }
            FuelType::Coal => &[],
        }
    }
}

impl fmt::Display for EnergyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnergyUnit {
    type Err = CalibrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "kWh" => Ok(Self::Kwh),
            "MWh" => Ok(Self::Mwh),
            "therms" => Ok(Self::Therms),
            "Btu" => Ok(Self::Btu),
            "kBtu" => Ok(Self::KBtu),
            "MBtu" => Ok(Self::MBtu),
            "ccf" => Ok(Self::Ccf),
            "kcf" => Ok(Self::Kcf),
            "Mcf" => Ok(Self::Mcf),
            "gal" => Ok(Self::Gallons),
            "cord" | "cords" => Ok(Self::Cords),
            other => Err(CalibrationError::BillData(format!(
                "Unknown unit of measure: '{}'",
                other
            ))),
        }
    }
}

/// One metered utility interval for a single fuel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillPeriod {
    pub fuel_type: FuelType,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub consumption: f64,
    pub unit: EnergyUnit,
}

impl BillPeriod {
    /// Fractional length of the period in days
    pub fn n_days(&self) -> f64 {
        (self.end_date - self.start_date).num_seconds() as f64 / 86_400.0
    }
}

/// A bill period joined with the mean outdoor temperature over its interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherJoinedBillRow {
    pub bill: BillPeriod,
    /// Degrees Fahrenheit
    pub avg_temp: f64,
    pub n_days: f64,
    pub daily_consumption: f64,
}

/// Baseload / heating / cooling split of one day or one bill period
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DisaggregatedUsage {
    pub baseload: f64,
    pub heating: f64,
    pub cooling: f64,
}

impl DisaggregatedUsage {
    pub fn total(&self) -> f64 {
        self.baseload + self.heating + self.cooling
    }

    pub fn get(&self, end_use: EndUse) -> f64 {
        match end_use {
            EndUse::Baseload => self.baseload,
            EndUse::Heating => self.heating,
            EndUse::Cooling => self.cooling,
        }
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            baseload: self.baseload * factor,
            heating: self.heating * factor,
            cooling: self.cooling * factor,
        }
    }
}

impl std::ops::Add for DisaggregatedUsage {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            baseload: self.baseload + rhs.baseload,
            heating: self.heating + rhs.heating,
            cooling: self.cooling + rhs.cooling,
        }
    }
}

impl std::ops::AddAssign for DisaggregatedUsage {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for DisaggregatedUsage {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, x| acc + x)
    }
}
