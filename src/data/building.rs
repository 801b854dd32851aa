//! Typed building description with named accessors.

use crate::error::{CalibrationError, Result};
use crate::types::{EnergyUnit, FuelType};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// Standard-time offset from UTC in hours
    pub utc_offset: f64,
    #[serde(default)]
    pub geo_location: Option<GeoLocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatingSystem {
    pub fuel: Option<FuelType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatPump {
    pub fuel: FuelType,
    #[serde(default)]
    pub backup_fuel: Option<FuelType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoolingSystem {
    pub fuel: FuelType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterHeater {
    pub fuel: Option<FuelType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Systems {
    pub heating_systems: Vec<HeatingSystem>,
    pub heat_pumps: Vec<HeatPump>,
    pub cooling_systems: Vec<CoolingSystem>,
    pub water_heaters: Vec<WaterHeater>,
    pub photovoltaics: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClothesDryer {
    pub fuel: Option<FuelType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Appliances {
    pub clothes_dryer: Option<ClothesDryer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub building_id: String,
    pub site: Site,
    #[serde(default)]
    pub systems: Systems,
    #[serde(default)]
    pub appliances: Appliances,
    /// Reference-year weather file, relative to the document when not absolute
    #[serde(default)]
    pub epw_file_path: Option<PathBuf>,
    /// Simulation model the calibration modifies, relative to the document when not absolute
    pub model_file: PathBuf,
}

/// One metered interval as written in the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionPeriod {
    #[serde(default)]
    pub start: Option<NaiveDateTime>,
    #[serde(default)]
    pub end: Option<NaiveDateTime>,
    pub consumption: f64,
    #[serde(default)]
    pub reading_type: Option<String>,
}

/// Bills for one fuel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionInfo {
    #[serde(default)]
    pub fuel_type: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub periods: Vec<ConsumptionPeriod>,
}

impl ConsumptionInfo {
    pub fn fuel(&self) -> Option<FuelType> {
        self.fuel_type.as_deref().and_then(|f| f.parse().ok())
    }

    pub fn energy_unit(&self) -> Option<EnergyUnit> {
        self.unit.as_deref().and_then(|u| u.parse().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionSection {
    pub building_id: String,
    #[serde(default)]
    pub details: Vec<ConsumptionInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingDocument {
    building: Building,
    #[serde(default)]
    consumptions: Vec<ConsumptionSection>,
    #[serde(skip)]
    source_path: Option<PathBuf>,
}

impl BuildingDocument {
    pub fn new(building: Building, consumptions: Vec<ConsumptionSection>) -> Self {
        Self {
            building,
            consumptions,
            source_path: None,
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut doc: BuildingDocument = serde_json::from_str(&contents)?;
        doc.source_path = Some(path.to_path_buf());
        Ok(doc)
    }

    pub fn from_json_str(contents: &str, source_path: Option<PathBuf>) -> Result<Self> {
        let mut doc: BuildingDocument = serde_json::from_str(contents)?;
        doc.source_path = source_path;
        Ok(doc)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn building(&self) -> &Building {
        &self.building
    }

    pub fn building_id(&self) -> &str {
        &self.building.building_id
    }

    pub fn consumption_sections(&self) -> &[ConsumptionSection] {
        &self.consumptions
    }

    /// Bill groups from every consumption section that references `building_id`
    pub fn bill_sections_for<'a>(
        &'a self,
        building_id: &'a str,
    ) -> impl Iterator<Item = &'a ConsumptionInfo> + 'a {
        self.consumptions
            .iter()
            .filter(move |c| c.building_id == building_id)
            .flat_map(|c| c.details.iter())
    }

    /// Fuels that provide space heating, heat pump backups included
    pub fn heating_fuels(&self) -> Vec<FuelType> {
        let systems = &self.building.systems;
        let mut fuels: Vec<FuelType> = systems
            .heating_systems
            .iter()
            .filter_map(|h| h.fuel)
            .chain(systems.heat_pumps.iter().map(|hp| hp.fuel))
            .chain(systems.heat_pumps.iter().filter_map(|hp| hp.backup_fuel))
            .collect();
        fuels.sort();
        fuels.dedup();
        fuels
    }

    pub fn cooling_fuels(&self) -> Vec<FuelType> {
        let mut fuels: Vec<FuelType> = self
            .building
            .systems
            .cooling_systems
            .iter()
            .map(|c| c.fuel)
            .collect();
        fuels.sort();
        fuels.dedup();
        fuels
    }

    pub fn water_heating_fuels(&self) -> Vec<FuelType> {
        let mut fuels: Vec<FuelType> = self
            .building
            .systems
            .water_heaters
            .iter()
            .filter_map(|w| w.fuel)
            .collect();
        fuels.sort();
        fuels.dedup();
        fuels
    }

    pub fn has_heating_system(&self) -> bool {
        let systems = &self.building.systems;
        !systems.heating_systems.is_empty() || !systems.heat_pumps.is_empty()
    }

    pub fn has_water_heater(&self) -> bool {
        !self.building.systems.water_heaters.is_empty()
    }

    /// `None` when there is no clothes dryer, `Some(None)` when its fuel is unspecified
    pub fn clothes_dryer_fuel(&self) -> Option<Option<FuelType>> {
        self.building
            .appliances
            .clothes_dryer
            .as_ref()
            .map(|d| d.fuel)
    }

    pub fn has_photovoltaics(&self) -> bool {
        !self.building.systems.photovoltaics.is_empty()
    }

    pub fn utc_offset_hours(&self) -> f64 {
        self.building.site.utc_offset
    }

    /// Latitude and longitude, from the site or else the weather file header
    pub fn location(&self) -> Result<(f64, f64)> {
        if let Some(geo) = &self.building.site.geo_location {
            return Ok((geo.latitude, geo.longitude));
        }
        let epw = super::weather::EpwWeather::load(self.epw_path()?)?;
        Ok((epw.latitude, epw.longitude))
    }

    pub fn epw_path(&self) -> Result<PathBuf> {
        let file = self.building.epw_file_path.as_ref().ok_or_else(|| {
            CalibrationError::Weather("Building has no weather file configured".to_string())
        })?;
        let path = self.resolve(file);
        if !path.exists() {
            return Err(CalibrationError::Weather(format!(
                "Weather file not found: {}",
                path.display()
            )));
        }
        Ok(path)
    }

    pub fn simulation_model_path(&self) -> PathBuf {
        self.resolve(&self.building.model_file)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match self.source_path.as_ref().and_then(|p| p.parent()) {
            Some(parent) => parent.join(path),
            None => path.to_path_buf(),
        }
    }

    /// Replace this building's bills with the contents of a CSV file.
    ///
    /// Columns: `FuelType,StartDateTime,EndDateTime,Consumption[,UnitofMeasure]`. End dates
    /// name the last billed day, so one day is added to make the interval half-open.
    pub fn add_consumption_from_csv<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.as_ref().to_path_buf()))?
            .finish()?;

        for required in ["FuelType", "StartDateTime", "EndDateTime", "Consumption"] {
            if !df.get_column_names().iter().any(|c| c.as_str() == required) {
                return Err(CalibrationError::BillData(format!(
                    "Bill CSV is missing column '{}'",
                    required
                )));
            }
        }

        let fuels = df.column("FuelType")?.cast(&DataType::String)?;
        let starts = df.column("StartDateTime")?.cast(&DataType::String)?;
        let ends = df.column("EndDateTime")?.cast(&DataType::String)?;
        let consumption = df.column("Consumption")?.cast(&DataType::Float64)?;
        let units = if df.get_column_names().iter().any(|c| c.as_str() == "UnitofMeasure") {
            Some(df.column("UnitofMeasure")?.cast(&DataType::String)?)
        } else {
            None
        };

        let fuels = fuels.str()?;
        let starts = starts.str()?;
        let ends = ends.str()?;
        let consumption = consumption.f64()?;
        let units = match &units {
            Some(u) => Some(u.str()?),
            None => None,
        };

        let mut by_fuel: BTreeMap<FuelType, ConsumptionInfo> = BTreeMap::new();
        for i in 0..df.height() {
            let row = i + 1;
            let fuel: FuelType = fuels
                .get(i)
                .ok_or_else(|| CalibrationError::BillData(format!("Row {} has no fuel type", row)))?
                .parse()?;
            let start = parse_bill_date(starts.get(i), row)?;
            let end = parse_bill_date(ends.get(i), row)? + Duration::days(1);
            let value = consumption.get(i).ok_or_else(|| {
                CalibrationError::BillData(format!("Row {} has no consumption", row))
            })?;
            let unit = match units.and_then(|u| u.get(i)) {
                Some(u) => u.trim().to_string(),
                None => default_unit(fuel).to_string(),
            };

            let info = by_fuel.entry(fuel).or_insert_with(|| ConsumptionInfo {
                fuel_type: Some(fuel.as_str().to_string()),
                unit: Some(unit.clone()),
                periods: Vec::new(),
            });
            if info.unit.as_deref() != Some(unit.as_str()) {
                return Err(CalibrationError::BillData(format!(
                    "Row {} mixes units for {}: '{}' vs '{}'",
                    row,
                    fuel,
                    info.unit.as_deref().unwrap_or_default(),
                    unit
                )));
            }
            info.periods.push(ConsumptionPeriod {
                start: Some(start),
                end: Some(end),
                consumption: value,
                reading_type: None,
            });
        }

        for info in by_fuel.values_mut() {
            info.periods.sort_by_key(|p| p.start);
        }

        let building_id = self.building.building_id.clone();
        self.consumptions.retain(|c| c.building_id != building_id);
        self.consumptions.push(ConsumptionSection {
            building_id,
            details: by_fuel.into_values().collect(),
        });
        log::info!(
            "Loaded {} bill rows from {}",
            df.height(),
            path.as_ref().display()
        );
        Ok(())
    }
}

fn default_unit(fuel: FuelType) -> &'static str {
    match fuel {
        FuelType::Electricity => "kWh",
        FuelType::NaturalGas => "therms",
        FuelType::FuelOil | FuelType::Propane => "gal",
        FuelType::WoodCord | FuelType::WoodPellets => "cord",
        FuelType::Coal => "MBtu",
    }
}

fn parse_bill_date(value: Option<&str>, row: usize) -> Result<NaiveDateTime> {
    let value = value
        .map(str::trim)
        .ok_or_else(|| CalibrationError::BillData(format!("Row {} is missing a date", row)))?;
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(dt);
        }
    }
    for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(date.and_time(NaiveTime::default()));
        }
    }
    Err(CalibrationError::BillData(format!(
        "Row {} has an unrecognised date '{}'",
        row, value
    )))
}
