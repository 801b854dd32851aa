use super::building::{BuildingDocument, ConsumptionInfo};
use crate::error::{CalibrationError, Result};
use crate::types::{BillPeriod, EnergyUnit, FuelType};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// All bill periods for one fuel, in chronological order
#[derive(Debug, Clone, PartialEq)]
pub struct BillTable {
    pub fuel: FuelType,
    pub unit: EnergyUnit,
    pub periods: Vec<BillPeriod>,
}

impl BillTable {
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn first_start(&self) -> Option<NaiveDateTime> {
        self.periods.first().map(|p| p.start_date)
    }

    pub fn last_end(&self) -> Option<NaiveDateTime> {
        self.periods.last().map(|p| p.end_date)
    }

    /// Sum of consumption in the bill unit
    pub fn total_consumption(&self) -> f64 {
        self.periods.iter().map(|p| p.consumption).sum()
    }
}

/// Extract per-fuel bill tables for `building_id` (the document's building when `None`).
///
/// When a whole end-date column is absent it is filled from the next period's start, and a
/// missing start column from the previous period's end. The period left without a date by
/// that shift is dropped.
pub fn load_bills(
    document: &BuildingDocument,
    building_id: Option<&str>,
) -> Result<BTreeMap<FuelType, BillTable>> {
    let building_id = building_id.unwrap_or_else(|| document.building_id());
    let mut tables = BTreeMap::new();

    for info in document.bill_sections_for(building_id) {
        let table = bill_table_from_info(info)?;
        if tables.insert(table.fuel, table).is_some() {
            return Err(CalibrationError::BillData(format!(
                "Multiple bill sections for {}",
                info.fuel_type.as_deref().unwrap_or("unknown fuel")
            )));
        }
    }

    if tables.is_empty() {
        return Err(CalibrationError::BillData(format!(
            "No bills found for building '{}'",
            building_id
        )));
    }
    Ok(tables)
}

fn bill_table_from_info(info: &ConsumptionInfo) -> Result<BillTable> {
    let fuel_name = info
        .fuel_type
        .as_deref()
        .ok_or_else(|| CalibrationError::BillData("Bill section has no fuel type".to_string()))?;
    let fuel: FuelType = fuel_name.parse()?;
    let unit: EnergyUnit = info
        .unit
        .as_deref()
        .ok_or_else(|| {
            CalibrationError::BillData(format!("Bill section for {} has no unit", fuel))
        })?
        .parse()?;

    let mut starts: Vec<Option<NaiveDateTime>> = info.periods.iter().map(|p| p.start).collect();
    let mut ends: Vec<Option<NaiveDateTime>> = info.periods.iter().map(|p| p.end).collect();

    if !ends.is_empty() && ends.iter().all(Option::is_none) {
        ends = starts.iter().skip(1).copied().chain(std::iter::once(None)).collect();
    }
    if !starts.is_empty() && starts.iter().all(Option::is_none) {
        starts = std::iter::once(None).chain(ends.iter().copied()).take(ends.len()).collect();
    }

    let mut periods = Vec::with_capacity(info.periods.len());
    for (i, period) in info.periods.iter().enumerate() {
        match (starts[i], ends[i]) {
            (Some(start_date), Some(end_date)) => periods.push(BillPeriod {
                fuel_type: fuel,
                start_date,
                end_date,
                consumption: period.consumption,
                unit,
            }),
            _ => log::warn!(
                "Dropping {} bill period {} with an undeterminable start or end",
                fuel,
                i
            ),
        }
    }

    Ok(BillTable {
        fuel,
        unit,
        periods,
    })
}
