use super::building::{BuildingDocument, ConsumptionInfo};
use crate::config::UtilityBillCriteriaConfig;
use crate::error::{CalibrationError, Result};
use crate::types::{EnergyUnit, FuelType};
use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeSet;

/// Pre-flight checks on the building document and its bills.
///
/// Every failure is a [`CalibrationError::DataValidation`] naming the broken rule.
pub struct DataValidator;

impl DataValidator {
    pub fn validate(document: &BuildingDocument, criteria: &UtilityBillCriteriaConfig) -> Result<()> {
        Self::validate_at(document, criteria, chrono::Local::now().naive_local())
    }

    /// Same as [`Self::validate`] with an explicit clock
    pub fn validate_at(
        document: &BuildingDocument,
        criteria: &UtilityBillCriteriaConfig,
        now: NaiveDateTime,
    ) -> Result<()> {
        Self::check_photovoltaics(document)?;

        let all_infos: Vec<&ConsumptionInfo> = document
            .consumption_sections()
            .iter()
            .flat_map(|c| c.details.iter())
            .collect();

        let fuels = Self::check_fuel_and_unit_present(&all_infos)?;
        Self::check_building_reference(document)?;
        Self::check_units(&fuels)?;
        Self::check_single_section_per_fuel(&fuels)?;
        Self::check_electricity_present(&fuels)?;

        for (fuel, _, info) in &fuels {
            Self::check_periods_consecutive(*fuel, info)?;
        }
        for (fuel, _, info) in &fuels {
            Self::check_positive_consumption(*fuel, info)?;
        }
        for (fuel, _, info) in &fuels {
            Self::check_not_estimated(*fuel, info)?;
        }

        Self::check_electricity_bill_count(&fuels, criteria)?;
        for (fuel, _, info) in &fuels {
            Self::check_coverage(*fuel, info, criteria, now)?;
        }
        Self::check_electricity_bill_lengths(&fuels, criteria)?;
        Self::check_equipment_fuels(document, &fuels)?;

        Ok(())
    }

    fn fail<T>(message: String) -> Result<T> {
        Err(CalibrationError::DataValidation(message))
    }

    fn check_photovoltaics(document: &BuildingDocument) -> Result<()> {
        if document.has_photovoltaics() {
            return Self::fail(
                "PV is not supported with automated calibration at this time.".to_string(),
            );
        }
        Ok(())
    }

    fn check_fuel_and_unit_present<'a>(
        infos: &[&'a ConsumptionInfo],
    ) -> Result<Vec<(FuelType, &'a str, &'a ConsumptionInfo)>> {
        let mut fuels = Vec::with_capacity(infos.len());
        for info in infos {
            let (Some(fuel_name), Some(unit)) = (info.fuel_type.as_deref(), info.unit.as_deref())
            else {
                return Self::fail(
                    "Every bill section must name a fuel type and a unit of measure.".to_string(),
                );
            };
            let fuel: FuelType = fuel_name.parse().map_err(|_| {
                CalibrationError::DataValidation(format!("Unknown fuel type '{}'", fuel_name))
            })?;
            fuels.push((fuel, unit, *info));
        }
        Ok(fuels)
    }

    fn check_building_reference(document: &BuildingDocument) -> Result<()> {
        if !document
            .consumption_sections()
            .iter()
            .any(|c| c.building_id == document.building_id())
        {
            return Self::fail(format!(
                "No consumption section references building '{}'.",
                document.building_id()
            ));
        }
        Ok(())
    }

    fn check_units(fuels: &[(FuelType, &str, &ConsumptionInfo)]) -> Result<()> {
        for (fuel, unit, _) in fuels {
            let valid = unit
                .parse::<EnergyUnit>()
                .map(|u| EnergyUnit::valid_for(*fuel).contains(&u))
                .unwrap_or(false);
            if !valid {
                return Self::fail(format!("'{}' is not a valid unit for {}.", unit, fuel));
            }
        }
        Ok(())
    }

    fn check_single_section_per_fuel(fuels: &[(FuelType, &str, &ConsumptionInfo)]) -> Result<()> {
        let mut seen = BTreeSet::new();
        for (fuel, _, _) in fuels {
            if !seen.insert(*fuel) {
                return Self::fail(format!(
                    "Multiple bill sections found for {}. Only one per fuel type is allowed.",
                    fuel
                ));
            }
        }
        Ok(())
    }

    fn check_electricity_present(fuels: &[(FuelType, &str, &ConsumptionInfo)]) -> Result<()> {
        if !fuels.iter().any(|(f, _, _)| *f == FuelType::Electricity) {
            return Self::fail("Electricity bills are required for calibration.".to_string());
        }
        Ok(())
    }

    fn check_periods_consecutive(fuel: FuelType, info: &ConsumptionInfo) -> Result<()> {
        let mut previous_end: Option<NaiveDateTime> = None;
        for (i, period) in info.periods.iter().enumerate() {
            let (Some(start), Some(end)) = (period.start, period.end) else {
                return Self::fail(format!(
                    "Bill period {} for {} is missing a start or end date.",
                    i, fuel
                ));
            };
            if end <= start {
                return Self::fail(format!(
                    "Bill period {} - {} for {} ends before it starts.",
                    start, end, fuel
                ));
            }
            if let Some(prev_end) = previous_end {
                if start < prev_end {
                    return Self::fail(format!(
                        "Bill periods for {} overlap at {}.",
                        fuel, start
                    ));
                }
                if start - prev_end > Duration::minutes(1) {
                    return Self::fail(format!(
                        "Gap in bills for {} between {} and {}. Are the bill periods consecutive?",
                        fuel, prev_end, start
                    ));
                }
            }
            previous_end = Some(end);
        }
        Ok(())
    }

    fn check_positive_consumption(fuel: FuelType, info: &ConsumptionInfo) -> Result<()> {
        if let Some(period) = info.periods.iter().find(|p| !(p.consumption > 0.0)) {
            return Self::fail(format!(
                "Consumption for {} must be greater than zero (found {}).",
                fuel, period.consumption
            ));
        }
        Ok(())
    }

    fn check_not_estimated(fuel: FuelType, info: &ConsumptionInfo) -> Result<()> {
        let estimated = info.periods.iter().find(|p| {
            p.reading_type
                .as_deref()
                .map_or(false, |r| r.trim().eq_ignore_ascii_case("estimate"))
        });
        if let Some(period) = estimated {
            return Self::fail(format!(
                "Estimated readings are not supported ({} bill starting {:?}).",
                fuel, period.start
            ));
        }
        Ok(())
    }

    fn check_electricity_bill_count(
        fuels: &[(FuelType, &str, &ConsumptionInfo)],
        criteria: &UtilityBillCriteriaConfig,
    ) -> Result<()> {
        let count = fuels
            .iter()
            .filter(|(f, _, _)| *f == FuelType::Electricity)
            .map(|(_, _, info)| info.periods.len())
            .max()
            .unwrap_or(0);
        if count < criteria.min_num_electrical_bills {
            return Self::fail(format!(
                "Electricity consumption must have at least {} bill periods (found {}).",
                criteria.min_num_electrical_bills, count
            ));
        }
        Ok(())
    }

    fn check_coverage(
        fuel: FuelType,
        info: &ConsumptionInfo,
        criteria: &UtilityBillCriteriaConfig,
        now: NaiveDateTime,
    ) -> Result<()> {
        let rule = || {
            format!(
                "Bills for {} must cover at least {} days and fall within the past {} years.",
                fuel, criteria.min_days_of_consumption_data, criteria.max_years
            )
        };

        let (Some(first), Some(last)) = (
            info.periods.first().and_then(|p| p.start),
            info.periods.last().and_then(|p| p.end),
        ) else {
            return Self::fail(rule());
        };
        if (last - first).num_days() < criteria.min_days_of_consumption_data {
            return Self::fail(rule());
        }

        let oldest_allowed = Duration::days(criteria.max_years * 365);
        for date in info.periods.iter().flat_map(|p| [p.start, p.end]).flatten() {
            if date > now || now - date > oldest_allowed {
                return Self::fail(rule());
            }
        }
        Ok(())
    }

    fn check_electricity_bill_lengths(
        fuels: &[(FuelType, &str, &ConsumptionInfo)],
        criteria: &UtilityBillCriteriaConfig,
    ) -> Result<()> {
        for (_, _, info) in fuels.iter().filter(|(f, _, _)| *f == FuelType::Electricity) {
            for period in &info.periods {
                let (Some(start), Some(end)) = (period.start, period.end) else {
                    continue;
                };
                let days = (end - start).num_days();
                if days > criteria.max_electrical_bill_days {
                    return Self::fail(format!(
                        "Electricity bill period {} - {} cannot be longer than {} days.",
                        start, end, criteria.max_electrical_bill_days
                    ));
                }
                if days < criteria.min_electrical_bill_days {
                    return Self::fail(format!(
                        "Electricity bill period {} - {} cannot be shorter than {} days.",
                        start, end, criteria.min_electrical_bill_days
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_equipment_fuels(
        document: &BuildingDocument,
        fuels: &[(FuelType, &str, &ConsumptionInfo)],
    ) -> Result<()> {
        let billed: BTreeSet<FuelType> = fuels.iter().map(|(f, _, _)| *f).collect();

        let heating = document.heating_fuels();
        if heating.is_empty() {
            return Self::fail("Heating system fuel type is missing.".to_string());
        }
        if let Some(fuel) = heating.iter().find(|f| !billed.contains(*f)) {
            return Self::fail(format!(
                "Heating equipment fuel type {} does not match any bill fuel type.",
                fuel
            ));
        }

        let water = document.water_heating_fuels();
        if water.is_empty() {
            return Self::fail("Water heating system fuel type is missing.".to_string());
        }
        if let Some(fuel) = water.iter().find(|f| !billed.contains(*f)) {
            return Self::fail(format!(
                "Water heating equipment fuel type {} does not match any bill fuel type.",
                fuel
            ));
        }

        match document.clothes_dryer_fuel() {
            Some(None) => Self::fail("Clothes dryer fuel type is missing.".to_string()),
            Some(Some(fuel)) if !billed.contains(&fuel) => Self::fail(format!(
                "Clothes dryer fuel type {} does not match any bill fuel type.",
                fuel
            )),
            _ => Ok(()),
        }
    }
}
