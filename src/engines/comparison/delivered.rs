//! Degree-day ratio method for fuels without enough bills to regress.

use super::engine::FuelComparison;
use super::results::SimulationResults;
use crate::data::bills::BillTable;
use crate::data::degree_days::DegreeDays;
use crate::data::weather::{DayOfYearWindow, EpwWeather, TemperatureSeries};
use crate::error::{CalibrationError, Result};
use crate::types::{EndUse, FuelType};
use crate::units::{btu_to_mbtu, to_btu};
use chrono::Duration;

/// Everything the ratio method needs from one fuel's bills, computed once per run
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveredFuelInputs {
    pub fuel: FuelType,
    /// Total measured use over the bill record, MBtu
    pub measured_mbtu: f64,
    pub num_days: i64,
    /// Reference-year degree days over the bills' calendar windows
    pub design_degree_days: DegreeDays,
    /// Actual degree days over the bill record
    pub actual_degree_days: DegreeDays,
}

impl DeliveredFuelInputs {
    pub fn from_bills(
        table: &BillTable,
        reference: &EpwWeather,
        actual: &TemperatureSeries,
    ) -> Result<Self> {
        let (Some(first), Some(last)) = (table.first_start(), table.last_end()) else {
            return Err(CalibrationError::BillData(format!(
                "No bill periods for {}",
                table.fuel
            )));
        };

        let measured_btu = to_btu(table.total_consumption(), table.unit, table.fuel)?;
        let num_days = (last - first + Duration::days(1)).num_days();

        let design_degree_days: DegreeDays = table
            .periods
            .iter()
            .map(|bill| {
                let window = DayOfYearWindow::from_bill(bill);
                DegreeDays::from_daily_temps(&reference.temps_in_window(&window))
            })
            .sum();

        let actual_daily = actual.daily_means(first, last);
        if actual_daily.is_empty() {
            return Err(CalibrationError::Weather(format!(
                "No temperature readings cover the {} bills ({} to {})",
                table.fuel, first, last
            )));
        }

        Ok(Self {
            fuel: table.fuel,
            measured_mbtu: btu_to_mbtu(measured_btu),
            num_days,
            design_degree_days: design_degree_days.rounded(),
            actual_degree_days: DegreeDays::from_daily_temps(&actual_daily).rounded(),
        })
    }
}

fn weather_ratio(actual: f64, design: f64) -> f64 {
    if design == 0.0 {
        1.0
    } else {
        actual / design
    }
}

/// Apportion measured use across end uses with the simulation's own fractions.
///
/// Baseload scales with the bill record length, heating and cooling with the ratio of
/// actual to reference degree days. End uses the simulation reports as zero are skipped.
pub fn simplified_annual_usage(
    inputs: &DeliveredFuelInputs,
    simulated: &SimulationResults,
) -> Result<FuelComparison> {
    let fuel = inputs.fuel;
    let modeled = |end_use: EndUse| simulated.get(fuel, end_use).unwrap_or(0.0);
    let total_modeled = simulated.fuel_total(fuel);
    if !(total_modeled > 0.0) {
        return Err(CalibrationError::ResultsFormat(format!(
            "Simulation reports no {} use but bills do",
            fuel
        )));
    }

    let fraction = |end_use: EndUse| modeled(end_use) / total_modeled;
    let baseload_factor = fraction(EndUse::Baseload) * (inputs.num_days as f64 / 365.0);
    let heating_factor = fraction(EndUse::Heating)
        * weather_ratio(
            inputs.actual_degree_days.hdd65f,
            inputs.design_degree_days.hdd65f,
        );
    let cooling_factor = fraction(EndUse::Cooling)
        * weather_ratio(
            inputs.actual_degree_days.cdd65f,
            inputs.design_degree_days.cdd65f,
        );

    let denominator = baseload_factor + heating_factor + cooling_factor;
    if !(denominator > 0.0) {
        return Err(CalibrationError::ResultsFormat(format!(
            "Cannot apportion {} use: weather-adjusted fractions sum to zero",
            fuel
        )));
    }
    let annual_mbtu = inputs.measured_mbtu / denominator;

    let mut result = FuelComparison::default();
    for end_use in EndUse::all() {
        let sim = modeled(end_use);
        if sim == 0.0 {
            continue;
        }
        result.insert(end_use, annual_mbtu * fraction(end_use), sim);
    }
    Ok(result)
}
