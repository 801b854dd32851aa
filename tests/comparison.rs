use bill_calibration::data::{BillTable, DegreeDays, EpwWeather, TemperatureSeries};
use bill_calibration::engines::comparison::{
    compare, ComparisonOracle, DeliveredFuelInputs, SimulationResults,
};
use bill_calibration::types::{BillPeriod, DisaggregatedUsage, EndUse, EnergyUnit, FuelType};
use bill_calibration::CalibrationError;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde_json::json;
use std::collections::BTreeMap;

fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn simulated(entries: &[(FuelType, EndUse, f64)]) -> SimulationResults {
    let mut results = SimulationResults::default();
    for (fuel, end_use, value) in entries {
        results.by_fuel.entry(*fuel).or_default().insert(*end_use, *value);
    }
    results
}

fn usage(baseload: f64, heating: f64, cooling: f64) -> DisaggregatedUsage {
    DisaggregatedUsage {
        baseload,
        heating,
        cooling,
    }
}

/// Constant 45 F reference year: 20 HDD a day, no cooling
fn reference_weather() -> EpwWeather {
    EpwWeather {
        location: "Test, CO".to_string(),
        latitude: 39.7,
        longitude: -105.2,
        timezone: -7.0,
        daily_temps_f: vec![45.0; 365],
    }
}

fn noon_readings_2022(temp_f: f64) -> TemperatureSeries {
    let first_noon = date(2022, 1, 1) + Duration::hours(12);
    TemperatureSeries::new(
        (0..365)
            .map(|d| (first_noon + Duration::days(d), temp_f))
            .collect(),
    )
}

fn propane_bills() -> BillTable {
    let bill = |start: NaiveDateTime, end: NaiveDateTime| BillPeriod {
        fuel_type: FuelType::Propane,
        start_date: start,
        end_date: end,
        consumption: 100.0,
        unit: EnergyUnit::Gallons,
    };
    BillTable {
        fuel: FuelType::Propane,
        unit: EnergyUnit::Gallons,
        periods: vec![
            bill(date(2022, 1, 1), date(2022, 7, 1)),
            bill(date(2022, 7, 1), date(2023, 1, 1)),
        ],
    }
}

#[test]
fn test_electricity_is_compared_in_kwh() {
    let mut normalized = BTreeMap::new();
    normalized.insert(FuelType::Electricity, usage(10.0, 0.0, 0.0));
    let sim = simulated(&[(FuelType::Electricity, EndUse::Baseload, 9.0)]);

    let comparison = compare(&normalized, &sim);
    let electricity = &comparison[&FuelType::Electricity];
    assert_eq!(electricity.bias_error[&EndUse::Baseload], 10.0);
    // 1 MBtu is 293.07 kWh
    assert_eq!(electricity.absolute_error[&EndUse::Baseload], 293.1);
}

#[test]
fn test_other_fuels_stay_in_mbtu_and_zero_simulated_use_is_skipped() {
    let mut normalized = BTreeMap::new();
    normalized.insert(FuelType::NaturalGas, usage(12.0, 50.04, 0.0));
    let sim = simulated(&[
        (FuelType::NaturalGas, EndUse::Baseload, 12.0),
        (FuelType::NaturalGas, EndUse::Heating, 45.0),
        (FuelType::NaturalGas, EndUse::Cooling, 0.0),
    ]);

    let comparison = compare(&normalized, &sim);
    let gas = &comparison[&FuelType::NaturalGas];
    assert_eq!(gas.bias_error[&EndUse::Baseload], 0.0);
    assert_eq!(gas.bias_error[&EndUse::Heating], 10.0);
    assert_eq!(gas.absolute_error[&EndUse::Heating], 5.0);
    assert!(!gas.absolute_error.contains_key(&EndUse::Cooling));
}

#[test]
fn test_zero_bill_use_gives_nan_bias_but_real_absolute_error() {
    let mut normalized = BTreeMap::new();
    normalized.insert(FuelType::Electricity, usage(10.0, 0.0, 0.0));
    let sim = simulated(&[
        (FuelType::Electricity, EndUse::Baseload, 10.0),
        (FuelType::Electricity, EndUse::Cooling, 2.0),
    ]);

    let comparison = compare(&normalized, &sim);
    let electricity = &comparison[&FuelType::Electricity];
    assert!(electricity.bias_error[&EndUse::Cooling].is_nan());
    assert_eq!(electricity.absolute_error[&EndUse::Cooling], 586.1);
}

#[test]
fn test_fuels_without_simulated_use_are_left_out() {
    let mut normalized = BTreeMap::new();
    normalized.insert(FuelType::NaturalGas, usage(12.0, 40.0, 0.0));
    let sim = simulated(&[(FuelType::Electricity, EndUse::Baseload, 20.0)]);
    assert!(compare(&normalized, &sim).is_empty());
}

#[test]
fn test_results_file_is_parsed_and_missing_file_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results_annual.json");
    let doc = json!({
        "Energy Use": {"Total": 120.0},
        "End Use": {
            "Electricity: Heating": 6.0,
            "Electricity: Lighting Interior": 4.0,
            "Natural Gas: Heating": 55.5,
            "Natural Gas: Clothes Dryer": 1.5
        }
    });
    std::fs::write(&path, serde_json::to_string_pretty(&doc).unwrap()).unwrap();

    let results = SimulationResults::load(&path, false).unwrap();
    assert_eq!(results.get(FuelType::Electricity, EndUse::Heating), None);
    assert_eq!(results.get(FuelType::Electricity, EndUse::Baseload), Some(4.0));
    assert_eq!(results.fuel_total(FuelType::NaturalGas), 57.0);

    assert!(matches!(
        SimulationResults::load(dir.path().join("missing.json"), true),
        Err(CalibrationError::ResultsFormat(_))
    ));
    assert!(SimulationResults::from_json(&json!({"Energy Use": {}}), true).is_err());
}

#[test]
fn test_delivered_inputs_from_bills() {
    let inputs =
        DeliveredFuelInputs::from_bills(&propane_bills(), &reference_weather(), &noon_readings_2022(45.0))
            .unwrap();

    assert_eq!(inputs.fuel, FuelType::Propane);
    assert!((inputs.measured_mbtu - 200.0 * 91_600.0 / 1e6).abs() < 1e-9);
    assert_eq!(inputs.num_days, 366);
    assert_eq!(
        inputs.design_degree_days,
        DegreeDays {
            hdd65f: 7300.0,
            cdd65f: 0.0
        }
    );
    assert_eq!(inputs.actual_degree_days, inputs.design_degree_days);
}

#[test]
fn test_delivered_inputs_need_weather() {
    let empty = TemperatureSeries::default();
    assert!(matches!(
        DeliveredFuelInputs::from_bills(&propane_bills(), &reference_weather(), &empty),
        Err(CalibrationError::Weather(_))
    ));
}

#[test]
fn test_oracle_merges_regression_and_ratio_fuels() {
    let delivered =
        DeliveredFuelInputs::from_bills(&propane_bills(), &reference_weather(), &noon_readings_2022(45.0))
            .unwrap();
    let mut normalized = BTreeMap::new();
    normalized.insert(FuelType::Electricity, usage(20.0, 0.0, 5.0));
    let oracle = ComparisonOracle::new(normalized, vec![delivered], false);
    assert_eq!(oracle.fuels(), vec![FuelType::Electricity, FuelType::Propane]);

    let sim = simulated(&[
        (FuelType::Electricity, EndUse::Baseload, 20.0),
        (FuelType::Electricity, EndUse::Cooling, 5.0),
        (FuelType::Propane, EndUse::Baseload, 2.0),
        (FuelType::Propane, EndUse::Heating, 16.0),
    ]);
    let comparison = oracle.compare(&sim).unwrap();

    assert_eq!(comparison.len(), 2);
    assert_eq!(comparison[&FuelType::Electricity].bias_error[&EndUse::Baseload], 0.0);
    let propane = &comparison[&FuelType::Propane];
    assert!(propane.bias_error.contains_key(&EndUse::Heating));
    assert!(propane.bias_error.contains_key(&EndUse::Baseload));
    assert!(!propane.bias_error.contains_key(&EndUse::Cooling));
    // 18.32 MBtu measured against 18 simulated
    assert!(propane.bias_error[&EndUse::Heating] > 0.0);
}

#[test]
fn test_oracle_fails_when_simulation_lacks_a_delivered_fuel() {
    let delivered =
        DeliveredFuelInputs::from_bills(&propane_bills(), &reference_weather(), &noon_readings_2022(45.0))
            .unwrap();
    let oracle = ComparisonOracle::new(BTreeMap::new(), vec![delivered], false);
    let sim = simulated(&[(FuelType::Electricity, EndUse::Baseload, 20.0)]);
    assert!(matches!(
        oracle.compare(&sim),
        Err(CalibrationError::ResultsFormat(_))
    ));
}
