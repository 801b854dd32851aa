use bill_calibration::config::CalibrationConfig;
use bill_calibration::data::building::{
    Building, ConsumptionInfo, ConsumptionPeriod, ConsumptionSection, HeatingSystem, Site,
    Systems, WaterHeater,
};
use bill_calibration::data::{BuildingDocument, TemperatureSeries};
use bill_calibration::engines::generation::LogProgressCallback;
use bill_calibration::engines::simulation::SimulationRunner;
use bill_calibration::types::{EndUse, FuelType};
use bill_calibration::{Calibration, CalibrationError};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde_json::json;
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn seasonal_temp_f(day_of_year: f64) -> f64 {
    50.0 - 25.0 * (2.0 * PI * (day_of_year - 15.0) / 365.0).cos()
}

fn daily_kwh(avg_temp: f64) -> f64 {
    20.0 + 0.8 * (55.0 - avg_temp).max(0.0)
}

fn actual_weather() -> TemperatureSeries {
    let start = date(2023, 12, 1);
    TemperatureSeries::new(
        (0..(2 * 430))
            .map(|i| {
                let ts = start + Duration::hours(12 * i);
                (ts, seasonal_temp_f(ts.ordinal() as f64))
            })
            .collect(),
    )
}

fn write_epw(dir: &Path) -> PathBuf {
    let mut out = String::from("LOCATION,Denver,CO,USA,TMY3,724666,39.74,-105.18,-7.0,1829.0\n");
    for _ in 0..7 {
        out.push_str("HEADER\n");
    }
    let days_in_month = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    let mut doy = 0;
    for (m, days) in days_in_month.iter().enumerate() {
        for d in 1..=*days {
            doy += 1;
            let temp_c = (seasonal_temp_f(doy as f64) - 32.0) * 5.0 / 9.0;
            for h in 1..=24 {
                out.push_str(&format!("1999,{},{},{},0,?,{:.2},0,50\n", m + 1, d, h, temp_c));
            }
        }
    }
    let path = dir.join("weather.epw");
    std::fs::write(&path, out).unwrap();
    path
}

/// All-electric home with a year of monthly bills generated from `daily_kwh`
fn document(dir: &Path, weather: &TemperatureSeries) -> BuildingDocument {
    let mut boundaries: Vec<NaiveDateTime> = (1..=12).map(|m| date(2024, m, 1)).collect();
    boundaries.push(date(2025, 1, 1));
    let periods = boundaries
        .windows(2)
        .map(|w| {
            let avg = weather.mean_between(w[0], w[1]).unwrap();
            ConsumptionPeriod {
                start: Some(w[0]),
                end: Some(w[1]),
                consumption: (w[1] - w[0]).num_days() as f64 * daily_kwh(avg),
                reading_type: None,
            }
        })
        .collect();

    let building = Building {
        building_id: "AllElectric".to_string(),
        site: Site {
            utc_offset: -7.0,
            geo_location: None,
        },
        systems: Systems {
            heating_systems: vec![HeatingSystem {
                fuel: Some(FuelType::Electricity),
            }],
            water_heaters: vec![WaterHeater {
                fuel: Some(FuelType::Electricity),
            }],
            ..Systems::default()
        },
        appliances: Default::default(),
        epw_file_path: Some(write_epw(dir)),
        model_file: dir.join("home.xml"),
    };
    BuildingDocument::new(
        building,
        vec![ConsumptionSection {
            building_id: "AllElectric".to_string(),
            details: vec![ConsumptionInfo {
                fuel_type: Some("electricity".to_string()),
                unit: Some("kWh".to_string()),
                periods,
            }],
        }],
    )
}

fn small_search_config(seed: u64) -> CalibrationConfig {
    let mut config = CalibrationConfig::default();
    config.genetic_algorithm.population_size = 6;
    config.genetic_algorithm.generations = 3;
    config.genetic_algorithm.num_proc = Some(2);
    config.genetic_algorithm.seed = Some(seed);
    config
}

/// Simulated use responds to the misc load and heating setpoint genes
struct ResponsiveRunner;

impl SimulationRunner for ResponsiveRunner {
    fn apply_parameters(
        &self,
        _source_model: &Path,
        parameters: &BTreeMap<String, f64>,
        target_model: &Path,
    ) -> bill_calibration::Result<()> {
        std::fs::write(target_model, serde_json::to_string(parameters)?)?;
        Ok(())
    }

    fn simulate(&self, model: &Path, output_dir: &Path) -> bill_calibration::Result<PathBuf> {
        let parameters: BTreeMap<String, f64> =
            serde_json::from_str(&std::fs::read_to_string(model)?)?;
        let misc = parameters.get("misc_load_multiplier").copied().unwrap_or(1.0);
        let offset = parameters.get("heating_setpoint_offset").copied().unwrap_or(0.0);
        let results = json!({
            "End Use": {
                "Electricity: Plug Loads": 20.0 * misc,
                "Electricity: Heating": 15.0 * (1.0 + 0.05 * offset),
            }
        });
        let path = output_dir.join("results_annual.json");
        std::fs::write(&path, results.to_string())?;
        Ok(path)
    }
}

struct BrokenRunner;

impl SimulationRunner for BrokenRunner {
    fn apply_parameters(
        &self,
        _source_model: &Path,
        _parameters: &BTreeMap<String, f64>,
        _target_model: &Path,
    ) -> bill_calibration::Result<()> {
        Err(CalibrationError::Simulation("measure not found".to_string()))
    }

    fn simulate(&self, _model: &Path, _output_dir: &Path) -> bill_calibration::Result<PathBuf> {
        unreachable!("modification always fails")
    }
}

fn calibration(dir: &TempDir, seed: u64) -> Calibration {
    let weather = actual_weather();
    Calibration::new_at(
        document(dir.path(), &weather),
        small_search_config(seed),
        &weather,
        date(2025, 6, 1),
    )
    .unwrap()
}

#[test]
fn test_bills_are_normalised_before_the_search() {
    let dir = tempfile::tempdir().unwrap();
    let calibration = calibration(&dir, 1);

    assert!(calibration.regression_models().contains_key(&FuelType::Electricity));
    assert!(calibration.oracle().delivered().is_empty());
    let normalized = calibration.oracle().normalized()[&FuelType::Electricity];
    assert!(normalized.heating > 0.0);
    // 20 kWh/day of baseload over a reference year
    let expected_baseload = 20.0 * 365.0 * 3412.14 / 1e6;
    assert!((normalized.baseload - expected_baseload).abs() / expected_baseload < 0.05);
}

#[test]
fn test_invalid_bills_stop_before_normalisation() {
    let dir = tempfile::tempdir().unwrap();
    let weather = actual_weather();
    let result = Calibration::new_at(
        document(dir.path(), &weather),
        small_search_config(1),
        &weather,
        date(2032, 6, 1),
    );
    assert!(matches!(result, Err(CalibrationError::DataValidation(_))));
}

#[test]
fn test_existing_home_is_scored_at_neutral_values() {
    let dir = tempfile::tempdir().unwrap();
    let evaluation = calibration(&dir, 1)
        .evaluate_existing_home(ResponsiveRunner)
        .unwrap();

    assert!(evaluation.fitness.is_finite());
    assert!(evaluation.run_dir.is_none());
    let electricity = &evaluation.comparison[&FuelType::Electricity];
    assert!(electricity.bias_error.contains_key(&EndUse::Baseload));
    assert!(electricity.bias_error.contains_key(&EndUse::Heating));
}

#[test]
fn test_existing_home_reports_simulation_failure() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        calibration(&dir, 1).evaluate_existing_home(BrokenRunner),
        Err(CalibrationError::Simulation(_))
    ));
}

#[test]
fn test_run_writes_outputs_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("output");
    let calibration = calibration(&dir, 42);

    let outcome = calibration
        .run(ResponsiveRunner, &output, LogProgressCallback)
        .unwrap();

    assert!(outcome.best.fitness_value().is_finite());
    assert!(outcome.best_run_dir().is_none());
    assert!(!outcome.logbook.is_empty());
    assert!(outcome.logbook.len() <= 4);

    let best_model: BTreeMap<String, f64> =
        serde_json::from_str(&std::fs::read_to_string(output.join("best_individual.xml")).unwrap())
            .unwrap();
    assert_eq!(best_model, outcome.best_parameters);

    let written: BTreeMap<String, f64> = serde_json::from_str(
        &std::fs::read_to_string(output.join("best_individual.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(written, outcome.best_parameters);

    let logbook: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output.join("logbook.json")).unwrap())
            .unwrap();
    assert!(logbook.to_string().contains("electricity_baseload"));

    for individual in &outcome.population {
        if let Some(dir) = &individual.run_dir {
            assert!(!dir.exists(), "{} was left behind", dir.display());
        }
    }
}
