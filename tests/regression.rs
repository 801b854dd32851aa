use bill_calibration::engines::regression::{fit_model, RegressionModel, RegressionVariant};
use bill_calibration::types::{BillPeriod, EnergyUnit, FuelType, WeatherJoinedBillRow};
use bill_calibration::CalibrationError;
use chrono::{Duration, NaiveDate};

fn row(index: i64, avg_temp: f64, daily: f64) -> WeatherJoinedBillRow {
    let start = NaiveDate::from_ymd_opt(2022, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(30 * index);
    WeatherJoinedBillRow {
        bill: BillPeriod {
            fuel_type: FuelType::Electricity,
            start_date: start,
            end_date: start + Duration::days(30),
            consumption: daily * 30.0,
            unit: EnergyUnit::Kwh,
        },
        avg_temp,
        n_days: 30.0,
        daily_consumption: daily,
    }
}

fn rows_from(points: &[(f64, f64)]) -> Vec<WeatherJoinedBillRow> {
    points
        .iter()
        .enumerate()
        .map(|(i, (t, d))| row(i as i64, *t, *d))
        .collect()
}

#[test]
fn test_heating_dominant_three_points() {
    let rows = rows_from(&[(30.0, 40.0), (50.0, 20.0), (70.0, 25.0)]);
    let best = fit_model(&rows, None).unwrap();

    let slope = best.heating_slope().expect("best model has a heating term");
    assert!(slope < 0.0, "heating slope {}", slope);
    let balance = best.heating_balance_point().unwrap();
    assert!(balance > 50.0 && balance < 70.0, "balance point {}", balance);

    for variant in RegressionVariant::all() {
        if let Ok(candidate) = RegressionModel::fit(variant, &rows) {
            assert!(best.cvrmse <= candidate.cvrmse + 1e-12);
        }
    }
}

#[test]
fn test_cooling_dominant_bills() {
    // 10 units/day baseload, 0.5 per degree above 70 F
    let points: Vec<(f64, f64)> = (0..12)
        .map(|i| {
            let t = 30.0 + 5.0 * i as f64;
            (t, 10.0 + 0.5 * (t - 70.0).max(0.0))
        })
        .collect();
    let model = fit_model(&rows_from(&points), None).unwrap();

    assert!(model.cvrmse < 0.01, "cvrmse {}", model.cvrmse);
    let balance = model.cooling_balance_point().unwrap();
    assert!((balance - 70.0).abs() < 1.0, "cooling balance point {}", balance);

    let predicted = model.predict(&[40.0, 85.0]);
    assert!((predicted[0] - 10.0).abs() < 0.1);
    assert!((predicted[1] - 17.5).abs() < 0.1);
}

#[test]
fn test_disaggregation_matches_prediction() {
    let points: Vec<(f64, f64)> = (0..12)
        .map(|i| {
            let t = 20.0 + 6.0 * i as f64;
            let heating = 1.2 * (55.0 - t).max(0.0);
            let cooling = 0.8 * (t - 72.0).max(0.0);
            (t, 15.0 + heating + cooling)
        })
        .collect();
    let model = fit_model(&rows_from(&points), None).unwrap();

    let temps: Vec<f64> = (0..120).map(|i| i as f64 - 10.0).collect();
    let totals = model.predict(&temps);
    for (split, total) in model.predict_disaggregated(&temps).iter().zip(totals) {
        assert!((split.total() - total).abs() < 1e-9);
        assert!(split.baseload >= 0.0 && split.heating >= 0.0 && split.cooling >= 0.0);
    }
}

#[test]
fn test_cvrmse_threshold_raises_quality_error() {
    let rows = rows_from(&[
        (30.0, 40.0),
        (35.0, 12.0),
        (45.0, 35.0),
        (55.0, 8.0),
        (65.0, 30.0),
        (75.0, 9.0),
        (85.0, 33.0),
    ]);
    match fit_model(&rows, Some(0.05)) {
        Err(CalibrationError::ModelQuality { cvrmse, threshold }) => {
            assert!(cvrmse > threshold);
            assert_eq!(threshold, 0.05);
        }
        other => panic!("expected ModelQuality, got {:?}", other.map(|m| m.cvrmse)),
    }
    assert!(fit_model(&rows, None).is_ok());
}

#[test]
fn test_no_rows_is_a_fit_error() {
    assert!(matches!(
        fit_model(&[], None),
        Err(CalibrationError::ModelFit(_))
    ));
}
