use crate::data::bills::BillTable;
use crate::data::weather::{join_bills_weather, DayOfYearWindow, EpwWeather, TemperatureSeries, DAYS_PER_YEAR};
use crate::engines::regression::{fit_model, RegressionModel};
use crate::error::{CalibrationError, Result};
use crate::types::{DisaggregatedUsage, FuelType, WeatherJoinedBillRow};
use crate::units::{btu_to_mbtu, to_btu};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};

/// Reference-year usage attributed to one historical bill, in MBtu
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBill {
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub window: DayOfYearWindow,
    pub usage: DisaggregatedUsage,
}

/// Per-fuel regression models over bills joined with actual weather, evaluated on the
/// reference year.
pub struct InverseModel {
    rows_btu: BTreeMap<FuelType, Vec<WeatherJoinedBillRow>>,
    reference_temps_f: Vec<f64>,
    max_cvrmse: Option<f64>,
    models: HashMap<FuelType, RegressionModel>,
}

impl InverseModel {
    /// Join each fuel's bills with `actual` weather and convert consumption to Btu.
    ///
    /// Only `fuels` are kept; delivered fuels belong to the degree-day ratio method.
    pub fn new(
        bills: &BTreeMap<FuelType, BillTable>,
        fuels: &[FuelType],
        actual: &TemperatureSeries,
        reference: &EpwWeather,
        max_cvrmse: Option<f64>,
    ) -> Result<Self> {
        let mut rows_btu = BTreeMap::new();
        for fuel in fuels {
            let table = bills.get(fuel).ok_or_else(|| {
                CalibrationError::BillData(format!("No bills for {}", fuel))
            })?;
            let mut rows = join_bills_weather(&table.periods, actual)?;
            for row in &mut rows {
                row.bill.consumption = to_btu(row.bill.consumption, table.unit, *fuel)?;
                row.daily_consumption = to_btu(row.daily_consumption, table.unit, *fuel)?;
            }
            rows_btu.insert(*fuel, rows);
        }

        Ok(Self {
            rows_btu,
            reference_temps_f: reference.daily_temps_f.clone(),
            max_cvrmse,
            models: HashMap::new(),
        })
    }

    pub fn fuels(&self) -> impl Iterator<Item = FuelType> + '_ {
        self.rows_btu.keys().copied()
    }

    pub fn rows(&self, fuel: FuelType) -> Option<&[WeatherJoinedBillRow]> {
        self.rows_btu.get(&fuel).map(Vec::as_slice)
    }

    /// Fit on first use, then reuse
    pub fn get_model(&mut self, fuel: FuelType) -> Result<&RegressionModel> {
        if !self.models.contains_key(&fuel) {
            let rows = self.rows_btu.get(&fuel).ok_or_else(|| {
                CalibrationError::ModelFit(format!("{} is not modelled by regression", fuel))
            })?;
            let model = fit_model(rows, self.max_cvrmse)?;
            log::info!(
                "{} bills fit with {} model, CVRMSE {:.1}%",
                fuel,
                model.variant.name(),
                model.cvrmse * 100.0
            );
            self.models.insert(fuel, model);
        }
        self.models
            .get(&fuel)
            .ok_or_else(|| CalibrationError::ModelFit(format!("No model for {}", fuel)))
    }

    /// Daily Btu split for each of the 365 reference-year days
    pub fn predict_epw_daily(&mut self, fuel: FuelType) -> Result<Vec<DisaggregatedUsage>> {
        let temps = self.reference_temps_f.clone();
        let model = self.get_model(fuel)?;
        Ok(model.predict_disaggregated(&temps))
    }

    /// Reference-year use over each bill's day-of-year window, MBtu
    pub fn normalized_consumption_per_bill(&mut self, fuel: FuelType) -> Result<Vec<NormalizedBill>> {
        let daily_mbtu: Vec<DisaggregatedUsage> = self
            .predict_epw_daily(fuel)?
            .into_iter()
            .map(|d| d.scaled(btu_to_mbtu(1.0)))
            .collect();
        let rows = self.rows_btu.get(&fuel).map(Vec::as_slice).unwrap_or_default();

        Ok(rows
            .iter()
            .map(|row| {
                let window = DayOfYearWindow::from_bill(&row.bill);
                NormalizedBill {
                    start_date: row.bill.start_date,
                    end_date: row.bill.end_date,
                    window,
                    usage: sum_window(&daily_mbtu, &window),
                }
            })
            .collect())
    }

    /// Weather-normalised annual use, MBtu.
    ///
    /// Window sums are scaled by 365 / total window days so bill records longer or
    /// shorter than a year still produce one year of use.
    pub fn annual_normalized(&mut self, fuel: FuelType) -> Result<DisaggregatedUsage> {
        let bills = self.normalized_consumption_per_bill(fuel)?;
        annualize(&bills)
    }
}

pub fn sum_window(daily: &[DisaggregatedUsage], window: &DayOfYearWindow) -> DisaggregatedUsage {
    window.days().filter_map(|day| daily.get(day - 1).copied()).sum()
}

pub fn annualize(bills: &[NormalizedBill]) -> Result<DisaggregatedUsage> {
    let days: usize = bills.iter().map(|b| b.window.len()).sum();
    if days == 0 {
        return Err(CalibrationError::BillData(
            "No bill days to normalise".to_string(),
        ));
    }
    let total: DisaggregatedUsage = bills.iter().map(|b| b.usage).sum();
    Ok(total.scaled(DAYS_PER_YEAR as f64 / days as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_window_wraps_year_end() {
        let daily: Vec<DisaggregatedUsage> = (1..=365)
            .map(|d| DisaggregatedUsage {
                baseload: 1.0,
                heating: d as f64,
                cooling: 0.0,
            })
            .collect();
        let window = DayOfYearWindow::new(350, 15);
        let sum = sum_window(&daily, &window);

        let expected_heating: f64 = (350..=365).chain(1..=15).map(|d| d as f64).sum();
        assert_eq!(sum.heating, expected_heating);
        assert_eq!(sum.baseload, 31.0);
    }

    #[test]
    fn test_annualize_scales_partial_year() {
        let bill = |start, end, base| NormalizedBill {
            start_date: NaiveDateTime::default(),
            end_date: NaiveDateTime::default(),
            window: DayOfYearWindow::new(start, end),
            usage: DisaggregatedUsage {
                baseload: base,
                heating: 0.0,
                cooling: 0.0,
            },
        };
        // 73 days of use at 1 MBtu/day
        let annual = annualize(&[bill(1, 73, 73.0)]).unwrap();
        assert!((annual.baseload - 365.0).abs() < 1e-9);
        assert!(annualize(&[]).is_err());
    }
}
