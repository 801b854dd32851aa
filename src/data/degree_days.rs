use crate::units::round_to;
use serde::{Deserialize, Serialize};

pub const BASE_TEMP_F: f64 = 65.0;

/// Heating and cooling degree days at the 65 F base
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DegreeDays {
    pub hdd65f: f64,
    pub cdd65f: f64,
}

impl DegreeDays {
    pub fn from_daily_temps(daily_temps_f: &[f64]) -> Self {
        Self {
            hdd65f: calc_degree_days(daily_temps_f, BASE_TEMP_F, true),
            cdd65f: calc_degree_days(daily_temps_f, BASE_TEMP_F, false),
        }
    }

    pub fn rounded(&self) -> Self {
        Self {
            hdd65f: self.hdd65f.round(),
            cdd65f: self.cdd65f.round(),
        }
    }
}

impl std::ops::Add for DegreeDays {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            hdd65f: self.hdd65f + rhs.hdd65f,
            cdd65f: self.cdd65f + rhs.cdd65f,
        }
    }
}

impl std::iter::Sum for DegreeDays {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, dd| acc + dd)
    }
}

/// Sum of daily departures below (heating) or above (cooling) `base_temp_f`, to 0.01
pub fn calc_degree_days(daily_temps_f: &[f64], base_temp_f: f64, is_heating: bool) -> f64 {
    let total: f64 = daily_temps_f
        .iter()
        .map(|t| {
            if is_heating {
                (base_temp_f - t).max(0.0)
            } else {
                (t - base_temp_f).max(0.0)
            }
        })
        .sum();
    round_to(total, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degree_days() {
        let temps = [60.0, 65.0, 70.5, 50.25];
        assert_eq!(calc_degree_days(&temps, 65.0, true), 19.75);
        assert_eq!(calc_degree_days(&temps, 65.0, false), 5.5);
        assert_eq!(calc_degree_days(&[], 65.0, true), 0.0);
    }

    #[test]
    fn test_sum_and_round() {
        let total: DegreeDays = [
            DegreeDays { hdd65f: 10.4, cdd65f: 0.0 },
            DegreeDays { hdd65f: 0.3, cdd65f: 2.6 },
        ]
        .into_iter()
        .sum();
        assert_eq!(total.rounded(), DegreeDays { hdd65f: 11.0, cdd65f: 3.0 });
    }
}
