use super::traits::ConfigSection;
use crate::error::CalibrationError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UtilityBillCriteriaConfig {
    pub min_num_electrical_bills: usize,
    pub min_days_of_consumption_data: i64,
    pub max_years: i64,
    pub min_electrical_bill_days: i64,
    pub max_electrical_bill_days: i64,
    /// Fuels with fewer periods use the degree-day ratio method
    pub min_bills_for_regression: usize,
}

impl Default for UtilityBillCriteriaConfig {
    fn default() -> Self {
        Self {
            min_num_electrical_bills: 10,
            min_days_of_consumption_data: 330,
            max_years: 5,
            min_electrical_bill_days: 20,
            max_electrical_bill_days: 45,
            min_bills_for_regression: 6,
        }
    }
}

impl ConfigSection for UtilityBillCriteriaConfig {
    fn section_name() -> &'static str {
        "utility_bill_criteria"
    }

    fn validate(&self) -> Result<(), CalibrationError> {
        if self.min_electrical_bill_days > self.max_electrical_bill_days {
            return Err(CalibrationError::Configuration(
                "min_electrical_bill_days cannot exceed max_electrical_bill_days".to_string(),
            ));
        }
        if self.max_years < 1 {
            return Err(CalibrationError::Configuration(
                "max_years must be at least 1".to_string(),
            ));
        }
        if self.min_bills_for_regression < 3 {
            return Err(CalibrationError::Configuration(
                "At least 3 bills are needed to fit a regression model".to_string(),
            ));
        }
        Ok(())
    }
}
