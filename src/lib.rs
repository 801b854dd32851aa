pub mod calibration;
pub mod config;
pub mod data;
pub mod engines;
pub mod error;
pub mod types;
pub mod units;

pub use calibration::Calibration;
pub use error::{CalibrationError, Result};
