use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("Data validation error: {0}")]
    DataValidation(String),

    #[error("Bill data error: {0}")]
    BillData(String),

    #[error("Weather data error: {0}")]
    Weather(String),

    #[error("Model fit error: {0}")]
    ModelFit(String),

    #[error("Model quality error: CVRMSE = {:.1}%, which is greater than {:.1}%", cvrmse * 100.0, threshold * 100.0)]
    ModelQuality { cvrmse: f64, threshold: f64 },

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Results format error: {0}")]
    ResultsFormat(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, CalibrationError>;
