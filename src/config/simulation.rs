use super::traits::ConfigSection;
use crate::error::CalibrationError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// External simulator command contract.
///
/// Arguments may contain the placeholders `{workflow}`, `{model}` and `{output_dir}`,
/// substituted per evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub program: String,
    pub modify_args: Vec<String>,
    pub simulate_args: Vec<String>,
    /// Directories searched for the model-modification measure
    pub measure_paths: Vec<PathBuf>,
    /// Annual results location, relative to the evaluation output directory
    pub annual_results_path: PathBuf,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            program: "openstudio".to_string(),
            modify_args: vec!["run".into(), "-m".into(), "-w".into(), "{workflow}".into()],
            simulate_args: vec![
                "run-sim".into(),
                "{model}".into(),
                "--output-dir".into(),
                "{output_dir}".into(),
                "--output-format".into(),
                "json".into(),
            ],
            measure_paths: Vec::new(),
            annual_results_path: PathBuf::from("run").join("results_annual.json"),
        }
    }
}

impl ConfigSection for SimulationConfig {
    fn section_name() -> &'static str {
        "simulation"
    }

    fn validate(&self) -> Result<(), CalibrationError> {
        if self.program.trim().is_empty() {
            return Err(CalibrationError::Configuration(
                "simulation.program must not be empty".to_string(),
            ));
        }
        if !self.simulate_args.iter().any(|a| a.contains("{model}")) {
            return Err(CalibrationError::Configuration(
                "simulation.simulate_args must reference {model}".to_string(),
            ));
        }
        if self.annual_results_path.is_absolute() {
            return Err(CalibrationError::Configuration(
                "simulation.annual_results_path must be relative to the output directory"
                    .to_string(),
            ));
        }
        Ok(())
    }
}
