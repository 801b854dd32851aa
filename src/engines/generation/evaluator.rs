use super::individual::Evaluation;
use crate::engines::comparison::{Comparison, ComparisonOracle};
use crate::engines::simulation::SimulationRunner;
use crate::error::{CalibrationError, Result};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempDir};

/// Prefix of every per-evaluation artifact directory
pub const RUN_DIR_PREFIX: &str = "calib_";

/// Scores one decoded parameter set. Called concurrently from the worker pool.
pub trait FitnessEvaluator: Send + Sync {
    fn evaluate(&self, parameters: &BTreeMap<String, f64>) -> Result<Evaluation>;
}

/// Sum over fuel / end use of `log1p(|bias|)^2 + log1p(|abs|)^2`.
///
/// NaN bias errors (nothing billed for that end use) add no bias term; their
/// absolute error still counts.
pub fn penalty(comparison: &Comparison) -> f64 {
    let term = |err: f64| err.abs().ln_1p().max(0.0).powi(2);

    comparison
        .values()
        .map(|result| {
            let bias: f64 = result
                .bias_error
                .values()
                .filter(|b| !b.is_nan())
                .map(|b| term(*b))
                .sum();
            let abs: f64 = result.absolute_error.values().map(|a| term(*a)).sum();
            bias + abs
        })
        .sum()
}

/// Evaluates a parameter set by modifying and simulating a private copy of the model.
pub struct SimulationEvaluator<R: SimulationRunner> {
    runner: R,
    oracle: ComparisonOracle,
    source_model: PathBuf,
    temp_root: Option<PathBuf>,
}

impl<R: SimulationRunner> SimulationEvaluator<R> {
    pub fn new(runner: R, oracle: ComparisonOracle, source_model: PathBuf) -> Self {
        Self {
            runner,
            oracle,
            source_model,
            temp_root: None,
        }
    }

    /// Create artifact directories under `root` instead of the system temp directory
    pub fn with_temp_root(mut self, root: PathBuf) -> Self {
        self.temp_root = Some(root);
        self
    }

    pub fn oracle(&self) -> &ComparisonOracle {
        &self.oracle
    }

    /// File name of the modified model inside an artifact directory
    pub fn modified_model_name(&self) -> String {
        let ext = self
            .source_model
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("xml");
        format!("modified.{}", ext)
    }

    /// Scratch directory removed on drop unless the evaluation succeeds
    fn create_run_dir(&self) -> Result<TempDir> {
        let mut builder = Builder::new();
        builder.prefix(RUN_DIR_PREFIX);
        let dir = match &self.temp_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    fn evaluate_in(&self, run_dir: &Path, parameters: &BTreeMap<String, f64>) -> Result<Evaluation> {
        let model = run_dir.join(self.modified_model_name());
        self.runner
            .apply_parameters(&self.source_model, parameters, &model)?;
        let results_path = self.runner.simulate(&model, run_dir)?;
        let simulated = self.oracle.load_results(&results_path)?;
        let comparison = self.oracle.compare(&simulated)?;

        if comparison.is_empty() {
            return Err(CalibrationError::ResultsFormat(format!(
                "No simulated end use could be compared in {}",
                results_path.display()
            )));
        }
        for (fuel, result) in &comparison {
            for (end_use, bias) in &result.bias_error {
                if bias.is_nan() {
                    warn!(
                        "{} {} has no bill-derived use; bias error is not comparable",
                        fuel, end_use
                    );
                }
            }
        }

        let fitness = penalty(&comparison);
        debug!("Evaluated {} -> penalty {:.4}", run_dir.display(), fitness);
        Ok(Evaluation {
            fitness,
            comparison,
            run_dir: Some(run_dir.to_path_buf()),
            simulated: Some(simulated),
        })
    }
}

impl<R: SimulationRunner> FitnessEvaluator for SimulationEvaluator<R> {
    fn evaluate(&self, parameters: &BTreeMap<String, f64>) -> Result<Evaluation> {
        // Dropped on error or unwinding panic, which removes the directory
        let run_dir = self.create_run_dir()?;
        let mut evaluation = self.evaluate_in(run_dir.path(), parameters)?;
        evaluation.run_dir = Some(run_dir.keep());
        Ok(evaluation)
    }
}
