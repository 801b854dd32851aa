//! Run orchestration: pre-flight validation, bill normalisation, search, persistence.

use crate::config::CalibrationConfig;
use crate::data::{load_bills, BillTable, BuildingDocument, DataValidator, EpwWeather, TemperatureSeries};
use crate::engines::comparison::{ComparisonOracle, DeliveredFuelInputs};
use crate::engines::generation::{
    EvolutionConfig, EvolutionEngine, Evaluation, FitnessEvaluator, GeneSpace, ProgressCallback,
    SearchOutcome, SimulationEvaluator,
};
use crate::engines::normalization::InverseModel;
use crate::engines::regression::RegressionModel;
use crate::engines::simulation::SimulationRunner;
use crate::error::Result;
use crate::types::{DisaggregatedUsage, FuelType};
use chrono::NaiveDateTime;
use log::{info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Logbook file written to the output directory
pub const LOGBOOK_FILE_NAME: &str = "logbook.json";
/// Best parameter set written to the output directory
pub const BEST_PARAMETERS_FILE_NAME: &str = "best_individual.json";

/// A validated calibration problem for one building
pub struct Calibration {
    document: BuildingDocument,
    config: CalibrationConfig,
    bills: BTreeMap<FuelType, BillTable>,
    models: BTreeMap<FuelType, RegressionModel>,
    oracle: ComparisonOracle,
}

impl Calibration {
    pub fn new(
        document: BuildingDocument,
        config: CalibrationConfig,
        actual_weather: &TemperatureSeries,
    ) -> Result<Self> {
        Self::new_at(
            document,
            config,
            actual_weather,
            chrono::Local::now().naive_local(),
        )
    }

    /// Same as [`Self::new`] with an explicit clock for the bill-age checks
    pub fn new_at(
        document: BuildingDocument,
        config: CalibrationConfig,
        actual_weather: &TemperatureSeries,
        now: NaiveDateTime,
    ) -> Result<Self> {
        config.validate()?;
        DataValidator::validate_at(&document, &config.utility_bill_criteria, now)?;

        let bills = load_bills(&document, None)?;
        let reference = EpwWeather::load(document.epw_path()?)?;
        let min_bills = config.utility_bill_criteria.min_bills_for_regression;

        let mut regression_fuels = Vec::new();
        let mut ratio_fuels = Vec::new();
        for (fuel, table) in &bills {
            if !fuel.is_delivered() && table.len() >= min_bills {
                regression_fuels.push(*fuel);
            } else {
                ratio_fuels.push(*fuel);
            }
        }

        let mut inverse = InverseModel::new(
            &bills,
            &regression_fuels,
            actual_weather,
            &reference,
            config.acceptance_criteria.bill_regression_max_cvrmse,
        )?;

        let mut normalized: BTreeMap<FuelType, DisaggregatedUsage> = BTreeMap::new();
        let mut models = BTreeMap::new();
        for fuel in &regression_fuels {
            match inverse.annual_normalized(*fuel) {
                Ok(usage) => {
                    info!(
                        "{} normalized annual use: baseload {:.1}, heating {:.1}, cooling {:.1} MBtu",
                        fuel, usage.baseload, usage.heating, usage.cooling
                    );
                    normalized.insert(*fuel, usage);
                    models.insert(*fuel, inverse.get_model(*fuel)?.clone());
                }
                Err(e) if *fuel == FuelType::Electricity => return Err(e),
                Err(e) => {
                    warn!(
                        "{} bill regression failed ({}); using the degree-day ratio method",
                        fuel, e
                    );
                    ratio_fuels.push(*fuel);
                }
            }
        }

        let delivered = ratio_fuels
            .iter()
            .filter_map(|fuel| bills.get(fuel))
            .map(|table| DeliveredFuelInputs::from_bills(table, &reference, actual_weather))
            .collect::<Result<Vec<_>>>()?;

        let electricity_heats = document.heating_fuels().contains(&FuelType::Electricity);
        let oracle = ComparisonOracle::new(normalized, delivered, electricity_heats);

        Ok(Self {
            document,
            config,
            bills,
            models,
            oracle,
        })
    }

    pub fn document(&self) -> &BuildingDocument {
        &self.document
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    pub fn bills(&self) -> &BTreeMap<FuelType, BillTable> {
        &self.bills
    }

    /// Fitted bill regression per fuel
    pub fn regression_models(&self) -> &BTreeMap<FuelType, RegressionModel> {
        &self.models
    }

    pub fn oracle(&self) -> &ComparisonOracle {
        &self.oracle
    }

    fn evaluator<R: SimulationRunner>(&self, runner: R) -> SimulationEvaluator<R> {
        SimulationEvaluator::new(
            runner,
            self.oracle.clone(),
            self.document.simulation_model_path(),
        )
    }

    /// Evaluate the building as described, every gene at its neutral value
    pub fn evaluate_existing_home<R: SimulationRunner>(&self, runner: R) -> Result<Evaluation> {
        let space = GeneSpace::from_config(&self.config.value_choices)?;
        let parameters = space.decode(&space.neutral_genome()?);
        let evaluator = self.evaluator(runner);

        let mut evaluation = evaluator.evaluate(&parameters)?;
        for (fuel, result) in &evaluation.comparison {
            for (end_use, bias) in &result.bias_error {
                info!(
                    "Existing home {} {}: bias error {:.1}%, absolute error {:.1}",
                    fuel, end_use, bias, result.absolute_error.get(end_use).copied().unwrap_or(f64::NAN)
                );
            }
        }
        if let Some(dir) = evaluation.run_dir.take() {
            std::fs::remove_dir_all(dir)?;
        }
        Ok(evaluation)
    }

    /// Run the search and write its products to `output_dir`.
    ///
    /// Writes the best model as `best_individual.<ext>`, its parameters and the logbook.
    /// All evaluation artifact directories are removed before returning.
    pub fn run<R, C>(&self, runner: R, output_dir: &Path, callback: C) -> Result<SearchOutcome>
    where
        R: SimulationRunner,
        C: ProgressCallback,
    {
        std::fs::create_dir_all(output_dir)?;

        let space = GeneSpace::from_config(&self.config.value_choices)?;
        let mut engine = EvolutionEngine::new(
            EvolutionConfig::from(&self.config.genetic_algorithm),
            self.config.acceptance_criteria.clone(),
            space,
            self.evaluator(runner),
        )?;
        let mut outcome = engine.run(callback)?;

        if let Some(dir) = outcome.best_run_dir() {
            let model_name = engine.evaluator().modified_model_name();
            let source = dir.join(&model_name);
            if source.exists() {
                let target = output_dir.join(best_model_name(&model_name));
                std::fs::copy(&source, &target)?;
                info!("Best model written to {}", target.display());
            } else {
                warn!("Best individual has no modified model at {}", source.display());
            }
        }

        outcome.logbook.write_json(output_dir.join(LOGBOOK_FILE_NAME))?;
        std::fs::write(
            output_dir.join(BEST_PARAMETERS_FILE_NAME),
            serde_json::to_string_pretty(&outcome.best_parameters)?,
        )?;
        outcome.discard_artifacts()?;

        Ok(outcome)
    }
}

fn best_model_name(modified_name: &str) -> PathBuf {
    let ext = Path::new(modified_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("xml");
    PathBuf::from(format!("best_individual.{}", ext))
}
