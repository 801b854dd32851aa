use bill_calibration::config::SimulationConfig;
use bill_calibration::engines::comparison::ComparisonOracle;
use bill_calibration::engines::generation::{
    penalty, FitnessEvaluator, SimulationEvaluator, WorkerPool, RUN_DIR_PREFIX,
};
use bill_calibration::engines::simulation::SimulationRunner;
use bill_calibration::types::{DisaggregatedUsage, EndUse, FuelType};
use bill_calibration::CalibrationError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const ANNUAL_RESULTS: &str = r#"{"End Use": {"Electricity: Lighting Interior": 9.0, "Electricity: Cooling": 4.0}}"#;

fn oracle() -> ComparisonOracle {
    let mut normalized = BTreeMap::new();
    normalized.insert(
        FuelType::Electricity,
        DisaggregatedUsage {
            baseload: 10.0,
            heating: 0.0,
            cooling: 4.0,
        },
    );
    ComparisonOracle::new(normalized, Vec::new(), false)
}

fn parameters() -> BTreeMap<String, f64> {
    let mut params = BTreeMap::new();
    params.insert("misc_load_multiplier".to_string(), 1.1);
    params.insert("heating_setpoint_offset".to_string(), -1.0);
    params
}

fn leftover_run_dirs(root: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(root) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |n| n.starts_with(RUN_DIR_PREFIX))
            })
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// In-process simulator that writes a fixed annual results document
struct FakeRunner {
    results: String,
    fail_modification: bool,
    panic_in_simulation: bool,
}

impl FakeRunner {
    fn new(results: &str) -> Self {
        Self {
            results: results.to_string(),
            fail_modification: false,
            panic_in_simulation: false,
        }
    }
}

impl SimulationRunner for FakeRunner {
    fn apply_parameters(
        &self,
        _source_model: &Path,
        parameters: &BTreeMap<String, f64>,
        target_model: &Path,
    ) -> bill_calibration::Result<()> {
        if self.fail_modification {
            return Err(CalibrationError::Simulation("measure crashed".to_string()));
        }
        std::fs::write(target_model, serde_json::to_string(parameters)?)?;
        Ok(())
    }

    fn simulate(&self, _model: &Path, output_dir: &Path) -> bill_calibration::Result<PathBuf> {
        if self.panic_in_simulation {
            panic!("simulator aborted");
        }
        let path = output_dir.join("results_annual.json");
        std::fs::write(&path, &self.results)?;
        Ok(path)
    }
}

#[test]
fn test_evaluation_scores_simulated_results() {
    let root = tempfile::tempdir().unwrap();
    let evaluator = SimulationEvaluator::new(
        FakeRunner::new(ANNUAL_RESULTS),
        oracle(),
        PathBuf::from("home.xml"),
    )
    .with_temp_root(root.path().to_path_buf());

    let evaluation = evaluator.evaluate(&parameters()).unwrap();

    let expected = oracle()
        .compare(evaluation.simulated.as_ref().unwrap())
        .unwrap();
    assert_eq!(evaluation.fitness, penalty(&expected));
    assert!(evaluation.fitness > 0.0);
    let electricity = &evaluation.comparison[&FuelType::Electricity];
    assert_eq!(electricity.bias_error[&EndUse::Baseload], 10.0);
    assert_eq!(electricity.bias_error[&EndUse::Cooling], 0.0);

    let run_dir = evaluation.run_dir.unwrap();
    assert!(run_dir.starts_with(root.path()));
    assert!(run_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap()
        .starts_with(RUN_DIR_PREFIX));
    assert!(run_dir.join("modified.xml").exists());
}

#[test]
fn test_failed_evaluation_removes_its_directory() {
    let root = tempfile::tempdir().unwrap();
    let mut runner = FakeRunner::new(ANNUAL_RESULTS);
    runner.fail_modification = true;
    let evaluator = SimulationEvaluator::new(runner, oracle(), PathBuf::from("home.xml"))
        .with_temp_root(root.path().to_path_buf());

    assert!(matches!(
        evaluator.evaluate(&parameters()),
        Err(CalibrationError::Simulation(_))
    ));
    assert!(leftover_run_dirs(root.path()).is_empty());
}

#[test]
fn test_panicking_simulation_removes_its_directory() {
    let root = tempfile::tempdir().unwrap();
    let mut runner = FakeRunner::new(ANNUAL_RESULTS);
    runner.panic_in_simulation = true;
    let evaluator = SimulationEvaluator::new(runner, oracle(), PathBuf::from("home.xml"))
        .with_temp_root(root.path().to_path_buf());

    let pool = WorkerPool::new(1).unwrap();
    let evaluations = pool.evaluate_all(&evaluator, &[parameters()]);
    assert_eq!(evaluations.len(), 1);
    assert!(evaluations[0].fitness.is_infinite());
    assert!(leftover_run_dirs(root.path()).is_empty());
}

#[test]
fn test_results_with_nothing_comparable_are_rejected() {
    let root = tempfile::tempdir().unwrap();
    let evaluator = SimulationEvaluator::new(
        FakeRunner::new(r#"{"End Use": {"Natural Gas: Heating": 50.0}}"#),
        oracle(),
        PathBuf::from("home.xml"),
    )
    .with_temp_root(root.path().to_path_buf());

    assert!(matches!(
        evaluator.evaluate(&parameters()),
        Err(CalibrationError::ResultsFormat(_))
    ));
    assert!(leftover_run_dirs(root.path()).is_empty());
}

#[test]
fn test_modified_model_keeps_source_extension() {
    let evaluator = SimulationEvaluator::new(
        FakeRunner::new(ANNUAL_RESULTS),
        oracle(),
        PathBuf::from("/data/home.hpxml"),
    );
    assert_eq!(evaluator.modified_model_name(), "modified.hpxml");
}

#[cfg(unix)]
mod command_runner {
    use super::*;
    use bill_calibration::engines::comparison::SimulationResults;
    use bill_calibration::engines::simulation::{CommandSimulationRunner, MODIFY_MEASURE_NAME};

    fn shell(modify: &str, simulate: &str) -> CommandSimulationRunner {
        CommandSimulationRunner::new(SimulationConfig {
            program: "sh".to_string(),
            modify_args: vec![
                "-c".to_string(),
                modify.to_string(),
                "{workflow}".to_string(),
                "{model}".to_string(),
            ],
            simulate_args: vec![
                "-c".to_string(),
                simulate.to_string(),
                "{model}".to_string(),
                "{output_dir}".to_string(),
            ],
            ..SimulationConfig::default()
        })
    }

    /// Copies the workflow to the model path, then writes annual results under `run/`
    fn working_shell() -> CommandSimulationRunner {
        shell(
            r#"cp "$0" "$1""#,
            &format!(
                r#"mkdir -p "$1/run" && printf '%s' '{}' > "$1/run/results_annual.json""#,
                ANNUAL_RESULTS
            ),
        )
    }

    #[test]
    fn test_modification_receives_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("modified.xml");
        working_shell()
            .apply_parameters(Path::new("/data/home.xml"), &parameters(), &target)
            .unwrap();

        let written = std::fs::read_to_string(&target).unwrap();
        let workflow: serde_json::Value = serde_json::from_str(&written).unwrap();
        let step = &workflow["steps"][0];
        assert_eq!(step["measure_dir_name"], MODIFY_MEASURE_NAME);
        assert_eq!(step["arguments"]["misc_load_multiplier"], 1.1);
        assert_eq!(step["arguments"]["xml_file_path"], "/data/home.xml");
    }

    #[test]
    fn test_modification_must_write_the_model() {
        let dir = tempfile::tempdir().unwrap();
        let runner = shell("true", "true");
        let err = runner
            .apply_parameters(Path::new("home.xml"), &parameters(), &dir.path().join("m.xml"))
            .unwrap_err();
        assert!(matches!(err, CalibrationError::Simulation(m) if m.contains("did not write")));
    }

    #[test]
    fn test_simulation_returns_annual_results() {
        let dir = tempfile::tempdir().unwrap();
        let results = working_shell()
            .simulate(&dir.path().join("modified.xml"), dir.path())
            .unwrap();
        assert_eq!(results, dir.path().join("run").join("results_annual.json"));

        let parsed = SimulationResults::load(&results, false).unwrap();
        assert_eq!(parsed.get(FuelType::Electricity, EndUse::Baseload), Some(9.0));
    }

    #[test]
    fn test_nonzero_exit_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let runner = shell("true", "echo 'weather file missing' >&2; exit 3");
        let err = runner
            .simulate(&dir.path().join("modified.xml"), dir.path())
            .unwrap_err();
        assert!(
            matches!(&err, CalibrationError::Simulation(m) if m.contains("weather file missing")),
            "{}",
            err
        );
    }

    #[test]
    fn test_missing_results_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = shell("true", "true")
            .simulate(&dir.path().join("modified.xml"), dir.path())
            .unwrap_err();
        assert!(matches!(err, CalibrationError::Simulation(m) if m.contains("without annual results")));
    }

    #[test]
    fn test_unknown_program_fails_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let runner = CommandSimulationRunner::new(SimulationConfig {
            program: "no-such-simulator-binary".to_string(),
            ..SimulationConfig::default()
        });
        let err = runner
            .simulate(&dir.path().join("modified.xml"), dir.path())
            .unwrap_err();
        assert!(matches!(err, CalibrationError::Simulation(m) if m.contains("Failed to start")));
    }

    #[test]
    fn test_command_runner_drives_an_evaluation() {
        let root = tempfile::tempdir().unwrap();
        let evaluator =
            SimulationEvaluator::new(working_shell(), oracle(), root.path().join("home.xml"))
                .with_temp_root(root.path().join("runs"));

        let evaluation = evaluator.evaluate(&parameters()).unwrap();
        assert!(evaluation.fitness.is_finite());
        let run_dir = evaluation.run_dir.unwrap();
        assert!(run_dir.join("modified.xml").exists());
        assert!(run_dir.join("run").join("results_annual.json").exists());
    }
}
