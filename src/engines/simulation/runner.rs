use crate::config::SimulationConfig;
use crate::error::{CalibrationError, Result};
use log::debug;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

/// File name of the workflow written next to each modified model
pub const WORKFLOW_FILE_NAME: &str = "modify_model.osw";

/// Measure that applies the calibration parameters to a building model
pub const MODIFY_MEASURE_NAME: &str = "ModifyXML";

/// Collaborator that turns a parameter set into simulated annual results.
///
/// Implementations are called concurrently from the worker pool, one private
/// output directory per call.
pub trait SimulationRunner: Send + Sync {
    /// Write a copy of `source_model` with `parameters` applied to `target_model`.
    fn apply_parameters(
        &self,
        source_model: &Path,
        parameters: &BTreeMap<String, f64>,
        target_model: &Path,
    ) -> Result<()>;

    /// Simulate `model`, returning the path of the annual results document.
    fn simulate(&self, model: &Path, output_dir: &Path) -> Result<PathBuf>;
}

/// Runs an external simulator through the commands configured in [`SimulationConfig`].
#[derive(Debug, Clone)]
pub struct CommandSimulationRunner {
    config: SimulationConfig,
}

impl CommandSimulationRunner {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Workflow document for the modification measure
    pub fn workflow_json(
        &self,
        source_model: &Path,
        parameters: &BTreeMap<String, f64>,
        target_model: &Path,
    ) -> Value {
        let mut arguments = Map::new();
        arguments.insert(
            "xml_file_path".to_string(),
            Value::String(source_model.display().to_string()),
        );
        arguments.insert(
            "save_file_path".to_string(),
            Value::String(target_model.display().to_string()),
        );
        for (name, value) in parameters {
            arguments.insert(name.clone(), json!(value));
        }

        let run_directory = target_model
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let measure_paths: Vec<String> = self
            .config
            .measure_paths
            .iter()
            .map(|p| p.display().to_string())
            .collect();

        json!({
            "run_directory": run_directory,
            "measure_paths": measure_paths,
            "steps": [{
                "measure_dir_name": MODIFY_MEASURE_NAME,
                "arguments": Value::Object(arguments),
            }],
        })
    }

    fn write_workflow(
        &self,
        source_model: &Path,
        parameters: &BTreeMap<String, f64>,
        target_model: &Path,
    ) -> Result<PathBuf> {
        let dir = target_model.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let workflow_path = dir.join(WORKFLOW_FILE_NAME);
        let workflow = self.workflow_json(source_model, parameters, target_model);
        std::fs::write(&workflow_path, serde_json::to_string_pretty(&workflow)?)?;
        Ok(workflow_path)
    }

    fn run(&self, args: &[String], stage: &str) -> Result<()> {
        debug!("Running {} {}: {:?}", stage, self.config.program, args);
        let output = Command::new(&self.config.program)
            .args(args)
            .output()
            .map_err(|e| {
                CalibrationError::Simulation(format!(
                    "Failed to start {} for {}: {}",
                    self.config.program, stage, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CalibrationError::Simulation(format!(
                "{} exited with {} during {}: {}",
                self.config.program,
                output.status,
                stage,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Replace `{workflow}`, `{model}` and `{output_dir}` in every argument
pub fn substitute_placeholders(
    args: &[String],
    workflow: Option<&Path>,
    model: &Path,
    output_dir: &Path,
) -> Vec<String> {
    let workflow = workflow.map(|p| p.display().to_string()).unwrap_or_default();
    let model = model.display().to_string();
    let output_dir = output_dir.display().to_string();
    args.iter()
        .map(|arg| {
            arg.replace("{workflow}", &workflow)
                .replace("{model}", &model)
                .replace("{output_dir}", &output_dir)
        })
        .collect()
}

impl SimulationRunner for CommandSimulationRunner {
    fn apply_parameters(
        &self,
        source_model: &Path,
        parameters: &BTreeMap<String, f64>,
        target_model: &Path,
    ) -> Result<()> {
        let workflow = self.write_workflow(source_model, parameters, target_model)?;
        let output_dir = target_model.parent().unwrap_or_else(|| Path::new("."));
        let args = substitute_placeholders(
            &self.config.modify_args,
            Some(&workflow),
            target_model,
            output_dir,
        );
        self.run(&args, "model modification")?;

        if !target_model.exists() {
            return Err(CalibrationError::Simulation(format!(
                "Model modification did not write {}",
                target_model.display()
            )));
        }
        Ok(())
    }

    fn simulate(&self, model: &Path, output_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(output_dir)?;
        let args = substitute_placeholders(&self.config.simulate_args, None, model, output_dir);
        self.run(&args, "simulation")?;

        let results = output_dir.join(&self.config.annual_results_path);
        if !results.exists() {
            return Err(CalibrationError::Simulation(format!(
                "Simulation finished without annual results at {}",
                results.display()
            )));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_substituted_inside_arguments() {
        let args = vec![
            "--workflow={workflow}".to_string(),
            "{model}".to_string(),
            "{output_dir}/out".to_string(),
        ];
        let out = substitute_placeholders(
            &args,
            Some(Path::new("/tmp/w.osw")),
            Path::new("/tmp/m.xml"),
            Path::new("/tmp/run"),
        );
        assert_eq!(out, vec!["--workflow=/tmp/w.osw", "/tmp/m.xml", "/tmp/run/out"]);
    }

    #[test]
    fn test_workflow_carries_paths_and_parameters() {
        let runner = CommandSimulationRunner::new(SimulationConfig {
            measure_paths: vec![PathBuf::from("/opt/measures")],
            ..SimulationConfig::default()
        });
        let mut params = BTreeMap::new();
        params.insert("heating_setpoint_offset".to_string(), -2.0);

        let wf = runner.workflow_json(
            Path::new("/data/home.xml"),
            &params,
            Path::new("/tmp/calib_x/modified.xml"),
        );
        assert_eq!(wf["run_directory"], "/tmp/calib_x");
        assert_eq!(wf["measure_paths"][0], "/opt/measures");
        let step = &wf["steps"][0];
        assert_eq!(step["measure_dir_name"], MODIFY_MEASURE_NAME);
        assert_eq!(step["arguments"]["xml_file_path"], "/data/home.xml");
        assert_eq!(step["arguments"]["heating_setpoint_offset"], -2.0);
    }
}
