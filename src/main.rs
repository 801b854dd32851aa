//! Building model calibration against utility bills.
//!
//! Usage:
//!   bill-calibration --building home.json --weather-csv temps.csv calibrate --output out/
//!   bill-calibration --building home.json --weather-csv temps.csv existing-home
//!   bill-calibration --building home.json --weather-csv temps.csv check

use anyhow::{Context, Result};
use bill_calibration::config::ConfigManager;
use bill_calibration::data::{BuildingDocument, TemperatureSeries};
use bill_calibration::engines::generation::LogProgressCallback;
use bill_calibration::engines::simulation::CommandSimulationRunner;
use bill_calibration::Calibration;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bill-calibration")]
#[command(about = "Calibrate a building energy model against weather-normalized utility bills")]
struct Cli {
    /// Building document (JSON)
    #[arg(short, long)]
    building: PathBuf,

    /// Actual outdoor temperatures: CSV with `timestamp` and `temp_f` or `temp_c`
    #[arg(short, long)]
    weather_csv: PathBuf,

    /// Calibration settings (TOML or JSON); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Replace the building's bills with a CSV export before running
    #[arg(long)]
    bills_csv: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the genetic search
    Calibrate {
        /// Directory receiving the best model, its parameters and the logbook
        #[arg(short, long, default_value = "calibration_output")]
        output: PathBuf,

        /// Worker count (default: CPU count - 1)
        #[arg(long)]
        num_proc: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Simulate the building unchanged and report its errors against the bills
    ExistingHome,

    /// Validate the bills and fit the bill regressions without simulating
    Check,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let manager = ConfigManager::new();
    if let Some(path) = &cli.config {
        manager
            .load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?;
    }
    if let Commands::Calibrate { num_proc, seed, .. } = &cli.command {
        let (num_proc, seed) = (*num_proc, *seed);
        manager.update(|config| {
            if num_proc.is_some() {
                config.genetic_algorithm.num_proc = num_proc;
            }
            if seed.is_some() {
                config.genetic_algorithm.seed = seed;
            }
        })?;
    }
    let config = manager.get()?;

    let mut document = BuildingDocument::load(&cli.building)
        .with_context(|| format!("Failed to read building {}", cli.building.display()))?;
    if let Some(bills_csv) = &cli.bills_csv {
        document.add_consumption_from_csv(bills_csv)?;
        info!("Imported bills from {}", bills_csv.display());
    }

    let temperatures = TemperatureSeries::from_csv(&cli.weather_csv, document.utc_offset_hours())
        .with_context(|| format!("Failed to read weather {}", cli.weather_csv.display()))?;

    let runner = CommandSimulationRunner::new(config.simulation.clone());
    let calibration = Calibration::new(document, config, &temperatures)?;

    match cli.command {
        Commands::Calibrate { output, .. } => {
            let outcome = calibration.run(runner, &output, LogProgressCallback)?;
            if outcome.terminated_early {
                println!("Calibration finished early: error thresholds met.");
            } else {
                println!("Calibration finished without meeting the error thresholds.");
            }
            println!(
                "Best penalty {:.4}; results in {}",
                outcome.best.fitness_value(),
                output.display()
            );
            println!("{}", serde_json::to_string_pretty(&outcome.best_parameters)?);
        }
        Commands::ExistingHome => {
            let evaluation = calibration.evaluate_existing_home(runner)?;
            println!("Existing home penalty {:.4}", evaluation.fitness);
            println!("{}", serde_json::to_string_pretty(&evaluation.comparison)?);
        }
        Commands::Check => {
            for (fuel, model) in calibration.regression_models() {
                println!(
                    "{}: {} model, CVRMSE {:.1}%",
                    fuel,
                    model.variant.name(),
                    model.cvrmse * 100.0
                );
            }
            for delivered in calibration.oracle().delivered() {
                println!(
                    "{}: {:.1} MBtu over {} days (degree-day ratio method)",
                    delivered.fuel, delivered.measured_mbtu, delivered.num_days
                );
            }
        }
    }

    Ok(())
}
