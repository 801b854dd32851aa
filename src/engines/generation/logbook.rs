use super::genome::GeneSpace;
use super::individual::{diversity, Individual};
use crate::error::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Statistics of one generation plus the errors of its best individual
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRecord {
    pub generation: usize,
    pub evaluations: usize,
    pub min_fitness: f64,
    pub avg_fitness: f64,
    pub diversity: f64,
    /// Keyed `"<fuel>_<end use>"`, e.g. `"natural_gas_heating"`
    pub bias_error: BTreeMap<String, f64>,
    pub abs_error: BTreeMap<String, f64>,
    /// JSON object of parameter name to value
    pub best_individual: String,
    /// JSON of the best individual's simulated annual results
    pub best_individual_sim_results: String,
}

impl GenerationRecord {
    pub fn from_population(
        generation: usize,
        evaluations: usize,
        population: &[Individual],
        best: &Individual,
        space: &GeneSpace,
    ) -> Result<Self> {
        let fitness: Vec<f64> = population.iter().map(|i| i.fitness_value()).collect();
        let min_fitness = fitness.iter().copied().fold(f64::INFINITY, f64::min);
        let avg_fitness = if fitness.is_empty() {
            f64::INFINITY
        } else {
            fitness.iter().sum::<f64>() / fitness.len() as f64
        };

        let mut bias_error = BTreeMap::new();
        let mut abs_error = BTreeMap::new();
        for (fuel, result) in &best.comparison {
            for (end_use, value) in &result.bias_error {
                bias_error.insert(format!("{}_{}", fuel.key(), end_use), *value);
            }
            for (end_use, value) in &result.absolute_error {
                abs_error.insert(format!("{}_{}", fuel.key(), end_use), *value);
            }
        }

        Ok(Self {
            generation,
            evaluations,
            min_fitness,
            avg_fitness,
            diversity: diversity(population),
            bias_error,
            abs_error,
            best_individual: serde_json::to_string(&space.decode(&best.genome))?,
            best_individual_sim_results: serde_json::to_string(&best.simulated)?,
        })
    }

    /// One-line summary in logbook column order
    pub fn stream_line(&self) -> String {
        format!(
            "gen {:>3}  nevals {:>3}  min {:>10.4}  avg {:>10.4}  diversity {:.3}",
            self.generation, self.evaluations, self.min_fitness, self.avg_fitness, self.diversity
        )
    }
}

/// Append-only record of a search run
#[derive(Debug, Clone, Default, Serialize)]
pub struct Logbook {
    records: Vec<GenerationRecord>,
}

impl Logbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: GenerationRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[GenerationRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&GenerationRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bias error of the best individual per generation for one `"<fuel>_<end use>"` key
    pub fn bias_series(&self, key: &str) -> Vec<Option<f64>> {
        self.records
            .iter()
            .map(|r| r.bias_error.get(key).copied())
            .collect()
    }

    pub fn abs_series(&self, key: &str) -> Vec<Option<f64>> {
        self.records
            .iter()
            .map(|r| r.abs_error.get(key).copied())
            .collect()
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.records)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
