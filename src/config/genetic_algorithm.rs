use super::traits::{check_probability, ConfigSection};
use crate::error::CalibrationError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticAlgorithmConfig {
    pub population_size: usize,
    pub generations: usize,
    pub crossover_probability: f64,
    pub mutation_probability: f64,
    /// Per-gene swap probability of uniform crossover. Falls back to `crossover_probability`.
    pub gene_swap_probability: Option<f64>,
    pub tournament_size: usize,
    pub hall_of_fame_size: usize,
    /// Worker count. Defaults to CPU count - 1.
    pub num_proc: Option<usize>,
    pub seed: Option<u64>,
}

impl Default for GeneticAlgorithmConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            generations: 10,
            crossover_probability: 0.5,
            mutation_probability: 0.5,
            gene_swap_probability: None,
            tournament_size: 2,
            hall_of_fame_size: 1,
            num_proc: None,
            seed: None,
        }
    }
}

impl GeneticAlgorithmConfig {
    pub fn effective_gene_swap_probability(&self) -> f64 {
        self.gene_swap_probability
            .unwrap_or(self.crossover_probability)
    }

    pub fn effective_num_proc(&self) -> usize {
        self.num_proc.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(1)
        })
        .max(1)
    }
}

impl ConfigSection for GeneticAlgorithmConfig {
    fn section_name() -> &'static str {
        "genetic_algorithm"
    }

    fn validate(&self) -> Result<(), CalibrationError> {
        if self.population_size < 2 {
            return Err(CalibrationError::Configuration(
                "Population size must be at least 2".to_string(),
            ));
        }
        if self.tournament_size < 1 {
            return Err(CalibrationError::Configuration(
                "Tournament size must be at least 1".to_string(),
            ));
        }
        if self.hall_of_fame_size < 1 {
            return Err(CalibrationError::Configuration(
                "Hall of fame size must be at least 1".to_string(),
            ));
        }
        if self.num_proc == Some(0) {
            return Err(CalibrationError::Configuration(
                "num_proc must be at least 1".to_string(),
            ));
        }
        let section = Self::section_name();
        check_probability(section, "crossover_probability", self.crossover_probability)?;
        check_probability(section, "mutation_probability", self.mutation_probability)?;
        if let Some(p) = self.gene_swap_probability {
            check_probability(section, "gene_swap_probability", p)?;
        }
        Ok(())
    }
}
