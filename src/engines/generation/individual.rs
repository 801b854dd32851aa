use super::genome::Genome;
use crate::engines::comparison::{Comparison, SimulationResults};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::PathBuf;

/// Outcome of evaluating one parameter set
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub fitness: f64,
    pub comparison: Comparison,
    /// Private artifact directory holding the modified model and simulation output
    pub run_dir: Option<PathBuf>,
    pub simulated: Option<SimulationResults>,
}

impl Evaluation {
    /// Penalty assigned when evaluation raised an error
    pub fn failed() -> Self {
        Self {
            fitness: f64::INFINITY,
            ..Self::default()
        }
    }

    pub fn is_failure(&self) -> bool {
        self.fitness.is_infinite()
    }
}

/// One candidate of the population, owned by exactly one population slot.
#[derive(Debug, Clone)]
pub struct Individual {
    pub genome: Genome,
    /// `None` until evaluated; reset whenever the genome changes
    pub fitness: Option<f64>,
    pub comparison: Comparison,
    pub run_dir: Option<PathBuf>,
    pub simulated: Option<SimulationResults>,
}

impl Individual {
    pub fn new(genome: Genome) -> Self {
        Self {
            genome,
            fitness: None,
            comparison: Comparison::new(),
            run_dir: None,
            simulated: None,
        }
    }

    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }

    /// Fitness to minimise; unevaluated individuals rank last
    pub fn fitness_value(&self) -> f64 {
        self.fitness.unwrap_or(f64::INFINITY)
    }

    pub fn invalidate(&mut self) {
        self.fitness = None;
        self.comparison.clear();
        self.run_dir = None;
        self.simulated = None;
    }

    pub fn apply(&mut self, evaluation: Evaluation) {
        self.fitness = Some(evaluation.fitness);
        self.comparison = evaluation.comparison;
        self.run_dir = evaluation.run_dir;
        self.simulated = evaluation.simulated;
    }
}

pub fn compare_fitness(a: &Individual, b: &Individual) -> Ordering {
    a.fitness_value()
        .partial_cmp(&b.fitness_value())
        .unwrap_or(Ordering::Equal)
}

/// Lowest-penalty individual; the first one wins ties
pub fn best_of(population: &[Individual]) -> Option<&Individual> {
    population.iter().reduce(|best, ind| {
        if compare_fitness(ind, best) == Ordering::Less {
            ind
        } else {
            best
        }
    })
}

/// Fraction of distinct genomes in the population, in (0, 1]; 0 when empty
pub fn diversity(population: &[Individual]) -> f64 {
    if population.is_empty() {
        return 0.0;
    }
    let unique: HashSet<&Genome> = population.iter().map(|i| &i.genome).collect();
    unique.len() as f64 / population.len() as f64
}
