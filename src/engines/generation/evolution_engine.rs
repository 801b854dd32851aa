use crate::config::{AcceptanceCriteriaConfig, GeneticAlgorithmConfig};
use crate::engines::comparison::Comparison;
use crate::engines::generation::{
    evaluator::FitnessEvaluator,
    genome::GeneSpace,
    hall_of_fame::HallOfFame,
    individual::{best_of, Individual},
    logbook::{GenerationRecord, Logbook},
    operators::{adaptive_mutation, random_genome, tournament_selection, uniform_crossover, LastWorstEndUse},
    worker_pool::WorkerPool,
};
use crate::error::{CalibrationError, Result};
use crate::types::FuelType;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub struct EvolutionConfig {
    pub population_size: usize,
    pub generations: usize,
    /// Probability that a consecutive pair of offspring is crossed
    pub crossover_probability: f64,
    /// Probability that an offspring is mutated
    pub mutation_probability: f64,
    /// Per-gene swap probability inside uniform crossover
    pub gene_swap_probability: f64,
    pub tournament_size: usize,
    pub hall_of_fame_size: usize,
    pub num_workers: usize,
    pub seed: Option<u64>,
}

impl From<&GeneticAlgorithmConfig> for EvolutionConfig {
    fn from(ga: &GeneticAlgorithmConfig) -> Self {
        Self {
            population_size: ga.population_size,
            generations: ga.generations,
            crossover_probability: ga.crossover_probability,
            mutation_probability: ga.mutation_probability,
            gene_swap_probability: ga.effective_gene_swap_probability(),
            tournament_size: ga.tournament_size,
            hall_of_fame_size: ga.hall_of_fame_size,
            num_workers: ga.effective_num_proc(),
            seed: ga.seed,
        }
    }
}

pub trait ProgressCallback: Send {
    fn on_generation_start(&mut self, generation: usize);
    fn on_generation_complete(&mut self, record: &GenerationRecord);
    fn on_individual_evaluated(&mut self, current: usize, total: usize);
}

impl<T: ProgressCallback + ?Sized> ProgressCallback for &mut T {
    fn on_generation_start(&mut self, generation: usize) {
        (**self).on_generation_start(generation);
    }

    fn on_generation_complete(&mut self, record: &GenerationRecord) {
        (**self).on_generation_complete(record);
    }

    fn on_individual_evaluated(&mut self, current: usize, total: usize) {
        (**self).on_individual_evaluated(current, total);
    }
}

/// Result of a finished search
#[derive(Debug)]
pub struct SearchOutcome {
    /// Best individual ever evaluated; its artifact directory is kept on disk
    pub best: Individual,
    pub best_parameters: BTreeMap<String, f64>,
    pub population: Vec<Individual>,
    pub logbook: Logbook,
    /// True when the thresholds were met before the generation limit
    pub terminated_early: bool,
}

impl SearchOutcome {
    pub fn best_run_dir(&self) -> Option<&Path> {
        self.best.run_dir.as_deref()
    }

    /// Delete the best individual's artifact directory
    pub fn discard_artifacts(&mut self) -> Result<()> {
        if let Some(dir) = self.best.run_dir.take() {
            if dir.exists() {
                std::fs::remove_dir_all(&dir)?;
            }
        }
        Ok(())
    }
}

/// Abs error within the fuel's threshold; electricity in kWh, other fuels in MMBtu
fn abs_error_within_threshold(
    fuel: FuelType,
    abs_error: f64,
    acceptance: &AcceptanceCriteriaConfig,
) -> bool {
    abs_error.abs() <= acceptance.abs_threshold_for(fuel)
}

/// True when every end use is within the bias threshold, or every end use is
/// within the absolute threshold. NaN bias errors never count as within.
pub fn meets_termination_criteria(
    comparison: &Comparison,
    acceptance: &AcceptanceCriteriaConfig,
) -> bool {
    if comparison.values().all(|r| r.is_empty()) {
        return false;
    }

    let mut all_bias_met = true;
    let mut all_abs_met = true;
    for (fuel, result) in comparison {
        for (end_use, abs_err) in &result.absolute_error {
            let bias_err = result
                .bias_error
                .get(end_use)
                .copied()
                .unwrap_or(f64::NAN);
            if !(bias_err.abs() <= acceptance.bias_threshold_for(*fuel)) {
                all_bias_met = false;
            }
            if !abs_error_within_threshold(*fuel, *abs_err, acceptance) {
                all_abs_met = false;
            }
        }
    }
    all_bias_met || all_abs_met
}

pub struct EvolutionEngine<E: FitnessEvaluator> {
    config: EvolutionConfig,
    acceptance: AcceptanceCriteriaConfig,
    space: GeneSpace,
    evaluator: E,
    pool: WorkerPool,
    hall_of_fame: HallOfFame,
    rng: StdRng,
    last_worst: LastWorstEndUse,
    run_dirs: Vec<PathBuf>,
}

impl<E: FitnessEvaluator> EvolutionEngine<E> {
    pub fn new(
        config: EvolutionConfig,
        acceptance: AcceptanceCriteriaConfig,
        space: GeneSpace,
        evaluator: E,
    ) -> Result<Self> {
        if config.population_size < 2 {
            return Err(CalibrationError::Configuration(
                "population_size must be at least 2".to_string(),
            ));
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let pool = WorkerPool::new(config.num_workers)?;
        let hall_of_fame = HallOfFame::new(config.hall_of_fame_size);

        Ok(Self {
            config,
            acceptance,
            space,
            evaluator,
            pool,
            hall_of_fame,
            rng,
            last_worst: LastWorstEndUse::default(),
            run_dirs: Vec::new(),
        })
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn gene_space(&self) -> &GeneSpace {
        &self.space
    }

    pub fn get_hall_of_fame(&self) -> &HallOfFame {
        &self.hall_of_fame
    }

    pub fn last_worst_end_use(&self) -> LastWorstEndUse {
        self.last_worst
    }

    /// Run the evolution process
    pub fn run<C: ProgressCallback>(&mut self, mut callback: C) -> Result<SearchOutcome> {
        info!(
            "Starting calibration search: population {}, {} generations, {} workers",
            self.config.population_size,
            self.config.generations,
            self.pool.size()
        );

        callback.on_generation_start(0);
        let mut population = self.initialize_population();
        let evaluated = self.evaluate_invalid(&mut population, &mut callback);
        self.hall_of_fame.update(&population);

        let mut logbook = Logbook::new();
        let record = self.record(0, evaluated.len(), &population)?;
        callback.on_generation_complete(&record);
        logbook.record(record);

        let mut terminated_early = false;

        for generation in 1..=self.config.generations {
            callback.on_generation_start(generation);

            // Elitism: the current best survives unchanged
            let elite = best_of(&population)
                .cloned()
                .ok_or_else(|| CalibrationError::Configuration("Empty population".to_string()))?;

            let mut offspring = self.vary(&population);
            let evaluated = self.evaluate_invalid(&mut offspring, &mut callback);
            self.last_worst
                .observe(evaluated.iter().map(|&i| &offspring[i].comparison));
            if let Some((fuel, end_use)) = self.last_worst.get() {
                debug!("Worst end use this generation: {} {}", fuel, end_use);
            }

            population = self.select_next_generation(&offspring, elite);
            self.hall_of_fame.update(&population);

            let record = self.record(generation, evaluated.len(), &population)?;
            callback.on_generation_complete(&record);
            logbook.record(record);

            let current_best = best_of(&population)
                .ok_or_else(|| CalibrationError::Configuration("Empty population".to_string()))?;
            if meets_termination_criteria(&current_best.comparison, &self.acceptance) {
                info!(
                    "Early stopping: termination criteria met at generation {}",
                    generation
                );
                terminated_early = true;
                break;
            }
        }

        let best = self
            .hall_of_fame
            .best()
            .cloned()
            .ok_or_else(|| CalibrationError::Configuration("No individual was evaluated".to_string()))?;
        if best.fitness_value().is_infinite() {
            warn!("Every evaluation failed; the returned individual is not calibrated");
        }

        if terminated_early {
            info!("Search completed early: a solution satisfying the error thresholds was found");
        } else {
            info!(
                "Search completed without meeting the bias or absolute error thresholds \
                 within {} generations",
                self.config.generations
            );
        }

        self.cleanup_run_dirs(best.run_dir.as_deref());
        for individual in population.iter_mut() {
            if individual.run_dir != best.run_dir {
                individual.run_dir = None;
            }
        }

        Ok(SearchOutcome {
            best_parameters: self.space.decode(&best.genome),
            best,
            population,
            logbook,
            terminated_early,
        })
    }

    fn initialize_population(&mut self) -> Vec<Individual> {
        (0..self.config.population_size)
            .map(|_| Individual::new(random_genome(&self.space, &mut self.rng)))
            .collect()
    }

    /// Evaluate every individual without a fitness; returns their positions
    fn evaluate_invalid<C: ProgressCallback>(
        &mut self,
        population: &mut [Individual],
        callback: &mut C,
    ) -> Vec<usize> {
        let pending: Vec<usize> = population
            .iter()
            .enumerate()
            .filter(|(_, ind)| !ind.is_evaluated())
            .map(|(i, _)| i)
            .collect();
        let jobs: Vec<BTreeMap<String, f64>> = pending
            .iter()
            .map(|&i| self.space.decode(&population[i].genome))
            .collect();

        let results = self.pool.evaluate_all(&self.evaluator, &jobs);

        for (n, (&i, evaluation)) in pending.iter().zip(results).enumerate() {
            if let Some(dir) = &evaluation.run_dir {
                self.run_dirs.push(dir.clone());
            }
            population[i].apply(evaluation);
            callback.on_individual_evaluated(n + 1, pending.len());
        }
        pending
    }

    /// Crossover on consecutive pairs, then mutation, each invalidating fitness
    fn vary(&mut self, population: &[Individual]) -> Vec<Individual> {
        let mut offspring = population.to_vec();

        for i in (1..offspring.len()).step_by(2) {
            if self.rng.gen::<f64>() < self.config.crossover_probability {
                let (left, right) = offspring.split_at_mut(i);
                uniform_crossover(
                    &mut left[i - 1].genome,
                    &mut right[0].genome,
                    self.config.gene_swap_probability,
                    &mut self.rng,
                );
                left[i - 1].invalidate();
                right[0].invalidate();
            }
        }

        for individual in offspring.iter_mut() {
            if self.rng.gen::<f64>() < self.config.mutation_probability {
                adaptive_mutation(
                    &mut individual.genome,
                    &self.space,
                    &self.last_worst,
                    &mut self.rng,
                );
                individual.invalidate();
            }
        }

        offspring
    }

    fn select_next_generation(&mut self, offspring: &[Individual], elite: Individual) -> Vec<Individual> {
        let fitness: Vec<f64> = offspring.iter().map(|i| i.fitness_value()).collect();
        let winners = tournament_selection(
            &fitness,
            self.config.population_size - 1,
            self.config.tournament_size,
            &mut self.rng,
        );
        let mut next: Vec<Individual> = winners.into_iter().map(|i| offspring[i].clone()).collect();
        next.push(elite);
        next
    }

    fn record(
        &self,
        generation: usize,
        evaluations: usize,
        population: &[Individual],
    ) -> Result<GenerationRecord> {
        let best = best_of(population)
            .ok_or_else(|| CalibrationError::Configuration("Empty population".to_string()))?;
        GenerationRecord::from_population(generation, evaluations, population, best, &self.space)
    }

    /// Delete every artifact directory created during the run except `keep`
    fn cleanup_run_dirs(&mut self, keep: Option<&Path>) {
        for dir in self.run_dirs.drain(..) {
            if Some(dir.as_path()) == keep || !dir.exists() {
                continue;
            }
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                warn!("Could not remove {}: {}", dir.display(), e);
            }
        }
    }
}
