use super::genome::Genome;
use super::individual::{compare_fitness, Individual};
use std::collections::HashSet;

/// Best-ever individuals across all generations, lowest penalty first.
pub struct HallOfFame {
    individuals: Vec<Individual>,
    max_size: usize,
    seen_genomes: HashSet<Genome>,
}

impl HallOfFame {
    pub fn new(max_size: usize) -> Self {
        Self {
            individuals: Vec::new(),
            max_size: max_size.max(1),
            seen_genomes: HashSet::new(),
        }
    }

    /// Attempt to add an individual to the Hall of Fame
    pub fn try_add(&mut self, individual: &Individual) -> bool {
        if !individual.is_evaluated() || self.seen_genomes.contains(&individual.genome) {
            return false;
        }

        if self.individuals.len() >= self.max_size {
            let admits = self
                .individuals
                .last()
                .map_or(true, |worst| individual.fitness_value() < worst.fitness_value());
            if !admits {
                return false;
            }
        }

        self.seen_genomes.insert(individual.genome.clone());
        self.individuals.push(individual.clone());
        self.individuals.sort_by(compare_fitness);

        while self.individuals.len() > self.max_size {
            if let Some(removed) = self.individuals.pop() {
                self.seen_genomes.remove(&removed.genome);
            }
        }
        true
    }

    pub fn update(&mut self, population: &[Individual]) {
        for individual in population {
            self.try_add(individual);
        }
    }

    pub fn best(&self) -> Option<&Individual> {
        self.individuals.first()
    }

    pub fn get_all(&self) -> &[Individual] {
        &self.individuals
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ind(genome: Genome, fitness: f64) -> Individual {
        let mut i = Individual::new(genome);
        i.fitness = Some(fitness);
        i
    }

    #[test]
    fn test_keeps_lowest_penalties() {
        let mut hof = HallOfFame::new(2);
        hof.update(&[ind(vec![0], 5.0), ind(vec![1], 2.0), ind(vec![2], 9.0)]);
        assert_eq!(hof.len(), 2);
        assert_eq!(hof.best().unwrap().genome, vec![1]);
        assert_eq!(hof.get_all()[1].genome, vec![0]);

        assert!(hof.try_add(&ind(vec![3], 1.0)));
        assert_eq!(hof.best().unwrap().genome, vec![3]);
        assert!(!hof.try_add(&ind(vec![4], 50.0)));
    }

    #[test]
    fn test_rejects_duplicates_and_unevaluated() {
        let mut hof = HallOfFame::new(3);
        assert!(hof.try_add(&ind(vec![1, 2], 3.0)));
        assert!(!hof.try_add(&ind(vec![1, 2], 3.0)));
        assert!(!hof.try_add(&Individual::new(vec![7, 7])));
        assert_eq!(hof.len(), 1);
    }

    #[test]
    fn test_failed_individual_never_beats_finite() {
        let mut hof = HallOfFame::new(1);
        hof.update(&[ind(vec![0], f64::INFINITY), ind(vec![1], 40.0)]);
        assert_eq!(hof.best().unwrap().fitness, Some(40.0));
    }
}
