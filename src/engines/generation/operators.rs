use super::genome::{GeneSpace, Genome};
use super::parameters::impacted_parameters;
use crate::engines::comparison::Comparison;
use crate::types::{EndUse, FuelType};
use rand::seq::{IteratorRandom, SliceRandom};
use rand::Rng;
use std::collections::BTreeSet;

/// Genes biased towards the worst end use on each mutation
pub const MAX_BIASED_GENES: usize = 2;
/// Total mutated genes per mutation, inclusive
pub const MUTATED_GENES_RANGE: std::ops::RangeInclusive<usize> = 3..=6;

/// Fuel / end use with the largest absolute error among the previous generation's offspring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LastWorstEndUse(Option<(FuelType, EndUse)>);

impl LastWorstEndUse {
    pub fn get(&self) -> Option<(FuelType, EndUse)> {
        self.0
    }

    /// Replace the tracked end use with the worst one across `comparisons`
    pub fn observe<'a, I>(&mut self, comparisons: I)
    where
        I: IntoIterator<Item = &'a Comparison>,
    {
        let mut worst: Option<((FuelType, EndUse), f64)> = None;
        for comparison in comparisons {
            for (fuel, result) in comparison {
                for (end_use, err) in &result.absolute_error {
                    let err = err.abs();
                    if worst.map_or(true, |(_, w)| err > w) {
                        worst = Some(((*fuel, *end_use), err));
                    }
                }
            }
        }
        self.0 = worst.map(|(key, _)| key);
    }
}

/// Generate random genome
pub fn random_genome<R: Rng>(space: &GeneSpace, rng: &mut R) -> Genome {
    (0..space.len())
        .map(|gene| rng.gen_range(0..space.choices(gene).len()))
        .collect()
}

/// Uniform crossover: swap each gene independently with probability `swap_probability`
pub fn uniform_crossover<R: Rng>(
    a: &mut Genome,
    b: &mut Genome,
    swap_probability: f64,
    rng: &mut R,
) {
    for (x, y) in a.iter_mut().zip(b.iter_mut()) {
        if rng.gen::<f64>() < swap_probability {
            std::mem::swap(x, y);
        }
    }
}

/// Mutate 3 to 6 genes, up to two of them drawn from the genes that drive `worst`.
///
/// Each mutated gene moves to a different value of its choice list. Single-choice
/// genes cannot move and are left alone.
pub fn adaptive_mutation<R: Rng>(
    genome: &mut Genome,
    space: &GeneSpace,
    worst: &LastWorstEndUse,
    rng: &mut R,
) {
    let mut indices = BTreeSet::new();

    if let Some((fuel, end_use)) = worst.get() {
        let impacted: Vec<usize> = impacted_parameters(fuel, end_use)
            .iter()
            .map(|p| p.index())
            .filter(|&i| i < genome.len())
            .collect();
        let count = impacted.len().min(MAX_BIASED_GENES);
        indices.extend(impacted.choose_multiple(rng, count).copied());
    }

    let target = rng.gen_range(MUTATED_GENES_RANGE).min(genome.len());
    while indices.len() < target {
        indices.insert(rng.gen_range(0..genome.len()));
    }

    for gene in indices {
        let current = space.value(gene, genome[gene]);
        let alternative = space
            .choices(gene)
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != current)
            .map(|(i, _)| i)
            .choose(rng);
        if let Some(index) = alternative {
            genome[gene] = index;
        }
    }
}

/// Tournament selection (minimising): `k` winners of `tournament_size` random aspirants each
pub fn tournament_selection<R: Rng>(
    fitness: &[f64],
    k: usize,
    tournament_size: usize,
    rng: &mut R,
) -> Vec<usize> {
    if fitness.is_empty() {
        return Vec::new();
    }
    (0..k)
        .map(|_| {
            let mut best_idx = rng.gen_range(0..fitness.len());
            for _ in 1..tournament_size {
                let idx = rng.gen_range(0..fitness.len());
                if fitness[idx] < fitness[best_idx] {
                    best_idx = idx;
                }
            }
            best_idx
        })
        .collect()
}
