//! Genome encoding for the calibration search.
//!
//! A genome holds one index per [`CalibrationParameter`] into that parameter's
//! discrete choice list. Crossover and mutation work on indices, so any genome
//! decodes to a valid parameter set.

use super::parameters::{CalibrationParameter, GENE_COUNT};
use crate::config::ValueChoicesConfig;
use crate::error::{CalibrationError, Result};
use std::collections::BTreeMap;

pub type Genome = Vec<usize>;

/// The discrete value lists a genome indexes into
#[derive(Debug, Clone, PartialEq)]
pub struct GeneSpace {
    choices: Vec<Vec<f64>>,
}

impl GeneSpace {
    pub fn new(choices: Vec<Vec<f64>>) -> Result<Self> {
        if choices.len() != GENE_COUNT {
            return Err(CalibrationError::Configuration(format!(
                "Expected {} choice lists, got {}",
                GENE_COUNT,
                choices.len()
            )));
        }
        if let Some(i) = choices.iter().position(|c| c.is_empty()) {
            return Err(CalibrationError::Configuration(format!(
                "No choices configured for {}",
                CalibrationParameter::all()[i]
            )));
        }
        Ok(Self { choices })
    }

    pub fn from_config(config: &ValueChoicesConfig) -> Result<Self> {
        Self::new(config.lists().into_iter().map(|l| l.to_vec()).collect())
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    pub fn choices(&self, gene: usize) -> &[f64] {
        &self.choices[gene]
    }

    pub fn value(&self, gene: usize, index: usize) -> f64 {
        self.choices[gene][index]
    }

    /// Gene values in gene order
    pub fn values(&self, genome: &Genome) -> Vec<f64> {
        genome
            .iter()
            .enumerate()
            .map(|(gene, &index)| self.value(gene, index))
            .collect()
    }

    /// Named argument set for the model-modification step
    pub fn decode(&self, genome: &Genome) -> BTreeMap<String, f64> {
        CalibrationParameter::all()
            .iter()
            .zip(self.values(genome))
            .map(|(p, v)| (p.name().to_string(), v))
            .collect()
    }

    /// Genome that leaves every model input unchanged.
    ///
    /// Fails when a list lacks its neutral value (1.0 for multipliers, 0.0 for offsets).
    pub fn neutral_genome(&self) -> Result<Genome> {
        CalibrationParameter::all()
            .iter()
            .map(|p| {
                let neutral = p.neutral_value();
                self.choices[p.index()]
                    .iter()
                    .position(|v| *v == neutral)
                    .ok_or_else(|| {
                        CalibrationError::Configuration(format!(
                            "Choices for {} do not include the neutral value {}",
                            p, neutral
                        ))
                    })
            })
            .collect()
    }
}
