use super::evaluator::FitnessEvaluator;
use super::individual::Evaluation;
use crate::error::{CalibrationError, Result};
use log::error;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Fixed-size pool running evaluations in parallel.
///
/// Results come back in submission order. A job that errors or panics yields
/// [`Evaluation::failed`] and never affects the other jobs.
pub struct WorkerPool {
    pool: ThreadPool,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Result<Self> {
        let size = size.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|i| format!("calibration-worker-{}", i))
            .build()
            .map_err(|e| {
                CalibrationError::Configuration(format!("Cannot start worker pool: {}", e))
            })?;
        Ok(Self { pool, size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn evaluate_all<E>(&self, evaluator: &E, jobs: &[BTreeMap<String, f64>]) -> Vec<Evaluation>
    where
        E: FitnessEvaluator + ?Sized,
    {
        self.pool.install(|| {
            jobs.par_iter()
                .map(|parameters| evaluate_guarded(evaluator, parameters))
                .collect()
        })
    }
}

fn evaluate_guarded<E>(evaluator: &E, parameters: &BTreeMap<String, f64>) -> Evaluation
where
    E: FitnessEvaluator + ?Sized,
{
    match catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(parameters))) {
        Ok(Ok(evaluation)) => evaluation,
        Ok(Err(e)) => {
            error!("Error evaluating individual {:?}: {}", parameters, e);
            Evaluation::failed()
        }
        Err(_) => {
            error!("Evaluation panicked for individual {:?}", parameters);
            Evaluation::failed()
        }
    }
}
