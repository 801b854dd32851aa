pub mod parameters;
pub mod genome;
pub mod individual;
pub mod operators;
pub mod evaluator;
pub mod worker_pool;
pub mod hall_of_fame;
pub mod logbook;
pub mod evolution_engine;
pub mod progress;

pub use parameters::{impacted_parameters, CalibrationParameter, GENE_COUNT};
pub use genome::{GeneSpace, Genome};
pub use individual::{best_of, diversity, Evaluation, Individual};
pub use operators::LastWorstEndUse;
pub use evaluator::{penalty, FitnessEvaluator, SimulationEvaluator, RUN_DIR_PREFIX};
pub use worker_pool::WorkerPool;
pub use hall_of_fame::HallOfFame;
pub use logbook::{GenerationRecord, Logbook};
pub use evolution_engine::{
    meets_termination_criteria, EvolutionConfig, EvolutionEngine, ProgressCallback, SearchOutcome,
};
pub use progress::{ChannelProgressCallback, LogProgressCallback, ProgressMessage};
