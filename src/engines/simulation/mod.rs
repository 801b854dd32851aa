pub mod runner;

pub use runner::{
    substitute_placeholders, CommandSimulationRunner, SimulationRunner, MODIFY_MEASURE_NAME,
    WORKFLOW_FILE_NAME,
};
