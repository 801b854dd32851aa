pub mod model;
pub mod solver;

pub use model::{fit_model, RegressionModel, RegressionVariant};
pub use solver::{least_squares, Bounds, Solution, SolverOptions};
