pub mod inverse_model;

pub use inverse_model::{annualize, sum_window, InverseModel, NormalizedBill};
