pub mod comparison;
pub mod generation;
pub mod normalization;
pub mod regression;
pub mod simulation;
