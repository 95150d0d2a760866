// src/regression/mod.rs
pub mod basis;
pub mod conditional_expectation;

pub use basis::BasisFunctions;
pub use conditional_expectation::ConditionalExpectationEstimator;
