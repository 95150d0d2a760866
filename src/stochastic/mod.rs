// src/stochastic/mod.rs
pub mod precision;
pub mod random_variable;

pub use precision::Real;
pub use random_variable::{
    kernels_are_sequential, with_sequential_kernels, RandomVariable, RandomVariableF32,
};
