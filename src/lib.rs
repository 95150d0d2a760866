//! # mc-valuation: Monte Carlo Valuation Core
//!
//! Building blocks for pricing derivatives by Monte Carlo simulation.
//!
//! ## Key Features
//!
//! - **Vectorized random variables**: one value per simulated path, with
//!   filtration time tracking and data-parallel arithmetic
//! - **Lazy process engine**: Euler (and predictor-corrector) discretization
//!   whose realizations are computed once per cell, even under concurrency
//! - **Regression**: conditional expectations by least squares on basis
//!   functions, with an explicit error for singular systems
//! - **Portfolio valuation**: products valued in parallel on a per-call
//!   worker pool and summed in a fixed order
//!
//! ## Quick Start
//!
//! ```rust
//! use mc_valuation::mc::{EulerSchemeProcess, SimulationConfig};
//! use mc_valuation::models::BlackScholesModel;
//! use mc_valuation::portfolio::Portfolio;
//! use mc_valuation::products::EuropeanOption;
//! use mc_valuation::time_discretization::TimeDiscretization;
//! use std::sync::Arc;
//!
//! let model = Arc::new(BlackScholesModel::new(100.0, 0.05, 0.2).unwrap());
//! let grid = TimeDiscretization::uniform(0.0, 12, 1.0 / 12.0).unwrap();
//! let config = SimulationConfig {
//!     number_of_paths: 5_000,
//!     ..Default::default()
//! };
//! let simulation = EulerSchemeProcess::from_config(model, grid, &config).unwrap();
//!
//! let mut portfolio = Portfolio::new();
//! portfolio.add(Arc::new(EuropeanOption::call(1.0, 100.0).unwrap()), 1.0);
//! portfolio.add(Arc::new(EuropeanOption::put(1.0, 100.0).unwrap()), -1.0);
//!
//! // Call minus put is a forward: S - K e^(-rT)
//! let value = portfolio.value(0.0, &simulation, Some(2)).unwrap();
//! println!("forward: {:.4} ± {:.4}", value.average(), value.standard_error());
//! ```

pub mod analytics;
pub mod error;
pub mod math_utils;
pub mod mc;
pub mod models;
pub mod portfolio;
pub mod products;
pub mod regression;
pub mod rng;
pub mod stochastic;
pub mod time_discretization;

// Re-export commonly used types for convenience
pub use error::{McError, McResult};
pub use mc::{EulerSchemeProcess, Scheme, SimulationConfig, SimulationModel};
pub use portfolio::{Portfolio, PortfolioConfig};
pub use products::Product;
pub use regression::{BasisFunctions, ConditionalExpectationEstimator};
pub use stochastic::{RandomVariable, RandomVariableF32};
pub use time_discretization::TimeDiscretization;
