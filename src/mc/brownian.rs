// src/mc/brownian.rs
//! Brownian increments driving the Euler scheme.
//!
//! # Layout
//!
//! For a grid `t_0 < ... < t_N`, `F` factors and `P` paths the motion holds
//! `N × F` random variables, each with `P` realizations:
//! ```text
//! ΔW[i][f] ~ N(0, t_{i+1} - t_i),   independent across i, f and paths
//! ```
//! The increment over `[t_i, t_{i+1}]` is known at `t_{i+1}`, which is its
//! filtration time.
//!
//! # Generation
//!
//! All increments are drawn when the motion is created, in parallel across
//! paths. Reading an increment afterwards is a plain lookup that takes no
//! lock and starts no parallel work, so it is safe inside cached cell
//! computations.
//!
//! Path `p` always consumes the stream `RngFactory::path_rng(p)` in the same
//! order (time major, factor minor), so the ensemble does not depend on the
//! number of threads.

use crate::error::{validation::validate_paths, McError, McResult};
use crate::rng::{get_normal_draw, RngFactory};
use crate::stochastic::RandomVariable;
use crate::time_discretization::TimeDiscretization;
use ndarray::Array2;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

/// Source of independent increments for a process simulation.
pub trait IndependentIncrements: Send + Sync {
    fn time_discretization(&self) -> &TimeDiscretization;

    fn number_of_factors(&self) -> usize;

    fn number_of_paths(&self) -> usize;

    fn seed(&self) -> u64;

    /// Increment over `[t_i, t_{i+1}]` for the given factor.
    fn increment(&self, time_index: usize, factor: usize) -> RandomVariable;

    /// Same layout, different random numbers.
    fn with_seed(&self, seed: u64) -> Arc<dyn IndependentIncrements>;
}

pub struct BrownianMotion {
    time_discretization: TimeDiscretization,
    number_of_factors: usize,
    number_of_paths: usize,
    seed: u64,
    increments: Array2<RandomVariable>,
}

impl BrownianMotion {
    pub fn new(
        time_discretization: TimeDiscretization,
        number_of_factors: usize,
        number_of_paths: usize,
        seed: u64,
    ) -> McResult<Self> {
        validate_paths(number_of_paths)?;
        if number_of_factors == 0 {
            return Err(McError::InvalidConfiguration {
                field: "number_of_factors".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(Self::unchecked(
            time_discretization,
            number_of_factors,
            number_of_paths,
            seed,
        ))
    }

    fn unchecked(
        time_discretization: TimeDiscretization,
        number_of_factors: usize,
        number_of_paths: usize,
        seed: u64,
    ) -> Self {
        let increments = generate(&time_discretization, number_of_factors, number_of_paths, seed);
        BrownianMotion {
            time_discretization,
            number_of_factors,
            number_of_paths,
            seed,
            increments,
        }
    }
}

fn generate(
    time_discretization: &TimeDiscretization,
    factors: usize,
    paths: usize,
    seed: u64,
) -> Array2<RandomVariable> {
    let steps = time_discretization.number_of_steps();
    debug!(steps, factors, paths, seed, "generating brownian increments");

    let sqrt_dt: Vec<f64> = (0..steps)
        .map(|i| time_discretization.time_step(i).sqrt())
        .collect();
    let factory = RngFactory::new(seed);

    let draws: Vec<Vec<f64>> = (0..paths)
        .into_par_iter()
        .map(|path| {
            let mut rng = factory.path_rng(path as u64);
            let mut path_draws = Vec::with_capacity(steps * factors);
            for scale in &sqrt_dt {
                for _ in 0..factors {
                    path_draws.push(scale * get_normal_draw(&mut rng));
                }
            }
            path_draws
        })
        .collect();

    Array2::from_shape_fn((steps, factors), |(time_index, factor)| {
        let offset = time_index * factors + factor;
        RandomVariable::from_paths(
            time_discretization.time(time_index + 1),
            draws.iter().map(|path_draws| path_draws[offset]).collect(),
        )
    })
}

impl IndependentIncrements for BrownianMotion {
    fn time_discretization(&self) -> &TimeDiscretization {
        &self.time_discretization
    }

    fn number_of_factors(&self) -> usize {
        self.number_of_factors
    }

    fn number_of_paths(&self) -> usize {
        self.number_of_paths
    }

    fn seed(&self) -> u64 {
        self.seed
    }

    fn increment(&self, time_index: usize, factor: usize) -> RandomVariable {
        self.increments[[time_index, factor]].clone()
    }

    fn with_seed(&self, seed: u64) -> Arc<dyn IndependentIncrements> {
        Arc::new(Self::unchecked(
            self.time_discretization.clone(),
            self.number_of_factors,
            self.number_of_paths,
            seed,
        ))
    }
}
