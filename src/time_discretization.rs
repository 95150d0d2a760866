// src/time_discretization.rs
//! Ordered simulation time grid `t_0 < t_1 < ... < t_N`.

use crate::error::{validation::validate_finite, McError, McResult};

/// Tolerance used when matching a time against a grid point.
pub const TIME_TOLERANCE: f64 = 1e-12;

#[derive(Clone, Debug, PartialEq)]
pub struct TimeDiscretization {
    times: Vec<f64>,
}

impl TimeDiscretization {
    /// Grid from explicit, strictly increasing times.
    pub fn new(times: Vec<f64>) -> McResult<Self> {
        if times.len() < 2 {
            return Err(McError::InvalidConfiguration {
                field: "times".to_string(),
                reason: format!("need at least two time points, got {}", times.len()),
            });
        }
        for &t in &times {
            validate_finite("time", t)?;
        }
        if let Some(w) = times.windows(2).find(|w| w[1] <= w[0]) {
            return Err(McError::InvalidParameters {
                parameter: "time".to_string(),
                value: w[1],
                constraint: format!("must be strictly greater than previous time {}", w[0]),
            });
        }
        Ok(TimeDiscretization { times })
    }

    /// `number_of_steps` equal steps of length `dt` starting at `start`.
    pub fn uniform(start: f64, number_of_steps: usize, dt: f64) -> McResult<Self> {
        Self::new((0..=number_of_steps).map(|i| start + i as f64 * dt).collect())
    }

    pub fn time(&self, index: usize) -> f64 {
        self.times[index]
    }

    /// Length of the step from `index` to `index + 1`.
    pub fn time_step(&self, index: usize) -> f64 {
        self.times[index + 1] - self.times[index]
    }

    pub fn number_of_steps(&self) -> usize {
        self.times.len() - 1
    }

    pub fn number_of_time_points(&self) -> usize {
        self.times.len()
    }

    pub fn last_time(&self) -> f64 {
        self.times[self.times.len() - 1]
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Index of the grid point equal to `time`, if any.
    pub fn time_index(&self, time: f64) -> Option<usize> {
        let index = self.times.partition_point(|&t| t < time - TIME_TOLERANCE);
        (index < self.times.len() && (self.times[index] - time).abs() <= TIME_TOLERANCE)
            .then_some(index)
    }

    /// Index of the last grid point `<= time`, `None` if `time` precedes the grid.
    pub fn time_index_nearest_less_or_equal(&self, time: f64) -> Option<usize> {
        let count = self.times.partition_point(|&t| t <= time + TIME_TOLERANCE);
        count.checked_sub(1)
    }
}
