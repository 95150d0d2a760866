// src/models/black_scholes.rs
//! Black-Scholes model simulated in log space.
//!
//! ```text
//! dS_t = r S_t dt + σ S_t dW_t
//! X_t = ln S_t:   dX_t = (r - σ²/2) dt + σ dW_t
//! ```
//! The Euler scheme is exact in `X` for constant coefficients. The numeraire
//! is the bank account `N(t) = exp(r t)`.

use super::model::ProcessModel;
use crate::error::{validation::*, McResult};
use crate::stochastic::RandomVariable;

#[derive(Clone, Copy, Debug)]
pub struct BlackScholesModel {
    pub spot: f64,
    pub rate: f64,
    pub volatility: f64,
}

impl BlackScholesModel {
    pub fn new(spot: f64, rate: f64, volatility: f64) -> McResult<Self> {
        validate_positive("spot", spot)?;
        validate_finite("rate", rate)?;
        validate_non_negative("volatility", volatility)?;
        validate_finite("volatility", volatility)?;
        Ok(BlackScholesModel {
            spot,
            rate,
            volatility,
        })
    }
}

impl ProcessModel for BlackScholesModel {
    fn number_of_components(&self) -> usize {
        1
    }

    fn number_of_factors(&self) -> usize {
        1
    }

    fn initial_state(&self) -> Vec<RandomVariable> {
        vec![RandomVariable::deterministic(0.0, self.spot.ln())]
    }

    fn drift(
        &self,
        _time_index: usize,
        time: f64,
        _component: usize,
        _state: &[RandomVariable],
        _predictor: Option<&[RandomVariable]>,
    ) -> McResult<Option<RandomVariable>> {
        let mu = self.rate - 0.5 * self.volatility * self.volatility;
        Ok(Some(RandomVariable::deterministic(time, mu)))
    }

    fn factor_loading(
        &self,
        _time_index: usize,
        time: f64,
        _factor: usize,
        _component: usize,
        _state: &[RandomVariable],
    ) -> McResult<RandomVariable> {
        Ok(RandomVariable::deterministic(time, self.volatility))
    }

    fn apply_state_space_transform(&self, _component: usize, state: &RandomVariable) -> RandomVariable {
        state.exp()
    }

    fn numeraire(
        &self,
        _time_index: usize,
        time: f64,
        _state: &[RandomVariable],
    ) -> McResult<RandomVariable> {
        Ok(RandomVariable::deterministic(time, (self.rate * time).exp()))
    }
}
