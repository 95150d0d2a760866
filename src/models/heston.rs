// src/models/heston.rs
//! Heston Stochastic Volatility Model
//!
//! # Dynamics
//!
//! ```text
//! dS_t = r S_t dt + √V_t S_t dW_t^(1)
//! dV_t = κ(θ - V_t) dt + ξ√V_t dW_t^(2),    d⟨W^(1), W^(2)⟩_t = ρ dt
//! ```
//!
//! Where:
//! - S_t: Asset price
//! - V_t: Instantaneous variance
//! - κ: Mean reversion speed for variance
//! - θ: Long-term variance level
//! - ξ: Volatility of variance (vol-of-vol)
//! - ρ: Correlation between the two drivers
//!
//! # Discretization
//!
//! The state is `(ln S, V)` driven by two independent factors. Correlation is
//! carried by the factor loadings (Cholesky of the 2×2 correlation matrix) and
//! every coefficient uses the truncated variance `V⁺ = max(V, 0)`, which is the
//! full truncation Euler scheme:
//! ```text
//! X_{n+1} = X_n + (r - V⁺_n/2) Δt + √V⁺_n ΔW_1
//! V_{n+1} = V_n + κ(θ - V⁺_n) Δt + ξ√V⁺_n (ρ ΔW_1 + √(1-ρ²) ΔW_2)
//! ```
//!
//! # Feller Condition
//!
//! For variance to remain positive in continuous time `2κθ > ξ²` must hold.
//! A violation is logged but accepted: truncation keeps the scheme usable.

use super::model::ProcessModel;
use crate::error::{validation::*, McError, McResult};
use crate::stochastic::RandomVariable;
use tracing::warn;

pub const LOG_SPOT: usize = 0;
pub const VARIANCE: usize = 1;

/// Mean reversion speeds above this make the explicit step unstable on
/// practical grids.
pub const MAX_MEAN_REVERSION: f64 = 100.0;
pub const MAX_VOL_OF_VOL: f64 = 5.0;

#[derive(Clone, Copy, Debug)]
pub struct HestonParams {
    /// Spot `S_0`
    pub s0: f64,
    /// Initial variance `V_0`
    pub v0: f64,
    /// Risk-free rate, also the numeraire growth rate
    pub r: f64,
    /// κ
    pub kappa: f64,
    /// θ
    pub theta: f64,
    /// ξ
    pub xi: f64,
    /// ρ
    pub rho: f64,
}

#[derive(Clone, Debug)]
pub struct HestonModel {
    pub params: HestonParams,
}

impl HestonModel {
    pub fn new(params: HestonParams) -> McResult<Self> {
        Self::validate_params(&params)?;

        if 2.0 * params.kappa * params.theta <= params.xi * params.xi {
            warn!(
                kappa = params.kappa,
                theta = params.theta,
                xi = params.xi,
                "Feller condition violated (2κθ ≤ ξ²), variance may hit zero"
            );
        }

        Ok(HestonModel { params })
    }

    fn validate_params(params: &HestonParams) -> McResult<()> {
        validate_positive("s0", params.s0)?;
        validate_non_negative("v0", params.v0)?;
        validate_finite("r", params.r)?;
        validate_positive("kappa", params.kappa)?;
        validate_range("kappa", params.kappa, 0.0, MAX_MEAN_REVERSION)?;
        validate_positive("theta", params.theta)?;
        validate_positive("xi", params.xi)?;
        validate_range("xi", params.xi, 0.0, MAX_VOL_OF_VOL)?;
        validate_correlation("rho", params.rho)
    }

    fn truncated_variance(state: &[RandomVariable]) -> RandomVariable {
        state[VARIANCE].floor_scalar(0.0)
    }
}

impl ProcessModel for HestonModel {
    fn number_of_components(&self) -> usize {
        2
    }

    fn number_of_factors(&self) -> usize {
        2
    }

    fn initial_state(&self) -> Vec<RandomVariable> {
        vec![
            RandomVariable::deterministic(0.0, self.params.s0.ln()),
            RandomVariable::deterministic(0.0, self.params.v0),
        ]
    }

    fn drift(
        &self,
        _time_index: usize,
        _time: f64,
        component: usize,
        state: &[RandomVariable],
        predictor: Option<&[RandomVariable]>,
    ) -> McResult<Option<RandomVariable>> {
        let v = Self::truncated_variance(predictor.unwrap_or(state));
        let p = &self.params;
        let drift = match component {
            LOG_SPOT => v.mult_scalar(-0.5).add_scalar(p.r),
            VARIANCE => v.mult_scalar(-p.kappa).add_scalar(p.kappa * p.theta),
            _ => {
                return Err(McError::calculation(format!(
                    "Heston model has no component {}",
                    component
                )))
            }
        };
        Ok(Some(drift))
    }

    fn factor_loading(
        &self,
        _time_index: usize,
        _time: f64,
        factor: usize,
        component: usize,
        state: &[RandomVariable],
    ) -> McResult<RandomVariable> {
        let vol = Self::truncated_variance(state).sqrt();
        let p = &self.params;
        let weight = match (component, factor) {
            (LOG_SPOT, 0) => 1.0,
            (LOG_SPOT, 1) => 0.0,
            (VARIANCE, 0) => p.xi * p.rho,
            (VARIANCE, 1) => p.xi * (1.0 - p.rho * p.rho).sqrt(),
            _ => {
                return Err(McError::calculation(format!(
                    "Heston model has no loading for component {} factor {}",
                    component, factor
                )))
            }
        };
        Ok(vol.mult_scalar(weight))
    }

    fn apply_state_space_transform(&self, component: usize, state: &RandomVariable) -> RandomVariable {
        match component {
            LOG_SPOT => state.exp(),
            _ => state.clone(),
        }
    }

    fn numeraire(
        &self,
        _time_index: usize,
        time: f64,
        _state: &[RandomVariable],
    ) -> McResult<RandomVariable> {
        Ok(RandomVariable::deterministic(time, (self.params.r * time).exp()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> HestonParams {
        HestonParams {
            s0: 100.0,
            v0: 0.04,
            r: 0.05,
            kappa: 2.0,
            theta: 0.04,
            xi: 0.3,
            rho: -0.7,
        }
    }

    #[test]
    fn test_feller_violation_is_accepted() {
        let mut p = params();
        p.xi = 0.8;
        assert!(HestonModel::new(p).is_ok());
    }

    #[test]
    fn test_invalid_parameters() {
        let mut p = params();
        p.s0 = -100.0;
        assert!(HestonModel::new(p).is_err());

        let mut p = params();
        p.rho = 1.5;
        assert!(HestonModel::new(p).is_err());

        let mut p = params();
        p.kappa = 150.0;
        assert!(HestonModel::new(p).is_err());
    }

    #[test]
    fn test_truncated_coefficients() {
        let model = HestonModel::new(params()).unwrap();
        let state = vec![
            RandomVariable::from_paths(0.0, vec![4.6, 4.6]),
            RandomVariable::from_paths(0.0, vec![0.04, -0.01]),
        ];

        let drift_v = model.drift(0, 0.0, VARIANCE, &state, None).unwrap().unwrap();
        assert!((drift_v.get(0) - 0.0).abs() < 1e-15);
        assert!((drift_v.get(1) - 0.08).abs() < 1e-15);

        let loading = model.factor_loading(0, 0.0, 0, LOG_SPOT, &state).unwrap();
        assert!((loading.get(0) - 0.2).abs() < 1e-15);
        assert_eq!(loading.get(1), 0.0);

        let l0 = model.factor_loading(0, 0.0, 0, VARIANCE, &state).unwrap().get(0);
        let l1 = model.factor_loading(0, 0.0, 1, VARIANCE, &state).unwrap().get(0);
        // loadings of the variance reproduce its total volatility ξ√V
        assert!(((l0 * l0 + l1 * l1).sqrt() - 0.3 * 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_component_is_calculation_failure() {
        let model = HestonModel::new(params()).unwrap();
        let state = model.initial_state();
        assert!(matches!(
            model.drift(0, 0.0, 5, &state, None),
            Err(McError::CalculationFailure { .. })
        ));
    }
}
