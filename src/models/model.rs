// src/models/model.rs
use crate::error::McResult;
use crate::stochastic::RandomVariable;

/// Coefficients of a multi-factor SDE in the model's state space:
/// ```text
/// dX_c = μ_c(t, X) dt + Σ_f λ_{c,f}(t, X) dW_f,    S_c = g_c(X_c)
/// ```
/// `X` is the simulated state, `S = g(X)` the process value handed to
/// products (`g` is [`apply_state_space_transform`](Self::apply_state_space_transform),
/// e.g. `exp` for a log-Euler scheme).
///
/// All state slices passed in are full rows, indexed by component.
///
/// The engine calls these methods while holding a cache cell. They must not
/// start rayon work of their own; random variable arithmetic is fine, it
/// runs sequentially there.
pub trait ProcessModel: Send + Sync {
    fn number_of_components(&self) -> usize;

    fn number_of_factors(&self) -> usize;

    /// State at time index 0, one entry per component.
    fn initial_state(&self) -> Vec<RandomVariable>;

    /// Drift `μ_c` over the step starting at `time_index`. `None` means zero.
    ///
    /// `predictor` is `Some` when a predictor-corrector scheme asks for the
    /// drift re-evaluated with the predicted state at `time_index + 1`.
    fn drift(
        &self,
        time_index: usize,
        time: f64,
        component: usize,
        state: &[RandomVariable],
        predictor: Option<&[RandomVariable]>,
    ) -> McResult<Option<RandomVariable>>;

    /// Factor loading `λ_{c,f}` over the step starting at `time_index`.
    fn factor_loading(
        &self,
        time_index: usize,
        time: f64,
        factor: usize,
        component: usize,
        state: &[RandomVariable],
    ) -> McResult<RandomVariable>;

    fn apply_state_space_transform(&self, _component: usize, state: &RandomVariable) -> RandomVariable {
        state.clone()
    }

    /// Numeraire at a grid time, given the state row at that time.
    fn numeraire(
        &self,
        time_index: usize,
        time: f64,
        state: &[RandomVariable],
    ) -> McResult<RandomVariable>;
}
