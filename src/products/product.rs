// src/products/product.rs
//! Valuation contract between products and a simulated model
//!
//! A product maps a [`SimulationModel`] to the pathwise value of its future
//! cash flows, expressed in currency units at the evaluation time:
//! ```text
//! V(t) = N(t) * Σ_i X(T_i) / N(T_i)
//! ```
//! where `N` is the numeraire and `X(T_i)` the cash flows. The Monte Carlo
//! price is the path average of `V(t)`.

use crate::error::McResult;
use crate::mc::SimulationModel;
use crate::stochastic::RandomVariable;

/// Call or put
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionType {
    /// max(S - K, 0)
    Call,
    /// max(K - S, 0)
    Put,
}

impl OptionType {
    /// Intrinsic value of the option on `underlying` for strike `strike`
    pub fn intrinsic(self, underlying: &RandomVariable, strike: f64) -> RandomVariable {
        match self {
            OptionType::Call => underlying.sub_scalar(strike).floor_scalar(0.0),
            OptionType::Put => underlying.neg().add_scalar(strike).floor_scalar(0.0),
        }
    }
}

/// Anything that can be valued on a simulation.
///
/// Implementations are shared between valuation threads and must not keep
/// state between calls.
pub trait Product: Send + Sync {
    /// Pathwise value at `evaluation_time` in currency units of that time.
    ///
    /// Failures of the model surface as the model's error.
    fn value(&self, evaluation_time: f64, model: &dyn SimulationModel) -> McResult<RandomVariable>;

    /// Monte Carlo estimate: the path average of [`Product::value`].
    fn value_estimate(&self, evaluation_time: f64, model: &dyn SimulationModel) -> McResult<f64> {
        Ok(self.value(evaluation_time, model)?.average())
    }
}
