// src/products/bermudan.rs
//! Bermudan option by regression-based backward induction
//!
//! # Algorithm
//!
//! Working backwards over the exercise dates `T_n > ... > T_1`, with all
//! values in numeraire units:
//! ```text
//! V_n     = X(T_n)
//! C_k     = E[V_{k+1} | F_{T_k}]          (regression on 1, S/K, (S/K)², ...)
//! V_k     = X(T_k)   if X(T_k) > 0 and X(T_k) >= C_k
//!           V_{k+1}  otherwise
//! ```
//! The continuation estimate only drives the exercise decision; the value
//! carried backwards is the realized cash flow of each path.
//!
//! A tie between exercise and continuation exercises.

use super::product::{OptionType, Product};
use crate::error::validation::{validate_positive, validate_schedule};
use crate::error::{McError, McResult};
use crate::mc::SimulationModel;
use crate::regression::{BasisFunctions, ConditionalExpectationEstimator};
use crate::stochastic::RandomVariable;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct BermudanOption {
    pub exercise_dates: Vec<f64>,
    pub strike: f64,
    pub underlying: usize,
    pub option_type: OptionType,
    /// Degree of the polynomial regression basis in `S/K`.
    pub basis_degree: usize,
}

impl BermudanOption {
    pub fn new(
        exercise_dates: Vec<f64>,
        strike: f64,
        underlying: usize,
        option_type: OptionType,
        basis_degree: usize,
    ) -> McResult<Self> {
        validate_positive("strike", strike)?;
        validate_schedule("exercise_dates", &exercise_dates)?;
        Ok(BermudanOption {
            exercise_dates,
            strike,
            underlying,
            option_type,
            basis_degree,
        })
    }

    fn continuation(
        &self,
        date: f64,
        underlying: &RandomVariable,
        future: &RandomVariable,
    ) -> McResult<RandomVariable> {
        // Every path shares the same information, nothing to regress on
        if underlying.is_deterministic() {
            return Ok(RandomVariable::deterministic(date, future.average()));
        }
        let moneyness = underlying.div_scalar(self.strike);
        let basis = BasisFunctions::polynomial(&moneyness, self.basis_degree);
        ConditionalExpectationEstimator::with_single_basis(date, &basis).conditional_expectation(future)
    }
}

impl Product for BermudanOption {
    fn value(&self, evaluation_time: f64, model: &dyn SimulationModel) -> McResult<RandomVariable> {
        let mut value: Option<RandomVariable> = None;

        for &date in self.exercise_dates.iter().rev() {
            if date < evaluation_time {
                break;
            }
            let underlying = model.asset_value(date, self.underlying)?;
            let numeraire = model.numeraire(date)?;
            let exercise = self.option_type.intrinsic(&underlying, self.strike).div(&numeraire);

            value = Some(match value {
                None => exercise,
                Some(future) => {
                    let continuation = self
                        .continuation(date, &underlying, &future)
                        .map_err(|e| {
                            McError::wrap(format!("continuation estimate at exercise date {}", date), e)
                        })?;
                    let trigger = exercise
                        .sub(&continuation)
                        .apply2(&exercise, |d, x| if x > 0.0 { d } else { -1.0 });
                    RandomVariable::barrier(&trigger, &exercise, &future)
                }
            });
        }

        let Some(value) = value else {
            debug!(evaluation_time, "all exercise dates passed");
            return Ok(RandomVariable::deterministic(evaluation_time, 0.0));
        };
        let numeraire_at_evaluation = model.numeraire(evaluation_time)?;
        Ok(value.mult(&numeraire_at_evaluation))
    }
}
