// src/regression/conditional_expectation.rs
//! Conditional expectation by least-squares regression on basis functions.
//!
//! # Mathematical Framework
//!
//! For regressors `b_1, ..., b_n` observed at time `t` and a dependent `y`,
//! the projection `E[y | F_t] ≈ Σ_i β_i b_i` solves the normal equations
//! ```text
//! G β = p,    G_ij = E[b_i b_j],    p_i = E[y b_i]
//! ```
//! with expectations replaced by path averages.
//!
//! The coefficients may be fitted on one ensemble (estimator basis) and
//! applied to another (predictor basis), e.g. a training simulation and the
//! valuation simulation. Both sets must list the same functions in the same
//! order.
//!
//! # Singular systems
//!
//! The Gram matrix is checked through its singular values before solving.
//! A reciprocal condition number below [`MIN_RECIPROCAL_CONDITION`] (or a
//! NaN entry) is reported as [`McError::SingularRegressionMatrix`] rather
//! than producing meaningless coefficients.

use super::basis::BasisFunctions;
use crate::error::{McError, McResult};
use crate::stochastic::RandomVariable;
use crate::time_discretization::TIME_TOLERANCE;
use nalgebra::{DMatrix, DVector};
use tracing::debug;

pub const MIN_RECIPROCAL_CONDITION: f64 = 1e-14;

#[derive(Clone, Debug)]
pub struct ConditionalExpectationEstimator {
    evaluation_time: f64,
    estimator: Vec<RandomVariable>,
    predictor: Vec<RandomVariable>,
}

impl ConditionalExpectationEstimator {
    /// # Panics
    ///
    /// Panics if the two sets differ in length or if a basis function is
    /// observed after `evaluation_time`.
    pub fn new(evaluation_time: f64, estimator: &BasisFunctions, predictor: &BasisFunctions) -> Self {
        assert_eq!(
            estimator.len(),
            predictor.len(),
            "estimator and predictor basis sets differ in length"
        );

        let mut kept_estimator = Vec::with_capacity(estimator.len());
        let mut kept_predictor = Vec::with_capacity(predictor.len());
        for (index, pair) in estimator.iter().zip(predictor.iter()).enumerate() {
            if let (Some(e), Some(p)) = pair {
                for function in [e, p] {
                    assert!(
                        function.filtration_time() <= evaluation_time + TIME_TOLERANCE,
                        "basis function {} is observed at {} after the evaluation time {}",
                        index,
                        function.filtration_time(),
                        evaluation_time
                    );
                }
                kept_estimator.push(e.clone());
                kept_predictor.push(p.clone());
            }
        }
        debug!(
            evaluation_time,
            given = estimator.len(),
            kept = kept_estimator.len(),
            "regression basis"
        );

        ConditionalExpectationEstimator {
            evaluation_time,
            estimator: kept_estimator,
            predictor: kept_predictor,
        }
    }

    /// Fit and predict on the same basis functions.
    pub fn with_single_basis(evaluation_time: f64, basis: &BasisFunctions) -> Self {
        Self::new(evaluation_time, basis, basis)
    }

    pub fn evaluation_time(&self) -> f64 {
        self.evaluation_time
    }

    /// Number of basis functions surviving the removal of absent entries.
    pub fn dimension(&self) -> usize {
        self.estimator.len()
    }

    /// Least-squares coefficients of `dependent` on the estimator basis.
    pub fn regression_coefficients(&self, dependent: &RandomVariable) -> McResult<Vec<f64>> {
        let n = self.dimension();
        if n == 0 {
            return Err(McError::calculation(
                "regression has no basis functions left after removing absent entries",
            ));
        }

        let mut gram = DMatrix::<f64>::zeros(n, n);
        for i in 0..n {
            for j in i..n {
                let entry = self.estimator[i].mult(&self.estimator[j]).average();
                gram[(i, j)] = entry;
                gram[(j, i)] = entry;
            }
        }
        let projection =
            DVector::from_iterator(n, self.estimator.iter().map(|b| dependent.mult(b).average()));

        let singular_values = gram.clone().svd(false, false).singular_values;
        let largest = singular_values.iter().cloned().fold(0.0_f64, f64::max);
        let smallest = singular_values.iter().cloned().fold(f64::INFINITY, f64::min);
        let condition = if largest > 0.0 { smallest / largest } else { 0.0 };
        let has_nan = gram.iter().any(|g| g.is_nan());
        if has_nan || !(condition >= MIN_RECIPROCAL_CONDITION) {
            return Err(McError::SingularRegressionMatrix {
                dimension: n,
                condition,
            });
        }

        let coefficients = gram
            .lu()
            .solve(&projection)
            .ok_or(McError::SingularRegressionMatrix {
                dimension: n,
                condition,
            })?;
        Ok(coefficients.iter().cloned().collect())
    }

    /// `Σ β_i b_i` over the predictor basis, observed at the evaluation time.
    pub fn conditional_expectation(&self, dependent: &RandomVariable) -> McResult<RandomVariable> {
        let coefficients = self.regression_coefficients(dependent)?;
        let estimate = coefficients.iter().zip(&self.predictor).fold(
            RandomVariable::deterministic(self.evaluation_time, 0.0),
            |sum, (beta, basis)| sum.add(&basis.mult_scalar(*beta)),
        );
        Ok(estimate.at_time(self.evaluation_time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{get_normal_draw, RngFactory};
    use approx::assert_abs_diff_eq;

    fn normal_sample(seed: u64, n: usize, time: f64) -> RandomVariable {
        let mut rng = RngFactory::new(seed).path_rng(0);
        RandomVariable::from_paths(time, (0..n).map(|_| get_normal_draw(&mut rng)).collect())
    }

    #[test]
    fn test_exact_linear_relation_is_recovered() {
        let b1 = normal_sample(1, 500, 0.5);
        let b2 = normal_sample(2, 500, 0.5);
        let y = b1.mult_scalar(3.0).sub(&b2);

        let basis = BasisFunctions::from_vec(vec![Some(b1), Some(b2)]);
        let regression = ConditionalExpectationEstimator::with_single_basis(1.0, &basis);
        let beta = regression.regression_coefficients(&y).unwrap();

        assert_eq!(beta.len(), 2);
        assert_abs_diff_eq!(beta[0], 3.0, epsilon = 1e-10);
        assert_abs_diff_eq!(beta[1], -1.0, epsilon = 1e-10);

        let estimate = regression.conditional_expectation(&y).unwrap();
        assert_eq!(estimate.filtration_time(), 1.0);
        assert_abs_diff_eq!(estimate.sub(&y).abs().max(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_absent_functions_are_dropped() {
        let b1 = normal_sample(3, 200, 0.0);
        let y = b1.mult_scalar(2.0).add_scalar(1.0);
        let basis = BasisFunctions::from_vec(vec![
            Some(RandomVariable::one()),
            None,
            Some(b1),
        ]);
        let regression = ConditionalExpectationEstimator::with_single_basis(0.0, &basis);
        assert_eq!(regression.dimension(), 2);
        let beta = regression.regression_coefficients(&y).unwrap();
        assert_abs_diff_eq!(beta[0], 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(beta[1], 2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_estimator_and_predictor_sets() {
        let training = normal_sample(4, 300, 0.0);
        let valuation = normal_sample(5, 300, 0.0);
        let y = training.mult_scalar(-0.5);

        let estimator = BasisFunctions::from_vec(vec![Some(training)]);
        let predictor = BasisFunctions::from_vec(vec![Some(valuation.clone())]);
        let regression = ConditionalExpectationEstimator::new(0.0, &estimator, &predictor);
        let estimate = regression.conditional_expectation(&y).unwrap();

        assert_abs_diff_eq!(estimate.get(7), -0.5 * valuation.get(7), epsilon = 1e-10);
    }

    #[test]
    fn test_singular_gram_matrix_is_an_error() {
        let b1 = normal_sample(6, 100, 0.0);
        let b2 = b1.mult_scalar(2.0);
        let basis = BasisFunctions::from_vec(vec![Some(b1.clone()), Some(b2)]);
        let regression = ConditionalExpectationEstimator::with_single_basis(0.0, &basis);
        let result = regression.conditional_expectation(&b1);
        assert!(matches!(
            result,
            Err(McError::SingularRegressionMatrix { dimension: 2, .. })
        ));
    }

    #[test]
    fn test_all_absent_is_calculation_failure() {
        let basis = BasisFunctions::from_vec(vec![None, None]);
        let regression = ConditionalExpectationEstimator::with_single_basis(0.0, &basis);
        assert!(matches!(
            regression.regression_coefficients(&RandomVariable::one()),
            Err(McError::CalculationFailure { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "after the evaluation time")]
    fn test_look_ahead_basis_panics() {
        let basis = BasisFunctions::from_vec(vec![Some(normal_sample(7, 10, 2.0))]);
        let _ = ConditionalExpectationEstimator::with_single_basis(1.0, &basis);
    }

    #[test]
    #[should_panic(expected = "differ in length")]
    fn test_mismatched_sets_panic() {
        let estimator = BasisFunctions::from_vec(vec![Some(RandomVariable::one())]);
        let predictor = BasisFunctions::new();
        let _ = ConditionalExpectationEstimator::new(0.0, &estimator, &predictor);
    }
}
