// src/error.rs
use thiserror::Error;

/// Error types for the mc-valuation library
///
/// Numerical degeneracy (NaN, infinities) is not an error: it flows through
/// [`RandomVariable`](crate::stochastic::RandomVariable) arithmetic like any
/// other floating point value. Programmer errors such as mismatched path
/// counts panic instead of being reported here.
#[derive(Debug, Error)]
pub enum McError {
    /// Structural failure of a valuation: an invalid model state, a failed
    /// worker task or a regression that cannot be solved.
    #[error("Calculation failure: {message}")]
    CalculationFailure {
        message: String,
        #[source]
        source: Option<Box<McError>>,
    },

    /// Gram matrix of a regression is singular or numerically close to it
    #[error("Singular regression matrix of dimension {dimension} (reciprocal condition {condition:e})")]
    SingularRegressionMatrix { dimension: usize, condition: f64 },

    /// Invalid parameter values
    #[error("Invalid parameter '{parameter}' = {value}: {constraint}")]
    InvalidParameters {
        parameter: String,
        value: f64,
        constraint: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfiguration { field: String, reason: String },
}

impl McError {
    /// Calculation failure without an underlying cause
    pub fn calculation(message: impl Into<String>) -> Self {
        McError::CalculationFailure {
            message: message.into(),
            source: None,
        }
    }

    /// Calculation failure carrying the error that caused it
    pub fn wrap(message: impl Into<String>, cause: McError) -> Self {
        McError::CalculationFailure {
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// Innermost error of a chain of wrapped calculation failures
    pub fn root_cause(&self) -> &McError {
        match self {
            McError::CalculationFailure {
                source: Some(cause),
                ..
            } => cause.root_cause(),
            other => other,
        }
    }
}

/// Result type alias for mc-valuation operations
pub type McResult<T> = Result<T, McError>;

/// Parameter checks shared by models, products and configurations
pub mod validation {
    use super::{McError, McResult};

    /// Upper bound on a path ensemble
    pub const MAX_PATHS: usize = 1_000_000_000;

    fn check(name: &str, value: f64, accepted: bool, constraint: impl Into<String>) -> McResult<()> {
        if accepted {
            Ok(())
        } else {
            Err(McError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: constraint.into(),
            })
        }
    }

    /// `value > 0`; NaN is rejected.
    pub fn validate_positive(name: &str, value: f64) -> McResult<()> {
        check(name, value, value > 0.0, "must be > 0")
    }

    /// `value >= 0`; NaN is rejected.
    pub fn validate_non_negative(name: &str, value: f64) -> McResult<()> {
        check(name, value, value >= 0.0, "must be >= 0")
    }

    /// `min <= value <= max`; NaN is rejected.
    pub fn validate_range(name: &str, value: f64, min: f64, max: f64) -> McResult<()> {
        check(
            name,
            value,
            (min..=max).contains(&value),
            format!("must lie in [{}, {}]", min, max),
        )
    }

    pub fn validate_correlation(name: &str, rho: f64) -> McResult<()> {
        validate_range(name, rho, -1.0, 1.0)
    }

    pub fn validate_finite(name: &str, value: f64) -> McResult<()> {
        check(name, value, value.is_finite(), "must be a finite number")
    }

    pub fn validate_paths(paths: usize) -> McResult<()> {
        if paths == 0 || paths > MAX_PATHS {
            return Err(McError::InvalidConfiguration {
                field: "number_of_paths".to_string(),
                reason: format!("must be between 1 and {}, got {}", MAX_PATHS, paths),
            });
        }
        Ok(())
    }

    /// Non-empty, non-negative and strictly increasing schedule of times
    pub fn validate_schedule(field: &str, times: &[f64]) -> McResult<()> {
        let reason = if times.is_empty() {
            Some("at least one date is required")
        } else if times.iter().any(|t| !(*t >= 0.0) || !t.is_finite()) {
            Some("dates must be finite and non-negative")
        } else if times.windows(2).any(|w| w[1] <= w[0]) {
            Some("dates must be strictly increasing")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(McError::InvalidConfiguration {
                field: field.to_string(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }
}
