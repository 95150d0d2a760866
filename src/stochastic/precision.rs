// src/stochastic/precision.rs
//! Floating point precisions a [`RandomVariable`](super::RandomVariable) can
//! store its realizations in.
//!
//! Storage precision only affects the element-wise kernels. Reductions
//! (`average`, `variance`, ...) always accumulate in `f64`, so degenerate
//! cases such as zero variance or NaN samples behave the same for both
//! precisions.

use num_traits::Float;
use std::fmt::Debug;

pub trait Real: Float + Send + Sync + Debug + 'static {
    fn from_f64(value: f64) -> Self;
    fn as_f64(self) -> f64;
}

impl Real for f64 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self
    }
}

impl Real for f32 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }
}
