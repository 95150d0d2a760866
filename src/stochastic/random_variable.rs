// src/stochastic/random_variable.rs
//! Vectorized random variable: the value type of the simulation.
//!
//! # Representation
//!
//! A [`RandomVariable`] is either a deterministic scalar or a dense array of
//! per-path realizations, tagged with the filtration time at which it becomes
//! known. Arrays are shared behind an `Arc`, so clones are cheap and values
//! can be handed to other threads or stored in caches without copying.
//!
//! # Semantics
//!
//! - Every operation returns a new value, operands are never mutated.
//! - Scalar op scalar stays scalar (no allocation). As soon as one operand
//!   holds paths the result holds paths (broadcast).
//! - Two path arrays must have the same length; a mismatch panics.
//! - IEEE-754 rules apply throughout: `x / 0` is a signed infinity and NaN
//!   propagates, including through `cap`, `floor`, `min` and `max`.
//! - The filtration time of a result is the latest time of its operands.
//!
//! # Reductions
//!
//! Reductions return `f64` and accumulate with compensated (Kahan) summation
//! in `f64`, sequentially, so the result does not depend on thread
//! scheduling. A deterministic value has `average() == value` and
//! `variance() == 0` regardless of how many paths it stands for.

use super::precision::Real;
use rayon::prelude::*;
use std::cell::Cell;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

/// Arrays at least this long are processed with rayon parallel iterators.
pub const PARALLEL_THRESHOLD: usize = 4096;

thread_local! {
    static SEQUENTIAL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

struct SequentialSection;

impl Drop for SequentialSection {
    fn drop(&mut self) {
        SEQUENTIAL_DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

/// Run `f` with every kernel on this thread processed sequentially.
///
/// A thread waiting inside a rayon join may pick up unrelated queued jobs.
/// Code holding a lock that those jobs can also request must therefore not
/// enter rayon, or the thread would wait on itself.
pub fn with_sequential_kernels<R>(f: impl FnOnce() -> R) -> R {
    SEQUENTIAL_DEPTH.with(|depth| depth.set(depth.get() + 1));
    let _section = SequentialSection;
    f()
}

/// True inside [`with_sequential_kernels`] on the current thread.
pub fn kernels_are_sequential() -> bool {
    SEQUENTIAL_DEPTH.with(|depth| depth.get() > 0)
}

#[derive(Clone, Debug, PartialEq)]
enum Realizations<T> {
    Deterministic(T),
    Paths(Arc<[T]>),
}

/// Value observed at a filtration time, either deterministic or path-wise.
#[derive(Clone, Debug, PartialEq)]
pub struct RandomVariable<T: Real = f64> {
    time: f64,
    realizations: Realizations<T>,
}

/// Single precision variant.
pub type RandomVariableF32 = RandomVariable<f32>;

#[derive(Clone, Copy)]
enum Operand<'a, T> {
    Scalar(T),
    Slice(&'a [T]),
}

impl<'a, T: Copy> Operand<'a, T> {
    #[inline(always)]
    fn at(&self, path: usize) -> T {
        match self {
            Operand::Scalar(value) => *value,
            Operand::Slice(values) => values[path],
        }
    }

    fn len(&self) -> Option<usize> {
        match self {
            Operand::Scalar(_) => None,
            Operand::Slice(values) => Some(values.len()),
        }
    }
}

/// Common path count of the vector operands, `None` if all are scalars.
fn common_path_count(lengths: &[Option<usize>]) -> Option<usize> {
    let mut count = None;
    for len in lengths.iter().flatten() {
        match count {
            None => count = Some(*len),
            Some(n) => assert_eq!(
                n, *len,
                "random variables have different numbers of paths ({} vs {})",
                n, len
            ),
        }
    }
    count
}

fn build_paths<T: Real>(n: usize, f: impl Fn(usize) -> T + Sync + Send) -> Arc<[T]> {
    let values: Vec<T> = if n >= PARALLEL_THRESHOLD && !kernels_are_sequential() {
        (0..n).into_par_iter().map(f).collect()
    } else {
        (0..n).map(f).collect()
    };
    values.into()
}

#[inline]
fn nan_min<T: Real>(a: T, b: T) -> T {
    if a.is_nan() || b.is_nan() {
        T::nan()
    } else if a < b {
        a
    } else {
        b
    }
}

#[inline]
fn nan_max<T: Real>(a: T, b: T) -> T {
    if a.is_nan() || b.is_nan() {
        T::nan()
    } else if a > b {
        a
    } else {
        b
    }
}

/// Compensated summation in f64.
fn kahan_sum(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut compensation = 0.0;
    for value in values {
        let y = value - compensation;
        let t = sum + y;
        compensation = (t - sum) - y;
        sum = t;
    }
    sum
}

fn sort_nan_last<T: Real>(values: &mut [T]) {
    values.sort_by(|a, b| {
        a.partial_cmp(b)
            .unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
    });
}

fn quantile_index(size: usize, quantile: f64) -> usize {
    let index = ((size as f64 + 1.0) * quantile - 1.0).round();
    if index.is_nan() || index < 0.0 {
        0
    } else {
        (index as usize).min(size - 1)
    }
}

impl<T: Real> RandomVariable<T> {
    /// Deterministic value known at `time`.
    pub fn deterministic(time: f64, value: T) -> Self {
        RandomVariable {
            time,
            realizations: Realizations::Deterministic(value),
        }
    }

    /// Path-wise value known at `time`.
    ///
    /// # Panics
    ///
    /// Panics if `values` is empty.
    pub fn from_paths(time: f64, values: Vec<T>) -> Self {
        assert!(
            !values.is_empty(),
            "a path-wise random variable needs at least one path"
        );
        RandomVariable {
            time,
            realizations: Realizations::Paths(values.into()),
        }
    }

    pub fn zero() -> Self {
        Self::deterministic(0.0, T::zero())
    }

    pub fn one() -> Self {
        Self::deterministic(0.0, T::one())
    }

    fn with_paths(time: f64, values: Arc<[T]>) -> Self {
        RandomVariable {
            time,
            realizations: Realizations::Paths(values),
        }
    }

    fn operand(&self) -> Operand<'_, T> {
        match &self.realizations {
            Realizations::Deterministic(value) => Operand::Scalar(*value),
            Realizations::Paths(values) => Operand::Slice(values),
        }
    }

    pub fn filtration_time(&self) -> f64 {
        self.time
    }

    /// Same realizations, observed at a different filtration time.
    pub fn at_time(&self, time: f64) -> Self {
        RandomVariable {
            time,
            realizations: self.realizations.clone(),
        }
    }

    pub fn is_deterministic(&self) -> bool {
        matches!(self.realizations, Realizations::Deterministic(_))
    }

    /// Number of stored realizations (1 for a deterministic value).
    pub fn size(&self) -> usize {
        match &self.realizations {
            Realizations::Deterministic(_) => 1,
            Realizations::Paths(values) => values.len(),
        }
    }

    /// Realization on a given path. A deterministic value is the same on all paths.
    pub fn get(&self, path: usize) -> T {
        self.operand().at(path)
    }

    /// The deterministic value, if this is deterministic.
    pub fn value(&self) -> Option<T> {
        match &self.realizations {
            Realizations::Deterministic(value) => Some(*value),
            Realizations::Paths(_) => None,
        }
    }

    /// Stored path array, if this holds paths.
    pub fn as_slice(&self) -> Option<&[T]> {
        match &self.realizations {
            Realizations::Deterministic(_) => None,
            Realizations::Paths(values) => Some(values),
        }
    }

    /// Realizations expanded to `number_of_paths` entries.
    pub fn realizations(&self, number_of_paths: usize) -> Vec<T> {
        match &self.realizations {
            Realizations::Deterministic(value) => vec![*value; number_of_paths],
            Realizations::Paths(values) => values.to_vec(),
        }
    }

    /// `true` if both values share the same stored realizations.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.realizations, &other.realizations) {
            (Realizations::Paths(a), Realizations::Paths(b)) => Arc::ptr_eq(a, b),
            (Realizations::Deterministic(a), Realizations::Deterministic(b)) => {
                a == b || (a.is_nan() && b.is_nan())
            }
            _ => false,
        }
    }

    /// Collapses a path array whose entries are all equal to a scalar.
    pub fn to_deterministic_if_constant(&self) -> Self {
        match &self.realizations {
            Realizations::Paths(values) if values.iter().all(|v| *v == values[0]) => {
                Self::deterministic(self.time, values[0])
            }
            _ => self.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Element-wise kernels
    // ------------------------------------------------------------------

    /// Applies `f` to every realization.
    pub fn apply(&self, f: impl Fn(T) -> T + Sync + Send) -> Self {
        match &self.realizations {
            Realizations::Deterministic(value) => Self::deterministic(self.time, f(*value)),
            Realizations::Paths(values) => {
                Self::with_paths(self.time, build_paths(values.len(), |i| f(values[i])))
            }
        }
    }

    /// Combines two values element-wise with broadcasting.
    pub fn apply2(&self, other: &Self, f: impl Fn(T, T) -> T + Sync + Send) -> Self {
        let time = self.time.max(other.time);
        let (a, b) = (self.operand(), other.operand());
        match common_path_count(&[a.len(), b.len()]) {
            None => Self::deterministic(time, f(a.at(0), b.at(0))),
            Some(n) => Self::with_paths(time, build_paths(n, |i| f(a.at(i), b.at(i)))),
        }
    }

    /// Combines three values element-wise with broadcasting.
    pub fn apply3(
        &self,
        second: &Self,
        third: &Self,
        f: impl Fn(T, T, T) -> T + Sync + Send,
    ) -> Self {
        let time = self.time.max(second.time).max(third.time);
        let (a, b, c) = (self.operand(), second.operand(), third.operand());
        match common_path_count(&[a.len(), b.len(), c.len()]) {
            None => Self::deterministic(time, f(a.at(0), b.at(0), c.at(0))),
            Some(n) => Self::with_paths(time, build_paths(n, |i| f(a.at(i), b.at(i), c.at(i)))),
        }
    }

    pub fn add(&self, other: &Self) -> Self {
        self.apply2(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &Self) -> Self {
        self.apply2(other, |a, b| a - b)
    }

    pub fn mult(&self, other: &Self) -> Self {
        self.apply2(other, |a, b| a * b)
    }

    pub fn div(&self, other: &Self) -> Self {
        self.apply2(other, |a, b| a / b)
    }

    /// Element-wise minimum of `self` and `cap`.
    pub fn cap(&self, cap: &Self) -> Self {
        self.apply2(cap, nan_min)
    }

    /// Element-wise maximum of `self` and `floor`.
    pub fn floor(&self, floor: &Self) -> Self {
        self.apply2(floor, nan_max)
    }

    /// `self + factor1 * factor2`
    pub fn add_product(&self, factor1: &Self, factor2: &Self) -> Self {
        self.apply3(factor1, factor2, |a, b, c| a + b * c)
    }

    pub fn add_scalar(&self, value: f64) -> Self {
        let value = T::from_f64(value);
        self.apply(move |x| x + value)
    }

    pub fn sub_scalar(&self, value: f64) -> Self {
        let value = T::from_f64(value);
        self.apply(move |x| x - value)
    }

    pub fn mult_scalar(&self, value: f64) -> Self {
        let value = T::from_f64(value);
        self.apply(move |x| x * value)
    }

    pub fn div_scalar(&self, value: f64) -> Self {
        let value = T::from_f64(value);
        self.apply(move |x| x / value)
    }

    pub fn cap_scalar(&self, cap: f64) -> Self {
        let cap = T::from_f64(cap);
        self.apply(move |x| nan_min(x, cap))
    }

    pub fn floor_scalar(&self, floor: f64) -> Self {
        let floor = T::from_f64(floor);
        self.apply(move |x| nan_max(x, floor))
    }

    /// `self * (1 + rate * period)`
    pub fn accrue(&self, rate: &Self, period: f64) -> Self {
        let period = T::from_f64(period);
        self.apply2(rate, move |x, r| x * (T::one() + r * period))
    }

    /// `self / (1 + rate * period)`
    pub fn discount(&self, rate: &Self, period: f64) -> Self {
        let period = T::from_f64(period);
        self.apply2(rate, move |x, r| x / (T::one() + r * period))
    }

    pub fn squared(&self) -> Self {
        self.apply(|x| x * x)
    }

    pub fn sqrt(&self) -> Self {
        self.apply(|x| x.sqrt())
    }

    pub fn exp(&self) -> Self {
        self.apply(|x| x.exp())
    }

    pub fn log(&self) -> Self {
        self.apply(|x| x.ln())
    }

    pub fn abs(&self) -> Self {
        self.apply(|x| x.abs())
    }

    pub fn neg(&self) -> Self {
        self.apply(|x| -x)
    }

    pub fn invert(&self) -> Self {
        self.apply(|x| T::one() / x)
    }

    pub fn pow(&self, exponent: f64) -> Self {
        let exponent = T::from_f64(exponent);
        self.apply(move |x| x.powf(exponent))
    }

    /// Path-wise selection: `value_if_triggered` where `trigger >= 0`,
    /// `value_if_not_triggered` where `trigger < 0`.
    ///
    /// A trigger of exactly zero counts as triggered. A NaN trigger selects
    /// the second branch.
    pub fn barrier(trigger: &Self, value_if_triggered: &Self, value_if_not_triggered: &Self) -> Self {
        trigger.apply3(
            value_if_triggered,
            value_if_not_triggered,
            |t, a, b| if t >= T::zero() { a } else { b },
        )
    }

    /// [`barrier`](Self::barrier) with `self` as the trigger.
    pub fn choose(&self, if_non_negative: &Self, if_negative: &Self) -> Self {
        Self::barrier(self, if_non_negative, if_negative)
    }

    // ------------------------------------------------------------------
    // Reductions
    // ------------------------------------------------------------------

    pub fn average(&self) -> f64 {
        match &self.realizations {
            Realizations::Deterministic(value) => value.as_f64(),
            Realizations::Paths(values) => {
                kahan_sum(values.iter().map(|v| v.as_f64())) / values.len() as f64
            }
        }
    }

    /// Probability weighted average `Σ x_i p_i`.
    pub fn average_over(&self, probabilities: &Self) -> f64 {
        let (a, p) = (self.operand(), probabilities.operand());
        match common_path_count(&[a.len(), p.len()]) {
            None => a.at(0).as_f64() * p.at(0).as_f64(),
            Some(n) => kahan_sum((0..n).map(|i| a.at(i).as_f64() * p.at(i).as_f64())),
        }
    }

    /// Population variance (normalized by the number of paths).
    pub fn variance(&self) -> f64 {
        match &self.realizations {
            Realizations::Deterministic(_) => 0.0,
            Realizations::Paths(values) => {
                // shifted data: a constant array has exactly zero variance
                let shift = values[0].as_f64();
                let n = values.len() as f64;
                let mean = kahan_sum(values.iter().map(|v| v.as_f64() - shift)) / n;
                let mean_sq = kahan_sum(values.iter().map(|v| {
                    let d = v.as_f64() - shift;
                    d * d
                })) / n;
                let variance = mean_sq - mean * mean;
                if variance < 0.0 {
                    0.0
                } else {
                    variance
                }
            }
        }
    }

    /// Unbiased sample variance (normalized by `n - 1`).
    pub fn sample_variance(&self) -> f64 {
        let n = self.size();
        if self.is_deterministic() || n < 2 {
            return 0.0;
        }
        self.variance() * n as f64 / (n as f64 - 1.0)
    }

    pub fn standard_deviation(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Standard error of the Monte Carlo average.
    pub fn standard_error(&self) -> f64 {
        self.standard_deviation() / (self.size() as f64).sqrt()
    }

    pub fn min(&self) -> f64 {
        match &self.realizations {
            Realizations::Deterministic(value) => value.as_f64(),
            Realizations::Paths(values) => values
                .iter()
                .fold(T::infinity(), |m, &v| nan_min(m, v))
                .as_f64(),
        }
    }

    pub fn max(&self) -> f64 {
        match &self.realizations {
            Realizations::Deterministic(value) => value.as_f64(),
            Realizations::Paths(values) => values
                .iter()
                .fold(T::neg_infinity(), |m, &v| nan_max(m, v))
                .as_f64(),
        }
    }

    /// Sorted copy of the realizations, NaN last.
    pub fn sorted(&self) -> Vec<T> {
        let mut values = self.realizations(1);
        sort_nan_last(&mut values);
        values
    }

    /// Empirical quantile `p` of the path distribution.
    ///
    /// Uses the sorted value at index `round((n + 1) * p - 1)`. Requests
    /// outside the attainable range return the smallest or largest value.
    pub fn quantile(&self, quantile: f64) -> f64 {
        match &self.realizations {
            Realizations::Deterministic(value) => value.as_f64(),
            Realizations::Paths(values) => {
                let sorted = self.sorted();
                sorted[quantile_index(values.len(), quantile)].as_f64()
            }
        }
    }

    /// Average of the sorted values between two quantiles (inclusive).
    pub fn quantile_expectation(&self, lower: f64, upper: f64) -> f64 {
        if self.is_deterministic() {
            return self.average();
        }
        let (lower, upper) = if lower <= upper { (lower, upper) } else { (upper, lower) };
        let sorted = self.sorted();
        let from = quantile_index(sorted.len(), lower);
        let to = quantile_index(sorted.len(), upper);
        let slice = &sorted[from..=to];
        kahan_sum(slice.iter().map(|v| v.as_f64())) / slice.len() as f64
    }

    /// Relative frequencies of the realizations falling into the buckets
    /// `x <= p_0`, `p_{i-1} < x <= p_i`, `x > p_last`.
    ///
    /// Returns `interval_points.len() + 1` frequencies. NaN realizations fall
    /// into no bucket.
    ///
    /// # Panics
    ///
    /// Panics if `interval_points` is not sorted ascending.
    pub fn histogram(&self, interval_points: &[f64]) -> Vec<f64> {
        assert!(
            interval_points.windows(2).all(|w| w[0] <= w[1]),
            "histogram interval points must be sorted ascending"
        );
        let mut counts = vec![0usize; interval_points.len() + 1];
        let values = self.realizations(1);
        for value in values.iter().map(|v| v.as_f64()).filter(|v| !v.is_nan()) {
            counts[interval_points.partition_point(|&p| p < value)] += 1;
        }
        let n = values.len() as f64;
        counts.into_iter().map(|c| c as f64 / n).collect()
    }

    /// Histogram over `number_of_points` interval points spread symmetrically
    /// over `average ± standard_deviations * standard_deviation()`.
    ///
    /// Returns `(interval_points, frequencies)`.
    pub fn histogram_symmetric(
        &self,
        number_of_points: usize,
        standard_deviations: f64,
    ) -> (Vec<f64>, Vec<f64>) {
        assert!(number_of_points >= 2, "a symmetric histogram needs at least two points");
        let mean = self.average();
        let width = self.standard_deviation() * standard_deviations;
        let points: Vec<f64> = (0..number_of_points)
            .map(|i| mean + width * (2.0 * i as f64 / (number_of_points - 1) as f64 - 1.0))
            .collect();
        let frequencies = self.histogram(&points);
        (points, frequencies)
    }
}

macro_rules! impl_binary_operator {
    ($trait:ident, $method:ident, $op:ident) => {
        impl<'a, 'b, T: Real> $trait<&'b RandomVariable<T>> for &'a RandomVariable<T> {
            type Output = RandomVariable<T>;

            fn $method(self, rhs: &'b RandomVariable<T>) -> RandomVariable<T> {
                RandomVariable::$op(self, rhs)
            }
        }
    };
}

impl_binary_operator!(Add, add, add);
impl_binary_operator!(Sub, sub, sub);
impl_binary_operator!(Mul, mul, mult);
impl_binary_operator!(Div, div, div);

impl<'a, T: Real> Neg for &'a RandomVariable<T> {
    type Output = RandomVariable<T>;

    fn neg(self) -> RandomVariable<T> {
        RandomVariable::neg(self)
    }
}
