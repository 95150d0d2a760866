// src/portfolio.rs
//! Concurrent valuation of a weighted portfolio of products
//!
//! Each product is valued as an independent task on a worker pool that
//! lives only for the duration of one call. Results are summed in product
//! order, so the aggregate is bitwise identical for any thread count.

use crate::error::{McError, McResult};
use crate::math_utils::Timer;
use crate::mc::SimulationModel;
use crate::products::Product;
use crate::stochastic::RandomVariable;
use rayon::prelude::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Worker pool settings for a portfolio valuation
#[derive(Clone, Debug, Default)]
pub struct PortfolioConfig {
    /// Worker threads; `None` uses the available hardware parallelism.
    /// Always capped by the number of products.
    pub thread_count: Option<usize>,
}

impl PortfolioConfig {
    pub fn with_threads(thread_count: usize) -> Self {
        PortfolioConfig {
            thread_count: Some(thread_count),
        }
    }

    pub fn validate(&self) -> McResult<()> {
        if self.thread_count == Some(0) {
            return Err(McError::InvalidConfiguration {
                field: "thread_count".to_string(),
                reason: "at least one worker thread is required".to_string(),
            });
        }
        Ok(())
    }

    /// Pool size used for `number_of_products` tasks
    pub fn effective_threads(&self, number_of_products: usize) -> usize {
        self.thread_count
            .unwrap_or_else(num_cpus::get)
            .min(number_of_products)
            .max(1)
    }
}

/// Ordered list of weighted products.
#[derive(Clone, Default)]
pub struct Portfolio {
    products: Vec<Arc<dyn Product>>,
    weights: Vec<f64>,
}

impl Portfolio {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics if `products` and `weights` differ in length.
    pub fn with_products(products: Vec<Arc<dyn Product>>, weights: Vec<f64>) -> Self {
        assert_eq!(
            products.len(),
            weights.len(),
            "products and weights differ in length"
        );
        Portfolio { products, weights }
    }

    pub fn add(&mut self, product: Arc<dyn Product>, weight: f64) -> &mut Self {
        self.products.push(product);
        self.weights.push(weight);
        self
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Value with an explicit thread count (`None` for the default)
    pub fn value(
        &self,
        evaluation_time: f64,
        model: &dyn SimulationModel,
        thread_count: Option<usize>,
    ) -> McResult<RandomVariable> {
        self.value_with_config(evaluation_time, model, &PortfolioConfig { thread_count })
    }

    /// `Σ_i weight_i * product_i.value(evaluation_time, model)`, summed in
    /// product order.
    ///
    /// The first failing product (lowest index among those that ran) fails
    /// the whole call with a [`McError::CalculationFailure`] wrapping its
    /// error; a panicking product is reported the same way. Once a failure
    /// is seen, products not yet started are skipped.
    pub fn value_with_config(
        &self,
        evaluation_time: f64,
        model: &dyn SimulationModel,
        config: &PortfolioConfig,
    ) -> McResult<RandomVariable> {
        config.validate()?;
        if self.is_empty() {
            return Ok(RandomVariable::deterministic(evaluation_time, 0.0));
        }

        let threads = config.effective_threads(self.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("portfolio-worker-{}", i))
            .build()
            .map_err(|e| McError::calculation(format!("failed to start worker pool: {}", e)))?;
        debug!(products = self.len(), threads, "portfolio valuation started");

        let timer = Timer::new();
        let failed = AtomicBool::new(false);
        let outcomes: Vec<Option<McResult<RandomVariable>>> = pool.install(|| {
            (0..self.len())
                .into_par_iter()
                .map(|index| {
                    if failed.load(Ordering::Acquire) {
                        return None;
                    }
                    let outcome = self.value_component(index, evaluation_time, model);
                    if outcome.is_err() {
                        failed.store(true, Ordering::Release);
                    }
                    Some(outcome)
                })
                .collect()
        });
        drop(pool);

        let mut total = RandomVariable::deterministic(evaluation_time, 0.0);
        let mut skipped = 0;
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Some(Ok(value)) => total = total.add(&value),
                Some(Err(error)) => {
                    warn!(product = index, error = %error, "portfolio valuation failed");
                    return Err(McError::wrap(
                        format!("valuation of portfolio product {} failed", index),
                        error,
                    ));
                }
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            return Err(McError::calculation(format!(
                "{} portfolio products were not valued",
                skipped
            )));
        }

        info!(
            products = self.len(),
            threads,
            elapsed_ms = timer.elapsed_ms(),
            "portfolio valued"
        );
        Ok(total)
    }

    fn value_component(
        &self,
        index: usize,
        evaluation_time: f64,
        model: &dyn SimulationModel,
    ) -> McResult<RandomVariable> {
        let product = &self.products[index];
        let weight = self.weights[index];
        match panic::catch_unwind(AssertUnwindSafe(|| product.value(evaluation_time, model))) {
            Ok(result) => result.map(|value| value.mult_scalar(weight)),
            Err(payload) => Err(McError::calculation(format!(
                "product {} panicked: {}",
                index,
                panic_message(payload.as_ref())
            ))),
        }
    }
}

impl Product for Portfolio {
    fn value(&self, evaluation_time: f64, model: &dyn SimulationModel) -> McResult<RandomVariable> {
        self.value_with_config(evaluation_time, model, &PortfolioConfig::default())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products::test_support::black_scholes_simulation;
    use crate::products::EuropeanOption;

    struct Failing;

    impl Product for Failing {
        fn value(&self, _: f64, _: &dyn SimulationModel) -> McResult<RandomVariable> {
            Err(McError::calculation("broken product"))
        }
    }

    struct Panicking;

    impl Product for Panicking {
        fn value(&self, _: f64, _: &dyn SimulationModel) -> McResult<RandomVariable> {
            panic!("product exploded")
        }
    }

    #[test]
    fn test_effective_threads() {
        assert_eq!(PortfolioConfig::with_threads(8).effective_threads(3), 3);
        assert_eq!(PortfolioConfig::with_threads(2).effective_threads(10), 2);
        assert_eq!(PortfolioConfig::default().effective_threads(0), 1);
        assert!(PortfolioConfig::with_threads(0).validate().is_err());
    }

    #[test]
    fn test_empty_portfolio_is_zero() {
        let simulation = black_scholes_simulation(10, 1);
        let value = Portfolio::new().value(0.0, &simulation, None).unwrap();
        assert_eq!(value.value(), Some(0.0));
        assert_eq!(value.filtration_time(), 0.0);
    }

    #[test]
    fn test_weights_are_applied() {
        let simulation = black_scholes_simulation(500, 2);
        let call: Arc<dyn Product> = Arc::new(EuropeanOption::call(1.0, 100.0).unwrap());
        let single = call.value(0.0, &simulation).unwrap();

        let mut portfolio = Portfolio::new();
        portfolio.add(Arc::clone(&call), 2.0).add(call, -0.5);
        let value = portfolio.value(0.0, &simulation, Some(2)).unwrap();
        assert!(value.sub(&single.mult_scalar(1.5)).abs().max() < 1e-10);
    }

    #[test]
    fn test_failure_is_wrapped() {
        let simulation = black_scholes_simulation(10, 3);
        let mut portfolio = Portfolio::new();
        portfolio
            .add(Arc::new(EuropeanOption::call(1.0, 100.0).unwrap()), 1.0)
            .add(Arc::new(Failing), 1.0);
        let error = portfolio.value(0.0, &simulation, Some(2)).unwrap_err();
        assert!(matches!(error, McError::CalculationFailure { source: Some(_), .. }));
        assert!(error.root_cause().to_string().contains("broken product"));
    }

    #[test]
    fn test_panic_is_captured() {
        let simulation = black_scholes_simulation(10, 4);
        let mut portfolio = Portfolio::new();
        portfolio.add(Arc::new(Panicking), 1.0);
        let error = portfolio.value(0.0, &simulation, Some(1)).unwrap_err();
        assert!(error.root_cause().to_string().contains("product exploded"));
    }

    #[test]
    #[should_panic(expected = "differ in length")]
    fn test_mismatched_weights_panic() {
        let _ = Portfolio::with_products(vec![Arc::new(Failing) as Arc<dyn Product>], vec![]);
    }
}
