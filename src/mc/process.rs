// src/mc/process.rs
//! Euler scheme process engine with a lazily filled, thread-safe cache.
//!
//! # Scheme
//!
//! For a [`ProcessModel`] with state `X` the engine evolves
//! ```text
//! X̃_{i+1,c} = X_{i,c} + μ_c(t_i, X_i) Δt_i + Σ_f λ_{c,f}(t_i, X_i) ΔW_{i,f}
//! ```
//! With [`Scheme::Euler`] the state at `i+1` is the predictor `X̃`. With
//! [`Scheme::PredictorCorrector`] the drift is averaged with the drift
//! re-evaluated on the predicted row:
//! ```text
//! X_{i+1,c} = X̃_{i+1,c} + ½ (μ_c(t_i, X_i; X̃_{i+1}) - μ_c(t_i, X_i)) Δt_i
//! ```
//! Process values handed out are `S_{i,c} = g_c(X_{i,c})`.
//!
//! # Cache
//!
//! Every (time index, component) cell of state, predictor, drift and value is
//! an arena slot allocated once for the whole grid. A cell is computed at most
//! once even when many threads ask for it at the same time; afterwards reads
//! are lock free. A failed computation leaves its cell empty and the error is
//! returned to the caller, nothing invalid is cached.
//!
//! A cell is computed while its guard is held, so the computation runs its
//! random variable kernels sequentially (see [`with_sequential_kernels`]).
//! A thread holding a guard never enters a rayon join, where it could pick
//! up a queued valuation task asking for the very same cell.
//!
//! With [`Scheme::Euler`] the model's `drift` and `factor_loading` are invoked
//! exactly once per cell (and factor). The predictor-corrector scheme adds one
//! corrector `drift` call per cell.

use super::brownian::{BrownianMotion, IndependentIncrements};
use super::simulation::SimulationModel;
use crate::error::{validation::validate_paths, McError, McResult};
use crate::models::model::ProcessModel;
use crate::stochastic::{with_sequential_kernels, RandomVariable};
use crate::time_discretization::TimeDiscretization;
use ndarray::Array2;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheme {
    Euler,
    PredictorCorrector,
}

#[derive(Clone, Debug)]
pub struct SimulationConfig {
    pub number_of_paths: usize,
    pub seed: u64,
    pub scheme: Scheme,
    /// Reject non-finite drifts, factor loadings and states with a
    /// calculation failure instead of caching them.
    pub check_finite: bool,
}

impl SimulationConfig {
    /// Validate the simulation configuration
    pub fn validate(&self) -> McResult<()> {
        validate_paths(self.number_of_paths)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            number_of_paths: 10_000,
            seed: 3141,
            scheme: Scheme::Euler,
            check_finite: true,
        }
    }
}

/// Write-once slot: lock-free reads, serialized first computation.
struct ComputeOnce<V> {
    value: OnceLock<V>,
    init: Mutex<()>,
}

impl<V: Clone> ComputeOnce<V> {
    fn new() -> Self {
        ComputeOnce {
            value: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    fn get(&self) -> Option<V> {
        self.value.get().cloned()
    }

    fn get_or_try_init(&self, compute: impl FnOnce() -> McResult<V>) -> McResult<V> {
        if let Some(value) = self.value.get() {
            return Ok(value.clone());
        }
        // the guard protects no data, a poisoned lock is still usable
        let _guard = self.init.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(value) = self.value.get() {
            return Ok(value.clone());
        }
        let value = with_sequential_kernels(compute)?;
        Ok(self.value.get_or_init(|| value).clone())
    }
}

fn cells<V: Clone>(rows: usize, columns: usize) -> Array2<ComputeOnce<V>> {
    Array2::from_shape_fn((rows, columns), |_| ComputeOnce::new())
}

fn all_finite(value: &RandomVariable) -> bool {
    match value.as_slice() {
        Some(values) => values.iter().all(|v| v.is_finite()),
        None => value.value().map_or(true, f64::is_finite),
    }
}

pub struct EulerSchemeProcess {
    model: Arc<dyn ProcessModel>,
    increments: Arc<dyn IndependentIncrements>,
    scheme: Scheme,
    check_finite: bool,
    initial: ComputeOnce<Arc<Vec<RandomVariable>>>,
    state: Array2<ComputeOnce<RandomVariable>>,
    values: Array2<ComputeOnce<RandomVariable>>,
    drift: Array2<ComputeOnce<Option<RandomVariable>>>,
    predictor: Array2<ComputeOnce<RandomVariable>>,
    numeraire: Vec<ComputeOnce<RandomVariable>>,
}

impl EulerSchemeProcess {
    pub fn new(
        model: Arc<dyn ProcessModel>,
        increments: Arc<dyn IndependentIncrements>,
        scheme: Scheme,
        check_finite: bool,
    ) -> McResult<Self> {
        if model.number_of_components() == 0 {
            return Err(McError::InvalidConfiguration {
                field: "number_of_components".to_string(),
                reason: "model must have at least one component".to_string(),
            });
        }
        if model.number_of_factors() > increments.number_of_factors() {
            return Err(McError::InvalidConfiguration {
                field: "number_of_factors".to_string(),
                reason: format!(
                    "model uses {} factors but the increments provide {}",
                    model.number_of_factors(),
                    increments.number_of_factors()
                ),
            });
        }

        let points = increments.time_discretization().number_of_time_points();
        let components = model.number_of_components();
        Ok(EulerSchemeProcess {
            model,
            increments,
            scheme,
            check_finite,
            initial: ComputeOnce::new(),
            state: cells(points, components),
            values: cells(points, components),
            drift: cells(points - 1, components),
            predictor: cells(points - 1, components),
            numeraire: (0..points).map(|_| ComputeOnce::new()).collect(),
        })
    }

    /// Engine driven by a fresh [`BrownianMotion`] on `time_discretization`.
    pub fn from_config(
        model: Arc<dyn ProcessModel>,
        time_discretization: TimeDiscretization,
        config: &SimulationConfig,
    ) -> McResult<Self> {
        config.validate()?;
        let increments = BrownianMotion::new(
            time_discretization,
            model.number_of_factors(),
            config.number_of_paths,
            config.seed,
        )?;
        Self::new(model, Arc::new(increments), config.scheme, config.check_finite)
    }

    /// Same model and scheme on an independent path ensemble.
    ///
    /// The clone starts with an empty cache.
    pub fn with_seed(&self, seed: u64) -> McResult<Self> {
        Self::new(
            Arc::clone(&self.model),
            self.increments.with_seed(seed),
            self.scheme,
            self.check_finite,
        )
    }

    pub fn model(&self) -> &Arc<dyn ProcessModel> {
        &self.model
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn seed(&self) -> u64 {
        self.increments.seed()
    }

    fn check_cell(&self, time_index: usize, component: usize) {
        let points = self.increments.time_discretization().number_of_time_points();
        assert!(
            time_index < points,
            "time index {} outside of the time discretization ({} points)",
            time_index,
            points
        );
        assert!(
            component < self.model.number_of_components(),
            "component {} outside of the model ({} components)",
            component,
            self.model.number_of_components()
        );
    }

    fn ensure_finite(&self, what: &str, time_index: usize, component: usize, value: &RandomVariable) -> McResult<()> {
        if self.check_finite && !all_finite(value) {
            return Err(McError::calculation(format!(
                "model produced a non-finite {} at time index {} component {}",
                what, time_index, component
            )));
        }
        Ok(())
    }

    fn initial_state(&self) -> McResult<Arc<Vec<RandomVariable>>> {
        self.initial.get_or_try_init(|| {
            let initial = self.model.initial_state();
            if initial.len() != self.model.number_of_components() {
                return Err(McError::calculation(format!(
                    "model returned {} initial values for {} components",
                    initial.len(),
                    self.model.number_of_components()
                )));
            }
            for (component, value) in initial.iter().enumerate() {
                self.ensure_finite("initial value", 0, component, value)?;
            }
            Ok(Arc::new(initial))
        })
    }

    /// State of one cell in the model's state space.
    pub fn state(&self, time_index: usize, component: usize) -> McResult<RandomVariable> {
        self.check_cell(time_index, component);
        if let Some(value) = self.state[[time_index, component]].get() {
            return Ok(value);
        }
        // complete earlier rows bottom-up so a step only reads filled cells
        for earlier in 0..time_index {
            for other in 0..self.model.number_of_components() {
                self.state_cell(earlier, other)?;
            }
        }
        self.state_cell(time_index, component)
    }

    fn state_cell(&self, time_index: usize, component: usize) -> McResult<RandomVariable> {
        self.state[[time_index, component]].get_or_try_init(|| {
            if time_index == 0 {
                return Ok(self.initial_state()?[component].clone());
            }
            let step = time_index - 1;
            let next = match self.scheme {
                Scheme::Euler => self.predicted(step, component)?,
                Scheme::PredictorCorrector => self.corrected(step, component)?,
            };
            self.ensure_finite("state", time_index, component, &next)?;
            Ok(next)
        })
    }

    fn state_row(&self, time_index: usize) -> McResult<Vec<RandomVariable>> {
        (0..self.model.number_of_components())
            .map(|component| self.state_cell(time_index, component))
            .collect()
    }

    fn drift_cell(&self, step: usize, component: usize, row: &[RandomVariable]) -> McResult<Option<RandomVariable>> {
        self.drift[[step, component]].get_or_try_init(|| {
            let time = self.increments.time_discretization().time(step);
            let drift = self
                .model
                .drift(step, time, component, row, None)
                .map_err(|e| {
                    McError::wrap(
                        format!("drift failed at time index {} component {}", step, component),
                        e,
                    )
                })?;
            if let Some(drift) = &drift {
                self.ensure_finite("drift", step, component, drift)?;
            }
            Ok(drift)
        })
    }

    /// Euler predictor for the state at `step + 1`.
    fn predicted(&self, step: usize, component: usize) -> McResult<RandomVariable> {
        self.predictor[[step, component]].get_or_try_init(|| {
            let discretization = self.increments.time_discretization();
            let time = discretization.time(step);
            let dt = discretization.time_step(step);
            let row = self.state_row(step)?;
            debug!(step, component, "euler step");

            let mut next = row[component].clone();
            if let Some(drift) = self.drift_cell(step, component, &row)? {
                next = next.add(&drift.mult_scalar(dt));
            }
            for factor in 0..self.model.number_of_factors() {
                let loading = self
                    .model
                    .factor_loading(step, time, factor, component, &row)
                    .map_err(|e| {
                        McError::wrap(
                            format!(
                                "factor loading failed at time index {} factor {} component {}",
                                step, factor, component
                            ),
                            e,
                        )
                    })?;
                self.ensure_finite("factor loading", step, component, &loading)?;
                next = next.add_product(&loading, &self.increments.increment(step, factor));
            }
            Ok(next)
        })
    }

    fn corrected(&self, step: usize, component: usize) -> McResult<RandomVariable> {
        let row = self.state_row(step)?;
        let predicted_row: Vec<RandomVariable> = (0..self.model.number_of_components())
            .map(|other| self.predicted(step, other))
            .collect::<McResult<_>>()?;
        let predicted = predicted_row[component].clone();

        let drift = self.drift_cell(step, component, &row)?;
        let time = self.increments.time_discretization().time(step);
        let corrector = self
            .model
            .drift(step, time, component, &row, Some(&predicted_row))
            .map_err(|e| {
                McError::wrap(
                    format!("corrector drift failed at time index {} component {}", step, component),
                    e,
                )
            })?;

        match (drift, corrector) {
            (Some(drift), Some(corrector)) => {
                self.ensure_finite("drift", step, component, &corrector)?;
                let dt = self.increments.time_discretization().time_step(step);
                Ok(predicted.add(&corrector.sub(&drift).mult_scalar(0.5 * dt)))
            }
            (None, None) => Ok(predicted),
            _ => Err(McError::calculation(format!(
                "drift and corrector drift disagree on being zero at time index {} component {}",
                step, component
            ))),
        }
    }

    /// Process value `g_c(X_{i,c})` of one cell.
    pub fn process_value(&self, time_index: usize, component: usize) -> McResult<RandomVariable> {
        self.check_cell(time_index, component);
        if let Some(value) = self.values[[time_index, component]].get() {
            return Ok(value);
        }
        let state = self.state(time_index, component)?;
        self.values[[time_index, component]]
            .get_or_try_init(|| Ok(self.model.apply_state_space_transform(component, &state)))
    }

    /// Numeraire at a grid time index.
    pub fn numeraire_at(&self, time_index: usize) -> McResult<RandomVariable> {
        self.check_cell(time_index, 0);
        if let Some(value) = self.numeraire[time_index].get() {
            return Ok(value);
        }
        // fill the state row outside of the numeraire guard
        let row = (0..self.model.number_of_components())
            .map(|component| self.state(time_index, component))
            .collect::<McResult<Vec<_>>>()?;
        self.numeraire[time_index].get_or_try_init(|| {
            let time = self.increments.time_discretization().time(time_index);
            let numeraire = self
                .model
                .numeraire(time_index, time, &row)
                .map_err(|e| McError::wrap(format!("numeraire failed at time {}", time), e))?;
            self.ensure_finite("numeraire", time_index, 0, &numeraire)?;
            Ok(numeraire)
        })
    }
}

impl SimulationModel for EulerSchemeProcess {
    fn time_discretization(&self) -> &TimeDiscretization {
        self.increments.time_discretization()
    }

    fn number_of_paths(&self) -> usize {
        self.increments.number_of_paths()
    }

    fn number_of_components(&self) -> usize {
        self.model.number_of_components()
    }

    fn process_value(&self, time_index: usize, component: usize) -> McResult<RandomVariable> {
        EulerSchemeProcess::process_value(self, time_index, component)
    }

    /// Numeraire at `time`; off-grid times use the last grid time before it.
    fn numeraire(&self, time: f64) -> McResult<RandomVariable> {
        self.numeraire_at(self.time_index_for(time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::black_scholes::BlackScholesModel;
    use approx::assert_abs_diff_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Arithmetic Brownian motion counting every model call.
    struct CountingModel {
        drift_calls: AtomicUsize,
        loading_calls: AtomicUsize,
        drift: f64,
    }

    impl CountingModel {
        fn new(drift: f64) -> Self {
            CountingModel {
                drift_calls: AtomicUsize::new(0),
                loading_calls: AtomicUsize::new(0),
                drift,
            }
        }
    }

    impl ProcessModel for CountingModel {
        fn number_of_components(&self) -> usize {
            2
        }

        fn number_of_factors(&self) -> usize {
            1
        }

        fn initial_state(&self) -> Vec<RandomVariable> {
            vec![RandomVariable::deterministic(0.0, 1.0); 2]
        }

        fn drift(
            &self,
            _time_index: usize,
            time: f64,
            _component: usize,
            _state: &[RandomVariable],
            _predictor: Option<&[RandomVariable]>,
        ) -> McResult<Option<RandomVariable>> {
            self.drift_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(RandomVariable::deterministic(time, self.drift)))
        }

        fn factor_loading(
            &self,
            _time_index: usize,
            time: f64,
            _factor: usize,
            _component: usize,
            _state: &[RandomVariable],
        ) -> McResult<RandomVariable> {
            self.loading_calls.fetch_add(1, Ordering::SeqCst);
            Ok(RandomVariable::deterministic(time, 0.1))
        }

        fn numeraire(
            &self,
            _time_index: usize,
            time: f64,
            _state: &[RandomVariable],
        ) -> McResult<RandomVariable> {
            Ok(RandomVariable::deterministic(time, 1.0))
        }
    }

    fn engine(model: Arc<dyn ProcessModel>, scheme: Scheme) -> EulerSchemeProcess {
        let grid = TimeDiscretization::uniform(0.0, 5, 0.2).unwrap();
        let bm = BrownianMotion::new(grid, 1, 1_000, 17).unwrap();
        EulerSchemeProcess::new(model, Arc::new(bm), scheme, true).unwrap()
    }

    #[test]
    fn test_cells_are_memoized() {
        let model = Arc::new(CountingModel::new(0.5));
        let process = engine(model.clone(), Scheme::Euler);

        let first = process.process_value(3, 1).unwrap();
        // rows 0..2 complete (2 components) plus the requested cell
        assert_eq!(model.drift_calls.load(Ordering::SeqCst), 2 * 2 + 1);
        assert_eq!(model.loading_calls.load(Ordering::SeqCst), 2 * 2 + 1);

        let second = process.process_value(3, 1).unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(model.drift_calls.load(Ordering::SeqCst), 5);

        process.process_value(3, 0).unwrap();
        assert_eq!(model.drift_calls.load(Ordering::SeqCst), 6);
        assert_eq!(model.loading_calls.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_arithmetic_brownian_motion_moments() {
        let process = engine(Arc::new(CountingModel::new(0.5)), Scheme::Euler);
        let terminal = process.process_value(5, 0).unwrap();
        assert_eq!(terminal.filtration_time(), 1.0);
        assert_abs_diff_eq!(terminal.average(), 1.5, epsilon = 0.02);
        assert_abs_diff_eq!(terminal.variance(), 0.01, epsilon = 0.002);
    }

    #[test]
    fn test_predictor_corrector_with_constant_drift_matches_euler() {
        let euler = engine(Arc::new(CountingModel::new(0.3)), Scheme::Euler);
        let pc = engine(Arc::new(CountingModel::new(0.3)), Scheme::PredictorCorrector);
        let a = euler.process_value(5, 1).unwrap();
        let b = pc.process_value(5, 1).unwrap();
        for path in [0, 10, 999] {
            assert_abs_diff_eq!(a.get(path), b.get(path), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_non_finite_drift_is_calculation_failure() {
        let process = engine(Arc::new(CountingModel::new(f64::NAN)), Scheme::Euler);
        assert!(process.process_value(0, 0).is_ok());
        let error = process.process_value(2, 0).unwrap_err();
        assert!(matches!(error, McError::CalculationFailure { .. }));
        assert!(format!("{}", error).contains("drift"));
        // nothing invalid was cached
        assert!(process.process_value(2, 0).is_err());
    }

    #[test]
    fn test_black_scholes_log_euler_martingale() {
        let model = BlackScholesModel::new(100.0, 0.05, 0.2).unwrap();
        let grid = TimeDiscretization::uniform(0.0, 10, 0.1).unwrap();
        let config = SimulationConfig {
            number_of_paths: 50_000,
            seed: 4,
            ..Default::default()
        };
        let process = EulerSchemeProcess::from_config(Arc::new(model), grid, &config).unwrap();

        let spot = process.process_value(10, 0).unwrap();
        let discounted = spot.div(&SimulationModel::numeraire(&process, 1.0).unwrap());
        assert_abs_diff_eq!(discounted.average(), 100.0, epsilon = 0.5);
    }

    #[test]
    fn test_with_seed_is_independent() {
        let process = engine(Arc::new(CountingModel::new(0.0)), Scheme::Euler);
        let other = process.with_seed(99).unwrap();
        assert_eq!(other.seed(), 99);
        assert_eq!(other.scheme(), Scheme::Euler);
        let a = process.process_value(5, 0).unwrap();
        let b = other.process_value(5, 0).unwrap();
        assert_ne!(a, b);
        assert_abs_diff_eq!(a.average(), b.average(), epsilon = 0.02);
    }

    #[test]
    #[should_panic(expected = "outside of the time discretization")]
    fn test_out_of_grid_cell_panics() {
        let process = engine(Arc::new(CountingModel::new(0.0)), Scheme::Euler);
        let _ = process.process_value(6, 0);
    }

    #[test]
    fn test_asset_value_within_horizon() {
        let process = engine(Arc::new(CountingModel::new(0.0)), Scheme::Euler);
        let off_grid = process.asset_value(0.5, 0).unwrap();
        assert!(off_grid.ptr_eq(&process.process_value(2, 0).unwrap()));
        let at_end = process.asset_value(1.0 + 1e-13, 1).unwrap();
        assert!(at_end.ptr_eq(&process.process_value(5, 1).unwrap()));
    }

    #[test]
    #[should_panic(expected = "after the end of the simulation grid")]
    fn test_time_past_horizon_panics() {
        let process = engine(Arc::new(CountingModel::new(0.0)), Scheme::Euler);
        let _ = process.asset_value(1.5, 0);
    }

    #[test]
    fn test_config_validation() {
        let config = SimulationConfig {
            number_of_paths: 0,
            ..Default::default()
        };
        let grid = TimeDiscretization::uniform(0.0, 1, 1.0).unwrap();
        let model = BlackScholesModel::new(100.0, 0.0, 0.2).unwrap();
        assert!(EulerSchemeProcess::from_config(Arc::new(model), grid, &config).is_err());
    }
}
