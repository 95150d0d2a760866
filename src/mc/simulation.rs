// src/mc/simulation.rs
use crate::error::McResult;
use crate::stochastic::RandomVariable;
use crate::time_discretization::{TimeDiscretization, TIME_TOLERANCE};

/// Simulated model as seen by products: process values and numeraire on a
/// time grid, shared read-only between valuation threads.
pub trait SimulationModel: Send + Sync {
    fn time_discretization(&self) -> &TimeDiscretization;

    fn number_of_paths(&self) -> usize;

    fn number_of_components(&self) -> usize;

    /// Process value of `component` at a grid time index.
    fn process_value(&self, time_index: usize, component: usize) -> McResult<RandomVariable>;

    /// Numeraire at `time`.
    fn numeraire(&self, time: f64) -> McResult<RandomVariable>;

    /// Grid index used for `time`: the last grid time `<= time`.
    ///
    /// # Panics
    ///
    /// Panics if `time` lies before the start or after the end of the grid.
    fn time_index_for(&self, time: f64) -> usize {
        let grid = self.time_discretization();
        assert!(
            time <= grid.last_time() + TIME_TOLERANCE,
            "time {} lies after the end of the simulation grid at {}",
            time,
            grid.last_time()
        );
        grid.time_index_nearest_less_or_equal(time).unwrap_or_else(|| {
            panic!(
                "time {} precedes the simulation grid starting at {}",
                time,
                grid.time(0)
            )
        })
    }

    /// Process value of `component` at `time` (last grid time `<= time`).
    fn asset_value(&self, time: f64, component: usize) -> McResult<RandomVariable> {
        self.process_value(self.time_index_for(time), component)
    }
}
