// src/mc/mod.rs
pub mod brownian;
pub mod process;
pub mod simulation;

pub use brownian::{BrownianMotion, IndependentIncrements};
pub use process::{EulerSchemeProcess, Scheme, SimulationConfig};
pub use simulation::SimulationModel;
