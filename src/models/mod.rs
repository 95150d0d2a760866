// src/models/mod.rs
pub mod black_scholes;
pub mod heston;
pub mod model;

pub use black_scholes::BlackScholesModel;
pub use heston::{HestonModel, HestonParams};
pub use model::ProcessModel;
