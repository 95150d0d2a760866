// src/analytics/mod.rs
pub mod bs_analytic;

pub use bs_analytic::{bs_call_price, bs_put_price};
