// src/products/mod.rs
pub mod asian;
pub mod bermudan;
pub mod european;
pub mod product;

pub use asian::AsianOption;
pub use bermudan::BermudanOption;
pub use european::EuropeanOption;
pub use product::{OptionType, Product};
