// src/products/european.rs
use super::product::{OptionType, Product};
use crate::error::validation::{validate_non_negative, validate_positive};
use crate::error::McResult;
use crate::mc::SimulationModel;
use crate::stochastic::RandomVariable;
use crate::time_discretization::TIME_TOLERANCE;

/// European option paying `max(±(S_T - K), 0)` at maturity
#[derive(Clone, Debug)]
pub struct EuropeanOption {
    pub maturity: f64,
    pub strike: f64,
    pub underlying: usize,
    pub option_type: OptionType,
}

impl EuropeanOption {
    pub fn new(maturity: f64, strike: f64, underlying: usize, option_type: OptionType) -> McResult<Self> {
        validate_non_negative("maturity", maturity)?;
        validate_positive("strike", strike)?;
        Ok(EuropeanOption {
            maturity,
            strike,
            underlying,
            option_type,
        })
    }

    pub fn call(maturity: f64, strike: f64) -> McResult<Self> {
        Self::new(maturity, strike, 0, OptionType::Call)
    }

    pub fn put(maturity: f64, strike: f64) -> McResult<Self> {
        Self::new(maturity, strike, 0, OptionType::Put)
    }
}

impl Product for EuropeanOption {
    fn value(&self, evaluation_time: f64, model: &dyn SimulationModel) -> McResult<RandomVariable> {
        // Expired
        if evaluation_time > self.maturity + TIME_TOLERANCE {
            return Ok(RandomVariable::deterministic(evaluation_time, 0.0));
        }

        let underlying = model.asset_value(self.maturity, self.underlying)?;
        let payoff = self.option_type.intrinsic(&underlying, self.strike);

        let numeraire_at_maturity = model.numeraire(self.maturity)?;
        let numeraire_at_evaluation = model.numeraire(evaluation_time)?;
        Ok(payoff
            .div(&numeraire_at_maturity)
            .mult(&numeraire_at_evaluation))
    }
}
