// src/products/asian.rs
use super::product::Product;
use crate::error::validation::{validate_positive, validate_schedule};
use crate::error::McResult;
use crate::mc::SimulationModel;
use crate::stochastic::RandomVariable;
use crate::time_discretization::TIME_TOLERANCE;

/// Arithmetic average call: `max(A - K, 0)` paid at the last fixing,
/// where `A = (1/n) Σ S(t_i)` over the fixing times.
#[derive(Clone, Debug)]
pub struct AsianOption {
    pub fixing_times: Vec<f64>,
    pub strike: f64,
    pub underlying: usize,
}

impl AsianOption {
    pub fn new(fixing_times: Vec<f64>, strike: f64, underlying: usize) -> McResult<Self> {
        validate_positive("strike", strike)?;
        validate_schedule("fixing_times", &fixing_times)?;
        Ok(AsianOption {
            fixing_times,
            strike,
            underlying,
        })
    }

    /// Payment date (last fixing)
    pub fn maturity(&self) -> f64 {
        self.fixing_times[self.fixing_times.len() - 1]
    }
}

impl Product for AsianOption {
    fn value(&self, evaluation_time: f64, model: &dyn SimulationModel) -> McResult<RandomVariable> {
        let maturity = self.maturity();
        if evaluation_time > maturity + TIME_TOLERANCE {
            return Ok(RandomVariable::deterministic(evaluation_time, 0.0));
        }

        let mut sum = RandomVariable::deterministic(0.0, 0.0);
        for &fixing in &self.fixing_times {
            sum = sum.add(&model.asset_value(fixing, self.underlying)?);
        }
        let average = sum.div_scalar(self.fixing_times.len() as f64);
        let payoff = average.sub_scalar(self.strike).floor_scalar(0.0);

        let numeraire_at_maturity = model.numeraire(maturity)?;
        let numeraire_at_evaluation = model.numeraire(evaluation_time)?;
        Ok(payoff
            .div(&numeraire_at_maturity)
            .mult(&numeraire_at_evaluation))
    }
}
