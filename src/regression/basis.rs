// src/regression/basis.rs
use crate::stochastic::RandomVariable;

/// Ordered regressors of a conditional expectation estimate.
///
/// An entry may be `None` when a basis function does not apply (for example
/// at a particular exercise date); absent entries are dropped when the
/// regression is built.
#[derive(Clone, Debug, Default)]
pub struct BasisFunctions {
    functions: Vec<Option<RandomVariable>>,
}

impl BasisFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(functions: Vec<Option<RandomVariable>>) -> Self {
        BasisFunctions { functions }
    }

    /// Monomials `1, x, x², ..., x^degree`, all observed when `x` is.
    pub fn polynomial(x: &RandomVariable, degree: usize) -> Self {
        let mut functions = Vec::with_capacity(degree + 1);
        let mut power = RandomVariable::deterministic(x.filtration_time(), 1.0);
        functions.push(Some(power.clone()));
        for _ in 0..degree {
            power = power.mult(x);
            functions.push(Some(power.clone()));
        }
        BasisFunctions { functions }
    }

    pub fn push(&mut self, function: Option<RandomVariable>) {
        self.functions.push(function);
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RandomVariable> {
        self.functions.get(index).and_then(Option::as_ref)
    }

    /// Number of entries that are present.
    pub fn surviving(&self) -> usize {
        self.functions.iter().filter(|f| f.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&RandomVariable>> {
        self.functions.iter().map(Option::as_ref)
    }
}
