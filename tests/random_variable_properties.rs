// tests/random_variable_properties.rs
use approx::assert_relative_eq;
use mc_valuation::stochastic::RandomVariable;
use proptest::prelude::*;

fn paths_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1.0e3..1.0e3f64, 1..64)
}

fn path_pair_strategy() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (1usize..64).prop_flat_map(|n| {
        (
            prop::collection::vec(-1.0e3..1.0e3f64, n),
            prop::collection::vec(-1.0e3..1.0e3f64, n),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn test_add_then_sub_is_identity((x, y) in path_pair_strategy()) {
        let x = RandomVariable::from_paths(0.0, x);
        let y = RandomVariable::from_paths(0.5, y);
        let result = x.add(&y).sub(&y);

        prop_assert_eq!(result.filtration_time(), 0.5);
        for path in 0..x.size() {
            assert_relative_eq!(result.get(path), x.get(path), epsilon = 1e-12, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_mult_self_is_squared(x in paths_strategy()) {
        let x = RandomVariable::from_paths(1.0, x);
        let product = x.mult(&x);
        let squared = x.squared();
        for path in 0..x.size() {
            assert_relative_eq!(product.get(path), squared.get(path), max_relative = 1e-12);
        }
    }

    #[test]
    fn test_sqrt_then_squared_is_identity(x in prop::collection::vec(0.0..1.0e6f64, 1..64)) {
        let x = RandomVariable::from_paths(1.0, x);
        let result = x.sqrt().squared();
        for path in 0..x.size() {
            assert_relative_eq!(result.get(path), x.get(path), epsilon = 1e-12, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_scalar_broadcast_matches_deterministic(x in paths_strategy(), c in -1.0e3..1.0e3f64) {
        let x = RandomVariable::from_paths(0.0, x);
        let constant = RandomVariable::deterministic(0.0, c);
        let broadcast = x.mult(&constant);
        let scalar = x.mult_scalar(c);
        for path in 0..x.size() {
            prop_assert_eq!(broadcast.get(path), scalar.get(path));
        }
    }

    #[test]
    fn test_variance_is_non_negative(x in paths_strategy()) {
        let x = RandomVariable::from_paths(0.0, x);
        prop_assert!(x.variance() >= 0.0);
        prop_assert!(x.min() <= x.average() + 1e-9);
        prop_assert!(x.average() <= x.max() + 1e-9);
    }

    #[test]
    fn test_constant_paths_have_zero_variance(c in -1.0e6..1.0e6f64, n in 1usize..200) {
        let x = RandomVariable::from_paths(0.0, vec![c; n]);
        prop_assert_eq!(x.variance(), 0.0);
        assert_relative_eq!(x.average(), c, epsilon = 1e-12, max_relative = 1e-14);
    }
}
