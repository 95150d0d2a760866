// tests/integration_test.rs
use mc_valuation::analytics::bs_analytic;
use mc_valuation::mc::{EulerSchemeProcess, Scheme, SimulationConfig, SimulationModel};
use mc_valuation::models::heston::LOG_SPOT;
use mc_valuation::models::{BlackScholesModel, HestonModel, HestonParams};
use mc_valuation::products::{BermudanOption, EuropeanOption, OptionType, Product};
use mc_valuation::time_discretization::TimeDiscretization;
use std::sync::Arc;

fn black_scholes(paths: usize, seed: u64) -> EulerSchemeProcess {
    let model = Arc::new(BlackScholesModel::new(100.0, 0.05, 0.2).expect("Valid parameters"));
    let grid = TimeDiscretization::uniform(0.0, 50, 0.02).expect("Valid grid");
    let config = SimulationConfig {
        number_of_paths: paths,
        seed,
        ..Default::default()
    };
    EulerSchemeProcess::from_config(model, grid, &config).expect("Valid configuration")
}

#[test]
fn test_bs_mc_vs_analytic() {
    let simulation = black_scholes(50_000, 42);

    for strike in [80.0, 100.0, 120.0] {
        let call = EuropeanOption::call(1.0, strike).expect("Valid option");
        let value = call.value(0.0, &simulation).expect("Valuation succeeds");
        let analytic = bs_analytic::bs_call_price(100.0, strike, 0.05, 0.2, 1.0);

        println!(
            "K={}: MC {:.4} ± {:.4}, analytic {:.4}",
            strike,
            value.average(),
            value.standard_error(),
            analytic
        );
        assert!((value.average() - analytic).abs() < 4.0 * value.standard_error());
    }
}

#[test]
fn test_valuation_at_later_time_is_conditional() {
    let simulation = black_scholes(20_000, 43);
    let call = EuropeanOption::call(1.0, 100.0).expect("Valid option");

    // Value at 0.5 is pathwise, averaging it and discounting to 0 gives the price
    let at_half = call.value(0.5, &simulation).expect("Valuation succeeds");
    let at_zero = call.value(0.0, &simulation).expect("Valuation succeeds");
    let discounted = at_half.average() * (-0.05_f64 * 0.5).exp();
    assert!((discounted - at_zero.average()).abs() < 1e-10);
    assert_eq!(at_half.filtration_time(), 1.0);
}

#[test]
fn test_reseeded_simulation_is_independent() {
    let simulation = black_scholes(20_000, 44);
    let reseeded = simulation.with_seed(45).expect("Reseeding succeeds");
    assert_eq!(reseeded.seed(), 45);

    let s1 = simulation.process_value(50, 0).expect("Simulation succeeds");
    let s2 = reseeded.process_value(50, 0).expect("Simulation succeeds");
    assert_ne!(s1.get(0), s2.get(0));

    // Both ensembles price the same forward
    let forward = 100.0;
    let discount = (-0.05_f64).exp();
    for s in [&s1, &s2] {
        let discounted = s.average() * discount;
        assert!((discounted - forward).abs() < 4.0 * s.standard_error() * discount);
    }
}

#[test]
fn test_bermudan_put_dominates_european() {
    let simulation = black_scholes(30_000, 46);
    let dates: Vec<f64> = (1..=10).map(|i| i as f64 * 0.1).collect();
    let bermudan = BermudanOption::new(dates, 110.0, 0, OptionType::Put, 3).expect("Valid option");
    let european = EuropeanOption::put(1.0, 110.0).expect("Valid option");

    let bermudan_price = bermudan.value_estimate(0.0, &simulation).expect("Valuation succeeds");
    let european_value = european.value(0.0, &simulation).expect("Valuation succeeds");

    println!(
        "Bermudan {:.4}, European {:.4} ± {:.4}",
        bermudan_price,
        european_value.average(),
        european_value.standard_error()
    );
    assert!(bermudan_price > european_value.average());
}

#[test]
fn test_heston_put_call_parity() {
    let params = HestonParams {
        s0: 100.0,
        v0: 0.04,
        r: 0.03,
        kappa: 2.0,
        theta: 0.04,
        xi: 0.3,
        rho: -0.7,
    };
    let model = Arc::new(HestonModel::new(params).expect("Valid parameters"));
    let grid = TimeDiscretization::uniform(0.0, 100, 0.01).expect("Valid grid");

    for scheme in [Scheme::Euler, Scheme::PredictorCorrector] {
        let config = SimulationConfig {
            number_of_paths: 20_000,
            seed: 7,
            scheme,
            ..Default::default()
        };
        let simulation =
            EulerSchemeProcess::from_config(model.clone(), grid.clone(), &config).expect("Valid configuration");

        let call = EuropeanOption::new(1.0, 100.0, LOG_SPOT, OptionType::Call).expect("Valid option");
        let put = EuropeanOption::new(1.0, 100.0, LOG_SPOT, OptionType::Put).expect("Valid option");
        let forward = call
            .value(0.0, &simulation)
            .expect("Valuation succeeds")
            .sub(&put.value(0.0, &simulation).expect("Valuation succeeds"));

        let parity = 100.0 - 100.0 * (-0.03_f64).exp();
        println!("{:?}: C - P = {:.4}, parity {:.4}", scheme, forward.average(), parity);
        assert!((forward.average() - parity).abs() < 4.0 * forward.standard_error());
        assert_eq!(simulation.number_of_components(), 2);
    }
}
