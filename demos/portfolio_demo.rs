// demos/portfolio_demo.rs
use mc_valuation::analytics::bs_analytic;
use mc_valuation::math_utils::Timer;
use mc_valuation::mc::{EulerSchemeProcess, Scheme, SimulationConfig};
use mc_valuation::models::BlackScholesModel;
use mc_valuation::portfolio::{Portfolio, PortfolioConfig};
use mc_valuation::products::{AsianOption, BermudanOption, EuropeanOption, OptionType, Product};
use mc_valuation::time_discretization::TimeDiscretization;
use mc_valuation::McResult;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> McResult<()> {
    init_tracing();

    let (s0, r, sigma) = (100.0, 0.05, 0.2);
    let model = Arc::new(BlackScholesModel::new(s0, r, sigma)?);
    let grid = TimeDiscretization::uniform(0.0, 52, 1.0 / 52.0)?;
    let config = SimulationConfig {
        number_of_paths: 50_000,
        seed: 42,
        scheme: Scheme::Euler,
        check_finite: true,
    };

    let mut timer = Timer::new();
    let simulation = EulerSchemeProcess::from_config(model, grid, &config)?;

    let call = EuropeanOption::call(1.0, 100.0)?;
    let put = EuropeanOption::put(1.0, 100.0)?;
    let monthly: Vec<f64> = (1..=12).map(|m| m as f64 / 12.0).collect();
    let asian = AsianOption::new(monthly.clone(), 100.0, 0)?;
    let bermudan = BermudanOption::new(monthly, 100.0, 0, OptionType::Put, 3)?;

    println!("\n--- Single products (S0={}, r={}, σ={}) ---", s0, r, sigma);
    for (name, product, analytic) in [
        ("European call", &call as &dyn Product, Some(bs_analytic::bs_call_price(s0, 100.0, r, sigma, 1.0))),
        ("European put", &put as &dyn Product, Some(bs_analytic::bs_put_price(s0, 100.0, r, sigma, 1.0))),
        ("Asian call", &asian as &dyn Product, None),
        ("Bermudan put", &bermudan as &dyn Product, None),
    ] {
        let value = product.value(0.0, &simulation)?;
        match analytic {
            Some(reference) => println!(
                "{:<14} {:>8.4} ± {:.4}   (analytic {:.4})",
                name,
                value.average(),
                value.standard_error(),
                reference
            ),
            None => println!("{:<14} {:>8.4} ± {:.4}", name, value.average(), value.standard_error()),
        }
    }
    println!("Simulation and single valuations: {:.2} ms", timer.elapsed_ms());

    let mut portfolio = Portfolio::new();
    portfolio
        .add(Arc::new(call), 10.0)
        .add(Arc::new(put), -5.0)
        .add(Arc::new(asian), 2.0)
        .add(Arc::new(bermudan), 3.0);

    println!("\n--- Portfolio ---");
    let mut reference = None;
    for threads in [1, 2, 4] {
        timer.restart();
        let value = portfolio.value_with_config(0.0, &simulation, &PortfolioConfig::with_threads(threads))?;
        let reproducible = match &reference {
            None => {
                reference = Some(value.clone());
                true
            }
            Some(first) => value == *first,
        };
        println!(
            "{} thread(s): {:>10.4} ± {:.4} in {:.2} ms (identical to 1 thread: {})",
            threads,
            value.average(),
            value.standard_error(),
            timer.elapsed_ms(),
            reproducible
        );
    }

    Ok(())
}
