//! Example usage of the lazy SDE library
//!
//! Run with: cargo run --release
//! Set RUST_LOG=lazy_sde=debug to see chain construction and rerun logs.

use lazy_sde::models::{
    Constant, HestonAssetDrift, HestonAssetVol, LogNormalDrift, MeanReverting, SquareRootVol,
};
use lazy_sde::monte_carlo::{black_scholes_call, call_payoff, discounted_estimate};
use lazy_sde::shocks::sample_correlation;
use lazy_sde::{
    CorrelationConfig, EulerSimulation, FParam, NodeId, ParamGraph, Scheme, SdeResult,
    SimulationConfig, StochVolSimulation,
};
use tracing_subscriber::EnvFilter;

fn main() -> SdeResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Lazy SDE Simulation ===\n");

    example_gbm_rerun()?;
    example_heston()?;
    Ok(())
}

fn example_gbm_rerun() -> SdeResult<()> {
    println!("--- Log-Euler GBM with parameter bumps ---");

    let (s0, k, r, t) = (100.0, 100.0, 0.05, 1.0);
    let n_steps = 252;

    let mut graph = ParamGraph::new();
    let s0_node = graph.constant(s0);
    let dt = graph.constant(t / n_steps as f64);
    let mu = graph.constant(r);
    let sigma = graph.constant(0.2);

    let drift = FParam::new(LogNormalDrift, [("mu", mu), ("sigma", sigma)])?;
    let vol = FParam::new(Constant::new("sigma"), [("sigma", sigma)])?;

    let config = SimulationConfig::new(n_steps, 20_000)
        .with_scheme(Scheme::LogEuler)
        .with_seed(42);
    let mut rng = config.rng();
    let mut sim = EulerSimulation::new(graph, drift, vol, s0_node, dt, &config, &mut rng)?;

    for vol_level in [0.2, 0.25, 0.3] {
        sim.set_param(sigma, vol_level)?;
        let before = sim.graph().recomputed();
        sim.run_all()?;

        let mc = discounted_estimate(sim.terminal_values(), call_payoff(k), r, t);
        let bs = black_scholes_call(s0, k, r, vol_level, t);
        println!(
            "  σ = {:.2}: MC ${:.4} ± {:.4}, BS ${:.4}, nodes recomputed: {}",
            vol_level,
            mc.estimate,
            mc.std_error,
            bs,
            sim.graph().recomputed() - before
        );
    }
    println!();
    Ok(())
}

fn heston_variance(
    graph: &mut ParamGraph,
    v0: f64,
    kappa: f64,
    theta: f64,
    xi: f64,
) -> SdeResult<(NodeId, FParam, FParam)> {
    let v0 = graph.constant(v0);
    let kappa = graph.constant(kappa);
    let theta = graph.constant(theta);
    let xi = graph.constant(xi);

    let drift = FParam::new(MeanReverting, [("kappa", kappa), ("theta", theta)])?;
    let vol = FParam::new(SquareRootVol, [("xi", xi)])?;
    Ok((v0, drift, vol))
}

fn example_heston() -> SdeResult<()> {
    println!("--- Heston via correlated Euler chains ---");
    println!("  S0 = $100, V0 = 0.04, κ = 2.0, θ = 0.04, ξ = 0.3, ρ = -0.7");

    let n_steps = 252;
    let config = SimulationConfig::new(n_steps, 5_000).with_seed(7);
    let mut rng = config.rng();

    let mut graph = ParamGraph::new();
    let dt = graph.constant(1.0 / n_steps as f64);
    let (v0, v_drift, v_vol) = heston_variance(&mut graph, 0.04, 2.0, 0.04, 0.3)?;
    let mut variance = EulerSimulation::new(graph, v_drift, v_vol, v0, dt, &config, &mut rng)?;

    let s0 = variance.graph_mut().constant(100.0);
    let mu = variance.graph_mut().constant(0.05);
    let drift = FParam::new(HestonAssetDrift, [("mu", mu)])?;
    let vol = FParam::new(HestonAssetVol, std::iter::empty::<(&str, NodeId)>())?;

    let mut sim = StochVolSimulation::new(
        variance,
        drift,
        vol,
        s0,
        dt,
        &config,
        CorrelationConfig::new(-0.7),
        &mut rng,
    )?;
    sim.run_all()?;

    let n = sim.n_paths() as f64;
    let mean_price = sim.terminal_values().sum() / n;
    let mean_var = sim.aux_terminal_values().sum() / n;
    let shock_corr = sample_correlation(sim.aux_shocks(), sim.correlated_shocks());

    println!("  Mean S_T: ${:.2}", mean_price);
    println!("  Mean V_T: {:.4} (θ = 0.04)", mean_var);
    println!("  Shock correlation: {:.3}", shock_corr);

    sim.set_param(mu, 0.0)?;
    sim.run_new(10_000, &mut rng)?;
    println!(
        "  After μ → 0 on {} fresh paths, mean S_T: ${:.2}",
        sim.n_paths(),
        sim.terminal_values().sum() / sim.n_paths() as f64
    );
    println!();
    Ok(())
}
