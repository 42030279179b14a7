//! End-to-end behaviour of the correlated two-factor driver.

use approx::assert_abs_diff_eq;
use lazy_sde::models::{HestonAssetDrift, HestonAssetVol, MeanReverting, SquareRootVol};
use lazy_sde::shocks::sample_correlation;
use lazy_sde::{
    CorrelationConfig, EulerSimulation, FParam, NodeId, ParamGraph, Scheme, SdeError,
    SimulationConfig, StochVolSimulation,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

struct Heston {
    variance: EulerSimulation,
    xi: NodeId,
    mu: NodeId,
    s0: NodeId,
    dt: NodeId,
    drift: FParam,
    vol: FParam,
}

fn heston_parts(horizon: usize, n_paths: usize, rng: &mut StdRng) -> Heston {
    let mut graph = ParamGraph::new();
    let dt = graph.constant(1.0 / horizon as f64);
    let v0 = graph.constant(0.04);
    let kappa = graph.constant(2.0);
    let theta = graph.constant(0.04);
    let xi = graph.constant(0.3);

    let v_drift = FParam::new(MeanReverting, [("kappa", kappa), ("theta", theta)]).unwrap();
    let v_vol = FParam::new(SquareRootVol, [("xi", xi)]).unwrap();
    let config = SimulationConfig::new(horizon, n_paths);
    let mut variance = EulerSimulation::new(graph, v_drift, v_vol, v0, dt, &config, rng).unwrap();

    let s0 = variance.graph_mut().constant(100.0);
    let mu = variance.graph_mut().constant(0.05);
    let drift = FParam::new(HestonAssetDrift, [("mu", mu)]).unwrap();
    let vol = FParam::new(HestonAssetVol, std::iter::empty::<(&str, NodeId)>()).unwrap();

    Heston {
        variance,
        xi,
        mu,
        s0,
        dt,
        drift,
        vol,
    }
}

fn heston(horizon: usize, n_paths: usize, rho: f64, seed: u64) -> (StochVolSimulation, Heston) {
    let mut rng = StdRng::seed_from_u64(seed);
    let parts = heston_parts(horizon, n_paths, &mut rng);
    let sim = StochVolSimulation::new(
        parts.variance.clone(),
        parts.drift.clone(),
        parts.vol.clone(),
        parts.s0,
        parts.dt,
        &SimulationConfig::new(horizon, n_paths),
        CorrelationConfig::new(rho),
        &mut rng,
    )
    .unwrap();
    (sim, parts)
}

#[test]
fn test_correlated_shocks_mix_aux_and_independent() {
    let rho = -0.7;
    let (sim, _) = heston(6, 9, rho, 1);
    let complement = (1.0f64 - rho * rho).sqrt();

    for ((&c, &a), &i) in sim
        .correlated_shocks()
        .iter()
        .zip(sim.aux_shocks().iter())
        .zip(sim.independent_shocks().iter())
    {
        assert_abs_diff_eq!(c, rho * a + complement * i, epsilon = 1e-12);
    }
}

#[test]
fn test_sample_correlation_matches_rho() {
    let (sim, _) = heston(10, 5_000, 0.6, 2);
    let corr = sample_correlation(sim.aux_shocks(), sim.correlated_shocks());
    assert!((corr - 0.6).abs() < 0.03, "sample correlation {corr}");
}

#[test]
fn test_extreme_correlations() {
    let (mut sim, _) = heston(4, 5, 1.0, 3);
    assert_eq!(sim.correlated_shocks(), sim.aux_shocks());

    sim.set_rho(0.0).unwrap();
    assert_eq!(sim.correlated_shocks(), sim.independent_shocks());
    assert_eq!(sim.rho(), 0.0);

    assert!(matches!(
        sim.set_rho(f64::NAN),
        Err(SdeError::InvalidParameter { .. })
    ));
    assert_eq!(sim.rho(), 0.0);
}

#[test]
fn test_asset_step_reads_variance_at_interval_start() {
    let horizon = 8;
    let (mut sim, _) = heston(horizon, 4, -0.5, 4);
    sim.run_all().unwrap();

    let dt = 1.0 / horizon as f64;
    let s = sim.results();
    let v = sim.aux_results();
    let z = sim.correlated_shocks();
    for p in 0..4 {
        for j in 0..horizon {
            let prev = s[[j, p]];
            let expected =
                prev + 0.05 * prev * dt + v[[j, p]].max(0.0).sqrt() * prev * dt.sqrt() * z[[j, p]];
            assert_abs_diff_eq!(s[[j + 1, p]], expected, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_aux_chain_matches_standalone_run() {
    let (mut sim, parts) = heston(12, 6, 0.3, 5);
    sim.run_all().unwrap();

    let mut standalone = parts.variance;
    standalone.run_all().unwrap();

    assert_eq!(sim.aux_shocks(), standalone.shocks());
    assert_eq!(sim.aux_results(), standalone.results());
    assert!(sim.aux_results().row(0).iter().all(|&v| v == 0.04));
    assert!(sim.results().row(0).iter().all(|&s| s == 100.0));
}

#[test]
fn test_aux_parameter_change_reaches_asset() {
    let (mut sim, parts) = heston(10, 3, -0.7, 6);
    sim.run_all().unwrap();
    let asset_before = sim.results().clone();
    let aux_before = sim.aux_results().clone();

    sim.set_param(parts.xi, 0.6).unwrap();
    // S_1 reads v_0, which xi does not touch
    assert!(!sim.graph().is_dirty(sim.nodes()[1]).unwrap());
    for node in &sim.nodes()[2..] {
        assert!(sim.graph().is_dirty(*node).unwrap());
    }
    sim.run_all().unwrap();

    assert_ne!(sim.aux_results(), &aux_before);
    assert_ne!(sim.results(), &asset_before);
}

#[test]
fn test_asset_parameter_change_leaves_aux_alone() {
    let (mut sim, parts) = heston(10, 3, -0.7, 7);
    sim.run_all().unwrap();
    let aux_before = sim.aux_results().clone();

    sim.set_param(parts.mu, 0.0).unwrap();
    for node in sim.aux_nodes() {
        assert!(!sim.graph().is_dirty(*node).unwrap());
    }
    sim.run_all().unwrap();

    assert_eq!(sim.aux_results(), &aux_before);
}

#[test]
fn test_run_new_redraws_both_chains() {
    let (mut sim, _) = heston(5, 4, 0.2, 8);
    sim.run_all().unwrap();
    let old_aux = sim.aux_shocks().clone();

    let mut rng = StdRng::seed_from_u64(80);
    sim.run_new(20, &mut rng).unwrap();

    assert_eq!(sim.n_paths(), 20);
    assert_eq!(sim.aux_shocks().dim(), (5, 20));
    assert_eq!(sim.independent_shocks().dim(), (5, 20));
    assert_eq!(sim.correlated_shocks().dim(), (5, 20));
    assert_eq!(sim.results().dim(), (6, 20));
    assert_eq!(sim.aux_results().dim(), (6, 20));
    assert_ne!(sim.aux_shocks().column(0), old_aux.column(0));
    assert!(sim.terminal_values().iter().all(|s| s.is_finite()));
    assert_eq!(sim.aux_terminal_values().len(), 20);
}

#[test]
fn test_mismatched_aux_driver_is_rejected() {
    let mut rng = StdRng::seed_from_u64(9);
    let parts = heston_parts(5, 4, &mut rng);

    let err = StochVolSimulation::new(
        parts.variance,
        parts.drift,
        parts.vol,
        parts.s0,
        parts.dt,
        &SimulationConfig::new(5, 7),
        CorrelationConfig::new(0.0),
        &mut rng,
    )
    .unwrap_err();

    assert_eq!(
        err,
        SdeError::ShapeMismatch {
            what: "auxiliary simulation",
            expected: (5, 4),
            actual: (5, 7),
        }
    );
}

#[test]
fn test_invalid_rho_is_rejected_at_construction() {
    let mut rng = StdRng::seed_from_u64(10);
    let parts = heston_parts(3, 2, &mut rng);

    let err = StochVolSimulation::new(
        parts.variance,
        parts.drift,
        parts.vol,
        parts.s0,
        parts.dt,
        &SimulationConfig::new(3, 2),
        CorrelationConfig::new(1.5),
        &mut rng,
    )
    .unwrap_err();
    assert!(matches!(err, SdeError::InvalidParameter { .. }));
}

#[test]
fn test_single_factor_driver_refuses_stoch_vol_scheme() {
    let mut graph = ParamGraph::new();
    let s0 = graph.constant(100.0);
    let dt = graph.constant(1.0);
    let mu = graph.constant(0.0);
    let drift = FParam::new(HestonAssetDrift, [("mu", mu)]).unwrap();
    let vol = FParam::new(HestonAssetVol, std::iter::empty::<(&str, NodeId)>()).unwrap();
    let config = SimulationConfig::new(3, 2).with_scheme(Scheme::StochVol);
    let mut rng = StdRng::seed_from_u64(11);

    let err = EulerSimulation::new(graph, drift, vol, s0, dt, &config, &mut rng).unwrap_err();
    assert_eq!(err, SdeError::MissingCompanion { t: 1 });
}

#[test]
fn test_companion_function_rejected_on_plain_euler_chain() {
    let mut graph = ParamGraph::new();
    let s0 = graph.constant(100.0);
    let dt = graph.constant(1.0);
    let mu = graph.constant(0.0);
    let drift = FParam::new(HestonAssetDrift, [("mu", mu)]).unwrap();
    let vol = FParam::new(HestonAssetVol, std::iter::empty::<(&str, NodeId)>()).unwrap();
    let config = SimulationConfig::new(3, 2);
    let mut rng = StdRng::seed_from_u64(12);

    let err = EulerSimulation::new(graph, drift, vol, s0, dt, &config, &mut rng).unwrap_err();
    assert!(matches!(err, SdeError::AuxiliaryRequired { .. }));
}
