//! Monte Carlo driver for a single Euler chain
//!
//! The driver owns a [`ParamGraph`] holding the initial value, the step
//! size, the model parameters and a chain of `horizon` discretization steps:
//!
//! ```text
//! S_0 -> S_1 -> S_2 -> ... -> S_T
//! ```
//!
//! Each path writes its shocks into the chain and evaluates it front to back.
//! Because every step caches a single value, paths run one after another on
//! the owned chain; [`EulerSimulation::run_all_parallel`] gives each rayon
//! worker its own copy of the graph instead.

use crate::config::{validate_paths, SimulationConfig};
use crate::error::{SdeError, SdeResult};
use crate::euler::{EulerStep, Scheme};
use crate::fparam::FParam;
use crate::param::{NodeId, ParamGraph};
use crate::shocks::ShockSource;
use ndarray::{Array2, ArrayView1, Axis};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, warn};

/// Nodes, shocks and results of one chain. The graph lives elsewhere.
#[derive(Debug, Clone)]
pub(crate) struct PathChain {
    pub(crate) scheme: Scheme,
    pub(crate) initial: NodeId,
    pub(crate) dt: NodeId,
    /// `horizon + 1` nodes, index 0 is the initial value
    pub(crate) nodes: Vec<NodeId>,
    /// `(horizon, n_paths)`
    pub(crate) shocks: Array2<f64>,
    /// `(horizon + 1, n_paths)`
    pub(crate) results: Array2<f64>,
}

impl PathChain {
    /// Builds `horizon` steps on top of `initial`. For a stochastic-volatility
    /// chain, `companions[i]` feeds step `i + 1`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn build(
        graph: &mut ParamGraph,
        scheme: Scheme,
        drift: FParam,
        vol: FParam,
        initial: NodeId,
        dt: NodeId,
        horizon: usize,
        companions: Option<&[NodeId]>,
    ) -> SdeResult<Self> {
        graph.check(initial)?;
        graph.check(dt)?;

        let drift = Arc::new(drift);
        let vol = Arc::new(vol);

        let mut nodes = Vec::with_capacity(horizon + 1);
        nodes.push(initial);
        let mut last = initial;
        for t in 1..=horizon {
            let mut step =
                EulerStep::new(scheme, Arc::clone(&drift), Arc::clone(&vol), last, dt, t);
            if let Some(companion) = companions.and_then(|c| c.get(t - 1)) {
                step = step.with_companion(*companion);
            }
            last = graph.add_step(step)?;
            nodes.push(last);
        }

        let s0 = graph.eval(initial)?;
        let step = graph.eval(dt)?;
        if step <= 0.0 {
            warn!(dt = step, "non-positive step size, paths carry no diffusion");
        }
        if scheme == Scheme::LogEuler && s0 <= 0.0 {
            warn!(s0, "log-Euler chain rooted at a non-positive value");
        }

        Ok(Self {
            scheme,
            initial,
            dt,
            nodes,
            shocks: Array2::zeros((horizon, 0)),
            results: Array2::zeros((horizon + 1, 0)),
        })
    }

    pub(crate) fn horizon(&self) -> usize {
        self.nodes.len() - 1
    }

    pub(crate) fn n_paths(&self) -> usize {
        self.shocks.ncols()
    }

    /// Installs a new shock matrix and a matching, freshly allocated results
    /// matrix.
    pub(crate) fn reset(&mut self, shocks: Array2<f64>) -> SdeResult<()> {
        let horizon = self.horizon();
        if shocks.nrows() != horizon || shocks.ncols() == 0 {
            return Err(SdeError::ShapeMismatch {
                what: "shock matrix",
                expected: (horizon, shocks.ncols().max(1)),
                actual: shocks.dim(),
            });
        }
        self.results = Array2::zeros((horizon + 1, shocks.ncols()));
        self.shocks = shocks;
        Ok(())
    }

    /// Broadcasts the current initial value into row 0.
    pub(crate) fn refresh_initial(&mut self, graph: &mut ParamGraph) -> SdeResult<()> {
        let s0 = graph.eval(self.initial)?;
        self.results.row_mut(0).fill(s0);
        Ok(())
    }

    /// Sets the shock of step `j + 1` and stores its value for path `p`.
    pub(crate) fn advance(
        &mut self,
        graph: &mut ParamGraph,
        shock: f64,
        j: usize,
        p: usize,
    ) -> SdeResult<()> {
        let node = self.nodes[j + 1];
        graph.set_shock(node, shock)?;
        self.results[[j + 1, p]] = graph.eval(node)?;
        Ok(())
    }
}

/// Euler Monte Carlo simulation of a single-factor SDE.
///
/// # Example
/// ```
/// use lazy_sde::models::{Constant, Zero};
/// use lazy_sde::{EulerSimulation, FParam, ParamGraph, SimulationConfig};
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let mut graph = ParamGraph::new();
/// let s0 = graph.constant(100.0);
/// let dt = graph.constant(1.0);
/// let r = graph.constant(0.5);
///
/// let drift = FParam::new(Constant::new("r"), [("r", r)]).unwrap();
/// let vol = FParam::unbound(Zero).unwrap();
///
/// let mut rng = StdRng::seed_from_u64(1);
/// let config = SimulationConfig::new(4, 2);
/// let mut sim = EulerSimulation::new(graph, drift, vol, s0, dt, &config, &mut rng).unwrap();
/// sim.run_all().unwrap();
///
/// assert_eq!(sim.terminal_values().to_vec(), vec![102.0, 102.0]);
/// ```
#[derive(Debug, Clone)]
pub struct EulerSimulation {
    graph: ParamGraph,
    chain: PathChain,
}

impl EulerSimulation {
    /// Builds the chain and draws the initial `(horizon, n_paths)` shocks.
    ///
    /// `initial`, `dt` and every node bound to `drift` and `vol` must belong
    /// to `graph`. The stochastic-volatility scheme needs a companion chain
    /// and is only available through
    /// [`StochVolSimulation`](crate::StochVolSimulation).
    pub fn new<R: ShockSource + ?Sized>(
        mut graph: ParamGraph,
        drift: FParam,
        vol: FParam,
        initial: NodeId,
        dt: NodeId,
        config: &SimulationConfig,
        rng: &mut R,
    ) -> SdeResult<Self> {
        config.validate()?;
        if config.scheme.uses_companion() {
            return Err(SdeError::MissingCompanion { t: 1 });
        }

        let mut chain = PathChain::build(
            &mut graph,
            config.scheme,
            drift,
            vol,
            initial,
            dt,
            config.horizon,
            None,
        )?;
        chain.reset(rng.standard_normals(config.horizon, config.n_paths))?;
        chain.refresh_initial(&mut graph)?;

        debug!(
            horizon = config.horizon,
            n_paths = config.n_paths,
            scheme = ?config.scheme,
            nodes = graph.len(),
            "built Euler chain"
        );

        Ok(Self { graph, chain })
    }

    /// Evaluates every path against the current shock matrix.
    ///
    /// Row 0 is refreshed from the initial node, so a mutated initial value
    /// shows up in the results.
    pub fn run_all(&mut self) -> SdeResult<()> {
        let before = self.graph.recomputed();
        self.chain.refresh_initial(&mut self.graph)?;

        let horizon = self.chain.horizon();
        for p in 0..self.chain.n_paths() {
            for j in 0..horizon {
                let shock = self.chain.shocks[[j, p]];
                self.chain.advance(&mut self.graph, shock, j, p)?;
            }
        }

        debug!(
            n_paths = self.chain.n_paths(),
            recomputed = self.graph.recomputed() - before,
            "ran all paths"
        );
        Ok(())
    }

    /// Draws a fresh `(horizon, n_paths)` shock matrix, replaces the results
    /// matrix and reruns every path.
    pub fn run_new<R: ShockSource + ?Sized>(
        &mut self,
        n_paths: usize,
        rng: &mut R,
    ) -> SdeResult<()> {
        validate_paths(n_paths)?;
        let horizon = self.chain.horizon();
        debug!(horizon, n_paths, "regenerating shocks");
        self.chain.reset(rng.standard_normals(horizon, n_paths))?;
        self.run_all()
    }

    /// Replaces the shock matrix with `shocks` and reruns every path.
    ///
    /// `shocks` must have `horizon` rows; its column count becomes the new
    /// path count.
    pub fn run_with_shocks(&mut self, shocks: Array2<f64>) -> SdeResult<()> {
        self.chain.reset(shocks)?;
        self.run_all()
    }

    /// Same results as [`run_all`](Self::run_all), computed in parallel.
    ///
    /// Each rayon worker evaluates its paths on a private clone of the graph;
    /// the driver's own graph is left as it was.
    pub fn run_all_parallel(&mut self) -> SdeResult<()> {
        self.chain.refresh_initial(&mut self.graph)?;

        let graph = &self.graph;
        let chain = &self.chain;
        let horizon = chain.horizon();

        let columns: Vec<Vec<f64>> = (0..chain.n_paths())
            .into_par_iter()
            .map_init(
                || graph.clone(),
                |local, p| -> SdeResult<Vec<f64>> {
                    let mut column = Vec::with_capacity(horizon);
                    for j in 0..horizon {
                        let node = chain.nodes[j + 1];
                        local.set_shock(node, chain.shocks[[j, p]])?;
                        column.push(local.eval(node)?);
                    }
                    Ok(column)
                },
            )
            .collect::<SdeResult<_>>()?;

        for (p, column) in columns.into_iter().enumerate() {
            for (j, value) in column.into_iter().enumerate() {
                self.chain.results[[j + 1, p]] = value;
            }
        }

        debug!(n_paths = self.chain.n_paths(), "ran all paths in parallel");
        Ok(())
    }

    /// Sets a constant (a model parameter, `S_0` or `dt`).
    ///
    /// Nothing is recomputed until the next evaluation.
    pub fn set_param(&mut self, id: NodeId, value: f64) -> SdeResult<()> {
        self.graph.set_value(id, value)
    }

    /// Evaluates node `t` of the chain with its current shock.
    pub fn eval_node(&mut self, t: usize) -> SdeResult<f64> {
        let node = self.node(t).ok_or_else(|| {
            SdeError::invalid_parameter("t", t as f64, "beyond the chain horizon")
        })?;
        self.graph.eval(node)
    }

    pub fn graph(&self) -> &ParamGraph {
        &self.graph
    }

    /// Mutable graph access, e.g. to add constants for a companion chain.
    pub fn graph_mut(&mut self) -> &mut ParamGraph {
        &mut self.graph
    }

    pub fn scheme(&self) -> Scheme {
        self.chain.scheme
    }

    pub fn horizon(&self) -> usize {
        self.chain.horizon()
    }

    pub fn n_paths(&self) -> usize {
        self.chain.n_paths()
    }

    pub fn initial(&self) -> NodeId {
        self.chain.initial
    }

    pub fn dt(&self) -> NodeId {
        self.chain.dt
    }

    /// Chain node at time index `t` (0 is the initial value).
    pub fn node(&self, t: usize) -> Option<NodeId> {
        self.chain.nodes.get(t).copied()
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.chain.nodes
    }

    /// `(horizon, n_paths)` shocks.
    pub fn shocks(&self) -> &Array2<f64> {
        &self.chain.shocks
    }

    /// `(horizon + 1, n_paths)` simulated values.
    pub fn results(&self) -> &Array2<f64> {
        &self.chain.results
    }

    /// Simulated values of path `p`, from `S_0` to `S_T`.
    pub fn path(&self, p: usize) -> Option<ArrayView1<'_, f64>> {
        (p < self.n_paths()).then(|| self.chain.results.column(p))
    }

    /// `S_T` of every path.
    pub fn terminal_values(&self) -> ArrayView1<'_, f64> {
        self.chain.results.index_axis(Axis(0), self.chain.horizon())
    }

    pub(crate) fn into_parts(self) -> (ParamGraph, PathChain) {
        (self.graph, self.chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Constant, LogNormalDrift, Zero};
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn flat_sim(horizon: usize, n_paths: usize) -> (EulerSimulation, NodeId) {
        let mut graph = ParamGraph::new();
        let s0 = graph.constant(100.0);
        let dt = graph.constant(1.0);
        let r = graph.constant(0.0);
        let drift = FParam::new(Constant::new("r"), [("r", r)]).unwrap();
        let vol = FParam::unbound(Zero).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let config = SimulationConfig::new(horizon, n_paths);
        let sim = EulerSimulation::new(graph, drift, vol, s0, dt, &config, &mut rng).unwrap();
        (sim, r)
    }

    #[test]
    fn test_construction_shapes() {
        let (sim, _) = flat_sim(5, 7);
        assert_eq!(sim.nodes().len(), 6);
        assert_eq!(sim.shocks().dim(), (5, 7));
        assert_eq!(sim.results().dim(), (6, 7));
        assert!(sim.results().row(0).iter().all(|&v| v == 100.0));
    }

    #[test]
    fn test_flat_scenario() {
        let (mut sim, _) = flat_sim(2, 3);
        sim.run_all().unwrap();
        assert!(sim.results().iter().all(|&v| v == 100.0));
    }

    #[test]
    fn test_time_indices_match_positions() {
        let (sim, _) = flat_sim(4, 1);
        for (t, node) in sim.nodes().iter().enumerate().skip(1) {
            assert!(sim.graph().is_step(*node).unwrap());
            assert_eq!(sim.graph().dependents(sim.nodes()[t - 1]).unwrap().last(), Some(node));
        }
    }

    #[test]
    fn test_run_with_shocks_validates_shape() {
        let (mut sim, _) = flat_sim(3, 2);
        let err = sim.run_with_shocks(Array2::zeros((2, 2))).unwrap_err();
        assert!(matches!(err, SdeError::ShapeMismatch { .. }));
        assert!(sim.run_with_shocks(Array2::zeros((3, 0))).is_err());

        sim.run_with_shocks(Array2::zeros((3, 4))).unwrap();
        assert_eq!(sim.results().dim(), (4, 4));
    }

    #[test]
    fn test_parameter_change_is_lazy() {
        let (mut sim, r) = flat_sim(3, 1);
        sim.run_all().unwrap();
        let before = sim.graph().recomputed();

        sim.set_param(r, 1.0).unwrap();
        assert_eq!(sim.graph().recomputed(), before);
        assert!(sim.nodes()[1..]
            .iter()
            .all(|n| sim.graph().is_dirty(*n).unwrap()));

        assert_eq!(sim.eval_node(3).unwrap(), 103.0);
        assert_eq!(sim.graph().recomputed(), before + 3);
    }

    #[test]
    fn test_log_euler_single_path() {
        let mut graph = ParamGraph::new();
        let s0 = graph.constant(100.0);
        let dt = graph.constant(1.0);
        let mu = graph.constant(0.05);
        let sigma = graph.constant(0.2);
        let drift = FParam::new(LogNormalDrift, [("mu", mu), ("sigma", sigma)]).unwrap();
        let vol = FParam::new(Constant::new("sigma"), [("sigma", sigma)]).unwrap();
        let config = SimulationConfig::new(2, 1).with_scheme(Scheme::LogEuler);
        let mut rng = StdRng::seed_from_u64(0);
        let mut sim = EulerSimulation::new(graph, drift, vol, s0, dt, &config, &mut rng).unwrap();

        sim.run_with_shocks(array![[1.0], [-1.0]]).unwrap();
        let log_drift = 0.05 - 0.5 * 0.2 * 0.2;
        let s1 = 100.0 * (log_drift + 0.2f64).exp();
        let s2 = s1 * (log_drift - 0.2f64).exp();
        assert!((sim.results()[[1, 0]] - s1).abs() < 1e-10);
        assert!((sim.results()[[2, 0]] - s2).abs() < 1e-10);
    }

    #[test]
    fn test_stoch_vol_scheme_needs_companion() {
        let mut graph = ParamGraph::new();
        let s0 = graph.constant(1.0);
        let dt = graph.constant(1.0);
        let config = SimulationConfig::new(2, 1).with_scheme(Scheme::StochVol);
        let mut rng = StdRng::seed_from_u64(0);
        let err = EulerSimulation::new(
            graph,
            FParam::unbound(Zero).unwrap(),
            FParam::unbound(Zero).unwrap(),
            s0,
            dt,
            &config,
            &mut rng,
        )
        .unwrap_err();
        assert_eq!(err, SdeError::MissingCompanion { t: 1 });
    }

    #[test]
    fn test_path_accessor_bounds() {
        let (mut sim, _) = flat_sim(2, 2);
        sim.run_all().unwrap();
        assert_eq!(sim.path(1).unwrap().len(), 3);
        assert!(sim.path(2).is_none());
        assert!(sim.eval_node(3).is_err());
    }
}
