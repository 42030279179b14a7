//! Correlated two-factor simulation
//!
//! Couples an asset chain to an already-built auxiliary chain (typically a
//! CIR variance process):
//!
//! ```text
//! v_0 -> v_1 -> v_2 -> ... -> v_T        auxiliary, shocks Z_aux
//!    \      \      \
//! S_0 -> S_1 -> S_2 -> ... -> S_T        asset, shocks Z_corr
//! ```
//!
//! Step `i + 1` of the asset chain reads `v_i`, the auxiliary value at the
//! start of its interval, and is registered as a dependent of it. Asset
//! shocks are `Z_corr = rho * Z_aux + sqrt(1 - rho²) * Z_indep`.

use crate::config::{validate_paths, CorrelationConfig, SimulationConfig};
use crate::error::{SdeError, SdeResult};
use crate::euler::Scheme;
use crate::fparam::FParam;
use crate::param::{NodeId, ParamGraph};
use crate::shocks::{correlate, ShockSource};
use crate::simulation::{EulerSimulation, PathChain};
use ndarray::{Array2, ArrayView1, Axis};
use tracing::debug;

/// Euler simulation of an asset driven by a correlated auxiliary process.
#[derive(Debug, Clone)]
pub struct StochVolSimulation {
    graph: ParamGraph,
    aux: PathChain,
    asset: PathChain,
    rho: f64,
    correlated: Array2<f64>,
}

impl StochVolSimulation {
    /// Builds the asset chain on the auxiliary driver's graph.
    ///
    /// `initial`, `dt` and the nodes bound to `drift` and `vol` must live in
    /// `aux.graph()`; add them through [`EulerSimulation::graph_mut`] first.
    /// `config.horizon` and `config.n_paths` must match the auxiliary driver.
    /// The asset chain always uses [`Scheme::StochVol`].
    #[allow(clippy::too_many_arguments)]
    pub fn new<R: ShockSource + ?Sized>(
        aux: EulerSimulation,
        drift: FParam,
        vol: FParam,
        initial: NodeId,
        dt: NodeId,
        config: &SimulationConfig,
        correlation: CorrelationConfig,
        rng: &mut R,
    ) -> SdeResult<Self> {
        config.validate()?;
        correlation.validate()?;
        if (config.horizon, config.n_paths) != (aux.horizon(), aux.n_paths()) {
            return Err(SdeError::ShapeMismatch {
                what: "auxiliary simulation",
                expected: (aux.horizon(), aux.n_paths()),
                actual: (config.horizon, config.n_paths),
            });
        }

        let (mut graph, aux) = aux.into_parts();
        let companions = &aux.nodes[..config.horizon];
        let mut asset = PathChain::build(
            &mut graph,
            Scheme::StochVol,
            drift,
            vol,
            initial,
            dt,
            config.horizon,
            Some(companions),
        )?;

        asset.reset(rng.standard_normals(config.horizon, config.n_paths))?;
        let correlated = correlate(correlation.rho, &aux.shocks, &asset.shocks)?;
        asset.refresh_initial(&mut graph)?;

        debug!(
            horizon = config.horizon,
            n_paths = config.n_paths,
            rho = correlation.rho,
            nodes = graph.len(),
            "built stochastic-volatility chain"
        );

        Ok(Self {
            graph,
            aux,
            asset,
            rho: correlation.rho,
            correlated,
        })
    }

    /// Evaluates every path of both chains.
    ///
    /// For each step the auxiliary node takes its raw shock and the asset
    /// node its correlated shock; both values are recorded.
    pub fn run_all(&mut self) -> SdeResult<()> {
        let before = self.graph.recomputed();
        self.aux.refresh_initial(&mut self.graph)?;
        self.asset.refresh_initial(&mut self.graph)?;

        let horizon = self.asset.horizon();
        for p in 0..self.asset.n_paths() {
            for j in 0..horizon {
                let aux_shock = self.aux.shocks[[j, p]];
                self.aux.advance(&mut self.graph, aux_shock, j, p)?;
                let asset_shock = self.correlated[[j, p]];
                self.asset.advance(&mut self.graph, asset_shock, j, p)?;
            }
        }

        debug!(
            n_paths = self.asset.n_paths(),
            recomputed = self.graph.recomputed() - before,
            "ran all correlated paths"
        );
        Ok(())
    }

    /// Redraws both shock matrices for `n_paths` paths, replaces both results
    /// matrices and reruns.
    pub fn run_new<R: ShockSource + ?Sized>(
        &mut self,
        n_paths: usize,
        rng: &mut R,
    ) -> SdeResult<()> {
        validate_paths(n_paths)?;
        let horizon = self.asset.horizon();
        debug!(horizon, n_paths, "regenerating correlated shocks");

        self.aux.reset(rng.standard_normals(horizon, n_paths))?;
        self.asset.reset(rng.standard_normals(horizon, n_paths))?;
        self.correlated = correlate(self.rho, &self.aux.shocks, &self.asset.shocks)?;
        self.run_all()
    }

    /// Changes the correlation, keeping the drawn shocks. Takes effect on the
    /// next run.
    pub fn set_rho(&mut self, rho: f64) -> SdeResult<()> {
        self.correlated = correlate(rho, &self.aux.shocks, &self.asset.shocks)?;
        self.rho = rho;
        Ok(())
    }

    /// Sets a constant of either chain. Nothing is recomputed until the next
    /// evaluation.
    pub fn set_param(&mut self, id: NodeId, value: f64) -> SdeResult<()> {
        self.graph.set_value(id, value)
    }

    pub fn graph(&self) -> &ParamGraph {
        &self.graph
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    pub fn horizon(&self) -> usize {
        self.asset.horizon()
    }

    pub fn n_paths(&self) -> usize {
        self.asset.n_paths()
    }

    /// Asset chain nodes, index 0 is `S_0`.
    pub fn nodes(&self) -> &[NodeId] {
        &self.asset.nodes
    }

    /// Auxiliary chain nodes, index 0 is `v_0`.
    pub fn aux_nodes(&self) -> &[NodeId] {
        &self.aux.nodes
    }

    /// `(horizon + 1, n_paths)` asset values.
    pub fn results(&self) -> &Array2<f64> {
        &self.asset.results
    }

    /// `(horizon + 1, n_paths)` auxiliary values.
    pub fn aux_results(&self) -> &Array2<f64> {
        &self.aux.results
    }

    /// Raw auxiliary shocks `Z_aux`.
    pub fn aux_shocks(&self) -> &Array2<f64> {
        &self.aux.shocks
    }

    /// Independent draws `Z_indep` mixed into the asset shocks.
    pub fn independent_shocks(&self) -> &Array2<f64> {
        &self.asset.shocks
    }

    /// Asset shocks `Z_corr`.
    pub fn correlated_shocks(&self) -> &Array2<f64> {
        &self.correlated
    }

    pub fn terminal_values(&self) -> ArrayView1<'_, f64> {
        self.asset.results.index_axis(Axis(0), self.asset.horizon())
    }

    pub fn aux_terminal_values(&self) -> ArrayView1<'_, f64> {
        self.aux.results.index_axis(Axis(0), self.aux.horizon())
    }
}
