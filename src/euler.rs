//! Euler discretization nodes
//!
//! One node per time step. With `S` the predecessor's value, `dt` the step
//! size, `z` the node's shock and `t` its time index:
//!
//! - Euler:     S_t = S + μ(S, t) dt + σ(S, t) √dt z
//! - Log-Euler: S_t = S exp(μ(S, t) dt + σ(S, t) √dt z)
//! - Stoch-vol: Euler form, μ and σ also receive the companion value v
//!
//! A non-positive `dt` is not an error: the diffusion term vanishes and the
//! drift term is applied as given.

use crate::error::{SdeError, SdeResult};
use crate::fparam::FParam;
use crate::param::{NodeId, NodeKind, ParamGraph};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Discretization scheme of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    /// Arithmetic Euler-Maruyama
    #[default]
    Euler,
    /// Euler applied to log S; positive whenever S_0 > 0
    LogEuler,
    /// Euler with drift and vol reading a companion chain
    StochVol,
}

impl Scheme {
    /// One step of the scheme given already-evaluated drift and vol.
    ///
    /// # Example
    /// ```
    /// use lazy_sde::Scheme;
    ///
    /// // Zero shock: pure drift
    /// assert_eq!(Scheme::Euler.step(100.0, 1.0, 0.0, 0.5, 20.0), 100.5);
    /// ```
    pub fn step(self, prev: f64, dt: f64, shock: f64, drift: f64, vol: f64) -> f64 {
        let diffusion = vol * dt.max(0.0).sqrt() * shock;
        match self {
            Scheme::Euler | Scheme::StochVol => prev + drift * dt + diffusion,
            Scheme::LogEuler => prev * (drift * dt + diffusion).exp(),
        }
    }

    pub fn uses_companion(self) -> bool {
        matches!(self, Scheme::StochVol)
    }
}

/// A single discretization step, stored inside a [`ParamGraph`].
#[derive(Debug, Clone)]
pub struct EulerStep {
    scheme: Scheme,
    drift: Arc<FParam>,
    vol: Arc<FParam>,
    prev: NodeId,
    dt: NodeId,
    t: usize,
    shock: f64,
    companion: Option<NodeId>,
}

impl EulerStep {
    /// Describes step `t` (1-based) following `prev`. The shock starts at 0.
    pub fn new(
        scheme: Scheme,
        drift: Arc<FParam>,
        vol: Arc<FParam>,
        prev: NodeId,
        dt: NodeId,
        t: usize,
    ) -> Self {
        Self {
            scheme,
            drift,
            vol,
            prev,
            dt,
            t,
            shock: 0.0,
            companion: None,
        }
    }

    /// Companion node whose value is passed to drift and vol.
    pub fn with_companion(mut self, companion: NodeId) -> Self {
        self.companion = Some(companion);
        self
    }

    pub fn with_shock(mut self, shock: f64) -> Self {
        self.shock = shock;
        self
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn time_index(&self) -> usize {
        self.t
    }

    pub fn prev(&self) -> NodeId {
        self.prev
    }

    pub fn companion(&self) -> Option<NodeId> {
        self.companion
    }

    pub(crate) fn shock(&self) -> f64 {
        self.shock
    }

    pub(crate) fn set_shock(&mut self, shock: f64) {
        self.shock = shock;
    }

    /// Every node whose value the step reads.
    pub(crate) fn inputs(&self) -> impl Iterator<Item = NodeId> + '_ {
        [self.prev, self.dt]
            .into_iter()
            .chain(self.companion)
            .chain(self.drift.nodes())
            .chain(self.vol.nodes())
    }

    /// Applies the scheme to the inputs' cached values.
    pub(crate) fn compute(&self, graph: &ParamGraph) -> f64 {
        let prev = graph.cached(self.prev);
        let dt = graph.cached(self.dt);
        let aux = if self.scheme.uses_companion() {
            self.companion.map(|c| graph.cached(c))
        } else {
            None
        };

        let drift = self.drift.evaluate_cached(graph, prev, self.t, aux);
        let vol = self.vol.evaluate_cached(graph, prev, self.t, aux);
        self.scheme.step(prev, dt, self.shock, drift, vol)
    }

    fn validate(&self, graph: &ParamGraph) -> SdeResult<()> {
        if self.t == 0 {
            return Err(SdeError::invalid_parameter(
                "t",
                0.0,
                "time index of a step is 1-based",
            ));
        }
        graph.check(self.prev)?;
        graph.check(self.dt)?;
        self.drift.check_nodes(graph)?;
        self.vol.check_nodes(graph)?;

        match (self.scheme.uses_companion(), self.companion) {
            (true, None) => return Err(SdeError::MissingCompanion { t: self.t }),
            (true, Some(companion)) => {
                graph.check(companion)?;
            }
            (false, _) => {
                for f in [&self.drift, &self.vol] {
                    if f.requires_aux() {
                        return Err(SdeError::AuxiliaryRequired {
                            function: f.name().to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

impl ParamGraph {
    /// Adds a discretization step and registers it as a dependent of its
    /// predecessor, step size, companion and every parameter bound to its
    /// drift and vol.
    ///
    /// All inputs are validated before the node is created, so a failed call
    /// leaves the graph unchanged.
    pub fn add_step(&mut self, step: EulerStep) -> SdeResult<NodeId> {
        step.validate(self)?;

        let prev = step.prev;
        let dt = step.dt;
        let companion = step.companion;
        let drift = Arc::clone(&step.drift);
        let vol = Arc::clone(&step.vol);

        let id = self.push_node(f64::NAN, NodeKind::Step(step));
        drift.add_dependents(self, id)?;
        vol.add_dependents(self, id)?;
        self.add_dependent(prev, id)?;
        self.add_dependent(dt, id)?;
        if let Some(companion) = companion {
            self.add_dependent(companion, id)?;
        }
        Ok(id)
    }
}
