//! Parameter-bound drift and volatility functions
//!
//! A [`FParam`] pairs a [`ModelFn`] strategy with named graph nodes. The
//! strategy never captures parameter values itself: it reads them through
//! [`ParamValues`] at call time, so a change to any bound node has to
//! invalidate every step that used the wrapper. [`FParam::add_dependents`]
//! registers those edges.

use crate::error::{SdeError, SdeResult};
use crate::param::{NodeId, ParamGraph};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Read-only view of the parameter values bound to a function.
#[derive(Clone, Copy)]
pub struct ParamValues<'a> {
    bindings: &'a [(String, NodeId)],
    graph: &'a ParamGraph,
}

impl<'a> ParamValues<'a> {
    /// Value bound under `name`, if any.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.bindings
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, id)| self.graph.cached(*id))
    }

    /// Value bound under `name`, or NaN when nothing is bound.
    ///
    /// Functions listing `name` in [`ModelFn::required_params`] always see a
    /// bound value.
    pub fn value(&self, name: &str) -> f64 {
        self.get(name).unwrap_or(f64::NAN)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// A drift or volatility function `f(state, t, aux, params)`.
///
/// `t` is the 1-based time index of the step being computed and `aux` is the
/// companion chain's value for stochastic-volatility steps (`None` for every
/// other scheme).
pub trait ModelFn: Send + Sync {
    fn call(&self, state: f64, t: usize, aux: Option<f64>, params: &ParamValues<'_>) -> f64;

    /// Parameter names the function reads; checked when the wrapper is built.
    fn required_params(&self) -> Vec<&str> {
        Vec::new()
    }

    /// True if the function needs the companion value.
    fn requires_aux(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "fn"
    }
}

struct FnModel<F> {
    name: String,
    requires_aux: bool,
    f: F,
}

impl<F> ModelFn for FnModel<F>
where
    F: Fn(f64, usize, Option<f64>, &ParamValues<'_>) -> f64 + Send + Sync,
{
    fn call(&self, state: f64, t: usize, aux: Option<f64>, params: &ParamValues<'_>) -> f64 {
        (self.f)(state, t, aux, params)
    }

    fn requires_aux(&self) -> bool {
        self.requires_aux
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Function wrapper binding a [`ModelFn`] to named parameter nodes.
#[derive(Clone)]
pub struct FParam {
    f: Arc<dyn ModelFn>,
    bindings: Vec<(String, NodeId)>,
}

impl fmt::Debug for FParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FParam")
            .field("fn", &self.f.name())
            .field("bindings", &self.bindings)
            .finish()
    }
}

impl FParam {
    /// Wraps `f` with the given `(name, node)` bindings.
    ///
    /// Later bindings under the same name replace earlier ones. Fails with
    /// [`SdeError::MissingParameter`] if `f` requires a name that is not bound.
    ///
    /// # Example
    /// ```
    /// use lazy_sde::{FParam, ParamGraph};
    /// use lazy_sde::models::MeanReverting;
    ///
    /// let mut graph = ParamGraph::new();
    /// let kappa = graph.constant(2.0);
    /// let theta = graph.constant(0.04);
    ///
    /// let drift = FParam::new(MeanReverting, [("kappa", kappa), ("theta", theta)]).unwrap();
    /// assert_eq!(drift.evaluate(&mut graph, 0.04, 1, None).unwrap(), 0.0);
    /// ```
    pub fn new<M, I, S>(f: M, bindings: I) -> SdeResult<Self>
    where
        M: ModelFn + 'static,
        I: IntoIterator<Item = (S, NodeId)>,
        S: Into<String>,
    {
        Self::from_arc(Arc::new(f), bindings)
    }

    /// Wraps a function that reads no parameters.
    pub fn unbound<M: ModelFn + 'static>(f: M) -> SdeResult<Self> {
        Self::new(f, std::iter::empty::<(String, NodeId)>())
    }

    /// Wraps a closure. `requires_aux` marks closures that only make sense
    /// on a stochastic-volatility chain.
    pub fn from_fn<F, I, S>(
        name: impl Into<String>,
        requires_aux: bool,
        f: F,
        bindings: I,
    ) -> SdeResult<Self>
    where
        F: Fn(f64, usize, Option<f64>, &ParamValues<'_>) -> f64 + Send + Sync + 'static,
        I: IntoIterator<Item = (S, NodeId)>,
        S: Into<String>,
    {
        let model = FnModel {
            name: name.into(),
            requires_aux,
            f,
        };
        Self::from_arc(Arc::new(model), bindings)
    }

    fn from_arc<I, S>(f: Arc<dyn ModelFn>, bindings: I) -> SdeResult<Self>
    where
        I: IntoIterator<Item = (S, NodeId)>,
        S: Into<String>,
    {
        let map: BTreeMap<String, NodeId> = bindings
            .into_iter()
            .map(|(name, id)| (name.into(), id))
            .collect();

        for required in f.required_params() {
            if !map.contains_key(required) {
                return Err(SdeError::missing_parameter(f.name(), required));
            }
        }

        Ok(Self {
            f,
            bindings: map.into_iter().collect(),
        })
    }

    pub fn name(&self) -> &str {
        self.f.name()
    }

    pub fn requires_aux(&self) -> bool {
        self.f.requires_aux()
    }

    /// Bound `(name, node)` pairs, ordered by name.
    pub fn params(&self) -> impl Iterator<Item = (&str, NodeId)> + '_ {
        self.bindings.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Node bound under `name`.
    pub fn param(&self, name: &str) -> Option<NodeId> {
        self.params().find(|(bound, _)| *bound == name).map(|(_, id)| id)
    }

    /// Registers `dependent` on every bound node.
    pub fn add_dependents(&self, graph: &mut ParamGraph, dependent: NodeId) -> SdeResult<()> {
        for (_, id) in &self.bindings {
            graph.add_dependent(*id, dependent)?;
        }
        Ok(())
    }

    /// Evaluates every bound node, then calls the function.
    ///
    /// The wrapper caches nothing; caching lives in the steps that use it.
    pub fn evaluate(
        &self,
        graph: &mut ParamGraph,
        state: f64,
        t: usize,
        aux: Option<f64>,
    ) -> SdeResult<f64> {
        for (_, id) in &self.bindings {
            graph.eval(*id)?;
        }
        Ok(self.evaluate_cached(graph, state, t, aux))
    }

    /// Calls the function on the bound nodes' cached values.
    pub(crate) fn evaluate_cached(
        &self,
        graph: &ParamGraph,
        state: f64,
        t: usize,
        aux: Option<f64>,
    ) -> f64 {
        let params = ParamValues {
            bindings: &self.bindings,
            graph,
        };
        self.f.call(state, t, aux, &params)
    }

    pub(crate) fn check_nodes(&self, graph: &ParamGraph) -> SdeResult<()> {
        for (_, id) in &self.bindings {
            graph.check(*id)?;
        }
        Ok(())
    }

    pub(crate) fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.bindings.iter().map(|(_, id)| *id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Constant, MeanReverting};

    #[test]
    fn test_missing_binding_is_a_configuration_error() {
        let mut graph = ParamGraph::new();
        let kappa = graph.constant(1.0);

        let err = FParam::new(MeanReverting, [("kappa", kappa)]).unwrap_err();
        assert_eq!(err, SdeError::missing_parameter("MeanReverting", "theta"));
    }

    #[test]
    fn test_add_dependents_registers_on_every_binding() {
        let mut graph = ParamGraph::new();
        let kappa = graph.constant(1.0);
        let theta = graph.constant(0.5);
        let target = graph.constant(0.0);

        let drift = FParam::new(MeanReverting, [("kappa", kappa), ("theta", theta)]).unwrap();
        drift.add_dependents(&mut graph, target).unwrap();

        assert_eq!(graph.dependents(kappa).unwrap(), &[target]);
        assert_eq!(graph.dependents(theta).unwrap(), &[target]);
    }

    #[test]
    fn test_evaluate_reads_current_values() {
        let mut graph = ParamGraph::new();
        let r = graph.constant(0.03);
        let drift = FParam::new(Constant::new("r"), [("r", r)]).unwrap();

        assert_eq!(drift.evaluate(&mut graph, 100.0, 1, None).unwrap(), 0.03);
        graph.set_value(r, 0.05).unwrap();
        assert_eq!(drift.evaluate(&mut graph, 100.0, 1, None).unwrap(), 0.05);
        assert!(!graph.is_dirty(r).unwrap());
    }

    #[test]
    fn test_closure_sees_state_time_and_aux() {
        let mut graph = ParamGraph::new();
        let scale = graph.constant(2.0);
        let f = FParam::from_fn(
            "scaled",
            true,
            |s, t, aux, p: &ParamValues<'_>| p.value("scale") * s * t as f64 + aux.unwrap_or(0.0),
            [("scale", scale)],
        )
        .unwrap();

        assert!(f.requires_aux());
        assert_eq!(f.name(), "scaled");
        assert_eq!(f.evaluate(&mut graph, 3.0, 2, Some(1.0)).unwrap(), 13.0);
    }

    #[test]
    fn test_unbound_name_reads_as_nan() {
        let mut graph = ParamGraph::new();
        let f = FParam::from_fn(
            "reads_missing",
            false,
            |_, _, _, p: &ParamValues<'_>| p.value("missing"),
            std::iter::empty::<(&str, NodeId)>(),
        )
        .unwrap();

        assert!(f.evaluate(&mut graph, 1.0, 1, None).unwrap().is_nan());
    }

    #[test]
    fn test_later_binding_wins() {
        let mut graph = ParamGraph::new();
        let first = graph.constant(1.0);
        let second = graph.constant(2.0);
        let f = FParam::new(Constant::new("c"), [("c", first), ("c", second)]).unwrap();

        assert_eq!(f.param("c"), Some(second));
        assert_eq!(f.params().count(), 1);
    }
}
