//! Lazy parameter graph
//!
//! Every scalar that takes part in a simulation lives in a [`ParamGraph`]
//! arena and is addressed by a [`NodeId`]. A node caches its last value and
//! carries a dirty flag:
//!
//! - mutating a node marks it dirty and pushes the dirty mark forward to
//!   every registered dependent
//! - evaluating a clean node returns the cached value untouched
//! - evaluating a dirty node recomputes exactly the dirty part of its inputs
//!
//! Dependents are plain handles into the arena, so a node never owns the
//! nodes that observe it.

use crate::error::{SdeError, SdeResult};
use crate::euler::EulerStep;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::trace;

static NEXT_GRAPH_ID: AtomicU32 = AtomicU32::new(0);

/// Handle to a node inside a [`ParamGraph`].
///
/// Handles remember which graph issued them; using a handle with any other
/// graph fails with [`SdeError::UnknownNode`]. A cloned graph accepts the
/// handles its source had issued at the time of the clone, and nothing the
/// source creates afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    graph: u32,
    index: u32,
}

impl NodeId {
    /// Position of the node in its arena (creation order).
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Constant,
    Step(EulerStep),
}

#[derive(Debug, Clone)]
struct Node {
    value: f64,
    dirty: bool,
    dependents: Vec<NodeId>,
    kind: NodeKind,
}

impl Node {
    fn new(value: f64, kind: NodeKind) -> Self {
        Self {
            value,
            dirty: true,
            dependents: Vec::new(),
            kind,
        }
    }
}

/// Arena of constant and discretization nodes with dirty-flag caching.
///
/// # Example
/// ```
/// use lazy_sde::ParamGraph;
///
/// let mut graph = ParamGraph::new();
/// let mu = graph.constant(0.05);
/// assert!(graph.is_dirty(mu).unwrap());
///
/// assert_eq!(graph.eval(mu).unwrap(), 0.05);
/// assert!(!graph.is_dirty(mu).unwrap());
///
/// graph.set_value(mu, 0.07).unwrap();
/// assert!(graph.is_dirty(mu).unwrap());
/// ```
#[derive(Debug)]
pub struct ParamGraph {
    id: u32,
    /// `(graph id, node count)` of every graph this one was cloned from.
    inherited: Vec<(u32, u32)>,
    nodes: Vec<Node>,
    /// True while every edge points from an older node to a newer one.
    forward_only: bool,
    recomputed: u64,
    /// Cycle-search marks, `visit_marks[i] == visit_epoch` means visited.
    visit_marks: Vec<u32>,
    visit_epoch: u32,
}

impl Clone for ParamGraph {
    /// The clone gets a fresh graph id, so nodes it creates are never
    /// mistaken for nodes created later in `self`.
    fn clone(&self) -> Self {
        let mut inherited = self.inherited.clone();
        inherited.push((self.id, self.nodes.len() as u32));
        Self {
            id: next_graph_id(),
            inherited,
            nodes: self.nodes.clone(),
            forward_only: self.forward_only,
            recomputed: self.recomputed,
            visit_marks: Vec::new(),
            visit_epoch: 0,
        }
    }
}

fn next_graph_id() -> u32 {
    NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed)
}

impl Default for ParamGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self {
            id: next_graph_id(),
            inherited: Vec::new(),
            nodes: Vec::new(),
            forward_only: true,
            recomputed: 0,
            visit_marks: Vec::new(),
            visit_epoch: 0,
        }
    }

    /// Adds a constant node. Constants start dirty, like every node.
    pub fn constant(&mut self, value: f64) -> NodeId {
        self.push_node(value, NodeKind::Constant)
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total number of discretization steps recomputed since creation.
    ///
    /// Constants clearing their flag are not counted.
    pub fn recomputed(&self) -> u64 {
        self.recomputed
    }

    /// Returns true if `id` was issued by this graph, or by a graph it was
    /// cloned from before the clone.
    pub fn contains(&self, id: NodeId) -> bool {
        if id.graph == self.id {
            return id.index() < self.nodes.len();
        }
        self.inherited
            .iter()
            .any(|&(graph, len)| graph == id.graph && id.index < len)
    }

    /// Cached value of a node, without evaluating it.
    pub fn value(&self, id: NodeId) -> SdeResult<f64> {
        let index = self.check(id)?;
        Ok(self.nodes[index].value)
    }

    pub fn is_dirty(&self, id: NodeId) -> SdeResult<bool> {
        let index = self.check(id)?;
        Ok(self.nodes[index].dirty)
    }

    pub fn is_step(&self, id: NodeId) -> SdeResult<bool> {
        let index = self.check(id)?;
        Ok(matches!(self.nodes[index].kind, NodeKind::Step(_)))
    }

    /// Nodes registered as dependents of `id`, in registration order.
    pub fn dependents(&self, id: NodeId) -> SdeResult<&[NodeId]> {
        let index = self.check(id)?;
        Ok(&self.nodes[index].dependents)
    }

    /// Stores a new value in a constant node and invalidates everything
    /// downstream of it.
    ///
    /// The cascade always runs from the mutated node, even when that node is
    /// already dirty. Past the first hop it stops at dependents that are
    /// already dirty.
    pub fn set_value(&mut self, id: NodeId, value: f64) -> SdeResult<()> {
        let index = self.check(id)?;
        if !matches!(self.nodes[index].kind, NodeKind::Constant) {
            return Err(SdeError::NotAConstant(id));
        }
        self.nodes[index].value = value;
        self.invalidate(index);
        Ok(())
    }

    /// Marks `id` and its transitive dependents dirty without changing any
    /// stored value.
    pub fn mark_dirty(&mut self, id: NodeId) -> SdeResult<()> {
        let index = self.check(id)?;
        self.invalidate(index);
        Ok(())
    }

    /// Registers `dependent` as an observer of `upstream`.
    ///
    /// Duplicate registrations are kept. An edge that would close a cycle is
    /// rejected before anything is recorded. If `upstream` is dirty at
    /// registration time the dependent is dirtied as well.
    pub fn add_dependent(&mut self, upstream: NodeId, dependent: NodeId) -> SdeResult<()> {
        let up = self.check(upstream)?;
        let down = self.check(dependent)?;

        let forward = up < down;
        if !(forward && self.forward_only) && self.reaches(down, up) {
            return Err(SdeError::Cycle {
                upstream,
                dependent,
            });
        }
        if !forward {
            self.forward_only = false;
        }

        self.nodes[up].dependents.push(dependent);
        if self.nodes[up].dirty {
            self.invalidate(down);
        }
        Ok(())
    }

    /// Evaluates a node, recomputing only the dirty part of its inputs.
    ///
    /// Evaluation walks an explicit work stack rather than recursing, so a
    /// freshly invalidated chain of any length is safe to evaluate.
    pub fn eval(&mut self, id: NodeId) -> SdeResult<f64> {
        let index = self.check(id)?;
        Ok(self.eval_index(index))
    }

    /// Sets the per-path shock of a discretization node and invalidates it.
    pub fn set_shock(&mut self, id: NodeId, shock: f64) -> SdeResult<()> {
        let index = self.check(id)?;
        match &mut self.nodes[index].kind {
            NodeKind::Step(step) => step.set_shock(shock),
            NodeKind::Constant => return Err(SdeError::NotAStep(id)),
        }
        self.invalidate(index);
        Ok(())
    }

    /// Current shock of a discretization node.
    pub fn shock(&self, id: NodeId) -> SdeResult<f64> {
        let index = self.check(id)?;
        match &self.nodes[index].kind {
            NodeKind::Step(step) => Ok(step.shock()),
            NodeKind::Constant => Err(SdeError::NotAStep(id)),
        }
    }

    pub(crate) fn check(&self, id: NodeId) -> SdeResult<usize> {
        if self.contains(id) {
            Ok(id.index())
        } else {
            Err(SdeError::UnknownNode(id))
        }
    }

    pub(crate) fn push_node(&mut self, value: f64, kind: NodeKind) -> NodeId {
        let id = NodeId {
            graph: self.id,
            index: self.nodes.len() as u32,
        };
        self.nodes.push(Node::new(value, kind));
        id
    }

    /// Cached value of a node known to belong to this graph.
    pub(crate) fn cached(&self, id: NodeId) -> f64 {
        self.nodes[id.index()].value
    }

    fn invalidate(&mut self, index: usize) {
        self.nodes[index].dirty = true;

        let mut stack: Vec<usize> = self.nodes[index]
            .dependents
            .iter()
            .map(NodeId::index)
            .collect();
        let mut touched = 0usize;

        while let Some(i) = stack.pop() {
            let node = &mut self.nodes[i];
            if node.dirty {
                continue;
            }
            node.dirty = true;
            touched += 1;
            stack.extend(node.dependents.iter().map(NodeId::index));
        }

        trace!(node = index, touched, "invalidated");
    }

    /// Depth-first search along dependent edges.
    fn reaches(&mut self, from: usize, target: usize) -> bool {
        if from == target {
            return true;
        }
        if self.nodes[from].dependents.is_empty() {
            return false;
        }

        let epoch = self.next_visit_epoch();
        let mut stack = vec![from];
        self.visit_marks[from] = epoch;

        while let Some(i) = stack.pop() {
            for dependent in &self.nodes[i].dependents {
                let j = dependent.index();
                if j == target {
                    return true;
                }
                if self.visit_marks[j] != epoch {
                    self.visit_marks[j] = epoch;
                    stack.push(j);
                }
            }
        }
        false
    }

    /// Starts a new cycle search; marks from earlier searches become stale.
    fn next_visit_epoch(&mut self) -> u32 {
        self.visit_marks.resize(self.nodes.len(), 0);
        if self.visit_epoch == u32::MAX {
            self.visit_marks.fill(0);
            self.visit_epoch = 0;
        }
        self.visit_epoch += 1;
        self.visit_epoch
    }

    fn eval_index(&mut self, root: usize) -> f64 {
        if !self.nodes[root].dirty {
            return self.nodes[root].value;
        }

        let mut stack = vec![root];
        while let Some(&top) = stack.last() {
            if !self.nodes[top].dirty {
                stack.pop();
                continue;
            }

            let ready = match &self.nodes[top].kind {
                NodeKind::Constant => Some(None),
                NodeKind::Step(step) => {
                    let pending = stack.len();
                    for input in step.inputs() {
                        if self.nodes[input.index()].dirty {
                            stack.push(input.index());
                        }
                    }
                    if stack.len() == pending {
                        Some(Some(step.compute(self)))
                    } else {
                        None
                    }
                }
            };

            if let Some(computed) = ready {
                let node = &mut self.nodes[top];
                if let Some(value) = computed {
                    node.value = value;
                    self.recomputed += 1;
                }
                node.dirty = false;
                stack.pop();
            }
        }

        self.nodes[root].value
    }
}
