//! Observer graph with stable node identifiers.
//!
//! Every observable and observer in a calculation session is a node of one
//! directed graph. An edge runs from an observable to each observer
//! registered with it, so the observer set of a node is its outgoing
//! neighbourhood and the observable set is its incoming one.
//!
//! Nodes are addressed by [`NodeId`], an index plus a generation counter.
//! A released node's id never resolves again, even if the slot is reused.
//!
//! # Example
//!
//! ```rust
//! use strata_core::patterns::ObserverGraph;
//!
//! let mut graph = ObserverGraph::new();
//! let quote = graph.add_quote("USD.1Y", Some(0.01));
//! let curve = graph.add_lazy("USD.CURVE");
//!
//! assert!(graph.register_with(curve, quote).unwrap());
//! assert!(!graph.register_with(curve, quote).unwrap()); // idempotent
//!
//! graph.set_quote(quote, 0.012).unwrap();
//! assert_eq!(graph.observers_of(quote), vec![curve]);
//! ```

use std::fmt;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{Dfs, EdgeRef};
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};

// =============================================================================
// NODE IDENTIFIER
// =============================================================================

/// Stable identifier of a node in an [`ObserverGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: NodeIndex,
    generation: u64,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index.index(), self.generation)
    }
}

// =============================================================================
// POLICIES
// =============================================================================

/// What happens when an update re-enters an observer that is already
/// processing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ReentrancyPolicy {
    /// Return silently, breaking the cycle.
    #[default]
    BreakCycle,

    /// Fail with [`GraphError::CycleDetected`].
    Fail,
}

/// When a lazy node forwards an invalidation to its own observers.
///
/// `FirstOnly` forwards once per invalidation cycle: a node that is already
/// stale absorbs further updates until it has been recalculated. Under
/// diamond-shaped graphs an observer that reads a value between two
/// interleaved notification paths may therefore miss the second signal.
/// `Always` forwards every update at the cost of notification storms in
/// deep graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ForwardingPolicy {
    /// Forward only the first update after a successful calculation.
    #[default]
    FirstOnly,

    /// Forward every update.
    Always,
}

// =============================================================================
// NODE STATE
// =============================================================================

/// Cache state of a lazy node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LazyState {
    /// Whether the cached result is valid.
    pub calculated: bool,
    /// Whether recalculation is suppressed.
    pub frozen: bool,
    /// Whether every update is forwarded.
    pub always_forward: bool,
    /// Whether an update arrived while frozen.
    pub pending: bool,
}

/// Kind of a node, as seen from outside the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    /// Plain observable; notified explicitly by its owner.
    Observable,
    /// Observable numeric value.
    Quote,
    /// Observer relaying every update to its own observers.
    Forwarder,
    /// Lazily calculated object.
    Lazy,
    /// Observer with user-supplied update logic.
    Custom,
}

impl NodeRole {
    /// Returns true if nodes of this role can register with observables.
    #[must_use]
    pub fn is_observer(&self) -> bool {
        matches!(self, Self::Forwarder | Self::Lazy | Self::Custom)
    }
}

/// User-supplied reaction to an update.
pub trait Observer {
    /// Handles a change signal from any observable this node is registered with.
    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> GraphResult<()>;
}

/// Access to the graph from inside [`Observer::update`].
///
/// The observer may register, unregister or notify; changes to observer sets
/// do not affect the notification pass already in progress.
pub struct UpdateContext<'g> {
    graph: &'g mut ObserverGraph,
    id: NodeId,
}

impl UpdateContext<'_> {
    /// Id of the node being updated.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The graph the node lives in.
    pub fn graph(&mut self) -> &mut ObserverGraph {
        self.graph
    }

    /// Notifies this node's own observers.
    pub fn notify_observers(&mut self) -> GraphResult<()> {
        self.graph.notify_observers(self.id)
    }
}

struct FnObserver<F>(F);

impl<F> Observer for FnObserver<F>
where
    F: FnMut(&mut UpdateContext<'_>) -> GraphResult<()>,
{
    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> GraphResult<()> {
        (self.0)(ctx)
    }
}

enum NodeKind {
    Observable,
    Quote(Option<f64>),
    Forwarder,
    Lazy(LazyState),
    // None while the observer is running
    Custom(Option<Box<dyn Observer>>),
}

impl NodeKind {
    fn role(&self) -> NodeRole {
        match self {
            Self::Observable => NodeRole::Observable,
            Self::Quote(_) => NodeRole::Quote,
            Self::Forwarder => NodeRole::Forwarder,
            Self::Lazy(_) => NodeRole::Lazy,
            Self::Custom(_) => NodeRole::Custom,
        }
    }
}

struct Node {
    label: String,
    generation: u64,
    kind: NodeKind,
    updating: bool,
    detached: bool,
}

enum UpdateAction {
    Nothing,
    Forward,
    Run(Box<dyn Observer>),
}

// =============================================================================
// OBSERVER GRAPH
// =============================================================================

/// Directed graph of observables and observers.
pub struct ObserverGraph {
    graph: StableDiGraph<Node, ()>,
    next_generation: u64,
    reentrancy: ReentrancyPolicy,
    forwarding: ForwardingPolicy,
}

impl Default for ObserverGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObserverGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverGraph")
            .field("nodes", &self.graph.node_count())
            .field("edges", &self.graph.edge_count())
            .field("reentrancy", &self.reentrancy)
            .field("forwarding", &self.forwarding)
            .finish()
    }
}

impl ObserverGraph {
    /// Creates an empty graph with default policies.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policies(ReentrancyPolicy::default(), ForwardingPolicy::default())
    }

    /// Creates an empty graph with the given policies.
    #[must_use]
    pub fn with_policies(reentrancy: ReentrancyPolicy, forwarding: ForwardingPolicy) -> Self {
        Self {
            graph: StableDiGraph::new(),
            next_generation: 0,
            reentrancy,
            forwarding,
        }
    }

    /// Returns the reentrancy policy.
    pub fn reentrancy_policy(&self) -> ReentrancyPolicy {
        self.reentrancy
    }

    /// Sets the reentrancy policy.
    pub fn set_reentrancy_policy(&mut self, policy: ReentrancyPolicy) {
        self.reentrancy = policy;
    }

    /// Returns the default forwarding policy for new lazy nodes.
    pub fn forwarding_policy(&self) -> ForwardingPolicy {
        self.forwarding
    }

    /// Sets the default forwarding policy. Existing nodes keep their setting.
    pub fn set_forwarding_policy(&mut self, policy: ForwardingPolicy) {
        self.forwarding = policy;
    }

    // -------------------------------------------------------------------------
    // Node creation and lookup
    // -------------------------------------------------------------------------

    fn insert(&mut self, label: String, kind: NodeKind) -> NodeId {
        self.next_generation += 1;
        let generation = self.next_generation;
        let index = self.graph.add_node(Node {
            label,
            generation,
            kind,
            updating: false,
            detached: false,
        });
        let id = NodeId { index, generation };
        tracing::trace!(node = %id, "node created");
        id
    }

    /// Adds a plain observable.
    pub fn add_observable(&mut self, label: impl Into<String>) -> NodeId {
        self.insert(label.into(), NodeKind::Observable)
    }

    /// Adds a quote, optionally unset.
    pub fn add_quote(&mut self, label: impl Into<String>, value: Option<f64>) -> NodeId {
        self.insert(label.into(), NodeKind::Quote(value))
    }

    /// Adds an observer that forwards every update to its own observers.
    pub fn add_forwarder(&mut self, label: impl Into<String>) -> NodeId {
        self.insert(label.into(), NodeKind::Forwarder)
    }

    /// Adds a lazy node, not yet calculated.
    pub fn add_lazy(&mut self, label: impl Into<String>) -> NodeId {
        let state = LazyState {
            always_forward: self.forwarding == ForwardingPolicy::Always,
            ..LazyState::default()
        };
        self.insert(label.into(), NodeKind::Lazy(state))
    }

    /// Adds an observer with custom update logic.
    pub fn add_observer<O: Observer + 'static>(
        &mut self,
        label: impl Into<String>,
        observer: O,
    ) -> NodeId {
        self.insert(label.into(), NodeKind::Custom(Some(Box::new(observer))))
    }

    /// Adds an observer whose update logic is a closure.
    pub fn add_callback<F>(&mut self, label: impl Into<String>, callback: F) -> NodeId
    where
        F: FnMut(&mut UpdateContext<'_>) -> GraphResult<()> + 'static,
    {
        self.add_observer(label, FnObserver(callback))
    }

    fn node(&self, id: NodeId) -> GraphResult<&Node> {
        self.graph
            .node_weight(id.index)
            .filter(|n| n.generation == id.generation)
            .ok_or_else(|| GraphError::UnknownNode { id: id.to_string() })
    }

    fn node_mut(&mut self, id: NodeId) -> GraphResult<&mut Node> {
        self.graph
            .node_weight_mut(id.index)
            .filter(|n| n.generation == id.generation)
            .ok_or_else(|| GraphError::UnknownNode { id: id.to_string() })
    }

    fn id_of(&self, index: NodeIndex) -> Option<NodeId> {
        self.graph.node_weight(index).map(|n| NodeId {
            index,
            generation: n.generation,
        })
    }

    /// Returns true if the id refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    /// Returns the node's label.
    pub fn label(&self, id: NodeId) -> GraphResult<&str> {
        self.node(id).map(|n| n.label.as_str())
    }

    /// Returns the node's role.
    pub fn role(&self, id: NodeId) -> GraphResult<NodeRole> {
        self.node(id).map(|n| n.kind.role())
    }

    /// Returns true if the node has been detached.
    pub fn is_detached(&self, id: NodeId) -> GraphResult<bool> {
        self.node(id).map(|n| n.detached)
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    // -------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------

    /// Registers `observer` with `observable`.
    ///
    /// Returns `false` if the registration already existed.
    pub fn register_with(&mut self, observer: NodeId, observable: NodeId) -> GraphResult<bool> {
        let obs = self.node(observer)?;
        if !obs.kind.role().is_observer() {
            return Err(GraphError::NotAnObserver {
                label: obs.label.clone(),
            });
        }
        if obs.detached {
            return Err(GraphError::Detached {
                label: obs.label.clone(),
            });
        }
        let target = self.node(observable)?;
        if target.detached {
            return Err(GraphError::Detached {
                label: target.label.clone(),
            });
        }

        if self.graph.find_edge(observable.index, observer.index).is_some() {
            return Ok(false);
        }
        self.graph.add_edge(observable.index, observer.index, ());
        tracing::trace!(observer = %observer, observable = %observable, "registered");
        Ok(true)
    }

    /// Removes a registration. Unknown ids are ignored.
    pub fn unregister_with(&mut self, observer: NodeId, observable: NodeId) -> bool {
        if !self.contains(observer) || !self.contains(observable) {
            return false;
        }
        match self.graph.find_edge(observable.index, observer.index) {
            Some(edge) => {
                self.graph.remove_edge(edge);
                true
            }
            None => false,
        }
    }

    /// Removes every registration of `observer`. Returns how many were removed.
    pub fn unregister_with_all(&mut self, observer: NodeId) -> usize {
        if !self.contains(observer) {
            return 0;
        }
        let edges: Vec<_> = self
            .graph
            .edges_directed(observer.index, Direction::Incoming)
            .map(|e| e.id())
            .collect();
        for edge in &edges {
            self.graph.remove_edge(*edge);
        }
        edges.len()
    }

    /// Returns true if `observer` is registered with `observable`.
    pub fn is_registered(&self, observer: NodeId, observable: NodeId) -> bool {
        self.contains(observer)
            && self.contains(observable)
            && self
                .graph
                .find_edge(observable.index, observer.index)
                .is_some()
    }

    /// Observers currently registered with `observable`.
    pub fn observers_of(&self, observable: NodeId) -> Vec<NodeId> {
        self.neighbours(observable, Direction::Outgoing)
    }

    /// Observables `observer` is registered with.
    pub fn observables_of(&self, observer: NodeId) -> Vec<NodeId> {
        self.neighbours(observer, Direction::Incoming)
    }

    fn neighbours(&self, id: NodeId, direction: Direction) -> Vec<NodeId> {
        if !self.contains(id) {
            return Vec::new();
        }
        self.graph
            .neighbors_directed(id.index, direction)
            .filter_map(|idx| self.id_of(idx))
            .collect()
    }

    /// Every node reachable from `id` through observer edges, excluding `id`
    /// unless it lies on a cycle through itself.
    pub fn dependents_of(&self, id: NodeId) -> Vec<NodeId> {
        if !self.contains(id) {
            return Vec::new();
        }
        let mut dependents = Vec::new();
        let mut dfs = Dfs::new(&self.graph, id.index);
        while let Some(idx) = dfs.next(&self.graph) {
            if idx != id.index {
                dependents.extend(self.id_of(idx));
            }
        }
        dependents
    }

    /// Returns true if the registrations contain a cycle.
    pub fn has_cycle(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }

    // -------------------------------------------------------------------------
    // Notification
    // -------------------------------------------------------------------------

    /// Delivers an update to every observer registered with `observable`.
    ///
    /// The observer set is snapshotted first. A failing observer does not stop
    /// delivery to the rest; all failures are reported together.
    pub fn notify_observers(&mut self, observable: NodeId) -> GraphResult<()> {
        self.node(observable)?;
        let snapshot = self.observers_of(observable);
        tracing::trace!(node = %observable, observers = snapshot.len(), "notifying");

        let mut failures = Vec::new();
        for observer in snapshot {
            if let Err(err) = self.deliver(observer) {
                match err {
                    GraphError::NotificationFailed { failures: nested } => {
                        failures.extend(nested);
                    }
                    other => failures.push(other),
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(GraphError::NotificationFailed { failures })
        }
    }

    fn deliver(&mut self, id: NodeId) -> GraphResult<()> {
        let policy = self.reentrancy;
        // released during this pass
        let Ok(node) = self.node_mut(id) else {
            return Ok(());
        };
        if node.detached {
            return Ok(());
        }
        if node.updating {
            return match policy {
                ReentrancyPolicy::BreakCycle => {
                    tracing::trace!(node = %id, "cycle broken");
                    Ok(())
                }
                ReentrancyPolicy::Fail => {
                    tracing::warn!(node = %id, label = %node.label, "notification cycle");
                    Err(GraphError::CycleDetected {
                        label: node.label.clone(),
                    })
                }
            };
        }

        node.updating = true;
        let result = self.run_update(id);
        if let Ok(node) = self.node_mut(id) {
            node.updating = false;
        }
        result
    }

    fn run_update(&mut self, id: NodeId) -> GraphResult<()> {
        let action = {
            let node = self.node_mut(id)?;
            match &mut node.kind {
                NodeKind::Observable | NodeKind::Quote(_) => UpdateAction::Nothing,
                NodeKind::Forwarder => UpdateAction::Forward,
                NodeKind::Lazy(state) => {
                    let forward = state.calculated || state.always_forward;
                    if forward {
                        // early, so observers reading during the pass see a stale flag
                        state.calculated = false;
                    }
                    if state.frozen {
                        state.pending = true;
                        UpdateAction::Nothing
                    } else if forward {
                        UpdateAction::Forward
                    } else {
                        UpdateAction::Nothing
                    }
                }
                NodeKind::Custom(slot) => match slot.take() {
                    Some(observer) => UpdateAction::Run(observer),
                    None => UpdateAction::Nothing,
                },
            }
        };

        match action {
            UpdateAction::Nothing => Ok(()),
            UpdateAction::Forward => self.notify_observers(id),
            UpdateAction::Run(mut observer) => {
                let result = observer.update(&mut UpdateContext { graph: self, id });
                if let Ok(node) = self.node_mut(id) {
                    if let NodeKind::Custom(slot) = &mut node.kind {
                        *slot = Some(observer);
                    }
                }
                result
            }
        }
    }

    // -------------------------------------------------------------------------
    // Quotes
    // -------------------------------------------------------------------------

    /// Current value of a quote.
    pub fn quote(&self, id: NodeId) -> GraphResult<Option<f64>> {
        let node = self.node(id)?;
        match node.kind {
            NodeKind::Quote(value) => Ok(value),
            _ => Err(GraphError::NotAQuote {
                label: node.label.clone(),
            }),
        }
    }

    fn replace_quote(&mut self, id: NodeId, value: Option<f64>) -> GraphResult<bool> {
        let node = self.node_mut(id)?;
        let NodeKind::Quote(current) = &mut node.kind else {
            return Err(GraphError::NotAQuote {
                label: node.label.clone(),
            });
        };
        let unchanged = match (*current, value) {
            (None, None) => true,
            (Some(a), Some(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        };
        if unchanged {
            return Ok(false);
        }
        *current = value;
        self.notify_observers(id)?;
        Ok(true)
    }

    /// Sets a quote value, notifying observers if it changed.
    pub fn set_quote(&mut self, id: NodeId, value: f64) -> GraphResult<bool> {
        self.replace_quote(id, Some(value))
    }

    /// Clears a quote value, notifying observers if it was set.
    pub fn reset_quote(&mut self, id: NodeId) -> GraphResult<bool> {
        self.replace_quote(id, None)
    }

    // -------------------------------------------------------------------------
    // Lazy state
    // -------------------------------------------------------------------------

    /// Cache state of a lazy node.
    pub fn lazy_state(&self, id: NodeId) -> GraphResult<LazyState> {
        let node = self.node(id)?;
        match node.kind {
            NodeKind::Lazy(state) => Ok(state),
            _ => Err(GraphError::NotLazy {
                label: node.label.clone(),
            }),
        }
    }

    fn lazy_mut(&mut self, id: NodeId) -> GraphResult<&mut LazyState> {
        let node = self.node_mut(id)?;
        match &mut node.kind {
            NodeKind::Lazy(state) => Ok(state),
            _ => Err(GraphError::NotLazy {
                label: node.label.clone(),
            }),
        }
    }

    /// Overrides the forwarding policy for one lazy node.
    pub fn set_always_forward(&mut self, id: NodeId, always: bool) -> GraphResult<()> {
        self.lazy_mut(id)?.always_forward = always;
        Ok(())
    }

    /// Marks a lazy node calculated if it needs calculating.
    ///
    /// Returns true when the caller must run the calculation. The flag is set
    /// before the work so that recursive requests during it return at once.
    pub(crate) fn begin_calculation(&mut self, id: NodeId) -> GraphResult<bool> {
        let state = self.lazy_mut(id)?;
        if state.calculated || state.frozen {
            return Ok(false);
        }
        state.calculated = true;
        Ok(true)
    }

    pub(crate) fn abort_calculation(&mut self, id: NodeId) -> GraphResult<()> {
        self.lazy_mut(id)?.calculated = false;
        Ok(())
    }

    /// Clears both flags ahead of a forced recalculation; returns the old
    /// frozen flag.
    pub(crate) fn force_recalculation(&mut self, id: NodeId) -> GraphResult<bool> {
        let state = self.lazy_mut(id)?;
        let was_frozen = state.frozen;
        state.calculated = false;
        state.frozen = false;
        state.pending = false;
        Ok(was_frozen)
    }

    pub(crate) fn restore_frozen(&mut self, id: NodeId, frozen: bool) -> GraphResult<()> {
        self.lazy_mut(id)?.frozen = frozen;
        Ok(())
    }

    /// Freezes a lazy node: updates are absorbed without notification and
    /// the cached result is kept.
    pub fn freeze(&mut self, id: NodeId) -> GraphResult<()> {
        self.lazy_mut(id)?.frozen = true;
        Ok(())
    }

    /// Unfreezes a lazy node.
    ///
    /// Sends one notification if any update arrived while frozen and returns
    /// whether it did.
    pub fn unfreeze(&mut self, id: NodeId) -> GraphResult<bool> {
        let state = self.lazy_mut(id)?;
        if !state.frozen {
            return Ok(false);
        }
        state.frozen = false;
        if !std::mem::take(&mut state.pending) {
            return Ok(false);
        }
        self.notify_observers(id)?;
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // Teardown
    // -------------------------------------------------------------------------

    /// Removes every edge touching `id` and marks it detached.
    ///
    /// Unknown ids are ignored. Returns the number of edges removed.
    pub fn detach(&mut self, id: NodeId) -> usize {
        let Ok(node) = self.node_mut(id) else {
            return 0;
        };
        node.detached = true;

        let edges: Vec<_> = self
            .graph
            .edges_directed(id.index, Direction::Incoming)
            .chain(self.graph.edges_directed(id.index, Direction::Outgoing))
            .map(|e| e.id())
            .collect();
        for edge in &edges {
            self.graph.remove_edge(*edge);
        }
        tracing::trace!(node = %id, edges = edges.len(), "detached");
        edges.len()
    }

    /// Frees a detached node.
    pub fn release(&mut self, id: NodeId) -> GraphResult<()> {
        let node = self.node(id)?;
        if !node.detached {
            return Err(GraphError::StillAttached {
                label: node.label.clone(),
            });
        }
        self.graph.remove_node(id.index);
        tracing::trace!(node = %id, "released");
        Ok(())
    }

    /// Detaches and frees a node.
    pub fn dispose(&mut self, id: NodeId) -> GraphResult<()> {
        self.node(id)?;
        self.detach(id);
        self.release(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counter(graph: &mut ObserverGraph, label: &str) -> (NodeId, Rc<Cell<usize>>) {
        let count = Rc::new(Cell::new(0));
        let seen = Rc::clone(&count);
        let id = graph.add_callback(label, move |_ctx: &mut UpdateContext<'_>| {
            seen.set(seen.get() + 1);
            Ok(())
        });
        (id, count)
    }

    // ============ Registration ============

    #[test]
    fn test_register_is_idempotent() {
        let mut graph = ObserverGraph::new();
        let b = graph.add_observable("b");
        let (a, count) = counter(&mut graph, "a");

        assert!(graph.register_with(a, b).unwrap());
        assert!(!graph.register_with(a, b).unwrap());
        assert_eq!(graph.observers_of(b), vec![a]);
        assert_eq!(graph.observables_of(a), vec![b]);

        graph.notify_observers(b).unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_non_observer_cannot_register() {
        let mut graph = ObserverGraph::new();
        let b = graph.add_observable("b");
        let q = graph.add_quote("q", Some(1.0));
        assert!(matches!(
            graph.register_with(q, b),
            Err(GraphError::NotAnObserver { .. })
        ));
    }

    #[test]
    fn test_unregister() {
        let mut graph = ObserverGraph::new();
        let b1 = graph.add_observable("b1");
        let b2 = graph.add_observable("b2");
        let (a, count) = counter(&mut graph, "a");
        graph.register_with(a, b1).unwrap();
        graph.register_with(a, b2).unwrap();

        assert!(graph.unregister_with(a, b1));
        assert!(!graph.unregister_with(a, b1));
        graph.notify_observers(b1).unwrap();
        assert_eq!(count.get(), 0);

        assert_eq!(graph.unregister_with_all(a), 1);
        graph.notify_observers(b2).unwrap();
        assert_eq!(count.get(), 0);
    }

    // ============ Snapshot delivery ============

    #[test]
    fn test_unregistered_during_pass_still_notified() {
        let mut graph = ObserverGraph::new();
        let b = graph.add_observable("b");
        let (y, y_count) = counter(&mut graph, "y");
        let x = graph.add_callback("x", move |ctx: &mut UpdateContext<'_>| {
            ctx.graph().unregister_with(y, b);
            Ok(())
        });
        graph.register_with(x, b).unwrap();
        graph.register_with(y, b).unwrap();

        graph.notify_observers(b).unwrap();
        assert_eq!(y_count.get(), 1);

        graph.notify_observers(b).unwrap();
        assert_eq!(y_count.get(), 1);
    }

    #[test]
    fn test_registered_during_pass_not_notified() {
        let mut graph = ObserverGraph::new();
        let b = graph.add_observable("b");
        let late_count = Rc::new(Cell::new(0));
        let seen = Rc::clone(&late_count);
        let added = Rc::new(Cell::new(false));
        let x = graph.add_callback("x", move |ctx: &mut UpdateContext<'_>| {
            if !added.replace(true) {
                let seen = Rc::clone(&seen);
                let late = ctx.graph().add_callback("late", move |_: &mut UpdateContext<'_>| {
                    seen.set(seen.get() + 1);
                    Ok(())
                });
                ctx.graph().register_with(late, b)?;
            }
            Ok(())
        });
        graph.register_with(x, b).unwrap();

        graph.notify_observers(b).unwrap();
        assert_eq!(late_count.get(), 0);

        graph.notify_observers(b).unwrap();
        assert_eq!(late_count.get(), 1);
    }

    #[test]
    fn test_failures_collected() {
        let mut graph = ObserverGraph::new();
        let b = graph.add_observable("b");
        let bad = graph.add_callback("bad", |_: &mut UpdateContext<'_>| {
            Err(GraphError::observer_failed("bad", "boom"))
        });
        let (good, count) = counter(&mut graph, "good");
        graph.register_with(bad, b).unwrap();
        graph.register_with(good, b).unwrap();

        let err = graph.notify_observers(b).unwrap_err();
        assert_eq!(count.get(), 1);
        match err {
            GraphError::NotificationFailed { failures } => assert_eq!(failures.len(), 1),
            other => panic!("unexpected error {other}"),
        }
    }

    // ============ Cycles ============

    #[test]
    fn test_cycle_breaks_by_default() {
        let mut graph = ObserverGraph::new();
        let a = graph.add_forwarder("a");
        let b = graph.add_forwarder("b");
        graph.register_with(a, b).unwrap();
        graph.register_with(b, a).unwrap();

        assert!(graph.has_cycle());
        graph.notify_observers(a).unwrap();
        graph.notify_observers(b).unwrap();
    }

    #[test]
    fn test_cycle_fails_in_strict_mode() {
        let mut graph = ObserverGraph::with_policies(ReentrancyPolicy::Fail, ForwardingPolicy::FirstOnly);
        let a = graph.add_forwarder("a");
        let b = graph.add_forwarder("b");
        graph.register_with(a, b).unwrap();
        graph.register_with(b, a).unwrap();

        let err = graph.notify_observers(a).unwrap_err();
        let GraphError::NotificationFailed { failures } = err else {
            panic!("expected aggregated failure");
        };
        assert!(failures
            .iter()
            .any(|e| matches!(e, GraphError::CycleDetected { .. })));

        // guard flags were cleared
        graph.unregister_with(a, b);
        graph.notify_observers(a).unwrap();
    }

    #[test]
    fn test_dependents_walk() {
        let mut graph = ObserverGraph::new();
        let q = graph.add_quote("q", Some(1.0));
        let f = graph.add_forwarder("f");
        let l = graph.add_lazy("l");
        let other = graph.add_lazy("other");
        graph.register_with(f, q).unwrap();
        graph.register_with(l, f).unwrap();

        let mut deps = graph.dependents_of(q);
        deps.sort();
        let mut expected = vec![f, l];
        expected.sort();
        assert_eq!(deps, expected);
        assert!(!deps.contains(&other));
        assert!(!graph.has_cycle());
    }

    // ============ Lazy forwarding ============

    #[test]
    fn test_diamond_first_only_forwards_once() {
        let mut graph = ObserverGraph::new();
        let src = graph.add_observable("src");
        let left = graph.add_forwarder("left");
        let right = graph.add_forwarder("right");
        let sink = graph.add_lazy("sink");
        let (probe, count) = counter(&mut graph, "probe");
        graph.register_with(left, src).unwrap();
        graph.register_with(right, src).unwrap();
        graph.register_with(sink, left).unwrap();
        graph.register_with(sink, right).unwrap();
        graph.register_with(probe, sink).unwrap();

        graph.begin_calculation(sink).unwrap();
        graph.notify_observers(src).unwrap();
        assert_eq!(count.get(), 1);
        assert!(!graph.lazy_state(sink).unwrap().calculated);
    }

    #[test]
    fn test_diamond_always_forwards_every_path() {
        let mut graph = ObserverGraph::with_policies(ReentrancyPolicy::BreakCycle, ForwardingPolicy::Always);
        let src = graph.add_observable("src");
        let left = graph.add_forwarder("left");
        let right = graph.add_forwarder("right");
        let sink = graph.add_lazy("sink");
        let (probe, count) = counter(&mut graph, "probe");
        graph.register_with(left, src).unwrap();
        graph.register_with(right, src).unwrap();
        graph.register_with(sink, left).unwrap();
        graph.register_with(sink, right).unwrap();
        graph.register_with(probe, sink).unwrap();

        graph.notify_observers(src).unwrap();
        assert_eq!(count.get(), 2);

        graph.set_always_forward(sink, false).unwrap();
        graph.notify_observers(src).unwrap();
        assert_eq!(count.get(), 2);
    }

    // ============ Quotes ============

    #[test]
    fn test_quote_notifies_on_change_only() {
        let mut graph = ObserverGraph::new();
        let q = graph.add_quote("q", Some(0.01));
        let (a, count) = counter(&mut graph, "a");
        graph.register_with(a, q).unwrap();

        assert!(!graph.set_quote(q, 0.01).unwrap());
        assert_eq!(count.get(), 0);
        assert!(graph.set_quote(q, 0.02).unwrap());
        assert_eq!(count.get(), 1);
        assert!(graph.reset_quote(q).unwrap());
        assert_eq!(graph.quote(q).unwrap(), None);
        assert_eq!(count.get(), 2);
    }

    // ============ Teardown ============

    #[test]
    fn test_two_phase_teardown() {
        let mut graph = ObserverGraph::new();
        let b = graph.add_observable("b");
        let (a, count) = counter(&mut graph, "a");
        graph.register_with(a, b).unwrap();

        assert!(matches!(
            graph.release(a),
            Err(GraphError::StillAttached { .. })
        ));
        assert_eq!(graph.detach(a), 1);
        assert!(graph.register_with(a, b).is_err());
        graph.notify_observers(b).unwrap();
        assert_eq!(count.get(), 0);

        graph.release(a).unwrap();
        assert!(!graph.contains(a));
        assert_eq!(graph.detach(a), 0);
    }

    #[test]
    fn test_stale_id_never_aliases() {
        let mut graph = ObserverGraph::new();
        let old = graph.add_observable("old");
        graph.dispose(old).unwrap();
        let new = graph.add_observable("new");

        assert!(!graph.contains(old));
        assert!(graph.contains(new));
        assert!(matches!(graph.label(old), Err(GraphError::UnknownNode { .. })));
    }
}
