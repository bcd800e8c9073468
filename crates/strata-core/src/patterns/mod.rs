//! Observer pattern and lazy evaluation.
//!
//! Quotes, the evaluation date and every derived object are nodes of one
//! [`ObserverGraph`]. Changing an input notifies its observers; lazy nodes
//! drop their cached state and pass the signal on, and recompute only when
//! asked for a result.

mod graph;
mod lazy;

pub use graph::{
    ForwardingPolicy, LazyState, NodeId, NodeRole, Observer, ObserverGraph, ReentrancyPolicy,
    UpdateContext,
};
pub use lazy::LazyObject;
