//! Calculation session: the graph, the evaluation date and quotes.

use serde::{Deserialize, Serialize};

use crate::error::{GraphResult, StrataError, StrataResult};
use crate::patterns::{ForwardingPolicy, NodeId, ObserverGraph, ReentrancyPolicy};
use crate::types::Date;

/// Session settings.
///
/// # Example
///
/// ```rust
/// use strata_core::prelude::*;
///
/// let config = SessionConfig::from_json(r#"{ "evaluation_date": "2025-01-02" }"#).unwrap();
/// assert_eq!(config.reentrancy, ReentrancyPolicy::BreakCycle);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Date all term structures are anchored to.
    pub evaluation_date: Date,

    /// Behaviour when a notification re-enters an updating node.
    #[serde(default)]
    pub reentrancy: ReentrancyPolicy,

    /// Default forwarding policy for lazy nodes.
    #[serde(default)]
    pub forwarding: ForwardingPolicy,
}

impl SessionConfig {
    /// Creates a config with default policies.
    #[must_use]
    pub fn new(evaluation_date: Date) -> Self {
        Self {
            evaluation_date,
            reentrancy: ReentrancyPolicy::default(),
            forwarding: ForwardingPolicy::default(),
        }
    }

    /// Sets the reentrancy policy.
    #[must_use]
    pub fn with_reentrancy(mut self, policy: ReentrancyPolicy) -> Self {
        self.reentrancy = policy;
        self
    }

    /// Sets the forwarding policy.
    #[must_use]
    pub fn with_forwarding(mut self, policy: ForwardingPolicy) -> Self {
        self.forwarding = policy;
        self
    }

    /// Parses a config from JSON.
    ///
    /// # Errors
    ///
    /// Returns `StrataError::ConfigError` on malformed input.
    pub fn from_json(json: &str) -> StrataResult<Self> {
        serde_json::from_str(json).map_err(|e| StrataError::config_error(e.to_string()))
    }
}

/// Owner of all observable state for one calculation context.
///
/// Sessions are independent: nothing is shared between two of them.
#[derive(Debug)]
pub struct Session {
    graph: ObserverGraph,
    evaluation_date: Date,
    evaluation_date_node: NodeId,
}

impl Session {
    /// Creates a session.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        let mut graph = ObserverGraph::with_policies(config.reentrancy, config.forwarding);
        let evaluation_date_node = graph.add_observable("evaluation date");
        tracing::debug!(date = %config.evaluation_date, "session created");
        Self {
            graph,
            evaluation_date: config.evaluation_date,
            evaluation_date_node,
        }
    }

    /// The observer graph.
    #[must_use]
    pub fn graph(&self) -> &ObserverGraph {
        &self.graph
    }

    /// Mutable access to the observer graph.
    pub fn graph_mut(&mut self) -> &mut ObserverGraph {
        &mut self.graph
    }

    /// Current evaluation date.
    #[must_use]
    pub fn evaluation_date(&self) -> Date {
        self.evaluation_date
    }

    /// Node notified when the evaluation date moves.
    #[must_use]
    pub fn evaluation_date_node(&self) -> NodeId {
        self.evaluation_date_node
    }

    /// Moves the evaluation date, notifying its observers if it changed.
    ///
    /// # Errors
    ///
    /// Returns notification failures.
    pub fn set_evaluation_date(&mut self, date: Date) -> GraphResult<bool> {
        if date == self.evaluation_date {
            return Ok(false);
        }
        tracing::info!(from = %self.evaluation_date, to = %date, "evaluation date moved");
        self.evaluation_date = date;
        self.graph.notify_observers(self.evaluation_date_node)?;
        Ok(true)
    }

    /// Creates a quote with a value.
    pub fn new_quote(&mut self, label: impl Into<String>, value: f64) -> NodeId {
        self.graph.add_quote(label, Some(value))
    }

    /// Creates a quote without a value.
    pub fn new_unset_quote(&mut self, label: impl Into<String>) -> NodeId {
        self.graph.add_quote(label, None)
    }

    /// Sets a quote, notifying observers if the value changed.
    ///
    /// # Errors
    ///
    /// Fails for unknown or non-quote nodes, or on notification failure.
    pub fn set_quote(&mut self, id: NodeId, value: f64) -> GraphResult<bool> {
        self.graph.set_quote(id, value)
    }

    /// Clears a quote.
    ///
    /// # Errors
    ///
    /// Fails for unknown or non-quote nodes, or on notification failure.
    pub fn reset_quote(&mut self, id: NodeId) -> GraphResult<bool> {
        self.graph.reset_quote(id)
    }

    /// Reads a quote that must hold a finite value.
    ///
    /// # Errors
    ///
    /// Returns `StrataError::InvalidQuote` if unset or not finite.
    pub fn quote_value(&self, id: NodeId) -> StrataResult<f64> {
        match self.graph.quote(id)? {
            Some(v) if v.is_finite() => Ok(v),
            Some(v) => Err(StrataError::invalid_quote(
                self.graph.label(id)?,
                format!("non-finite value {v}"),
            )),
            None => Err(StrataError::invalid_quote(self.graph.label(id)?, "no value")),
        }
    }
}
