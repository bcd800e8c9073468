//! Lazily recalculated objects.

use crate::error::GraphError;
use crate::patterns::NodeId;
use crate::session::Session;

/// An object that caches a result and recomputes it on demand.
///
/// The cache state lives on the object's lazy node in the session graph, so
/// invalidations arrive through ordinary notifications: any update received
/// by the node marks the cache stale. Implementors supply the node and
/// [`perform_calculations`](LazyObject::perform_calculations); everything
/// else has a default.
///
/// # Example
///
/// ```rust
/// use strata_core::prelude::*;
///
/// struct Doubler {
///     node: NodeId,
///     input: NodeId,
///     value: f64,
/// }
///
/// impl LazyObject for Doubler {
///     type Error = StrataError;
///
///     fn node(&self) -> NodeId {
///         self.node
///     }
///
///     fn perform_calculations(&mut self, session: &mut Session) -> StrataResult<()> {
///         self.value = 2.0 * session.quote_value(self.input)?;
///         Ok(())
///     }
/// }
///
/// let mut session = Session::new(SessionConfig::new(Date::from_ymd(2025, 1, 2).unwrap()));
/// let input = session.new_quote("x", 1.5);
/// let node = session.graph_mut().add_lazy("doubler");
/// session.graph_mut().register_with(node, input).unwrap();
///
/// let mut doubler = Doubler { node, input, value: 0.0 };
/// doubler.calculate(&mut session).unwrap();
/// assert_eq!(doubler.value, 3.0);
///
/// session.set_quote(input, 2.0).unwrap();
/// assert!(!doubler.is_calculated(&session));
/// doubler.calculate(&mut session).unwrap();
/// assert_eq!(doubler.value, 4.0);
/// ```
pub trait LazyObject {
    /// Error produced by the calculation.
    type Error: From<GraphError>;

    /// The object's lazy node.
    fn node(&self) -> NodeId;

    /// Computes and stores the results.
    ///
    /// # Errors
    ///
    /// Returns the calculation's own failure; the cache stays stale.
    fn perform_calculations(&mut self, session: &mut Session) -> Result<(), Self::Error>;

    /// Runs the calculation if the cache is stale and the object is not frozen.
    ///
    /// The node is marked calculated before the work starts, so a recursive
    /// request made during it returns immediately.
    ///
    /// # Errors
    ///
    /// Propagates the calculation failure after marking the cache stale.
    fn calculate(&mut self, session: &mut Session) -> Result<(), Self::Error> {
        let id = self.node();
        if !session.graph_mut().begin_calculation(id)? {
            return Ok(());
        }
        tracing::debug!(node = %id, "performing calculations");
        if let Err(err) = self.perform_calculations(session) {
            if let Err(graph_err) = session.graph_mut().abort_calculation(id) {
                tracing::warn!(node = %id, error = %graph_err, "could not reset cache state");
            }
            return Err(err);
        }
        Ok(())
    }

    /// Forces a calculation even when cached or frozen, then notifies
    /// observers. The frozen flag is restored afterwards.
    ///
    /// Observers are notified whether or not the calculation succeeded.
    ///
    /// # Errors
    ///
    /// Returns the calculation failure first, else any notification failure.
    fn recalculate(&mut self, session: &mut Session) -> Result<(), Self::Error> {
        let id = self.node();
        let was_frozen = session.graph_mut().force_recalculation(id)?;
        let result = self.calculate(session);
        session.graph_mut().restore_frozen(id, was_frozen)?;
        let notified = session.graph_mut().notify_observers(id);
        result?;
        notified.map_err(Into::into)
    }

    /// Suppresses recalculation and notifications until unfrozen.
    ///
    /// # Errors
    ///
    /// Fails if the node is not a live lazy node.
    fn freeze(&self, session: &mut Session) -> Result<(), Self::Error> {
        session.graph_mut().freeze(self.node()).map_err(Into::into)
    }

    /// Lifts a freeze, sending one notification if anything changed meanwhile.
    ///
    /// # Errors
    ///
    /// Fails if the node is not a live lazy node or an observer fails.
    fn unfreeze(&self, session: &mut Session) -> Result<(), Self::Error> {
        session
            .graph_mut()
            .unfreeze(self.node())
            .map(|_| ())
            .map_err(Into::into)
    }

    /// Forward every invalidation, not just the first.
    ///
    /// # Errors
    ///
    /// Fails if the node is not a live lazy node.
    fn always_forward_notifications(&self, session: &mut Session) -> Result<(), Self::Error> {
        session
            .graph_mut()
            .set_always_forward(self.node(), true)
            .map_err(Into::into)
    }

    /// Forward only the first invalidation after each calculation.
    ///
    /// # Errors
    ///
    /// Fails if the node is not a live lazy node.
    fn forward_first_notification_only(&self, session: &mut Session) -> Result<(), Self::Error> {
        session
            .graph_mut()
            .set_always_forward(self.node(), false)
            .map_err(Into::into)
    }

    /// Whether the cached result is valid.
    fn is_calculated(&self, session: &Session) -> bool {
        session
            .graph()
            .lazy_state(self.node())
            .is_ok_and(|s| s.calculated)
    }

    /// Whether the object is frozen.
    fn is_frozen(&self, session: &Session) -> bool {
        session
            .graph()
            .lazy_state(self.node())
            .is_ok_and(|s| s.frozen)
    }
}
