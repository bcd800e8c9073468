//! Lazily bootstrapped piecewise curves.
//!
//! A [`PiecewiseCurve`] owns its helpers and a lazy node in the session
//! graph. The node observes the evaluation date and every helper quote, so
//! a quote change only marks the curve stale; the bootstrap runs on the next
//! [`curve`](PiecewiseCurve::curve) request.
//!
//! ```rust
//! use strata_core::prelude::*;
//! use strata_curves::prelude::*;
//!
//! let today = Date::from_ymd(2025, 1, 2).unwrap();
//! let mut session = Session::new(SessionConfig::new(today));
//!
//! let helpers: Vec<Box<dyn BootstrapHelper>> = [(1, 0.030), (2, 0.032), (5, 0.035)]
//!     .into_iter()
//!     .map(|(years, rate)| {
//!         let quote = session.new_quote(format!("{years}Y"), rate);
//!         let maturity = today.add_years(years).unwrap();
//!         Box::new(ZeroRateHelper::new(quote, maturity)) as Box<dyn BootstrapHelper>
//!     })
//!     .collect();
//!
//! let mut curve =
//!     PiecewiseCurve::new(&mut session, "USD", CurveBuildConfig::default(), helpers).unwrap();
//! let built = curve.curve(&mut session).unwrap();
//! assert!(built.max_quote_error() < 1e-10);
//! ```

use std::sync::Arc;

use strata_core::patterns::{LazyObject, NodeId};
use strata_core::types::Date;
use strata_core::Session;

use crate::bootstrap::{check_helpers, quote_errors, sort_helpers, Bootstrap};
use crate::config::{BootstrapMethod, CurveBuildConfig};
use crate::curve::{BootstrappedCurve, CurveUnderConstruction};
use crate::error::{CurveError, CurveResult};
use crate::helpers::BootstrapHelper;

/// A curve bootstrapped on demand from quoted helpers.
#[derive(Debug)]
pub struct PiecewiseCurve {
    node: NodeId,
    label: String,
    config: CurveBuildConfig,
    bootstrap: Box<dyn Bootstrap>,
    helpers: Vec<Box<dyn BootstrapHelper>>,
    curve: Option<Arc<BootstrappedCurve>>,
    previous: Option<Vec<f64>>,
}

impl PiecewiseCurve {
    /// Registers a new curve in the session.
    ///
    /// Helpers are sorted by pillar. Nothing is solved until the curve is
    /// first requested.
    ///
    /// # Errors
    ///
    /// Fails for an invalid configuration, an empty helper set, shared
    /// pillars or too few helpers for the bootstrap or interpolation.
    pub fn new(
        session: &mut Session,
        label: impl Into<String>,
        config: CurveBuildConfig,
        mut helpers: Vec<Box<dyn BootstrapHelper>>,
    ) -> CurveResult<Self> {
        let label = label.into();
        config.validate()?;
        sort_helpers(&mut helpers);
        check_helpers(&helpers)?;

        let required = config
            .bootstrap
            .required_helpers()
            .max(config.interpolation.required_points().saturating_sub(1));
        if helpers.len() < required {
            return Err(CurveError::insufficient_instruments(required, helpers.len()));
        }

        let node = session.graph_mut().add_lazy(label.clone());
        let evaluation_date = session.evaluation_date_node();
        session.graph_mut().register_with(node, evaluation_date)?;
        for helper in &helpers {
            session.graph_mut().register_with(node, helper.quote())?;
        }
        tracing::debug!(
            curve = %label,
            helpers = helpers.len(),
            kind = %config.kind,
            interpolation = %config.interpolation,
            "piecewise curve registered"
        );

        Ok(Self {
            node,
            label,
            bootstrap: config.bootstrap.build(),
            config,
            helpers,
            curve: None,
            previous: None,
        })
    }

    /// The bootstrapped curve, solving it first if stale.
    ///
    /// A frozen curve returns its last result without solving.
    ///
    /// # Errors
    ///
    /// Returns the bootstrap failure, or `NotCalculated` when the curve was
    /// frozen before it was ever solved.
    pub fn curve(&mut self, session: &mut Session) -> CurveResult<Arc<BootstrappedCurve>> {
        self.calculate(session)?;
        self.curve.clone().ok_or_else(|| CurveError::NotCalculated {
            label: self.label.clone(),
        })
    }

    /// Helpers sorted by pillar.
    #[must_use]
    pub fn helpers(&self) -> &[Box<dyn BootstrapHelper>] {
        &self.helpers
    }

    /// Pillar dates in node order.
    #[must_use]
    pub fn pillar_dates(&self) -> Vec<Date> {
        self.helpers.iter().map(|h| h.pillar_date()).collect()
    }

    /// Build configuration.
    #[must_use]
    pub fn config(&self) -> &CurveBuildConfig {
        &self.config
    }

    /// Curve label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Removes the curve's node from the session.
    ///
    /// # Errors
    ///
    /// Fails if the node is already gone.
    pub fn dispose(self, session: &mut Session) -> CurveResult<()> {
        session.graph_mut().dispose(self.node)?;
        tracing::debug!(curve = %self.label, "piecewise curve disposed");
        Ok(())
    }

    fn read_quotes(&self, session: &Session) -> CurveResult<Vec<f64>> {
        self.helpers
            .iter()
            .enumerate()
            .map(|(index, helper)| {
                session
                    .quote_value(helper.quote())
                    .map_err(|e| CurveError::InvalidQuote {
                        index,
                        pillar: helper.pillar_date(),
                        reason: e.to_string(),
                    })
            })
            .collect()
    }

    fn build(&mut self, session: &Session) -> CurveResult<BootstrappedCurve> {
        let quotes = self.read_quotes(session)?;
        let pillars = self.pillar_dates();
        // a local bootstrap starts every window from guesses
        let previous = match self.config.bootstrap {
            BootstrapMethod::Iterative(_) => self.previous.as_deref(),
            BootstrapMethod::Local(_) => None,
        };
        let mut curve = CurveUnderConstruction::new(
            self.config.kind,
            self.config.interpolation,
            session.evaluation_date(),
            self.config.day_count,
            &pillars,
            previous,
        )?;

        for helper in &mut self.helpers {
            helper.set_term_structure(&curve)?;
        }
        self.bootstrap.bootstrap(&mut curve, &self.helpers, &quotes)?;
        let errors = quote_errors(&curve, &self.helpers, &quotes)?;
        curve.finish(errors)
    }
}

impl LazyObject for PiecewiseCurve {
    type Error = CurveError;

    fn node(&self) -> NodeId {
        self.node
    }

    fn perform_calculations(&mut self, session: &mut Session) -> CurveResult<()> {
        match self.build(session) {
            Ok(curve) => {
                tracing::debug!(
                    curve = %self.label,
                    reference = %session.evaluation_date(),
                    nodes = curve.values().len(),
                    max_error = curve.max_quote_error(),
                    "curve bootstrapped"
                );
                self.previous = Some(curve.values().to_vec());
                self.curve = Some(Arc::new(curve));
                Ok(())
            }
            Err(err) => {
                tracing::warn!(curve = %self.label, error = %err, "bootstrap failed");
                self.curve = None;
                self.previous = None;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::{CurveKind, LocalBootstrapConfig};
    use crate::helpers::ZeroRateHelper;
    use crate::traits::Curve;
    use approx::assert_relative_eq;
    use strata_core::SessionConfig;

    fn today() -> Date {
        Date::from_ymd(2025, 1, 2).unwrap()
    }

    fn zero_helpers(
        session: &mut Session,
        rates: &[(i32, f64)],
    ) -> (Vec<NodeId>, Vec<Box<dyn BootstrapHelper>>) {
        rates
            .iter()
            .map(|&(years, rate)| {
                let quote = session.new_quote(format!("{years}Y"), rate);
                let helper = ZeroRateHelper::new(quote, today().add_years(years).unwrap());
                (quote, Box::new(helper) as Box<dyn BootstrapHelper>)
            })
            .unzip()
    }

    #[test]
    fn test_solves_on_first_request() {
        let mut session = Session::new(SessionConfig::new(today()));
        let (_, helpers) = zero_helpers(&mut session, &[(1, 0.03), (2, 0.032)]);
        let mut curve =
            PiecewiseCurve::new(&mut session, "zero", CurveBuildConfig::default(), helpers).unwrap();
        assert!(!curve.is_calculated(&session));

        let built = curve.curve(&mut session).unwrap();
        assert!(curve.is_calculated(&session));
        assert_eq!(built.dates()[0], today());
        let t = built.time_from_reference(today().add_years(2).unwrap());
        assert_relative_eq!(built.zero_rate(t).unwrap(), 0.032, epsilon = 1e-12);

        // cached: same allocation
        let again = curve.curve(&mut session).unwrap();
        assert!(Arc::ptr_eq(&built, &again));
    }

    #[test]
    fn test_quote_change_invalidates() {
        let mut session = Session::new(SessionConfig::new(today()));
        let (quotes, helpers) = zero_helpers(&mut session, &[(1, 0.03), (2, 0.032)]);
        let mut curve =
            PiecewiseCurve::new(&mut session, "zero", CurveBuildConfig::default(), helpers).unwrap();
        curve.curve(&mut session).unwrap();

        session.set_quote(quotes[1], 0.04).unwrap();
        assert!(!curve.is_calculated(&session));
        let built = curve.curve(&mut session).unwrap();
        let t = built.times()[2];
        assert_relative_eq!(built.zero_rate(t).unwrap(), 0.04, epsilon = 1e-12);
    }

    #[test]
    fn test_helpers_sorted_on_construction() {
        let mut session = Session::new(SessionConfig::new(today()));
        let (_, helpers) = zero_helpers(&mut session, &[(5, 0.035), (1, 0.03), (2, 0.032)]);
        let curve =
            PiecewiseCurve::new(&mut session, "zero", CurveBuildConfig::default(), helpers).unwrap();
        let years: Vec<i32> = curve.pillar_dates().iter().map(Date::year).collect();
        assert_eq!(years, vec![2026, 2027, 2030]);
    }

    #[test]
    fn test_local_needs_enough_helpers() {
        let mut session = Session::new(SessionConfig::new(today()));
        let (_, helpers) = zero_helpers(&mut session, &[(1, 0.03)]);
        let config = CurveBuildConfig::new(CurveKind::ZeroYield)
            .with_local(LocalBootstrapConfig::default().with_localisation(2));
        let err = PiecewiseCurve::new(&mut session, "zero", config, helpers).unwrap_err();
        assert_eq!(err, CurveError::insufficient_instruments(2, 1));
    }

    #[test]
    fn test_convex_monotone_discount_rejected_before_registering() {
        let mut session = Session::new(SessionConfig::new(today()));
        let (quotes, helpers) = zero_helpers(&mut session, &[(1, 0.01), (3, 0.015), (5, 0.02)]);
        let config = CurveBuildConfig::new(CurveKind::Discount)
            .with_interpolation(crate::interpolation::InterpolationMethod::convex_monotone());
        let err = PiecewiseCurve::new(&mut session, "zero", config, helpers).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(session.graph().observers_of(quotes[0]).is_empty());
    }

    #[test]
    fn test_unset_quote_then_retry() {
        let mut session = Session::new(SessionConfig::new(today()));
        let (mut quotes, mut helpers) = zero_helpers(&mut session, &[(1, 0.03)]);
        let pending = session.new_unset_quote("2Y");
        quotes.push(pending);
        helpers.push(Box::new(ZeroRateHelper::new(
            pending,
            today().add_years(2).unwrap(),
        )));
        let mut curve =
            PiecewiseCurve::new(&mut session, "zero", CurveBuildConfig::default(), helpers).unwrap();

        let err = curve.curve(&mut session).unwrap_err();
        assert!(matches!(err, CurveError::InvalidQuote { index: 1, .. }));
        assert!(!curve.is_calculated(&session));

        session.set_quote(pending, 0.031).unwrap();
        assert!(curve.curve(&mut session).is_ok());
    }

    #[test]
    fn test_dispose_removes_node() {
        let mut session = Session::new(SessionConfig::new(today()));
        let (quotes, helpers) = zero_helpers(&mut session, &[(1, 0.03)]);
        let curve =
            PiecewiseCurve::new(&mut session, "zero", CurveBuildConfig::default(), helpers).unwrap();
        let node = curve.node();
        curve.dispose(&mut session).unwrap();
        assert!(!session.graph().contains(node));
        assert!(session.graph().observers_of(quotes[0]).is_empty());
        // quotes keep working without the curve
        session.set_quote(quotes[0], 0.05).unwrap();
    }
}
