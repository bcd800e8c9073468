//! Bootstrap helpers.
//!
//! A helper ties one market quote to the curve: given a curve it reports
//! the quote that curve implies, and the bootstrap moves the helper's node
//! until the two agree. Each helper owns one node, placed at its pillar
//! date.
//!
//! # Available Helpers
//!
//! - [`DepositRateHelper`]: Simple money market rate (ACT/360)
//! - [`SwapRateHelper`]: Par rate of a single-curve fixed/floating swap
//! - [`ZeroRateHelper`]: Continuously compounded zero rate to the pillar
//!
//! Helpers price against the [`Curve`] trait only, so they work with every
//! [`CurveKind`](crate::bootstrap::CurveKind). On default curves a
//! [`ZeroRateHelper`] quotes the average hazard rate to its pillar.

mod deposit;
mod swap;
mod zero_rate;

pub use deposit::DepositRateHelper;
pub use swap::SwapRateHelper;
pub use zero_rate::ZeroRateHelper;

use std::fmt;

use serde::{Deserialize, Serialize};
use strata_core::patterns::NodeId;
use strata_core::types::Date;

use crate::error::{CurveError, CurveResult};
use crate::traits::Curve;

/// Helper type for categorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelperKind {
    /// Money market deposit.
    Deposit,
    /// Fixed/floating swap.
    Swap,
    /// Zero rate.
    ZeroRate,
}

impl fmt::Display for HelperKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deposit => write!(f, "Deposit"),
            Self::Swap => write!(f, "Swap"),
            Self::ZeroRate => write!(f, "Zero"),
        }
    }
}

/// An instrument whose quote pins one curve node.
///
/// # Required Methods
///
/// - [`quote`](BootstrapHelper::quote): The quote node feeding the helper
/// - [`earliest_date`](BootstrapHelper::earliest_date),
///   [`pillar_date`](BootstrapHelper::pillar_date): Dates the helper
///   depends on; the node sits at the pillar
/// - [`set_term_structure`](BootstrapHelper::set_term_structure): Prepares
///   the helper for a curve, before any
///   [`implied_quote`](BootstrapHelper::implied_quote)
pub trait BootstrapHelper: fmt::Debug + Send + Sync {
    /// Helper type.
    fn kind(&self) -> HelperKind;

    /// The quote node.
    fn quote(&self) -> NodeId;

    /// First date the helper needs from the curve.
    fn earliest_date(&self) -> Date;

    /// Date of the node this helper determines.
    fn pillar_date(&self) -> Date;

    /// Last date the helper needs from the curve.
    fn latest_date(&self) -> Date {
        self.pillar_date()
    }

    /// Binds the helper to the curve being built, converting its dates into
    /// curve times.
    fn set_term_structure(&mut self, curve: &dyn Curve) -> CurveResult<()>;

    /// The quote implied by `curve`.
    ///
    /// # Errors
    ///
    /// Fails before [`set_term_structure`](BootstrapHelper::set_term_structure)
    /// and when the curve cannot be evaluated.
    fn implied_quote(&self, curve: &dyn Curve) -> CurveResult<f64>;

    /// Market quote minus the implied quote.
    fn quote_error(&self, quote: f64, curve: &dyn Curve) -> CurveResult<f64> {
        Ok(quote - self.implied_quote(curve)?)
    }
}

pub(crate) fn unbound(kind: HelperKind, pillar: Date) -> CurveError {
    CurveError::invalid_config(format!(
        "{kind} helper with pillar {pillar} is not bound to a curve"
    ))
}

/// Checks that a helper's dates are not before the curve's reference date.
pub(crate) fn check_after_reference(
    kind: HelperKind,
    date: Date,
    curve: &dyn Curve,
) -> CurveResult<f64> {
    let reference = curve.reference_date();
    if date < reference {
        return Err(CurveError::invalid_config(format!(
            "{kind} helper date {date} is before the reference date {reference}"
        )));
    }
    Ok(curve.time_from_reference(date))
}
