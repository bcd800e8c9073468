//! Zero rate helper.

use strata_core::patterns::NodeId;
use strata_core::types::Date;

use super::{check_after_reference, unbound, BootstrapHelper, HelperKind};
use crate::error::{CurveError, CurveResult};
use crate::traits::Curve;

/// A continuously compounded zero rate to a maturity.
///
/// ```text
/// rate = -ln DF(T) / T
/// ```
#[derive(Debug, Clone)]
pub struct ZeroRateHelper {
    quote: NodeId,
    maturity: Date,
    time: Option<f64>,
}

impl ZeroRateHelper {
    /// Creates a zero rate helper.
    #[must_use]
    pub fn new(quote: NodeId, maturity: Date) -> Self {
        Self {
            quote,
            maturity,
            time: None,
        }
    }

    /// Returns the maturity.
    #[must_use]
    pub fn maturity(&self) -> Date {
        self.maturity
    }
}

impl BootstrapHelper for ZeroRateHelper {
    fn kind(&self) -> HelperKind {
        HelperKind::ZeroRate
    }

    fn quote(&self) -> NodeId {
        self.quote
    }

    fn earliest_date(&self) -> Date {
        self.maturity
    }

    fn pillar_date(&self) -> Date {
        self.maturity
    }

    fn set_term_structure(&mut self, curve: &dyn Curve) -> CurveResult<()> {
        let t = check_after_reference(self.kind(), self.maturity, curve)?;
        if t <= 0.0 {
            return Err(CurveError::invalid_config(format!(
                "zero rate maturity {} must be after the reference date",
                self.maturity
            )));
        }
        self.time = Some(t);
        Ok(())
    }

    fn implied_quote(&self, curve: &dyn Curve) -> CurveResult<f64> {
        let t = self.time.ok_or_else(|| unbound(self.kind(), self.maturity))?;
        let df = curve.discount_factor(t)?;
        if df <= 0.0 {
            return Err(CurveError::invalid_value(format!(
                "non-positive discount factor {df} at {}",
                self.maturity
            )));
        }
        Ok(-df.ln() / t)
    }
}
