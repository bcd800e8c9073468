//! Money market deposit helper.

use strata_core::daycounts::DayCountConvention;
use strata_core::patterns::NodeId;
use strata_core::types::{Date, Period};

use super::{check_after_reference, unbound, BootstrapHelper, HelperKind};
use crate::error::{CurveError, CurveResult};
use crate::traits::Curve;

/// A deposit quoted as a simple rate.
///
/// # Pricing Formula
///
/// ```text
/// rate = (DF(start) / DF(end) - 1) / τ
/// ```
///
/// where τ is the ACT/360 year fraction of the deposit period.
#[derive(Debug, Clone)]
pub struct DepositRateHelper {
    quote: NodeId,
    start_date: Date,
    end_date: Date,
    day_count: DayCountConvention,
    /// Curve times of start and end, once bound.
    times: Option<(f64, f64)>,
}

impl DepositRateHelper {
    /// Creates a deposit from `start_date` to `end_date`.
    ///
    /// # Errors
    ///
    /// Returns an error if the deposit period is empty.
    pub fn new(quote: NodeId, start_date: Date, end_date: Date) -> CurveResult<Self> {
        if end_date <= start_date {
            return Err(CurveError::invalid_config(format!(
                "deposit ends on {end_date}, not after its start {start_date}"
            )));
        }
        Ok(Self {
            quote,
            start_date,
            end_date,
            day_count: DayCountConvention::Act360,
            times: None,
        })
    }

    /// Creates a deposit running `tenor` from `start_date`.
    pub fn from_tenor(quote: NodeId, start_date: Date, tenor: Period) -> CurveResult<Self> {
        Self::new(quote, start_date, start_date.advance(tenor)?)
    }

    /// Sets the accrual day count (ACT/360 by default).
    #[must_use]
    pub fn with_day_count(mut self, day_count: DayCountConvention) -> Self {
        self.day_count = day_count;
        self
    }

    /// Returns the start date.
    #[must_use]
    pub fn start_date(&self) -> Date {
        self.start_date
    }

    /// Returns the end date.
    #[must_use]
    pub fn end_date(&self) -> Date {
        self.end_date
    }

    fn accrual(&self) -> f64 {
        self.day_count.year_fraction(self.start_date, self.end_date)
    }
}

impl BootstrapHelper for DepositRateHelper {
    fn kind(&self) -> HelperKind {
        HelperKind::Deposit
    }

    fn quote(&self) -> NodeId {
        self.quote
    }

    fn earliest_date(&self) -> Date {
        self.start_date
    }

    fn pillar_date(&self) -> Date {
        self.end_date
    }

    fn set_term_structure(&mut self, curve: &dyn Curve) -> CurveResult<()> {
        let t1 = check_after_reference(self.kind(), self.start_date, curve)?;
        let t2 = check_after_reference(self.kind(), self.end_date, curve)?;
        self.times = Some((t1, t2));
        Ok(())
    }

    fn implied_quote(&self, curve: &dyn Curve) -> CurveResult<f64> {
        let (t1, t2) = self
            .times
            .ok_or_else(|| unbound(self.kind(), self.end_date))?;
        let df_start = curve.discount_factor(t1)?;
        let df_end = curve.discount_factor(t2)?;
        Ok((df_start / df_end - 1.0) / self.accrual())
    }
}
