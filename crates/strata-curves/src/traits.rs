//! Core trait for curve queries.
//!
//! [`Curve`] is what bootstrap helpers price against, both while a curve is
//! under construction and once it is bootstrapped. Default curves use the
//! same interface: the "discount factor" of a survival curve is the
//! survival probability and its "forward" is the hazard rate.

use strata_core::daycounts::DayCountConvention;
use strata_core::types::Date;

use crate::error::{CurveError, CurveResult};

/// Times below this are treated as the reference date.
const TIME_EPSILON: f64 = 1.0e-12;

/// The core trait for term structures.
///
/// # Required Methods
///
/// - [`discount_factor`](Curve::discount_factor): Discount factor (or
///   survival probability) at a time
/// - [`instantaneous_forward`](Curve::instantaneous_forward): Instantaneous
///   forward (or hazard) rate at a time
/// - [`reference_date`](Curve::reference_date),
///   [`day_count`](Curve::day_count): Convert dates into curve times
/// - [`max_time`](Curve::max_time): Last node time; queries beyond it are
///   extrapolated with a flat forward
///
/// # Example
///
/// ```rust,ignore
/// use strata_curves::prelude::*;
///
/// fn price_zero_coupon(curve: &dyn Curve, maturity: Date, face_value: f64) -> CurveResult<f64> {
///     Ok(face_value * curve.discount(maturity)?)
/// }
/// ```
pub trait Curve: Send + Sync {
    /// The date at which curve time is zero.
    fn reference_date(&self) -> Date;

    /// Day count converting dates into curve times.
    fn day_count(&self) -> DayCountConvention;

    /// Time of the last node.
    fn max_time(&self) -> f64;

    /// Discount factor from the reference date to time `t`.
    ///
    /// # Errors
    ///
    /// Fails for negative times or when the curve holds no nodes.
    fn discount_factor(&self, t: f64) -> CurveResult<f64>;

    /// Instantaneous forward rate `-d ln P(t) / dt`.
    ///
    /// # Errors
    ///
    /// Fails for negative times or when the curve holds no nodes.
    fn instantaneous_forward(&self, t: f64) -> CurveResult<f64>;

    /// Curve time of a date.
    fn time_from_reference(&self, date: Date) -> f64 {
        self.day_count().year_fraction(self.reference_date(), date)
    }

    /// Discount factor at a date.
    fn discount(&self, date: Date) -> CurveResult<f64> {
        self.discount_factor(self.time_from_reference(date))
    }

    /// Continuously compounded zero rate at time `t`.
    ///
    /// At the reference date this is the instantaneous forward.
    fn zero_rate(&self, t: f64) -> CurveResult<f64> {
        if t < TIME_EPSILON {
            return self.instantaneous_forward(t.max(0.0));
        }
        let df = self.discount_factor(t)?;
        if df <= 0.0 {
            return Err(CurveError::invalid_value(format!(
                "non-positive discount factor {df} at t={t:.4}"
            )));
        }
        Ok(-df.ln() / t)
    }

    /// Simply compounded forward rate between `t1` and `t2`.
    ///
    /// `F(t1, t2) = (DF(t1) / DF(t2) - 1) / (t2 - t1)`
    fn forward_rate(&self, t1: f64, t2: f64) -> CurveResult<f64> {
        if t2 <= t1 {
            return Err(CurveError::invalid_value(format!(
                "forward period [{t1:.4}, {t2:.4}] is empty"
            )));
        }
        let df1 = self.discount_factor(t1)?;
        let df2 = self.discount_factor(t2)?;
        if df2 <= 0.0 {
            return Err(CurveError::invalid_value(format!(
                "non-positive discount factor {df2} at t={t2:.4}"
            )));
        }
        Ok((df1 / df2 - 1.0) / (t2 - t1))
    }
}
