//! Par swap rate helper.

use strata_core::daycounts::DayCountConvention;
use strata_core::patterns::NodeId;
use strata_core::types::{Date, Period};

use super::{check_after_reference, unbound, BootstrapHelper, HelperKind};
use crate::error::{CurveError, CurveResult};
use crate::traits::Curve;

/// A fixed/floating swap quoted at its par rate, priced on a single curve.
///
/// # Pricing
///
/// ```text
/// Float Leg PV: DF(T0) - DF(Tn)  (telescoping)
/// Fixed Leg PV: c × Σ τi × DF(Ti)
/// Par rate:     (DF(T0) - DF(Tn)) / Σ τi × DF(Ti)
/// ```
#[derive(Debug, Clone)]
pub struct SwapRateHelper {
    quote: NodeId,
    start_date: Date,
    maturity: Date,
    fixed_period: Period,
    day_count: DayCountConvention,
    /// Fixed leg payment dates, ending at maturity.
    payment_dates: Vec<Date>,
    /// Start time, then (accrual, payment time) per fixed period, once bound.
    times: Option<(f64, Vec<(f64, f64)>)>,
}

impl SwapRateHelper {
    /// Creates a swap from `start_date` to `maturity` paying fixed every
    /// `fixed_period`.
    ///
    /// Payment dates roll forward from the start; a short final period
    /// ends at maturity.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty swap or a non-positive fixed period.
    pub fn new(
        quote: NodeId,
        start_date: Date,
        maturity: Date,
        fixed_period: Period,
    ) -> CurveResult<Self> {
        if maturity <= start_date {
            return Err(CurveError::invalid_config(format!(
                "swap matures on {maturity}, not after its start {start_date}"
            )));
        }
        if fixed_period.length() <= 0 {
            return Err(CurveError::invalid_config(format!(
                "fixed leg period must be positive, got {fixed_period}"
            )));
        }
        let payment_dates = fixed_schedule(start_date, maturity, fixed_period)?;
        Ok(Self {
            quote,
            start_date,
            maturity,
            fixed_period,
            day_count: DayCountConvention::Act365Fixed,
            payment_dates,
            times: None,
        })
    }

    /// Creates a swap running `tenor` from `start_date`.
    pub fn from_tenor(
        quote: NodeId,
        start_date: Date,
        tenor: Period,
        fixed_period: Period,
    ) -> CurveResult<Self> {
        Self::new(quote, start_date, start_date.advance(tenor)?, fixed_period)
    }

    /// Sets the fixed leg day count (ACT/365F by default).
    #[must_use]
    pub fn with_day_count(mut self, day_count: DayCountConvention) -> Self {
        self.day_count = day_count;
        self
    }

    /// Returns the maturity.
    #[must_use]
    pub fn maturity(&self) -> Date {
        self.maturity
    }

    /// Returns the fixed leg period.
    #[must_use]
    pub fn fixed_period(&self) -> Period {
        self.fixed_period
    }

    /// Fixed leg payment dates.
    #[must_use]
    pub fn payment_dates(&self) -> &[Date] {
        &self.payment_dates
    }
}

fn fixed_schedule(start: Date, maturity: Date, period: Period) -> CurveResult<Vec<Date>> {
    let mut dates = Vec::new();
    for k in 1.. {
        let date = start.advance(Period::new(period.length() * k, period.unit()))?;
        if date >= maturity {
            break;
        }
        dates.push(date);
    }
    dates.push(maturity);
    Ok(dates)
}

impl BootstrapHelper for SwapRateHelper {
    fn kind(&self) -> HelperKind {
        HelperKind::Swap
    }

    fn quote(&self) -> NodeId {
        self.quote
    }

    fn earliest_date(&self) -> Date {
        self.start_date
    }

    fn pillar_date(&self) -> Date {
        self.maturity
    }

    fn set_term_structure(&mut self, curve: &dyn Curve) -> CurveResult<()> {
        let t0 = check_after_reference(self.kind(), self.start_date, curve)?;
        let mut previous = self.start_date;
        let mut periods = Vec::with_capacity(self.payment_dates.len());
        for &date in &self.payment_dates {
            let accrual = self.day_count.year_fraction(previous, date);
            periods.push((accrual, check_after_reference(self.kind(), date, curve)?));
            previous = date;
        }
        self.times = Some((t0, periods));
        Ok(())
    }

    fn implied_quote(&self, curve: &dyn Curve) -> CurveResult<f64> {
        let (t0, periods) = self
            .times
            .as_ref()
            .ok_or_else(|| unbound(self.kind(), self.maturity))?;

        let mut annuity = 0.0;
        let mut df_end = 1.0;
        for &(accrual, t) in periods {
            df_end = curve.discount_factor(t)?;
            annuity += accrual * df_end;
        }
        if annuity <= 0.0 {
            return Err(CurveError::invalid_value(format!(
                "swap to {} has non-positive annuity {annuity}",
                self.maturity
            )));
        }
        Ok((curve.discount_factor(*t0)? - df_end) / annuity)
    }
}
