//! Day count conventions for curve time measurement.
//!
//! A curve converts node dates into times with a day count; helpers use
//! their own day counts for accrual.
//!
//! - [`Act360`]: Actual/360, money market convention
//! - [`Act365Fixed`]: Actual/365 Fixed, the usual curve time basis
//!
//! ```rust
//! use strata_core::daycounts::{DayCount, Act365Fixed};
//! use strata_core::types::Date;
//!
//! let start = Date::from_ymd(2025, 1, 1).unwrap();
//! let end = Date::from_ymd(2026, 1, 1).unwrap();
//! assert_eq!(Act365Fixed.year_fraction_f64(start, end), 1.0);
//! ```

mod act360;
mod act365;

pub use act360::Act360;
pub use act365::Act365Fixed;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::StrataError;
use crate::types::Date;

/// Trait for day count conventions.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait DayCount: Send + Sync {
    /// Returns the name of the day count convention (e.g. "ACT/360").
    fn name(&self) -> &'static str;

    /// Calculates the year fraction between two dates.
    ///
    /// Negative if `end` is before `start`.
    fn year_fraction(&self, start: Date, end: Date) -> Decimal;

    /// Calculates the day count between two dates.
    fn day_count(&self, start: Date, end: Date) -> i64;

    /// Year fraction as `f64`, the representation curve times use.
    fn year_fraction_f64(&self, start: Date, end: Date) -> f64 {
        self.year_fraction(start, end).to_f64().unwrap_or(0.0)
    }
}

/// Runtime selection of a day count convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DayCountConvention {
    /// Actual/360.
    Act360,

    /// Actual/365 Fixed.
    #[default]
    Act365Fixed,
}

impl DayCountConvention {
    /// Creates a boxed day count implementation.
    #[must_use]
    pub fn to_day_count(&self) -> Box<dyn DayCount> {
        match self {
            DayCountConvention::Act360 => Box::new(Act360),
            DayCountConvention::Act365Fixed => Box::new(Act365Fixed),
        }
    }

    /// Returns the conventional name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            DayCountConvention::Act360 => "ACT/360",
            DayCountConvention::Act365Fixed => "ACT/365F",
        }
    }

    /// Year fraction as `f64` without boxing.
    #[must_use]
    pub fn year_fraction(&self, start: Date, end: Date) -> f64 {
        match self {
            DayCountConvention::Act360 => Act360.year_fraction_f64(start, end),
            DayCountConvention::Act365Fixed => Act365Fixed.year_fraction_f64(start, end),
        }
    }
}

impl std::fmt::Display for DayCountConvention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for DayCountConvention {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        match normalized.as_str() {
            "ACT/360" | "ACTUAL/360" | "ACT360" => Ok(DayCountConvention::Act360),
            "ACT/365" | "ACT/365F" | "ACT/365 FIXED" | "ACTUAL/365" | "ACT365FIXED" => {
                Ok(DayCountConvention::Act365Fixed)
            }
            _ => Err(StrataError::config_error(format!(
                "Unknown day count convention: {s}"
            ))),
        }
    }
}
