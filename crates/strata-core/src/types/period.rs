//! Tenor periods ("1W", "3M", "10Y").

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StrataError;

/// Unit of a [`Period`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    /// Calendar days.
    Days,
    /// Weeks of seven days.
    Weeks,
    /// Calendar months (end of month rolls back).
    Months,
    /// Calendar years.
    Years,
}

/// A length of time expressed in whole units.
///
/// Parses market tenor strings, including the overnight shorthands
/// `ON`, `TN` and `SN` (one, two and three days).
///
/// ```rust
/// use strata_core::types::{Period, TimeUnit};
///
/// let p: Period = "18M".parse().unwrap();
/// assert_eq!(p.length(), 18);
/// assert_eq!(p.unit(), TimeUnit::Months);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    length: i32,
    unit: TimeUnit,
}

impl Period {
    /// Creates a period.
    #[must_use]
    pub const fn new(length: i32, unit: TimeUnit) -> Self {
        Self { length, unit }
    }

    /// Creates a period in months.
    #[must_use]
    pub const fn months(length: i32) -> Self {
        Self::new(length, TimeUnit::Months)
    }

    /// Creates a period in years.
    #[must_use]
    pub const fn years(length: i32) -> Self {
        Self::new(length, TimeUnit::Years)
    }

    /// Returns the number of units.
    #[must_use]
    pub const fn length(&self) -> i32 {
        self.length
    }

    /// Returns the unit.
    #[must_use]
    pub const fn unit(&self) -> TimeUnit {
        self.unit
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            TimeUnit::Days => 'D',
            TimeUnit::Weeks => 'W',
            TimeUnit::Months => 'M',
            TimeUnit::Years => 'Y',
        };
        write!(f, "{}{unit}", self.length)
    }
}

impl FromStr for Period {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tenor = s.trim().to_uppercase();

        match tenor.as_str() {
            "ON" | "O/N" => return Ok(Self::new(1, TimeUnit::Days)),
            "TN" | "T/N" => return Ok(Self::new(2, TimeUnit::Days)),
            "SN" | "S/N" => return Ok(Self::new(3, TimeUnit::Days)),
            _ => {}
        }

        let Some(last) = tenor.chars().last() else {
            return Err(StrataError::invalid_period("empty tenor"));
        };
        let unit = match last {
            'D' => TimeUnit::Days,
            'W' => TimeUnit::Weeks,
            'M' => TimeUnit::Months,
            'Y' => TimeUnit::Years,
            _ => {
                return Err(StrataError::invalid_period(format!(
                    "Invalid tenor format: {tenor}"
                )))
            }
        };

        let num_str = &tenor[..tenor.len() - 1];
        let length: i32 = num_str
            .parse()
            .map_err(|_| StrataError::invalid_period(format!("Invalid tenor number: {num_str}")))?;

        Ok(Self::new(length, unit))
    }
}
