//! Domain types shared by the Strata crates.
//!
//! - [`Date`]: Calendar date for curve nodes and evaluation dates
//! - [`Period`]: Market tenor such as `3M` or `10Y`

mod date;
mod period;

pub use date::Date;
pub use period::{Period, TimeUnit};
