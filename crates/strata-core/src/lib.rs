//! # Strata Core
//!
//! Core types and the change-notification machinery of the Strata term
//! structure library.
//!
//! - **Types**: `Date` and `Period` for node dates and tenors
//! - **Day Count Conventions**: Curve time and accrual fractions
//! - **Patterns**: Observer graph and lazily recalculated objects
//! - **Session**: Evaluation date, quotes and policies for one context
//!
//! ## Example
//!
//! ```rust
//! use strata_core::prelude::*;
//!
//! let mut session = Session::new(SessionConfig::new(Date::from_ymd(2025, 1, 2).unwrap()));
//! let quote = session.new_quote("USD.DEPO.3M", 0.0425);
//! let curve = session.graph_mut().add_lazy("USD.CURVE");
//! session.graph_mut().register_with(curve, quote).unwrap();
//!
//! assert_eq!(session.graph().observers_of(quote), vec![curve]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::float_cmp)]

pub mod daycounts;
pub mod error;
pub mod patterns;
pub mod session;
pub mod types;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::daycounts::{DayCount, DayCountConvention};
    pub use crate::error::{GraphError, GraphResult, StrataError, StrataResult};
    pub use crate::patterns::{
        ForwardingPolicy, LazyObject, NodeId, ObserverGraph, ReentrancyPolicy, UpdateContext,
    };
    pub use crate::session::{Session, SessionConfig};
    pub use crate::types::{Date, Period, TimeUnit};
}

// Re-export commonly used types at crate root
pub use error::{GraphError, StrataError, StrataResult};
pub use session::{Session, SessionConfig};
pub use types::Date;
