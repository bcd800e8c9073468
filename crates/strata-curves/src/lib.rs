//! # Strata Curves
//!
//! Piecewise yield and default curves bootstrapped from market quotes.
//!
//! This crate provides:
//!
//! - **Curve Trait**: Core [`Curve`] trait for discount, zero and forward queries
//! - **Helpers**: Deposits, par swaps and zero rates tying quotes to nodes
//! - **Bootstrap**: Iterative root search and windowed least-squares fitting
//! - **Curve Kinds**: Discount, zero yield, forward, survival, hazard and
//!   default density nodes
//! - **Piecewise Curves**: Lazy curves rebuilt when a quote or the
//!   evaluation date changes
//!
//! ## Quick Start
//!
//! ```rust
//! use strata_core::prelude::*;
//! use strata_curves::prelude::*;
//!
//! let today = Date::from_ymd(2025, 1, 2).unwrap();
//! let mut session = Session::new(SessionConfig::new(today));
//!
//! let deposit = session.new_quote("6M", 0.030);
//! let swap = session.new_quote("5Y", 0.034);
//! let helpers: Vec<Box<dyn BootstrapHelper>> = vec![
//!     Box::new(DepositRateHelper::from_tenor(deposit, today, Period::months(6)).unwrap()),
//!     Box::new(
//!         SwapRateHelper::from_tenor(swap, today, Period::years(5), Period::years(1)).unwrap(),
//!     ),
//! ];
//!
//! let mut curve =
//!     PiecewiseCurve::new(&mut session, "USD", CurveBuildConfig::default(), helpers).unwrap();
//! let df = curve.curve(&mut session).unwrap().discount_factor(2.0).unwrap();
//! assert!(df > 0.9 && df < 1.0);
//!
//! // quote changes only mark the curve stale
//! session.set_quote(swap, 0.036).unwrap();
//! assert!(!curve.is_calculated(&session));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::similar_names)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::float_cmp)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::uninlined_format_args)]

pub mod bootstrap;
pub mod config;
pub mod curve;
pub mod error;
pub mod helpers;
pub mod interpolation;
pub mod piecewise;
pub mod traits;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bootstrap::{
        Bootstrap, BootstrapTraits, CurveKind, IterativeBootstrap, IterativeBootstrapConfig,
        LocalBootstrap, LocalBootstrapConfig,
    };
    pub use crate::config::{BootstrapMethod, CurveBuildConfig};
    pub use crate::curve::{BootstrappedCurve, CurveUnderConstruction};
    pub use crate::error::{CurveError, CurveResult};
    pub use crate::helpers::{
        BootstrapHelper, DepositRateHelper, HelperKind, SwapRateHelper, ZeroRateHelper,
    };
    pub use crate::interpolation::InterpolationMethod;
    pub use crate::piecewise::PiecewiseCurve;
    pub use crate::traits::Curve;
}

pub use config::CurveBuildConfig;
pub use curve::BootstrappedCurve;
pub use error::{CurveError, CurveResult};
pub use piecewise::PiecewiseCurve;
pub use traits::Curve;
