//! # Strata Math
//!
//! Numerical building blocks for curve construction.
//!
//! - **Solvers**: Bracketed root finding (Brent)
//! - **Optimization**: Levenberg-Marquardt least squares with constraints
//! - **Interpolation**: Linear, log-linear, backward-flat, natural cubic
//!   spline and convex monotone interpolation, each with value, derivative
//!   and primitive
//!
//! ## Example
//!
//! ```rust
//! use strata_math::prelude::*;
//!
//! let interp = LinearInterpolator::new(vec![0.0, 1.0, 2.0], vec![0.0, 2.0, 2.0]).unwrap();
//! assert_eq!(interp.interpolate(0.5).unwrap(), 1.0);
//! assert_eq!(interp.primitive(2.0).unwrap(), 3.0);
//!
//! let root = brent(|x: f64| x * x - 2.0, 1.0, 2.0, &SolverConfig::default()).unwrap();
//! assert!((root.root - std::f64::consts::SQRT_2).abs() < 1e-10);
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

pub mod error;
pub mod interpolation;
pub mod optimization;
pub mod solvers;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{MathError, MathResult};
    pub use crate::interpolation::{
        BackwardFlatInterpolator, ConvexMonotone, ConvexMonotoneParams, CubicSpline,
        Interpolator, LinearInterpolator, LogLinearInterpolator,
    };
    pub use crate::optimization::{
        levenberg_marquardt, Constraint, EndCriteria, EndCriteriaType, LeastSquaresResult,
        LevenbergMarquardtConfig,
    };
    pub use crate::solvers::{brent, brent_with_guess, SolverConfig, SolverResult};
}

pub use error::{MathError, MathResult};
