//! Interpolation methods for curve construction.
//!
//! # Available Methods
//!
//! - [`LinearInterpolator`]: Straight lines between nodes
//! - [`LogLinearInterpolator`]: Linear in the logarithm (discount factors)
//! - [`BackwardFlatInterpolator`]: Each node's value held over the period
//!   ending at it
//! - [`CubicSpline`]: Natural cubic spline
//! - [`ConvexMonotone`]: Hagan-West convex monotone interpolation of
//!   period-average forwards
//!
//! | Method | Smoothness | Local | Typical node values |
//! |--------|------------|-------|---------------------|
//! | Linear | C0 | Yes | Zero rates, forwards |
//! | Log-Linear | C0 | Yes | Discount factors |
//! | Backward-Flat | None | Yes | Forwards, hazard rates |
//! | Cubic Spline | C2 | No | Zero rates |
//! | Convex Monotone | C1 | No | Forwards |
//!
//! Non-local methods move every segment when one node changes, so a
//! sequential bootstrap over them has to iterate to convergence.
//!
//! Every interpolator provides the value, the first derivative and the
//! primitive (the integral from the first node), which is what forward and
//! hazard curves need to produce discount factors and survival
//! probabilities. Queries outside the node range fail with
//! [`MathError::ExtrapolationNotAllowed`]; curves handle extrapolation
//! themselves.

mod backward_flat;
mod convex_monotone;
mod cubic_spline;
mod linear;
mod log_linear;

pub use backward_flat::BackwardFlatInterpolator;
pub use convex_monotone::{ConvexMonotone, ConvexMonotoneParams, ExistingSections};
pub use cubic_spline::CubicSpline;
pub use linear::LinearInterpolator;
pub use log_linear::LogLinearInterpolator;

use crate::error::{MathError, MathResult};

/// Trait for interpolation methods.
///
/// All interpolation methods implement this trait, providing a unified
/// interface for curve construction.
pub trait Interpolator: Send + Sync {
    /// Returns the interpolated value at x.
    fn interpolate(&self, x: f64) -> MathResult<f64>;

    /// Returns the first derivative at x.
    fn derivative(&self, x: f64) -> MathResult<f64>;

    /// Returns the integral of the interpolant from `min_x()` to x.
    fn primitive(&self, x: f64) -> MathResult<f64>;

    /// Returns the minimum x value in the data.
    fn min_x(&self) -> f64;

    /// Returns the maximum x value in the data.
    fn max_x(&self) -> f64;

    /// Checks if x is within the interpolation range.
    fn in_range(&self, x: f64) -> bool {
        x >= self.min_x() && x <= self.max_x()
    }
}

/// Checks node vectors: equal lengths, enough points, finite values and
/// strictly increasing abscissas.
pub(crate) fn validate_nodes(xs: &[f64], ys: &[f64], required: usize) -> MathResult<()> {
    if xs.len() < required {
        return Err(MathError::insufficient_data(required, xs.len()));
    }
    if xs.len() != ys.len() {
        return Err(MathError::invalid_input(format!(
            "xs and ys must have same length: {} vs {}",
            xs.len(),
            ys.len()
        )));
    }
    if xs.iter().chain(ys).any(|v| !v.is_finite()) {
        return Err(MathError::invalid_input("node values must be finite"));
    }
    if xs.windows(2).any(|w| w[1] <= w[0]) {
        return Err(MathError::invalid_input(
            "x values must be strictly increasing",
        ));
    }
    Ok(())
}

/// Fails unless x lies in `[xs[0], xs[n-1]]`.
pub(crate) fn check_range(xs: &[f64], x: f64) -> MathResult<()> {
    let (min, max) = (xs[0], xs[xs.len() - 1]);
    if x >= min && x <= max {
        Ok(())
    } else {
        Err(MathError::extrapolation(x, min, max))
    }
}

/// Finds the index i such that `xs[i] <= x < xs[i+1]`, clamped to the last
/// segment.
pub(crate) fn find_segment(xs: &[f64], x: f64) -> usize {
    xs.partition_point(|v| *v <= x)
        .saturating_sub(1)
        .min(xs.len() - 2)
}
