//! Root-finding algorithms.
//!
//! - [`brent`]: Inverse quadratic interpolation safeguarded by bisection
//! - [`brent_with_guess`]: Brent inside fixed bounds, starting from a guess
//!
//! All solvers take `FnMut` objectives, so an objective may update state
//! (for example a curve node) on every evaluation. Convergence is measured
//! on the argument: a solver stops when the bracket around the root is
//! narrower than the configured tolerance or the function hits zero.
//!
//! # Example
//!
//! ```rust
//! use strata_math::solvers::{brent, SolverConfig};
//!
//! // Continuously compounded rate matching a discount factor of 0.95 at 2y
//! let f = |r: f64| (-r * 2.0).exp() - 0.95;
//!
//! let result = brent(f, 0.0, 0.2, &SolverConfig::default()).unwrap();
//! assert!((result.root - (-(0.95f64).ln() / 2.0)).abs() < 1e-10);
//! ```

mod brent;

pub use brent::{brent, brent_with_guess};

use crate::error::{MathError, MathResult};

/// Default tolerance for root-finding algorithms.
pub const DEFAULT_TOLERANCE: f64 = 1e-10;

/// Default maximum iterations for root-finding algorithms.
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

/// Configuration for root-finding algorithms.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    /// Accuracy required on the root.
    pub tolerance: f64,
    /// Maximum number of function evaluations.
    pub max_iterations: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl SolverConfig {
    /// Creates a new solver configuration.
    #[must_use]
    pub fn new(tolerance: f64, max_iterations: u32) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }

    /// Sets the tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Sets the maximum iterations.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Result of a root-finding operation.
#[derive(Debug, Clone, Copy)]
pub struct SolverResult {
    /// The root found.
    pub root: f64,
    /// Number of function evaluations used.
    pub iterations: u32,
    /// Function value at the root.
    pub residual: f64,
}

/// Evaluates `f` and rejects non-finite values.
pub(crate) fn evaluate<F>(f: &mut F, x: f64) -> MathResult<f64>
where
    F: FnMut(f64) -> f64,
{
    let value = f(x);
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MathError::NonFiniteValue { x, value })
    }
}
