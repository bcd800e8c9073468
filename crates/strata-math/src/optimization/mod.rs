//! Least-squares optimization.
//!
//! [`levenberg_marquardt`] minimizes `½‖r(x)‖²` for a residual function
//! `r`, optionally keeping `x` inside a [`Constraint`]. When to stop is
//! decided by [`EndCriteria`], and the reason for stopping is reported as an
//! [`EndCriteriaType`] so that callers can tell a converged fit from an
//! exhausted budget.

mod levenberg_marquardt;

pub use levenberg_marquardt::{levenberg_marquardt, LevenbergMarquardtConfig};

/// Stopping rules for iterative optimizers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndCriteria {
    /// Maximum number of iterations.
    pub max_iterations: u32,
    /// Maximum number of consecutive iterations without improvement.
    pub max_stationary_iterations: u32,
    /// Stop once every residual is within this of zero.
    pub function_epsilon: f64,
    /// Stop once an accepted step moves no coordinate by more than this,
    /// relative to the coordinate's size.
    pub root_epsilon: f64,
    /// Stop once the gradient's largest component falls below this.
    pub gradient_epsilon: f64,
}

impl Default for EndCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            max_stationary_iterations: 10,
            function_epsilon: 1e-12,
            root_epsilon: 1e-14,
            gradient_epsilon: 1e-20,
        }
    }
}

impl EndCriteria {
    /// Creates end criteria with the given budgets and a single accuracy.
    #[must_use]
    pub fn new(max_iterations: u32, max_stationary_iterations: u32, accuracy: f64) -> Self {
        Self {
            max_iterations,
            max_stationary_iterations,
            function_epsilon: accuracy,
            ..Self::default()
        }
    }

    /// Sets the maximum number of iterations.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the maximum number of stationary iterations.
    #[must_use]
    pub fn with_max_stationary_iterations(mut self, max_stationary_iterations: u32) -> Self {
        self.max_stationary_iterations = max_stationary_iterations;
        self
    }

    /// Sets the residual accuracy.
    #[must_use]
    pub fn with_function_epsilon(mut self, function_epsilon: f64) -> Self {
        self.function_epsilon = function_epsilon;
        self
    }

    /// Sets the step accuracy.
    #[must_use]
    pub fn with_root_epsilon(mut self, root_epsilon: f64) -> Self {
        self.root_epsilon = root_epsilon;
        self
    }
}

/// Why an optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndCriteriaType {
    /// Every residual is within the function epsilon.
    FunctionEpsilon,
    /// The gradient vanished.
    ZeroGradient,
    /// The accepted step became negligible.
    StationaryPoint,
    /// The iteration budget ran out.
    MaxIterations,
    /// Too many consecutive iterations without improvement.
    Stagnation,
    /// The residuals or the linear system became unusable.
    NumericalFailure,
}

impl EndCriteriaType {
    /// Whether the stop counts as convergence.
    #[must_use]
    pub fn succeeded(self) -> bool {
        matches!(
            self,
            Self::FunctionEpsilon | Self::ZeroGradient | Self::StationaryPoint
        )
    }
}

/// Feasible region for the parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Constraint {
    /// Any finite point.
    #[default]
    None,
    /// Every coordinate strictly positive.
    Positive,
}

impl Constraint {
    /// Whether `x` lies in the feasible region.
    #[must_use]
    pub fn test(self, x: &[f64]) -> bool {
        match self {
            Self::None => x.iter().all(|v| v.is_finite()),
            Self::Positive => x.iter().all(|v| v.is_finite() && *v > 0.0),
        }
    }
}

/// Result of a least-squares minimization.
#[derive(Debug, Clone)]
pub struct LeastSquaresResult {
    /// Best parameters found.
    pub x: Vec<f64>,
    /// Residuals at `x`.
    pub residuals: Vec<f64>,
    /// `½‖r(x)‖²`.
    pub objective: f64,
    /// Iterations performed.
    pub iterations: u32,
    /// Residual function evaluations.
    pub evaluations: u32,
    /// Why the optimizer stopped.
    pub end_type: EndCriteriaType,
}

impl LeastSquaresResult {
    /// Whether the optimizer converged.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.end_type.succeeded()
    }

    /// Largest absolute residual.
    #[must_use]
    pub fn max_residual(&self) -> f64 {
        self.residuals.iter().fold(0.0_f64, |m, r| m.max(r.abs()))
    }
}
