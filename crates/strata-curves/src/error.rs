//! Error types for curve construction.
//!
//! Variants follow the bootstrap failure taxonomy: configuration errors are
//! raised before any solving, data errors when quotes are read, and
//! convergence errors while solving. All of them are fatal to one
//! calculation only; the curve retries on its next use.

use strata_core::types::Date;
use strata_core::{GraphError, StrataError};
use strata_math::MathError;
use thiserror::Error;

/// A specialized Result type for curve operations.
pub type CurveResult<T> = Result<T, CurveError>;

/// Error types for curve operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CurveError {
    /// No helpers were supplied.
    #[error("Cannot bootstrap a curve without helpers")]
    EmptyHelperSet,

    /// Two helpers share a pillar date.
    #[error("Helpers {first} and {second} share the pillar date {pillar}")]
    DuplicatePillar {
        /// The shared pillar date.
        pillar: Date,
        /// Index of the first helper after sorting.
        first: usize,
        /// Index of the second helper after sorting.
        second: usize,
    },

    /// Too few helpers for the bootstrap or the interpolation.
    #[error("Insufficient instruments: need at least {required}, got {got}")]
    InsufficientInstruments {
        /// Minimum number of helpers.
        required: usize,
        /// Number supplied.
        got: usize,
    },

    /// Inconsistent configuration.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the problem.
        reason: String,
    },

    /// A helper quote is unset or not finite.
    #[error("Helper {index} (pillar {pillar}) has an invalid quote: {reason}")]
    InvalidQuote {
        /// Index of the helper after sorting.
        index: usize,
        /// Pillar date of the helper.
        pillar: Date,
        /// Why the quote was rejected.
        reason: String,
    },

    /// A curve query could not be answered.
    #[error("Invalid value: {reason}")]
    InvalidValue {
        /// Description of why the value is invalid.
        reason: String,
    },

    /// The root search for one node failed.
    #[error(
        "Iteration {iteration}: failed at helper {helper} (pillar {pillar}): {cause}"
    )]
    BootstrapFailure {
        /// Sweep over the nodes, starting at 1.
        iteration: usize,
        /// Index of the helper whose node could not be solved.
        helper: usize,
        /// Pillar date of that helper.
        pillar: Date,
        /// The underlying failure.
        #[source]
        cause: Box<CurveError>,
    },

    /// Repeated sweeps of a global interpolation did not settle.
    #[error(
        "Convergence not reached after {iterations} iterations; last change {change:.2e}, required accuracy {accuracy:.2e}"
    )]
    NotConverged {
        /// Sweeps performed.
        iterations: usize,
        /// Largest node change in the last sweep.
        change: f64,
        /// Required accuracy.
        accuracy: f64,
    },

    /// The least-squares fit of one window failed.
    #[error("Unable to fit nodes {first_node}..={last_node} to the required accuracy: {reason}")]
    LocalBootstrapFailure {
        /// First node of the window.
        first_node: usize,
        /// Last node of the window.
        last_node: usize,
        /// Solver outcome.
        reason: String,
    },

    /// The curve has not been calculated, e.g. frozen before first use.
    #[error("Curve '{label}' has not been calculated")]
    NotCalculated {
        /// Label of the curve node.
        label: String,
    },

    /// Numerical failure.
    #[error(transparent)]
    Math(#[from] MathError),

    /// Notification graph failure.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Date or configuration failure from the core crate.
    #[error(transparent)]
    Core(#[from] StrataError),
}

impl CurveError {
    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid_value(reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            reason: reason.into(),
        }
    }

    /// Creates an insufficient instruments error.
    #[must_use]
    pub fn insufficient_instruments(required: usize, got: usize) -> Self {
        Self::InsufficientInstruments { required, got }
    }

    /// Creates a bootstrap failure wrapping its cause.
    #[must_use]
    pub fn bootstrap_failure(iteration: usize, helper: usize, pillar: Date, cause: CurveError) -> Self {
        Self::BootstrapFailure {
            iteration,
            helper,
            pillar,
            cause: Box::new(cause),
        }
    }

    /// Creates a local bootstrap failure.
    #[must_use]
    pub fn local_failure(first_node: usize, last_node: usize, reason: impl Into<String>) -> Self {
        Self::LocalBootstrapFailure {
            first_node,
            last_node,
            reason: reason.into(),
        }
    }

    /// Whether the error was raised before any solving.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyHelperSet
                | Self::DuplicatePillar { .. }
                | Self::InsufficientInstruments { .. }
                | Self::InvalidConfig { .. }
        )
    }

    /// Whether the error comes from a solver failing to converge.
    #[must_use]
    pub fn is_convergence_error(&self) -> bool {
        matches!(
            self,
            Self::BootstrapFailure { .. } | Self::NotConverged { .. } | Self::LocalBootstrapFailure { .. }
        )
    }
}
