//! Error types for the Strata core crate.
//!
//! Two families live here: [`StrataError`] for dates, day counts, quotes and
//! session configuration, and [`GraphError`] for the notification graph.

use thiserror::Error;

/// A specialized Result type for core operations.
pub type StrataResult<T> = Result<T, StrataError>;

/// A specialized Result type for notification graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// The main error type for core operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrataError {
    /// Error in date calculations or invalid date.
    #[error("Invalid date: {message}")]
    InvalidDate {
        /// Description of the date error.
        message: String,
    },

    /// A tenor string could not be parsed.
    #[error("Invalid period: {message}")]
    InvalidPeriod {
        /// Description of the parse failure.
        message: String,
    },

    /// A quote has no value or holds a non-finite number.
    #[error("Invalid quote {label}: {reason}")]
    InvalidQuote {
        /// Label of the quote node.
        label: String,
        /// Reason for invalidity.
        reason: String,
    },

    /// Configuration error.
    #[error("Configuration error: {reason}")]
    ConfigError {
        /// Description of the configuration error.
        reason: String,
    },

    /// Notification graph failure.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl StrataError {
    /// Creates an invalid date error.
    #[must_use]
    pub fn invalid_date(message: impl Into<String>) -> Self {
        Self::InvalidDate {
            message: message.into(),
        }
    }

    /// Creates an invalid period error.
    #[must_use]
    pub fn invalid_period(message: impl Into<String>) -> Self {
        Self::InvalidPeriod {
            message: message.into(),
        }
    }

    /// Creates an invalid quote error.
    #[must_use]
    pub fn invalid_quote(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidQuote {
            label: label.into(),
            reason: reason.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config_error(reason: impl Into<String>) -> Self {
        Self::ConfigError {
            reason: reason.into(),
        }
    }
}

/// Errors raised by the observer graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The node id does not refer to a live node.
    #[error("Unknown node {id}")]
    UnknownNode {
        /// Display form of the stale or foreign id.
        id: String,
    },

    /// The node cannot receive updates.
    #[error("Node '{label}' is not an observer")]
    NotAnObserver {
        /// Label of the node.
        label: String,
    },

    /// The node is not a quote.
    #[error("Node '{label}' is not a quote")]
    NotAQuote {
        /// Label of the node.
        label: String,
    },

    /// The node carries no lazy state.
    #[error("Node '{label}' is not a lazy object")]
    NotLazy {
        /// Label of the node.
        label: String,
    },

    /// The node was detached and no longer accepts registrations.
    #[error("Node '{label}' has been detached")]
    Detached {
        /// Label of the node.
        label: String,
    },

    /// Release was requested before detaching.
    #[error("Node '{label}' is still attached; detach it before release")]
    StillAttached {
        /// Label of the node.
        label: String,
    },

    /// An update re-entered a node that was already updating.
    #[error("Notification cycle detected at '{label}'")]
    CycleDetected {
        /// Label of the re-entered node.
        label: String,
    },

    /// A custom observer rejected an update.
    #[error("Observer '{label}' failed: {reason}")]
    ObserverFailed {
        /// Label of the failing observer.
        label: String,
        /// Failure description.
        reason: String,
    },

    /// One or more observers failed during a notification pass.
    #[error("Could not notify one or more observers: {}", join_failures(.failures))]
    NotificationFailed {
        /// Individual failures, in delivery order.
        failures: Vec<GraphError>,
    },
}

fn join_failures(failures: &[GraphError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl GraphError {
    /// Creates an observer failure.
    #[must_use]
    pub fn observer_failed(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ObserverFailed {
            label: label.into(),
            reason: reason.into(),
        }
    }
}
