//! Curve build configuration.
//!
//! ```rust
//! use strata_curves::config::{BootstrapMethod, CurveBuildConfig};
//! use strata_curves::bootstrap::CurveKind;
//!
//! let config = CurveBuildConfig::from_json(
//!     r#"{
//!         "kind": "forward_rate",
//!         "interpolation": { "type": "convex_monotone", "quadraticity": 0.3, "monotonicity": 0.7, "force_positive": true },
//!         "bootstrap": { "method": "local", "localisation": 2 }
//!     }"#,
//! )
//! .unwrap();
//! assert_eq!(config.kind, CurveKind::ForwardRate);
//! assert!(matches!(config.bootstrap, BootstrapMethod::Local(_)));
//! ```

use serde::{Deserialize, Serialize};
use strata_core::daycounts::DayCountConvention;

use crate::bootstrap::{
    Bootstrap, CurveKind, IterativeBootstrap, IterativeBootstrapConfig, LocalBootstrap,
    LocalBootstrapConfig,
};
use crate::error::{CurveError, CurveResult};
use crate::interpolation::InterpolationMethod;

/// Which bootstrap solves the nodes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum BootstrapMethod {
    /// Node-by-node root search.
    Iterative(IterativeBootstrapConfig),
    /// Windowed least squares.
    Local(LocalBootstrapConfig),
}

impl Default for BootstrapMethod {
    fn default() -> Self {
        Self::Iterative(IterativeBootstrapConfig::default())
    }
}

impl BootstrapMethod {
    /// Helpers needed at least.
    #[must_use]
    pub fn required_helpers(&self) -> usize {
        match self {
            Self::Iterative(_) => 1,
            Self::Local(config) => config.localisation.max(1),
        }
    }

    /// Checks the method's settings.
    pub fn validate(&self) -> CurveResult<()> {
        match self {
            Self::Iterative(config) => config.validate(),
            Self::Local(config) => config.validate(),
        }
    }

    /// The configured bootstrap.
    #[must_use]
    pub fn build(&self) -> Box<dyn Bootstrap> {
        match *self {
            Self::Iterative(config) => Box::new(IterativeBootstrap::new(config)),
            Self::Local(config) => Box::new(LocalBootstrap::new(config)),
        }
    }
}

/// Everything needed to build a piecewise curve besides its helpers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveBuildConfig {
    /// Quantity stored at the nodes.
    pub kind: CurveKind,
    /// Interpolation between the nodes.
    pub interpolation: InterpolationMethod,
    /// Bootstrap solving the nodes.
    pub bootstrap: BootstrapMethod,
    /// Day count converting dates into curve times.
    pub day_count: DayCountConvention,
}

impl Default for CurveBuildConfig {
    fn default() -> Self {
        Self {
            kind: CurveKind::Discount,
            interpolation: InterpolationMethod::LogLinear,
            bootstrap: BootstrapMethod::default(),
            day_count: DayCountConvention::Act365Fixed,
        }
    }
}

impl CurveBuildConfig {
    /// Creates the default configuration for a curve kind.
    ///
    /// Discount and survival nodes interpolate log-linearly, rate nodes
    /// linearly.
    #[must_use]
    pub fn new(kind: CurveKind) -> Self {
        let interpolation = if kind.stores_discount_factors() {
            InterpolationMethod::LogLinear
        } else {
            InterpolationMethod::Linear
        };
        Self {
            kind,
            interpolation,
            ..Self::default()
        }
    }

    /// Sets the interpolation.
    #[must_use]
    pub fn with_interpolation(mut self, interpolation: InterpolationMethod) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Sets the bootstrap.
    #[must_use]
    pub fn with_bootstrap(mut self, bootstrap: BootstrapMethod) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Uses the iterative bootstrap.
    #[must_use]
    pub fn with_iterative(self, config: IterativeBootstrapConfig) -> Self {
        self.with_bootstrap(BootstrapMethod::Iterative(config))
    }

    /// Uses the local bootstrap.
    #[must_use]
    pub fn with_local(self, config: LocalBootstrapConfig) -> Self {
        self.with_bootstrap(BootstrapMethod::Local(config))
    }

    /// Sets the day count.
    #[must_use]
    pub fn with_day_count(mut self, day_count: DayCountConvention) -> Self {
        self.day_count = day_count;
        self
    }

    /// Checks the configuration before any curve is built.
    pub fn validate(&self) -> CurveResult<()> {
        self.interpolation
            .validate()
            .map_err(|e| CurveError::invalid_config(e.to_string()))?;
        self.bootstrap.validate()?;
        let incompatible = match self.interpolation {
            // rate nodes may be negative or zero
            InterpolationMethod::LogLinear => !self.kind.stores_discount_factors(),
            // convex monotone shapes forwards, not discount factors
            InterpolationMethod::ConvexMonotone { .. } => self.kind.stores_discount_factors(),
            _ => false,
        };
        if incompatible {
            return Err(CurveError::invalid_config(format!(
                "{} interpolation cannot be used on {} nodes",
                self.interpolation, self.kind
            )));
        }
        Ok(())
    }

    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns `CurveError::InvalidConfig` on malformed input.
    pub fn from_json(json: &str) -> CurveResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CurveError::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
