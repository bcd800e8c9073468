//! Local bootstrap.
//!
//! Solves a sliding window of nodes jointly. Each window holds the newest
//! `localisation` nodes and the helpers pinning them; Levenberg-Marquardt
//! drives the window's repricing errors to zero while the interpolation is
//! rebuilt locally, so nodes outside the window keep their shape.

use serde::{Deserialize, Serialize};
use strata_math::optimization::{
    levenberg_marquardt, Constraint, EndCriteria, LevenbergMarquardtConfig,
};

use super::{check_inputs, Bootstrap};
use crate::curve::CurveUnderConstruction;
use crate::error::{CurveError, CurveResult};
use crate::helpers::BootstrapHelper;
use crate::interpolation::Localisation;

/// Configuration for the local bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalBootstrapConfig {
    /// Nodes solved jointly in each window.
    pub localisation: usize,
    /// Keep every node strictly positive while solving.
    pub force_positive: bool,
    /// Largest repricing error accepted in a window.
    pub accuracy: f64,
    /// Optimizer iterations per window.
    pub max_iterations: u32,
    /// Optimizer iterations without improvement before giving up.
    pub max_stationary_iterations: u32,
}

impl Default for LocalBootstrapConfig {
    fn default() -> Self {
        Self {
            localisation: 2,
            force_positive: true,
            accuracy: 1e-12,
            max_iterations: 100,
            max_stationary_iterations: 10,
        }
    }
}

impl LocalBootstrapConfig {
    /// Sets the window size.
    #[must_use]
    pub fn with_localisation(mut self, localisation: usize) -> Self {
        self.localisation = localisation;
        self
    }

    /// Sets whether nodes must stay positive.
    #[must_use]
    pub fn with_force_positive(mut self, force_positive: bool) -> Self {
        self.force_positive = force_positive;
        self
    }

    /// Sets the accuracy.
    #[must_use]
    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = accuracy;
        self
    }

    /// Sets the optimizer iteration limits per window.
    #[must_use]
    pub fn with_end_criteria(mut self, max_iterations: u32, max_stationary_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self.max_stationary_iterations = max_stationary_iterations;
        self
    }

    /// Checks the settings are usable.
    pub fn validate(&self) -> CurveResult<()> {
        if self.localisation == 0 {
            return Err(CurveError::invalid_config(
                "localisation must be at least 1",
            ));
        }
        if self.accuracy.is_nan() || self.accuracy <= 0.0 {
            return Err(CurveError::invalid_config(format!(
                "accuracy must be positive, got {}",
                self.accuracy
            )));
        }
        if self.max_iterations == 0 || self.max_stationary_iterations == 0 {
            return Err(CurveError::invalid_config(
                "optimizer iteration limits must be positive",
            ));
        }
        Ok(())
    }

    fn end_criteria(&self) -> EndCriteria {
        EndCriteria::new(
            self.max_iterations,
            self.max_stationary_iterations,
            self.accuracy,
        )
    }

    fn constraint(&self) -> Constraint {
        if self.force_positive {
            Constraint::Positive
        } else {
            Constraint::None
        }
    }
}

/// Windowed least-squares bootstrap.
///
/// Always starts from the kind's initial values; a previous solution is
/// never reused.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBootstrap {
    config: LocalBootstrapConfig,
}

impl LocalBootstrap {
    /// Creates the bootstrap.
    #[must_use]
    pub fn new(config: LocalBootstrapConfig) -> Self {
        Self { config }
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &LocalBootstrapConfig {
        &self.config
    }

    /// Solves nodes `first..=last` against helpers `first - 1..=last - 1`.
    fn solve_window(
        &self,
        curve: &mut CurveUnderConstruction,
        helpers: &[Box<dyn BootstrapHelper>],
        quotes: &[f64],
        first: usize,
        last: usize,
    ) -> CurveResult<()> {
        let start = curve.data()[first..=last].to_vec();
        let window = &helpers[first - 1..last];
        let window_quotes = &quotes[first - 1..last];

        let mut failure: Option<CurveError> = None;
        let outcome = {
            let residuals = |x: &[f64]| {
                for (j, &value) in x.iter().enumerate() {
                    curve.set_node(first + j, value);
                }
                let errors = curve.refresh().and_then(|()| {
                    window
                        .iter()
                        .zip(window_quotes)
                        .map(|(helper, &quote)| helper.quote_error(quote, &*curve))
                        .collect::<CurveResult<Vec<f64>>>()
                });
                errors.unwrap_or_else(|err| {
                    failure.get_or_insert(err);
                    vec![f64::NAN; x.len()]
                })
            };
            levenberg_marquardt(
                residuals,
                &start,
                self.config.constraint(),
                &self.config.end_criteria(),
                &LevenbergMarquardtConfig::default(),
            )
        };

        let result = outcome.map_err(|err| CurveError::local_failure(first, last, err.to_string()))?;
        if !result.succeeded() {
            let mut reason = format!(
                "{:?} after {} iterations, largest error {:.2e}",
                result.end_type,
                result.iterations,
                result.max_residual()
            );
            if let Some(err) = failure {
                reason.push_str(&format!("; {err}"));
            }
            return Err(CurveError::local_failure(first, last, reason));
        }

        for (j, &value) in result.x.iter().enumerate() {
            curve.set_node(first + j, value);
        }
        curve.refresh()?;
        tracing::trace!(
            first,
            last,
            iterations = result.iterations,
            error = result.max_residual(),
            "window solved"
        );
        Ok(())
    }
}

impl Bootstrap for LocalBootstrap {
    fn bootstrap(
        &self,
        curve: &mut CurveUnderConstruction,
        helpers: &[Box<dyn BootstrapHelper>],
        quotes: &[f64],
    ) -> CurveResult<()> {
        self.config.validate()?;
        check_inputs(curve, helpers, quotes)?;

        let n = helpers.len();
        let localisation = self.config.localisation;
        if n < localisation {
            return Err(CurveError::insufficient_instruments(localisation, n));
        }

        curve.reset_data();
        let traits = curve.kind().traits();

        // starting values of the first window
        for j in 1..=localisation {
            let guess = traits.guess(j, curve, false)?;
            curve.set_node(j, guess);
            curve.interpolate_over(j + 1)?;
        }

        for k in localisation - 1..n {
            let first = k + 2 - localisation;
            let len = k + 2;
            if k >= localisation {
                let guess = traits.guess(k + 1, curve, false)?;
                curve.set_node(k + 1, guess);
            }
            let window = Localisation::for_window(curve.interpolator(), len, localisation, n + 1);
            curve.interpolate_local(len, window)?;
            self.solve_window(curve, helpers, quotes, first, k + 1)?;
        }

        tracing::debug!(nodes = n, localisation, "local bootstrap finished");
        Ok(())
    }
}
