//! Iterative bootstrap.
//!
//! Solves the nodes one at a time in pillar order: each helper's repricing
//! error, as a function of its own node, is driven to zero by a bracketed
//! Brent search while the earlier nodes stay fixed.

use serde::{Deserialize, Serialize};
use strata_math::solvers::{brent_with_guess, SolverConfig};

use super::{check_inputs, Bootstrap};
use crate::curve::CurveUnderConstruction;
use crate::error::{CurveError, CurveResult};
use crate::helpers::BootstrapHelper;

/// Configuration for the iterative bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IterativeBootstrapConfig {
    /// Accuracy of each node, and of the node changes between sweeps.
    pub accuracy: f64,
    /// Lower end of every search, replacing the curve kind's bracket.
    pub min_value: Option<f64>,
    /// Upper end of every search, replacing the curve kind's bracket.
    pub max_value: Option<f64>,
    /// Searches per node, widening the bracket after each failure.
    pub max_attempts: usize,
    /// Widening factor of the upper end.
    pub max_factor: f64,
    /// Widening factor of the lower end.
    pub min_factor: f64,
    /// Function evaluations per search.
    pub max_evaluations: u32,
}

impl Default for IterativeBootstrapConfig {
    fn default() -> Self {
        Self {
            accuracy: 1e-12,
            min_value: None,
            max_value: None,
            max_attempts: 1,
            max_factor: 2.0,
            min_factor: 2.0,
            max_evaluations: 100,
        }
    }
}

impl IterativeBootstrapConfig {
    /// Sets the accuracy.
    #[must_use]
    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = accuracy;
        self
    }

    /// Fixes the search bracket for every node.
    #[must_use]
    pub fn with_bounds(mut self, min_value: f64, max_value: f64) -> Self {
        self.min_value = Some(min_value);
        self.max_value = Some(max_value);
        self
    }

    /// Allows `attempts` searches per node, widening the bracket by the
    /// given factors after each failure.
    #[must_use]
    pub fn with_attempts(mut self, attempts: usize, min_factor: f64, max_factor: f64) -> Self {
        self.max_attempts = attempts;
        self.min_factor = min_factor;
        self.max_factor = max_factor;
        self
    }

    /// Sets the function evaluations per search.
    #[must_use]
    pub fn with_max_evaluations(mut self, max_evaluations: u32) -> Self {
        self.max_evaluations = max_evaluations;
        self
    }

    /// Checks the settings are usable.
    pub fn validate(&self) -> CurveResult<()> {
        if self.accuracy.is_nan() || self.accuracy <= 0.0 {
            return Err(CurveError::invalid_config(format!(
                "accuracy must be positive, got {}",
                self.accuracy
            )));
        }
        if self.max_attempts == 0 || self.max_evaluations == 0 {
            return Err(CurveError::invalid_config(
                "at least one attempt and one evaluation are required",
            ));
        }
        if self.max_attempts > 1 && (self.min_factor <= 1.0 || self.max_factor <= 1.0) {
            return Err(CurveError::invalid_config(format!(
                "widening factors must exceed 1, got {} and {}",
                self.min_factor, self.max_factor
            )));
        }
        if let (Some(min), Some(max)) = (self.min_value, self.max_value) {
            if min >= max {
                return Err(CurveError::invalid_config(format!(
                    "bracket [{min}, {max}] is empty"
                )));
            }
        }
        Ok(())
    }
}

/// Sequential node-by-node bootstrap.
///
/// When the curve starts from a previous solution, that solution supplies
/// the guesses and brackets; if solving fails from there, the bootstrap
/// restarts once from the kind's initial values. Global interpolations are
/// swept until no node moves by more than the accuracy.
#[derive(Debug, Clone, Copy, Default)]
pub struct IterativeBootstrap {
    config: IterativeBootstrapConfig,
}

impl IterativeBootstrap {
    /// Creates the bootstrap.
    #[must_use]
    pub fn new(config: IterativeBootstrapConfig) -> Self {
        Self { config }
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &IterativeBootstrapConfig {
        &self.config
    }

    fn run(
        &self,
        curve: &mut CurveUnderConstruction,
        helpers: &[Box<dyn BootstrapHelper>],
        quotes: &[f64],
    ) -> CurveResult<()> {
        let traits = curve.kind().traits();
        let n = helpers.len();
        let reused = curve.has_previous_data();
        let mut valid_data = reused;
        if valid_data {
            curve.interpolate_over(n + 1)?;
        }
        let solver = SolverConfig::new(self.config.accuracy, self.config.max_evaluations);

        for iteration in 0.. {
            let previous = curve.data().to_vec();

            for i in 1..=n {
                let helper = &helpers[i - 1];
                let quote = quotes[i - 1];

                let mut min = self
                    .config
                    .min_value
                    .unwrap_or_else(|| traits.min_value_after(i, curve, valid_data));
                let mut max = self
                    .config
                    .max_value
                    .unwrap_or_else(|| traits.max_value_after(i, curve, valid_data));
                let mut guess = traits.guess(i, curve, valid_data)?;
                if guess >= max {
                    guess = max - (max - min) / 5.0;
                } else if guess <= min {
                    guess = min + (max - min) / 5.0;
                }

                if !valid_data {
                    curve.interpolate_over(i + 1)?;
                }

                for attempt in 1..=self.config.max_attempts {
                    if attempt > 1 {
                        min = if min < 0.0 {
                            min * self.config.min_factor
                        } else {
                            min / self.config.min_factor
                        };
                        max = if max > 0.0 {
                            max * self.config.max_factor
                        } else {
                            max / self.config.max_factor
                        };
                        guess = (min + max) / 2.0;
                        tracing::trace!(node = i, attempt, min, max, "widening bracket");
                    }

                    let mut failure: Option<CurveError> = None;
                    let outcome = {
                        let objective = |x: f64| {
                            curve.set_node(i, x);
                            match curve
                                .refresh()
                                .and_then(|()| helper.quote_error(quote, &*curve))
                            {
                                Ok(error) => error,
                                Err(err) => {
                                    failure.get_or_insert(err);
                                    f64::NAN
                                }
                            }
                        };
                        brent_with_guess(objective, guess, min, max, &solver)
                    };

                    match outcome {
                        Ok(result) => {
                            curve.set_node(i, result.root);
                            curve.refresh()?;
                            tracing::trace!(
                                node = i,
                                value = result.root,
                                evaluations = result.iterations,
                                "node solved"
                            );
                            break;
                        }
                        Err(err) => {
                            let cause = failure.unwrap_or_else(|| err.into());
                            if reused || attempt == self.config.max_attempts {
                                return Err(CurveError::bootstrap_failure(
                                    iteration + 1,
                                    i - 1,
                                    helper.pillar_date(),
                                    cause,
                                ));
                            }
                        }
                    }
                }
            }

            if !curve.method().is_global() {
                break;
            }

            let change = curve.data()[1..]
                .iter()
                .zip(&previous[1..])
                .fold(0.0_f64, |acc, (now, before)| acc.max((now - before).abs()));
            tracing::debug!(iteration = iteration + 1, change, "bootstrap sweep finished");
            if change <= self.config.accuracy {
                break;
            }
            if iteration + 1 >= traits.max_iterations() {
                return Err(CurveError::NotConverged {
                    iterations: iteration + 1,
                    change,
                    accuracy: self.config.accuracy,
                });
            }
            valid_data = true;
        }
        Ok(())
    }
}

impl Bootstrap for IterativeBootstrap {
    fn bootstrap(
        &self,
        curve: &mut CurveUnderConstruction,
        helpers: &[Box<dyn BootstrapHelper>],
        quotes: &[f64],
    ) -> CurveResult<()> {
        self.config.validate()?;
        check_inputs(curve, helpers, quotes)?;

        match self.run(curve, helpers, quotes) {
            Err(err) if curve.has_previous_data() => {
                tracing::debug!(error = %err, "previous solution failed, restarting from scratch");
                curve.reset_data();
                self.run(curve, helpers, quotes)
            }
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::{quote_errors, CurveKind};
    use crate::helpers::{DepositRateHelper, SwapRateHelper, ZeroRateHelper};
    use crate::interpolation::InterpolationMethod;
    use approx::assert_relative_eq;
    use strata_core::prelude::*;
    use crate::traits::Curve;

    fn reference() -> Date {
        Date::from_ymd(2025, 1, 2).unwrap()
    }

    fn zero_helpers(session: &mut Session, quotes: &[(i32, f64)]) -> Vec<Box<dyn BootstrapHelper>> {
        quotes
            .iter()
            .map(|&(years, rate)| {
                let q = session.new_quote(format!("{years}Y"), rate);
                let maturity = reference().add_years(years).unwrap();
                Box::new(ZeroRateHelper::new(q, maturity)) as Box<dyn BootstrapHelper>
            })
            .collect()
    }

    fn solve(
        kind: CurveKind,
        method: InterpolationMethod,
        helpers: &mut [Box<dyn BootstrapHelper>],
        quotes: &[f64],
        previous: Option<&[f64]>,
    ) -> CurveResult<CurveUnderConstruction> {
        let pillars: Vec<Date> = helpers.iter().map(|h| h.pillar_date()).collect();
        let mut curve = CurveUnderConstruction::new(
            kind,
            method,
            reference(),
            DayCountConvention::Act365Fixed,
            &pillars,
            previous,
        )?;
        for helper in helpers.iter_mut() {
            helper.set_term_structure(&curve)?;
        }
        IterativeBootstrap::default().bootstrap(&mut curve, helpers, quotes)?;
        Ok(curve)
    }

    #[test]
    fn test_zero_rates_reprice() {
        let mut session = Session::new(SessionConfig::new(reference()));
        let quotes = [0.01, 0.015, 0.02, 0.025];
        let mut helpers = zero_helpers(
            &mut session,
            &[(1, quotes[0]), (2, quotes[1]), (5, quotes[2]), (10, quotes[3])],
        );
        let curve = solve(
            CurveKind::Discount,
            InterpolationMethod::LogLinear,
            &mut helpers,
            &quotes,
            None,
        )
        .unwrap();

        for error in quote_errors(&curve, &helpers, &quotes).unwrap() {
            assert!(error.abs() < 1e-10);
        }
        let t5 = curve.times()[3];
        assert_relative_eq!(curve.zero_rate(t5).unwrap(), 0.02, epsilon = 1e-10);
    }

    #[test]
    fn test_deposits_and_swaps_reprice() {
        let mut session = Session::new(SessionConfig::new(reference()));
        let mut helpers: Vec<Box<dyn BootstrapHelper>> = vec![
            Box::new(
                DepositRateHelper::from_tenor(
                    session.new_quote("3M", 0.030),
                    reference(),
                    Period::months(3),
                )
                .unwrap(),
            ),
            Box::new(
                DepositRateHelper::from_tenor(
                    session.new_quote("6M", 0.032),
                    reference(),
                    Period::months(6),
                )
                .unwrap(),
            ),
            Box::new(
                SwapRateHelper::from_tenor(
                    session.new_quote("2Y", 0.034),
                    reference(),
                    Period::years(2),
                    Period::years(1),
                )
                .unwrap(),
            ),
            Box::new(
                SwapRateHelper::from_tenor(
                    session.new_quote("5Y", 0.036),
                    reference(),
                    Period::years(5),
                    Period::years(1),
                )
                .unwrap(),
            ),
        ];
        let quotes = [0.030, 0.032, 0.034, 0.036];

        for method in [InterpolationMethod::LogLinear, InterpolationMethod::CubicSpline] {
            let kind = if method.is_global() {
                CurveKind::ZeroYield
            } else {
                CurveKind::Discount
            };
            let curve = solve(kind, method, &mut helpers, &quotes, None).unwrap();
            for error in quote_errors(&curve, &helpers, &quotes).unwrap() {
                assert!(error.abs() < 1e-10, "{method}: error {error}");
            }
        }
    }

    #[test]
    fn test_previous_solution_reused() {
        let mut session = Session::new(SessionConfig::new(reference()));
        let quotes = [0.01, 0.02, 0.03];
        let mut helpers = zero_helpers(&mut session, &[(1, 0.01), (2, 0.02), (3, 0.03)]);
        let first = solve(
            CurveKind::ZeroYield,
            InterpolationMethod::Linear,
            &mut helpers,
            &quotes,
            None,
        )
        .unwrap();

        let moved = [0.01, 0.021, 0.03];
        let second = solve(
            CurveKind::ZeroYield,
            InterpolationMethod::Linear,
            &mut helpers,
            &moved,
            Some(first.data()),
        )
        .unwrap();
        assert!(second.has_previous_data());
        for error in quote_errors(&second, &helpers, &moved).unwrap() {
            assert!(error.abs() < 1e-10);
        }
    }

    #[test]
    fn test_bad_previous_solution_restarts() {
        let mut session = Session::new(SessionConfig::new(reference()));
        let quotes = [0.01, 0.02];
        let mut helpers = zero_helpers(&mut session, &[(1, 0.01), (2, 0.02)]);
        // brackets around these nodes are [0.25, 1.0]
        let stale = [0.5, 0.5, 0.5];
        let curve = solve(
            CurveKind::ZeroYield,
            InterpolationMethod::Linear,
            &mut helpers,
            &quotes,
            Some(&stale),
        )
        .unwrap();
        assert!(!curve.has_previous_data());
        for error in quote_errors(&curve, &helpers, &quotes).unwrap() {
            assert!(error.abs() < 1e-10);
        }
    }

    #[test]
    fn test_failure_names_helper() {
        let mut session = Session::new(SessionConfig::new(reference()));
        let quotes = [0.01, 5.0];
        let mut helpers = zero_helpers(&mut session, &[(1, 0.01), (2, 5.0)]);
        let err = solve(
            CurveKind::Discount,
            InterpolationMethod::LogLinear,
            &mut helpers,
            &quotes,
            None,
        )
        .unwrap_err();
        match err {
            CurveError::BootstrapFailure {
                iteration,
                helper,
                pillar,
                ..
            } => {
                assert_eq!(iteration, 1);
                assert_eq!(helper, 1);
                assert_eq!(pillar, reference().add_years(2).unwrap());
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_widening_recovers() {
        let mut session = Session::new(SessionConfig::new(reference()));
        let quotes = [0.01, 5.0];
        let mut helpers = zero_helpers(&mut session, &[(1, 0.01), (2, 5.0)]);
        let pillars: Vec<Date> = helpers.iter().map(|h| h.pillar_date()).collect();
        let mut curve = CurveUnderConstruction::new(
            CurveKind::Discount,
            InterpolationMethod::LogLinear,
            reference(),
            DayCountConvention::Act365Fixed,
            &pillars,
            None,
        )
        .unwrap();
        for helper in &mut helpers {
            helper.set_term_structure(&curve).unwrap();
        }
        let bootstrap = IterativeBootstrap::new(
            IterativeBootstrapConfig::default().with_attempts(10, 1e4, 2.0),
        );
        bootstrap.bootstrap(&mut curve, &helpers, &quotes).unwrap();
        // the 2Y node is tiny, so the rate is sensitive to its accuracy
        for error in quote_errors(&curve, &helpers, &quotes).unwrap() {
            assert!(error.abs() < 1e-6);
        }
        assert_relative_eq!(curve.data()[2], (-10.0f64).exp(), max_relative = 1e-6);
    }

    #[test]
    fn test_config_validation() {
        assert!(IterativeBootstrapConfig::default().validate().is_ok());
        assert!(IterativeBootstrapConfig::default()
            .with_accuracy(0.0)
            .validate()
            .is_err());
        assert!(IterativeBootstrapConfig::default()
            .with_bounds(1.0, 0.5)
            .validate()
            .is_err());
        assert!(IterativeBootstrapConfig::default()
            .with_attempts(3, 1.0, 2.0)
            .validate()
            .is_err());

        let config: IterativeBootstrapConfig =
            serde_json::from_str(r#"{ "accuracy": 1e-10, "max_attempts": 3 }"#).unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.max_factor, 2.0);
    }
}
