//! Levenberg-Marquardt least squares with a finite-difference Jacobian.

use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::error::{MathError, MathResult};
use crate::optimization::{Constraint, EndCriteria, EndCriteriaType, LeastSquaresResult};

/// Damping and differentiation settings for [`levenberg_marquardt`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevenbergMarquardtConfig {
    /// Starting damping factor.
    pub initial_lambda: f64,
    /// Damping multiplier after a rejected step.
    pub lambda_up: f64,
    /// Damping multiplier after an accepted step.
    pub lambda_down: f64,
    /// Relative bump used for the forward-difference Jacobian.
    pub finite_difference_step: f64,
}

impl Default for LevenbergMarquardtConfig {
    fn default() -> Self {
        Self {
            initial_lambda: 1e-3,
            lambda_up: 3.0,
            lambda_down: 0.35,
            finite_difference_step: 1e-8,
        }
    }
}

impl LevenbergMarquardtConfig {
    /// Sets the starting damping factor.
    #[must_use]
    pub fn with_initial_lambda(mut self, lambda: f64) -> Self {
        self.initial_lambda = lambda;
        self
    }

    /// Sets the finite-difference bump.
    #[must_use]
    pub fn with_finite_difference_step(mut self, step: f64) -> Self {
        self.finite_difference_step = step;
        self
    }
}

const MIN_LAMBDA: f64 = 1e-12;
const MAX_LAMBDA: f64 = 1e12;

fn objective(residuals: &[f64]) -> f64 {
    0.5 * residuals.iter().map(|r| r * r).sum::<f64>()
}

fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

fn finish(
    x: Vec<f64>,
    residuals: Vec<f64>,
    iterations: u32,
    evaluations: u32,
    end_type: EndCriteriaType,
) -> MathResult<LeastSquaresResult> {
    if !end_type.succeeded() {
        debug!(
            "levenberg-marquardt stopped with {:?} after {} iterations, max residual {:e}",
            end_type,
            iterations,
            max_abs(&residuals)
        );
    }
    Ok(LeastSquaresResult {
        objective: objective(&residuals),
        x,
        residuals,
        iterations,
        evaluations,
        end_type,
    })
}

/// Forward-difference Jacobian, stepping backwards where the forward bump
/// leaves the feasible region. `None` if any bumped residual is not finite.
fn jacobian<F>(
    residual_fn: &mut F,
    x: &[f64],
    base: &[f64],
    constraint: Constraint,
    step: f64,
    evaluations: &mut u32,
) -> Option<DMatrix<f64>>
where
    F: FnMut(&[f64]) -> Vec<f64>,
{
    let mut j = DMatrix::zeros(base.len(), x.len());
    let mut bumped = x.to_vec();
    for c in 0..x.len() {
        let h = step * x[c].abs().max(1.0);
        bumped[c] = x[c] + h;
        if !constraint.test(&bumped) {
            bumped[c] = x[c] - h;
        }
        let denom = bumped[c] - x[c];
        let r = residual_fn(&bumped);
        *evaluations += 1;
        bumped[c] = x[c];
        if r.len() != base.len() || !all_finite(&r) {
            return None;
        }
        for (row, (rb, r0)) in r.iter().zip(base).enumerate() {
            j[(row, c)] = (rb - r0) / denom;
        }
    }
    Some(j)
}

/// Minimizes `½‖r(x)‖²` starting from `initial`.
///
/// Steps solve the damped normal equations
/// `(JᵀJ + λ·diag(|JᵀJ|ᵢᵢ + 1)) δ = −Jᵀr`. A candidate that leaves the
/// constraint's feasible region or fails to lower the objective is rejected
/// and the damping raised; an accepted step lowers the damping.
///
/// Non-convergence is not an error: the result carries the
/// [`EndCriteriaType`] and callers check [`LeastSquaresResult::succeeded`].
///
/// # Errors
///
/// `InvalidInput` for an empty starting point, a starting point outside the
/// constraint, or an empty residual vector.
///
/// # Example
///
/// ```rust
/// use strata_math::optimization::{
///     levenberg_marquardt, Constraint, EndCriteria, LevenbergMarquardtConfig,
/// };
///
/// // x² = 2, x·y = 3
/// let result = levenberg_marquardt(
///     |x: &[f64]| vec![x[0] * x[0] - 2.0, x[0] * x[1] - 3.0],
///     &[1.0, 1.0],
///     Constraint::Positive,
///     &EndCriteria::default(),
///     &LevenbergMarquardtConfig::default(),
/// )
/// .unwrap();
///
/// assert!(result.succeeded());
/// assert!((result.x[0] - 2f64.sqrt()).abs() < 1e-10);
/// ```
pub fn levenberg_marquardt<F>(
    mut residual_fn: F,
    initial: &[f64],
    constraint: Constraint,
    criteria: &EndCriteria,
    config: &LevenbergMarquardtConfig,
) -> MathResult<LeastSquaresResult>
where
    F: FnMut(&[f64]) -> Vec<f64>,
{
    if initial.is_empty() {
        return Err(MathError::invalid_input("empty starting point"));
    }
    if !constraint.test(initial) {
        return Err(MathError::invalid_input(format!(
            "starting point {initial:?} violates the {constraint:?} constraint"
        )));
    }

    let mut x = initial.to_vec();
    let mut residuals = residual_fn(&x);
    let mut evaluations = 1;
    if residuals.is_empty() {
        return Err(MathError::invalid_input("empty residual vector"));
    }

    if !all_finite(&residuals) {
        return finish(x, residuals, 0, evaluations, EndCriteriaType::NumericalFailure);
    }
    if max_abs(&residuals) <= criteria.function_epsilon {
        return finish(x, residuals, 0, evaluations, EndCriteriaType::FunctionEpsilon);
    }

    let step = config.finite_difference_step;
    let mut current = objective(&residuals);
    let mut lambda = config.initial_lambda.max(MIN_LAMBDA);
    let mut stationary = 0;

    let Some(mut j) = jacobian(&mut residual_fn, &x, &residuals, constraint, step, &mut evaluations)
    else {
        return finish(x, residuals, 0, evaluations, EndCriteriaType::NumericalFailure);
    };
    let mut jtj = j.transpose() * &j;
    let mut gradient = j.transpose() * DVector::from_column_slice(&residuals);

    for iteration in 1..=criteria.max_iterations {
        if gradient.amax() <= criteria.gradient_epsilon {
            return finish(x, residuals, iteration, evaluations, EndCriteriaType::ZeroGradient);
        }

        let mut a = jtj.clone();
        for i in 0..a.nrows() {
            a[(i, i)] += lambda * (a[(i, i)].abs() + 1.0);
        }
        let delta = a.lu().solve(&(-&gradient));

        if let Some(delta) = &delta {
            let negligible = delta
                .iter()
                .zip(&x)
                .all(|(d, v)| d.abs() <= criteria.root_epsilon * (1.0 + v.abs()));
            if negligible {
                return finish(x, residuals, iteration, evaluations, EndCriteriaType::StationaryPoint);
            }
        }

        let accepted = delta.and_then(|delta| {
            let candidate: Vec<f64> = x.iter().zip(delta.iter()).map(|(v, d)| v + d).collect();
            if !constraint.test(&candidate) {
                return None;
            }
            let r = residual_fn(&candidate);
            evaluations += 1;
            if r.len() != residuals.len() || !all_finite(&r) {
                return None;
            }
            let obj = objective(&r);
            (obj < current).then_some((candidate, r, obj))
        });

        let Some((candidate, r, obj)) = accepted else {
            lambda = (lambda * config.lambda_up).min(MAX_LAMBDA);
            stationary += 1;
            if stationary >= criteria.max_stationary_iterations {
                return finish(x, residuals, iteration, evaluations, EndCriteriaType::Stagnation);
            }
            continue;
        };

        x = candidate;
        residuals = r;
        current = obj;
        lambda = (lambda * config.lambda_down).max(MIN_LAMBDA);
        stationary = 0;

        if max_abs(&residuals) <= criteria.function_epsilon {
            return finish(x, residuals, iteration, evaluations, EndCriteriaType::FunctionEpsilon);
        }
        match jacobian(&mut residual_fn, &x, &residuals, constraint, step, &mut evaluations) {
            Some(updated) => j = updated,
            None => {
                return finish(
                    x,
                    residuals,
                    iteration,
                    evaluations,
                    EndCriteriaType::NumericalFailure,
                )
            }
        }
        jtj = j.transpose() * &j;
        gradient = j.transpose() * DVector::from_column_slice(&residuals);
    }

    finish(
        x,
        residuals,
        criteria.max_iterations,
        evaluations,
        EndCriteriaType::MaxIterations,
    )
}
