//! Backward-flat interpolation.

use crate::error::MathResult;
use crate::interpolation::{check_range, validate_nodes, Interpolator};

/// Piecewise constant interpolation, each node's value holding over the
/// period that ends at it.
///
/// For `x` in `(xs[i-1], xs[i]]` the value is `ys[i]`; at `xs[0]` it is
/// `ys[0]`. On forward or hazard rate nodes this gives the familiar
/// piecewise flat forward curve.
///
/// # Example
///
/// ```rust
/// use strata_math::interpolation::{BackwardFlatInterpolator, Interpolator};
///
/// let interp = BackwardFlatInterpolator::new(vec![0.0, 1.0, 3.0], vec![0.01, 0.02, 0.04]).unwrap();
/// assert_eq!(interp.interpolate(0.5).unwrap(), 0.02);
/// assert_eq!(interp.interpolate(1.0).unwrap(), 0.02);
/// assert_eq!(interp.interpolate(1.5).unwrap(), 0.04);
/// ```
#[derive(Debug, Clone)]
pub struct BackwardFlatInterpolator {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Integral from `xs[0]` to each node.
    integrals: Vec<f64>,
}

impl BackwardFlatInterpolator {
    /// Creates a new backward-flat interpolator.
    ///
    /// # Errors
    ///
    /// Returns an error if there are fewer than 2 points, if lengths differ
    /// or if the abscissas are not strictly increasing.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> MathResult<Self> {
        validate_nodes(&xs, &ys, 2)?;

        let mut integrals = Vec::with_capacity(xs.len());
        integrals.push(0.0);
        for i in 1..xs.len() {
            integrals.push(integrals[i - 1] + ys[i] * (xs[i] - xs[i - 1]));
        }

        Ok(Self { xs, ys, integrals })
    }

    /// Index of the node whose value applies at x.
    fn node_for(&self, x: f64) -> usize {
        self.xs.partition_point(|v| *v < x).min(self.xs.len() - 1)
    }
}

impl Interpolator for BackwardFlatInterpolator {
    fn interpolate(&self, x: f64) -> MathResult<f64> {
        check_range(&self.xs, x)?;
        Ok(self.ys[self.node_for(x)])
    }

    fn derivative(&self, x: f64) -> MathResult<f64> {
        check_range(&self.xs, x)?;
        Ok(0.0)
    }

    fn primitive(&self, x: f64) -> MathResult<f64> {
        check_range(&self.xs, x)?;
        let j = self.node_for(x);
        if j == 0 {
            return Ok(0.0);
        }
        Ok(self.integrals[j - 1] + self.ys[j] * (x - self.xs[j - 1]))
    }

    fn min_x(&self) -> f64 {
        self.xs[0]
    }

    fn max_x(&self) -> f64 {
        self.xs[self.xs.len() - 1]
    }
}
