//! Natural cubic spline interpolation.

use crate::error::MathResult;
use crate::interpolation::{check_range, find_segment, validate_nodes, Interpolator};

/// Natural cubic spline interpolation.
///
/// Constructs a smooth curve through data points using piecewise cubic
/// polynomials with continuous first and second derivatives.
///
/// "Natural" means the second derivative is zero at the endpoints. With two
/// nodes the spline is the straight line through them.
///
/// # Example
///
/// ```rust
/// use strata_math::interpolation::{CubicSpline, Interpolator};
///
/// let xs = vec![0.0, 1.0, 2.0, 3.0];
/// let ys = vec![0.0, 1.0, 4.0, 9.0];
///
/// let spline = CubicSpline::new(xs, ys).unwrap();
/// let y = spline.interpolate(1.5).unwrap();
/// assert!(y > 1.0 && y < 4.0);
/// ```
#[derive(Debug, Clone)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivatives at each knot
    y2s: Vec<f64>,
    /// Integral from `xs[0]` to each knot.
    integrals: Vec<f64>,
}

impl CubicSpline {
    /// Creates a natural cubic spline interpolator.
    ///
    /// # Arguments
    ///
    /// * `xs` - X coordinates (must be sorted in ascending order)
    /// * `ys` - Y coordinates
    ///
    /// # Errors
    ///
    /// Returns an error if there are fewer than 2 points, if lengths differ
    /// or if the abscissas are not strictly increasing.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> MathResult<Self> {
        validate_nodes(&xs, &ys, 2)?;

        let y2s = compute_second_derivatives(&xs, &ys);

        let mut integrals = Vec::with_capacity(xs.len());
        integrals.push(0.0);
        for i in 0..xs.len() - 1 {
            let h = xs[i + 1] - xs[i];
            let area = h * (0.5 * (ys[i] + ys[i + 1]) - h * h / 24.0 * (y2s[i] + y2s[i + 1]));
            integrals.push(integrals[i] + area);
        }

        Ok(Self {
            xs,
            ys,
            y2s,
            integrals,
        })
    }

    /// Segment index and the weights `(a, b, h)` of x within it.
    fn locate(&self, x: f64) -> (usize, f64, f64, f64) {
        let i = find_segment(&self.xs, x);
        let h = self.xs[i + 1] - self.xs[i];
        let a = (self.xs[i + 1] - x) / h;
        let b = (x - self.xs[i]) / h;
        (i, a, b, h)
    }
}

impl Interpolator for CubicSpline {
    fn interpolate(&self, x: f64) -> MathResult<f64> {
        check_range(&self.xs, x)?;
        let (i, a, b, h) = self.locate(x);

        let y = a * self.ys[i]
            + b * self.ys[i + 1]
            + ((a * a * a - a) * self.y2s[i] + (b * b * b - b) * self.y2s[i + 1]) * (h * h) / 6.0;

        Ok(y)
    }

    fn derivative(&self, x: f64) -> MathResult<f64> {
        check_range(&self.xs, x)?;
        let (i, a, b, h) = self.locate(x);

        Ok((self.ys[i + 1] - self.ys[i]) / h
            - (3.0 * a * a - 1.0) / 6.0 * h * self.y2s[i]
            + (3.0 * b * b - 1.0) / 6.0 * h * self.y2s[i + 1])
    }

    fn primitive(&self, x: f64) -> MathResult<f64> {
        check_range(&self.xs, x)?;
        let (i, a, b, h) = self.locate(x);

        // Integral over [xs[i], x] of the segment cubic, in terms of b = (x - xs[i]) / h
        let b2 = b * b;
        let a2 = a * a;
        let linear = self.ys[i] * (b - 0.5 * b2) + self.ys[i + 1] * 0.5 * b2;
        let curvature = self.y2s[i] * (-0.25 * a2 * a2 + 0.5 * a2 - 0.25)
            + self.y2s[i + 1] * (0.25 * b2 * b2 - 0.5 * b2);
        Ok(self.integrals[i] + h * (linear + h * h / 6.0 * curvature))
    }

    fn min_x(&self) -> f64 {
        self.xs[0]
    }

    fn max_x(&self) -> f64 {
        self.xs[self.xs.len() - 1]
    }
}

/// Computes the second derivatives for natural cubic spline.
fn compute_second_derivatives(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let mut y2s = vec![0.0; n];
    let mut u = vec![0.0; n - 1];

    // Decomposition loop
    for i in 1..n - 1 {
        let sig = (xs[i] - xs[i - 1]) / (xs[i + 1] - xs[i - 1]);
        let p = sig * y2s[i - 1] + 2.0;
        y2s[i] = (sig - 1.0) / p;
        let slope_change = (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i])
            - (ys[i] - ys[i - 1]) / (xs[i] - xs[i - 1]);
        u[i] = (6.0 * slope_change / (xs[i + 1] - xs[i - 1]) - sig * u[i - 1]) / p;
    }

    // Natural spline: y2[n-1] = 0
    y2s[n - 1] = 0.0;

    // Back-substitution loop
    for i in (0..n - 1).rev() {
        y2s[i] = y2s[i] * y2s[i + 1] + u[i];
    }

    y2s
}
