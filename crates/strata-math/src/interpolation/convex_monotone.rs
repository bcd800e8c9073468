//! Convex monotone interpolation of period-average forwards.
//!
//! Node `i > 0` carries the average of the interpolant over
//! `[xs[i-1], xs[i]]`; the first ordinate is ignored. Boundary values are
//! estimated from neighbouring averages, then every period gets a shape
//! that integrates exactly to its average (Hagan and West, "Interpolation
//! Methods for Curve Construction", 2006). `monotonicity = 1` and
//! `quadraticity = 0` reproduce the original method; smaller monotonicity
//! and positive quadraticity trade monotonicity for smaller gradients.
//!
//! The construction is sequential from the left, so a prefix of the
//! sections can be kept fixed while later nodes move. Windowed bootstraps
//! rely on this through [`ConvexMonotone::existing_sections`] and
//! [`ConvexMonotone::with_existing`].

use crate::error::{MathError, MathResult};
use crate::interpolation::{check_range, validate_nodes, Interpolator};

/// Shape parameters of [`ConvexMonotone`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvexMonotoneParams {
    /// Weight of the quadratic shape in `[0, 1]`.
    pub quadraticity: f64,
    /// How strictly monotonicity is enforced, in `[0, 1]`.
    pub monotonicity: f64,
    /// Keep the interpolant non-negative.
    pub force_positive: bool,
}

impl Default for ConvexMonotoneParams {
    fn default() -> Self {
        Self {
            quadraticity: 0.3,
            monotonicity: 0.7,
            force_positive: true,
        }
    }
}

impl ConvexMonotoneParams {
    /// Creates parameters.
    #[must_use]
    pub fn new(quadraticity: f64, monotonicity: f64, force_positive: bool) -> Self {
        Self {
            quadraticity,
            monotonicity,
            force_positive,
        }
    }

    /// Sets the quadraticity.
    #[must_use]
    pub fn with_quadraticity(mut self, quadraticity: f64) -> Self {
        self.quadraticity = quadraticity;
        self
    }

    /// Sets the monotonicity.
    #[must_use]
    pub fn with_monotonicity(mut self, monotonicity: f64) -> Self {
        self.monotonicity = monotonicity;
        self
    }

    /// Sets whether the interpolant is kept non-negative.
    #[must_use]
    pub fn with_force_positive(mut self, force_positive: bool) -> Self {
        self.force_positive = force_positive;
        self
    }

    /// Checks both weights lie in `[0, 1]`.
    pub fn validate(&self) -> MathResult<()> {
        if !(0.0..=1.0).contains(&self.monotonicity) {
            return Err(MathError::invalid_input(format!(
                "monotonicity must lie between 0 and 1, got {}",
                self.monotonicity
            )));
        }
        if !(0.0..=1.0).contains(&self.quadraticity) {
            return Err(MathError::invalid_input(format!(
                "quadraticity must lie between 0 and 1, got {}",
                self.quadraticity
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Section shapes
// ============================================================================

/// Constant over the period.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Flat {
    value: f64,
    prev_primitive: f64,
    x_prev: f64,
}

impl Flat {
    fn value(&self, _x: f64) -> f64 {
        self.value
    }

    fn derivative(&self, _x: f64) -> f64 {
        0.0
    }

    fn primitive(&self, x: f64) -> f64 {
        self.prev_primitive + (x - self.x_prev) * self.value
    }

    fn f_next(&self) -> f64 {
        self.value
    }
}

/// Straight line between the boundary values; used when both gradients
/// vanish.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Line {
    f_prev: f64,
    f_next: f64,
    prev_primitive: f64,
    x_prev: f64,
    gradient: f64,
}

impl Line {
    fn new(f_prev: f64, f_next: f64, prev_primitive: f64, x_prev: f64, x_next: f64) -> Self {
        Self {
            f_prev,
            f_next,
            prev_primitive,
            x_prev,
            gradient: (f_next - f_prev) / (x_next - x_prev),
        }
    }

    fn value(&self, x: f64) -> f64 {
        self.f_prev + (x - self.x_prev) * self.gradient
    }

    fn derivative(&self, _x: f64) -> f64 {
        self.gradient
    }

    fn primitive(&self, x: f64) -> f64 {
        let dx = x - self.x_prev;
        self.prev_primitive + dx * (self.f_prev + 0.5 * dx * self.gradient)
    }
}

/// The quadratic through both boundary values with the right average.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Quadratic {
    x_prev: f64,
    scale: f64,
    a: f64,
    b: f64,
    c: f64,
    prev_primitive: f64,
    f_next: f64,
}

impl Quadratic {
    fn new(x_prev: f64, x_next: f64, f_prev: f64, f_next: f64, average: f64, prev_primitive: f64) -> Self {
        Self {
            x_prev,
            scale: x_next - x_prev,
            a: 3.0 * f_prev + 3.0 * f_next - 6.0 * average,
            b: -(4.0 * f_prev + 2.0 * f_next - 6.0 * average),
            c: f_prev,
            prev_primitive,
            f_next,
        }
    }

    fn value(&self, x: f64) -> f64 {
        let u = (x - self.x_prev) / self.scale;
        self.a * u * u + self.b * u + self.c
    }

    fn derivative(&self, x: f64) -> f64 {
        let u = (x - self.x_prev) / self.scale;
        (2.0 * self.a * u + self.b) / self.scale
    }

    fn primitive(&self, x: f64) -> f64 {
        let u = (x - self.x_prev) / self.scale;
        self.prev_primitive + self.scale * (self.a / 3.0 * u * u + self.b / 2.0 * u + self.c) * u
    }
}

/// Region where a shape is pinned at zero.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ZeroRegion {
    /// Share of the period left to the non-zero parts.
    ratio: f64,
    start: f64,
    end: f64,
}

/// Quadratic that would dip below zero, squeezed towards the period ends
/// with a zero stretch in between.
#[derive(Debug, Clone, Copy, PartialEq)]
struct QuadraticMin {
    x1: f64,
    x4: f64,
    a: f64,
    b: f64,
    c: f64,
    primitive1: f64,
    primitive2: f64,
    scale: f64,
    zero: Option<ZeroRegion>,
    f_next: f64,
}

impl QuadraticMin {
    fn new(x_prev: f64, x_next: f64, f_prev: f64, f_next: f64, average: f64, prev_primitive: f64) -> Self {
        let mut shape = Self {
            x1: x_prev,
            x4: x_next,
            a: 3.0 * f_prev + 3.0 * f_next - 6.0 * average,
            b: -(4.0 * f_prev + 2.0 * f_next - 6.0 * average),
            c: f_prev,
            primitive1: prev_primitive,
            primitive2: prev_primitive,
            scale: x_next - x_prev,
            zero: None,
            f_next,
        };

        let d = shape.b * shape.b - 4.0 * shape.a * shape.c;
        if d > 0.0 {
            let a_av = 36.0;
            let b_av = -24.0 * (f_prev + f_next);
            let c_av = 4.0 * (f_prev * f_prev + f_prev * f_next + f_next * f_next);
            let d_av = b_av * b_av - 4.0 * a_av * c_av;
            if d_av >= 0.0 {
                let av_root = (-b_av - d_av.sqrt()) / (2.0 * a_av);
                let ratio = average / av_root;
                shape.scale *= ratio;
                shape.a = 3.0 * f_prev + 3.0 * f_next - 6.0 * av_root;
                shape.b = -(4.0 * f_prev + 2.0 * f_next - 6.0 * av_root);
                let x_root = -shape.b / (2.0 * shape.a);
                let width = x_next - x_prev;
                shape.zero = Some(ZeroRegion {
                    ratio,
                    start: x_prev + ratio * width * x_root,
                    end: x_next - ratio * width * (1.0 - x_root),
                });
                shape.primitive2 = prev_primitive
                    + shape.scale * (shape.a / 3.0 * x_root * x_root + shape.b / 2.0 * x_root + shape.c)
                        * x_root;
            }
        }
        shape
    }

    /// Local coordinate and its derivative with respect to x, or `None`
    /// inside the zero stretch.
    fn local(&self, x: f64, strict_start: bool) -> Option<(f64, f64)> {
        let width = self.x4 - self.x1;
        let u = (x - self.x1) / width;
        match self.zero {
            None => Some((u, 1.0 / width)),
            Some(zero) => {
                let before = if strict_start { x < zero.start } else { x <= zero.start };
                if before {
                    Some((u / zero.ratio, 1.0 / (width * zero.ratio)))
                } else if x < zero.end {
                    None
                } else {
                    Some((1.0 - (1.0 - u) / zero.ratio, 1.0 / (width * zero.ratio)))
                }
            }
        }
    }

    fn value(&self, x: f64) -> f64 {
        match self.local(x, false) {
            Some((u, _)) => self.c + self.b * u + self.a * u * u,
            None => 0.0,
        }
    }

    fn derivative(&self, x: f64) -> f64 {
        match self.local(x, false) {
            Some((u, du)) => (self.b + 2.0 * self.a * u) * du,
            None => 0.0,
        }
    }

    fn primitive(&self, x: f64) -> f64 {
        match self.local(x, true) {
            Some((u, _)) => {
                self.primitive1 + self.scale * (self.a / 3.0 * u * u + self.b / 2.0 * u + self.c) * u
            }
            None => self.primitive2,
        }
    }
}

/// Flat then rising (or falling) quadratically to the end value.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Monotone2 {
    x_prev: f64,
    scale: f64,
    g_prev: f64,
    g_next: f64,
    average: f64,
    eta: f64,
    prev_primitive: f64,
}

impl Monotone2 {
    fn curvature(&self) -> f64 {
        (self.g_next - self.g_prev) / ((1.0 - self.eta) * (1.0 - self.eta))
    }

    fn value(&self, x: f64) -> f64 {
        let u = (x - self.x_prev) / self.scale;
        if u <= self.eta {
            self.average + self.g_prev
        } else {
            self.average + self.g_prev + self.curvature() * (u - self.eta) * (u - self.eta)
        }
    }

    fn derivative(&self, x: f64) -> f64 {
        let u = (x - self.x_prev) / self.scale;
        if u <= self.eta {
            0.0
        } else {
            2.0 * self.curvature() * (u - self.eta) / self.scale
        }
    }

    fn primitive(&self, x: f64) -> f64 {
        let u = (x - self.x_prev) / self.scale;
        let eta = self.eta;
        let linear = self.average * u + self.g_prev * u;
        if u <= eta {
            self.prev_primitive + self.scale * linear
        } else {
            let tail = (u * u * u - eta * eta * eta) / 3.0 - eta * u * u + eta * eta * u;
            self.prev_primitive + self.scale * (linear + self.curvature() * tail)
        }
    }

    fn f_next(&self) -> f64 {
        self.average + self.g_next
    }
}

/// Quadratic from the start value, then flat.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Monotone3 {
    x_prev: f64,
    scale: f64,
    g_prev: f64,
    g_next: f64,
    average: f64,
    eta: f64,
    prev_primitive: f64,
}

impl Monotone3 {
    fn curvature(&self) -> f64 {
        (self.g_prev - self.g_next) / (self.eta * self.eta)
    }

    fn value(&self, x: f64) -> f64 {
        let u = (x - self.x_prev) / self.scale;
        if u <= self.eta {
            self.average + self.g_next + self.curvature() * (self.eta - u) * (self.eta - u)
        } else {
            self.average + self.g_next
        }
    }

    fn derivative(&self, x: f64) -> f64 {
        let u = (x - self.x_prev) / self.scale;
        if u <= self.eta {
            -2.0 * self.curvature() * (self.eta - u) / self.scale
        } else {
            0.0
        }
    }

    fn primitive(&self, x: f64) -> f64 {
        let u = (x - self.x_prev) / self.scale;
        let eta = self.eta;
        let linear = self.average * u + self.g_next * u;
        let head = if u <= eta {
            u * u * u / 3.0 - eta * u * u + eta * eta * u
        } else {
            eta * eta * eta / 3.0
        };
        self.prev_primitive + self.scale * (linear + self.curvature() * head)
    }

    fn f_next(&self) -> f64 {
        self.average + self.g_next
    }
}

/// Two quadratics meeting at their common extremum.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Monotone4 {
    x_prev: f64,
    scale: f64,
    g_prev: f64,
    g_next: f64,
    average: f64,
    eta: f64,
    prev_primitive: f64,
    a: f64,
    zero: Option<ZeroRegion>,
}

impl Monotone4 {
    fn new(
        x_prev: f64,
        x_next: f64,
        g_prev: f64,
        g_next: f64,
        average: f64,
        eta: f64,
        prev_primitive: f64,
    ) -> Self {
        Self {
            x_prev,
            scale: x_next - x_prev,
            g_prev,
            g_next,
            average,
            eta,
            prev_primitive,
            a: -0.5 * (eta * g_prev + (1.0 - eta) * g_next),
            zero: None,
        }
    }

    /// As [`Monotone4::new`], but lifting the shape and inserting a zero
    /// stretch when its minimum would be negative.
    fn non_negative(
        x_prev: f64,
        x_next: f64,
        g_prev: f64,
        g_next: f64,
        average: f64,
        eta: f64,
        prev_primitive: f64,
    ) -> Self {
        let mut shape = Self::new(x_prev, x_next, g_prev, g_next, average, eta, prev_primitive);
        if shape.a + shape.average <= 0.0 {
            let f_prev = shape.g_prev + shape.average;
            let f_next = shape.g_next + shape.average;
            let shift = (eta * f_prev + (1.0 - eta) * f_next) / 3.0 - shape.average;
            let period = shift * shape.scale / (shape.average + shift);
            let adjusted = shape.scale - period;
            shape.average += shift;
            shape.g_next = f_next - shape.average;
            shape.g_prev = f_prev - shape.average;
            shape.a = -(eta * shape.g_prev + (1.0 - eta) * shape.g_next) / 2.0;
            shape.zero = Some(ZeroRegion {
                ratio: adjusted / shape.scale,
                start: x_prev + adjusted * eta,
                end: x_prev + shape.scale - adjusted * (1.0 - eta),
            });
        }
        shape
    }

    fn left(&self, u: f64) -> f64 {
        self.average + self.a + (self.g_prev - self.a) * (self.eta - u) * (self.eta - u) / (self.eta * self.eta)
    }

    fn left_slope(&self, u: f64) -> f64 {
        -2.0 * (self.g_prev - self.a) * (self.eta - u) / (self.eta * self.eta)
    }

    fn left_integral(&self, u: f64) -> f64 {
        let eta = self.eta;
        (self.average + self.a + (self.g_prev - self.a) / (eta * eta) * (eta * eta - eta * u + u * u / 3.0)) * u
    }

    fn right(&self, u: f64) -> f64 {
        let w = 1.0 - self.eta;
        self.average + self.a + (self.g_next - self.a) * (u - self.eta) * (u - self.eta) / (w * w)
    }

    fn right_slope(&self, u: f64) -> f64 {
        let w = 1.0 - self.eta;
        2.0 * (self.g_next - self.a) * (u - self.eta) / (w * w)
    }

    fn right_integral(&self, u: f64) -> f64 {
        let eta = self.eta;
        let w = 1.0 - eta;
        self.average * u
            + self.a * u
            + (self.g_prev - self.a) * (eta / 3.0)
            + (self.g_next - self.a) / (w * w)
                * (u * u * u / 3.0 - eta * u * u + eta * eta * u - eta * eta * eta / 3.0)
    }

    fn value(&self, x: f64) -> f64 {
        let u = (x - self.x_prev) / self.scale;
        match self.zero {
            None if u <= self.eta => self.left(u),
            None => self.right(u),
            Some(zero) if x <= zero.start => self.left(u / zero.ratio),
            Some(zero) if x < zero.end => 0.0,
            Some(zero) => self.right(1.0 - (1.0 - u) / zero.ratio),
        }
    }

    fn derivative(&self, x: f64) -> f64 {
        let u = (x - self.x_prev) / self.scale;
        match self.zero {
            None if u <= self.eta => self.left_slope(u) / self.scale,
            None => self.right_slope(u) / self.scale,
            Some(zero) if x <= zero.start => {
                self.left_slope(u / zero.ratio) / (self.scale * zero.ratio)
            }
            Some(zero) if x < zero.end => 0.0,
            Some(zero) => {
                self.right_slope(1.0 - (1.0 - u) / zero.ratio) / (self.scale * zero.ratio)
            }
        }
    }

    fn primitive(&self, x: f64) -> f64 {
        let u = (x - self.x_prev) / self.scale;
        match self.zero {
            None if u <= self.eta => self.prev_primitive + self.scale * self.left_integral(u),
            None => self.prev_primitive + self.scale * self.right_integral(u),
            Some(zero) => {
                let scale = self.scale * zero.ratio;
                if x <= zero.start {
                    self.prev_primitive + scale * self.left_integral(u / zero.ratio)
                } else if x <= zero.end {
                    self.prev_primitive + scale * self.left_integral(self.eta)
                } else {
                    self.prev_primitive + scale * self.right_integral(1.0 - (1.0 - u) / zero.ratio)
                }
            }
        }
    }

    fn f_next(&self) -> f64 {
        self.average + self.g_next
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum QuadraticShape {
    Plain(Quadratic),
    NonNegative(QuadraticMin),
}

impl QuadraticShape {
    fn build(
        non_negative: bool,
        x_prev: f64,
        x_next: f64,
        f_prev: f64,
        f_next: f64,
        average: f64,
        prev_primitive: f64,
    ) -> Self {
        if non_negative {
            Self::NonNegative(QuadraticMin::new(x_prev, x_next, f_prev, f_next, average, prev_primitive))
        } else {
            Self::Plain(Quadratic::new(x_prev, x_next, f_prev, f_next, average, prev_primitive))
        }
    }

    fn value(&self, x: f64) -> f64 {
        match self {
            Self::Plain(s) => s.value(x),
            Self::NonNegative(s) => s.value(x),
        }
    }

    fn derivative(&self, x: f64) -> f64 {
        match self {
            Self::Plain(s) => s.derivative(x),
            Self::NonNegative(s) => s.derivative(x),
        }
    }

    fn primitive(&self, x: f64) -> f64 {
        match self {
            Self::Plain(s) => s.primitive(x),
            Self::NonNegative(s) => s.primitive(x),
        }
    }

    fn f_next(&self) -> f64 {
        match self {
            Self::Plain(s) => s.f_next,
            Self::NonNegative(s) => s.f_next,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MonotoneShape {
    FlatThenCurved(Monotone2),
    CurvedThenFlat(Monotone3),
    DoubleQuadratic(Monotone4),
}

impl MonotoneShape {
    fn value(&self, x: f64) -> f64 {
        match self {
            Self::FlatThenCurved(s) => s.value(x),
            Self::CurvedThenFlat(s) => s.value(x),
            Self::DoubleQuadratic(s) => s.value(x),
        }
    }

    fn derivative(&self, x: f64) -> f64 {
        match self {
            Self::FlatThenCurved(s) => s.derivative(x),
            Self::CurvedThenFlat(s) => s.derivative(x),
            Self::DoubleQuadratic(s) => s.derivative(x),
        }
    }

    fn primitive(&self, x: f64) -> f64 {
        match self {
            Self::FlatThenCurved(s) => s.primitive(x),
            Self::CurvedThenFlat(s) => s.primitive(x),
            Self::DoubleQuadratic(s) => s.primitive(x),
        }
    }

    fn f_next(&self) -> f64 {
        match self {
            Self::FlatThenCurved(s) => s.f_next(),
            Self::CurvedThenFlat(s) => s.f_next(),
            Self::DoubleQuadratic(s) => s.f_next(),
        }
    }
}

/// The interpolant over one period.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Flat(Flat),
    Line(Line),
    Quadratic(QuadraticShape),
    Monotone(MonotoneShape),
    Blend {
        weight: f64,
        quadratic: QuadraticShape,
        monotone: MonotoneShape,
    },
}

impl Section {
    fn value(&self, x: f64) -> f64 {
        match self {
            Self::Flat(s) => s.value(x),
            Self::Line(s) => s.value(x),
            Self::Quadratic(s) => s.value(x),
            Self::Monotone(s) => s.value(x),
            Self::Blend {
                weight,
                quadratic,
                monotone,
            } => weight * quadratic.value(x) + (1.0 - weight) * monotone.value(x),
        }
    }

    fn derivative(&self, x: f64) -> f64 {
        match self {
            Self::Flat(s) => s.derivative(x),
            Self::Line(s) => s.derivative(x),
            Self::Quadratic(s) => s.derivative(x),
            Self::Monotone(s) => s.derivative(x),
            Self::Blend {
                weight,
                quadratic,
                monotone,
            } => weight * quadratic.derivative(x) + (1.0 - weight) * monotone.derivative(x),
        }
    }

    fn primitive(&self, x: f64) -> f64 {
        match self {
            Self::Flat(s) => s.primitive(x),
            Self::Line(s) => s.primitive(x),
            Self::Quadratic(s) => s.primitive(x),
            Self::Monotone(s) => s.primitive(x),
            Self::Blend {
                weight,
                quadratic,
                monotone,
            } => weight * quadratic.primitive(x) + (1.0 - weight) * monotone.primitive(x),
        }
    }

    fn f_next(&self) -> f64 {
        match self {
            Self::Flat(s) => s.f_next(),
            Self::Line(s) => s.f_next,
            Self::Quadratic(s) => s.f_next(),
            Self::Monotone(s) => s.f_next(),
            Self::Blend {
                weight,
                quadratic,
                monotone,
            } => weight * quadratic.f_next() + (1.0 - weight) * monotone.f_next(),
        }
    }
}

/// Chooses the shape of one period from its boundary values and average.
fn build_section(
    params: &ConvexMonotoneParams,
    (x_prev, x_next): (f64, f64),
    (f_prev, f_next): (f64, f64),
    average: f64,
    prev_primitive: f64,
) -> Section {
    let g_prev = f_prev - average;
    let g_next = f_next - average;

    if g_prev.abs() < 1.0e-14 && g_next.abs() < 1.0e-14 {
        return Section::Line(Line::new(f_prev, f_next, prev_primitive, x_prev, x_next));
    }

    let quadratic_shape = |non_negative: bool| {
        QuadraticShape::build(non_negative, x_prev, x_next, f_prev, f_next, average, prev_primitive)
    };
    let double_quadratic = |eta: f64| {
        let shape = if params.force_positive {
            Monotone4::non_negative(x_prev, x_next, g_prev, g_next, average, eta, prev_primitive)
        } else {
            Monotone4::new(x_prev, x_next, g_prev, g_next, average, eta, prev_primitive)
        };
        MonotoneShape::DoubleQuadratic(shape)
    };

    let mut weight = params.quadraticity;
    let mut quadratic = None;
    let mut monotone = None;

    if params.quadraticity > 0.0 {
        let dips = g_prev >= -2.0 * g_next && g_prev > -0.5 * g_next && params.force_positive;
        quadratic = Some(quadratic_shape(dips));
    }

    if params.quadraticity < 1.0 {
        let upper = (1.0 + params.monotonicity) / 2.0;
        let lower = (1.0 - params.monotonicity) / 2.0;

        if (g_prev > 0.0 && -0.5 * g_prev >= g_next && g_next >= -2.0 * g_prev)
            || (g_prev < 0.0 && -0.5 * g_prev <= g_next && g_next <= -2.0 * g_prev)
        {
            // The plain quadratic is already monotone here.
            weight = 1.0;
            if params.quadraticity == 0.0 {
                quadratic = Some(quadratic_shape(params.force_positive));
            }
        } else if (g_prev < 0.0 && g_next > -2.0 * g_prev) || (g_prev > 0.0 && g_next < -2.0 * g_prev) {
            let eta = (g_next + 2.0 * g_prev) / (g_next - g_prev);
            monotone = Some(if eta < upper {
                MonotoneShape::FlatThenCurved(Monotone2 {
                    x_prev,
                    scale: x_next - x_prev,
                    g_prev,
                    g_next,
                    average,
                    eta,
                    prev_primitive,
                })
            } else {
                double_quadratic(upper)
            });
        } else if (g_prev > 0.0 && g_next < 0.0 && g_next > -0.5 * g_prev)
            || (g_prev < 0.0 && g_next > 0.0 && g_next < -0.5 * g_prev)
        {
            let eta = g_next / (g_next - g_prev) * 3.0;
            monotone = Some(if eta > lower {
                MonotoneShape::CurvedThenFlat(Monotone3 {
                    x_prev,
                    scale: x_next - x_prev,
                    g_prev,
                    g_next,
                    average,
                    eta,
                    prev_primitive,
                })
            } else {
                double_quadratic(lower)
            });
        } else {
            let eta = (g_next / (g_prev + g_next)).clamp(lower, upper);
            monotone = Some(double_quadratic(eta));
        }
    }

    match (quadratic, monotone) {
        (Some(q), _) if weight == 1.0 => Section::Quadratic(q),
        (_, Some(m)) if weight == 0.0 => Section::Monotone(m),
        (Some(quadratic), Some(monotone)) => Section::Blend {
            weight,
            quadratic,
            monotone,
        },
        (Some(q), None) => Section::Quadratic(q),
        (None, Some(m)) => Section::Monotone(m),
        (None, None) => Section::Line(Line::new(f_prev, f_next, prev_primitive, x_prev, x_next)),
    }
}

// ============================================================================
// Interpolator
// ============================================================================

/// Sections of a previous build, carried into a rebuild over more nodes.
///
/// Obtained from [`ConvexMonotone::existing_sections`]; the sections are
/// reused unchanged for the leading periods of the next build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExistingSections(Vec<(f64, Section)>);

impl ExistingSections {
    /// Number of carried periods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing is carried.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Convex monotone interpolation.
///
/// # Example
///
/// ```rust
/// use strata_math::interpolation::{ConvexMonotone, ConvexMonotoneParams, Interpolator};
///
/// // Average forwards over [0, 1], [1, 2] and [2, 5]; the first ordinate is ignored.
/// let xs = vec![0.0, 1.0, 2.0, 5.0];
/// let forwards = vec![0.0, 0.02, 0.03, 0.035];
/// let cm = ConvexMonotone::new(xs, forwards, ConvexMonotoneParams::default()).unwrap();
///
/// let average = (cm.primitive(2.0).unwrap() - cm.primitive(1.0).unwrap()) / 1.0;
/// assert!((average - 0.03).abs() < 1e-14);
/// ```
#[derive(Debug, Clone)]
pub struct ConvexMonotone {
    xs: Vec<f64>,
    ys: Vec<f64>,
    params: ConvexMonotoneParams,
    flat_final_period: bool,
    /// Section of each period, keyed by the period's right node.
    sections: Vec<(f64, Section)>,
}

impl ConvexMonotone {
    /// Builds the interpolant over all nodes.
    ///
    /// # Errors
    ///
    /// Returns an error for fewer than 2 points, mismatched lengths,
    /// non-increasing abscissas or parameters outside `[0, 1]`.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>, params: ConvexMonotoneParams) -> MathResult<Self> {
        Self::with_existing(xs, ys, params, false, ExistingSections::default())
    }

    /// Builds the interpolant keeping previously built leading sections.
    ///
    /// With `flat_final_period` the last period is held flat at its average,
    /// which is how a partially built curve ends.
    ///
    /// # Errors
    ///
    /// As [`ConvexMonotone::new`], and when the carried sections do not
    /// match the leading nodes or leave fewer than two nodes to build.
    pub fn with_existing(
        xs: Vec<f64>,
        ys: Vec<f64>,
        params: ConvexMonotoneParams,
        flat_final_period: bool,
        existing: ExistingSections,
    ) -> MathResult<Self> {
        validate_nodes(&xs, &ys, 2)?;
        params.validate()?;

        let n = xs.len();
        if existing.len() + 1 >= n {
            return Err(MathError::invalid_input(format!(
                "{} existing sections leave nothing to build over {} nodes",
                existing.len(),
                n
            )));
        }
        if existing
            .0
            .iter()
            .zip(&xs[1..])
            .any(|((key, _), x)| key != x)
        {
            return Err(MathError::invalid_input(
                "existing sections do not match the leading nodes",
            ));
        }

        let mut interp = Self {
            xs,
            ys,
            params,
            flat_final_period,
            sections: existing.0,
        };
        interp.build();
        Ok(interp)
    }

    /// Sections that a rebuild over more nodes may keep.
    ///
    /// A flat final period is provisional and is not carried.
    #[must_use]
    pub fn existing_sections(&self) -> ExistingSections {
        let mut sections = self.sections.clone();
        if self.flat_final_period {
            sections.pop();
        }
        ExistingSections(sections)
    }

    /// Shape parameters.
    #[must_use]
    pub fn params(&self) -> &ConvexMonotoneParams {
        &self.params
    }

    /// Whether the last period is held flat.
    #[must_use]
    pub fn has_flat_final_period(&self) -> bool {
        self.flat_final_period
    }

    fn build(&mut self) {
        let (xs, ys) = (&self.xs, &self.ys);
        let n = xs.len();

        if n == 2 {
            self.sections = vec![(
                xs[1],
                Section::Flat(Flat {
                    value: ys[1],
                    prev_primitive: 0.0,
                    x_prev: xs[0],
                }),
            )];
            return;
        }

        let start = self.sections.len() + 1;

        // Boundary values between periods.
        let mut f = vec![0.0; n];
        for i in start..n - 1 {
            let dx_prev = xs[i] - xs[i - 1];
            let dx = xs[i + 1] - xs[i];
            f[i] = dx / (dx + dx_prev) * ys[i] + dx_prev / (dx + dx_prev) * ys[i + 1];
        }
        match self.sections.last() {
            Some((_, last)) => f[start - 1] = last.f_next(),
            None => f[0] = 1.5 * ys[1] - 0.5 * f[1],
        }
        f[n - 1] = 1.5 * ys[n - 1] - 0.5 * f[n - 2];
        if self.params.force_positive {
            f[0] = f[0].max(0.0);
            f[n - 1] = f[n - 1].max(0.0);
        }

        let mut primitive: f64 = (1..start).map(|i| ys[i] * (xs[i] - xs[i - 1])).sum();

        let end = if self.flat_final_period { n - 1 } else { n };
        for i in start..end {
            let section = build_section(
                &self.params,
                (xs[i - 1], xs[i]),
                (f[i - 1], f[i]),
                ys[i],
                primitive,
            );
            self.sections.push((xs[i], section));
            primitive += ys[i] * (xs[i] - xs[i - 1]);
        }

        if self.flat_final_period {
            self.sections.push((
                xs[n - 1],
                Section::Flat(Flat {
                    value: ys[n - 1],
                    prev_primitive: primitive,
                    x_prev: xs[n - 2],
                }),
            ));
        }
    }

    /// Section covering x, which must be in range.
    fn section(&self, x: f64) -> &Section {
        let i = self
            .sections
            .partition_point(|(key, _)| *key <= x)
            .min(self.sections.len() - 1);
        &self.sections[i].1
    }
}

impl Interpolator for ConvexMonotone {
    fn interpolate(&self, x: f64) -> MathResult<f64> {
        check_range(&self.xs, x)?;
        Ok(self.section(x).value(x))
    }

    fn derivative(&self, x: f64) -> MathResult<f64> {
        check_range(&self.xs, x)?;
        Ok(self.section(x).derivative(x))
    }

    fn primitive(&self, x: f64) -> MathResult<f64> {
        check_range(&self.xs, x)?;
        Ok(self.section(x).primitive(x))
    }

    fn min_x(&self) -> f64 {
        self.xs[0]
    }

    fn max_x(&self) -> f64 {
        self.xs[self.xs.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn average(cm: &ConvexMonotone, a: f64, b: f64) -> f64 {
        (cm.primitive(b).unwrap() - cm.primitive(a).unwrap()) / (b - a)
    }

    fn check_averages(xs: &[f64], ys: &[f64], params: ConvexMonotoneParams) {
        let cm = ConvexMonotone::new(xs.to_vec(), ys.to_vec(), params).unwrap();
        for i in 1..xs.len() {
            let avg = average(&cm, xs[i - 1], xs[i]);
            assert!(
                (avg - ys[i]).abs() < 1e-12,
                "{:?}: period {} averages {} instead of {}",
                params,
                i,
                avg,
                ys[i]
            );
        }
    }

    const XS: [f64; 7] = [0.0, 0.5, 1.0, 2.0, 3.0, 5.0, 10.0];
    const SHAPES: [[f64; 7]; 4] = [
        [0.0, 0.020, 0.025, 0.030, 0.035, 0.040, 0.042],
        [0.0, 0.050, 0.040, 0.030, 0.025, 0.022, 0.020],
        [0.0, 0.020, 0.045, 0.025, 0.040, 0.005, 0.030],
        [0.0, 0.030, 0.030, 0.030, 0.030, 0.030, 0.030],
    ];

    #[test]
    fn test_reproduces_period_averages() {
        let params = [
            ConvexMonotoneParams::default(),
            ConvexMonotoneParams::new(0.0, 1.0, false),
            ConvexMonotoneParams::new(0.0, 1.0, true),
            ConvexMonotoneParams::new(1.0, 0.5, true),
            ConvexMonotoneParams::new(0.5, 0.0, false),
        ];
        for p in params {
            for ys in SHAPES {
                check_averages(&XS, &ys, p);
            }
        }
    }

    #[test]
    fn test_first_value_ignored() {
        let mut ys = SHAPES[0];
        let a = ConvexMonotone::new(XS.to_vec(), ys.to_vec(), ConvexMonotoneParams::default()).unwrap();
        ys[0] = 42.0;
        let b = ConvexMonotone::new(XS.to_vec(), ys.to_vec(), ConvexMonotoneParams::default()).unwrap();
        for x in [0.0, 0.3, 1.7, 4.0, 10.0] {
            assert_eq!(a.interpolate(x).unwrap(), b.interpolate(x).unwrap());
        }
    }

    #[test]
    fn test_continuous_at_nodes() {
        for ys in SHAPES {
            let cm = ConvexMonotone::new(XS.to_vec(), ys.to_vec(), ConvexMonotoneParams::default())
                .unwrap();
            for x in &XS[1..XS.len() - 1] {
                let left = cm.interpolate(x - 1e-10).unwrap();
                let right = cm.interpolate(x + 1e-10).unwrap();
                assert!((left - right).abs() < 1e-8, "jump at {}: {} vs {}", x, left, right);
            }
        }
    }

    #[test]
    fn test_force_positive_keeps_values_non_negative() {
        let xs = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        let ys = vec![0.0, 0.05, 0.001, 0.05, 0.002];
        let cm = ConvexMonotone::new(xs.clone(), ys.clone(), ConvexMonotoneParams::default()).unwrap();
        for k in 0..=400 {
            let x = f64::from(k) * 0.01;
            assert!(cm.interpolate(x).unwrap() >= -1e-15, "negative at {}", x);
        }
        check_averages(&xs, &ys, ConvexMonotoneParams::default());
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let h = 1e-7;
        for ys in SHAPES {
            let cm = ConvexMonotone::new(XS.to_vec(), ys.to_vec(), ConvexMonotoneParams::default())
                .unwrap();
            for x in [0.2, 0.77, 1.3, 2.6, 4.1, 7.3] {
                let numerical =
                    (cm.interpolate(x + h).unwrap() - cm.interpolate(x - h).unwrap()) / (2.0 * h);
                let analytical = cm.derivative(x).unwrap();
                assert!(
                    (numerical - analytical).abs() < 1e-5,
                    "derivative at {}: {} vs {}",
                    x,
                    analytical,
                    numerical
                );
            }
        }
    }

    #[test]
    fn test_single_period_is_flat() {
        let cm = ConvexMonotone::new(vec![0.0, 2.0], vec![0.0, 0.03], ConvexMonotoneParams::default())
            .unwrap();
        assert_eq!(cm.interpolate(0.0).unwrap(), 0.03);
        assert_eq!(cm.interpolate(1.5).unwrap(), 0.03);
        assert_relative_eq!(cm.primitive(2.0).unwrap(), 0.06, epsilon = 1e-15);
    }

    #[test]
    fn test_flat_final_period() {
        let ys = SHAPES[0];
        let cm = ConvexMonotone::with_existing(
            XS.to_vec(),
            ys.to_vec(),
            ConvexMonotoneParams::default(),
            true,
            ExistingSections::default(),
        )
        .unwrap();
        assert_eq!(cm.interpolate(7.0).unwrap(), ys[6]);
        assert_eq!(cm.derivative(7.0).unwrap(), 0.0);
        assert_eq!(cm.existing_sections().len(), XS.len() - 2);
    }

    #[test]
    fn test_existing_sections_are_kept() {
        let ys = SHAPES[2];
        let params = ConvexMonotoneParams::default();

        // Build over the first five nodes with a provisional flat end, then
        // extend to all nodes keeping the settled sections.
        let partial = ConvexMonotone::with_existing(
            XS[..5].to_vec(),
            ys[..5].to_vec(),
            params,
            true,
            ExistingSections::default(),
        )
        .unwrap();
        let existing = partial.existing_sections();
        assert_eq!(existing.len(), 3);

        let mut moved = ys;
        moved[5] = 0.06;
        moved[6] = 0.01;
        let full = ConvexMonotone::with_existing(XS.to_vec(), moved.to_vec(), params, false, existing)
            .unwrap();

        for x in [0.1, 0.7, 1.5, 1.99] {
            assert_eq!(full.interpolate(x).unwrap(), partial.interpolate(x).unwrap());
        }
        for i in 1..XS.len() {
            assert_relative_eq!(average(&full, XS[i - 1], XS[i]), moved[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_existing_sections_must_match() {
        let params = ConvexMonotoneParams::default();
        let partial =
            ConvexMonotone::new(vec![0.0, 1.0, 2.0, 3.0], vec![0.0, 0.01, 0.02, 0.03], params).unwrap();
        let existing = partial.existing_sections();

        let shifted = ConvexMonotone::with_existing(
            vec![0.0, 1.5, 2.0, 3.0, 4.0],
            vec![0.0, 0.01, 0.02, 0.03, 0.04],
            params,
            false,
            existing.clone(),
        );
        assert!(shifted.is_err());

        let too_short = ConvexMonotone::with_existing(
            vec![0.0, 1.0, 2.0, 3.0],
            vec![0.0, 0.01, 0.02, 0.03],
            params,
            false,
            existing,
        );
        assert!(too_short.is_err());
    }

    #[test]
    fn test_invalid_params() {
        let xs = vec![0.0, 1.0, 2.0];
        let ys = vec![0.0, 0.01, 0.02];
        assert!(ConvexMonotone::new(xs.clone(), ys.clone(), ConvexMonotoneParams::new(1.2, 0.5, true)).is_err());
        assert!(ConvexMonotone::new(xs, ys, ConvexMonotoneParams::new(0.3, -0.1, true)).is_err());
    }
}
