//! Quadratic and cubic Bezier curves: evaluation, tangents, arc length,
//! and adaptive flattening.
//!
//! Flattening works by cutting off, at each step, the longest leading piece
//! of the curve whose chordal deviation stays within tolerance. The cut
//! parameter comes from a closed-form relation between the tolerance and the
//! perpendicular offsets of the control points, so no recursive subdivision
//! is needed. Non-monotone curves are first split at their extremum
//! parameters (quadratic-formula roots of the derivative) so that each piece
//! bends one way only.

use arrayvec::ArrayVec;

use crate::basics::{
    clamp, AaBox, PointD, DEGENERATION_THRESHOLD, EPSILON, MAX_DEGENERATE_POINTS,
};
use crate::integration::romberg;
use crate::math::{point_lerp, quadratic_formula, sqr_length};

/// Iteration cap for the Newton inversion of arc length into a parameter.
const LENGTH_NEWTON_MAX_ITERATIONS: u32 = 15;

// ============================================================================
// Flatten parameters
// ============================================================================

/// Flattening thresholds, precomputed once per deviation change.
///
/// `deviation` is the squared chordal distance allowed between a curve and
/// its flattened polyline; every other field is a derived constant that the
/// inner flattening loops would otherwise recompute per cut.
#[derive(Debug, Clone, Copy)]
pub struct FlattenParams {
    /// Squared chordal distance tolerance.
    pub deviation: f64,
    /// Chordal distance, `sqrt(deviation)`.
    pub flatness: f64,
    /// `2 * sqrt(flatness)` - quadratic cut coefficient.
    pub two_sqrt_flatness: f64,
    /// `3 / flatness` - cubic cut-mode discriminant coefficient.
    pub three_over_flatness: f64,
    /// `2 * sqrt(flatness / 3)` - cubic cut coefficient, parabolic mode.
    pub two_sqrt_flatness_over_three: f64,
    /// `2 * cbrt(flatness / 3)` - cubic cut coefficient, cubic mode.
    pub two_cuberoot_flatness_over_three: f64,
    /// `64 * flatness` - near-flat test threshold for extremum splitting.
    pub sixtyfour_flatness: f64,
    /// `1 + 1 / (3 * sqrt(sqrt(flatness)))` - uniform sample count used for
    /// numerically degenerate curves.
    pub degenerate_curve_segments: i32,
}

impl FlattenParams {
    /// Build the full parameter set from a squared chordal deviation.
    pub fn from_deviation(deviation: f64) -> Self {
        debug_assert!(deviation > 0.0);
        let flatness = deviation.sqrt();
        Self {
            deviation,
            flatness,
            two_sqrt_flatness: 2.0 * flatness.sqrt(),
            three_over_flatness: 3.0 / flatness,
            two_sqrt_flatness_over_three: 2.0 * (flatness / 3.0).sqrt(),
            two_cuberoot_flatness_over_three: 2.0 * (flatness / 3.0).cbrt(),
            sixtyfour_flatness: 64.0 * flatness,
            degenerate_curve_segments: (1.0 / (3.0 * flatness.sqrt().sqrt())) as i32 + 1,
        }
    }
}

// ============================================================================
// Quadratic Bezier
// ============================================================================

/// A quadratic Bezier curve with precomputed first-derivative coefficients.
///
/// Immutable once constructed; rebuild it when the control points change.
#[derive(Debug, Clone, Copy)]
pub struct Bezier2 {
    pub p0: PointD,
    pub p1: PointD,
    pub p2: PointD,
    // tangent(u) = u * d0 + d1
    d0: PointD,
    d1: PointD,
}

impl Bezier2 {
    pub fn new(p0: PointD, p1: PointD, p2: PointD) -> Self {
        Self {
            p0,
            p1,
            p2,
            d0: PointD::new(
                2.0 * (p0.x - 2.0 * p1.x + p2.x),
                2.0 * (p0.y - 2.0 * p1.y + p2.y),
            ),
            d1: PointD::new(2.0 * (p1.x - p0.x), 2.0 * (p1.y - p0.y)),
        }
    }

    /// Position at local parameter `u`.
    pub fn eval(&self, u: f64) -> PointD {
        debug_assert!((0.0..=1.0).contains(&u));
        let u1 = 1.0 - u;
        let a = u1 * u1;
        let b = 2.0 * u * u1;
        let c = u * u;
        PointD::new(
            a * self.p0.x + b * self.p1.x + c * self.p2.x,
            a * self.p0.y + b * self.p1.y + c * self.p2.y,
        )
    }

    /// Tangent vector at local parameter `u`.
    pub fn tangent(&self, u: f64) -> PointD {
        debug_assert!((0.0..=1.0).contains(&u));
        PointD::new(u * self.d0.x + self.d1.x, u * self.d0.y + self.d1.y)
    }

    /// Arc length over the parameter range `[u0, u1]`.
    pub fn length(&self, u0: f64, u1: f64) -> f64 {
        debug_assert!(u0 <= u1);
        romberg(u0, u1, EPSILON.max(1e-7), |u| {
            sqr_length(self.tangent(u)).sqrt()
        })
    }

    /// Invert arc length: find `u` such that `length(0, u) == len`.
    ///
    /// Newton iteration with a clamped pivot; returns `(u, converged)`.
    pub fn param_at_length(&self, len: f64) -> (f64, bool) {
        param_at_length_impl(len, |u0, u1| self.length(u0, u1), |u| self.tangent(u))
    }

    /// Flatten into `points` within the tolerance carried by `params`.
    ///
    /// The final control point is appended only when `include_last` is set so
    /// that chained segments do not duplicate shared endpoints.
    pub fn flatten(&self, points: &mut Vec<PointD>, params: &FlattenParams, include_last: bool) {
        let mut bx = AaBox::from_points(self.p0, self.p1);
        bx.extend(self.p2);
        let dmax = bx.width().max(bx.height());

        // all control points coincident
        if dmax <= EPSILON {
            if include_last {
                points.push(self.p0);
            }
            return;
        }

        // numerically flat: uniform samples instead of adaptive cuts
        if dmax < DEGENERATION_THRESHOLD {
            let n = params.degenerate_curve_segments.min(MAX_DEGENERATE_POINTS);
            let step = 1.0 / n as f64;
            let mut t: f64 = 0.0;
            for _ in 0..n {
                points.push(self.eval(t.min(1.0)));
                t += step;
            }
            if include_last {
                points.push(self.p2);
            }
            return;
        }

        let p01 = PointD::new((self.p1.x - self.p0.x) / dmax, (self.p1.y - self.p0.y) / dmax);
        let p02 = PointD::new((self.p2.x - self.p0.x) / dmax, (self.p2.y - self.p0.y) / dmax);

        // p0 and p1 coincident
        if max_abs_component(p01) <= EPSILON {
            if max_abs_component(p02) <= EPSILON {
                if include_last {
                    points.push(self.p0);
                }
            } else {
                // the curve is a line from p0 to p2
                points.push(self.p0);
                if include_last {
                    points.push(self.p2);
                }
            }
            return;
        }

        let l = sqr_length(p01).sqrt();
        let v = PointD::new(p01.x / l, p01.y / l);
        let x1 = p01.x * v.x + p01.y * v.y;
        let x2 = p02.x * v.x + p02.y * v.y;

        if x2 < x1 {
            // the projection doubles back: split at the turning parameter
            // when the curve is close enough to its chord to warrant it
            let y2 = dmax * (-p02.x * v.y + p02.y * v.x).abs();
            if params.sixtyfour_flatness > y2 {
                let t = -x1 / (x2 - 2.0 * x1);
                let (left, right) = self.split(t);
                left.flatten_monotone(points, params, false);
                right.flatten_monotone(points, params, include_last);
                return;
            }
        }
        self.flatten_monotone(points, params, include_last);
    }

    /// Flatten a piece known to bend one way only.
    fn flatten_monotone(
        &self,
        points: &mut Vec<PointD>,
        params: &FlattenParams,
        include_last: bool,
    ) {
        let mut p0 = self.p0;
        let mut p1 = self.p1;
        let p2 = self.p2;

        points.push(self.p0);
        let w = params.two_sqrt_flatness;

        loop {
            let d = sqr_length(p1 - p0).sqrt();
            if d <= EPSILON {
                break;
            }

            let v = p2 - p0;
            let y2 = ((v.x * -(p1.y - p0.y) + v.y * (p1.x - p0.x)) / d).abs();
            if y2 <= EPSILON {
                break;
            }
            let t = w / y2.sqrt();
            if t + EPSILON >= 1.0 {
                break;
            }

            // cut off the leading piece and continue with the remainder
            let t1 = 1.0 - t;
            p0 = point_lerp(p0, t1, p1, t);
            p1 = point_lerp(p1, t1, p2, t);
            p0 = point_lerp(p0, t1, p1, t);

            points.push(p0);
        }
        if include_last {
            points.push(self.p2);
        }
    }

    /// De Casteljau split at `u` into the `[0, u]` and `[u, 1]` pieces.
    pub fn split(&self, u: f64) -> (Bezier2, Bezier2) {
        let l1 = point_lerp(self.p0, 1.0 - u, self.p1, u);
        let r1 = point_lerp(self.p1, 1.0 - u, self.p2, u);
        let mid = point_lerp(l1, 1.0 - u, r1, u);
        (
            Bezier2::new(self.p0, l1, mid),
            Bezier2::new(mid, r1, self.p2),
        )
    }
}

// ============================================================================
// Cubic Bezier
// ============================================================================

/// A cubic Bezier curve with precomputed first-derivative coefficients.
#[derive(Debug, Clone, Copy)]
pub struct Bezier3 {
    pub p0: PointD,
    pub p1: PointD,
    pub p2: PointD,
    pub p3: PointD,
    // tangent(u) = u^2 * d0 + u * d1 + d2
    d0: PointD,
    d1: PointD,
    d2: PointD,
}

impl Bezier3 {
    pub fn new(p0: PointD, p1: PointD, p2: PointD, p3: PointD) -> Self {
        Self {
            p0,
            p1,
            p2,
            p3,
            d0: PointD::new(
                3.0 * (p3.x - p0.x + 3.0 * (p1.x - p2.x)),
                3.0 * (p3.y - p0.y + 3.0 * (p1.y - p2.y)),
            ),
            d1: PointD::new(
                6.0 * (p0.x - 2.0 * p1.x + p2.x),
                6.0 * (p0.y - 2.0 * p1.y + p2.y),
            ),
            d2: PointD::new(3.0 * (p1.x - p0.x), 3.0 * (p1.y - p0.y)),
        }
    }

    /// Position at local parameter `u`.
    pub fn eval(&self, u: f64) -> PointD {
        debug_assert!((0.0..=1.0).contains(&u));
        let u1 = 1.0 - u;
        let a = u1 * u1 * u1;
        let b = 3.0 * u * u1 * u1;
        let c = 3.0 * u * u * u1;
        let d = u * u * u;
        PointD::new(
            a * self.p0.x + b * self.p1.x + c * self.p2.x + d * self.p3.x,
            a * self.p0.y + b * self.p1.y + c * self.p2.y + d * self.p3.y,
        )
    }

    /// Tangent vector at local parameter `u`.
    pub fn tangent(&self, u: f64) -> PointD {
        debug_assert!((0.0..=1.0).contains(&u));
        let u2 = u * u;
        PointD::new(
            u2 * self.d0.x + u * self.d1.x + self.d2.x,
            u2 * self.d0.y + u * self.d1.y + self.d2.y,
        )
    }

    /// Arc length over the parameter range `[u0, u1]`.
    pub fn length(&self, u0: f64, u1: f64) -> f64 {
        debug_assert!(u0 <= u1);
        romberg(u0, u1, EPSILON.max(1e-7), |u| {
            sqr_length(self.tangent(u)).sqrt()
        })
    }

    /// Invert arc length: find `u` such that `length(0, u) == len`.
    pub fn param_at_length(&self, len: f64) -> (f64, bool) {
        param_at_length_impl(len, |u0, u1| self.length(u0, u1), |u| self.tangent(u))
    }

    /// De Casteljau split at `u` into the `[0, u]` and `[u, 1]` pieces.
    pub fn split(&self, u: f64) -> (Bezier3, Bezier3) {
        let l1 = point_lerp(self.p0, 1.0 - u, self.p1, u);
        let m = point_lerp(self.p1, 1.0 - u, self.p2, u);
        let r2 = point_lerp(self.p2, 1.0 - u, self.p3, u);
        let l2 = point_lerp(l1, 1.0 - u, m, u);
        let r1 = point_lerp(m, 1.0 - u, r2, u);
        let mid = point_lerp(l2, 1.0 - u, r1, u);
        (
            Bezier3::new(self.p0, l1, l2, mid),
            Bezier3::new(mid, r1, r2, self.p3),
        )
    }

    /// Flatten into `points` within the tolerance carried by `params`.
    ///
    /// Points of maximum, inflection and cusp always appear in the output;
    /// the final control point only when `include_last` is set.
    pub fn flatten(&self, points: &mut Vec<PointD>, params: &FlattenParams, include_last: bool) {
        let mut bx = AaBox::from_points(self.p0, self.p1);
        bx.extend(self.p2);
        bx.extend(self.p3);
        let dmax = bx.width().max(bx.height());

        // all control points coincident
        if dmax <= EPSILON {
            if include_last {
                points.push(self.p0);
            }
            return;
        }

        // numerically flat: uniform samples instead of adaptive cuts
        if dmax < DEGENERATION_THRESHOLD {
            let n = params.degenerate_curve_segments.min(MAX_DEGENERATE_POINTS);
            let step = 1.0 / n as f64;
            let mut t: f64 = 0.0;
            for _ in 0..n {
                points.push(self.eval(t.min(1.0)));
                t += step;
            }
            if include_last {
                points.push(self.p3);
            }
            return;
        }

        let mut p01 = PointD::new((self.p1.x - self.p0.x) / dmax, (self.p1.y - self.p0.y) / dmax);
        let p02 = PointD::new((self.p2.x - self.p0.x) / dmax, (self.p2.y - self.p0.y) / dmax);
        let p03 = PointD::new((self.p3.x - self.p0.x) / dmax, (self.p3.y - self.p0.y) / dmax);

        let work;
        let y2: f64;
        let y3: f64;

        if max_abs_component(p01) <= EPSILON {
            if max_abs_component(p02) <= EPSILON {
                if max_abs_component(p03) <= EPSILON {
                    // all four coincident
                    if include_last {
                        points.push(self.p0);
                    }
                    return;
                }
                // just a line from p0 to p3
                points.push(self.p0);
                if include_last {
                    points.push(self.p3);
                }
                return;
            }

            // p0 == p1 with distinct p2: nudge p1 along the p0-p2 direction
            // so the cut loop has a usable leading tangent
            let ax = p02.x.abs();
            let ay = p02.y.abs();
            if ax < ay {
                if ax <= EPSILON {
                    p01.y = if p02.y > 0.0 { 4.0 * EPSILON } else { -4.0 * EPSILON };
                } else {
                    p01.x = if p02.x > 0.0 { 4.0 * EPSILON } else { -4.0 * EPSILON };
                    p01.y = (p01.x * p02.y) / p02.x;
                }
            } else if ay <= EPSILON {
                p01.x = if p02.x > 0.0 { 4.0 * EPSILON } else { -4.0 * EPSILON };
            } else {
                p01.y = if p02.y > 0.0 { 4.0 * EPSILON } else { -4.0 * EPSILON };
                p01.x = (p01.y * p02.x) / p02.y;
            }

            work = Bezier3::new(
                self.p0,
                PointD::new(p01.x * dmax + self.p0.x, p01.y * dmax + self.p0.y),
                self.p2,
                self.p3,
            );
            let l = sqr_length(p02).sqrt();
            let v = PointD::new(p02.x / l, p02.y / l);
            y2 = -p02.x * v.y + p02.y * v.x;
            y3 = -p03.x * v.y + p03.y * v.x;
        } else {
            work = *self;
            let l = sqr_length(p01).sqrt();
            let v = PointD::new(p01.x / l, p01.y / l);
            y2 = -p02.x * v.y + p02.y * v.x;
            y3 = -p03.x * v.y + p03.y * v.x;
        }

        let d = y2.abs().max(y3.abs());
        if params.sixtyfour_flatness > d * dmax {
            // near-flat curve: split at the x-extremum parameters so each
            // piece projects monotonically onto its chord
            let a = 3.0 * (p01.x - p02.x) + p03.x;
            let b = 2.0 * (p02.x - 2.0 * p01.x);
            let c = p01.x;
            let (mut t1, mut t2) = (-1.0, -1.0);
            let n = quadratic_formula(&mut t1, &mut t2, a, b, c);

            let mut splits: ArrayVec<f64, 2> = ArrayVec::new();
            if n >= 1 && t1 > EPSILON && t1 + EPSILON < 1.0 {
                splits.push(t1);
            }
            if n == 2 && t2 > EPSILON && t2 + EPSILON < 1.0 {
                splits.push(t2);
            }
            splits.sort_by(|a, b| a.total_cmp(b));

            match splits.as_slice() {
                [] => work.flatten_monotone(points, params, include_last),
                [t] => {
                    let (left, right) = work.split(*t);
                    left.flatten_monotone(points, params, false);
                    right.flatten_monotone(points, params, include_last);
                }
                [ta, tb] => {
                    let (left, rest) = work.split(*ta);
                    left.flatten_monotone(points, params, false);
                    // re-parameterize the second split into the remainder
                    let tb2 = (tb - ta) / (1.0 - ta);
                    let (mid, right) = rest.split(tb2);
                    mid.flatten_monotone(points, params, false);
                    right.flatten_monotone(points, params, include_last);
                }
                _ => unreachable!(),
            }
        } else {
            work.flatten_monotone(points, params, include_last);
        }
    }

    /// Flatten a piece known to bend one way only.
    fn flatten_monotone(
        &self,
        points: &mut Vec<PointD>,
        params: &FlattenParams,
        include_last: bool,
    ) {
        let mut bez = *self;

        points.push(self.p0);

        let w = params.three_over_flatness;
        let w0 = params.two_sqrt_flatness_over_three;
        let w1 = params.two_cuberoot_flatness_over_three;

        loop {
            let mut v01 = bez.p1 - bez.p0;
            let d = sqr_length(v01).sqrt();
            if d <= EPSILON {
                break;
            }
            v01.x /= d;
            v01.y /= d;

            let v2 = bez.p2 - bez.p0;
            let y2 = (v2.y * v01.x - v2.x * v01.y).abs();
            let v3 = bez.p3 - bez.p0;
            let y3 = v3.y * v01.x - v3.x * v01.y;

            // pick the cut law from whichever offset term dominates the
            // deviation of this piece
            let t = if y3 * y3 > w * y2 * y2 * y2 {
                let y3 = y3.abs();
                if y3 == 0.0 {
                    break;
                }
                w1 / y3.cbrt()
            } else {
                if y2 == 0.0 {
                    break;
                }
                w0 / y2.sqrt()
            };

            if t + EPSILON >= 1.0 {
                break;
            }

            let (_, right) = bez.split(t);
            points.push(right.p0);
            bez = right;
        }
        if include_last {
            points.push(self.p3);
        }
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

#[inline]
fn max_abs_component(p: PointD) -> f64 {
    p.x.abs().max(p.y.abs())
}

/// Newton inversion of a monotone arc-length function shared by both curve
/// orders. `(u, converged)`: `converged` is false when the iteration cap was
/// hit, in which case `u` is the best pivot reached.
fn param_at_length_impl<L, T>(len: f64, length: L, tangent: T) -> (f64, bool)
where
    L: Fn(f64, f64) -> f64,
    T: Fn(f64) -> PointD,
{
    let precision = 2.0 * EPSILON.max(1e-7);

    if len <= 0.0 {
        return (0.0, true);
    }
    let total = length(0.0, 1.0);
    if len >= total {
        return (1.0, true);
    }

    let mut pivot = len / total;
    for _ in 0..LENGTH_NEWTON_MAX_ITERATIONS {
        let error = length(0.0, pivot) - len;
        if (error / total).abs() <= precision {
            return (pivot, true);
        }
        let speed = sqr_length(tangent(pivot)).sqrt();
        debug_assert!(speed > EPSILON);
        pivot -= error / speed;
        pivot = clamp(pivot, 0.001, 0.999);
    }
    (pivot, false)
}

// ============================================================================
// Tests
// ============================================================================
