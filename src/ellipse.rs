//! Elliptical arcs: evaluation, tangents, arc length and flattening.
//!
//! An arc is a center, two semi-axis lengths, an offset rotation and an
//! angle domain walked clockwise or counter-clockwise. Flattening picks the
//! subdivision count in closed form from the chord/arc relationship of the
//! major semi-axis, then generates points with a rotation recurrence; two
//! extra points just inside the angle domain give downstream consumers
//! accurate endpoint tangents.

use crate::basics::{clamp, PointD, EPSILON, TWO_PI};
use crate::curves::FlattenParams;
use crate::integration::romberg;
use crate::math::sqr_length;

/// Relative angular inset of the two auxiliary tangent points.
const TANGENT_PRECISION: f64 = 0.001;

/// Iteration cap for the Newton inversion of arc length into a parameter.
const LENGTH_NEWTON_MAX_ITERATIONS: u32 = 15;

/// An elliptical arc.
///
/// Angles are expressed in the ellipse's own (pre-rotation) frame. The arc
/// runs from `start_angle` to `end_angle` in the direction given by `ccw`.
#[derive(Debug, Clone, Copy)]
pub struct EllipseArc {
    pub center: PointD,
    pub x_semi_axis: f64,
    pub y_semi_axis: f64,
    pub offset_rotation: f64,
    pub start_angle: f64,
    pub end_angle: f64,
    pub ccw: bool,
    cos_rot: f64,
    sin_rot: f64,
}

impl EllipseArc {
    pub fn new(
        center: PointD,
        x_semi_axis: f64,
        y_semi_axis: f64,
        offset_rotation: f64,
        start_angle: f64,
        end_angle: f64,
        ccw: bool,
    ) -> Self {
        debug_assert!(x_semi_axis >= 0.0 && y_semi_axis >= 0.0);
        let (sin_rot, cos_rot) = offset_rotation.sin_cos();
        Self {
            center,
            x_semi_axis,
            y_semi_axis,
            offset_rotation,
            start_angle,
            end_angle,
            ccw,
            cos_rot,
            sin_rot,
        }
    }

    /// Angle spanned by the arc, always positive, honoring the direction.
    pub fn span_angle(&self) -> f64 {
        if self.ccw {
            if self.start_angle < self.end_angle {
                self.end_angle - self.start_angle
            } else {
                TWO_PI - self.start_angle + self.end_angle
            }
        } else if self.start_angle < self.end_angle {
            TWO_PI - self.end_angle + self.start_angle
        } else {
            self.start_angle - self.end_angle
        }
    }

    /// Angle in the ellipse frame at local parameter `u` in `[0, 1]`.
    #[inline]
    fn angle_at(&self, u: f64) -> f64 {
        let span = self.span_angle();
        if self.ccw {
            self.start_angle + u * span
        } else {
            self.start_angle - u * span
        }
    }

    /// Position at a given ellipse-frame angle.
    pub fn eval_by_angle(&self, angle: f64) -> PointD {
        let p = PointD::new(
            self.x_semi_axis * angle.cos(),
            self.y_semi_axis * angle.sin(),
        );
        PointD::new(
            self.cos_rot * p.x - self.sin_rot * p.y + self.center.x,
            self.sin_rot * p.x + self.cos_rot * p.y + self.center.y,
        )
    }

    /// Position at local parameter `u`.
    pub fn eval(&self, u: f64) -> PointD {
        debug_assert!((0.0..=1.0).contains(&u));
        self.eval_by_angle(self.angle_at(u))
    }

    /// Tangent vector at local parameter `u` (derivative with respect to `u`).
    pub fn tangent(&self, u: f64) -> PointD {
        debug_assert!((0.0..=1.0).contains(&u));
        let angle = self.angle_at(u);
        let span = if self.ccw {
            self.span_angle()
        } else {
            -self.span_angle()
        };
        let dx = -self.x_semi_axis * angle.sin() * span;
        let dy = self.y_semi_axis * angle.cos() * span;
        PointD::new(
            self.cos_rot * dx - self.sin_rot * dy,
            self.sin_rot * dx + self.cos_rot * dy,
        )
    }

    /// Arc length over the parameter range `[u0, u1]`.
    ///
    /// Arcs with a zero-length semi-axis measure as the straight segment
    /// joining the endpoint evaluations.
    pub fn length(&self, u0: f64, u1: f64) -> f64 {
        debug_assert!(u0 <= u1);

        if self.x_semi_axis <= EPSILON && self.y_semi_axis <= EPSILON {
            return 0.0;
        }
        if self.x_semi_axis <= EPSILON || self.y_semi_axis <= EPSILON {
            let start = self.eval_by_angle(self.start_angle);
            let end = self.eval_by_angle(self.end_angle);
            let a = PointD::new(
                start.x + u0 * (end.x - start.x),
                start.y + u0 * (end.y - start.y),
            );
            let b = PointD::new(
                start.x + u1 * (end.x - start.x),
                start.y + u1 * (end.y - start.y),
            );
            return sqr_length(PointD::new(b.x - a.x, b.y - a.y)).sqrt();
        }
        romberg(u0, u1, EPSILON.max(1e-7), |u| {
            sqr_length(self.tangent(u)).sqrt()
        })
    }

    /// Invert arc length: find `u` such that `length(0, u) == len`.
    /// Returns `(u, converged)`.
    pub fn param_at_length(&self, len: f64) -> (f64, bool) {
        let precision = 2.0 * EPSILON.max(1e-7);

        if len <= 0.0 {
            return (0.0, true);
        }
        let total = self.length(0.0, 1.0);
        if len >= total {
            return (1.0, true);
        }

        // collapsed arcs have linear length in the parameter
        if self.x_semi_axis <= EPSILON || self.y_semi_axis <= EPSILON {
            if total <= EPSILON {
                return (0.0, true);
            }
            return (len / total, true);
        }

        let mut pivot = len / total;
        for _ in 0..LENGTH_NEWTON_MAX_ITERATIONS {
            let error = self.length(0.0, pivot) - len;
            if (error / total).abs() <= precision {
                return (pivot, true);
            }
            let speed = sqr_length(self.tangent(pivot)).sqrt();
            debug_assert!(speed > EPSILON);
            pivot -= error / speed;
            pivot = clamp(pivot, 0.001, 0.999);
        }
        (pivot, false)
    }

    /// Flatten into `points` within the tolerance carried by `params`.
    ///
    /// Besides the subdivision points, two auxiliary points are emitted just
    /// inside the start/end angles so that the stroker reads accurate
    /// endpoint tangents. Arcs with one zero-length semi-axis degenerate to
    /// the chord between the endpoint evaluations.
    pub fn flatten(&self, points: &mut Vec<PointD>, params: &FlattenParams, include_last: bool) {
        if self.x_semi_axis <= EPSILON {
            if self.y_semi_axis <= EPSILON {
                points.push(self.center);
                return;
            }
            points.push(self.eval_by_angle(self.start_angle));
            points.push(self.eval_by_angle(self.end_angle));
            return;
        }
        if self.y_semi_axis <= EPSILON {
            points.push(self.eval_by_angle(self.start_angle));
            points.push(self.eval_by_angle(self.end_angle));
            return;
        }

        let r = self.x_semi_axis.max(self.y_semi_axis);
        let dev = clamp(params.flatness, EPSILON, r - EPSILON * r);
        let beta = self.span_angle();

        // subdivision count from the chord/arc relation on the major axis
        let dev_over_radius = dev / r;
        let n1 = if dev_over_radius.abs() <= EPSILON {
            beta
        } else {
            beta / (2.0 * (1.0 - dev_over_radius).acos())
        };
        let n = if n1 > 3.0 { n1.ceil() as u32 } else { 3 };

        let a_over_b = self.x_semi_axis / self.y_semi_axis;
        let b_over_a = self.y_semi_axis / self.x_semi_axis;
        let delta_angle = beta / n as f64;
        let signed_delta = if self.ccw { delta_angle } else { -delta_angle };
        let (sin_delta, cos_delta) = signed_delta.sin_cos();

        // first point, analytically
        points.push(self.eval_by_angle(self.start_angle));
        // auxiliary point granting an (almost) correct start tangent
        points.push(self.eval_by_angle(self.start_angle + signed_delta * TANGENT_PRECISION));

        // rotation recurrence over the remaining subdivision points,
        // corrected by the axis ratio to stay on the ellipse
        let mut p = PointD::new(
            self.x_semi_axis * self.start_angle.cos(),
            self.y_semi_axis * self.start_angle.sin(),
        );
        for _ in 0..n.saturating_sub(1) {
            let w = PointD::new(
                p.x * cos_delta - a_over_b * p.y * sin_delta,
                b_over_a * p.x * sin_delta + p.y * cos_delta,
            );
            points.push(PointD::new(
                self.cos_rot * w.x - self.sin_rot * w.y + self.center.x,
                self.sin_rot * w.x + self.cos_rot * w.y + self.center.y,
            ));
            p = w;
        }

        // auxiliary point granting an (almost) correct end tangent
        points.push(self.eval_by_angle(self.end_angle - signed_delta * TANGENT_PRECISION));

        if include_last {
            // analytical, avoiding the recurrence's accumulated error
            points.push(self.eval_by_angle(self.end_angle));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::distance;

    fn quarter_circle() -> EllipseArc {
        EllipseArc::new(
            PointD::new(0.0, 0.0),
            10.0,
            10.0,
            0.0,
            0.0,
            std::f64::consts::FRAC_PI_2,
            true,
        )
    }

    #[test]
    fn test_span_angle() {
        let arc = quarter_circle();
        assert!((arc.span_angle() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);

        let cw = EllipseArc::new(
            PointD::new(0.0, 0.0),
            10.0,
            10.0,
            0.0,
            0.0,
            std::f64::consts::FRAC_PI_2,
            false,
        );
        assert!((cw.span_angle() - 1.5 * std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn test_eval_endpoints() {
        let arc = quarter_circle();
        let start = arc.eval(0.0);
        let end = arc.eval(1.0);
        assert!(distance(start, PointD::new(10.0, 0.0)) < 1e-12);
        assert!(distance(end, PointD::new(0.0, 10.0)) < 1e-12);
    }

    #[test]
    fn test_flatten_points_on_circle() {
        let arc = quarter_circle();
        let mut pts = Vec::new();
        arc.flatten(&mut pts, &FlattenParams::from_deviation(1e-4), true);
        assert!(pts.len() > 4);
        for p in &pts {
            let r = (p.x * p.x + p.y * p.y).sqrt();
            assert!((r - 10.0).abs() < 1e-2, "radius drifted to {r}");
        }
        assert!(distance(*pts.first().unwrap(), PointD::new(10.0, 0.0)) < 1e-12);
        assert!(distance(*pts.last().unwrap(), PointD::new(0.0, 10.0)) < 1e-12);
    }

    #[test]
    fn test_flatten_auxiliary_tangent_points() {
        let arc = quarter_circle();
        let mut pts = Vec::new();
        arc.flatten(&mut pts, &FlattenParams::from_deviation(1.0), true);
        // second point sits just inside the start angle
        let d = distance(pts[0], pts[1]);
        assert!(d > 0.0 && d < 0.1, "auxiliary point too far: {d}");
    }

    #[test]
    fn test_flatten_accuracy_scales_point_count() {
        let arc = quarter_circle();
        let mut coarse = Vec::new();
        let mut fine = Vec::new();
        arc.flatten(&mut coarse, &FlattenParams::from_deviation(1.0), true);
        arc.flatten(&mut fine, &FlattenParams::from_deviation(1e-6), true);
        assert!(fine.len() > coarse.len());
    }

    #[test]
    fn test_zero_semi_axis_degenerates_to_chord() {
        let arc = EllipseArc::new(
            PointD::new(5.0, 5.0),
            0.0,
            10.0,
            0.0,
            0.0,
            std::f64::consts::PI,
            true,
        );
        let mut pts = Vec::new();
        arc.flatten(&mut pts, &FlattenParams::from_deviation(1e-4), true);
        assert_eq!(pts.len(), 2);
        assert!(distance(pts[0], arc.eval_by_angle(0.0)) < 1e-12);
        assert!(distance(pts[1], arc.eval_by_angle(std::f64::consts::PI)) < 1e-12);
    }

    #[test]
    fn test_point_ellipse_single_point() {
        let arc = EllipseArc::new(PointD::new(3.0, 4.0), 0.0, 0.0, 0.0, 0.0, 1.0, true);
        let mut pts = Vec::new();
        arc.flatten(&mut pts, &FlattenParams::from_deviation(1e-4), true);
        assert_eq!(pts.len(), 1);
        assert_eq!(pts[0], PointD::new(3.0, 4.0));
    }

    #[test]
    fn test_circle_arc_length() {
        let arc = quarter_circle();
        // quarter circle of radius 10
        let expected = 0.5 * std::f64::consts::PI * 10.0;
        assert!((arc.length(0.0, 1.0) - expected).abs() < 1e-4);
    }

    #[test]
    fn test_param_at_length_midpoint() {
        let arc = quarter_circle();
        let half = arc.length(0.0, 1.0) * 0.5;
        let (u, _) = arc.param_at_length(half);
        // constant-speed parameterization on a circle
        assert!((u - 0.5).abs() < 1e-3);
    }
}
