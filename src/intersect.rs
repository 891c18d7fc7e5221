//! Ray/ray and ray/circle intersection.
//!
//! The stroke generator places internal join vertices by intersecting the
//! two offset rays of a turn, and validates round geometry against circles;
//! these are the only intersection primitives the engine needs.

use crate::basics::{PointD, EPSILON};
use crate::math::{dot, quadratic_formula, sqr_length};

// ============================================================================
// Solution flags
// ============================================================================

pub const NO_SOLUTIONS: u32 = 0;
pub const SINGLE_SOLUTION: u32 = 1;
pub const MULTIPLE_SOLUTIONS: u32 = 1 << 1;
pub const INFINITE_SOLUTIONS: u32 = 1 << 2;
pub const COINCIDENT_SHAPES: u32 = 1 << 3;
pub const TANGENT_SHAPES: u32 = 1 << 4;

// ============================================================================
// Shapes
// ============================================================================

/// A ray: origin plus (not necessarily normalized) direction.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: PointD,
    pub direction: PointD,
}

impl Ray {
    #[inline]
    pub fn new(origin: PointD, direction: PointD) -> Self {
        Self { origin, direction }
    }

    /// Point at parameter `t` along the ray.
    #[inline]
    pub fn at(&self, t: f64) -> PointD {
        PointD::new(
            self.origin.x + t * self.direction.x,
            self.origin.y + t * self.direction.y,
        )
    }
}

/// A circle: center plus radius.
#[derive(Debug, Clone, Copy)]
pub struct Circle {
    pub center: PointD,
    pub radius: f64,
}

// ============================================================================
// Intersections
// ============================================================================

/// Intersection between two rays.
///
/// On success `params[0]` / `params[1]` hold the intersection parameters
/// relative to `ray1` / `ray2`: the point is `ray1.at(params[0])` and,
/// equivalently, `ray2.at(params[1])`. Collinear rays report
/// `INFINITE_SOLUTIONS | COINCIDENT_SHAPES` with untouched parameters.
pub fn ray_ray_intersect(params: &mut [f64; 2], flags: &mut u32, ray1: &Ray, ray2: &Ray) -> bool {
    let det = ray2.direction.x * ray1.direction.y - ray2.direction.y * ray1.direction.x;
    let diff = PointD::new(ray2.origin.x - ray1.origin.x, ray2.origin.y - ray1.origin.y);

    if det.abs() > EPSILON {
        let inv_det = 1.0 / det;
        *flags = SINGLE_SOLUTION;
        params[0] = (ray2.direction.x * diff.y - ray2.direction.y * diff.x) * inv_det;
        params[1] = (ray1.direction.x * diff.y - ray1.direction.y * diff.x) * inv_det;
        return true;
    }

    // parallel rays: disjoint or the same line
    let det = ray1.direction.x * diff.y - ray1.direction.y * diff.x;
    if det.abs() > EPSILON {
        *flags = NO_SOLUTIONS;
        false
    } else {
        *flags = INFINITE_SOLUTIONS | COINCIDENT_SHAPES;
        true
    }
}

/// Intersection between a ray and a circle.
///
/// Intersection points are `ray.at(params[0])` and, when two exist,
/// `ray.at(params[1])`; parameters come out sorted ascending and negative
/// solutions (behind the ray origin) are discarded.
pub fn ray_circle_intersect(
    params: &mut [f64; 2],
    flags: &mut u32,
    ray: &Ray,
    circle: &Circle,
) -> bool {
    debug_assert!(circle.radius > 0.0);

    let diff = PointD::new(
        ray.origin.x - circle.center.x,
        ray.origin.y - circle.center.y,
    );
    let a = sqr_length(ray.direction);
    let b = dot(diff, ray.direction);
    let c = sqr_length(diff) - circle.radius * circle.radius;

    let mut roots = [0.0f64; 2];
    let count = {
        let (r0, r1) = roots.split_at_mut(1);
        quadratic_formula(&mut r0[0], &mut r1[0], a, 2.0 * b, c)
    };

    if count == 0 {
        *flags = NO_SOLUTIONS;
        return false;
    }
    if count == 1 {
        if roots[0] < -EPSILON {
            *flags = NO_SOLUTIONS;
            return false;
        }
        *flags = SINGLE_SOLUTION | TANGENT_SHAPES;
        params[0] = roots[0];
        return true;
    }

    if roots[0] > roots[1] {
        roots.swap(0, 1);
    }
    if roots[0] >= -EPSILON {
        params[0] = roots[0];
        params[1] = roots[1];
        *flags = MULTIPLE_SOLUTIONS;
        true
    } else if roots[1] >= -EPSILON {
        params[0] = roots[1];
        *flags = SINGLE_SOLUTION;
        true
    } else {
        *flags = NO_SOLUTIONS;
        false
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_ray_crossing() {
        let r1 = Ray::new(PointD::new(0.0, 0.0), PointD::new(1.0, 0.0));
        let r2 = Ray::new(PointD::new(2.0, -1.0), PointD::new(0.0, 1.0));
        let mut params = [0.0; 2];
        let mut flags = 0;
        assert!(ray_ray_intersect(&mut params, &mut flags, &r1, &r2));
        assert_eq!(flags, SINGLE_SOLUTION);
        let p = r1.at(params[0]);
        assert!((p.x - 2.0).abs() < 1e-12);
        assert!(p.y.abs() < 1e-12);
    }

    #[test]
    fn test_ray_ray_parallel_disjoint() {
        let r1 = Ray::new(PointD::new(0.0, 0.0), PointD::new(1.0, 0.0));
        let r2 = Ray::new(PointD::new(0.0, 1.0), PointD::new(1.0, 0.0));
        let mut params = [0.0; 2];
        let mut flags = 0;
        assert!(!ray_ray_intersect(&mut params, &mut flags, &r1, &r2));
        assert_eq!(flags, NO_SOLUTIONS);
    }

    #[test]
    fn test_ray_ray_collinear() {
        let r1 = Ray::new(PointD::new(0.0, 0.0), PointD::new(1.0, 1.0));
        let r2 = Ray::new(PointD::new(2.0, 2.0), PointD::new(-1.0, -1.0));
        let mut params = [0.0; 2];
        let mut flags = 0;
        assert!(ray_ray_intersect(&mut params, &mut flags, &r1, &r2));
        assert!(flags & INFINITE_SOLUTIONS != 0);
    }

    #[test]
    fn test_ray_circle_two_hits() {
        let ray = Ray::new(PointD::new(-5.0, 0.0), PointD::new(1.0, 0.0));
        let circle = Circle {
            center: PointD::new(0.0, 0.0),
            radius: 2.0,
        };
        let mut params = [0.0; 2];
        let mut flags = 0;
        assert!(ray_circle_intersect(&mut params, &mut flags, &ray, &circle));
        assert_eq!(flags, MULTIPLE_SOLUTIONS);
        assert!((params[0] - 3.0).abs() < 1e-9);
        assert!((params[1] - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_ray_circle_miss() {
        let ray = Ray::new(PointD::new(-5.0, 10.0), PointD::new(1.0, 0.0));
        let circle = Circle {
            center: PointD::new(0.0, 0.0),
            radius: 2.0,
        };
        let mut params = [0.0; 2];
        let mut flags = 0;
        assert!(!ray_circle_intersect(&mut params, &mut flags, &ray, &circle));
    }

    #[test]
    fn test_ray_circle_behind_origin() {
        let ray = Ray::new(PointD::new(5.0, 0.0), PointD::new(1.0, 0.0));
        let circle = Circle {
            center: PointD::new(0.0, 0.0),
            radius: 2.0,
        };
        let mut params = [0.0; 2];
        let mut flags = 0;
        assert!(!ray_circle_intersect(&mut params, &mut flags, &ray, &circle));
        assert_eq!(flags, NO_SOLUTIONS);
    }
}
