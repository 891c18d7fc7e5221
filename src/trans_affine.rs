//! Affine transformation matrix.
//!
//! The path-to-surface transform applied before rasterization. Besides the
//! usual compose/apply/invert operations it exposes the per-axis scale
//! factors that the flatten-accuracy computation depends on.

/// Epsilon for affine matrix comparisons.
pub const AFFINE_EPSILON: f64 = 1e-14;

/// 2-D affine transformation matrix.
///
/// Stores six components: `[sx, shy, shx, sy, tx, ty]` representing the
/// matrix:
///
/// ```text
///   | sx  shx tx |
///   | shy  sy ty |
///   |  0    0  1 |
/// ```
///
/// Transform: `x' = x*sx + y*shx + tx`, `y' = x*shy + y*sy + ty`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransAffine {
    pub sx: f64,
    pub shy: f64,
    pub shx: f64,
    pub sy: f64,
    pub tx: f64,
    pub ty: f64,
}

impl TransAffine {
    // ====================================================================
    // Construction
    // ====================================================================

    /// Identity matrix.
    pub fn new() -> Self {
        Self {
            sx: 1.0,
            shy: 0.0,
            shx: 0.0,
            sy: 1.0,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// Custom matrix from six components.
    pub fn new_custom(sx: f64, shy: f64, shx: f64, sy: f64, tx: f64, ty: f64) -> Self {
        Self {
            sx,
            shy,
            shx,
            sy,
            tx,
            ty,
        }
    }

    /// Rotation matrix.
    pub fn new_rotation(a: f64) -> Self {
        let (sa, ca) = a.sin_cos();
        Self::new_custom(ca, sa, -sa, ca, 0.0, 0.0)
    }

    /// Non-uniform scaling matrix.
    pub fn new_scaling(x: f64, y: f64) -> Self {
        Self::new_custom(x, 0.0, 0.0, y, 0.0, 0.0)
    }

    /// Translation matrix.
    pub fn new_translation(x: f64, y: f64) -> Self {
        Self::new_custom(1.0, 0.0, 0.0, 1.0, x, y)
    }

    // ====================================================================
    // Operations
    // ====================================================================

    /// Apply the transform to a point.
    #[inline]
    pub fn transform(&self, x: &mut f64, y: &mut f64) {
        let tmp = *x;
        *x = tmp * self.sx + *y * self.shx + self.tx;
        *y = tmp * self.shy + *y * self.sy + self.ty;
    }

    /// Multiply by `m` (apply self first, then `m`).
    pub fn multiply(&mut self, m: &TransAffine) -> &mut Self {
        let t0 = self.sx * m.sx + self.shy * m.shx;
        let t2 = self.shx * m.sx + self.sy * m.shx;
        let t4 = self.tx * m.sx + self.ty * m.shx + m.tx;
        self.shy = self.sx * m.shy + self.shy * m.sy;
        self.sy = self.shx * m.shy + self.sy * m.sy;
        self.ty = self.tx * m.shy + self.ty * m.sy + m.ty;
        self.sx = t0;
        self.shx = t2;
        self.tx = t4;
        self
    }

    /// Matrix determinant.
    #[inline]
    pub fn determinant(&self) -> f64 {
        self.sx * self.sy - self.shy * self.shx
    }

    /// Invert in place. A singular matrix inverts to non-finite components;
    /// callers gate on [`TransAffine::is_singular`] first.
    pub fn invert(&mut self) -> &mut Self {
        let d = 1.0 / self.determinant();

        let t0 = self.sy * d;
        self.sy = self.sx * d;
        self.shy = -self.shy * d;
        self.shx = -self.shx * d;

        let t4 = -self.tx * t0 - self.ty * self.shx;
        self.ty = -self.tx * self.shy - self.ty * self.sy;

        self.sx = t0;
        self.tx = t4;
        self
    }

    /// Returns `true` if the matrix cannot be inverted.
    pub fn is_singular(&self) -> bool {
        self.determinant().abs() <= AFFINE_EPSILON
    }

    /// Returns `true` for the identity transform.
    pub fn is_identity(&self) -> bool {
        (self.sx - 1.0).abs() <= AFFINE_EPSILON
            && self.shy.abs() <= AFFINE_EPSILON
            && self.shx.abs() <= AFFINE_EPSILON
            && (self.sy - 1.0).abs() <= AFFINE_EPSILON
            && self.tx.abs() <= AFFINE_EPSILON
            && self.ty.abs() <= AFFINE_EPSILON
    }

    /// Per-axis scale factors: the lengths of the transformed basis vectors.
    ///
    /// These drive the flatten deviation - a path drawn under a 2x zoom needs
    /// four times the flattening accuracy to look equally smooth.
    pub fn scale_factors(&self) -> (f64, f64) {
        let x = (self.sx * self.sx + self.shy * self.shy).sqrt();
        let y = (self.shx * self.shx + self.sy * self.sy).sqrt();
        (x, y)
    }
}

impl Default for TransAffine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_transform() {
        let m = TransAffine::new();
        let (mut x, mut y) = (3.0, 4.0);
        m.transform(&mut x, &mut y);
        assert_eq!((x, y), (3.0, 4.0));
        assert!(m.is_identity());
    }

    #[test]
    fn test_translation() {
        let m = TransAffine::new_translation(10.0, -5.0);
        let (mut x, mut y) = (1.0, 2.0);
        m.transform(&mut x, &mut y);
        assert_eq!((x, y), (11.0, -3.0));
    }

    #[test]
    fn test_scaling_factors() {
        let m = TransAffine::new_scaling(2.0, 3.0);
        let (sx, sy) = m.scale_factors();
        assert!((sx - 2.0).abs() < 1e-12);
        assert!((sy - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_rotation_preserves_scale() {
        let m = TransAffine::new_rotation(0.7);
        let (sx, sy) = m.scale_factors();
        assert!((sx - 1.0).abs() < 1e-12);
        assert!((sy - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_multiply_then_invert_roundtrip() {
        let mut m = TransAffine::new_rotation(0.3);
        m.multiply(&TransAffine::new_scaling(2.0, 0.5));
        m.multiply(&TransAffine::new_translation(7.0, 11.0));

        let mut inv = m;
        inv.invert();

        let (mut x, mut y) = (5.0, -2.0);
        m.transform(&mut x, &mut y);
        inv.transform(&mut x, &mut y);
        assert!((x - 5.0).abs() < 1e-9);
        assert!((y + 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_singular_detection() {
        let m = TransAffine::new_scaling(0.0, 1.0);
        assert!(m.is_singular());
        assert!(!TransAffine::new().is_singular());
    }
}
