//! Engine front-end: accuracy derivation, cache orchestration and the
//! draw-call error policy.
//!
//! The engine owns one rasterizer and one stroke generator per rendering
//! context. A draw call runs flatten-cache -> (stroke) -> rasterize; when
//! any stage reports an allocation failure the engine recovers scratch
//! memory everywhere it can and retries the call exactly once before
//! surfacing the error.

use log::warn;

use crate::basics::{AaQuality, AaBox, FillRule, PointD, RectI, EPSILON};
use crate::curves::FlattenParams;
use crate::error::{try_reserve, Error, Result};
use crate::path::{Path, SegmentKind};
use crate::rasterizer::{Rasterizer, ScanlineFiller};
use crate::stroke::{StrokeCacheDesc, StrokeGenerator, StrokeStyle};
use crate::trans_affine::TransAffine;

/// Default curve quality (host scale 0..=100).
const DEFAULT_CURVE_QUALITY: u32 = 75;

/// The rendering engine: one per context, passed by exclusive reference
/// into each draw call. Not safe for concurrent use.
pub struct Engine {
    rasterizer: Rasterizer,
    stroker: StrokeGenerator,
    /// Current flattening thresholds; rebuilt when the effective deviation
    /// changes.
    flatten_params: Option<FlattenParams>,
    /// Quality coefficient derived from the host quality setting.
    quality_coefficient: f64,
    /// Scratch for per-segment flattening.
    flatten_tmp: Vec<PointD>,
}

impl Engine {
    pub fn new() -> Self {
        let mut engine = Self {
            rasterizer: Rasterizer::new(),
            stroker: StrokeGenerator::new(),
            flatten_params: None,
            quality_coefficient: 0.0,
            flatten_tmp: Vec::new(),
        };
        engine.set_curve_quality(DEFAULT_CURVE_QUALITY);
        engine
    }

    /// Set the curve quality, on the host's 0..=100 scale. Higher values
    /// flatten curves more finely.
    pub fn set_curve_quality(&mut self, quality: u32) {
        let q = (quality.min(100) as f64) / 100.0;
        // perceptual ramp: quadratic in the setting, clamped away from zero
        self.quality_coefficient = q * q * (1.5 - 0.01) + 0.01;
        self.flatten_params = None;
    }

    /// Direct access to the rasterizer (lifecycle operations).
    pub fn rasterizer(&mut self) -> &mut Rasterizer {
        &mut self.rasterizer
    }

    /// Release scratch memory across the engine-owned stages.
    pub fn recover_memory(&mut self) {
        self.rasterizer.recover_memory(true);
        self.stroker.recover_memory();
        self.flatten_tmp = Vec::new();
    }

    /// Effective flatten deviation for the current transform, optionally
    /// adjusted for a wide stroke.
    fn deviation_update(
        &mut self,
        made_of_lines: bool,
        bounds: Option<AaBox>,
        transform: &TransAffine,
        stroke: Option<&StrokeStyle>,
    ) -> FlattenParams {
        let (sx, sy) = transform.scale_factors();
        let max_scale = sx.max(sy).max(EPSILON);
        let mut deviation = self.quality_coefficient / (max_scale * max_scale);

        // wide strokes hide flattening error, so coarser accuracy suffices;
        // dashing re-tightens it because caps expose the vertices
        if let (Some(style), Some(b)) = (stroke, bounds) {
            if style.line_width > 1.0 {
                let w = b.width() * sx;
                let h = b.height() * sy;
                let d = w.min(h);
                if d > EPSILON {
                    let t = 1.0 + style.line_width / d;
                    let mut t = 1.0 / (t * t);
                    if style.dash_pattern_sum() > 0.0 {
                        t *= 1.0 / style.line_width;
                    }
                    deviation *= t;
                }
            }
        }

        match self.flatten_params {
            Some(p) if p.deviation == deviation || made_of_lines => p,
            _ => {
                let p = FlattenParams::from_deviation(deviation);
                self.flatten_params = Some(p);
                p
            }
        }
    }

    // ------------------------------------------------------------------
    // Fill
    // ------------------------------------------------------------------

    /// Fill a path. On out-of-memory the engine recovers its scratch
    /// buffers and the path's caches, then retries once.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_fill<F: ScanlineFiller>(
        &mut self,
        path: &mut Path,
        transform: &TransAffine,
        quality: AaQuality,
        fill_rule: FillRule,
        clip_box: &RectI,
        filler: &mut F,
    ) -> Result<()> {
        if transform.is_singular() {
            return Ok(());
        }
        match self.draw_fill_inner(path, transform, quality, fill_rule, clip_box, filler) {
            Err(Error::OutOfMemory) => {
                warn!("fill ran out of memory; recovering and retrying once");
                self.recover_memory();
                path.recover_memory();
                self.draw_fill_inner(path, transform, quality, fill_rule, clip_box, filler)
            }
            r => r,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_fill_inner<F: ScanlineFiller>(
        &mut self,
        path: &mut Path,
        transform: &TransAffine,
        quality: AaQuality,
        fill_rule: FillRule,
        clip_box: &RectI,
        filler: &mut F,
    ) -> Result<()> {
        let params = self.deviation_update(
            path.made_of_lines(),
            control_box(path),
            transform,
            None,
        );
        let (slot_idx, _) = path.ensure_flattened(&params, &mut self.flatten_tmp)?;
        let slot = path.cache_slot(slot_idx);
        self.rasterizer.draw(
            slot.flatten_points(),
            slot.points_per_contour(),
            transform,
            quality,
            fill_rule,
            clip_box,
            filler,
        )
    }

    // ------------------------------------------------------------------
    // Stroke
    // ------------------------------------------------------------------

    /// Stroke a path. Stroke geometry is cached alongside the flattening it
    /// derives from and reused while the stroke style stays unchanged; the
    /// resulting outline fills under the nonzero rule.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_stroke<F: ScanlineFiller>(
        &mut self,
        path: &mut Path,
        transform: &TransAffine,
        quality: AaQuality,
        style: &StrokeStyle,
        clip_box: &RectI,
        filler: &mut F,
    ) -> Result<()> {
        if transform.is_singular() || style.line_width <= 0.0 {
            return Ok(());
        }
        match self.draw_stroke_inner(path, transform, quality, style, clip_box, filler) {
            Err(Error::OutOfMemory) => {
                warn!("stroke ran out of memory; recovering and retrying once");
                self.recover_memory();
                path.recover_memory();
                self.draw_stroke_inner(path, transform, quality, style, clip_box, filler)
            }
            r => r,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_stroke_inner<F: ScanlineFiller>(
        &mut self,
        path: &mut Path,
        transform: &TransAffine,
        quality: AaQuality,
        style: &StrokeStyle,
        clip_box: &RectI,
        filler: &mut F,
    ) -> Result<()> {
        let params = self.deviation_update(
            path.made_of_lines(),
            control_box(path),
            transform,
            Some(style),
        );
        let (slot_idx, recomputed) = path.ensure_flattened(&params, &mut self.flatten_tmp)?;

        let desc = StrokeCacheDesc::from_style(style);
        let stale = recomputed
            || path.cache_slot(slot_idx).stroke_desc() != Some(desc);
        if stale {
            let (sx, sy) = transform.scale_factors();
            let slot = path.cache_slot(slot_idx);
            self.stroker.generate(
                slot.flatten_points(),
                slot.points_per_contour(),
                slot.contours_closed(),
                slot.points_per_segment(),
                style,
                sx.max(sy),
                params.flatness,
            )?;
            store_stroke(path, slot_idx, &self.stroker, desc)?;
        }

        let slot = path.cache_slot(slot_idx);
        self.rasterizer.draw(
            slot.stroke_points(),
            slot.stroke_points_per_contour(),
            transform,
            quality,
            FillRule::NonZero,
            clip_box,
            filler,
        )
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounding box of a path's control polygon (conservative hull of the
/// actual geometry, cheap enough to compute before any flattening exists).
fn control_box(path: &Path) -> Option<AaBox> {
    let mut bounds: Option<AaBox> = None;
    let mut add = |p: PointD| match &mut bounds {
        None => bounds = Some(AaBox::from_points(p, p)),
        Some(b) => b.extend(p),
    };
    for seg in path.segments() {
        match seg.kind {
            SegmentKind::MoveTo { to } | SegmentKind::LineTo { to } => add(to),
            SegmentKind::QuadTo { ctrl, to } => {
                add(seg.application_point);
                add(ctrl);
                add(to);
            }
            SegmentKind::CubicTo { ctrl1, ctrl2, to } => {
                add(seg.application_point);
                add(ctrl1);
                add(ctrl2);
                add(to);
            }
            SegmentKind::ArcTo { arc } => {
                add(seg.application_point);
                let r = arc.x_semi_axis.max(arc.y_semi_axis);
                add(PointD::new(arc.center.x - r, arc.center.y - r));
                add(PointD::new(arc.center.x + r, arc.center.y + r));
            }
            SegmentKind::Close { .. } => {}
        }
    }
    bounds
}

/// Copy the generated stroke outline into the cache slot that owns it.
fn store_stroke(
    path: &mut Path,
    slot_idx: usize,
    stroker: &StrokeGenerator,
    desc: StrokeCacheDesc,
) -> Result<()> {
    let slot = path.cache_slot_mut(slot_idx);
    slot.stroke_pts.clear();
    slot.stroke_pts_per_contour.clear();
    try_reserve(&mut slot.stroke_pts, stroker.points().len())?;
    try_reserve(
        &mut slot.stroke_pts_per_contour,
        stroker.points_per_contour().len(),
    )?;
    slot.stroke_pts.extend_from_slice(stroker.points());
    slot.stroke_pts_per_contour
        .extend_from_slice(stroker.points_per_contour());
    slot.stroke_desc = Some(desc);
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixedpoint::MAX_COVERAGE;
    use crate::rasterizer::coverage_spans;

    /// Collect per-scanline alpha spans through the standard converter.
    fn fill_to_spans(
        engine: &mut Engine,
        path: &mut Path,
        quality: AaQuality,
        rule: FillRule,
    ) -> Vec<(i32, i32, i32, u8)> {
        let mut spans = Vec::new();
        let clip = RectI::new(0, 0, 256, 256);
        engine
            .draw_fill(
                path,
                &TransAffine::new(),
                quality,
                rule,
                &clip,
                &mut |y: i32, x0: i32, x1: i32, deltas: &mut [i32]| {
                    coverage_spans(deltas, x0, x1, |sx0, sx1, a| {
                        spans.push((y, sx0, sx1, a));
                    });
                },
            )
            .unwrap();
        spans
    }

    fn rect_path(x0: f64, y0: f64, x1: f64, y1: f64) -> Path {
        let mut p = Path::new();
        p.move_to(x0, y0)
            .line_to(x1, y0)
            .line_to(x1, y1)
            .line_to(x0, y1)
            .close();
        p
    }

    #[test]
    fn test_fill_rect_full_rows() {
        let mut engine = Engine::new();
        let mut path = rect_path(2.0, 3.0, 12.0, 7.0);
        let spans = fill_to_spans(&mut engine, &mut path, AaQuality::Better, FillRule::NonZero);

        // 4 rows, each one full-alpha run spanning [2, 12)
        let full: Vec<_> = spans.iter().filter(|s| s.3 == 255).collect();
        assert_eq!(full.len(), 4);
        for (y, x0, x1, _) in &spans {
            assert!((3..7).contains(y));
            assert!(*x0 >= 2 && *x1 <= 12);
        }
        let mut rows: Vec<i32> = full.iter().map(|s| s.0).collect();
        rows.sort_unstable();
        assert_eq!(rows, vec![3, 4, 5, 6]);
        for s in full {
            assert_eq!((s.1, s.2), (2, 12));
        }
    }

    #[test]
    fn test_fill_rect_all_quality_tiers() {
        for quality in [
            AaQuality::Better,
            AaQuality::Faster,
            AaQuality::NonAntialiased,
        ] {
            let mut engine = Engine::new();
            let mut path = rect_path(2.0, 3.0, 12.0, 7.0);
            let spans = fill_to_spans(&mut engine, &mut path, quality, FillRule::NonZero);
            // total alpha equals the rect area at full opacity in every tier
            let total: i64 = spans
                .iter()
                .map(|(_, x0, x1, a)| (*x1 - *x0) as i64 * *a as i64)
                .sum();
            assert_eq!(total, 10 * 4 * 255, "quality {quality:?}");
        }
    }

    #[test]
    fn test_fill_cache_reused_across_draws() {
        let mut engine = Engine::new();
        let mut path = rect_path(0.0, 0.0, 10.0, 10.0);
        fill_to_spans(&mut engine, &mut path, AaQuality::Better, FillRule::NonZero);
        fill_to_spans(&mut engine, &mut path, AaQuality::Better, FillRule::NonZero);
        assert_eq!(path.flatten_count(), 1);
    }

    #[test]
    fn test_stroke_smoke_and_cache() {
        let mut engine = Engine::new();
        let mut path = Path::new();
        path.move_to(2.0, 5.0).line_to(20.0, 5.0);
        let style = StrokeStyle::new(2.0);
        let clip = RectI::new(0, 0, 64, 64);

        let mut covered = 0i64;
        for _ in 0..2 {
            engine
                .draw_stroke(
                    &mut path,
                    &TransAffine::new(),
                    AaQuality::Better,
                    &style,
                    &clip,
                    &mut |_y: i32, x0: i32, x1: i32, deltas: &mut [i32]| {
                        coverage_spans(deltas, x0, x1, |sx0, sx1, a| {
                            covered += (sx1 - sx0) as i64 * a as i64;
                        });
                    },
                )
                .unwrap();
        }
        // a 18x2 horizontal band at full coverage, drawn twice
        assert_eq!(covered, 2 * 18 * 2 * 255);
        assert_eq!(path.flatten_count(), 1);
    }

    #[test]
    fn test_deviation_scales_with_transform() {
        let mut engine = Engine::new();
        let mut path = Path::new();
        path.move_to(0.0, 0.0).cubic_to(0.0, 50.0, 50.0, 0.0, 50.0, 50.0);

        let clip = RectI::new(0, 0, 256, 256);
        let mut sink = |_y: i32, x0: i32, x1: i32, deltas: &mut [i32]| {
            coverage_spans(deltas, x0, x1, |_, _, _| {});
        };

        engine
            .draw_fill(
                &mut path,
                &TransAffine::new(),
                AaQuality::Better,
                FillRule::NonZero,
                &clip,
                &mut sink,
            )
            .unwrap();
        assert_eq!(path.flatten_count(), 1);

        // a 4x zoom needs a finer flattening: new deviation falls outside
        // the cached slot range, forcing a recompute
        engine
            .draw_fill(
                &mut path,
                &TransAffine::new_scaling(4.0, 4.0),
                AaQuality::Better,
                FillRule::NonZero,
                &clip,
                &mut sink,
            )
            .unwrap();
        assert_eq!(path.flatten_count(), 2);

        // drawing at 1x again hits the first slot
        engine
            .draw_fill(
                &mut path,
                &TransAffine::new(),
                AaQuality::Better,
                FillRule::NonZero,
                &clip,
                &mut sink,
            )
            .unwrap();
        assert_eq!(path.flatten_count(), 2);
    }

    #[test]
    fn test_even_odd_overlap_cancels() {
        // two overlapping rectangles as one path: under even-odd the
        // intersection is empty
        let mut engine = Engine::new();
        let mut path = Path::new();
        path.move_to(0.0, 0.0)
            .line_to(8.0, 0.0)
            .line_to(8.0, 8.0)
            .line_to(0.0, 8.0)
            .close();
        path.move_to(4.0, 0.0)
            .line_to(12.0, 0.0)
            .line_to(12.0, 8.0)
            .line_to(4.0, 8.0)
            .close();

        let spans = fill_to_spans(&mut engine, &mut path, AaQuality::Better, FillRule::EvenOdd);
        let total: i64 = spans
            .iter()
            .map(|(_, x0, x1, a)| (*x1 - *x0) as i64 * *a as i64)
            .sum();
        // 8x8 + 8x8 minus twice the 4x8 overlap
        assert_eq!(total, (64 + 64 - 2 * 32) * 255);
        // nothing inside the doubly covered region [4, 8)
        for (_, x0, x1, a) in &spans {
            if *a > 0 {
                assert!(*x1 <= 4 || *x0 >= 8);
            }
        }
    }

    #[test]
    fn test_nonzero_overlap_keeps_union() {
        let mut engine = Engine::new();
        let mut path = Path::new();
        path.move_to(0.0, 0.0)
            .line_to(8.0, 0.0)
            .line_to(8.0, 8.0)
            .line_to(0.0, 8.0)
            .close();
        path.move_to(4.0, 0.0)
            .line_to(12.0, 0.0)
            .line_to(12.0, 8.0)
            .line_to(4.0, 8.0)
            .close();

        let spans = fill_to_spans(&mut engine, &mut path, AaQuality::Better, FillRule::NonZero);
        let total: i64 = spans
            .iter()
            .map(|(_, x0, x1, a)| (*x1 - *x0) as i64 * *a as i64)
            .sum();
        // the union: 12x8
        assert_eq!(total, 12 * 8 * 255);
    }

    #[test]
    fn test_clip_box_restricts_output() {
        let mut engine = Engine::new();
        let mut path = rect_path(0.0, 0.0, 100.0, 100.0);
        let mut spans = Vec::new();
        engine
            .draw_fill(
                &mut path,
                &TransAffine::new(),
                AaQuality::Better,
                FillRule::NonZero,
                &RectI::new(10, 10, 20, 20),
                &mut |y: i32, x0: i32, x1: i32, deltas: &mut [i32]| {
                    coverage_spans(deltas, x0, x1, |sx0, sx1, a| {
                        spans.push((y, sx0, sx1, a));
                    });
                },
            )
            .unwrap();
        for (y, x0, x1, _) in &spans {
            assert!(*y >= 10 && *y < 20);
            assert!(*x0 >= 10 && *x1 <= 20);
        }
        let total: i64 = spans
            .iter()
            .map(|(_, x0, x1, a)| (*x1 - *x0) as i64 * *a as i64)
            .sum();
        assert_eq!(total, 10 * 10 * 255);
    }

    #[test]
    fn test_coverage_delta_contract() {
        // the raw delta interface: deltas accumulate to MAX_COVERAGE inside
        // the shape and the callback leaves the line zeroed for the next row
        let mut engine = Engine::new();
        let mut path = rect_path(1.0, 0.0, 5.0, 2.0);
        let clip = RectI::new(0, 0, 64, 64);
        let mut rows = 0;
        engine
            .draw_fill(
                &mut path,
                &TransAffine::new(),
                AaQuality::Better,
                FillRule::NonZero,
                &clip,
                &mut |_y: i32, x0: i32, x1: i32, deltas: &mut [i32]| {
                    rows += 1;
                    let mut cov = 0i32;
                    for x in x0..=x1 {
                        cov += deltas[x as usize];
                        deltas[x as usize] = 0;
                        if (2..=4).contains(&x) {
                            assert_eq!(cov, MAX_COVERAGE);
                        }
                    }
                    deltas[(x1 + 1) as usize] = 0;
                },
            )
            .unwrap();
        assert_eq!(rows, 2);
    }
}
