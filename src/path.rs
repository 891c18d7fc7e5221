//! Path storage and the deviation-keyed flatten cache.
//!
//! A path is an ordered sequence of segments describing one or more
//! sub-contours. Flattening a path is expensive, so each path owns a small
//! fixed number of cache slots; every slot holds one complete flattening
//! together with the deviation range it stays valid for. Repeated draws at
//! similar (but not identical) transforms then hit an existing slot instead
//! of re-flattening. Slot ranges grow geometrically from the first requested
//! deviation, so the handful of slots covers a wide zoom range.

use log::debug;

use crate::basics::{AaBox, PointD, CLEANER_PRECISION};
use crate::curves::{Bezier2, Bezier3, FlattenParams};
use crate::ellipse::EllipseArc;
use crate::error::{try_push, try_reserve, Result};
use crate::stroke::StrokeCacheDesc;

/// Number of cached flattenings kept per path.
pub const DEFAULT_CACHE_SLOTS: usize = 5;

/// Ratio between the upper and lower bound of a slot's deviation range.
const CACHE_RANGE_FACTOR: f64 = 2.0;

// ============================================================================
// Segments
// ============================================================================

/// One path segment variant. Coordinates are absolute.
#[derive(Debug, Clone, Copy)]
pub enum SegmentKind {
    /// Begin a new sub-contour at `to`.
    MoveTo { to: PointD },
    LineTo { to: PointD },
    QuadTo { ctrl: PointD, to: PointD },
    CubicTo { ctrl1: PointD, ctrl2: PointD, to: PointD },
    /// Elliptical arc in center parameterization; the arc's start point is
    /// the segment's application point (the caller resolves endpoint forms).
    ArcTo { arc: EllipseArc },
    /// Close the current sub-contour back to `back_to` (the last move).
    Close { back_to: PointD },
}

/// A segment plus its start ("application") point and a lazily computed,
/// invalidatable arc length.
#[derive(Debug, Clone, Copy)]
pub struct PathSegment {
    pub kind: SegmentKind,
    pub application_point: PointD,
    length: Option<f64>,
}

impl PathSegment {
    fn new(kind: SegmentKind, application_point: PointD) -> Self {
        Self {
            kind,
            application_point,
            length: None,
        }
    }

    /// End point of the segment.
    pub fn end_point(&self) -> PointD {
        match self.kind {
            SegmentKind::MoveTo { to }
            | SegmentKind::LineTo { to }
            | SegmentKind::QuadTo { to, .. }
            | SegmentKind::CubicTo { to, .. } => to,
            SegmentKind::ArcTo { arc } => arc.eval_by_angle(arc.end_angle),
            SegmentKind::Close { back_to } => back_to,
        }
    }

    /// Arc length of the segment, computed on first use and cached until the
    /// geometry changes.
    pub fn length(&mut self) -> f64 {
        if let Some(len) = self.length {
            return len;
        }
        let len = match self.kind {
            SegmentKind::MoveTo { .. } => 0.0,
            SegmentKind::LineTo { to } | SegmentKind::Close { back_to: to } => {
                crate::math::distance(self.application_point, to)
            }
            SegmentKind::QuadTo { ctrl, to } => {
                Bezier2::new(self.application_point, ctrl, to).length(0.0, 1.0)
            }
            SegmentKind::CubicTo { ctrl1, ctrl2, to } => {
                Bezier3::new(self.application_point, ctrl1, ctrl2, to).length(0.0, 1.0)
            }
            SegmentKind::ArcTo { arc } => arc.length(0.0, 1.0),
        };
        self.length = Some(len);
        len
    }

    /// Flatten this segment into `out`, including the final point.
    ///
    /// Moves emit their single target point and closes emit nothing; the
    /// cache walk below skips every segment's final point, so move targets
    /// never reach the output directly.
    fn flatten(&self, params: &FlattenParams, out: &mut Vec<PointD>) {
        match self.kind {
            SegmentKind::MoveTo { to } => out.push(to),
            SegmentKind::LineTo { to } => {
                out.push(self.application_point);
                out.push(to);
            }
            SegmentKind::QuadTo { ctrl, to } => {
                Bezier2::new(self.application_point, ctrl, to).flatten(out, params, true);
            }
            SegmentKind::CubicTo { ctrl1, ctrl2, to } => {
                Bezier3::new(self.application_point, ctrl1, ctrl2, to).flatten(out, params, true);
            }
            SegmentKind::ArcTo { arc } => arc.flatten(out, params, true),
            SegmentKind::Close { .. } => {}
        }
    }

    fn is_structural(&self) -> bool {
        matches!(
            self.kind,
            SegmentKind::MoveTo { .. } | SegmentKind::Close { .. }
        )
    }
}

// ============================================================================
// Cache slots
// ============================================================================

/// One cached flattening of a path, valid over a deviation range.
#[derive(Debug, Default)]
pub struct PathCacheSlot {
    /// `[deviation_min, deviation_max]` this slot serves; `None` when free.
    range: Option<(f64, f64)>,
    /// Flattened points, all sub-contours concatenated.
    pub(crate) flatten_pts: Vec<PointD>,
    /// Number of points of each sub-contour.
    pub(crate) pts_per_contour: Vec<i32>,
    /// Closed flag of each sub-contour.
    pub(crate) contours_closed: Vec<bool>,
    /// Number of surviving flatten points of each original path segment;
    /// the stroker uses these to tell real joins from flattening joins.
    pub(crate) pts_per_segment: Vec<i32>,
    /// Cached stroke outline derived from this flattening.
    pub(crate) stroke_pts: Vec<PointD>,
    pub(crate) stroke_pts_per_contour: Vec<i32>,
    /// Stroke style the cached outline was generated with; `None` when the
    /// stroke geometry is invalid.
    pub(crate) stroke_desc: Option<StrokeCacheDesc>,
}

impl PathCacheSlot {
    pub fn deviation_range(&self) -> Option<(f64, f64)> {
        self.range
    }

    pub fn flatten_points(&self) -> &[PointD] {
        &self.flatten_pts
    }

    pub fn points_per_contour(&self) -> &[i32] {
        &self.pts_per_contour
    }

    pub fn contours_closed(&self) -> &[bool] {
        &self.contours_closed
    }

    pub fn points_per_segment(&self) -> &[i32] {
        &self.pts_per_segment
    }

    pub fn stroke_points(&self) -> &[PointD] {
        &self.stroke_pts
    }

    pub fn stroke_points_per_contour(&self) -> &[i32] {
        &self.stroke_pts_per_contour
    }

    /// The stroke style the cached outline was generated with, if any.
    pub fn stroke_desc(&self) -> Option<StrokeCacheDesc> {
        self.stroke_desc
    }

    /// Empty the slot, keeping allocations for reuse.
    fn clear(&mut self) {
        self.range = None;
        self.flatten_pts.clear();
        self.pts_per_contour.clear();
        self.contours_closed.clear();
        self.pts_per_segment.clear();
        self.stroke_pts.clear();
        self.stroke_pts_per_contour.clear();
        self.stroke_desc = None;
    }

    /// Release over-grown buffers entirely.
    fn release(&mut self) {
        self.clear();
        self.flatten_pts = Vec::new();
        self.pts_per_contour = Vec::new();
        self.contours_closed = Vec::new();
        self.pts_per_segment = Vec::new();
        self.stroke_pts = Vec::new();
        self.stroke_pts_per_contour = Vec::new();
    }
}

// ============================================================================
// Path
// ============================================================================

/// A path: segment list plus flatten cache.
#[derive(Debug)]
pub struct Path {
    segments: Vec<PathSegment>,
    cache: Vec<PathCacheSlot>,
    /// Set while at least one slot holds a valid flattening.
    flatten_valid: bool,
    /// True when every segment is a move, line or close; such geometry
    /// flattens identically at any accuracy, so its slot range is infinite.
    made_of_lines: bool,
    bounds: Option<AaBox>,
    /// Anchor of the geometric range ladder; `None` before first population.
    cache_slot_base_deviation: Option<f64>,
    /// Current pen position while building.
    cur_point: PointD,
    /// Target of the last explicit move.
    last_move: PointD,
    /// Number of flatten recomputations performed over the path's lifetime.
    flatten_count: u64,
}

impl Path {
    pub fn new() -> Self {
        Self::with_cache_slots(DEFAULT_CACHE_SLOTS)
    }

    /// A path with a custom number of flatten cache slots (at least one).
    pub fn with_cache_slots(slots: usize) -> Self {
        assert!(slots >= 1);
        let mut cache = Vec::with_capacity(slots);
        cache.resize_with(slots, PathCacheSlot::default);
        Self {
            segments: Vec::new(),
            cache,
            flatten_valid: false,
            made_of_lines: true,
            bounds: None,
            cache_slot_base_deviation: None,
            cur_point: PointD::default(),
            last_move: PointD::default(),
            flatten_count: 0,
        }
    }

    // ------------------------------------------------------------------
    // Building
    // ------------------------------------------------------------------

    pub fn move_to(&mut self, x: f64, y: f64) -> &mut Self {
        let to = PointD::new(x, y);
        self.push_segment(SegmentKind::MoveTo { to });
        self.cur_point = to;
        self.last_move = to;
        self
    }

    pub fn line_to(&mut self, x: f64, y: f64) -> &mut Self {
        let to = PointD::new(x, y);
        self.push_segment(SegmentKind::LineTo { to });
        self.cur_point = to;
        self
    }

    pub fn quad_to(&mut self, cx: f64, cy: f64, x: f64, y: f64) -> &mut Self {
        let to = PointD::new(x, y);
        self.push_segment(SegmentKind::QuadTo {
            ctrl: PointD::new(cx, cy),
            to,
        });
        self.cur_point = to;
        self
    }

    pub fn cubic_to(&mut self, c1x: f64, c1y: f64, c2x: f64, c2y: f64, x: f64, y: f64) -> &mut Self {
        let to = PointD::new(x, y);
        self.push_segment(SegmentKind::CubicTo {
            ctrl1: PointD::new(c1x, c1y),
            ctrl2: PointD::new(c2x, c2y),
            to,
        });
        self.cur_point = to;
        self
    }

    /// Append an elliptical arc. The arc's start point should coincide with
    /// the current pen position; the pen moves to the arc's end point.
    pub fn arc_to(&mut self, arc: EllipseArc) -> &mut Self {
        self.push_segment(SegmentKind::ArcTo { arc });
        self.cur_point = arc.eval_by_angle(arc.end_angle);
        self
    }

    pub fn close(&mut self) -> &mut Self {
        let back_to = self.last_move;
        self.push_segment(SegmentKind::Close { back_to });
        self.cur_point = back_to;
        self
    }

    fn push_segment(&mut self, kind: SegmentKind) {
        let seg = PathSegment::new(kind, self.cur_point);
        self.made_of_lines &= matches!(
            seg.kind,
            SegmentKind::MoveTo { .. } | SegmentKind::LineTo { .. } | SegmentKind::Close { .. }
        );
        self.segments.push(seg);
        // appending leaves existing segment lengths valid; only the cached
        // flattenings and the box go stale
        self.flatten_valid = false;
        self.bounds = None;
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when no segment is a curve.
    pub fn made_of_lines(&self) -> bool {
        self.made_of_lines
    }

    /// Total arc length of the path (sum of the cached segment lengths).
    pub fn length(&mut self) -> f64 {
        self.segments.iter_mut().map(|s| s.length()).sum()
    }

    /// Untransformed bounding box of the flattened path, if a flattening has
    /// been produced since the last geometry change.
    pub fn bounds(&self) -> Option<AaBox> {
        self.bounds
    }

    /// Number of flatten recomputations performed so far.
    pub fn flatten_count(&self) -> u64 {
        self.flatten_count
    }

    // ------------------------------------------------------------------
    // Cache management
    // ------------------------------------------------------------------

    /// Drop every cached flattening (called automatically on any geometry
    /// change). Arrays keep their capacity; ranges and lengths reset.
    pub fn invalidate_cache(&mut self) {
        self.flatten_valid = false;
        self.bounds = None;
        for seg in &mut self.segments {
            seg.length = None;
        }
    }

    /// Release over-grown cache buffers back to empty allocations.
    pub fn recover_memory(&mut self) {
        for slot in &mut self.cache {
            slot.release();
        }
        self.flatten_valid = false;
        self.cache_slot_base_deviation = None;
    }

    pub fn cache_slot(&self, index: usize) -> &PathCacheSlot {
        &self.cache[index]
    }

    pub(crate) fn cache_slot_mut(&mut self, index: usize) -> &mut PathCacheSlot {
        &mut self.cache[index]
    }

    /// Find the slot serving `deviation`: `Ok` on a cache hit, `Err` with
    /// the slot to (re)populate on a miss - a free slot when one exists,
    /// otherwise the slot whose range midpoint lies farthest from the
    /// request.
    fn find_slot(&self, deviation: f64) -> core::result::Result<usize, usize> {
        debug_assert!(deviation > 0.0);

        for (i, slot) in self.cache.iter().enumerate() {
            if let Some((min, max)) = slot.range {
                if deviation >= min && deviation <= max {
                    return Ok(i);
                }
            }
        }

        let mut best = 0;
        let mut best_dist = -1.0f64;
        for (i, slot) in self.cache.iter().enumerate() {
            match slot.range {
                None => return Err(i),
                Some((min, max)) => {
                    let mid = 0.5 * (min + max);
                    let d = (deviation - mid).abs();
                    if d > best_dist {
                        best = i;
                        best_dist = d;
                    }
                }
            }
        }
        Err(best)
    }

    /// Deviation range for a slot about to be (re)populated: the rung of the
    /// geometric ladder anchored at the first requested deviation that
    /// contains `deviation`.
    fn ladder_range(&mut self, deviation: f64) -> (f64, f64) {
        match self.cache_slot_base_deviation {
            None => {
                self.cache_slot_base_deviation = Some(deviation);
                (deviation, deviation * CACHE_RANGE_FACTOR)
            }
            Some(base) => {
                if deviation < base {
                    let mut d = base / CACHE_RANGE_FACTOR;
                    while deviation < d {
                        d /= CACHE_RANGE_FACTOR;
                    }
                    (d, d * CACHE_RANGE_FACTOR)
                } else {
                    let mut d = base * CACHE_RANGE_FACTOR;
                    while deviation > d {
                        d *= CACHE_RANGE_FACTOR;
                    }
                    (d / CACHE_RANGE_FACTOR, d)
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Flattening
    // ------------------------------------------------------------------

    /// Ensure a cache slot holds a flattening valid for the deviation in
    /// `params`. Returns `(slot_index, recomputed)`.
    ///
    /// `tmp` is caller-owned scratch reused across calls.
    pub fn ensure_flattened(
        &mut self,
        params: &FlattenParams,
        tmp: &mut Vec<PointD>,
    ) -> Result<(usize, bool)> {
        let slot_index = if self.flatten_valid {
            match self.find_slot(params.deviation) {
                Ok(i) => return Ok((i, false)),
                Err(i) => {
                    debug!(
                        "flatten cache miss (deviation {:e}), repopulating slot {}",
                        params.deviation, i
                    );
                    i
                }
            }
        } else {
            // geometry changed: every slot is stale
            for slot in &mut self.cache {
                slot.clear();
            }
            self.cache_slot_base_deviation = None;
            0
        };

        let (dev_min, dev_max) = self.ladder_range(params.deviation);

        if self.segments.is_empty() {
            let slot = &mut self.cache[slot_index];
            slot.clear();
            slot.range = Some((dev_min, dev_max));
            self.flatten_valid = true;
            return Ok((slot_index, false));
        }

        self.populate_slot(slot_index, params, tmp)?;

        // a slot serving straight-line geometry serves every accuracy
        let range = if self.made_of_lines {
            (0.0, f64::MAX)
        } else {
            (dev_min, dev_max)
        };

        let slot = &mut self.cache[slot_index];
        // a path whose whole extent vanishes flattens to nothing but still
        // validates the slot
        if let Some(b) = self.bounds {
            if b.width().max(b.height()) < CLEANER_PRECISION {
                slot.flatten_pts.clear();
                slot.pts_per_contour.clear();
                slot.contours_closed.clear();
                slot.pts_per_segment.clear();
                slot.range = Some((0.0, f64::MAX));
                self.flatten_valid = true;
                self.flatten_count += 1;
                return Ok((slot_index, true));
            }
        }

        slot.range = Some(range);
        self.flatten_valid = true;
        self.flatten_count += 1;
        Ok((slot_index, true))
    }

    /// Flatten every segment into the slot, suppressing near-duplicate
    /// consecutive points and recording contour/segment structure.
    fn populate_slot(
        &mut self,
        slot_index: usize,
        params: &FlattenParams,
        tmp: &mut Vec<PointD>,
    ) -> Result<()> {
        let seg_count = self.segments.len();

        // split borrows: the walk reads segments, writes the slot
        let segments = std::mem::take(&mut self.segments);
        let result = (|| {
            let slot = &mut self.cache[slot_index];
            slot.flatten_pts.clear();
            slot.pts_per_contour.clear();
            slot.contours_closed.clear();
            slot.pts_per_segment.clear();
            slot.stroke_desc = None;
            try_reserve(&mut slot.flatten_pts, seg_count * 2)?;
            try_reserve(&mut slot.pts_per_contour, 4)?;
            try_reserve(&mut slot.contours_closed, 4)?;
            try_reserve(&mut slot.pts_per_segment, seg_count + 1)?;

            let mut last_pushed: Option<PointD> = None;
            let mut old_final: Option<PointD> = None;
            let mut contour_start = 0usize;

            // push with duplicate suppression
            macro_rules! push_clean {
                ($p:expr, $pushed:expr) => {{
                    let p: PointD = $p;
                    let take = match last_pushed {
                        None => true,
                        Some(lp) => {
                            (p.x - lp.x).abs() > CLEANER_PRECISION
                                || (p.y - lp.y).abs() > CLEANER_PRECISION
                        }
                    };
                    if take {
                        try_push(&mut slot.flatten_pts, p)?;
                        last_pushed = Some(p);
                        $pushed += 1;
                    }
                }};
            }

            for (i, seg) in segments.iter().enumerate() {
                tmp.clear();
                seg.flatten(params, tmp);
                let k = tmp.len();
                let mut pushed = 0i32;

                if k > 1 || (i == 0 && k == 1 && seg_count == 1) {
                    // all flatten routines emit the segment's final point;
                    // skip it here so chained segments share endpoints
                    for p in tmp.iter().take(k.saturating_sub(1)) {
                        push_clean!(*p, pushed);
                    }
                    // a single-segment path keeps its last point too
                    if seg_count == 1 {
                        push_clean!(tmp[k - 1], pushed);
                    }
                    if pushed > 0 {
                        try_push(&mut slot.pts_per_segment, pushed)?;
                    }
                    if !seg.is_structural() {
                        old_final = Some(tmp[k - 1]);
                    }
                } else if i == 0 {
                    old_final = None;
                }

                let closes = matches!(seg.kind, SegmentKind::Close { .. });
                let ends_contour =
                    closes || matches!(seg.kind, SegmentKind::MoveTo { .. }) && i > 0 || i == seg_count - 1;

                if closes {
                    if let Some(f) = old_final.take() {
                        let mut extra = 0i32;
                        push_clean!(f, extra);
                        let _ = extra;
                    }
                    if slot.flatten_pts.len() > contour_start {
                        let first = slot.flatten_pts[contour_start];
                        let last = *slot.flatten_pts.last().unwrap();
                        if (last.x - first.x).abs() <= CLEANER_PRECISION
                            && (last.y - first.y).abs() <= CLEANER_PRECISION
                        {
                            // explicit closure duplicated the first point
                            slot.flatten_pts.pop();
                        } else {
                            try_push(&mut slot.pts_per_segment, 1)?;
                        }

                        let cnt = slot.flatten_pts.len() - contour_start;
                        if cnt >= 2 {
                            try_push(&mut slot.pts_per_contour, cnt as i32)?;
                            try_push(&mut slot.contours_closed, true)?;
                            contour_start = slot.flatten_pts.len();
                        } else {
                            // contour degenerated to a point: discard it
                            slot.flatten_pts.truncate(contour_start);
                            if let Some(lastc) = slot.pts_per_segment.last_mut() {
                                *lastc -= 1;
                                if *lastc == 0 {
                                    slot.pts_per_segment.pop();
                                }
                            }
                        }
                    }
                    last_pushed = None;
                } else if ends_contour {
                    // the contour's final point enters here (per-segment
                    // loops always skip it); open contours carry no join
                    // entry for it
                    if let Some(f) = old_final.take() {
                        let mut extra = 0i32;
                        push_clean!(f, extra);
                        let _ = extra;
                    }
                    let cnt = slot.flatten_pts.len() - contour_start;
                    if cnt >= 2 {
                        try_push(&mut slot.pts_per_contour, cnt as i32)?;
                        try_push(&mut slot.contours_closed, false)?;
                        contour_start = slot.flatten_pts.len();
                    } else if cnt == 1 {
                        // single stray point: not a drawable contour
                        slot.flatten_pts.truncate(contour_start);
                        slot.pts_per_segment.pop();
                    }
                    last_pushed = None;
                }
            }

            // bounding box over the surviving flatten points
            let mut bounds: Option<AaBox> = None;
            for p in &slot.flatten_pts {
                match &mut bounds {
                    None => bounds = Some(AaBox::from_points(*p, *p)),
                    Some(b) => b.extend(*p),
                }
            }
            Ok(bounds)
        })();

        self.segments = segments;

        match result {
            Ok(bounds) => {
                self.bounds = bounds;
                Ok(())
            }
            Err(e) => {
                // leave nothing half-built behind
                self.cache[slot_index].clear();
                self.flatten_valid = false;
                Err(e)
            }
        }
    }
}

impl Default for Path {
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

    fn params(deviation: f64) -> FlattenParams {
        FlattenParams::from_deviation(deviation)
    }

    fn flatten(path: &mut Path, deviation: f64) -> (usize, bool) {
        let mut tmp = Vec::new();
        path.ensure_flattened(&params(deviation), &mut tmp).unwrap()
    }

    fn rect_path() -> Path {
        let mut p = Path::new();
        p.move_to(0.0, 0.0)
            .line_to(10.0, 0.0)
            .line_to(10.0, 10.0)
            .line_to(0.0, 10.0)
            .close();
        p
    }

    #[test]
    fn test_rect_flatten_structure() {
        let mut p = rect_path();
        let (slot, recomputed) = flatten(&mut p, 0.01);
        assert!(recomputed);
        let s = p.cache_slot(slot);
        assert_eq!(s.points_per_contour(), &[4]);
        assert_eq!(s.contours_closed(), &[true]);
        assert_eq!(s.flatten_points().len(), 4);
        assert_eq!(s.flatten_points()[0], PointD::new(0.0, 0.0));
    }

    #[test]
    fn test_cache_hit_no_recompute() {
        let mut p = rect_path();
        let (slot_a, first) = flatten(&mut p, 0.01);
        assert!(first);
        assert_eq!(p.flatten_count(), 1);
        let (slot_b, second) = flatten(&mut p, 0.01);
        assert!(!second);
        assert_eq!(slot_a, slot_b);
        assert_eq!(p.flatten_count(), 1);
    }

    #[test]
    fn test_lines_only_path_serves_any_deviation() {
        let mut p = rect_path();
        assert!(p.made_of_lines());
        let (slot_a, _) = flatten(&mut p, 0.01);
        // wildly different accuracies still hit the same slot
        let (slot_b, rb) = flatten(&mut p, 1e-9);
        let (slot_c, rc) = flatten(&mut p, 1e3);
        assert_eq!(slot_a, slot_b);
        assert_eq!(slot_a, slot_c);
        assert!(!rb && !rc);
        assert_eq!(p.flatten_count(), 1);
    }

    #[test]
    fn test_curved_path_range_ladder() {
        let mut p = Path::new();
        p.move_to(0.0, 0.0).cubic_to(0.0, 100.0, 100.0, 0.0, 100.0, 100.0);
        assert!(!p.made_of_lines());

        let (slot_a, _) = flatten(&mut p, 0.01);
        let (min, max) = p.cache_slot(slot_a).deviation_range().unwrap();
        assert!((min - 0.01).abs() < 1e-12);
        assert!((max - 0.02).abs() < 1e-12);

        // within the range: hit
        let (slot_b, rb) = flatten(&mut p, 0.015);
        assert_eq!(slot_a, slot_b);
        assert!(!rb);

        // outside: a new slot on the geometric ladder
        let (slot_c, rc) = flatten(&mut p, 0.001);
        assert_ne!(slot_a, slot_c);
        assert!(rc);
        let (min_c, max_c) = p.cache_slot(slot_c).deviation_range().unwrap();
        assert!(min_c <= 0.001 && 0.001 <= max_c);
        // rung bounds are base / 2^k
        assert!((max_c / min_c - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_eviction_picks_farthest_midpoint() {
        let mut p = Path::with_cache_slots(2);
        p.move_to(0.0, 0.0).cubic_to(0.0, 100.0, 100.0, 0.0, 100.0, 100.0);

        let mut tmp = Vec::new();
        let pr = |d: f64| FlattenParams::from_deviation(d);
        let (s0, _) = p.ensure_flattened(&pr(1.0), &mut tmp).unwrap(); // [1, 2]
        let (s1, _) = p.ensure_flattened(&pr(0.25), &mut tmp).unwrap(); // [0.25, 0.5]
        assert_ne!(s0, s1);

        // a request near the second range must evict the first slot
        let (s2, recomputed) = p.ensure_flattened(&pr(0.07), &mut tmp).unwrap();
        assert!(recomputed);
        assert_eq!(s2, s0);
    }

    #[test]
    fn test_geometry_change_invalidates() {
        let mut p = rect_path();
        flatten(&mut p, 0.01);
        assert_eq!(p.flatten_count(), 1);
        p.line_to(20.0, 20.0);
        let (_, recomputed) = flatten(&mut p, 0.01);
        assert!(recomputed);
        assert_eq!(p.flatten_count(), 2);
    }

    #[test]
    fn test_two_subcontours() {
        let mut p = Path::new();
        p.move_to(0.0, 0.0)
            .line_to(10.0, 0.0)
            .line_to(10.0, 10.0)
            .move_to(20.0, 20.0)
            .line_to(30.0, 20.0)
            .line_to(30.0, 30.0);
        let (slot, _) = flatten(&mut p, 0.01);
        let s = p.cache_slot(slot);
        assert_eq!(s.points_per_contour(), &[3, 3]);
        assert_eq!(s.contours_closed(), &[false, false]);
        assert_eq!(s.flatten_points().len(), 6);
    }

    #[test]
    fn test_pts_per_segment_sums_to_contour() {
        let mut p = Path::new();
        p.move_to(0.0, 0.0)
            .line_to(50.0, 0.0)
            .quad_to(75.0, 50.0, 50.0, 100.0)
            .line_to(0.0, 100.0);
        let (slot, _) = flatten(&mut p, 0.1);
        let s = p.cache_slot(slot);
        // open contour: the final point carries no per-segment entry
        let total: i32 = s.points_per_segment().iter().sum();
        assert_eq!(total, s.flatten_points().len() as i32 - 1);
        assert_eq!(s.points_per_contour(), &[s.flatten_points().len() as i32]);
    }

    #[test]
    fn test_bounds_updated() {
        let mut p = rect_path();
        flatten(&mut p, 0.01);
        let b = p.bounds().unwrap();
        assert_eq!(b.min, PointD::new(0.0, 0.0));
        assert_eq!(b.max, PointD::new(10.0, 10.0));
    }

    #[test]
    fn test_segment_lengths() {
        let mut p = rect_path();
        // 4 sides of length 10 (close contributes the 4th)
        assert!((p.length() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_path() {
        let mut p = Path::new();
        let (slot, recomputed) = flatten(&mut p, 0.01);
        assert!(!recomputed);
        assert!(p.cache_slot(slot).flatten_points().is_empty());
    }
}
