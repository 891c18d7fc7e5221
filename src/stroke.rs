//! Stroke-to-fill conversion.
//!
//! The stroke generator consumes a cached flattening (points, sub-contour
//! structure, per-segment point counts) plus a stroke style and emits new
//! closed contours describing the filled outline of the stroke. Joins at
//! vertices that correspond to original path-segment boundaries use the
//! configured join style; joins at intermediate flattening vertices always
//! use a round join, approximating the curve's own curvature.
//!
//! Outline points are built in two side buffers: the left side accumulates
//! forward, the right side accumulates separately and is appended in reverse
//! when a piece closes, producing a single well-oriented contour.

use log::trace;

use crate::basics::{clamp, PointD, EPSILON, MAX_DEGENERATE_POINTS, PI, TWO_PI};
use crate::error::{try_push, Result};
use crate::intersect::{ray_ray_intersect, Ray};
use crate::math::{cross, dot, norm_direction, perpendicular_ccw, reflect, sqr_distance};

/// Screen-space stroke width below which internal joins skip the ray/ray
/// intersection test; at sub-pixel widths the difference is imperceptible.
const WIDTH_NO_INTERSECTION_THRESHOLD: f64 = 1.5;

// ============================================================================
// Style
// ============================================================================

/// Line cap style applied at open sub-contour ends and dash ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapStyle {
    #[default]
    Butt,
    Round,
    Square,
}

/// Line join style applied where two path segments meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinStyle {
    #[default]
    Miter,
    Round,
    Bevel,
}

/// The full stroke parameter set.
#[derive(Debug, Clone)]
pub struct StrokeStyle {
    pub line_width: f64,
    pub start_cap: CapStyle,
    pub end_cap: CapStyle,
    pub join: JoinStyle,
    pub miter_limit: f64,
    /// Normalized dash pattern: even number of non-negative entries
    /// (on, off, on, off, ...). Empty means solid.
    dash_pattern: Vec<f64>,
    dash_pattern_sum: f64,
    pub dash_phase: f64,
    /// When set, every sub-contour restarts dashing at `dash_phase` instead
    /// of carrying the phase across sub-contours.
    pub dash_phase_reset: bool,
}

impl StrokeStyle {
    pub fn new(line_width: f64) -> Self {
        Self {
            line_width,
            start_cap: CapStyle::Butt,
            end_cap: CapStyle::Butt,
            join: JoinStyle::Miter,
            miter_limit: 4.0,
            dash_pattern: Vec::new(),
            dash_pattern_sum: 0.0,
            dash_phase: 0.0,
            dash_phase_reset: false,
        }
    }

    /// Install a dash pattern. An odd trailing entry is dropped; a pattern
    /// containing a negative entry is ignored entirely (solid stroking).
    pub fn set_dash(&mut self, pattern: &[f64], phase: f64) -> &mut Self {
        self.dash_pattern.clear();
        self.dash_phase = phase;
        if pattern.iter().any(|v| *v < 0.0) {
            self.dash_pattern_sum = 0.0;
            return self;
        }
        let even_len = pattern.len() & !1;
        self.dash_pattern.extend_from_slice(&pattern[..even_len]);
        self.dash_pattern_sum = self.dash_pattern.iter().sum();
        self
    }

    pub fn dash_pattern(&self) -> &[f64] {
        &self.dash_pattern
    }

    pub fn dash_pattern_sum(&self) -> f64 {
        self.dash_pattern_sum
    }

    /// True when dashing is active (non-empty pattern with positive total).
    pub fn is_dashed(&self) -> bool {
        !self.dash_pattern.is_empty() && self.dash_pattern_sum > EPSILON
    }
}

// ============================================================================
// Stroke cache descriptor
// ============================================================================

/// Snapshot of the stroke parameters a cached stroke outline was generated
/// with; comparing descriptors tells whether the cache is still valid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeCacheDesc {
    pub start_cap: CapStyle,
    pub end_cap: CapStyle,
    pub join: JoinStyle,
    pub miter_limit: f64,
    pub line_width: f64,
    pub dash_phase: f64,
    pub dash_pattern_len: usize,
    pub dash_pattern_hash: u64,
}

impl StrokeCacheDesc {
    pub fn from_style(style: &StrokeStyle) -> Self {
        Self {
            start_cap: style.start_cap,
            end_cap: style.end_cap,
            join: style.join,
            miter_limit: style.miter_limit,
            line_width: style.line_width,
            dash_phase: style.dash_phase,
            dash_pattern_len: style.dash_pattern.len(),
            dash_pattern_hash: dash_pattern_hash(&style.dash_pattern),
        }
    }
}

/// FNV-1a over the bit patterns of the dash entries.
fn dash_pattern_hash(pattern: &[f64]) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for v in pattern {
        for b in v.to_bits().to_le_bytes() {
            h ^= b as u64;
            h = h.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }
    h
}

// ============================================================================
// Dash bookkeeping
// ============================================================================

/// Dash pattern normalized to a zero phase: which pattern entry, with how
/// much remaining length, is active at the start of the walk.
#[derive(Debug, Clone, Copy)]
struct DashDesc {
    first_dash_index: usize,
    first_dash_value: f64,
    first_empty: bool,
}

fn dash_pattern_normalize(requested_phase: f64, pattern: &[f64], pattern_sum: f64) -> DashDesc {
    debug_assert!(pattern.len() % 2 == 0);

    let mut desc = DashDesc {
        first_dash_index: 0,
        first_dash_value: 0.0,
        first_empty: true,
    };
    if pattern.is_empty() {
        return desc;
    }

    // phase modulo the pattern total
    let mut phase = if requested_phase > 0.0 {
        requested_phase - pattern_sum * (requested_phase / pattern_sum).floor()
    } else {
        pattern_sum * (-requested_phase / pattern_sum).ceil() + requested_phase
    };

    let mut i = 0usize;
    while i < pattern.len() {
        phase -= pattern[i];
        if phase < 0.0 {
            desc.first_dash_value = -phase;
            desc.first_dash_index = i;
            desc.first_empty = i & 1 == 1;
            break;
        } else if phase == 0.0 {
            if i & 1 == 1 {
                // a whole gap was consumed; start at the following dash
                let next = if i == pattern.len() - 1 { 0 } else { i + 1 };
                desc.first_dash_value = pattern[next];
                desc.first_dash_index = next;
            } else {
                // a whole dash was consumed
                desc.first_dash_value = 0.0;
                desc.first_dash_index = i;
            }
            desc.first_empty = false;
            break;
        }
        i += 1;
    }
    desc
}

/// Dash value at a progressive index of the zero-phase walk:
/// `(value, pattern_index, is_gap)`.
fn dash_value_get(requested_index: usize, desc: &DashDesc, pattern: &[f64]) -> (f64, usize, bool) {
    if requested_index == 0 {
        (desc.first_dash_value, desc.first_dash_index, desc.first_empty)
    } else {
        let idx = (desc.first_dash_index + requested_index) % pattern.len();
        (pattern[idx], idx, idx & 1 == 1)
    }
}

/// One flattening segment of the dash walk.
#[derive(Debug, Clone, Copy)]
struct DashSeg {
    k0: i32,
    k1: i32,
    norm_dir: PointD,
}

/// Advance to the next flattening segment; returns its length, or `None`
/// when the sub-contour is exhausted.
fn dash_segment_next(
    cur: &DashSeg,
    pts: &[PointD],
    closed: bool,
) -> Option<(DashSeg, f64)> {
    let count = pts.len() as i32;
    let mut next = DashSeg {
        k0: 0,
        k1: 0,
        norm_dir: PointD::default(),
    };

    if cur.k1 == count - 1 {
        if !closed {
            return None;
        }
        next.k0 = cur.k1;
        next.k1 = 0;
    } else {
        // wrapped past the closing segment: the walk is complete
        if closed && cur.k0 > cur.k1 {
            return None;
        }
        next.k0 = cur.k1;
        next.k1 = next.k0 + 1;
    }

    let length = norm_direction(
        &mut next.norm_dir,
        &pts[next.k1 as usize],
        &pts[next.k0 as usize],
    );
    Some((next, length))
}

/// Two consecutive indices around `idx` (cap tangents at dash ends).
fn fix_index(idx: i32, count: i32, closed: bool) -> (i32, i32) {
    debug_assert!(idx >= 0 && idx <= count - 1);
    if idx == count - 1 {
        if !closed {
            (idx - 1, idx)
        } else {
            (count - 1, 0)
        }
    } else {
        (idx, idx + 1)
    }
}

/// Three consecutive indices around `idx` (join tangents inside a dash).
fn fix_index2(idx: i32, count: i32) -> (i32, i32, i32) {
    debug_assert!(idx >= 0 && idx <= count - 1);
    if idx == count - 1 {
        (count - 2, count - 1, 0)
    } else if idx == 0 {
        (count - 1, 0, 1)
    } else {
        (idx - 1, idx, idx + 1)
    }
}

/// Cursor over the per-segment flatten point counts.
#[derive(Debug, Clone, Copy)]
struct SegCounter {
    idx: usize,
}

impl SegCounter {
    fn next(&mut self, counts: &[i32]) -> i32 {
        let v = counts.get(self.idx).copied().unwrap_or(i32::MAX);
        self.idx += 1;
        v
    }
}

// ============================================================================
// Stroke generator
// ============================================================================

/// Long-lived stroke scratch state; construct one per rendering context and
/// reuse it across draw calls.
#[derive(Debug, Default)]
pub struct StrokeGenerator {
    /// Assembled contour points (left side accumulates here directly).
    aux_pts: Vec<PointD>,
    /// Right side of the current piece, appended in reverse at piece close.
    aux_pts_dx: Vec<PointD>,
    /// Points per emitted stroke contour.
    aux_pts_per_contour: Vec<i32>,
    /// Start of the contour currently being assembled.
    aux_old_size: usize,
    last_join_separated: bool,
    left_point: PointD,
    right_point: PointD,
    middle_point: PointD,

    // parameters of the stroke being generated
    thickness: f64,
    miter_mul_thickness_sqr: f64,
    screen_stroke_width: f64,
    start_cap: CapStyle,
    end_cap: CapStyle,
    join_style: JoinStyle,
}

impl StrokeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Points of the generated stroke outline (all contours concatenated).
    pub fn points(&self) -> &[PointD] {
        &self.aux_pts
    }

    /// Number of points of each generated contour.
    pub fn points_per_contour(&self) -> &[i32] {
        &self.aux_pts_per_contour
    }

    /// Release over-grown scratch buffers.
    pub fn recover_memory(&mut self) {
        self.aux_pts = Vec::new();
        self.aux_pts_dx = Vec::new();
        self.aux_pts_per_contour = Vec::new();
    }

    /// Generate the stroke outline for a flattened path.
    ///
    /// `pts`/`pts_per_contour`/`contours_closed`/`pts_per_segment` come from
    /// a path cache slot; `max_scale` is the larger of the transform's scale
    /// factors (screen-width threshold test); `flatness` is the chordal
    /// tolerance used to pick the round join/cap tessellation density.
    ///
    /// On failure the partially generated outline is dropped.
    #[allow(clippy::too_many_arguments)]
    pub fn generate(
        &mut self,
        pts: &[PointD],
        pts_per_contour: &[i32],
        contours_closed: &[bool],
        pts_per_segment: &[i32],
        style: &StrokeStyle,
        max_scale: f64,
        flatness: f64,
    ) -> Result<()> {
        self.aux_pts.clear();
        self.aux_pts_dx.clear();
        self.aux_pts_per_contour.clear();
        self.aux_old_size = 0;

        if pts_per_contour.is_empty() || style.line_width <= 0.0 {
            return Ok(());
        }

        self.thickness = style.line_width * 0.5;
        self.miter_mul_thickness_sqr =
            style.miter_limit * style.miter_limit * self.thickness * self.thickness;
        self.screen_stroke_width = max_scale * style.line_width;
        self.start_cap = style.start_cap;
        self.end_cap = style.end_cap;
        self.join_style = style.join;

        // tessellation density for round joins and caps: number of points is
        // span_angle * coef, from the chord/arc relation at the stroke radius
        let dev_over_radius = (flatness / style.line_width).max(1e-5);
        let round_join_coef = if dev_over_radius >= 2.0 {
            1.0 / TWO_PI
        } else {
            1.0 / (2.0 * (1.0 - dev_over_radius).acos())
        };

        let result = self.generate_inner(
            pts,
            pts_per_contour,
            contours_closed,
            pts_per_segment,
            style,
            round_join_coef,
        );
        if result.is_err() {
            self.aux_pts.clear();
            self.aux_pts_dx.clear();
            self.aux_pts_per_contour.clear();
            self.aux_old_size = 0;
        }
        result
    }

    fn generate_inner(
        &mut self,
        pts: &[PointD],
        pts_per_contour: &[i32],
        contours_closed: &[bool],
        pts_per_segment: &[i32],
        style: &StrokeStyle,
        round_join_coef: f64,
    ) -> Result<()> {
        let mut start = 0usize;
        let mut seg = SegCounter { idx: 0 };

        if !style.is_dashed() {
            for (i, &count) in pts_per_contour.iter().enumerate() {
                let end = start + count as usize;
                self.solid_generate(
                    &pts[start..end],
                    contours_closed[i],
                    pts_per_segment,
                    &mut seg,
                    round_join_coef,
                )?;
                start = end;
            }
        } else {
            let mut phase = style.dash_phase;
            for (i, &count) in pts_per_contour.iter().enumerate() {
                let desc = dash_pattern_normalize(
                    phase,
                    style.dash_pattern(),
                    style.dash_pattern_sum(),
                );
                let end = start + count as usize;
                phase = self.dashed_generate(
                    &pts[start..end],
                    contours_closed[i],
                    pts_per_segment,
                    &mut seg,
                    round_join_coef,
                    &desc,
                    style,
                )?;
                start = end;
            }
        }
        trace!(
            "stroke generated: {} contours, {} points",
            self.aux_pts_per_contour.len(),
            self.aux_pts.len()
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Pieces
    // ------------------------------------------------------------------

    /// Close the piece under construction: append the right-side buffer in
    /// reverse and record the contour. Pieces of one or two points vanish.
    fn piece_close(&mut self) -> Result<()> {
        if self.aux_pts.len() - self.aux_old_size <= 2 && self.aux_pts_dx.is_empty() {
            self.aux_pts.truncate(self.aux_old_size);
            return Ok(());
        }

        if !self.aux_pts_dx.is_empty() {
            crate::error::try_reserve(&mut self.aux_pts, self.aux_pts_dx.len())?;
            for p in self.aux_pts_dx.iter().rev() {
                self.aux_pts.push(*p);
            }
        }

        try_push(
            &mut self.aux_pts_per_contour,
            (self.aux_pts.len() - self.aux_old_size) as i32,
        )?;
        self.aux_pts_dx.clear();
        self.aux_old_size = self.aux_pts.len();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Arcs, caps, joins
    // ------------------------------------------------------------------

    /// Append a circular arc between `start` and `end` around `center`.
    #[allow(clippy::too_many_arguments)]
    fn circle_arc_generate(
        out: &mut Vec<PointD>,
        center: PointD,
        start: PointD,
        end: PointD,
        span_angle: f64,
        ccw: bool,
        round_join_coef: f64,
    ) -> Result<()> {
        let n = (span_angle * round_join_coef) as i32;

        if n <= 1 {
            try_push(
                out,
                PointD::new((start.x + end.x) * 0.5, (start.y + end.y) * 0.5),
            )?;
        } else if n == 2 {
            try_push(out, start)?;
            try_push(out, end)?;
        } else {
            let n = n.min(MAX_DEGENERATE_POINTS);
            let delta = if ccw {
                span_angle / (n - 1) as f64
            } else {
                -span_angle / (n - 1) as f64
            };
            let (sin_d, cos_d) = delta.sin_cos();

            let mut p = PointD::new(start.x - center.x, start.y - center.y);
            try_push(out, start)?;
            for _ in 0..n - 2 {
                let q = PointD::new(p.x * cos_d - p.y * sin_d, p.y * cos_d + p.x * sin_d);
                try_push(out, PointD::new(q.x + center.x, q.y + center.y))?;
                p = q;
            }
            try_push(out, end)?;
        }
        Ok(())
    }

    /// Emit a cap at `application_point`; `direction` is the normalized
    /// outward tangent.
    fn cap_generate(
        &mut self,
        application_point: PointD,
        direction: PointD,
        cap_style: CapStyle,
        round_join_coef: f64,
    ) -> Result<()> {
        let perp = perpendicular_ccw(direction);
        let mut p_sx = PointD::new(
            application_point.x + self.thickness * perp.x,
            application_point.y + self.thickness * perp.y,
        );
        let mut p_dx = PointD::new(
            application_point.x - self.thickness * perp.x,
            application_point.y - self.thickness * perp.y,
        );

        if self.last_join_separated {
            try_push(&mut self.aux_pts, self.right_point)?;
            try_push(&mut self.aux_pts, self.left_point)?;
        }
        match cap_style {
            CapStyle::Butt => {
                try_push(&mut self.aux_pts, p_sx)?;
                try_push(&mut self.aux_pts, p_dx)?;
            }
            CapStyle::Round => {
                Self::circle_arc_generate(
                    &mut self.aux_pts,
                    application_point,
                    p_sx,
                    p_dx,
                    PI,
                    false,
                    round_join_coef,
                )?;
            }
            CapStyle::Square => {
                p_sx.x += self.thickness * direction.x;
                p_sx.y += self.thickness * direction.y;
                p_dx.x += self.thickness * direction.x;
                p_dx.y += self.thickness * direction.y;
                try_push(&mut self.aux_pts, p_sx)?;
                try_push(&mut self.aux_pts, p_dx)?;
            }
        }
        Ok(())
    }

    /// Smooth (flattening-vertex) join on a wide stroke, emitted as two
    /// separate pieces: a round wedge on the external side and a filler
    /// wedge on the internal side, re-stitched for stroke continuity.
    fn join_smooth_two_pieces(
        &mut self,
        application_point: PointD,
        in_direction: PointD,
        out_direction: PointD,
        round_join_coef: f64,
    ) -> Result<()> {
        let ccw = cross(in_direction, out_direction) > 0.0;
        let perp_in = perpendicular_ccw(in_direction);
        let perp_out = perpendicular_ccw(out_direction);

        let t = self.thickness;
        let sx_in = PointD::new(
            application_point.x + t * perp_in.x,
            application_point.y + t * perp_in.y,
        );
        let dx_in = PointD::new(
            application_point.x - t * perp_in.x,
            application_point.y - t * perp_in.y,
        );
        let sx_out = PointD::new(
            application_point.x + t * perp_out.x,
            application_point.y + t * perp_out.y,
        );
        let dx_out = PointD::new(
            application_point.x - t * perp_out.x,
            application_point.y - t * perp_out.y,
        );
        let round_join_angle = clamp(dot(perp_in, perp_out), -1.0, 1.0).acos();

        let sx_next: PointD;
        let dx_next: PointD;
        let center_next: PointD;
        if !self.aux_pts_dx.is_empty() {
            debug_assert!(!self.aux_pts.is_empty());
            sx_next = *self.aux_pts.last().unwrap();
            dx_next = *self.aux_pts_dx.last().unwrap();
            center_next = PointD::new((sx_next.x + dx_next.x) * 0.5, (sx_next.y + dx_next.y) * 0.5);
            self.piece_close()?;
        } else {
            sx_next = self.left_point;
            dx_next = self.right_point;
            center_next = self.middle_point;
        }

        // the previous piece just closed; re-emit its cut edge so the stroke
        // stays watertight
        if self.aux_pts.len() == self.aux_old_size {
            try_push(&mut self.aux_pts, dx_next)?;
            try_push(&mut self.aux_pts, center_next)?;
            try_push(&mut self.aux_pts, sx_next)?;
        }

        // external wedge
        try_push(&mut self.aux_pts, sx_in)?;
        if !ccw {
            Self::circle_arc_generate(
                &mut self.aux_pts,
                application_point,
                sx_in,
                sx_out,
                round_join_angle,
                false,
                round_join_coef,
            )?;
            try_push(&mut self.aux_pts, sx_out)?;
            try_push(&mut self.aux_pts, application_point)?;
        } else {
            try_push(&mut self.aux_pts, application_point)?;
            try_push(&mut self.aux_pts, dx_out)?;
            Self::circle_arc_generate(
                &mut self.aux_pts,
                application_point,
                dx_out,
                dx_in,
                round_join_angle,
                false,
                round_join_coef,
            )?;
        }
        try_push(&mut self.aux_pts, dx_in)?;
        self.piece_close()?;

        // internal wedge
        try_push(&mut self.aux_pts, application_point)?;
        if !ccw {
            try_push(&mut self.aux_pts, dx_in)?;
            Self::circle_arc_generate(
                &mut self.aux_pts,
                application_point,
                dx_in,
                dx_out,
                round_join_angle,
                false,
                round_join_coef,
            )?;
            try_push(&mut self.aux_pts, dx_out)?;
        } else {
            try_push(&mut self.aux_pts, sx_out)?;
            Self::circle_arc_generate(
                &mut self.aux_pts,
                application_point,
                sx_out,
                sx_in,
                round_join_angle,
                false,
                round_join_coef,
            )?;
            try_push(&mut self.aux_pts, sx_in)?;
        }
        self.piece_close()?;

        self.left_point = sx_out;
        self.right_point = dx_out;
        self.middle_point = application_point;
        self.last_join_separated = true;
        Ok(())
    }

    /// Emit a join at `application_point` between two normalized directions.
    ///
    /// `is_real` selects the configured join style; flattening-vertex joins
    /// always render round. Solid strokes wide enough to matter place a
    /// single internal vertex at the offset-ray intersection to avoid
    /// self-overlap.
    #[allow(clippy::too_many_arguments)]
    fn join_generate(
        &mut self,
        application_point: PointD,
        in_direction: PointD,
        out_direction: PointD,
        in_length: f64,
        out_length: f64,
        dashed: bool,
        round_join_coef: f64,
        is_real: bool,
    ) -> Result<()> {
        let ccw = cross(in_direction, out_direction) > 0.0;
        let join_style = if is_real { self.join_style } else { JoinStyle::Round };

        let perp_in = perpendicular_ccw(in_direction);
        let perp_out = perpendicular_ccw(out_direction);

        let t = if ccw { self.thickness } else { -self.thickness };
        let internal_in_dir = PointD::new(t * perp_in.x, t * perp_in.y);
        let internal_out_dir = PointD::new(t * perp_out.x, t * perp_out.y);
        let (tmp0, tmp1) = if ccw {
            (self.left_point, self.right_point)
        } else {
            (self.right_point, self.left_point)
        };

        // previous internal point, if this piece already has more than one
        let last_internal = if ccw {
            if self.aux_pts.len() > self.aux_old_size && self.aux_pts.len() - 1 > 0 {
                self.aux_pts.last().copied()
            } else {
                None
            }
        } else if self.aux_pts_dx.len() > 1 {
            self.aux_pts_dx.last().copied()
        } else {
            None
        };

        let internal_in_ray = Ray::new(
            PointD::new(
                application_point.x + internal_in_dir.x,
                application_point.y + internal_in_dir.y,
            ),
            PointD::new(-in_direction.x, -in_direction.y),
        );
        let internal_out_ray = Ray::new(
            PointD::new(
                application_point.x + internal_out_dir.x,
                application_point.y + internal_out_dir.y,
            ),
            out_direction,
        );
        let external_in_point = reflect(internal_in_ray.origin, application_point);
        let external_out_point = reflect(internal_out_ray.origin, application_point);

        let mut params = [0.0f64; 2];
        let mut flags = 0u32;
        let mut int_found = if dashed {
            false
        } else {
            ray_ray_intersect(&mut params, &mut flags, &internal_in_ray, &internal_out_ray)
                && flags == crate::intersect::SINGLE_SOLUTION
        };

        let mut internal_intersection = PointD::default();
        // internal side: push the single intersection vertex when it is
        // usable, otherwise fall back to the safe three-point form
        let mut push_intersection = false;
        if int_found
            && params[0] >= 0.0
            && params[0] <= in_length
            && params[1] >= 0.0
            && params[1] <= out_length
        {
            internal_intersection = internal_in_ray.at(params[0]);

            if self.screen_stroke_width < WIDTH_NO_INTERSECTION_THRESHOLD {
                push_intersection = true;
            } else {
                let mut direction_ok = true;
                if let Some(last) = last_internal {
                    let dir = PointD::new(
                        internal_intersection.x - last.x,
                        internal_intersection.y - last.y,
                    );
                    // internal points must keep advancing with the path
                    if dot(out_direction, dir) <= 0.0 {
                        direction_ok = false;
                    }
                }
                if direction_ok {
                    // is the out-ray origin covered by the previous segment's
                    // extrusion?
                    let internal_previous = PointD::new(
                        internal_out_ray.origin.x + in_length * in_direction.x,
                        internal_out_ray.origin.y + in_length * in_direction.y,
                    );
                    let ccw2 = (internal_in_ray.origin.x - application_point.x)
                        * (internal_previous.y - application_point.y)
                        - (internal_in_ray.origin.y - application_point.y)
                            * (internal_previous.x - application_point.x)
                        > 0.0;
                    if ccw2 != ccw {
                        push_intersection = true;
                    }
                }
            }
        } else {
            int_found = false;
        }

        if push_intersection {
            let internal = if ccw { &mut self.aux_pts } else { &mut self.aux_pts_dx };
            try_push(internal, internal_intersection)?;
        } else if self.screen_stroke_width >= WIDTH_NO_INTERSECTION_THRESHOLD {
            if !is_real {
                return self.join_smooth_two_pieces(
                    application_point,
                    in_direction,
                    out_direction,
                    round_join_coef,
                );
            }
            let internal = if ccw { &mut self.aux_pts } else { &mut self.aux_pts_dx };
            try_push(internal, internal_in_ray.origin)?;
            try_push(internal, application_point)?;
            try_push(internal, internal_out_ray.origin)?;
        } else {
            let internal = if ccw { &mut self.aux_pts } else { &mut self.aux_pts_dx };
            try_push(internal, internal_in_ray.origin)?;
            try_push(internal, internal_out_ray.origin)?;
        }

        // external side
        let external = if ccw { &mut self.aux_pts_dx } else { &mut self.aux_pts };
        if self.last_join_separated {
            try_push(external, tmp0)?;
            try_push(external, tmp1)?;
        }

        match join_style {
            JoinStyle::Miter => {
                let external_intersection;
                let mut miter_found = int_found;
                if !int_found {
                    let external_in_ray = Ray::new(external_in_point, in_direction);
                    let external_out_ray = Ray::new(
                        external_out_point,
                        PointD::new(-out_direction.x, -out_direction.y),
                    );
                    miter_found = ray_ray_intersect(
                        &mut params,
                        &mut flags,
                        &external_in_ray,
                        &external_out_ray,
                    ) && flags == crate::intersect::SINGLE_SOLUTION;
                    external_intersection = external_in_ray.at(params[0]);
                } else {
                    // reflection of the internal intersection
                    external_intersection = reflect(internal_intersection, application_point);
                }

                if miter_found
                    && sqr_distance(external_intersection, application_point)
                        <= self.miter_mul_thickness_sqr
                {
                    try_push(external, external_intersection)?;
                } else {
                    try_push(external, external_in_point)?;
                    try_push(external, external_out_point)?;
                }
            }
            JoinStyle::Round => {
                let angle = clamp(dot(perp_in, perp_out), -1.0, 1.0).acos();
                Self::circle_arc_generate(
                    external,
                    application_point,
                    external_in_point,
                    external_out_point,
                    angle,
                    ccw,
                    round_join_coef,
                )?;
            }
            JoinStyle::Bevel => {
                try_push(external, external_in_point)?;
                try_push(external, external_out_point)?;
            }
        }

        self.last_join_separated = false;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Solid stroking
    // ------------------------------------------------------------------

    /// Stroke one sub-contour with no dashing.
    fn solid_generate(
        &mut self,
        pts: &[PointD],
        closed: bool,
        seg_counts: &[i32],
        seg: &mut SegCounter,
        round_join_coef: f64,
    ) -> Result<()> {
        debug_assert!(pts.len() >= 2);

        let last_point = pts[pts.len() - 1];
        let mut it0 = 0usize;
        let mut it1 = 1usize;
        let mut it2 = 2usize;

        self.aux_pts_dx.clear();
        self.last_join_separated = false;

        let mut join_counter = seg.next(seg_counts);
        debug_assert!(join_counter > 0);

        let mut sx_point = PointD::default();
        let mut dx_point = PointD::default();

        let mut dir_in = PointD::default();
        let mut dir_out = PointD::default();

        if !closed {
            // start cap points away from the stroke
            norm_direction(&mut dir_out, &pts[it0], &pts[it1]);
            self.cap_generate(pts[it0], dir_out, self.start_cap, round_join_coef)?;
        } else {
            // wrap join at the closing point
            let in_length = norm_direction(&mut dir_in, &pts[it0], &last_point);
            let out_length = norm_direction(&mut dir_out, &pts[it1], &pts[it0]);
            self.join_generate(
                pts[it0],
                dir_in,
                dir_out,
                in_length,
                out_length,
                false,
                round_join_coef,
                true,
            )?;
            debug_assert!(self.aux_old_size < self.aux_pts.len());
            sx_point = self.aux_pts[self.aux_old_size];
            debug_assert!(!self.aux_pts_dx.is_empty());
            dx_point = self.aux_pts_dx[0];
        }
        join_counter -= 1;

        while it2 != pts.len() {
            let in_length = norm_direction(&mut dir_in, &pts[it1], &pts[it0]);
            let out_length = norm_direction(&mut dir_out, &pts[it2], &pts[it1]);
            let is_real = join_counter == 0;
            self.join_generate(
                pts[it1],
                dir_in,
                dir_out,
                in_length,
                out_length,
                false,
                round_join_coef,
                is_real,
            )?;
            if is_real {
                join_counter = seg.next(seg_counts);
                debug_assert!(join_counter > 0);
            }
            join_counter -= 1;
            it0 = it1;
            it1 = it2;
            it2 += 1;
        }

        if !closed {
            // end cap points away from the stroke
            norm_direction(&mut dir_in, &pts[it1], &pts[it0]);
            self.cap_generate(pts[it1], dir_in, self.end_cap, round_join_coef)?;
        } else {
            let in_length = norm_direction(&mut dir_in, &pts[it1], &pts[it0]);
            let out_length = norm_direction(&mut dir_out, &pts[0], &pts[it1]);
            self.join_generate(
                pts[it1],
                dir_in,
                dir_out,
                in_length,
                out_length,
                false,
                round_join_coef,
                true,
            )?;
            // close the wrap seamlessly with the first emitted points
            try_push(&mut self.aux_pts, sx_point)?;
            try_push(&mut self.aux_pts_dx, dx_point)?;
            // the closing segment's join entry is consumed either way
            if join_counter == 0 {
                seg.next(seg_counts);
            }
        }
        self.piece_close()
    }

    // ------------------------------------------------------------------
    // Dashed stroking
    // ------------------------------------------------------------------

    /// Stroke one dash piece from `p0` (inside flattening segment `i0`) to
    /// `p1` (inside segment `i1`), including any joins in between.
    #[allow(clippy::too_many_arguments)]
    fn single_dash_generate(
        &mut self,
        join_counter: &mut i32,
        seg: &mut SegCounter,
        seg_base_idx: usize,
        pts: &[PointD],
        p0: PointD,
        i0: i32,
        p1: PointD,
        i1: i32,
        closed: bool,
        merging: bool,
        seg_counts: &[i32],
        round_join_coef: f64,
    ) -> Result<()> {
        let count = pts.len() as i32;
        self.aux_pts_dx.clear();

        let mut n = if i0 == i1 {
            if merging {
                count
            } else {
                0
            }
        } else if i0 < i1 {
            i1 - i0
        } else {
            count - i0 + i1
        };

        let mut dir_in = PointD::default();
        let mut dir_out = PointD::default();

        // start cap
        self.last_join_separated = false;
        let (k0, k1) = fix_index(i0, count, closed);
        norm_direction(&mut dir_out, &pts[k0 as usize], &pts[k1 as usize]);
        self.cap_generate(p0, dir_out, self.start_cap, round_join_coef)?;

        let mut bookmark: Option<usize> = None;
        let mut i = i0;
        while n != 0 {
            i += 1;
            if i == count {
                i = 0;
            }

            let (k0, k1, k2) = fix_index2(i, count);
            norm_direction(&mut dir_in, &pts[k1 as usize], &pts[k0 as usize]);
            norm_direction(&mut dir_out, &pts[k2 as usize], &pts[k1 as usize]);

            let is_real = *join_counter == 0;
            self.join_generate(
                pts[k1 as usize],
                dir_in,
                dir_out,
                0.0,
                0.0,
                true,
                round_join_coef,
                is_real,
            )?;
            if is_real {
                if i == 0 {
                    // merged wrap: restart the per-segment walk from the
                    // contour's first entry
                    debug_assert!(merging);
                    bookmark = Some(seg.idx);
                    seg.idx = seg_base_idx;
                }
                *join_counter = seg.next(seg_counts);
                debug_assert!(*join_counter > 0);
            }
            *join_counter -= 1;
            n -= 1;
        }

        // end cap
        let (k0, k1) = fix_index(i1, count, closed);
        norm_direction(&mut dir_in, &pts[k1 as usize], &pts[k0 as usize]);
        self.cap_generate(p1, dir_in, self.end_cap, round_join_coef)?;

        if let Some(b) = bookmark {
            seg.idx = b;
        }
        self.piece_close()
    }

    /// Consume the join entries of flattening segments that fall entirely
    /// inside a dash gap.
    fn joins_eat(
        seg: &mut SegCounter,
        join_counter: &mut i32,
        count: i32,
        i0: i32,
        i1: i32,
        seg_counts: &[i32],
    ) {
        debug_assert!(i1 >= i0);
        let mut n = (i1 - i0).max(0);
        while n != 0 {
            if *join_counter == 0 {
                if i1 == count {
                    debug_assert!(n == 1);
                    n -= 1;
                    continue;
                }
                *join_counter = seg.next(seg_counts);
                debug_assert!(*join_counter > 0);
            }
            *join_counter -= 1;
            n -= 1;
        }
    }

    /// Stroke one sub-contour with dashing; returns the phase the next
    /// sub-contour starts with.
    #[allow(clippy::too_many_arguments)]
    fn dashed_generate(
        &mut self,
        pts: &[PointD],
        closed: bool,
        seg_counts: &[i32],
        seg: &mut SegCounter,
        round_join_coef: f64,
        desc: &DashDesc,
        style: &StrokeStyle,
    ) -> Result<f64> {
        debug_assert!(pts.len() >= 2);
        let count = pts.len() as i32;
        let pattern = style.dash_pattern();
        let seg_base_idx = seg.idx;

        let mut cur = DashSeg {
            k0: 0,
            k1: 1,
            norm_dir: PointD::default(),
        };
        let mut residual = norm_direction(&mut cur.norm_dir, &pts[1], &pts[0]);
        let mut requested_dash_idx = 0usize;
        let mut array_dash_idx = 0usize;
        let mut start_index: i32 = 0;
        let mut dash_to_extract = true;
        let mut p0 = pts[0];
        let mut start_point = pts[0];
        let mut dash_val = 0.0f64;
        let mut empty = desc.first_empty;

        // closed-contour merge bookkeeping: when the first dash is "on", the
        // final dash must fuse with it so the seam disappears
        let mut merging_saved = false;
        let mut merging_final_point = PointD::default();
        let mut merging_final_index: i32 = -1;
        let first_empty = desc.first_empty;

        let mut join_counter = seg.next(seg_counts);
        debug_assert!(join_counter > 0);
        join_counter -= 1;

        macro_rules! gen_dash {
            ($sp:expr, $si:expr, $fp:expr, $fi:expr, $merging:expr) => {
                self.single_dash_generate(
                    &mut join_counter,
                    seg,
                    seg_base_idx,
                    pts,
                    $sp,
                    $si,
                    $fp,
                    $fi,
                    closed,
                    $merging,
                    seg_counts,
                    round_join_coef,
                )?
            };
        }

        loop {
            if dash_to_extract {
                let (v, idx, e) = dash_value_get(requested_dash_idx, desc, pattern);
                dash_val = v;
                array_dash_idx = idx;
                empty = e;
                requested_dash_idx += 1;
            }
            residual -= dash_val;

            if residual == 0.0 {
                match dash_segment_next(&cur, pts, closed) {
                    Some((next, next_len)) => {
                        let p1 = PointD::new(
                            p0.x + dash_val * cur.norm_dir.x,
                            p0.y + dash_val * cur.norm_dir.y,
                        );
                        if !empty {
                            if closed && !first_empty && !merging_saved {
                                merging_final_point = p1;
                                merging_final_index = cur.k0;
                                merging_saved = true;
                                Self::joins_eat(
                                    seg,
                                    &mut join_counter,
                                    count,
                                    0,
                                    cur.k0,
                                    seg_counts,
                                );
                            } else {
                                gen_dash!(start_point, start_index, p1, cur.k0, false);
                            }
                        } else if !closed || first_empty || merging_saved {
                            Self::joins_eat(
                                seg,
                                &mut join_counter,
                                count,
                                start_index,
                                cur.k0,
                                seg_counts,
                            );
                        }

                        p0 = pts[next.k0 as usize];
                        start_point = p0;
                        start_index = cur.k0;
                        cur = next;
                        residual = next_len;
                        dash_to_extract = true;
                    }
                    None => {
                        // the dash boundary lands exactly on the contour end
                        if !closed {
                            if !empty {
                                gen_dash!(
                                    start_point,
                                    start_index,
                                    pts[cur.k1 as usize],
                                    cur.k0,
                                    false
                                );
                            }
                        } else if !first_empty {
                            if !merging_saved {
                                // one dash swallowed the whole sub-contour
                                seg.idx = seg_base_idx;
                                self.solid_generate(
                                    pts,
                                    closed,
                                    seg_counts,
                                    seg,
                                    round_join_coef,
                                )?;
                            } else if !empty {
                                gen_dash!(
                                    start_point,
                                    start_index,
                                    merging_final_point,
                                    merging_final_index,
                                    true
                                );
                            } else {
                                Self::joins_eat(
                                    seg,
                                    &mut join_counter,
                                    count,
                                    start_index,
                                    cur.k0,
                                    seg_counts,
                                );
                                // emit the deferred first dash on its own
                                let bookmark = seg.idx;
                                seg.idx = seg_base_idx;
                                join_counter = seg.next(seg_counts);
                                debug_assert!(join_counter > 0);
                                join_counter -= 1;
                                gen_dash!(
                                    pts[0],
                                    0,
                                    merging_final_point,
                                    merging_final_index,
                                    false
                                );
                                seg.idx = bookmark;
                            }
                        } else if !empty {
                            gen_dash!(
                                start_point,
                                start_index,
                                pts[cur.k1 as usize],
                                cur.k0,
                                false
                            );
                        }
                        break;
                    }
                }
            } else if residual > 0.0 {
                let p1 = PointD::new(
                    p0.x + dash_val * cur.norm_dir.x,
                    p0.y + dash_val * cur.norm_dir.y,
                );
                if !empty {
                    if closed && !first_empty && !merging_saved {
                        merging_final_point = p1;
                        merging_final_index = cur.k0;
                        merging_saved = true;
                        Self::joins_eat(seg, &mut join_counter, count, 0, cur.k0, seg_counts);
                    } else {
                        gen_dash!(start_point, start_index, p1, cur.k0, false);
                    }
                } else if !closed || first_empty || merging_saved {
                    Self::joins_eat(
                        seg,
                        &mut join_counter,
                        count,
                        start_index,
                        cur.k0,
                        seg_counts,
                    );
                }

                p0 = p1;
                start_point = p1;
                start_index = cur.k0;
                dash_to_extract = true;
            } else {
                // residual < 0: the dash continues past this flattening
                // segment
                dash_val = -residual;
                dash_to_extract = false;

                match dash_segment_next(&cur, pts, closed) {
                    Some((next, next_len)) => {
                        p0 = pts[next.k0 as usize];
                        cur = next;
                        residual = next_len;
                    }
                    None => {
                        if !closed {
                            if !empty {
                                gen_dash!(
                                    start_point,
                                    start_index,
                                    pts[cur.k1 as usize],
                                    cur.k0,
                                    false
                                );
                            } else {
                                Self::joins_eat(
                                    seg,
                                    &mut join_counter,
                                    count,
                                    start_index,
                                    cur.k0,
                                    seg_counts,
                                );
                            }
                        } else if !first_empty {
                            if !merging_saved {
                                // one dash swallows the whole sub-contour:
                                // identical to solid stroking
                                seg.idx = seg_base_idx;
                                self.solid_generate(
                                    pts,
                                    closed,
                                    seg_counts,
                                    seg,
                                    round_join_coef,
                                )?;
                            } else if !empty {
                                gen_dash!(
                                    start_point,
                                    start_index,
                                    merging_final_point,
                                    merging_final_index,
                                    true
                                );
                            } else {
                                Self::joins_eat(
                                    seg,
                                    &mut join_counter,
                                    count,
                                    start_index,
                                    cur.k0,
                                    seg_counts,
                                );
                                let bookmark = seg.idx;
                                seg.idx = seg_base_idx;
                                join_counter = seg.next(seg_counts);
                                debug_assert!(join_counter > 0);
                                join_counter -= 1;
                                gen_dash!(
                                    pts[0],
                                    0,
                                    merging_final_point,
                                    merging_final_index,
                                    false
                                );
                                seg.idx = bookmark;
                            }
                        } else if !empty {
                            gen_dash!(
                                start_point,
                                start_index,
                                pts[cur.k1 as usize],
                                cur.k0,
                                false
                            );
                        } else {
                            Self::joins_eat(
                                seg,
                                &mut join_counter,
                                count,
                                start_index,
                                cur.k0,
                                seg_counts,
                            );
                        }
                        break;
                    }
                }
            }
        }

        // phase for the next sub-contour
        if style.dash_phase_reset {
            Ok(style.dash_phase)
        } else {
            let mut phase = residual;
            for v in &pattern[..=array_dash_idx] {
                phase += v;
            }
            Ok(phase)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::FlattenParams;
    use crate::math::distance;
    use crate::path::Path;

    /// Flatten a path and stroke it, returning the generator.
    fn stroke_path(path: &mut Path, style: &StrokeStyle, deviation: f64) -> StrokeGenerator {
        let params = FlattenParams::from_deviation(deviation);
        let mut tmp = Vec::new();
        let (slot, _) = path.ensure_flattened(&params, &mut tmp).unwrap();
        let slot = path.cache_slot(slot);
        let mut gen = StrokeGenerator::new();
        gen.generate(
            slot.flatten_points(),
            slot.points_per_contour(),
            slot.contours_closed(),
            slot.points_per_segment(),
            style,
            1.0,
            params.flatness,
        )
        .unwrap();
        gen
    }

    fn circle_path(cx: f64, cy: f64, r: f64) -> Path {
        use crate::ellipse::EllipseArc;
        let mut p = Path::new();
        p.move_to(cx + r, cy);
        p.arc_to(EllipseArc::new(
            PointD::new(cx, cy),
            r,
            r,
            0.0,
            0.0,
            PI,
            true,
        ));
        p.arc_to(EllipseArc::new(
            PointD::new(cx, cy),
            r,
            r,
            0.0,
            PI,
            TWO_PI,
            true,
        ));
        p.close();
        p
    }

    #[test]
    fn test_dash_pattern_normalize_zero_phase() {
        let pattern = [4.0, 2.0];
        let d = dash_pattern_normalize(0.0, &pattern, 6.0);
        assert_eq!(d.first_dash_index, 0);
        assert!((d.first_dash_value - 4.0).abs() < 1e-12);
        assert!(!d.first_empty);
    }

    #[test]
    fn test_dash_pattern_normalize_mid_gap() {
        let pattern = [4.0, 2.0];
        // phase 5 lands one unit into the gap
        let d = dash_pattern_normalize(5.0, &pattern, 6.0);
        assert_eq!(d.first_dash_index, 1);
        assert!((d.first_dash_value - 1.0).abs() < 1e-12);
        assert!(d.first_empty);
    }

    #[test]
    fn test_dash_pattern_normalize_wraps() {
        let pattern = [4.0, 2.0];
        // phase 7 == phase 1
        let d = dash_pattern_normalize(7.0, &pattern, 6.0);
        assert_eq!(d.first_dash_index, 0);
        assert!((d.first_dash_value - 3.0).abs() < 1e-12);
        assert!(!d.first_empty);
    }

    #[test]
    fn test_dash_value_walk() {
        let pattern = [4.0, 2.0, 1.0, 3.0];
        let d = dash_pattern_normalize(0.0, &pattern, 10.0);
        let (v0, _, e0) = dash_value_get(0, &d, &pattern);
        let (v1, _, e1) = dash_value_get(1, &d, &pattern);
        let (v2, _, e2) = dash_value_get(2, &d, &pattern);
        let (v4, _, e4) = dash_value_get(4, &d, &pattern);
        assert_eq!((v0, e0), (4.0, false));
        assert_eq!((v1, e1), (2.0, true));
        assert_eq!((v2, e2), (1.0, false));
        // wraps around the pattern
        assert_eq!((v4, e4), (4.0, false));
    }

    #[test]
    fn test_stroke_cache_desc_detects_changes() {
        let mut style = StrokeStyle::new(2.0);
        let a = StrokeCacheDesc::from_style(&style);
        assert_eq!(a, StrokeCacheDesc::from_style(&style));

        style.line_width = 3.0;
        assert_ne!(a, StrokeCacheDesc::from_style(&style));

        let mut dashed = StrokeStyle::new(2.0);
        dashed.set_dash(&[4.0, 2.0], 0.0);
        assert_ne!(a, StrokeCacheDesc::from_style(&dashed));

        let mut dashed2 = StrokeStyle::new(2.0);
        dashed2.set_dash(&[4.0, 3.0], 0.0);
        assert_ne!(
            StrokeCacheDesc::from_style(&dashed),
            StrokeCacheDesc::from_style(&dashed2)
        );
    }

    #[test]
    fn test_set_dash_rejects_negative() {
        let mut style = StrokeStyle::new(2.0);
        style.set_dash(&[4.0, -1.0], 0.0);
        assert!(!style.is_dashed());
    }

    #[test]
    fn test_set_dash_drops_odd_entry() {
        let mut style = StrokeStyle::new(2.0);
        style.set_dash(&[4.0, 2.0, 1.0], 0.0);
        assert_eq!(style.dash_pattern(), &[4.0, 2.0]);
    }

    #[test]
    fn test_open_line_stroke_butt() {
        let mut p = Path::new();
        p.move_to(0.0, 0.0).line_to(10.0, 0.0);
        let style = StrokeStyle::new(2.0);
        let gen = stroke_path(&mut p, &style, 0.01);

        assert_eq!(gen.points_per_contour().len(), 1);
        // butt caps on a straight segment produce the 4-corner rectangle
        assert_eq!(gen.points().len(), 4);
        for pt in gen.points() {
            assert!(pt.x >= -1e-9 && pt.x <= 10.0 + 1e-9);
            assert!(pt.y.abs() <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn test_square_cap_extends() {
        let mut p = Path::new();
        p.move_to(0.0, 0.0).line_to(10.0, 0.0);
        let mut style = StrokeStyle::new(2.0);
        style.start_cap = CapStyle::Square;
        style.end_cap = CapStyle::Square;
        let gen = stroke_path(&mut p, &style, 0.01);

        let min_x = gen.points().iter().map(|p| p.x).fold(f64::MAX, f64::min);
        let max_x = gen.points().iter().map(|p| p.x).fold(f64::MIN, f64::max);
        assert!((min_x + 1.0).abs() < 1e-9);
        assert!((max_x - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_round_cap_point_count_grows_with_accuracy() {
        let mut style = StrokeStyle::new(4.0);
        style.start_cap = CapStyle::Round;
        style.end_cap = CapStyle::Round;

        let mut p1 = Path::new();
        p1.move_to(0.0, 0.0).line_to(10.0, 0.0);
        let coarse = stroke_path(&mut p1, &style, 1.0);

        let mut p2 = Path::new();
        p2.move_to(0.0, 0.0).line_to(10.0, 0.0);
        let fine = stroke_path(&mut p2, &style, 1e-4);

        assert!(fine.points().len() > coarse.points().len());
    }

    #[test]
    fn test_closed_circle_stroke_no_seam() {
        let mut p = circle_path(50.0, 50.0, 20.0);
        let mut style = StrokeStyle::new(4.0);
        style.join = JoinStyle::Round;
        let gen = stroke_path(&mut p, &style, 0.01);

        // a closed stroke produces closed outline contours: first and last
        // point of each contour must coincide (the rasterizer closes the
        // polygon implicitly)
        assert!(!gen.points_per_contour().is_empty());
        let mut start = 0usize;
        for &count in gen.points_per_contour() {
            let end = start + count as usize;
            let contour = &gen.points()[start..end];
            // every stroke point sits near the stroke annulus
            for pt in contour {
                let r = distance(*pt, PointD::new(50.0, 50.0));
                assert!(r > 17.0 && r < 23.0, "point off the annulus: r={r}");
            }
            // the wrap join re-emits the first offset points, so the seam
            // point appears twice: no gap at the closing point
            assert!(
                contour[1..]
                    .iter()
                    .any(|p| distance(*p, contour[0]) < 1e-9),
                "seam point not re-emitted"
            );
            start = end;
        }
    }

    #[test]
    fn test_dash_full_length_equals_solid() {
        let total = 40.0; // perimeter of the square below
        let make = || {
            let mut p = Path::new();
            p.move_to(0.0, 0.0)
                .line_to(10.0, 0.0)
                .line_to(10.0, 10.0)
                .line_to(0.0, 10.0)
                .close();
            p
        };

        let solid_style = StrokeStyle::new(2.0);
        let mut solid_path = make();
        let solid = stroke_path(&mut solid_path, &solid_style, 0.01);

        let mut dash_style = StrokeStyle::new(2.0);
        dash_style.set_dash(&[total, 0.0], 0.0);
        let mut dash_path = make();
        let dashed = stroke_path(&mut dash_path, &dash_style, 0.01);

        assert_eq!(solid.points().len(), dashed.points().len());
        for (a, b) in solid.points().iter().zip(dashed.points()) {
            assert!(distance(*a, *b) < 1e-9);
        }
        assert_eq!(solid.points_per_contour(), dashed.points_per_contour());
    }

    #[test]
    fn test_dashed_open_line_piece_count() {
        let mut p = Path::new();
        p.move_to(0.0, 0.0).line_to(10.0, 0.0);
        let mut style = StrokeStyle::new(1.0);
        style.set_dash(&[2.0, 2.0], 0.0);
        let gen = stroke_path(&mut p, &style, 0.01);

        // dashes at [0,2], [4,6], [8,10]
        assert_eq!(gen.points_per_contour().len(), 3);
    }

    #[test]
    fn test_dash_phase_shifts_pieces() {
        let mut p = Path::new();
        p.move_to(0.0, 0.0).line_to(10.0, 0.0);
        let mut style = StrokeStyle::new(1.0);
        style.set_dash(&[2.0, 2.0], 2.0);
        let gen = stroke_path(&mut p, &style, 0.01);

        // phase 2 consumes the first dash whole: a zero-length dash piece at
        // the origin, then dashes at [2,4] and [6,8]
        assert_eq!(gen.points_per_contour().len(), 3);
        // nothing lands inside the gaps
        for pt in gen.points() {
            assert!(
                !(pt.x > 0.5 && pt.x < 1.5) && !(pt.x > 4.5 && pt.x < 5.5),
                "point inside a gap: {pt:?}"
            );
        }
    }

    #[test]
    fn test_miter_limit_falls_back_to_bevel() {
        // a hairpin turn whose miter would extend far beyond the limit
        let make = |limit: f64| {
            let mut p = Path::new();
            p.move_to(0.0, 0.0).line_to(10.0, 0.0).line_to(0.0, 1.0);
            let mut style = StrokeStyle::new(1.0);
            style.join = JoinStyle::Miter;
            style.miter_limit = limit;
            let gen = stroke_path(&mut p, &style, 0.01);
            gen.points().iter().map(|p| p.x).fold(f64::MIN, f64::max)
        };

        let beveled = make(1.01);
        let mitered = make(100.0);
        // the miter tip extends past the bevel edge
        assert!(mitered > beveled + 0.5);
    }
}
