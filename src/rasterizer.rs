//! The scanline rasterizer: scratch-buffer owner and tier dispatcher.
//!
//! A `Rasterizer` is a long-lived value holding every scratch buffer the
//! three quality tiers need (clipped vertices, edge lists, event queues,
//! sort helpers, the per-scanline coverage delta line). Buffers grow
//! monotonically during bursts of drawing and shrink only through
//! [`Rasterizer::recover_memory`]; the host calls that between frames or
//! every N drawing operations.
//!
//! Coverage is reported through a caller-supplied per-scanline callback so
//! the rasterizer stays agnostic to pixel formats and paints.

use log::debug;

use crate::basics::{AaQuality, FillRule, PointD, RectI};
use crate::error::Result;
use crate::fixedpoint::{
    coverage_to_alpha, FixVertex, FIXED_SHIFT, MAX_COVERAGE, MAX_DIMENSION, SLOPE_SHIFT,
};
use crate::raster_better;
use crate::raster_clip::polygon_transform_and_clip;
use crate::raster_faster;
use crate::raster_noaa;
use crate::trans_affine::TransAffine;

/// Per-scanline coverage callback: `(y, x0, x1, coverage_deltas)`.
///
/// `y`, `x0`, `x1` are device pixels (`x1` inclusive). The callback must
/// consume and zero the delta entries it reads - accumulate left to right
/// starting at `x0`, writing zero back to each visited entry including
/// `x1 + 1` (see [`coverage_spans`] for the standard conversion).
pub trait ScanlineFiller {
    fn fill(&mut self, y: i32, x0: i32, x1: i32, deltas: &mut [i32]);
}

impl<F: FnMut(i32, i32, i32, &mut [i32])> ScanlineFiller for F {
    fn fill(&mut self, y: i32, x0: i32, x1: i32, deltas: &mut [i32]) {
        self(y, x0, x1, deltas)
    }
}

/// Convert a coverage delta run into alpha spans, zeroing the consumed
/// entries. `sink` receives `(x0, x1_exclusive, alpha)` for each maximal run
/// of equal coverage; zero-alpha runs are skipped.
pub fn coverage_spans(
    deltas: &mut [i32],
    x0: i32,
    x1: i32,
    mut sink: impl FnMut(i32, i32, u8),
) {
    let mut cov = 0i32;
    let mut run_start = x0;
    let mut run_alpha = 0u8;
    for x in x0..=x1 {
        cov += deltas[x as usize];
        deltas[x as usize] = 0;
        let alpha = coverage_to_alpha(cov.clamp(0, MAX_COVERAGE));
        if alpha != run_alpha {
            if run_alpha != 0 && x > run_start {
                sink(run_start, x, run_alpha);
            }
            run_start = x;
            run_alpha = alpha;
        }
    }
    if run_alpha != 0 && x1 + 1 > run_start {
        sink(run_start, x1 + 1, run_alpha);
    }
    deltas[(x1 + 1) as usize] = 0;
}

// ============================================================================
// Edges
// ============================================================================

/// A directed polygon edge in surface space. `v0` is the upper vertex (the
/// sweep runs top-down), `sign` records the original winding direction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Edge {
    pub v0: u32,
    pub v1: u32,
    pub sign: i16,
    /// Sweep distance at the previous slice boundary.
    pub old_sweep_dist: u16,
    /// Slope `dx/dy` in `SLOPE_SHIFT` fixed point.
    pub m: i32,
}

/// Distance along x of `edge` at scanline `y`.
#[inline]
pub(crate) fn sweep_line_distance(y: u16, edge: &Edge, verts: &[FixVertex]) -> u16 {
    let v0 = verts[edge.v0 as usize];
    debug_assert!(y >= verts[edge.v1 as usize].y && y <= v0.y);
    let dy = (v0.y - y) as i64;
    (v0.x as i64 + ((edge.m as i64 * dy) >> SLOPE_SHIFT)) as u16
}

/// True when the edge degenerates to a single point.
#[inline]
pub(crate) fn edge_zero_length(edge: &Edge, verts: &[FixVertex]) -> bool {
    verts[edge.v0 as usize].key() == verts[edge.v1 as usize].key()
}

/// Build one normalized edge between vertex indices, or `None` for a
/// horizontal edge (horizontals contribute nothing to a horizontal sweep).
pub(crate) fn make_edge(k0: u32, k1: u32, verts: &[FixVertex]) -> Option<Edge> {
    let v0 = verts[k0 as usize];
    let v1 = verts[k1 as usize];
    if v0.y == v1.y {
        return None;
    }
    let (upper, lower, sign) = if v0.key() > v1.key() {
        (k0, k1, -1i16)
    } else {
        (k1, k0, 1i16)
    };
    let u = verts[upper as usize];
    let l = verts[lower as usize];
    let dy = (u.y - l.y) as i32;
    let dx = l.x as i32 - u.x as i32;
    Some(Edge {
        v0: upper,
        v1: lower,
        sign,
        old_sweep_dist: u.x,
        m: (dx << SLOPE_SHIFT) / dy,
    })
}

/// Sweep distance of an active edge, paired for sorting.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EdgeSweepDistance {
    pub edge: u32,
    pub sweep_dist: u16,
}

// ============================================================================
// Rasterizer
// ============================================================================

/// The rasterizer context. Construct once per rendering context; not safe
/// for concurrent use.
pub struct Rasterizer {
    /// Clipped polygon vertices, surface space fixed point.
    pub(crate) vertices: Vec<FixVertex>,
    /// Vertices per clipped sub-contour.
    pub(crate) contour_pts: Vec<i32>,
    /// Coverage deltas for the scanline being assembled.
    pub(crate) coverage_deltas: Vec<i32>,
    /// Global edge list.
    pub(crate) gel: Vec<Edge>,
    /// Active edge list: indices into `gel`, kept in sweep order.
    pub(crate) ael: Vec<u32>,
    /// Sorted event queue (exact tier).
    pub(crate) events: Vec<raster_better::Event>,
    /// Unsorted event staging (exact tier).
    pub(crate) events_tmp: Vec<raster_better::Event>,
    /// Rational intersection numerators (exact tier).
    pub(crate) intersection_nums: Vec<raster_better::IntersectionNums>,
    /// Sort keys, shared by the event and edge-list sorts.
    pub(crate) sort_keys: Vec<(u32, u32)>,
    /// Sweep distances of the active edges (fast tiers).
    pub(crate) sweep_dists: Vec<EdgeSweepDistance>,
    /// Top clip boundary in fixed point (exact tier).
    pub(crate) box_max_y: u16,
}

impl Rasterizer {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            contour_pts: Vec::new(),
            coverage_deltas: vec![0; (MAX_DIMENSION + 2) as usize],
            gel: Vec::new(),
            ael: Vec::new(),
            events: Vec::new(),
            events_tmp: Vec::new(),
            intersection_nums: Vec::new(),
            sort_keys: Vec::new(),
            sweep_dists: Vec::new(),
            box_max_y: 0,
        }
    }

    /// Rasterize a set of closed contours.
    ///
    /// Vertices are transformed by `matrix` into surface space, clipped
    /// against `clip_box` (device pixels, clamped to the configured maximum
    /// surface dimension) and swept at the requested quality; `filler`
    /// receives one callback per covered scanline.
    pub fn draw<F: ScanlineFiller>(
        &mut self,
        points: &[PointD],
        pts_per_contour: &[i32],
        matrix: &TransAffine,
        quality: AaQuality,
        fill_rule: FillRule,
        clip_box: &RectI,
        filler: &mut F,
    ) -> Result<()> {
        if points.is_empty() || pts_per_contour.is_empty() {
            return Ok(());
        }

        let mut clip = *clip_box;
        clip.normalize();
        if !clip.clip(&RectI::new(0, 0, MAX_DIMENSION, MAX_DIMENSION)) {
            return Ok(());
        }

        polygon_transform_and_clip(
            &mut self.vertices,
            &mut self.contour_pts,
            points,
            pts_per_contour,
            matrix,
            &clip,
        )?;

        if self.vertices.is_empty() || self.contour_pts.is_empty() {
            return Ok(());
        }

        match quality {
            AaQuality::Better => raster_better::draw(self, fill_rule, &clip, filler),
            AaQuality::Faster => raster_faster::draw(self, fill_rule, &clip, filler),
            AaQuality::NonAntialiased => raster_noaa::draw(self, fill_rule, &clip, filler),
        }
    }

    /// Release scratch memory grown during drawing bursts. With `max` set,
    /// buffers are freed entirely; otherwise they shrink back to a modest
    /// baseline capacity. Never called automatically.
    pub fn recover_memory(&mut self, max: bool) {
        const BASELINE: usize = 256;
        debug!("rasterizer memory recovery (max: {max})");

        macro_rules! recover {
            ($field:expr) => {
                $field.clear();
                if max {
                    $field.shrink_to_fit();
                } else {
                    $field.shrink_to(BASELINE);
                }
            };
        }
        recover!(self.vertices);
        recover!(self.contour_pts);
        recover!(self.gel);
        recover!(self.ael);
        recover!(self.events);
        recover!(self.events_tmp);
        recover!(self.intersection_nums);
        recover!(self.sort_keys);
        recover!(self.sweep_dists);
    }

    /// Clamp the span to the clip width and invoke the filler, resetting the
    /// span accumulator.
    pub(crate) fn emit_scanline<F: ScanlineFiller>(
        &mut self,
        y_pixel: i32,
        min_x: &mut u16,
        max_x: &mut u16,
        clip: &RectI,
        filler: &mut F,
    ) {
        let mut x0 = (*min_x >> FIXED_SHIFT) as i32;
        let mut x1 = (*max_x >> FIXED_SHIFT) as i32;
        if x1 >= clip.x2 {
            x1 = clip.x2 - 1;
            if x0 >= clip.x2 {
                x0 = clip.x2 - 1;
            }
        }
        filler.fill(y_pixel, x0, x1, &mut self.coverage_deltas);
        *min_x = crate::fixedpoint::MAX_COORDINATE;
        *max_x = 0;
    }
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
