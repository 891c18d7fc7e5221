//! Polygon transform and clipping front-end shared by all rasterizer tiers.
//!
//! Contour vertices are transformed into surface space and clipped against
//! the rectangular clip box with a Liang-Barsky scheme extended to closed
//! polygons: edges leaving the box contribute turning vertices on the box
//! boundary so the clipped polygon stays closed. Vertices are emitted in
//! fixed point; any emitted edge whose x or y span would exceed half the
//! maximum representable coordinate is split at its midpoint so downstream
//! slope and intersection arithmetic stays in range.

use crate::basics::{PointD, RectI};
use crate::error::{try_push, Result};
use crate::fixedpoint::{FixVertex, HALF_MAX_COORDINATE};
use crate::trans_affine::TransAffine;

/// Clip box in f64 surface coordinates.
#[derive(Debug, Clone, Copy)]
struct ClipBoxF {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl ClipBoxF {
    fn from_rect(r: &RectI) -> Self {
        Self {
            min_x: r.x1 as f64,
            min_y: r.y1 as f64,
            max_x: r.x2 as f64,
            max_y: r.y2 as f64,
        }
    }
}

/// Region outcode of `p` with respect to the clip box.
///
/// ```text
///        |        |
///  0110  |  0010  | 0011
///        |        |
/// -------+--------+--------
///        |        |
///  0100  |  0000  | 0001
///        |        |
/// -------+--------+--------
///        |        |
///  1100  |  1000  | 1001
///        |        |
/// ```
#[inline]
fn vertex_clip_flags(p: PointD, clip: &ClipBoxF) -> u32 {
    (p.x > clip.max_x) as u32
        | (((p.y > clip.max_y) as u32) << 1)
        | (((p.x < clip.min_x) as u32) << 2)
        | (((p.y < clip.min_y) as u32) << 3)
}

/// Push a vertex lying on a vertical clip boundary. Vertical runs along the
/// boundary never need splitting; anything else falls through to the general
/// push.
fn vertex_boundary_push(
    x: f64,
    y: f64,
    old: &mut FixVertex,
    out: &mut Vec<FixVertex>,
) -> Result<()> {
    let new = FixVertex::from_f64(x, y);
    if new.x == old.x {
        try_push(out, new)?;
    } else {
        if (new.y as i32 - old.y as i32).abs() >= HALF_MAX_COORDINATE
            || (new.x as i32 - old.x as i32).abs() >= HALF_MAX_COORDINATE
        {
            let mid = FixVertex::new(
                ((new.x as i32 + old.x as i32) >> 1) as u16,
                ((new.y as i32 + old.y as i32) >> 1) as u16,
            );
            try_push(out, mid)?;
        }
        try_push(out, new)?;
    }
    *old = new;
    Ok(())
}

/// Push a vertex, splitting the incoming edge at its midpoint when its span
/// would overflow the slope arithmetic.
fn vertex_push(x: f64, y: f64, old: &mut FixVertex, out: &mut Vec<FixVertex>) -> Result<()> {
    let new = FixVertex::from_f64(x, y);
    if (new.y as i32 - old.y as i32).abs() >= HALF_MAX_COORDINATE
        || (new.x as i32 - old.x as i32).abs() >= HALF_MAX_COORDINATE
    {
        let mid = FixVertex::new(
            ((new.x as i32 + old.x as i32) >> 1) as u16,
            ((new.y as i32 + old.y as i32) >> 1) as u16,
        );
        try_push(out, mid)?;
    }
    try_push(out, new)?;
    *old = new;
    Ok(())
}

/// Clip the edge `p0 -> p1` against the box, emitting visible portions and
/// turning vertices.
fn edge_clip(
    p0: PointD,
    p1: PointD,
    clip: &ClipBoxF,
    old: &mut FixVertex,
    out: &mut Vec<FixVertex>,
) -> Result<()> {
    const NEARZERO: f64 = 1.0e-30;

    let mut deltax = p1.x - p0.x;
    if deltax == 0.0 {
        deltax = if p0.x > clip.min_x { -NEARZERO } else { NEARZERO };
    }
    let (xin, xout) = if deltax > 0.0 {
        (clip.min_x, clip.max_x)
    } else {
        (clip.max_x, clip.min_x)
    };

    let mut deltay = p1.y - p0.y;
    if deltay == 0.0 {
        deltay = if p0.y > clip.min_y { -NEARZERO } else { NEARZERO };
    }
    let (yin, yout) = if deltay > 0.0 {
        (clip.min_y, clip.max_y)
    } else {
        (clip.max_y, clip.min_y)
    };

    let tinx = (xin - p0.x) / deltax;
    let tiny = (yin - p0.y) / deltay;
    let (tin1, tin2) = if tinx < tiny { (tinx, tiny) } else { (tiny, tinx) };

    if tin1 <= 1.0 {
        if 0.0 < tin1 {
            // turning vertex at the entry corner
            vertex_boundary_push(xin, yin, old, out)?;
        }

        if tin2 <= 1.0 {
            let toutx = (xout - p0.x) / deltax;
            let touty = (yout - p0.y) / deltay;
            let tout1 = toutx.min(touty);

            if tin2 > 0.0 || tout1 > 0.0 {
                if tin2 <= tout1 {
                    // visible segment
                    if tin2 > 0.0 {
                        // p0 outside the window
                        if tinx > tiny {
                            vertex_boundary_push(xin, p0.y + tinx * deltay, old, out)?;
                        } else {
                            vertex_push(p0.x + tiny * deltax, yin, old, out)?;
                        }
                    }
                    if tout1 < 1.0 {
                        // p1 outside the window
                        if toutx < touty {
                            vertex_boundary_push(xout, p0.y + toutx * deltay, old, out)?;
                        } else {
                            vertex_push(p0.x + touty * deltax, yout, old, out)?;
                        }
                    } else {
                        vertex_push(p1.x, p1.y, old, out)?;
                    }
                } else {
                    // invisible segment crossing a corner region
                    if tinx > tiny {
                        vertex_boundary_push(xin, yout, old, out)?;
                    } else {
                        vertex_boundary_push(xout, yin, old, out)?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// First reference vertex for a contour: the point itself when inside the
/// box, else the nearest box corner.
fn vertex_find_first(p: PointD, clip: &ClipBoxF) -> PointD {
    if p.x >= clip.min_x {
        if p.x <= clip.max_x {
            if p.y >= clip.min_y {
                if p.y <= clip.max_y {
                    p
                } else {
                    PointD::new(clip.min_x, clip.max_y)
                }
            } else {
                PointD::new(clip.max_x, clip.min_y)
            }
        } else {
            PointD::new(clip.max_x, clip.min_y)
        }
    } else {
        PointD::new(clip.min_x, clip.max_y)
    }
}

/// Transform the input contours into surface space and clip them against
/// `clip_box`, writing fixed-point vertices and per-contour counts.
///
/// Contours that degenerate to fewer than three vertices are discarded.
pub fn polygon_transform_and_clip(
    vertices_out: &mut Vec<FixVertex>,
    contour_pts_out: &mut Vec<i32>,
    vertices_in: &[PointD],
    contour_pts_in: &[i32],
    matrix: &TransAffine,
    clip_box: &RectI,
) -> Result<()> {
    let clip = ClipBoxF::from_rect(clip_box);

    vertices_out.clear();
    contour_pts_out.clear();

    let transform = |p: PointD| -> PointD {
        let (mut x, mut y) = (p.x, p.y);
        matrix.transform(&mut x, &mut y);
        PointD::new(x, y)
    };

    let mut old_size = 0usize;
    let mut q = 0usize;
    for &count in contour_pts_in {
        let j = count as usize;

        let last_point = transform(vertices_in[q + j - 1]);
        let first = vertex_find_first(last_point, &clip);
        let mut old = FixVertex::from_f64(first.x, first.y);
        let mut cur_flags = vertex_clip_flags(last_point, &clip);

        // walk the contour edges, starting from the closing edge's tail
        let mut p0 = last_point;
        for k in 0..j {
            // the final iteration re-processes the last (closing) vertex
            let p1 = if k < j - 1 {
                transform(vertices_in[q + k])
            } else {
                last_point
            };
            let new_flags = vertex_clip_flags(p1, &clip);
            if new_flags == cur_flags {
                if cur_flags == 0 {
                    vertex_push(p1.x, p1.y, &mut old, vertices_out)?;
                }
            } else {
                edge_clip(p0, p1, &clip, &mut old, vertices_out)?;
                cur_flags = new_flags;
            }
            p0 = p1;
        }

        // degenerate contours vanish
        if vertices_out.len() - old_size < 3 {
            vertices_out.truncate(old_size);
        } else {
            let new_size = vertices_out.len();
            try_push(contour_pts_out, (new_size - old_size) as i32)?;
            old_size = new_size;
        }
        q += j;
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
