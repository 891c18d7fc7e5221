//! Non-antialiased rasterization, plus the y-sorted global edge list and
//! active-list sorting shared with the faster tier.
//!
//! One sample per pixel row, taken at the row center: each active edge
//! crossing deposits all-or-nothing coverage at the nearest pixel boundary.

use crate::basics::{FillRule, RectI};
use crate::error::{try_push, try_reserve, Result};
use crate::fixedpoint::{
    FIXED_HALF, FIXED_MASK, FIXED_ONE, FIXED_SHIFT, INT_MASK, MAX_COVERAGE,
};
use crate::rasterizer::{
    edge_zero_length, make_edge, sweep_line_distance, EdgeSweepDistance, Rasterizer,
    ScanlineFiller,
};

// ============================================================================
// Global edge list (shared with the faster tier)
// ============================================================================

/// Build the global edge list ordered by upper-vertex y, descending (the
/// sweep runs top-down).
pub(crate) fn gel_setup(r: &mut Rasterizer) -> Result<()> {
    r.gel.clear();
    try_reserve(&mut r.gel, r.vertices.len())?;

    let mut k = 0usize;
    for ci in 0..r.contour_pts.len() {
        let count = r.contour_pts[ci] as usize;
        let k0 = k;
        for _ in 0..count - 1 {
            if let Some(e) = make_edge(k as u32, (k + 1) as u32, &r.vertices) {
                r.gel.push(e);
            }
            k += 1;
        }
        if let Some(e) = make_edge(k as u32, k0 as u32, &r.vertices) {
            r.gel.push(e);
        }
        k += 1;
    }

    let verts = &r.vertices;
    r.gel
        .sort_unstable_by(|a, b| verts[b.v0 as usize].y.cmp(&verts[a.v0 as usize].y));
    Ok(())
}

/// Sort the active-edge sweep distances left to right. The common two- and
/// four-edge cases skip the general shell sort.
pub(crate) fn ael_sort(base: &mut [EdgeSweepDistance]) {
    let num = base.len();
    if num == 2 {
        if base[0].sweep_dist > base[1].sweep_dist {
            base.swap(0, 1);
        }
    } else if num == 4 {
        for i in 0..3 {
            for h in i + 1..4 {
                if base[i].sweep_dist > base[h].sweep_dist {
                    base.swap(i, h);
                }
            }
        }
    } else {
        // shell sort with the 3x+1 gap sequence
        let mut h = 1usize;
        while h < num / 9 {
            h = 3 * h + 1;
        }
        while h > 0 {
            for i in h..num {
                let v = base[i];
                let mut j = i;
                while j >= h && v.sweep_dist < base[j - h].sweep_dist {
                    base[j] = base[j - h];
                    j -= h;
                }
                base[j] = v;
            }
            h /= 3;
        }
    }
}

/// Rebuild the sweep distances of the current active list at scanline `y`
/// and sort them.
pub(crate) fn sweep_dists_rebuild(r: &mut Rasterizer, y: u16) -> Result<()> {
    r.sweep_dists.clear();
    try_reserve(&mut r.sweep_dists, r.ael.len())?;
    for &e in &r.ael {
        r.sweep_dists.push(EdgeSweepDistance {
            edge: e,
            sweep_dist: sweep_line_distance(y, &r.gel[e as usize], &r.vertices),
        });
    }
    ael_sort(&mut r.sweep_dists);
    Ok(())
}

// ============================================================================
// Coverage
// ============================================================================

/// Round a crossing to the nearest pixel boundary.
#[inline]
fn rounded_pixel(dist: u16) -> usize {
    let d = dist as i32;
    if d & FIXED_MASK <= FIXED_HALF {
        (d >> FIXED_SHIFT) as usize
    } else {
        ((d >> FIXED_SHIFT) + 1) as usize
    }
}

/// Deposit binary coverage deltas for the current sample line.
fn coverage_compute(min_x: &mut i32, max_x: &mut i32, r: &mut Rasterizer, fill_rule: FillRule) {
    debug_assert!(r.sweep_dists.len() >= 2 && r.sweep_dists.len() % 2 == 0);

    let dists = &r.sweep_dists;
    let deltas = &mut r.coverage_deltas;
    let gel = &r.gel;

    let first = rounded_pixel(dists[0].sweep_dist);
    deltas[first] += MAX_COVERAGE;
    if (first as i32) < *min_x {
        *min_x = first as i32;
    }

    let last_px;
    match fill_rule {
        FillRule::EvenOdd => {
            let mut even = false;
            for d in &dists[1..dists.len() - 1] {
                let px = rounded_pixel(d.sweep_dist);
                if even {
                    deltas[px] += MAX_COVERAGE;
                } else {
                    deltas[px] -= MAX_COVERAGE;
                }
                even = !even;
            }
            let px = rounded_pixel(dists[dists.len() - 1].sweep_dist);
            deltas[px] -= MAX_COVERAGE;
            last_px = px;
        }
        FillRule::NonZero => {
            let mut current_sign = gel[dists[0].edge as usize].sign as i32;
            let mut i = 1usize;
            let mut px;
            loop {
                while current_sign != 0 && i < dists.len() {
                    current_sign += gel[dists[i].edge as usize].sign as i32;
                    i += 1;
                }
                px = rounded_pixel(dists[i - 1].sweep_dist);
                deltas[px] -= MAX_COVERAGE;

                if i == dists.len() {
                    break;
                }

                current_sign = gel[dists[i].edge as usize].sign as i32;
                px = rounded_pixel(dists[i].sweep_dist);
                deltas[px] += MAX_COVERAGE;
                i += 1;
            }
            last_px = px;
        }
    }
    if (last_px as i32) > *max_x {
        *max_x = last_px as i32;
    }
}

// ============================================================================
// Main loop
// ============================================================================

/// Rasterize the clipped contours without antialiasing.
pub(crate) fn draw<F: ScanlineFiller>(
    r: &mut Rasterizer,
    fill_rule: FillRule,
    clip_box: &RectI,
    filler: &mut F,
) -> Result<()> {
    gel_setup(r)?;
    if r.gel.len() < 2 {
        return Ok(());
    }

    let mut min_x = i32::MAX;
    let mut max_x = i32::MIN;

    // first sample line at or just below the topmost vertex
    let first_y = r.vertices[r.gel[0].v0 as usize].y as i32;
    let mut y = if first_y & FIXED_MASK >= FIXED_HALF {
        (first_y & INT_MASK) | FIXED_HALF
    } else {
        ((first_y & INT_MASK) | FIXED_HALF) - FIXED_ONE
    };

    r.ael.clear();

    let mut i = 0usize;
    while i < r.gel.len() || !r.ael.is_empty() {
        // drop edges ending above the sample line
        let mut j = 0usize;
        while j < r.ael.len() {
            if r.vertices[r.gel[r.ael[j] as usize].v1 as usize].y as i32 >= y {
                r.ael.swap_remove(j);
            } else {
                j += 1;
            }
        }

        // admit edges starting at or above it
        while i < r.gel.len() && r.vertices[r.gel[i].v0 as usize].y as i32 >= y {
            if !edge_zero_length(&r.gel[i], &r.vertices)
                && (r.vertices[r.gel[i].v1 as usize].y as i32) < y
            {
                try_push(&mut r.ael, i as u32)?;
            }
            i += 1;
        }

        if !r.ael.is_empty() {
            debug_assert!(r.ael.len() % 2 == 0);
            sweep_dists_rebuild(r, y as u16)?;
            coverage_compute(&mut min_x, &mut max_x, r, fill_rule);

            if min_x <= max_x {
                if max_x >= clip_box.x2 {
                    max_x = clip_box.x2 - 1;
                    if min_x >= clip_box.x2 {
                        min_x = clip_box.x2 - 1;
                    }
                }
                filler.fill(y >> FIXED_SHIFT, min_x, max_x, &mut r.coverage_deltas);
                min_x = i32::MAX;
                max_x = i32::MIN;
            }
        } else if i < r.gel.len() {
            // jump straight to the next populated sample line
            let vy = r.vertices[r.gel[i].v0 as usize].y as i32;
            y = if vy & FIXED_MASK >= FIXED_HALF {
                ((vy & INT_MASK) | FIXED_HALF) + FIXED_ONE
            } else {
                (vy & INT_MASK) | FIXED_HALF
            };
        }

        if y == FIXED_HALF {
            break;
        }
        y -= FIXED_ONE;
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
