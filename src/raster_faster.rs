//! Fast antialiased rasterization.
//!
//! Two sub-scanline samples per pixel row, at the 3/4 and 1/4 y fractions;
//! each crossing splits half the maximum coverage between the two straddled
//! pixels. No intersection tracking: the active list is rebuilt and re-
//! sorted at every sample line, trading the exact tier's precision for
//! speed while keeping antialiased output.

use crate::basics::{FillRule, RectI};
use crate::error::{try_push, Result};
use crate::fixedpoint::{
    FIXED_HALF, FIXED_MASK, FIXED_ONE, FIXED_SHIFT, INT_MASK, MAX_COVERAGE,
};
use crate::raster_noaa::{gel_setup, sweep_dists_rebuild};
use crate::rasterizer::{edge_zero_length, Rasterizer, ScanlineFiller};

/// 0.25 in fixed point.
const FIXED_QUARTER: i32 = 1 << (FIXED_SHIFT - 2);
/// 0.75 in fixed point.
const FIXED_THREE_QUARTER: i32 = FIXED_ONE - FIXED_QUARTER;
/// Coverage contributed by one of the two samples of a fully covered pixel.
const HALF_MAX_COVERAGE: i32 = MAX_COVERAGE >> 1;
/// Coverage per fixed-point sub-unit of a sample crossing.
const SLICE_HEIGHT: i32 = 1 << (29 - FIXED_SHIFT);

/// Deposit one crossing: half coverage split across the straddled pixels.
#[inline]
fn deposit(deltas: &mut [i32], dist: u16, sign: i32) {
    let d = dist as i32;
    let a0 = (d & FIXED_MASK) * SLICE_HEIGHT;
    let a1 = HALF_MAX_COVERAGE - a0;
    let px = (d >> FIXED_SHIFT) as usize;
    deltas[px] += sign * a1;
    deltas[px + 1] += sign * a0;
}

/// Accumulate the coverage deltas for one sample line.
fn coverage_compute(min_x: &mut i32, max_x: &mut i32, r: &mut Rasterizer, fill_rule: FillRule) {
    debug_assert!(r.sweep_dists.len() >= 2 && r.sweep_dists.len() % 2 == 0);

    let dists = &r.sweep_dists;
    let deltas = &mut r.coverage_deltas;
    let gel = &r.gel;

    let first = dists[0].sweep_dist;
    deposit(deltas, first, 1);
    if (first as i32 >> FIXED_SHIFT) < *min_x {
        *min_x = first as i32 >> FIXED_SHIFT;
    }

    let last;
    match fill_rule {
        FillRule::EvenOdd => {
            let mut even = false;
            for d in &dists[1..dists.len() - 1] {
                deposit(deltas, d.sweep_dist, if even { 1 } else { -1 });
                even = !even;
            }
            last = dists[dists.len() - 1].sweep_dist;
            deposit(deltas, last, -1);
        }
        FillRule::NonZero => {
            let mut current_sign = gel[dists[0].edge as usize].sign as i32;
            let mut i = 1usize;
            let mut dist;
            loop {
                while current_sign != 0 && i < dists.len() {
                    current_sign += gel[dists[i].edge as usize].sign as i32;
                    i += 1;
                }
                dist = dists[i - 1].sweep_dist;
                deposit(deltas, dist, -1);

                if i == dists.len() {
                    break;
                }

                current_sign = gel[dists[i].edge as usize].sign as i32;
                dist = dists[i].sweep_dist;
                deposit(deltas, dist, 1);
                i += 1;
            }
            last = dist;
        }
    }
    let last_px = (last as i32 >> FIXED_SHIFT) + 1;
    if last_px > *max_x {
        *max_x = last_px;
    }
}

/// Rasterize the clipped contours with two-sample antialiasing.
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
    let fr = first_y & FIXED_MASK;
    let mut y = if fr >= FIXED_THREE_QUARTER {
        (first_y & INT_MASK) | FIXED_THREE_QUARTER
    } else if fr < FIXED_QUARTER {
        ((first_y & INT_MASK) | FIXED_THREE_QUARTER) - FIXED_ONE
    } else {
        (first_y & INT_MASK) | FIXED_QUARTER
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

            // the pixel row completes at its lower (1/4) sample
            if y & FIXED_MASK == FIXED_QUARTER {
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
        } else {
            if y & FIXED_MASK == FIXED_QUARTER && min_x <= max_x {
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

            if i < r.gel.len() {
                let vy = r.vertices[r.gel[i].v0 as usize].y as i32;
                let fr = vy & FIXED_MASK;
                y = if fr >= FIXED_THREE_QUARTER {
                    ((vy & INT_MASK) | FIXED_THREE_QUARTER) + FIXED_HALF
                } else if fr < FIXED_QUARTER {
                    ((vy & INT_MASK) | FIXED_THREE_QUARTER) - FIXED_HALF
                } else {
                    (vy & INT_MASK) | FIXED_THREE_QUARTER
                };
            }
        }

        if y == FIXED_QUARTER {
            break;
        }
        y -= FIXED_HALF;
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
