//! Exact antialiased rasterization.
//!
//! A Bentley-Ottmann style sweep: all vertex events plus synthesized
//! edge/edge intersection events are processed in decreasing y order while
//! an active edge list is kept in left-to-right sweep order. Intersection
//! positions are held in exact rational integer arithmetic (64-bit
//! numerators over a 32-bit denominator) so accumulated floating error can
//! never corrupt the active-list ordering. Between consecutive event
//! heights, each active edge contributes an exact trapezoidal coverage
//! delta; whenever the sweep crosses an integer scanline the delta line is
//! handed to the filler.

use crate::basics::{FillRule, RectI};
use crate::error::{try_push, try_reserve, Result};
use crate::fixedpoint::{
    FixVertex, AREA_SHIFT, FIXED_MASK, FIXED_ONE, FIXED_ONE_SQR_TWO, FIXED_SHIFT, FIXED_TWO,
    MAX_COORDINATE,
};
use crate::rasterizer::{sweep_line_distance, Edge, Rasterizer, ScanlineFiller};

const SWAP_EVENT: u32 = 1 << 31;
const DISCARDED_SWAP: u32 = 1 << 30;
const NUMS_IDX_MASK: u32 = 0x3FFF_FFFF;

/// Number of vertices above which the event sort switches from the stable
/// run-merging sort to the unstable quicksort.
const MERGE_SORT_LIMIT: usize = 32768;

// ============================================================================
// Events
// ============================================================================

/// A sweep event. Vertex events carry their packed position in `den`;
/// swap (intersection) events carry the rational denominator in `den` and
/// index their numerators through `flags`.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Event {
    pub den: u32,
    pub edge0: i32,
    pub edge1: i32,
    pub flags: u32,
}

impl Event {
    #[inline]
    fn is_swap(&self) -> bool {
        self.flags & SWAP_EVENT != 0
    }

    #[inline]
    fn is_discarded(&self) -> bool {
        self.flags & DISCARDED_SWAP != 0
    }

    #[inline]
    fn nums_idx(&self) -> usize {
        (self.flags & NUMS_IDX_MASK) as usize
    }

    #[inline]
    fn pos_y(&self) -> u16 {
        (self.den >> 16) as u16
    }

    #[inline]
    fn pos_x(&self) -> u16 {
        (self.den & 0xFFFF) as u16
    }
}

/// Exact numerators of an intersection position (the denominator lives in
/// the event).
#[derive(Debug, Clone, Copy)]
pub(crate) struct IntersectionNums {
    pub x_num: u64,
    pub y_num: u64,
}

/// Order two events; `e1` must be a swap event. Events sort by y
/// descending, then x ascending; positions are compared exactly by
/// cross-multiplying against the rational denominators.
fn events_cmp(nums: &[IntersectionNums], e0: &Event, e1: &Event) -> i32 {
    debug_assert!(e1.is_swap());

    if !e0.is_swap() {
        let n1 = &nums[e1.nums_idx()];
        let l = e0.pos_y() as u64 * e1.den as u64;
        if l > n1.y_num {
            -1
        } else if l < n1.y_num {
            1
        } else {
            let l = e0.pos_x() as u64 * e1.den as u64;
            if l < n1.x_num {
                -1
            } else if l > n1.x_num {
                1
            } else {
                0
            }
        }
    } else {
        let n0 = &nums[e0.nums_idx()];
        let n1 = &nums[e1.nums_idx()];

        let a = n0.y_num as u128 * e1.den as u128;
        let b = n1.y_num as u128 * e0.den as u128;
        if a > b {
            -1
        } else if a < b {
            1
        } else {
            let a = n0.x_num as u128 * e1.den as u128;
            let b = n1.x_num as u128 * e0.den as u128;
            if a < b {
                -1
            } else if a > b {
                1
            } else {
                0
            }
        }
    }
}

// ============================================================================
// Active-edge ordering
// ============================================================================

/// Compare an edge against a vertex along the sweepline through that
/// vertex, exactly (cross-multiplied integer arithmetic).
#[inline]
fn edge_sweep_cmp(edge: &Edge, pos: FixVertex, verts: &[FixVertex]) -> i32 {
    let v0 = verts[edge.v0 as usize];
    let v1 = verts[edge.v1 as usize];
    debug_assert!(pos.y <= v0.y && pos.y >= v1.y);

    if v0.x == v1.x {
        // vertical edge
        return if v0.x < pos.x {
            -1
        } else if v0.x > pos.x {
            1
        } else {
            0
        };
    }

    if v0.x >= v1.x {
        // positive slope (leftward going down)
        if pos.x >= v1.x {
            let dx = (v0.x - v1.x) as u32;
            let dy = (v0.y - v1.y) as u32;
            let delta = (pos.y - v1.y) as u32;
            let left = delta * dx;
            let right = dy * (pos.x - v1.x) as u32;
            if left < right {
                -1
            } else if left > right {
                1
            } else {
                0
            }
        } else {
            1
        }
    } else if pos.x > v1.x {
        -1
    } else {
        let dx = (v1.x - v0.x) as u32;
        let dy = (v0.y - v1.y) as u32;
        let delta = (pos.y - v1.y) as u32;
        let left = delta * dx;
        let right = dy * (v1.x - pos.x) as u32;
        if left > right {
            -1
        } else if left < right {
            1
        } else {
            0
        }
    }
}

/// Break a sweep-distance tie by comparing slopes. `e1.v0` is the current
/// event position.
fn edges_slope_cmp(e0: &Edge, e1: &Edge, verts: &[FixVertex]) -> i32 {
    let e0v1 = verts[e0.v1 as usize];
    let e1v0 = verts[e1.v0 as usize];
    let e1v1 = verts[e1.v1 as usize];

    if e1v1.x < e1v0.x {
        if e0v1.x < e1v0.x {
            let left = (e1v0.x - e0v1.x) as u32 * (e1v0.y - e1v1.y) as u32;
            let right = (e1v0.x - e1v1.x) as u32 * (e1v0.y - e0v1.y) as u32;
            if left > right {
                -1
            } else {
                1
            }
        } else {
            1
        }
    } else if e1v1.x > e1v0.x {
        if e0v1.x <= e1v0.x {
            -1
        } else {
            let left = (e0v1.x - e1v0.x) as u32 * (e1v0.y - e1v1.y) as u32;
            let right = (e1v1.x - e1v0.x) as u32 * (e1v0.y - e0v1.y) as u32;
            if left < right {
                -1
            } else {
                1
            }
        }
    } else if e0v1.x <= e1v0.x {
        -1
    } else {
        1
    }
}

/// Full active-list ordering of `e0` against `e1` at `e1.v0`'s sweepline.
#[inline]
fn edges_cmp(e0: &Edge, e1: &Edge, verts: &[FixVertex]) -> i32 {
    let e0v0 = verts[e0.v0 as usize];
    let e1v0 = verts[e1.v0 as usize];

    if e0v0.key() == e1v0.key() {
        edges_slope_cmp(e0, e1, verts)
    } else {
        let cmp = edge_sweep_cmp(e0, e1v0, verts);
        if cmp == 0 {
            edges_slope_cmp(e0, e1, verts)
        } else {
            cmp
        }
    }
}

// ============================================================================
// Active edge list maintenance
// ============================================================================

/// Insert `edge_idx` into the active list at its sweep position; returns the
/// insertion index.
fn edge_insert(r: &mut Rasterizer, edge_idx: u32) -> Result<usize> {
    let edge = r.gel[edge_idx as usize];
    let mut lo = 0usize;
    let mut count = r.ael.len();
    while count > 0 {
        let half = count >> 1;
        let mid = lo + half;
        if edges_cmp(&r.gel[r.ael[mid] as usize], &edge, &r.vertices) < 0 {
            lo = mid + 1;
            count -= half + 1;
        } else {
            count = half;
        }
    }
    try_reserve(&mut r.ael, 1)?;
    r.ael.insert(lo, edge_idx);
    Ok(lo)
}

/// Remove an edge from the active list, testing its former neighbors for a
/// new intersection.
fn edge_remove(r: &mut Rasterizer, edge_idx: u32, cur_event_index: usize) -> Result<()> {
    // horizontal edges never enter the list
    for i in 0..r.ael.len() {
        if r.ael[i] == edge_idx {
            if i >= 1 && i + 1 < r.ael.len() {
                let (left, right) = (r.ael[i - 1], r.ael[i + 1]);
                edges_intersect(r, left, right, cur_event_index)?;
            }
            r.ael.remove(i);
            break;
        }
    }
    Ok(())
}

/// Locate two edges as consecutive active-list entries; `Some((i0, i1))`
/// with `i0 + 1 == i1` when found.
fn edges_find_indexes(r: &Rasterizer, edge0: i32, edge1: i32) -> Option<(usize, usize)> {
    debug_assert!(r.ael.len() >= 2);

    let q0 = r.ael.iter().position(|&e| e as i32 == edge0)?;

    if q0 == 0 {
        (r.ael[1] as i32 == edge1).then_some((0, 1))
    } else if q0 == r.ael.len() - 1 {
        (r.ael[q0 - 1] as i32 == edge1).then_some((q0 - 1, q0))
    } else if r.ael[q0 - 1] as i32 == edge1 {
        Some((q0 - 1, q0))
    } else if r.ael[q0 + 1] as i32 == edge1 {
        Some((q0, q0 + 1))
    } else {
        None
    }
}

/// Execute a swap event: exchange the two crossing edges in the active list
/// and test the new neighbor pairs. A swap whose edges are no longer
/// adjacent is marked discarded.
fn event_do_swap(r: &mut Rasterizer, cur_event_index: usize) -> Result<()> {
    let ev = r.events[cur_event_index];
    match edges_find_indexes(r, ev.edge0, ev.edge1) {
        Some((q0, q1)) => {
            if q0 >= 1 {
                let (left, right) = (r.ael[q0 - 1], r.ael[q1]);
                edges_intersect(r, left, right, cur_event_index)?;
            }
            if q1 + 1 < r.ael.len() {
                let (left, right) = (r.ael[q0], r.ael[q1 + 1]);
                edges_intersect(r, left, right, cur_event_index)?;
            }
            r.ael.swap(q0, q1);
        }
        None => {
            r.events[cur_event_index].flags |= DISCARDED_SWAP;
        }
    }
    Ok(())
}

/// Check two events for describing the same edge swap.
#[inline]
fn events_same_swap(ev0: &Event, ev1: &Event) -> bool {
    ev0.is_swap()
        && ev1.is_swap()
        && ((ev0.edge0 == ev1.edge0 && ev0.edge1 == ev1.edge1)
            || (ev0.edge0 == ev1.edge1 && ev0.edge1 == ev1.edge0))
}

/// Insert a swap event into the sorted queue, skipping events geometrically
/// before the current one and equivalent non-discarded swaps.
fn event_insert(r: &mut Rasterizer, ev: Event, cur_event_index: usize) -> Result<()> {
    let cmp = events_cmp(&r.intersection_nums, &r.events[cur_event_index], &ev);
    if cmp > 0 {
        return Ok(());
    }

    let (mut lo, mut count) = if cmp < 0 {
        (cur_event_index, r.events.len() - cur_event_index)
    } else {
        (0, r.events.len())
    };

    while count > 0 {
        let half = count >> 1;
        let mid = lo + half;
        if events_cmp(&r.intersection_nums, &r.events[mid], &ev) < 0 {
            lo = mid + 1;
            count -= half + 1;
        } else {
            count = half;
        }
    }

    let mut i = lo;
    while i < r.events.len() && events_cmp(&r.intersection_nums, &r.events[i], &ev) == 0 {
        if events_same_swap(&ev, &r.events[i]) && !r.events[i].is_discarded() {
            return Ok(());
        }
        i += 1;
    }

    try_reserve(&mut r.events, 1)?;
    r.events.insert(i, ev);
    Ok(())
}

/// Test two active edges for a crossing; a crossing becomes a swap event
/// with an exact rational position.
fn edges_intersect(
    r: &mut Rasterizer,
    edge_sx: u32,
    edge_dx: u32,
    cur_event_index: usize,
) -> Result<()> {
    let es = r.gel[edge_sx as usize];
    let ed = r.gel[edge_dx as usize];
    let p1 = r.vertices[es.v0 as usize];
    let p2 = r.vertices[es.v1 as usize];
    let p3 = r.vertices[ed.v0 as usize];
    let p4 = r.vertices[ed.v1 as usize];

    let p2p1x = p2.x as i32 - p1.x as i32;
    let p2p1y = p2.y as i32 - p1.y as i32;
    let p3p1x = p3.x as i32 - p1.x as i32;
    let p3p1y = p3.y as i32 - p1.y as i32;
    let p4p1x = p4.x as i32 - p1.x as i32;
    let p4p1y = p4.y as i32 - p1.y as i32;

    let area0 = p2p1x * p3p1y - p2p1y * p3p1x;
    let area1 = p2p1x * p4p1y - p2p1y * p4p1x;
    if (area0 >= 0 && area1 >= 0) || (area0 <= 0 && area1 <= 0) {
        return Ok(());
    }

    let p2p3x = p2.x as i32 - p3.x as i32;
    let p2p3y = p2.y as i32 - p3.y as i32;
    let p4p3x = p4.x as i32 - p3.x as i32;
    let p4p3y = p4.y as i32 - p3.y as i32;
    let area0 = p3p1x * p4p3y - p3p1y * p4p3x;
    let area1 = p4p3x * p2p3y - p4p3y * p2p3x;
    if (area0 >= 0 && area1 >= 0) || (area0 <= 0 && area1 <= 0) {
        return Ok(());
    }

    // crossing found: position is (num / den) per axis
    let num_x = area0 as i64 * p2p1x as i64;
    let num_y = area0 as i64 * p2p1y as i64;
    let den = p2p1x * p4p3y - p2p1y * p4p3x;

    let (x_num, y_num, den_u) = if den < 0 {
        (
            (-(num_x + den as i64 * p1.x as i64)) as u64,
            (-(num_y + den as i64 * p1.y as i64)) as u64,
            (-den) as u32,
        )
    } else {
        (
            (num_x + den as i64 * p1.x as i64) as u64,
            (num_y + den as i64 * p1.y as i64) as u64,
            den as u32,
        )
    };

    let nums_idx = r.intersection_nums.len() as u32;
    try_push(&mut r.intersection_nums, IntersectionNums { x_num, y_num })?;
    let ev = Event {
        den: den_u,
        edge0: edge_sx as i32,
        edge1: edge_dx as i32,
        flags: SWAP_EVENT | nums_idx,
    };
    event_insert(r, ev, cur_event_index)
}

// ============================================================================
// Coverage accumulation
// ============================================================================

/// Spread a positive trapezoid delta between the slice crossings `x_up` and
/// `x_down` over the covered pixels.
fn coverage_add(deltas: &mut [i32], x_up: u16, x_down: u16, slice_height: u16) {
    coverage_span(deltas, x_up, x_down, slice_height, 1);
}

/// Spread a negative trapezoid delta.
fn coverage_sub(deltas: &mut [i32], x_up: u16, x_down: u16, slice_height: u16) {
    coverage_span(deltas, x_up, x_down, slice_height, -1);
}

fn coverage_span(deltas: &mut [i32], x_up: u16, x_down: u16, slice_height: u16, sign: i32) {
    let (x_left, x_right) = if x_down < x_up {
        (x_down as i32, x_up as i32)
    } else {
        (x_up as i32, x_down as i32)
    };

    let a = x_left & FIXED_MASK;
    let b = x_right & FIXED_MASK;
    let j0 = (x_left >> FIXED_SHIFT) as usize;
    let j1 = (x_right >> FIXED_SHIFT) as usize;
    let h = slice_height as i32;
    let n = j1 - j0;

    if n == 0 {
        // both crossings inside one pixel
        let area_last = (a + b) * (h << AREA_SHIFT);
        let area_first = FIXED_TWO * (h << AREA_SHIFT) - area_last;
        deltas[j0] += sign * area_first;
        deltas[j0 + 1] += sign * area_last;
    } else {
        let dx = x_right - x_left;
        let m = (h << AREA_SHIFT) / dx;
        let md = ((h << AREA_SHIFT) % dx) * FIXED_TWO;

        let area_first = (FIXED_ONE - a) * (FIXED_ONE - a) * m;
        deltas[j0] += sign * area_first;

        if n >= 2 {
            let nn = (n - 2) as i32;
            // spread the division remainder across the interior pixels so
            // the column totals stay exact
            let (mod0, mod1) = if nn > 0 { (md / nn, md % nn) } else { (0, md) };

            deltas[j0 + 1] += sign * (FIXED_ONE_SQR_TWO - a * a) * m;
            let area = m * FIXED_ONE_SQR_TWO + mod0;
            for d in &mut deltas[j0 + 2..j1] {
                *d += sign * area;
            }
            deltas[j1] +=
                sign * ((FIXED_ONE_SQR_TWO - (FIXED_ONE - b) * (FIXED_ONE - b)) * m + mod1);
            deltas[j1 + 1] += sign * (m * b * b);
        } else {
            let area_last = m * b * b;
            let area = FIXED_TWO * (h << AREA_SHIFT) - area_first - area_last;
            deltas[j0 + 1] += sign * area;
            deltas[j1 + 1] += sign * area_last;
        }
    }
}

/// Accumulate the coverage deltas of one slice from the active edge list,
/// pairing edges according to the fill rule.
fn coverage_compute(
    min_x: &mut u16,
    max_x: &mut u16,
    r: &mut Rasterizer,
    y_up: u16,
    y_down: u16,
    fill_rule: FillRule,
) {
    debug_assert!(y_up >= y_down);
    debug_assert!(r.ael.len() >= 2 && r.ael.len() % 2 == 0);

    let slice_height = y_up - y_down;
    let ael = &r.ael;
    let gel = &mut r.gel;
    let verts = &r.vertices;
    let deltas = &mut r.coverage_deltas;

    let mut old_x_up;
    let mut old_x_down;
    let mut x_up;
    let mut x_down;

    // edge distances may cross by a sub-precision amount between events;
    // clamping keeps the pairs ordered
    macro_rules! fix_order {
        () => {
            if x_up < old_x_up {
                x_up = old_x_up;
            }
            old_x_up = x_up;
            if x_down < old_x_down {
                x_down = old_x_down;
            }
            old_x_down = x_down;
        };
    }
    macro_rules! edge_dists {
        ($i:expr) => {{
            let e = ael[$i] as usize;
            x_up = gel[e].old_sweep_dist;
            x_down = sweep_line_distance(y_down, &gel[e], verts);
            gel[e].old_sweep_dist = x_down;
        }};
    }

    // leftmost edge always adds coverage
    {
        let e = ael[0] as usize;
        x_up = gel[e].old_sweep_dist;
        x_down = sweep_line_distance(y_down, &gel[e], verts);
        gel[e].old_sweep_dist = x_down;
    }
    old_x_up = x_up;
    old_x_down = x_down;
    coverage_add(deltas, x_up, x_down, slice_height);
    if x_up < *min_x {
        *min_x = x_up;
    }
    if x_down < *min_x {
        *min_x = x_down;
    }

    match fill_rule {
        FillRule::EvenOdd => {
            let j = ael.len() as i32 - 2;
            let mut i: i32 = 1;
            while i < j {
                edge_dists!(i as usize);
                fix_order!();
                coverage_sub(deltas, x_up, x_down, slice_height);
                edge_dists!((i + 1) as usize);
                fix_order!();
                coverage_add(deltas, x_up, x_down, slice_height);
                i += 2;
            }
            debug_assert!(i == j + 1);
            edge_dists!(i as usize);
            fix_order!();
            coverage_sub(deltas, x_up, x_down, slice_height);
        }
        FillRule::NonZero => {
            let mut current_sign = gel[ael[0] as usize].sign as i32;
            let mut i = 1usize;
            while i < ael.len() {
                while current_sign != 0 && i < ael.len() {
                    current_sign += gel[ael[i] as usize].sign as i32;
                    edge_dists!(i);
                    i += 1;
                }
                fix_order!();
                coverage_sub(deltas, x_up, x_down, slice_height);

                if i == ael.len() {
                    break;
                }

                current_sign = gel[ael[i] as usize].sign as i32;
                edge_dists!(i);
                fix_order!();
                coverage_add(deltas, x_up, x_down, slice_height);
                i += 1;
            }
        }
    }

    if x_up > *max_x {
        *max_x = x_up;
    }
    if x_down > *max_x {
        *max_x = x_down;
    }
}

// ============================================================================
// Setup
// ============================================================================

/// Build the global edge list and the sorted event queue.
fn bentley_ottmann_setup(r: &mut Rasterizer, clip_box: &RectI) -> Result<()> {
    let n = r.vertices.len();
    let box_max_y = (((clip_box.y2 as u32) << FIXED_SHIFT).min(0xFFFF)) as u16;
    r.box_max_y = box_max_y;

    r.events_tmp.clear();
    try_reserve(&mut r.events_tmp, n)?;
    r.gel.clear();
    try_reserve(&mut r.gel, n)?;
    try_reserve(&mut r.events, n)?;
    try_reserve(&mut r.sort_keys, n)?;

    // one event per vertex, keyed by flipped y so ascending key order walks
    // the surface top-down
    for v in &r.vertices {
        r.events_tmp.push(Event {
            den: ((box_max_y.wrapping_sub(v.y) as u32) << 16) | v.x as u32,
            edge0: -1,
            edge1: -1,
            flags: 0,
        });
    }

    let mut k = 0usize;
    for ci in 0..r.contour_pts.len() {
        let count = r.contour_pts[ci] as usize;
        let k0 = k;
        for _ in 0..count - 1 {
            add_edge(r, k, k + 1);
            k += 1;
        }
        add_edge(r, k, k0);
        k += 1;
    }

    // hybrid sort: a stable run-exploiting sort for typical queues, an
    // unstable quicksort on packed keys for huge ones
    r.sort_keys.clear();
    for (i, e) in r.events_tmp.iter().enumerate() {
        r.sort_keys.push((e.den, i as u32));
    }
    if n < MERGE_SORT_LIMIT {
        r.sort_keys.sort_by_key(|&(key, _)| key);
    } else {
        r.sort_keys.sort_unstable_by_key(|&(key, _)| key);
    }

    r.events.clear();
    for si in 0..r.sort_keys.len() {
        let (_, idx) = r.sort_keys[si];
        let mut e = r.events_tmp[idx as usize];
        // restore the raw y coordinate
        let raw_y = box_max_y.wrapping_sub(e.pos_y());
        e.den = ((raw_y as u32) << 16) | (e.den & 0xFFFF);
        r.events.push(e);
    }
    Ok(())
}

fn add_edge(r: &mut Rasterizer, k0: usize, k1: usize) {
    let edge_idx = match crate::rasterizer::make_edge(k0 as u32, k1 as u32, &r.vertices) {
        Some(e) => {
            r.gel.push(e);
            (r.gel.len() - 1) as i32
        }
        None => -1,
    };
    r.events_tmp[k0].edge1 = edge_idx;
    r.events_tmp[k1].edge0 = edge_idx;
}

/// Does `edge` end at this event vertex (its lower endpoint)?
#[inline]
fn edge_up_going(edge: &Edge, vertex_key: u32, verts: &[FixVertex]) -> bool {
    let v0 = verts[edge.v0 as usize];
    if v0.key() == vertex_key {
        v0.key() == verts[edge.v1 as usize].key()
    } else {
        true
    }
}

/// Does `edge` start at this event vertex (its upper endpoint)?
#[inline]
fn edge_down_going(edge: &Edge, vertex_key: u32, verts: &[FixVertex]) -> bool {
    verts[edge.v0 as usize].key() == vertex_key
}

// ============================================================================
// Main sweep
// ============================================================================

/// Rasterize the clipped contours with exact antialiasing.
pub(crate) fn draw<F: ScanlineFiller>(
    r: &mut Rasterizer,
    fill_rule: FillRule,
    clip_box: &RectI,
    filler: &mut F,
) -> Result<()> {
    bentley_ottmann_setup(r, clip_box)?;

    if r.events.len() < 3 {
        return Ok(());
    }

    let mut min_x: u16 = MAX_COORDINATE;
    let mut max_x: u16 = 0;
    let mut old_y = r.events[0].pos_y();

    r.ael.clear();
    r.intersection_nums.clear();

    let mut i = 0usize;
    while i < r.events.len() {
        let old_event = r.events[i];
        let new_y: u16 = if old_event.is_swap() {
            let w = &r.intersection_nums[old_event.nums_idx()];
            debug_assert!(old_event.den != 0);
            (w.y_num / old_event.den as u64) as u16
        } else {
            old_event.pos_y()
        };

        if new_y != old_y {
            // advance the sweep down to new_y, splitting the slice at
            // integer scanline boundaries so each pixel row is flushed as
            // soon as it completes
            loop {
                let mut rewind = false;
                let mut y = new_y as i32;
                let y0 = (old_y as i32) >> FIXED_SHIFT;
                let y1 = y >> FIXED_SHIFT;
                let y0fr = old_y as i32 & FIXED_MASK;

                if y0 != y1 {
                    if y0 - y1 > 1 {
                        rewind = true;
                        y = y0 << FIXED_SHIFT;
                        if y0fr == 0 {
                            y -= FIXED_ONE;
                        }
                    } else if y0fr != 0 {
                        y = y0 << FIXED_SHIFT;
                        rewind = true;
                    }
                }

                if !r.ael.is_empty() {
                    debug_assert!(r.ael.len() % 2 == 0);
                    coverage_compute(&mut min_x, &mut max_x, r, old_y, y as u16, fill_rule);
                }
                old_y = y as u16;

                if y & FIXED_MASK == 0 && min_x <= max_x {
                    r.emit_scanline(y >> FIXED_SHIFT, &mut min_x, &mut max_x, clip_box, filler);
                }

                if rewind && !r.ael.is_empty() {
                    continue;
                }
                old_y = new_y;
                break;
            }
        }

        if r.events[i].is_swap() {
            event_do_swap(r, i)?;
        } else {
            let start_event = r.events[i];
            let start_pos = start_event.den;
            let start_index = i;

            // remove every edge ending at this position
            loop {
                let ev = r.events[i];
                if !ev.is_swap() {
                    if ev.edge0 >= 0
                        && edge_up_going(&r.gel[ev.edge0 as usize], ev.den, &r.vertices)
                    {
                        edge_remove(r, ev.edge0 as u32, i)?;
                    }
                    if ev.edge1 >= 0
                        && edge_up_going(&r.gel[ev.edge1 as usize], ev.den, &r.vertices)
                    {
                        edge_remove(r, ev.edge1 as u32, i)?;
                    }
                }
                i += 1;
                if !(i < r.events.len()
                    && !r.events[i].is_swap()
                    && r.events[i].den == start_pos)
                {
                    break;
                }
            }
            let k = i;

            // swaps that land exactly on this grid vertex
            while i < r.events.len()
                && r.events[i].is_swap()
                && events_cmp(&r.intersection_nums, &start_event, &r.events[i]) == 0
            {
                event_do_swap(r, i)?;
                i += 1;
            }
            let end_index = i;

            // now insert every edge starting at this position
            for idx in start_index..k {
                let ev = r.events[idx];
                if ev.is_swap() {
                    continue;
                }
                for edge in [ev.edge0, ev.edge1] {
                    if edge >= 0 && edge_down_going(&r.gel[edge as usize], ev.den, &r.vertices) {
                        let j = edge_insert(r, edge as u32)?;
                        if j >= 1 {
                            let (left, right) = (r.ael[j - 1], r.ael[j]);
                            edges_intersect(r, left, right, idx)?;
                        }
                        if j + 1 < r.ael.len() {
                            let (left, right) = (r.ael[j], r.ael[j + 1]);
                            edges_intersect(r, left, right, idx)?;
                        }
                    }
                }
            }
            i = end_index - 1;
        }
        i += 1;
    }

    if min_x <= max_x {
        r.emit_scanline(
            (old_y as i32) >> FIXED_SHIFT,
            &mut min_x,
            &mut max_x,
            clip_box,
            filler,
        );
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
