//! End-to-end pipeline tests: path -> flatten -> (stroke) -> rasterize.

use scanvec::basics::{AaQuality, FillRule, RectI};
use scanvec::curves::{Bezier3, FlattenParams};
use scanvec::rasterizer::coverage_spans;
use scanvec::stroke::StrokeStyle;
use scanvec::{Engine, Path, PointD, TransAffine};

/// Draw a fill and collect `(y, x0, x1, alpha)` spans.
fn fill_spans(
    path: &mut Path,
    quality: AaQuality,
    rule: FillRule,
    clip: RectI,
) -> Vec<(i32, i32, i32, u8)> {
    let mut engine = Engine::new();
    let mut spans = Vec::new();
    engine
        .draw_fill(
            path,
            &TransAffine::new(),
            quality,
            rule,
            &clip,
            &mut |y: i32, x0: i32, x1: i32, deltas: &mut [i32]| {
                coverage_spans(deltas, x0, x1, |sx0, sx1, a| spans.push((y, sx0, sx1, a)));
            },
        )
        .unwrap();
    spans
}

fn alpha_total(spans: &[(i32, i32, i32, u8)]) -> i64 {
    spans
        .iter()
        .map(|(_, x0, x1, a)| (*x1 - *x0) as i64 * *a as i64)
        .sum()
}

#[test]
fn rectangle_coverage_equals_area() {
    let mut path = Path::new();
    path.move_to(0.0, 0.0)
        .line_to(20.0, 0.0)
        .line_to(20.0, 8.0)
        .line_to(0.0, 8.0)
        .close();
    let spans = fill_spans(
        &mut path,
        AaQuality::Better,
        FillRule::NonZero,
        RectI::new(0, 0, 64, 64),
    );
    assert_eq!(alpha_total(&spans), 20 * 8 * 255);
    // nothing escapes the rectangle
    for (y, x0, x1, _) in &spans {
        assert!((0..8).contains(y));
        assert!(*x0 >= 0 && *x1 <= 20);
    }
}

#[test]
fn disjoint_triangles_produce_disjoint_runs() {
    let mut path = Path::new();
    // two triangles separated by a gap in x
    path.move_to(0.0, 0.0)
        .line_to(10.0, 0.0)
        .line_to(0.0, 10.0)
        .close();
    path.move_to(30.0, 0.0)
        .line_to(40.0, 0.0)
        .line_to(30.0, 10.0)
        .close();

    let spans = fill_spans(
        &mut path,
        AaQuality::Better,
        FillRule::NonZero,
        RectI::new(0, 0, 64, 64),
    );

    // every span lies entirely in one triangle's x-range, never bridging
    for (_, x0, x1, a) in &spans {
        if *a > 0 {
            assert!(
                *x1 <= 12 || *x0 >= 28,
                "span [{x0}, {x1}) bridges the gap"
            );
        }
    }
    // both triangles produced coverage
    assert!(spans.iter().any(|s| s.1 < 12 && s.3 > 0));
    assert!(spans.iter().any(|s| s.2 > 28 && s.3 > 0));
    // each triangle covers half its 10x10 bounding square
    let total = alpha_total(&spans);
    let expected = 2 * 50 * 255;
    let err = (total - expected).abs();
    assert!(err < expected / 20, "total {total} vs {expected}");
}

#[test]
fn even_odd_cancels_double_coverage() {
    // two overlapping triangles drawn as one path; under even-odd the
    // doubly covered lens region must stay empty
    let mut path = Path::new();
    path.move_to(0.0, 0.0)
        .line_to(16.0, 0.0)
        .line_to(8.0, 16.0)
        .close();
    path.move_to(8.0, 0.0)
        .line_to(24.0, 0.0)
        .line_to(16.0, 16.0)
        .close();

    let eo = fill_spans(
        &mut path,
        AaQuality::Better,
        FillRule::EvenOdd,
        RectI::new(0, 0, 64, 64),
    );
    let mut path2 = Path::new();
    path2
        .move_to(0.0, 0.0)
        .line_to(16.0, 0.0)
        .line_to(8.0, 16.0)
        .close();
    path2
        .move_to(8.0, 0.0)
        .line_to(24.0, 0.0)
        .line_to(16.0, 16.0)
        .close();
    let nz = fill_spans(
        &mut path2,
        AaQuality::Better,
        FillRule::NonZero,
        RectI::new(0, 0, 64, 64),
    );

    // the even-odd total is the nonzero (union) total minus the overlap
    // counted once more: strictly smaller
    assert!(alpha_total(&eo) < alpha_total(&nz));

    // probe the heart of the overlap region: row 2, around x = 12
    let overlap_hit = eo
        .iter()
        .any(|(y, x0, x1, a)| *y == 2 && *a == 255 && *x0 <= 11 && *x1 >= 13);
    assert!(!overlap_hit, "even-odd left coverage inside the overlap");
    let union_hit = nz
        .iter()
        .any(|(y, x0, x1, a)| *y == 2 && *a == 255 && *x0 <= 11 && *x1 >= 13);
    assert!(union_hit, "nonzero lost the overlap region");
}

#[test]
fn cubic_fill_end_to_end() {
    // the canonical S-cubic: (0,0) -> (100,100) with controls (0,100) and
    // (100,0), flattened at accuracy 1e-4 and filled
    let accuracy = 1e-4;
    let curve = Bezier3::new(
        PointD::new(0.0, 0.0),
        PointD::new(0.0, 100.0),
        PointD::new(100.0, 0.0),
        PointD::new(100.0, 100.0),
    );
    let params = FlattenParams::from_deviation(accuracy);

    let mut first = Vec::new();
    curve.flatten(&mut first, &params, true);
    let mut second = Vec::new();
    curve.flatten(&mut second, &params, true);

    // deterministic point count for a given accuracy
    assert_eq!(first, second);
    let n = first.len();
    assert!(n > 16, "suspiciously coarse flattening: {n} points");
    assert!(n < 4096, "runaway flattening: {n} points");

    // bounding box pinned to the control box
    let (mut min_x, mut min_y, mut max_x, mut max_y) =
        (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
    for p in &first {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    assert!(min_x >= -1e-9 && min_y >= -1e-9);
    assert!(max_x <= 100.0 + 1e-9 && max_y <= 100.0 + 1e-9);
    assert!((max_x - 100.0).abs() < 1e-9 && (max_y - 100.0).abs() < 1e-9);

    // fill the closed curve region; the S-curve region covers exactly half
    // of the 100x100 square by symmetry
    let mut path = Path::new();
    path.move_to(0.0, 0.0)
        .cubic_to(0.0, 100.0, 100.0, 0.0, 100.0, 100.0);
    path.line_to(100.0, 0.0).close();

    let spans = fill_spans(
        &mut path,
        AaQuality::Better,
        FillRule::NonZero,
        RectI::new(0, 0, 128, 128),
    );
    let total = alpha_total(&spans);
    let expected = 100 * 100 * 255 / 2;
    let err = (total - expected).abs();
    assert!(err < expected / 50, "total {total} vs {expected}");
}

#[test]
fn stroke_pipeline_round_trip() {
    // a stroked diagonal rasterizes to roughly length x width of coverage
    let mut engine = Engine::new();
    let mut path = Path::new();
    path.move_to(10.0, 10.0).line_to(40.0, 40.0);
    let style = StrokeStyle::new(4.0);

    let mut total = 0i64;
    engine
        .draw_stroke(
            &mut path,
            &TransAffine::new(),
            AaQuality::Better,
            &style,
            &RectI::new(0, 0, 64, 64),
            &mut |_y: i32, x0: i32, x1: i32, deltas: &mut [i32]| {
                coverage_spans(deltas, x0, x1, |sx0, sx1, a| {
                    total += (sx1 - sx0) as i64 * a as i64;
                });
            },
        )
        .unwrap();

    let length = (2.0f64 * 30.0 * 30.0).sqrt();
    let expected = (length * 4.0 * 255.0) as i64;
    let err = (total - expected).abs();
    assert!(
        err < expected / 10,
        "stroke coverage {total} vs expected {expected}"
    );
}

#[test]
fn dashed_stroke_covers_less_than_solid() {
    let make = || {
        let mut p = Path::new();
        p.move_to(5.0, 20.0).line_to(55.0, 20.0);
        p
    };
    let run = |style: &StrokeStyle| {
        let mut engine = Engine::new();
        let mut path = make();
        let mut total = 0i64;
        engine
            .draw_stroke(
                &mut path,
                &TransAffine::new(),
                AaQuality::Better,
                style,
                &RectI::new(0, 0, 64, 64),
                &mut |_y: i32, x0: i32, x1: i32, deltas: &mut [i32]| {
                    coverage_spans(deltas, x0, x1, |sx0, sx1, a| {
                        total += (sx1 - sx0) as i64 * a as i64;
                    });
                },
            )
            .unwrap();
        total
    };

    let solid = run(&StrokeStyle::new(2.0));
    let mut dashed_style = StrokeStyle::new(2.0);
    dashed_style.set_dash(&[5.0, 5.0], 0.0);
    let dashed = run(&dashed_style);

    assert!(solid > 0);
    // half the length is gaps (plus cap effects)
    assert!(dashed < solid * 3 / 4);
    assert!(dashed > solid / 4);
}

#[test]
fn transforms_scale_rasterized_output() {
    let mut engine = Engine::new();
    let mut path = Path::new();
    path.move_to(0.0, 0.0)
        .line_to(10.0, 0.0)
        .line_to(10.0, 10.0)
        .line_to(0.0, 10.0)
        .close();

    let mut total = 0i64;
    engine
        .draw_fill(
            &mut path,
            &TransAffine::new_scaling(3.0, 2.0),
            AaQuality::Better,
            FillRule::NonZero,
            &RectI::new(0, 0, 64, 64),
            &mut |_y: i32, x0: i32, x1: i32, deltas: &mut [i32]| {
                coverage_spans(deltas, x0, x1, |sx0, sx1, a| {
                    total += (sx1 - sx0) as i64 * a as i64;
                });
            },
        )
        .unwrap();
    assert_eq!(total, 30 * 20 * 255);
}
