//! Criterion benchmarks for the three pipeline stages.

use criterion::{criterion_group, criterion_main, Criterion};

use scanvec::basics::{AaQuality, FillRule, RectI};
use scanvec::curves::{Bezier3, FlattenParams};
use scanvec::stroke::StrokeStyle;
use scanvec::{Engine, Path, PointD, TransAffine};

fn curve_path() -> Path {
    let mut path = Path::new();
    path.move_to(10.0, 10.0);
    path.cubic_to(10.0, 500.0, 500.0, 10.0, 500.0, 500.0);
    path.cubic_to(500.0, 900.0, 900.0, 500.0, 900.0, 900.0);
    path.line_to(10.0, 900.0);
    path.close();
    path
}

fn bench_flatten(c: &mut Criterion) {
    let curve = Bezier3::new(
        PointD::new(0.0, 0.0),
        PointD::new(0.0, 500.0),
        PointD::new(500.0, 0.0),
        PointD::new(500.0, 500.0),
    );
    let params = FlattenParams::from_deviation(1e-3);
    c.bench_function("flatten_cubic", |b| {
        let mut pts = Vec::with_capacity(1024);
        b.iter(|| {
            pts.clear();
            curve.flatten(&mut pts, &params, true);
            pts.len()
        })
    });
}

fn bench_fill(c: &mut Criterion) {
    let clip = RectI::new(0, 0, 1024, 1024);
    c.bench_function("fill_curved_path", |b| {
        let mut engine = Engine::new();
        let mut path = curve_path();
        b.iter(|| {
            let mut covered = 0i64;
            engine
                .draw_fill(
                    &mut path,
                    &TransAffine::new(),
                    AaQuality::Better,
                    FillRule::NonZero,
                    &clip,
                    &mut |_y: i32, x0: i32, x1: i32, deltas: &mut [i32]| {
                        for x in x0..=x1 + 1 {
                            covered += deltas[x as usize] as i64;
                            deltas[x as usize] = 0;
                        }
                    },
                )
                .unwrap();
            covered
        })
    });
}

fn bench_stroke(c: &mut Criterion) {
    let clip = RectI::new(0, 0, 1024, 1024);
    let mut style = StrokeStyle::new(8.0);
    style.set_dash(&[24.0, 12.0], 0.0);
    c.bench_function("stroke_dashed_path", |b| {
        let mut engine = Engine::new();
        let mut path = curve_path();
        b.iter(|| {
            let mut covered = 0i64;
            engine
                .draw_stroke(
                    &mut path,
                    &TransAffine::new(),
                    AaQuality::Better,
                    &style,
                    &clip,
                    &mut |_y: i32, x0: i32, x1: i32, deltas: &mut [i32]| {
                        for x in x0..=x1 + 1 {
                            covered += deltas[x as usize] as i64;
                            deltas[x as usize] = 0;
                        }
                    },
                )
                .unwrap();
            covered
        })
    });
}

criterion_group!(benches, bench_flatten, bench_fill, bench_stroke);
criterion_main!(benches);
