//! Benchmarks for the layout solver

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mf_core::Dimension;
use mf_layout::{
    AbsolutePositionLayoutSpec, AnchorOffset, AnchorPoint, HorizontalCoverageLayoutSpec, LayoutSpec,
    Offset,
};

const ANCHORS: [AnchorPoint; 5] = [
    AnchorPoint::TOP_LEFT,
    AnchorPoint::TOP_RIGHT,
    AnchorPoint::CENTER,
    AnchorPoint::BOTTOM_LEFT,
    AnchorPoint::BOTTOM_RIGHT,
];

fn elements(n: usize) -> Vec<(Dimension, LayoutSpec)> {
    (0..n)
        .map(|i| {
            let anchor = ANCHORS[i % ANCHORS.len()];
            let offset = AnchorOffset::aligned(anchor, Offset::new(-(i as i32), i as i32));
            let spec = if i % 3 == 0 {
                LayoutSpec::from(AbsolutePositionLayoutSpec { anchor_offset: offset })
            } else {
                LayoutSpec::from(HorizontalCoverageLayoutSpec {
                    horizontal_coverage: 0.1 + (i % 9) as f64 * 0.1,
                    anchor_offset: offset,
                })
            };
            (Dimension::new(320 + i as u32, 180 + i as u32), spec)
        })
        .collect()
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let canvas = Dimension::new(1920, 1080);

    for n in [1, 3, 16, 128] {
        let input = elements(n);
        group.bench_with_input(BenchmarkId::new("elements", n), &input, |b, input| {
            b.iter(|| mf_layout::layout(black_box(canvas), black_box(input)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_layout);
criterion_main!(benches);
