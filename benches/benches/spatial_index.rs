// Copyright 2025 the Floorplan Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use floorplan_index::{BoundingBox, ElementKind, SpatialIndex, Viewport};

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
}

/// Stalls laid out in rows, as in a real hall: `n * n` boxes of 40×30 with aisles.
fn gen_stall_rows(n: usize) -> Vec<BoundingBox> {
    let mut out = Vec::with_capacity(n * n);
    for row in 0..n {
        for col in 0..n {
            let x0 = col as f64 * 45.0;
            let y0 = row as f64 * 60.0;
            out.push(BoundingBox::from_xywh(x0, y0, 40.0, 30.0));
        }
    }
    out
}

fn gen_random_stalls(count: usize, extent: f64) -> Vec<BoundingBox> {
    let mut rng = Rng::new(0xCAFE_F00D_DEAD_BEEF);
    (0..count)
        .map(|_| {
            let w = 20.0 + rng.next_f64() * 60.0;
            let h = 20.0 + rng.next_f64() * 40.0;
            BoundingBox::from_xywh(rng.next_f64() * extent, rng.next_f64() * extent, w, h)
        })
        .collect()
}

fn build(rects: &[BoundingBox]) -> SpatialIndex<u32, ()> {
    let mut idx = SpatialIndex::new();
    for (i, r) in rects.iter().copied().enumerate() {
        idx.insert(i as u32, ElementKind::Stall, r, ());
    }
    idx
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    for &n in &[32usize, 64, 128] {
        let rects = gen_stall_rows(n);
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_function(format!("rows_n{n}"), |b| {
            b.iter_batched(|| (), |()| black_box(build(&rects)), BatchSize::SmallInput);
        });
    }
    let rects = gen_random_stalls(10_000, 5000.0);
    group.throughput(Throughput::Elements(rects.len() as u64));
    group.bench_function("random_10k", |b| {
        b.iter_batched(|| (), |()| black_box(build(&rects)), BatchSize::SmallInput);
    });
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    let idx = build(&gen_random_stalls(10_000, 5000.0));
    group.bench_function("viewport_random_10k", |b| {
        let mut rng = Rng::new(0x1234_5678_9ABC_DEF0);
        b.iter(|| {
            let (x, y) = (rng.next_f64() * 4000.0, rng.next_f64() * 4000.0);
            let vp = Viewport::new(x, y, 1280.0, 720.0, 1.0);
            black_box(idx.query_viewport(&vp).count())
        });
    });
    group.bench_function("point_random_10k", |b| {
        let mut rng = Rng::new(0x0F0F_F0F0_1111_2222);
        b.iter(|| {
            let hits = idx.query_point(rng.next_f64() * 5000.0, rng.next_f64() * 5000.0);
            black_box(hits.count())
        });
    });
    group.finish();
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");
    let rects = gen_stall_rows(64);
    group.bench_function("drag_one_of_4096", |b| {
        b.iter_batched(
            || build(&rects),
            |mut idx| {
                for step in 0..100_u32 {
                    let x = f64::from(step) * 3.0;
                    idx.update(&0, BoundingBox::from_xywh(x, x, 40.0, 30.0), ());
                }
                black_box(idx.len())
            },
            BatchSize::LargeInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_insert, bench_query, bench_update);
criterion_main!(benches);
