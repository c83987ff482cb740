// Copyright 2025 the Floorplan Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::Arc;

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use floorplan_index::{ElementKind, SpatialIndex, Viewport};
use floorplan_render::{
    ControllerConfig, DisplayList, ElementId, PerformanceController, RenderElement, Rgba,
    StallStatus,
};
use kurbo::Rect;

const CATEGORIES: [&str; 3] = ["corner", "inline", "island"];

/// A square hall of `n * n` stalls with a handful of styles.
fn gen_hall(n: u64) -> SpatialIndex<ElementId, RenderElement> {
    let mut idx = SpatialIndex::new();
    for i in 0..n * n {
        let x = (i % n) as f64 * 45.0;
        let y = (i / n) as f64 * 60.0;
        let rect = Rect::new(x, y, x + 40.0, y + 30.0);
        let mut stall = RenderElement::new(ElementId(i), ElementKind::Stall, rect);
        stall.fill = if i % 4 == 0 { Rgba::rgb(0xdbeafe) } else { Rgba::WHITE };
        stall.status = if i % 7 == 0 { StallStatus::Booked } else { StallStatus::Available };
        stall.category = Some(Arc::from(CATEGORIES[(i % 3) as usize]));
        stall.label = Arc::from(format!("S{i}"));
        idx.insert(stall.id, stall.kind, stall.bbox(), stall);
    }
    idx
}

/// A controller pinned to `Balanced` (batching) or `Minimal` (element by element).
fn controller(batching: bool, count: usize) -> PerformanceController {
    let mut c = PerformanceController::new(ControllerConfig {
        batching_min: if batching { 0 } else { usize::MAX },
        pooling_min: usize::MAX,
        extreme_min: usize::MAX,
        ..ControllerConfig::default()
    });
    c.initialize(count);
    c
}

fn bench_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");
    for &n in &[40_u64, 100] {
        let idx = gen_hall(n);
        let count = idx.len();
        group.throughput(Throughput::Elements(count as u64));
        for &scale in &[0.4, 1.0] {
            let vp = Viewport::new(0.0, 0.0, 1600.0 / scale, 900.0 / scale, scale);
            group.bench_function(format!("batched_n{count}_s{scale}"), |b| {
                let mut ctl = controller(true, count);
                b.iter(|| {
                    let mut list = DisplayList::new();
                    black_box(ctl.render_frame(&idx, &mut list, &vp));
                    black_box(list.len())
                });
            });
            group.bench_function(format!("individual_n{count}_s{scale}"), |b| {
                let mut ctl = controller(false, count);
                b.iter(|| {
                    let mut list = DisplayList::new();
                    black_box(ctl.render_frame(&idx, &mut list, &vp));
                    black_box(list.len())
                });
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_frames);
criterion_main!(benches);
