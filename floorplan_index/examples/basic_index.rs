// Copyright 2025 the Floorplan Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Minimal index usage: a row of stalls, a point query and a drag.

use floorplan_index::{BoundingBox, ElementKind, SpatialIndex, Viewport};

fn main() {
    let mut idx: SpatialIndex<u32, &str> = SpatialIndex::new();
    for i in 0..40_u32 {
        let x = f64::from(i) * 12.0;
        idx.insert(i, ElementKind::Stall, BoundingBox::from_xywh(x, 0.0, 10.0, 10.0), "stall");
    }
    let under: Vec<_> = idx.query_point(25.0, 5.0).map(|it| it.id).collect();
    println!("under (25, 5): {under:?}");

    idx.update(&2, BoundingBox::from_xywh(1000.0, 0.0, 10.0, 10.0), "stall");
    let vp = Viewport::new(0.0, 0.0, 100.0, 20.0, 1.0);
    println!("visible after drag: {}", idx.query_viewport(&vp).count());
    println!("{:?}", idx.stats());
}
