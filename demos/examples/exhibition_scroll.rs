// Copyright 2025 the Floorplan Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scroll and zoom across a large exhibition and print what the renderer did.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p floorplan_demos --example exhibition_scroll`

use std::sync::Arc;

use floorplan_index::{ElementKind, Viewport};
use floorplan_render::{
    DisplayList, ElementId, LodThresholds, PerformanceController, Rgba, StallStatus,
};
use floorplan_scene::{ElementStyle, LocalNode, NodeFlags, Scene};
use kurbo::Rect;

const HALLS: u64 = 6;
const ROWS: u64 = 20;
const COLS: u64 = 30;
const STALL_W: f64 = 40.0;
const STALL_H: f64 = 30.0;

fn build() -> Scene {
    let mut scene = Scene::new();
    let mut next = 1_u64;
    let hall_w = COLS as f64 * (STALL_W + 10.0) + 20.0;
    let hall_h = ROWS as f64 * (STALL_H + 20.0) + 20.0;
    for h in 0..HALLS {
        let hall = ElementId(next);
        next += 1;
        let x0 = (h % 3) as f64 * (hall_w + 100.0);
        let y0 = (h / 3) as f64 * (hall_h + 100.0);
        let style = ElementStyle {
            fill: Rgba::rgb(0xf3f4f6),
            label: Arc::from(format!("Hall {}", h + 1)),
            ..ElementStyle::default()
        };
        scene
            .insert(
                hall,
                None,
                LocalNode::new(ElementKind::Hall, Rect::new(x0, y0, x0 + hall_w, y0 + hall_h))
                    .with_style(style),
            )
            .expect("hall ids are fresh");
        for i in 0..ROWS * COLS {
            let x = 10.0 + (i % COLS) as f64 * (STALL_W + 10.0);
            let y = 10.0 + (i / COLS) as f64 * (STALL_H + 20.0);
            let style = ElementStyle {
                status: match i % 9 {
                    0 => StallStatus::Booked,
                    1 => StallStatus::Reserved,
                    _ => StallStatus::Available,
                },
                category: Some(Arc::from(if i % COLS == 0 { "corner" } else { "inline" })),
                label: Arc::from(format!("{}-{}", h + 1, i + 1)),
                value_label: Some(Arc::from("$1200")),
                ..ElementStyle::default()
            };
            scene
                .insert(
                    ElementId(next),
                    Some(hall),
                    LocalNode::new(ElementKind::Stall, Rect::new(x, y, x + STALL_W, y + STALL_H))
                        .with_z_index(1)
                        .with_flags(NodeFlags::default() | NodeFlags::DRAGGABLE)
                        .with_style(style),
                )
                .expect("stall ids are fresh");
            next += 1;
        }
    }
    scene
}

fn main() {
    env_logger::init();

    let scene = build();
    let mut controller = PerformanceController::default();
    controller.initialize(scene.len());
    println!("{} elements -> {:?}", scene.len(), controller.profile());
    let ceiling = LodThresholds::default();

    for (x, y, scale) in [
        (0.0, 0.0, 6.0),
        (0.0, 0.0, 1.5),
        (400.0, 200.0, 1.0),
        (1200.0, 600.0, 0.5),
        (0.0, 0.0, 0.2),
        (0.0, 0.0, 0.05),
    ] {
        let scale = ceiling.clamp_scale(scale);
        let viewport = Viewport::new(x, y, 1280.0 / scale, 720.0 / scale, scale);
        let mut list = DisplayList::new();
        let stats = controller.render_frame(scene.index(), &mut list, &viewport);
        println!(
            "scale={scale:<4} visible={:>5} rendered={:>5} skipped={:>5} draw_calls={:>4} batched={}",
            stats.visible, stats.rendered, stats.skipped, stats.draw_calls, stats.batched
        );
    }

    let report = controller.report();
    println!("{report:#?}");
}
