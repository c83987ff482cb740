// Copyright 2025 the Floorplan Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Drag a stall around its hall with grid snapping and watch the damage.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p floorplan_demos --example stall_drag`

use floorplan_index::ElementKind;
use floorplan_render::ElementId;
use floorplan_scene::{LocalNode, NodeFlags, Scene, SceneError};
use kurbo::{Point, Rect};

fn main() -> Result<(), SceneError> {
    env_logger::init();

    let mut scene = Scene::new();
    let hall = ElementId(1);
    let stall = ElementId(2);
    let pillar = ElementId(3);
    let hall_node = LocalNode::new(ElementKind::Hall, Rect::new(0.0, 0.0, 300.0, 200.0));
    scene.insert(hall, None, hall_node)?;
    scene.insert(
        stall,
        Some(hall),
        LocalNode::new(ElementKind::Stall, Rect::new(10.0, 10.0, 50.0, 40.0))
            .with_z_index(1)
            .with_flags(NodeFlags::default() | NodeFlags::DRAGGABLE),
    )?;
    scene.insert(
        pillar,
        Some(hall),
        LocalNode::new(ElementKind::Fixture, Rect::new(140.0, 90.0, 160.0, 110.0)).with_z_index(2),
    )?;

    // Pointer positions as the user drags; the last one overshoots the hall.
    for pointer in [(23.0, 14.0), (87.0, 61.0), (148.0, 96.0), (420.0, 260.0)] {
        let outcome = scene.drag_to(stall, Point::new(pointer.0, pointer.1))?;
        println!(
            "pointer={pointer:?} -> origin={:?} damage={:?}",
            outcome.origin,
            outcome.damage.union_rect()
        );
    }

    for probe in [Point::new(150.0, 100.0), Point::new(280.0, 180.0), Point::new(5.0, 5.0)] {
        let hit = scene.hit_test_point(probe);
        println!("hit {probe:?} -> {:?}", hit.map(|h| h.path));
    }

    if let Err(err) = scene.drag_to(pillar, Point::ZERO) {
        println!("{err}");
    }
    Ok(())
}
