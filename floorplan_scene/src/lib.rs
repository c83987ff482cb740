// Copyright 2025 the Floorplan Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Floorplan Scene: the editable floor plan behind the renderer.
//!
//! A [`Scene`] is a forest of elements: an exhibition space, the halls inside it, the stalls
//! inside each hall, and free-standing fixtures. Each element stores bounds relative to its
//! parent; the scene keeps world-space boxes for all of them and mirrors the visible ones
//! into a [`SpatialIndex`](floorplan_index::SpatialIndex) of
//! [`RenderElement`](floorplan_render::RenderElement)s that the render pipeline consumes as is.
//!
//! - [`Scene::insert`], [`Scene::remove`], [`Scene::set_local_bounds`] and the other setters
//!   update the index before returning and report [`Damage`].
//! - [`Scene::drag_to`] moves a draggable stall with grid snapping and clamps it inside its
//!   hall.
//! - [`Scene::hit_test_point`] returns the topmost pickable element under a point together
//!   with its path from the root.
//!
//! This crate does not lay anything out. Callers decide where halls and stalls go.
//!
//! ## Example
//!
//! ```
//! use floorplan_index::{ElementKind, Viewport};
//! use floorplan_render::ElementId;
//! use floorplan_scene::{LocalNode, NodeFlags, Scene};
//! use kurbo::{Point, Rect};
//!
//! let mut scene = Scene::new();
//! let hall = ElementId(1);
//! let stall = ElementId(2);
//! scene
//!     .insert(hall, None, LocalNode::new(ElementKind::Hall, Rect::new(0.0, 0.0, 400.0, 300.0)))
//!     .unwrap();
//! scene
//!     .insert(
//!         stall,
//!         Some(hall),
//!         LocalNode::new(ElementKind::Stall, Rect::new(20.0, 20.0, 80.0, 70.0))
//!             .with_z_index(1)
//!             .with_flags(NodeFlags::default() | NodeFlags::DRAGGABLE),
//!     )
//!     .unwrap();
//!
//! // Snapped to the 10-unit grid.
//! let moved = scene.drag_to(stall, Point::new(118.0, 42.0)).unwrap();
//! assert_eq!(moved.origin, Point::new(120.0, 40.0));
//!
//! let hit = scene.hit_test_point(Point::new(130.0, 50.0)).unwrap();
//! assert_eq!(hit.path, [hall, stall]);
//!
//! let viewport = Viewport::new(0.0, 0.0, 800.0, 600.0, 1.0);
//! assert_eq!(scene.visible(&viewport).count(), 2);
//! ```

mod scene;
mod types;

pub use scene::Scene;
pub use types::{
    Damage, DragOutcome, ElementStyle, Hit, LocalNode, NodeFlags, SceneError, SnapConfig,
};
