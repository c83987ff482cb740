// Copyright 2025 the Floorplan Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Floorplan Render: keeps a floor plan with thousands of stalls interactive.
//!
//! This crate decides *what* to draw and *how much* of it, and emits the result through a
//! [`DrawContext`] that the host implements on its canvas. It never paints pixels itself.
//!
//! - [`LevelOfDetailManager`]: maps render scale and element size to a [`LodLevel`] and a
//!   [`RenderAttributes`] record, dropping one level while frames run over budget.
//! - [`BatchRenderer`]: groups same-style elements and draws each group with one path per
//!   pass, producing the same primitives as drawing them one by one.
//! - [`ObjectPool`] and [`PoolManager`]: reuse of transient render objects, with
//!   cooperative idle cleanup.
//! - [`PerformanceController`]: picks an [`OptimizationProfile`] from the element count and
//!   runs frames through the pieces above.
//!
//! ## Frame flow
//!
//! 1. The host keeps a [`SpatialIndex`](floorplan_index::SpatialIndex) of
//!    [`RenderElement`]s and reports the element count with
//!    [`PerformanceController::update_count`].
//! 2. [`PerformanceController::render_frame`] queries the padded viewport, levels every
//!    visible element, and either batches or draws element by element.
//! 3. The frame's duration feeds back into the LOD manager for the next frame. There is no
//!    mid-frame abort.
//!
//! Everything runs on the thread that owns the scene; nothing here locks.
//!
//! ## Example
//!
//! ```
//! use floorplan_index::{ElementKind, SpatialIndex, Viewport};
//! use floorplan_render::{DisplayList, ElementId, PerformanceController, RenderElement};
//! use kurbo::Rect;
//!
//! let mut index = SpatialIndex::new();
//! for i in 0..150_u32 {
//!     let x = f64::from(i % 15) * 60.0;
//!     let y = f64::from(i / 15) * 60.0;
//!     let stall = RenderElement::new(
//!         ElementId(u64::from(i)),
//!         ElementKind::Stall,
//!         Rect::new(x, y, x + 50.0, y + 50.0),
//!     );
//!     index.insert(stall.id, stall.kind, stall.bbox(), stall);
//! }
//!
//! let mut controller = PerformanceController::default();
//! controller.initialize(index.len());
//!
//! let mut list = DisplayList::new();
//! let stats = controller.render_frame(&index, &mut list, &Viewport::new(0.0, 0.0, 900.0, 600.0, 1.0));
//! assert!(stats.batched);
//! assert_eq!(stats.rendered, 150);
//! ```

pub mod batch;
pub mod controller;
pub mod draw;
pub mod element;
pub mod lod;
pub mod pool;

pub use batch::{BatchGroup, BatchRenderResult, BatchRenderer, GroupKey};
pub use controller::{
    ControllerConfig, FrameStats, OptimizationProfile, PerformanceController, PerformanceReport,
};
pub use draw::{DisplayList, DrawCommand, DrawContext, Primitive, Shape, TextAlign};
pub use element::{ElementId, RenderElement, Rgba, StallStatus};
pub use lod::{
    Features, LevelOfDetailManager, LodBatch, LodConfig, LodLevel, LodThresholds,
    RenderAttributes, ThresholdOrderError,
};
pub use pool::{
    GlobalPoolStats, HALL_VISUALS, HallVisual, ObjectPool, PoolConfig, PoolManager, PoolStats,
    Pooled, STALL_VISUALS, StallVisual, TEXTURE_BUFFERS, TextureBuffer,
};
