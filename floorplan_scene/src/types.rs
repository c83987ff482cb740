// Copyright 2025 the Floorplan Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the scene: flags, styles, local geometry and query results.

use std::sync::Arc;

use floorplan_index::ElementKind;
use floorplan_render::{ElementId, Rgba, StallStatus};
use kurbo::{Point, Rect};

bitflags::bitflags! {
    /// Per-element interaction flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// Element is drawn and appears in viewport queries.
        const VISIBLE   = 0b0000_0001;
        /// Element is returned by hit testing.
        const PICKABLE  = 0b0000_0010;
        /// Element can be moved with [`Scene::drag_to`](crate::Scene::drag_to).
        const DRAGGABLE = 0b0000_0100;
    }
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self::VISIBLE | Self::PICKABLE
    }
}

/// How an element looks, independent of where it is.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementStyle {
    /// Fill colour.
    pub fill: Rgba,
    /// Outline colour.
    pub stroke: Rgba,
    /// Booking status; only meaningful for stalls.
    pub status: StallStatus,
    /// Stall type.
    pub category: Option<Arc<str>>,
    /// Identifying label.
    pub label: Arc<str>,
    /// Secondary value such as a price.
    pub value_label: Option<Arc<str>>,
}

impl Default for ElementStyle {
    fn default() -> Self {
        Self {
            fill: Rgba::WHITE,
            stroke: Rgba::BLACK,
            status: StallStatus::Available,
            category: None,
            label: Arc::from(""),
            value_label: None,
        }
    }
}

/// Local data of a scene element.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalNode {
    /// Scene role.
    pub kind: ElementKind,
    /// Bounds relative to the parent's top-left corner (world space for roots).
    pub local_bounds: Rect,
    /// Draw order. Higher is on top.
    pub z_index: i32,
    /// Interaction flags.
    pub flags: NodeFlags,
    /// Appearance.
    pub style: ElementStyle,
}

impl LocalNode {
    /// A default-styled, visible, pickable node.
    pub fn new(kind: ElementKind, local_bounds: Rect) -> Self {
        Self {
            kind,
            local_bounds,
            z_index: 0,
            flags: NodeFlags::default(),
            style: ElementStyle::default(),
        }
    }

    /// Set the z-index.
    #[must_use]
    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    /// Set the flags.
    #[must_use]
    pub fn with_flags(mut self, flags: NodeFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the style.
    #[must_use]
    pub fn with_style(mut self, style: ElementStyle) -> Self {
        self.style = style;
        self
    }
}

/// Grid snapping applied by [`Scene::drag_to`](crate::Scene::drag_to).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SnapConfig {
    /// Grid pitch in scene units.
    pub grid: f64,
    /// Whether snapping is applied.
    pub enabled: bool,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            grid: 10.0,
            enabled: true,
        }
    }
}

impl SnapConfig {
    /// Round `p` to the nearest grid point, if enabled.
    pub fn apply(&self, p: Point) -> Point {
        if !self.enabled || self.grid <= 0.0 {
            return p;
        }
        Point::new(
            (p.x / self.grid).round() * self.grid,
            (p.y / self.grid).round() * self.grid,
        )
    }
}

/// World-space regions that need repainting.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Damage {
    /// Old and new boxes of changed elements.
    pub dirty_rects: Vec<Rect>,
}

impl Damage {
    /// Union of every dirty rectangle.
    pub fn union_rect(&self) -> Option<Rect> {
        self.dirty_rects.iter().copied().reduce(|a, b| a.union(b))
    }

    /// True if nothing needs repainting.
    pub fn is_empty(&self) -> bool {
        self.dirty_rects.is_empty()
    }

    pub(crate) fn push(&mut self, r: Rect) {
        if r.width() > 0.0 && r.height() > 0.0 {
            self.dirty_rects.push(r);
        }
    }
}

/// Result of [`Scene::drag_to`](crate::Scene::drag_to).
#[derive(Clone, Debug, PartialEq)]
pub struct DragOutcome {
    /// Local origin the element ended up at, after snapping and clamping.
    pub origin: Point,
    /// Regions to repaint.
    pub damage: Damage,
}

/// Result of [`Scene::hit_test_point`](crate::Scene::hit_test_point).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hit {
    /// The topmost element under the point.
    pub id: ElementId,
    /// Ids from the root down to `id`, inclusive.
    pub path: Vec<ElementId>,
}

/// Failed scene edits.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    /// An element with this id already exists.
    #[error("element {0} already exists")]
    DuplicateId(ElementId),
    /// No element has this id.
    #[error("element {0} does not exist")]
    UnknownId(ElementId),
    /// The requested parent does not exist.
    #[error("parent {0} does not exist")]
    UnknownParent(ElementId),
    /// The element lacks [`NodeFlags::DRAGGABLE`].
    #[error("element {0} is not draggable")]
    NotDraggable(ElementId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapping_rounds_to_grid() {
        let snap = SnapConfig::default();
        assert_eq!(snap.apply(Point::new(14.0, 26.0)), Point::new(10.0, 30.0));
        let off = SnapConfig {
            enabled: false,
            ..snap
        };
        assert_eq!(off.apply(Point::new(14.0, 26.0)), Point::new(14.0, 26.0));
    }

    #[test]
    fn damage_skips_empty_rects() {
        let mut d = Damage::default();
        d.push(Rect::ZERO);
        assert!(d.is_empty());
        d.push(Rect::new(0.0, 0.0, 5.0, 5.0));
        d.push(Rect::new(10.0, 0.0, 15.0, 5.0));
        assert_eq!(d.union_rect(), Some(Rect::new(0.0, 0.0, 15.0, 5.0)));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn snap_config_loads_from_json() {
        let snap: SnapConfig = serde_json::from_str(r#"{"grid":25.0,"enabled":true}"#).unwrap();
        assert_eq!(snap.apply(Point::new(30.0, 40.0)), Point::new(25.0, 50.0));
    }

    #[test]
    fn errors_name_the_element() {
        assert_eq!(
            SceneError::NotDraggable(ElementId(7)).to_string(),
            "element #7 is not draggable"
        );
    }
}
