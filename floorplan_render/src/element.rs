// Copyright 2025 the Floorplan Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render-side description of a scene element.

use std::fmt;
use std::sync::Arc;

use floorplan_index::{BoundingBox, ElementKind};
use kurbo::Rect;

/// Host-assigned identifier of a scene element.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Packed `0xRRGGBBAA` colour.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Rgba(pub u32);

impl Rgba {
    /// Opaque black.
    pub const BLACK: Self = Self(0x0000_00ff);
    /// Opaque white.
    pub const WHITE: Self = Self(0xffff_ffff);
    /// Dark grey used for labels.
    pub const INK: Self = Self(0x1f29_37ff);
    /// Fully transparent.
    pub const TRANSPARENT: Self = Self(0);

    /// Build from 8-bit channels.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self(((r as u32) << 24) | ((g as u32) << 16) | ((b as u32) << 8) | a as u32)
    }

    /// Opaque colour from a `0xRRGGBB` literal.
    pub const fn rgb(hex: u32) -> Self {
        Self((hex << 8) | 0xff)
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08x}", self.0)
    }
}

/// Booking state of a stall.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StallStatus {
    /// Free to book.
    #[default]
    Available,
    /// Held for a pending booking.
    Reserved,
    /// Booked and paid.
    Booked,
    /// Not bookable.
    Blocked,
}

impl StallStatus {
    /// Colour of the status marker dot.
    pub const fn marker_color(self) -> Rgba {
        match self {
            Self::Available => Rgba::rgb(0x0022_c55e),
            Self::Reserved => Rgba::rgb(0x00f5_9e0b),
            Self::Booked => Rgba::rgb(0x00ef_4444),
            Self::Blocked => Rgba::rgb(0x006b_7280),
        }
    }

    /// Whole-element opacity.
    pub const fn opacity(self) -> f64 {
        match self {
            Self::Blocked => 0.5,
            _ => 1.0,
        }
    }
}

/// Everything the renderer needs to draw one element, in world coordinates.
///
/// Strings are shared so cloning an element into a batch group is cheap.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderElement {
    /// Host id.
    pub id: ElementId,
    /// Scene role.
    pub kind: ElementKind,
    /// World-space rectangle.
    pub rect: Rect,
    /// Fill colour.
    pub fill: Rgba,
    /// Outline colour.
    pub stroke: Rgba,
    /// Booking status.
    pub status: StallStatus,
    /// Stall type; `None` is the default type and gets no indicator.
    pub category: Option<Arc<str>>,
    /// Identifying label (stall number, hall name).
    pub label: Arc<str>,
    /// Secondary value such as a price.
    pub value_label: Option<Arc<str>>,
    /// Draw order supplied by the host. Higher is drawn later.
    pub z_index: i32,
}

impl RenderElement {
    /// A default-styled element.
    pub fn new(id: ElementId, kind: ElementKind, rect: Rect) -> Self {
        Self {
            id,
            kind,
            rect,
            fill: Rgba::WHITE,
            stroke: Rgba::BLACK,
            status: StallStatus::Available,
            category: None,
            label: Arc::from(""),
            value_label: None,
            z_index: 0,
        }
    }

    /// The rectangle as an index box, corners normalized.
    pub fn bbox(&self) -> BoundingBox {
        let r = self.rect.abs();
        BoundingBox::new(r.x0, r.y0, r.x1, r.y1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use floorplan_index::SpatialIndex;

    #[test]
    fn bbox_normalizes_inverted_rects() {
        let e = RenderElement::new(
            ElementId(1),
            ElementKind::Stall,
            Rect::new(60.0, 40.0, 10.0, 0.0),
        );
        assert_eq!(e.bbox(), BoundingBox::new(10.0, 0.0, 60.0, 40.0));

        let mut index = SpatialIndex::new();
        index.insert(e.id, e.kind, e.bbox(), e.clone());
        assert_eq!(index.query_point(30.0, 20.0).count(), 1);
    }
}
