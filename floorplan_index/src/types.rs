// Copyright 2025 the Floorplan Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Primitive geometry types and the entries stored in the index.

/// Axis-aligned bounding box in scene units.
///
/// Callers are expected to keep `min_x <= max_x` and `min_y <= max_y`.
/// An inverted box is treated as empty: it never intersects anything.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundingBox {
    /// Minimum x (left)
    pub min_x: f64,
    /// Minimum y (top)
    pub min_y: f64,
    /// Maximum x (right)
    pub max_x: f64,
    /// Maximum y (bottom)
    pub max_y: f64,
}

impl BoundingBox {
    /// The box covering nothing. Union with it is the identity.
    pub const EMPTY: Self = Self {
        min_x: f64::INFINITY,
        min_y: f64::INFINITY,
        max_x: f64::NEG_INFINITY,
        max_y: f64::NEG_INFINITY,
    };

    /// Create a new box from min/max corners.
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Create a box from an origin and a size.
    pub const fn from_xywh(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x + w,
            max_y: y + h,
        }
    }

    /// Width of the box, clamped at zero.
    #[inline]
    pub fn width(&self) -> f64 {
        (self.max_x - self.min_x).max(0.0)
    }

    /// Height of the box, clamped at zero.
    #[inline]
    pub fn height(&self) -> f64 {
        (self.max_y - self.min_y).max(0.0)
    }

    /// Area of the box; zero for empty or inverted boxes.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Center point `(x, y)`.
    #[inline]
    pub fn center(&self) -> (f64, f64) {
        (
            0.5 * (self.min_x + self.max_x),
            0.5 * (self.min_y + self.max_y),
        )
    }

    /// True if the box is inverted on either axis. Assumes no NaN.
    pub fn is_empty(&self) -> bool {
        self.max_x < self.min_x || self.max_y < self.min_y
    }

    /// Whether two boxes overlap. Touching edges count as overlap.
    pub fn intersects(&self, other: &Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Whether this box contains the point (edges inclusive).
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        self.min_x <= x && x <= self.max_x && self.min_y <= y && y <= self.max_y
    }

    /// Smallest box covering both boxes.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Area that would be added to `self` to also cover `other`.
    pub fn enlargement(&self, other: &Self) -> f64 {
        self.union(other).area() - self.area()
    }

    /// Grow the box by `pad` on every side.
    pub fn padded(&self, pad: f64) -> Self {
        Self {
            min_x: self.min_x - pad,
            min_y: self.min_y - pad,
            max_x: self.max_x + pad,
            max_y: self.max_y + pad,
        }
    }
}

/// The kind of scene element an entry describes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    /// The exhibition space enclosing every hall.
    Space,
    /// A hall inside the space.
    Hall,
    /// A bookable stall inside a hall.
    Stall,
    /// A free-standing fixture (pillar, door, stage).
    Fixture,
}

/// The visible part of the scene, in scene units, plus the current zoom.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Visible width.
    pub width: f64,
    /// Visible height.
    pub height: f64,
    /// Screen pixels per scene unit.
    pub scale: f64,
}

impl Viewport {
    /// Fraction of the larger viewport side added on every edge by viewport queries.
    pub const PADDING_RATIO: f64 = 0.1;

    /// Create a viewport.
    pub const fn new(x: f64, y: f64, width: f64, height: f64, scale: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            scale,
        }
    }

    /// The exact visible box.
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::from_xywh(self.x, self.y, self.width, self.height)
    }

    /// The visible box grown by [`Self::PADDING_RATIO`] of `max(width, height)`.
    pub fn padded_bbox(&self) -> BoundingBox {
        let pad = self.width.max(self.height) * Self::PADDING_RATIO;
        self.bbox().padded(pad)
    }
}

/// A payload-bearing entry stored in a leaf.
#[derive(Clone, Debug)]
pub struct Item<K, P> {
    /// Caller-defined identifier; unique within an index.
    pub id: K,
    /// Element kind, used by [`SpatialIndex::query_by_type`](crate::SpatialIndex::query_by_type).
    pub kind: ElementKind,
    /// World-space bounds.
    pub bbox: BoundingBox,
    /// Opaque caller data.
    pub payload: P,
}
