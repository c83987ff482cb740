// Copyright 2025 the Floorplan Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Floorplan Index: a bounding-box tree over floor-plan elements.
//!
//! The index answers "what is under this point" and "what is inside this viewport"
//! for scenes with thousands of rectangles (exhibition spaces, halls, stalls and fixtures)
//! without scanning every element.
//!
//! - Insert, update and remove axis-aligned boxes addressed by a caller id, each carrying a payload.
//! - Query by range, point, padded viewport, or element kind.
//! - Removal and update look the item up through an id cache instead of walking the tree.
//!
//! The tree follows the classic R-tree insertion path: descend into the child whose box
//! needs the least area enlargement, append to the leaf, and split nodes that exceed
//! `max_entries` (default 16). Splits sort children by center along the longer axis of the
//! node's box and cut at the middle index. This is adequate for grid-like layouts; highly
//! irregular scenes may end up less balanced than with quadratic or R*-tree splits.
//!
//! Updates are a remove followed by a reinsert from the root, so a dragged element is
//! visible to the very next query.
//!
//! # Example
//!
//! ```rust
//! use floorplan_index::{BoundingBox, ElementKind, SpatialIndex};
//!
//! let mut idx: SpatialIndex<&str, u32> = SpatialIndex::new();
//! idx.insert("A", ElementKind::Stall, BoundingBox::from_xywh(0.0, 0.0, 10.0, 10.0), 1);
//! idx.insert("B", ElementKind::Stall, BoundingBox::from_xywh(100.0, 100.0, 10.0, 10.0), 2);
//! idx.insert("C", ElementKind::Stall, BoundingBox::from_xywh(5.0, 5.0, 10.0, 10.0), 3);
//!
//! let mut hits: Vec<_> = idx
//!     .query_range(BoundingBox::new(0.0, 0.0, 20.0, 20.0))
//!     .map(|it| it.id)
//!     .collect();
//! hits.sort();
//! assert_eq!(hits, ["A", "C"]);
//!
//! // Drag "B" next to the others.
//! idx.update(&"B", BoundingBox::from_xywh(12.0, 0.0, 10.0, 10.0), 2);
//! assert_eq!(idx.query_point(15.0, 5.0).count(), 2);
//! ```
//!
//! ### Float semantics
//!
//! Coordinates are assumed finite. Inverted boxes are treated as empty and are never
//! returned by range queries; sanitizing geometry is the caller's job.
//!
//! This crate is `no_std` and uses `alloc`. It does no internal locking: all mutation is
//! expected to come from the thread that owns the scene.

#![no_std]

extern crate alloc;

pub mod index;
mod node;
pub mod types;

pub use index::{DEFAULT_MAX_ENTRIES, IndexStats, SpatialIndex};
pub use types::{BoundingBox, ElementKind, Item, Viewport};

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn three_stalls_range_query() {
        let mut idx: SpatialIndex<&str, ()> = SpatialIndex::new();
        idx.insert("A", ElementKind::Stall, BoundingBox::from_xywh(0.0, 0.0, 10.0, 10.0), ());
        idx.insert("B", ElementKind::Stall, BoundingBox::from_xywh(100.0, 100.0, 10.0, 10.0), ());
        idx.insert("C", ElementKind::Stall, BoundingBox::from_xywh(5.0, 5.0, 10.0, 10.0), ());

        let mut hits: Vec<_> = idx
            .query_range(BoundingBox::new(0.0, 0.0, 20.0, 20.0))
            .map(|it| it.id)
            .collect();
        hits.sort_unstable();
        assert_eq!(hits, ["A", "C"]);
    }

    #[test]
    fn empty_index_queries_are_empty() {
        let idx: SpatialIndex<u32, ()> = SpatialIndex::new();
        assert_eq!(idx.query_point(0.0, 0.0).count(), 0);
        assert_eq!(idx.query_by_type(ElementKind::Stall).count(), 0);
        assert_eq!(idx.bounds(), None);
        assert_eq!(idx.stats().depth, 0);
    }

    #[test]
    fn degenerate_geometry_is_excluded() {
        let mut idx: SpatialIndex<u32, ()> = SpatialIndex::new();
        idx.insert(1, ElementKind::Stall, BoundingBox::from_xywh(10.0, 10.0, -5.0, 4.0), ());
        assert!(idx.contains(&1));
        assert_eq!(idx.query_range(BoundingBox::new(0.0, 0.0, 100.0, 100.0)).count(), 0);
    }
}
