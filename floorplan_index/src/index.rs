// Copyright 2025 the Floorplan Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public [`SpatialIndex`] API over the node arena.

use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt::Debug;

use crate::node::{Arena, Children, Node, NodeIdx};
use crate::types::{BoundingBox, ElementKind, Item, Viewport};

/// Default leaf/inner fan-out before a node is split.
pub const DEFAULT_MAX_ENTRIES: usize = 16;

/// Shape summary of the tree, mostly useful for balance checks and reports.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Number of stored items.
    pub items: usize,
    /// Live nodes (leaf and inner).
    pub nodes: usize,
    /// Live leaf nodes.
    pub leaves: usize,
    /// Levels from the root to the leaves; `0` when there is no root.
    pub depth: usize,
}

/// A bounding-box tree over scene elements.
///
/// Items are addressed by a caller-supplied id `K` and carry an opaque payload `P`.
/// Every node's box is kept equal to the minimal box covering its children.
pub struct SpatialIndex<K, P> {
    max_entries: usize,
    root: Option<NodeIdx>,
    arena: Arena<K, P>,
    // id -> leaf holding it, so removal never walks the tree
    locations: BTreeMap<K, NodeIdx>,
}

#[derive(Copy, Clone)]
enum RootShape {
    Keep,
    EmptyInner,
    Promote(NodeIdx),
}

impl<K: Ord + Clone, P> Default for SpatialIndex<K, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, P> SpatialIndex<K, P> {
    /// Create an empty index with [`DEFAULT_MAX_ENTRIES`] fan-out.
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    /// Create an empty index with a custom fan-out (clamped to at least 2).
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(2),
            root: None,
            arena: Arena::default(),
            locations: BTreeMap::new(),
        }
    }

    /// Maximum children per node before a split.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// True if no items are stored.
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Whether an item with `id` is stored.
    pub fn contains(&self, id: &K) -> bool {
        self.locations.contains_key(id)
    }

    /// Look up an item by id.
    pub fn get(&self, id: &K) -> Option<&Item<K, P>> {
        let leaf = *self.locations.get(id)?;
        match &self.arena.get(leaf).children {
            Children::Leaf(items) => items.iter().find(|it| it.id == *id),
            Children::Inner(_) => None,
        }
    }

    /// Mutable access to an item's payload. Geometry changes must go through [`Self::update`].
    pub fn payload_mut(&mut self, id: &K) -> Option<&mut P> {
        let leaf = *self.locations.get(id)?;
        match &mut self.arena.get_mut(leaf).children {
            Children::Leaf(items) => items
                .iter_mut()
                .find(|it| it.id == *id)
                .map(|it| &mut it.payload),
            Children::Inner(_) => None,
        }
    }

    /// Box covering every stored item, if any.
    pub fn bounds(&self) -> Option<BoundingBox> {
        let root = self.root?;
        let bbox = self.arena.get(root).bbox;
        (!bbox.is_empty()).then_some(bbox)
    }

    /// Insert an item.
    ///
    /// Descends from the root choosing the child needing the least area enlargement
    /// (first child wins ties), appends to the reached leaf and splits overflowing
    /// nodes on the way back up. Inserting an id that is already present replaces
    /// the old entry.
    pub fn insert(&mut self, id: K, kind: ElementKind, bbox: BoundingBox, payload: P) {
        if self.contains(&id) {
            let _ = self.remove(&id);
        }
        let root = match self.root {
            Some(root) => root,
            None => {
                let root = self.arena.alloc(Node::leaf(None));
                self.root = Some(root);
                root
            }
        };

        let mut cur = root;
        while let Children::Inner(nodes) = &self.arena.get(cur).children {
            cur = self.choose_subtree(nodes, &bbox);
        }

        if let Children::Leaf(items) = &mut self.arena.get_mut(cur).children {
            items.push(Item {
                id: id.clone(),
                kind,
                bbox,
                payload,
            });
        }
        self.locations.insert(id, cur);
        self.adjust_upward(cur);
    }

    /// Move an item to `bbox` and replace its payload, keeping its kind.
    ///
    /// Implemented as [`Self::remove`] followed by [`Self::insert`] from the root.
    /// Returns `false` (and does nothing) if `id` is unknown.
    pub fn update(&mut self, id: &K, bbox: BoundingBox, payload: P) -> bool {
        let Some(kind) = self.get(id).map(|it| it.kind) else {
            return false;
        };
        let _ = self.remove(id);
        self.insert(id.clone(), kind, bbox, payload);
        true
    }

    /// Remove an item, returning its payload. Unknown ids are ignored.
    pub fn remove(&mut self, id: &K) -> Option<P> {
        let leaf = self.locations.remove(id)?;
        let removed = match &mut self.arena.get_mut(leaf).children {
            Children::Leaf(items) => {
                let pos = items.iter().position(|it| it.id == *id)?;
                items.remove(pos)
            }
            Children::Inner(_) => return None,
        };
        self.condense(leaf);
        Some(removed.payload)
    }

    /// Drop the whole tree and the id cache.
    pub fn clear(&mut self) {
        self.root = None;
        self.arena.clear();
        self.locations.clear();
    }

    /// Items intersecting the viewport grown by [`Viewport::PADDING_RATIO`].
    pub fn query_viewport(&self, viewport: &Viewport) -> impl Iterator<Item = &Item<K, P>> + '_ {
        self.query_range(viewport.padded_bbox())
    }

    /// Items whose box intersects `bbox`. Subtrees not intersecting `bbox` are pruned.
    pub fn query_range(&self, bbox: BoundingBox) -> impl Iterator<Item = &Item<K, P>> + '_ {
        let mut out = Vec::new();
        let Some(root) = self.root else {
            return out.into_iter();
        };
        let mut stack = vec![root];
        while let Some(i) = stack.pop() {
            let node = self.arena.get(i);
            if !node.bbox.intersects(&bbox) {
                continue;
            }
            match &node.children {
                Children::Leaf(items) => {
                    out.extend(items.iter().filter(|it| it.bbox.intersects(&bbox)));
                }
                Children::Inner(nodes) => stack.extend(nodes.iter().rev().copied()),
            }
        }
        out.into_iter()
    }

    /// Items under the 1×1 box anchored at `(x, y)`.
    pub fn query_point(&self, x: f64, y: f64) -> impl Iterator<Item = &Item<K, P>> + '_ {
        self.query_range(BoundingBox::from_xywh(x, y, 1.0, 1.0))
    }

    /// Every item of the given kind, by full traversal.
    pub fn query_by_type(&self, kind: ElementKind) -> impl Iterator<Item = &Item<K, P>> + '_ {
        self.iter().filter(move |it| it.kind == kind)
    }

    /// Every stored item in tree order.
    pub fn iter(&self) -> impl Iterator<Item = &Item<K, P>> + '_ {
        let mut out = Vec::with_capacity(self.len());
        if let Some(root) = self.root {
            let mut stack = vec![root];
            while let Some(i) = stack.pop() {
                match &self.arena.get(i).children {
                    Children::Leaf(items) => out.extend(items.iter()),
                    Children::Inner(nodes) => stack.extend(nodes.iter().rev().copied()),
                }
            }
        }
        out.into_iter()
    }

    /// Shape summary of the tree.
    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats {
            items: self.len(),
            nodes: self.arena.live(),
            ..IndexStats::default()
        };
        let Some(root) = self.root else {
            return stats;
        };
        let mut cur = root;
        stats.depth = 1;
        while let Children::Inner(nodes) = &self.arena.get(cur).children {
            let Some(first) = nodes.first() else {
                break;
            };
            cur = *first;
            stats.depth += 1;
        }
        let mut stack = vec![root];
        while let Some(i) = stack.pop() {
            match &self.arena.get(i).children {
                Children::Leaf(_) => stats.leaves += 1,
                Children::Inner(nodes) => stack.extend(nodes.iter().copied()),
            }
        }
        stats
    }

    // --- internals ---

    fn choose_subtree(&self, nodes: &[NodeIdx], bbox: &BoundingBox) -> NodeIdx {
        let mut best = nodes[0];
        let mut best_cost = f64::INFINITY;
        for &n in nodes {
            let cost = self.arena.get(n).bbox.enlargement(bbox);
            if cost < best_cost {
                best_cost = cost;
                best = n;
            }
        }
        best
    }

    /// Walk from `start` to the root, splitting overflowing nodes and refreshing boxes.
    fn adjust_upward(&mut self, start: NodeIdx) {
        let mut cur = Some(start);
        while let Some(idx) = cur {
            if self.arena.get(idx).children.len() > self.max_entries {
                self.split(idx);
            } else {
                self.arena.refresh_bbox(idx);
            }
            // A root split installs a new parent, which is then refreshed too.
            cur = self.arena.get(idx).parent;
        }
    }

    /// Sort children along the longer axis of the node's box by center and move
    /// the upper half into a new sibling.
    fn split(&mut self, idx: NodeIdx) {
        let bbox = self.arena.covering_bbox(idx);
        let along_x = bbox.width() >= bbox.height();
        let parent = self.arena.get(idx).parent;
        let children = core::mem::replace(
            &mut self.arena.get_mut(idx).children,
            Children::Inner(Vec::new()),
        );

        let right = match children {
            Children::Leaf(mut items) => {
                items.sort_by(|a, b| axis_center(&a.bbox, along_x).total_cmp(&axis_center(&b.bbox, along_x)));
                let right = items.split_off(items.len() / 2);
                self.arena.get_mut(idx).children = Children::Leaf(items);
                Children::Leaf(right)
            }
            Children::Inner(mut nodes) => {
                let arena = &self.arena;
                nodes.sort_by(|a, b| {
                    axis_center(&arena.get(*a).bbox, along_x)
                        .total_cmp(&axis_center(&arena.get(*b).bbox, along_x))
                });
                let right = nodes.split_off(nodes.len() / 2);
                self.arena.get_mut(idx).children = Children::Inner(nodes);
                Children::Inner(right)
            }
        };

        let sibling = self.arena.alloc(Node {
            bbox: BoundingBox::EMPTY,
            parent,
            children: right,
        });
        let moved_nodes = match &self.arena.get(sibling).children {
            Children::Leaf(items) => {
                for it in items {
                    self.locations.insert(it.id.clone(), sibling);
                }
                Vec::new()
            }
            Children::Inner(nodes) => nodes.clone(),
        };
        for n in moved_nodes {
            self.arena.get_mut(n).parent = Some(sibling);
        }
        self.arena.refresh_bbox(idx);
        self.arena.refresh_bbox(sibling);

        match parent {
            Some(p) => {
                if let Children::Inner(nodes) = &mut self.arena.get_mut(p).children {
                    let at = nodes
                        .iter()
                        .position(|n| *n == idx)
                        .map_or(nodes.len(), |i| i + 1);
                    nodes.insert(at, sibling);
                }
            }
            None => {
                let root = self.arena.alloc(Node {
                    bbox: BoundingBox::EMPTY,
                    parent: None,
                    children: Children::Inner(vec![idx, sibling]),
                });
                self.arena.get_mut(idx).parent = Some(root);
                self.arena.get_mut(sibling).parent = Some(root);
                self.arena.refresh_bbox(root);
                self.root = Some(root);
                log::trace!("index root split; {} items", self.locations.len());
            }
        }
    }

    /// Detach emptied nodes and refresh ancestor boxes up to the root.
    fn condense(&mut self, start: NodeIdx) {
        let mut cur = start;
        loop {
            let Some(parent) = self.arena.get(cur).parent else {
                self.shrink_root(cur);
                return;
            };
            if self.arena.get(cur).children.is_empty() {
                if let Children::Inner(nodes) = &mut self.arena.get_mut(parent).children {
                    nodes.retain(|n| *n != cur);
                }
                self.arena.free(cur);
            } else {
                self.arena.refresh_bbox(cur);
            }
            cur = parent;
        }
    }

    fn shrink_root(&mut self, mut root: NodeIdx) {
        loop {
            let shape = match &self.arena.get(root).children {
                Children::Inner(nodes) if nodes.is_empty() => RootShape::EmptyInner,
                Children::Inner(nodes) if nodes.len() == 1 => RootShape::Promote(nodes[0]),
                _ => RootShape::Keep,
            };
            match shape {
                RootShape::Keep => break,
                RootShape::EmptyInner => {
                    self.arena.get_mut(root).children = Children::Leaf(Vec::new());
                    break;
                }
                RootShape::Promote(only) => {
                    self.arena.free(root);
                    self.arena.get_mut(only).parent = None;
                    root = only;
                }
            }
        }
        self.arena.refresh_bbox(root);
        self.root = Some(root);
    }

    /// Check structural invariants; panics with a description on violation.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let Some(root) = self.root else {
            assert!(self.locations.is_empty(), "items without a root");
            return;
        };
        assert!(self.arena.get(root).parent.is_none(), "root has a parent");
        let mut leaf_depth = None;
        let mut seen = 0_usize;
        let mut stack = vec![(root, 1_usize)];
        while let Some((i, depth)) = stack.pop() {
            let node = self.arena.get(i);
            assert!(
                node.children.len() <= self.max_entries,
                "node exceeds max_entries"
            );
            assert_eq!(node.bbox, self.arena.covering_bbox(i), "stale node bbox");
            if i != root {
                assert!(!node.children.is_empty(), "empty non-root node");
            }
            match &node.children {
                Children::Leaf(items) => {
                    match leaf_depth {
                        None => leaf_depth = Some(depth),
                        Some(d) => assert_eq!(d, depth, "leaves at different depths"),
                    }
                    for it in items {
                        assert_eq!(self.locations.get(&it.id), Some(&i), "stale id cache");
                        seen += 1;
                    }
                }
                Children::Inner(nodes) => {
                    for n in nodes {
                        assert_eq!(self.arena.get(*n).parent, Some(i), "bad parent link");
                        stack.push((*n, depth + 1));
                    }
                }
            }
        }
        assert_eq!(seen, self.locations.len(), "id cache size mismatch");
    }
}

fn axis_center(b: &BoundingBox, along_x: bool) -> f64 {
    let (cx, cy) = b.center();
    if along_x { cx } else { cy }
}

impl<K, P> Debug for SpatialIndex<K, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("max_entries", &self.max_entries)
            .field("items", &self.locations.len())
            .field("arena_nodes", &self.arena.live())
            .field("has_root", &self.root.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::BTreeSet;

    #[derive(Clone)]
    struct Rng(u64);

    impl Rng {
        fn next_u64(&mut self) -> u64 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.0 = x;
            x
        }

        fn next_f64(&mut self) -> f64 {
            (self.next_u64() >> 11) as f64 / (1_u64 << 53) as f64
        }
    }

    fn random_box(rng: &mut Rng) -> BoundingBox {
        let x = rng.next_f64() * 1000.0;
        let y = rng.next_f64() * 1000.0;
        BoundingBox::from_xywh(x, y, 1.0 + rng.next_f64() * 30.0, 1.0 + rng.next_f64() * 30.0)
    }

    fn ids<'a>(it: impl Iterator<Item = &'a Item<u32, ()>>) -> BTreeSet<u32> {
        it.map(|it| it.id).collect()
    }

    #[test]
    fn range_query_matches_linear_scan() {
        let mut rng = Rng(0x5eed_1234);
        let mut idx = SpatialIndex::new();
        let mut boxes = Vec::new();
        for id in 0..600_u32 {
            let b = random_box(&mut rng);
            idx.insert(id, ElementKind::Stall, b, ());
            boxes.push((id, b));
        }
        idx.assert_invariants();
        assert!(idx.stats().depth > 1, "600 items must have split the root");

        for _ in 0..50 {
            let q = BoundingBox::from_xywh(
                rng.next_f64() * 900.0,
                rng.next_f64() * 900.0,
                rng.next_f64() * 200.0,
                rng.next_f64() * 200.0,
            );
            let expected: BTreeSet<u32> = boxes
                .iter()
                .filter(|(_, b)| b.intersects(&q))
                .map(|(id, _)| *id)
                .collect();
            assert_eq!(ids(idx.query_range(q)), expected);
        }
    }

    #[test]
    fn every_item_found_by_its_own_box() {
        let mut rng = Rng(42);
        let mut idx = SpatialIndex::new();
        let mut boxes = Vec::new();
        for id in 0..300_u32 {
            let b = random_box(&mut rng);
            idx.insert(id, ElementKind::Stall, b, ());
            boxes.push((id, b));
        }
        for (id, b) in boxes {
            assert!(ids(idx.query_range(b)).contains(&id), "item {id} not found");
        }
    }

    #[test]
    fn remove_then_query_then_reinsert() {
        let mut idx = SpatialIndex::new();
        for id in 0..100_u32 {
            let x = f64::from(id % 10) * 20.0;
            let y = f64::from(id / 10) * 20.0;
            idx.insert(id, ElementKind::Stall, BoundingBox::from_xywh(x, y, 10.0, 10.0), ());
        }
        let all = BoundingBox::new(-1.0, -1.0, 1000.0, 1000.0);
        for id in (0..100_u32).step_by(3) {
            assert_eq!(idx.remove(&id), Some(()));
            assert!(!ids(idx.query_range(all)).contains(&id));
            idx.assert_invariants();
        }
        assert_eq!(idx.len(), 66);
        idx.insert(0, ElementKind::Stall, BoundingBox::from_xywh(0.0, 0.0, 10.0, 10.0), ());
        assert!(ids(idx.query_point(5.0, 5.0)).contains(&0));
        idx.assert_invariants();
    }

    #[test]
    fn removing_everything_leaves_empty_root() {
        let mut idx = SpatialIndex::new();
        for id in 0..40_u32 {
            idx.insert(id, ElementKind::Stall, BoundingBox::from_xywh(f64::from(id) * 5.0, 0.0, 4.0, 4.0), ());
        }
        for id in 0..40_u32 {
            idx.remove(&id);
        }
        idx.assert_invariants();
        assert!(idx.is_empty());
        assert_eq!(idx.bounds(), None);
        let stats = idx.stats();
        assert_eq!(stats.depth, 1);
        assert_eq!(stats.nodes, 1);
        // Removing again is a no-op.
        assert_eq!(idx.remove(&3), None);
    }

    #[test]
    fn update_moves_item_and_is_idempotent() {
        let mut idx = SpatialIndex::new();
        for id in 0..50_u32 {
            idx.insert(id, ElementKind::Stall, BoundingBox::from_xywh(f64::from(id) * 12.0, 0.0, 10.0, 10.0), ());
        }
        let target = BoundingBox::from_xywh(500.0, 500.0, 10.0, 10.0);
        assert!(idx.update(&7, target, ()));
        let once = ids(idx.query_range(BoundingBox::new(0.0, 0.0, 2000.0, 2000.0)));
        assert!(idx.update(&7, target, ()));
        let twice = ids(idx.query_range(BoundingBox::new(0.0, 0.0, 2000.0, 2000.0)));
        assert_eq!(once, twice);
        assert_eq!(ids(idx.query_point(505.0, 505.0)), BTreeSet::from([7]));
        assert!(!ids(idx.query_point(85.0, 5.0)).contains(&7));
        assert_eq!(idx.get(&7).map(|it| it.kind), Some(ElementKind::Stall));
        idx.assert_invariants();
    }

    #[test]
    fn update_unknown_id_is_noop() {
        let mut idx: SpatialIndex<u32, ()> = SpatialIndex::new();
        assert!(!idx.update(&1, BoundingBox::from_xywh(0.0, 0.0, 1.0, 1.0), ()));
        assert!(idx.is_empty());
    }

    #[test]
    fn duplicate_insert_replaces() {
        let mut idx = SpatialIndex::new();
        idx.insert(1_u32, ElementKind::Hall, BoundingBox::from_xywh(0.0, 0.0, 10.0, 10.0), ());
        idx.insert(1_u32, ElementKind::Hall, BoundingBox::from_xywh(50.0, 50.0, 10.0, 10.0), ());
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.query_point(5.0, 5.0).count(), 0);
        assert_eq!(idx.query_point(55.0, 55.0).count(), 1);
    }

    #[test]
    fn query_by_type_filters() {
        let mut idx = SpatialIndex::new();
        idx.insert(0_u32, ElementKind::Space, BoundingBox::from_xywh(0.0, 0.0, 100.0, 100.0), ());
        idx.insert(1_u32, ElementKind::Hall, BoundingBox::from_xywh(0.0, 0.0, 50.0, 50.0), ());
        for id in 2..30_u32 {
            idx.insert(id, ElementKind::Stall, BoundingBox::from_xywh(f64::from(id), 1.0, 1.0, 1.0), ());
        }
        idx.insert(99_u32, ElementKind::Fixture, BoundingBox::from_xywh(70.0, 70.0, 2.0, 2.0), ());
        assert_eq!(ids(idx.query_by_type(ElementKind::Hall)), BTreeSet::from([1]));
        assert_eq!(ids(idx.query_by_type(ElementKind::Fixture)), BTreeSet::from([99]));
        assert_eq!(idx.query_by_type(ElementKind::Stall).count(), 28);
    }

    #[test]
    fn viewport_query_includes_padding() {
        let mut idx = SpatialIndex::new();
        idx.insert(1_u32, ElementKind::Stall, BoundingBox::from_xywh(105.0, 0.0, 4.0, 4.0), ());
        idx.insert(2_u32, ElementKind::Stall, BoundingBox::from_xywh(125.0, 0.0, 4.0, 4.0), ());
        let vp = Viewport::new(0.0, 0.0, 100.0, 50.0, 1.0);
        // Padding is 10 units: the element starting at 105 is picked up, 125 is not.
        assert_eq!(ids(idx.query_viewport(&vp)), BTreeSet::from([1]));
    }

    #[test]
    fn payload_mut_keeps_geometry() {
        let mut idx = SpatialIndex::new();
        idx.insert(1_u32, ElementKind::Stall, BoundingBox::from_xywh(0.0, 0.0, 4.0, 4.0), 10_u32);
        if let Some(p) = idx.payload_mut(&1) {
            *p = 20;
        }
        let hits: Vec<_> = idx.query_point(1.0, 1.0).map(|it| it.payload).collect();
        assert_eq!(hits, vec![20]);
    }

    #[test]
    fn grid_scene_stays_shallow() {
        let mut idx = SpatialIndex::new();
        let mut id = 0_u32;
        for row in 0..60 {
            for col in 0..60 {
                idx.insert(
                    id,
                    ElementKind::Stall,
                    BoundingBox::from_xywh(f64::from(col) * 12.0, f64::from(row) * 12.0, 10.0, 10.0),
                    (),
                );
                id += 1;
            }
        }
        idx.assert_invariants();
        let stats = idx.stats();
        assert_eq!(stats.items, 3600);
        assert!(stats.depth <= 5, "grid of 3600 stalls too deep: {stats:?}");
        // A small window touches only a handful of stalls.
        assert_eq!(idx.query_range(BoundingBox::new(0.0, 0.0, 20.0, 20.0)).count(), 4);
    }

    #[test]
    fn clear_drops_everything() {
        let mut idx = SpatialIndex::new();
        for id in 0..20_u32 {
            idx.insert(id, ElementKind::Stall, BoundingBox::from_xywh(f64::from(id), 0.0, 1.0, 1.0), ());
        }
        idx.clear();
        assert!(idx.is_empty());
        assert_eq!(idx.stats(), IndexStats::default());
        assert!(!idx.contains(&3));
        idx.insert(3, ElementKind::Stall, BoundingBox::from_xywh(0.0, 0.0, 1.0, 1.0), ());
        assert_eq!(idx.len(), 1);
    }
}
