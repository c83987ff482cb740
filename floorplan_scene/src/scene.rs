// Copyright 2025 the Floorplan Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core scene implementation: structure, edits, drag and queries.

use std::collections::BTreeMap;
use std::fmt;

use floorplan_index::{BoundingBox, SpatialIndex, Viewport};
use floorplan_render::{ElementId, RenderElement};
use kurbo::{Point, Rect};

use crate::types::{
    Damage, DragOutcome, ElementStyle, Hit, LocalNode, NodeFlags, SceneError, SnapConfig,
};

#[derive(Clone, Debug)]
struct Node {
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    local: LocalNode,
    world: Rect,
    // insertion order, for hit-test ties
    seq: u64,
}

impl Node {
    fn is(&self, flag: NodeFlags) -> bool {
        self.local.flags.contains(flag)
    }

    fn render_element(&self, id: ElementId) -> RenderElement {
        let style = &self.local.style;
        RenderElement {
            id,
            kind: self.local.kind,
            rect: self.world,
            fill: style.fill,
            stroke: style.stroke,
            status: style.status,
            category: style.category.clone(),
            label: style.label.clone(),
            value_label: style.value_label.clone(),
            z_index: self.local.z_index,
        }
    }
}

/// A floor plan: a forest of elements (space, halls, stalls, fixtures) kept in sync with
/// one [`SpatialIndex`] of [`RenderElement`]s.
///
/// Only visible elements are indexed, so the index can be handed straight to a renderer.
/// Every edit updates the index before returning.
pub struct Scene {
    nodes: BTreeMap<ElementId, Node>,
    index: SpatialIndex<ElementId, RenderElement>,
    snap: SnapConfig,
    next_seq: u64,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("nodes", &self.nodes.len())
            .field("indexed", &self.index.len())
            .field("snap", &self.snap)
            .finish_non_exhaustive()
    }
}

impl Scene {
    /// An empty scene with default snapping.
    pub fn new() -> Self {
        Self::with_snap(SnapConfig::default())
    }

    /// An empty scene with the given snapping.
    pub fn with_snap(snap: SnapConfig) -> Self {
        Self {
            nodes: BTreeMap::new(),
            index: SpatialIndex::new(),
            snap,
            next_seq: 0,
        }
    }

    /// Current snapping.
    pub fn snap(&self) -> SnapConfig {
        self.snap
    }

    /// Replace the snapping.
    pub fn set_snap(&mut self, snap: SnapConfig) {
        self.snap = snap;
    }

    /// Number of elements, visible or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the scene has no elements.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `id` is in the scene.
    pub fn contains(&self, id: ElementId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// The index of visible elements.
    pub fn index(&self) -> &SpatialIndex<ElementId, RenderElement> {
        &self.index
    }

    /// Local data of an element.
    pub fn local(&self, id: ElementId) -> Option<&LocalNode> {
        self.nodes.get(&id).map(|n| &n.local)
    }

    /// Parent of an element; `None` for roots and unknown ids.
    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.nodes.get(&id)?.parent
    }

    /// Children of an element in insertion order.
    pub fn children(&self, id: ElementId) -> &[ElementId] {
        self.nodes.get(&id).map_or(&[], |n| &n.children)
    }

    /// World-space rectangle of an element.
    pub fn world_bounds(&self, id: ElementId) -> Option<Rect> {
        self.nodes.get(&id).map(|n| n.world)
    }

    /// The indexed render element, if `id` is visible.
    pub fn element(&self, id: ElementId) -> Option<&RenderElement> {
        self.index.get(&id).map(|it| &it.payload)
    }

    /// Add an element under `parent` (or as a root). Returns the region to repaint.
    pub fn insert(
        &mut self,
        id: ElementId,
        parent: Option<ElementId>,
        local: LocalNode,
    ) -> Result<Damage, SceneError> {
        if self.nodes.contains_key(&id) {
            return Err(SceneError::DuplicateId(id));
        }
        let origin = match parent {
            Some(p) => match self.nodes.get_mut(&p) {
                Some(parent_node) => {
                    parent_node.children.push(id);
                    parent_node.world.origin()
                }
                None => return Err(SceneError::UnknownParent(p)),
            },
            None => Point::ZERO,
        };
        let node = Node {
            parent,
            children: Vec::new(),
            world: local.local_bounds + origin.to_vec2(),
            local,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        let mut damage = Damage::default();
        if node.is(NodeFlags::VISIBLE) {
            damage.push(node.world);
        }
        self.nodes.insert(id, node);
        self.sync_index(id);
        Ok(damage)
    }

    /// Remove an element and its whole subtree.
    pub fn remove(&mut self, id: ElementId) -> Result<Damage, SceneError> {
        let Some(parent) = self.nodes.get(&id).map(|n| n.parent) else {
            return Err(SceneError::UnknownId(id));
        };
        if let Some(p) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            p.children.retain(|c| *c != id);
        }
        let mut damage = Damage::default();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let Some(node) = self.nodes.remove(&cur) else {
                continue;
            };
            if node.is(NodeFlags::VISIBLE) {
                damage.push(node.world);
            }
            let _ = self.index.remove(&cur);
            stack.extend(node.children);
        }
        Ok(damage)
    }

    /// Move or resize an element within its parent's space. Descendants follow.
    pub fn set_local_bounds(&mut self, id: ElementId, bounds: Rect) -> Result<Damage, SceneError> {
        let node = self.nodes.get_mut(&id).ok_or(SceneError::UnknownId(id))?;
        node.local.local_bounds = bounds;
        let mut damage = Damage::default();
        self.refresh_world(id, &mut damage);
        Ok(damage)
    }

    /// Change the draw order of an element.
    pub fn set_z_index(&mut self, id: ElementId, z_index: i32) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(&id).ok_or(SceneError::UnknownId(id))?;
        node.local.z_index = z_index;
        if let Some(element) = self.index.payload_mut(&id) {
            element.z_index = z_index;
        }
        Ok(())
    }

    /// Restyle an element. Returns the region to repaint.
    pub fn set_style(&mut self, id: ElementId, style: ElementStyle) -> Result<Damage, SceneError> {
        let node = self.nodes.get_mut(&id).ok_or(SceneError::UnknownId(id))?;
        node.local.style = style;
        let mut damage = Damage::default();
        if node.is(NodeFlags::VISIBLE) {
            damage.push(node.world);
        }
        self.sync_index(id);
        Ok(damage)
    }

    /// Replace an element's flags. Hiding an element drops it from the index.
    pub fn set_flags(&mut self, id: ElementId, flags: NodeFlags) -> Result<Damage, SceneError> {
        let node = self.nodes.get_mut(&id).ok_or(SceneError::UnknownId(id))?;
        let was_visible = node.is(NodeFlags::VISIBLE);
        node.local.flags = flags;
        let mut damage = Damage::default();
        if was_visible != node.is(NodeFlags::VISIBLE) {
            damage.push(node.world);
        }
        self.sync_index(id);
        Ok(damage)
    }

    /// Move a draggable element so its local top-left corner is as close to `candidate`
    /// as the rules allow: snapped to the grid, then clamped inside the parent's box.
    ///
    /// The index reflects the new position as soon as this returns.
    pub fn drag_to(&mut self, id: ElementId, candidate: Point) -> Result<DragOutcome, SceneError> {
        let node = self.nodes.get(&id).ok_or(SceneError::UnknownId(id))?;
        if !node.is(NodeFlags::DRAGGABLE) {
            return Err(SceneError::NotDraggable(id));
        }
        let size = node.local.local_bounds.size();
        let mut origin = self.snap.apply(candidate);
        if let Some(container) = node
            .parent
            .and_then(|p| self.nodes.get(&p))
            .map(|p| p.local.local_bounds.size())
        {
            origin.x = origin.x.clamp(0.0, (container.width - size.width).max(0.0));
            origin.y = origin.y.clamp(0.0, (container.height - size.height).max(0.0));
        }
        let damage = self.set_local_bounds(id, Rect::from_origin_size(origin, size))?;
        log::debug!("dragged {id} to ({:.1}, {:.1})", origin.x, origin.y);
        Ok(DragOutcome { origin, damage })
    }

    /// Topmost visible, pickable element containing `pt` (edges included).
    ///
    /// Higher z-index wins; on equal z the element inserted later wins.
    pub fn hit_test_point(&self, pt: Point) -> Option<Hit> {
        let mut best: Option<(ElementId, i32, u64)> = None;
        for item in self.index.query_point(pt.x, pt.y) {
            let Some(node) = self.nodes.get(&item.id) else {
                continue;
            };
            if !node.is(NodeFlags::PICKABLE) || !contains_inclusive(node.world, pt) {
                continue;
            }
            let z = node.local.z_index;
            let better = match best {
                None => true,
                Some((_, bz, bseq)) => (z, node.seq) > (bz, bseq),
            };
            if better {
                best = Some((item.id, z, node.seq));
            }
        }
        best.map(|(id, _, _)| Hit {
            id,
            path: self.path_to_root(id),
        })
    }

    /// Visible elements in the viewport, padded as
    /// [`SpatialIndex::query_viewport`] pads it.
    pub fn visible(&self, viewport: &Viewport) -> impl Iterator<Item = &RenderElement> {
        self.index.query_viewport(viewport).map(|it| &it.payload)
    }

    /// Ids of visible elements intersecting `rect`, for marquee selection. The corners may
    /// come in any order, as they do when dragging up or left.
    pub fn intersect_rect(&self, rect: Rect) -> impl Iterator<Item = ElementId> + '_ {
        let rect = rect.abs();
        self.index
            .query_range(BoundingBox::new(rect.x0, rect.y0, rect.x1, rect.y1))
            .map(|it| it.id)
    }

    // --- internals ---

    fn path_to_root(&self, mut id: ElementId) -> Vec<ElementId> {
        let mut out = vec![id];
        while let Some(p) = self.nodes.get(&id).and_then(|n| n.parent) {
            out.push(p);
            id = p;
        }
        out.reverse();
        out
    }

    fn refresh_world(&mut self, id: ElementId, damage: &mut Damage) {
        let origin = self
            .parent(id)
            .and_then(|p| self.nodes.get(&p))
            .map_or(Point::ZERO, |p| p.world.origin());
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        let old = node.world;
        node.world = node.local.local_bounds + origin.to_vec2();
        if old == node.world {
            return;
        }
        if node.is(NodeFlags::VISIBLE) {
            damage.push(old);
            damage.push(node.world);
        }
        let moved = old.origin() != node.world.origin();
        let children = if moved { node.children.clone() } else { Vec::new() };
        self.sync_index(id);
        for child in children {
            self.refresh_world(child, damage);
        }
    }

    fn sync_index(&mut self, id: ElementId) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        if !node.is(NodeFlags::VISIBLE) {
            let _ = self.index.remove(&id);
            return;
        }
        let element = node.render_element(id);
        let bbox = element.bbox();
        if self.index.contains(&id) {
            self.index.update(&id, bbox, element);
        } else {
            self.index.insert(id, node.local.kind, bbox, element);
        }
    }
}

fn contains_inclusive(r: Rect, pt: Point) -> bool {
    pt.x >= r.x0 && pt.x <= r.x1 && pt.y >= r.y0 && pt.y <= r.y1
}

#[cfg(test)]
mod tests {
    use super::*;
    use floorplan_index::ElementKind;
    use floorplan_render::StallStatus;

    const HALL: ElementId = ElementId(1);
    const A: ElementId = ElementId(10);
    const B: ElementId = ElementId(11);

    /// A 400×300 hall at (100, 100) with two draggable stalls.
    fn hall_with_stalls() -> Scene {
        let mut scene = Scene::new();
        scene
            .insert(
                HALL,
                None,
                LocalNode::new(ElementKind::Hall, Rect::new(100.0, 100.0, 500.0, 400.0)),
            )
            .unwrap();
        let stall = |x: f64| {
            LocalNode::new(ElementKind::Stall, Rect::new(x, 10.0, x + 50.0, 60.0))
                .with_z_index(1)
                .with_flags(NodeFlags::default() | NodeFlags::DRAGGABLE)
        };
        scene.insert(A, Some(HALL), stall(10.0)).unwrap();
        scene.insert(B, Some(HALL), stall(100.0)).unwrap();
        scene
    }

    #[test]
    fn children_are_placed_relative_to_parent() {
        let scene = hall_with_stalls();
        assert_eq!(scene.world_bounds(A), Some(Rect::new(110.0, 110.0, 160.0, 160.0)));
        assert_eq!(scene.children(HALL), [A, B]);
        assert_eq!(scene.parent(A), Some(HALL));
        assert_eq!(scene.element(B).map(|e| e.rect), scene.world_bounds(B));
        assert_eq!(scene.index().len(), 3);
    }

    #[test]
    fn insert_rejects_duplicates_and_orphans() {
        let mut scene = hall_with_stalls();
        let node = LocalNode::new(ElementKind::Stall, Rect::new(0.0, 0.0, 5.0, 5.0));
        assert_eq!(
            scene.insert(A, Some(HALL), node.clone()),
            Err(SceneError::DuplicateId(A))
        );
        assert_eq!(
            scene.insert(ElementId(99), Some(ElementId(98)), node),
            Err(SceneError::UnknownParent(ElementId(98)))
        );
        assert!(!scene.children(HALL).contains(&ElementId(99)));
    }

    #[test]
    fn hit_test_prefers_higher_z() {
        let scene = hall_with_stalls();
        let hit = scene.hit_test_point(Point::new(120.0, 120.0)).unwrap();
        assert_eq!(hit.id, A);
        assert_eq!(hit.path, [HALL, A]);
        let hall_hit = scene.hit_test_point(Point::new(400.0, 300.0)).unwrap();
        assert_eq!(hall_hit.id, HALL);
        assert!(scene.hit_test_point(Point::new(5.0, 5.0)).is_none());
    }

    #[test]
    fn hit_test_equal_z_later_wins() {
        let mut scene = hall_with_stalls();
        let overlap = LocalNode::new(ElementKind::Fixture, Rect::new(10.0, 10.0, 30.0, 30.0))
            .with_z_index(1);
        scene.insert(ElementId(50), Some(HALL), overlap).unwrap();
        let hit = scene.hit_test_point(Point::new(115.0, 115.0)).unwrap();
        assert_eq!(hit.id, ElementId(50));
    }

    #[test]
    fn drag_snaps_and_updates_index() {
        let mut scene = hall_with_stalls();
        let out = scene.drag_to(A, Point::new(203.0, 147.0)).unwrap();
        assert_eq!(out.origin, Point::new(200.0, 150.0));
        assert_eq!(scene.world_bounds(A), Some(Rect::new(300.0, 250.0, 350.0, 300.0)));
        assert_eq!(
            out.damage.dirty_rects,
            [Rect::new(110.0, 110.0, 160.0, 160.0), Rect::new(300.0, 250.0, 350.0, 300.0)]
        );
        // The very next query sees the new position.
        assert_eq!(scene.hit_test_point(Point::new(320.0, 270.0)).map(|h| h.id), Some(A));
        assert_eq!(scene.hit_test_point(Point::new(120.0, 120.0)).map(|h| h.id), Some(HALL));
    }

    #[test]
    fn drag_is_clamped_to_parent() {
        let mut scene = hall_with_stalls();
        let out = scene.drag_to(B, Point::new(1000.0, -40.0)).unwrap();
        assert_eq!(out.origin, Point::new(350.0, 0.0));
        assert_eq!(scene.world_bounds(B), Some(Rect::new(450.0, 100.0, 500.0, 150.0)));
    }

    #[test]
    fn drag_requires_draggable() {
        let mut scene = hall_with_stalls();
        assert_eq!(
            scene.drag_to(HALL, Point::new(0.0, 0.0)),
            Err(SceneError::NotDraggable(HALL))
        );
        assert_eq!(
            scene.drag_to(ElementId(404), Point::ZERO),
            Err(SceneError::UnknownId(ElementId(404)))
        );
    }

    #[test]
    fn moving_a_hall_moves_its_stalls() {
        let mut scene = hall_with_stalls();
        let damage = scene
            .set_local_bounds(HALL, Rect::new(600.0, 100.0, 1000.0, 400.0))
            .unwrap();
        assert_eq!(damage.dirty_rects.len(), 6);
        assert_eq!(scene.world_bounds(A), Some(Rect::new(610.0, 110.0, 660.0, 160.0)));
        let ids: Vec<_> = scene
            .intersect_rect(Rect::new(600.0, 100.0, 700.0, 200.0))
            .collect();
        assert!(ids.contains(&A) && ids.contains(&HALL));
        assert!(scene.intersect_rect(Rect::new(0.0, 0.0, 200.0, 200.0)).next().is_none());
    }

    #[test]
    fn marquee_corners_may_come_in_any_order() {
        let scene = hall_with_stalls();
        let forward: Vec<_> = scene
            .intersect_rect(Rect::new(105.0, 105.0, 170.0, 170.0))
            .collect();
        let backward: Vec<_> = scene
            .intersect_rect(Rect::new(170.0, 170.0, 105.0, 105.0))
            .collect();
        assert!(forward.contains(&A) && !forward.contains(&B));
        assert_eq!(backward.len(), forward.len());
        assert!(backward.contains(&A) && backward.contains(&HALL));
    }

    #[test]
    fn resizing_keeps_children_in_place() {
        let mut scene = hall_with_stalls();
        let damage = scene
            .set_local_bounds(HALL, Rect::new(100.0, 100.0, 600.0, 400.0))
            .unwrap();
        assert_eq!(damage.dirty_rects.len(), 2);
        assert_eq!(scene.world_bounds(A), Some(Rect::new(110.0, 110.0, 160.0, 160.0)));
    }

    #[test]
    fn hidden_elements_leave_the_index() {
        let mut scene = hall_with_stalls();
        let damage = scene.set_flags(A, NodeFlags::empty()).unwrap();
        assert!(!damage.is_empty());
        assert!(scene.element(A).is_none());
        assert_eq!(scene.hit_test_point(Point::new(120.0, 120.0)).map(|h| h.id), Some(HALL));
        let viewport = Viewport::new(0.0, 0.0, 600.0, 500.0, 1.0);
        assert_eq!(scene.visible(&viewport).count(), 2);

        scene.set_flags(A, NodeFlags::default()).unwrap();
        assert_eq!(scene.visible(&viewport).count(), 3);
    }

    #[test]
    fn style_and_z_reach_the_index() {
        let mut scene = hall_with_stalls();
        let style = ElementStyle {
            status: StallStatus::Booked,
            label: "A-1".into(),
            ..ElementStyle::default()
        };
        scene.set_style(A, style).unwrap();
        scene.set_z_index(A, 9).unwrap();
        let e = scene.element(A).unwrap();
        assert_eq!(e.status, StallStatus::Booked);
        assert_eq!(&*e.label, "A-1");
        assert_eq!(e.z_index, 9);
    }

    #[test]
    fn remove_drops_the_subtree() {
        let mut scene = hall_with_stalls();
        let damage = scene.remove(HALL).unwrap();
        assert_eq!(damage.dirty_rects.len(), 3);
        assert!(scene.is_empty());
        assert!(scene.index().is_empty());
        assert_eq!(scene.remove(HALL), Err(SceneError::UnknownId(HALL)));
    }

    #[test]
    fn removing_a_child_unlinks_it() {
        let mut scene = hall_with_stalls();
        scene.remove(A).unwrap();
        assert_eq!(scene.children(HALL), [B]);
        assert_eq!(scene.len(), 2);
        assert!(!scene.index().contains(&A));
    }
}
