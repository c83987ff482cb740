// Copyright 2025 the Floorplan Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arena-allocated tree nodes.

use alloc::vec::Vec;

use crate::types::{BoundingBox, Item};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeIdx(usize);

impl NodeIdx {
    pub(crate) const fn get(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug)]
pub(crate) enum Children<K, P> {
    Leaf(Vec<Item<K, P>>),
    Inner(Vec<NodeIdx>),
}

impl<K, P> Children<K, P> {
    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Leaf(items) => items.len(),
            Self::Inner(nodes) => nodes.len(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Node<K, P> {
    pub(crate) bbox: BoundingBox,
    pub(crate) parent: Option<NodeIdx>,
    pub(crate) children: Children<K, P>,
}

impl<K, P> Node<K, P> {
    pub(crate) fn leaf(parent: Option<NodeIdx>) -> Self {
        Self {
            bbox: BoundingBox::EMPTY,
            parent,
            children: Children::Leaf(Vec::new()),
        }
    }

    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self.children, Children::Leaf(_))
    }
}

/// Slot storage for nodes with a free list.
#[derive(Clone, Debug)]
pub(crate) struct Arena<K, P> {
    slots: Vec<Option<Node<K, P>>>,
    free: Vec<usize>,
}

impl<K, P> Default for Arena<K, P> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<K, P> Arena<K, P> {
    pub(crate) fn alloc(&mut self, node: Node<K, P>) -> NodeIdx {
        if let Some(i) = self.free.pop() {
            self.slots[i] = Some(node);
            NodeIdx(i)
        } else {
            self.slots.push(Some(node));
            NodeIdx(self.slots.len() - 1)
        }
    }

    pub(crate) fn free(&mut self, idx: NodeIdx) {
        if let Some(slot) = self.slots.get_mut(idx.0)
            && slot.take().is_some()
        {
            self.free.push(idx.0);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }

    pub(crate) fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Panics on a dangling index; indices are only produced by this arena.
    pub(crate) fn get(&self, idx: NodeIdx) -> &Node<K, P> {
        self.slots[idx.0].as_ref().expect("dangling NodeIdx")
    }

    pub(crate) fn get_mut(&mut self, idx: NodeIdx) -> &mut Node<K, P> {
        self.slots[idx.0].as_mut().expect("dangling NodeIdx")
    }

    /// Minimal box covering the node's children.
    pub(crate) fn covering_bbox(&self, idx: NodeIdx) -> BoundingBox {
        match &self.get(idx).children {
            Children::Leaf(items) => items
                .iter()
                .fold(BoundingBox::EMPTY, |acc, it| acc.union(&it.bbox)),
            Children::Inner(nodes) => nodes
                .iter()
                .fold(BoundingBox::EMPTY, |acc, n| acc.union(&self.get(*n).bbox)),
        }
    }

    pub(crate) fn refresh_bbox(&mut self, idx: NodeIdx) {
        let bbox = self.covering_bbox(idx);
        self.get_mut(idx).bbox = bbox;
    }
}
