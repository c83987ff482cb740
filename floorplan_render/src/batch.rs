// Copyright 2025 the Floorplan Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Batched rendering of same-style elements.
//!
//! Elements that share a [`GroupKey`] are drawn together: one state setup and one path per
//! pass instead of one per element. Groups persist across frames under their
//! [`GroupKey::stable_name`], so a scene that does not change re-renders without
//! rebuilding them.
//!
//! Batched output paints exactly the primitives that [`BatchRenderer::render_element`]
//! paints for each member on its own; only the number of calls on the [`DrawContext`]
//! differs. Size-gated features are evaluated per member for that reason.
//!
//! Groups never span z-indices, and they are drawn in ascending z first, so a stall above
//! its hall stays above it whatever their levels and colours. Within one z band, groups
//! go cheapest level first.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use floorplan_index::{BoundingBox, Viewport};
use kurbo::{Point, Rect};

use crate::draw::{DrawContext, TextAlign};
use crate::element::{RenderElement, Rgba, StallStatus};
use crate::lod::{Features, LevelOfDetailManager, LodLevel, RenderAttributes};
use crate::pool::{ObjectPool, PoolConfig, PoolStats};

/// What elements must share to be drawn in one batch.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupKey {
    /// Draw order band.
    pub z_index: i32,
    /// Detail level.
    pub level: LodLevel,
    /// Fill colour.
    pub fill: Rgba,
    /// Outline colour.
    pub stroke: Rgba,
    /// Booking status.
    pub status: StallStatus,
    /// Outline width in tenths of a scene unit.
    pub stroke_q: i64,
    /// Stall type, only distinguished from [`LodLevel::Standard`] up.
    pub category: Option<Arc<str>>,
}

impl GroupKey {
    /// Key of `element` drawn with `attributes`.
    pub fn for_element(element: &RenderElement, attributes: &RenderAttributes) -> Self {
        #[allow(clippy::cast_possible_truncation, reason = "stroke widths are small")]
        let stroke_q = (attributes.stroke_width * 10.0).round() as i64;
        Self {
            z_index: element.z_index,
            level: attributes.level,
            fill: element.fill,
            stroke: element.stroke,
            status: element.status,
            stroke_q,
            category: if attributes.level >= LodLevel::Standard {
                element.category.clone()
            } else {
                None
            },
        }
    }

    /// A string that is equal for equal keys and stable across frames.
    pub fn stable_name(&self) -> String {
        format!(
            "{}|{:?}|{}|{}|{:?}|{}|{}",
            self.z_index,
            self.level,
            self.fill,
            self.stroke,
            self.status,
            self.stroke_q,
            self.category.as_deref().unwrap_or("-")
        )
    }
}

/// A persistent batch of same-key elements.
#[derive(Clone, Debug)]
pub struct BatchGroup {
    key: GroupKey,
    name: String,
    members: Vec<RenderElement>,
    attributes: RenderAttributes,
    bounds: Rect,
    dirty: bool,
    last_frame: u64,
}

impl BatchGroup {
    /// The shared key.
    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    /// The stable name the group is stored under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Members in input order. They share one z-index.
    pub fn members(&self) -> &[RenderElement] {
        &self.members
    }

    /// Attributes shared by the members.
    pub fn attributes(&self) -> &RenderAttributes {
        &self.attributes
    }

    /// Union of the members' rectangles.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// True if membership changed since the group was last rendered.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn set_members(&mut self, members: Vec<RenderElement>) {
        let same = members.len() == self.members.len()
            && members.iter().zip(&self.members).all(|(a, b)| a.id == b.id);
        if !same {
            self.dirty = true;
        }
        self.bounds = members
            .iter()
            .map(|m| m.rect)
            .reduce(|a, b| a.union(b))
            .unwrap_or(Rect::ZERO);
        self.members = members;
    }
}

/// Statistics of one [`BatchRenderer::render_batches`] call.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BatchRenderResult {
    /// Groups drawn.
    pub batches: usize,
    /// Members across every group.
    pub total_elements: usize,
    /// Members of drawn groups.
    pub rendered_elements: usize,
    /// Members of culled or hidden groups.
    pub skipped_elements: usize,
    /// `fill`, `stroke` and `fill_text` calls issued.
    pub draw_calls: usize,
    /// Wall time spent.
    pub elapsed: Duration,
}

/// Member indices selected for a pass.
#[derive(Debug, Default)]
struct PathBuffer {
    picks: Vec<usize>,
}

impl PathBuffer {
    fn select(&mut self, members: &[RenderElement], mut keep: impl FnMut(&RenderElement) -> bool) {
        self.picks.clear();
        self.picks
            .extend(members.iter().enumerate().filter(|(_, m)| keep(m)).map(|(i, _)| i));
    }
}

/// Builds and draws [`BatchGroup`]s.
pub struct BatchRenderer {
    groups: HashMap<String, BatchGroup>,
    frame: u64,
    scratch: ObjectPool<PathBuffer>,
}

impl Default for BatchRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchRenderer {
    /// An empty renderer.
    pub fn new() -> Self {
        let config = PoolConfig {
            initial_size: 1,
            max_size: 4,
            ..PoolConfig::default()
        };
        Self {
            groups: HashMap::new(),
            frame: 0,
            scratch: ObjectPool::new("batch_paths", config, PathBuffer::default)
                .with_reset(|b: &mut PathBuffer| b.picks.clear()),
        }
    }

    /// Every live group, in no particular order.
    pub fn groups(&self) -> impl Iterator<Item = &BatchGroup> + '_ {
        self.groups.values()
    }

    /// Look a group up by its stable name.
    pub fn group(&self, name: &str) -> Option<&BatchGroup> {
        self.groups.get(name)
    }

    /// Number of live groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// True if there are no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Drop every group.
    pub fn clear(&mut self) {
        self.groups.clear();
    }

    /// Statistics of the internal scratch pool.
    pub fn scratch_stats(&self) -> PoolStats {
        self.scratch.stats()
    }

    /// Bucket same-level `elements` by [`GroupKey`] and create or refresh one group per
    /// bucket. Returns the stable names touched.
    pub fn create_batch<'a>(
        &mut self,
        elements: impl IntoIterator<Item = &'a RenderElement>,
        level: LodLevel,
        attributes: RenderAttributes,
    ) -> Vec<String> {
        let attributes = RenderAttributes { level, ..attributes };
        let mut buckets: HashMap<GroupKey, Vec<RenderElement>> = HashMap::new();
        for e in elements {
            buckets
                .entry(GroupKey::for_element(e, &attributes))
                .or_default()
                .push(e.clone());
        }
        let frame = self.frame;
        let mut names = Vec::with_capacity(buckets.len());
        for (key, members) in buckets {
            let name = key.stable_name();
            let group = self.groups.entry(name.clone()).or_insert_with(|| BatchGroup {
                key,
                name: name.clone(),
                members: Vec::new(),
                attributes,
                bounds: Rect::ZERO,
                dirty: true,
                last_frame: frame,
            });
            group.attributes = attributes;
            group.last_frame = frame;
            group.set_members(members);
            names.push(name);
        }
        names
    }

    /// Start a frame: group `elements` by level and batch every level. Groups not refreshed
    /// by this call are dropped.
    pub fn prepare<'a>(
        &mut self,
        elements: impl IntoIterator<Item = &'a RenderElement>,
        scale: f64,
        lod: &LevelOfDetailManager,
    ) {
        self.frame += 1;
        for (level, batch) in lod.batch_by_lod(elements, scale) {
            self.create_batch(batch.members, level, batch.attributes);
        }
        let frame = self.frame;
        let before = self.groups.len();
        self.groups.retain(|_, g| g.last_frame == frame);
        let evicted = before - self.groups.len();
        if evicted > 0 {
            log::debug!("evicted {evicted} stale batch groups");
        }
    }

    /// Draw every group that is not hidden and overlaps the padded viewport, in ascending
    /// z-index, then cheapest level first.
    pub fn render_batches(
        &mut self,
        ctx: &mut dyn DrawContext,
        viewport: &Viewport,
        scale: f64,
    ) -> BatchRenderResult {
        let start = Instant::now();
        let view = viewport.padded_bbox();
        let mut result = BatchRenderResult::default();

        let mut order: Vec<&mut BatchGroup> = self.groups.values_mut().collect();
        order.sort_by(|a, b| {
            (a.key.z_index, a.key.level, &a.name).cmp(&(b.key.z_index, b.key.level, &b.name))
        });

        let mut buf = self.scratch.acquire();
        for group in order {
            let n = group.members.len();
            result.total_elements += n;
            let b = group.bounds;
            let bounds = BoundingBox::new(b.x0, b.y0, b.x1, b.y1);
            if group.key.level == LodLevel::Hidden || !bounds.intersects(&view) {
                result.skipped_elements += n;
                continue;
            }
            let shared = group.attributes;
            let gate = |m: &RenderElement| {
                shared
                    .features
                    .gated(m.rect.width() * scale, m.rect.height() * scale)
            };
            result.draw_calls += paint_members(ctx, &group.members, &shared, &gate, &mut buf);
            result.rendered_elements += n;
            result.batches += 1;
            group.dirty = false;
        }
        self.scratch.release(buf);

        result.elapsed = start.elapsed();
        result
    }

    /// Draw one element on its own. `attributes` must already carry the element's size
    /// gates, as returned by [`LevelOfDetailManager::calculate_lod`]. Returns the number of
    /// painting calls.
    pub fn render_element(
        &mut self,
        ctx: &mut dyn DrawContext,
        element: &RenderElement,
        attributes: &RenderAttributes,
    ) -> usize {
        let mut buf = self.scratch.acquire();
        let features = attributes.features;
        let calls = paint_members(
            ctx,
            std::slice::from_ref(element),
            attributes,
            &|_: &RenderElement| features,
            &mut buf,
        );
        self.scratch.release(buf);
        calls
    }
}

impl fmt::Debug for BatchRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchRenderer")
            .field("groups", &self.groups.len())
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}

/// Paint `members`, which share fill, stroke, status and `attributes`, in up to four
/// passes. Returns the number of painting calls.
fn paint_members(
    ctx: &mut dyn DrawContext,
    members: &[RenderElement],
    attributes: &RenderAttributes,
    features_of: &dyn Fn(&RenderElement) -> Features,
    buf: &mut PathBuffer,
) -> usize {
    let Some(first) = members.first() else {
        return 0;
    };
    if attributes.level == LodLevel::Hidden {
        return 0;
    }
    let font = attributes.font_size;
    let small = font * 0.8;
    let pad = font * 0.4;
    let effects = attributes.show_effects();
    let mut calls = 0;

    ctx.save();
    ctx.set_opacity(first.status.opacity());

    // Body.
    ctx.set_fill(first.fill);
    ctx.set_stroke(first.stroke, attributes.stroke_width);
    if effects {
        ctx.set_shadow(attributes.shadow_blur);
    }
    ctx.begin_path();
    for m in members {
        ctx.rect(m.rect, attributes.corner_radius);
    }
    ctx.fill();
    ctx.stroke();
    calls += 2;
    if effects {
        ctx.set_shadow(0.0);
    }

    // Labels.
    buf.select(members, |m| {
        features_of(m).contains(Features::NUMBER) && !m.label.is_empty()
    });
    if !buf.picks.is_empty() {
        ctx.set_fill(Rgba::INK);
        ctx.set_font(font);
        ctx.set_text_align(TextAlign::Center);
        for &i in &buf.picks {
            let m = &members[i];
            ctx.fill_text(&m.label, m.rect.center());
            calls += 1;
        }
    }

    // Type indicator.
    buf.select(members, |m| {
        features_of(m).contains(Features::TYPE) && m.category.is_some()
    });
    if !buf.picks.is_empty() {
        ctx.set_fill(Rgba::INK);
        ctx.set_font(small);
        ctx.set_text_align(TextAlign::Left);
        for &i in &buf.picks {
            let m = &members[i];
            if let Some(category) = m.category.as_deref() {
                ctx.fill_text(category, Point::new(m.rect.x0 + pad, m.rect.y0 + pad + small));
                calls += 1;
            }
        }
    }

    // Secondary value.
    buf.select(members, |m| {
        features_of(m).contains(Features::PRICE) && m.value_label.is_some()
    });
    if !buf.picks.is_empty() {
        ctx.set_fill(Rgba::INK);
        ctx.set_font(small);
        ctx.set_text_align(TextAlign::Right);
        for &i in &buf.picks {
            let m = &members[i];
            if let Some(value) = m.value_label.as_deref() {
                ctx.fill_text(value, Point::new(m.rect.x1 - pad, m.rect.y1 - pad));
                calls += 1;
            }
        }
    }

    // Status markers, one path.
    buf.select(members, |m| features_of(m).contains(Features::STATUS));
    if !buf.picks.is_empty() {
        let r = font * 0.35;
        ctx.set_fill(first.status.marker_color());
        ctx.begin_path();
        for &i in &buf.picks {
            let m = &members[i];
            ctx.circle(Point::new(m.rect.x1 - pad - r, m.rect.y0 + pad + r), r);
        }
        ctx.fill();
        calls += 1;
    }

    // Dimensions.
    buf.select(members, |m| features_of(m).contains(Features::DIMENSIONS));
    if !buf.picks.is_empty() {
        ctx.set_fill(Rgba::INK);
        ctx.set_font(font * 0.7);
        ctx.set_text_align(TextAlign::Left);
        for &i in &buf.picks {
            let m = &members[i];
            let text = format!("{:.0}×{:.0}", m.rect.width(), m.rect.height());
            ctx.fill_text(&text, Point::new(m.rect.x0 + pad, m.rect.y1 - pad));
            calls += 1;
        }
    }

    ctx.restore();
    calls
}
