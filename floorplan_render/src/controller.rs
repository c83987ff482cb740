// Copyright 2025 the Floorplan Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame orchestration and optimization profiles.
//!
//! The [`PerformanceController`] owns the LOD manager, the batch renderer and the pool
//! manager for an editing session. The host tells it how many elements the scene has;
//! it picks an [`OptimizationProfile`] from that count and configures the three
//! components to match. Re-evaluation only happens once the count has moved by more than
//! [`ControllerConfig::hysteresis`], so a scene hovering around a boundary does not flip
//! profiles every frame.
//!
//! Frames do not draw from the pool manager. Its archetype pools hold
//! [`StallVisual`](crate::StallVisual), [`HallVisual`](crate::HallVisual) and
//! [`TextureBuffer`](crate::TextureBuffer) scratch objects for host code such as drag
//! previews and cached rasterizations; the pooling profiles preallocate them and turn on
//! their periodic report.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use floorplan_index::{SpatialIndex, Viewport};

use crate::batch::{BatchRenderResult, BatchRenderer};
use crate::draw::DrawContext;
use crate::element::{ElementId, RenderElement};
use crate::lod::{LevelOfDetailManager, LodConfig, LodLevel};
use crate::pool::{GlobalPoolStats, PoolConfig, PoolManager};

/// How hard the renderer works to stay within its frame budget.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OptimizationProfile {
    /// Small scenes: default thresholds, every element drawn on its own.
    #[default]
    Minimal,
    /// Batching on, thresholds ×1.25.
    Balanced,
    /// Batching and pools on, thresholds ×1.5.
    Aggressive,
    /// Everything on, thresholds ×2 and one level less detail.
    Extreme,
}

impl OptimizationProfile {
    /// Multiplier applied to the base LOD thresholds.
    pub const fn threshold_factor(self) -> f64 {
        match self {
            Self::Minimal => 1.0,
            Self::Balanced => 1.25,
            Self::Aggressive => 1.5,
            Self::Extreme => 2.0,
        }
    }

    /// Whether frames go through the batch renderer.
    pub const fn batching(self) -> bool {
        !matches!(self, Self::Minimal)
    }

    /// Whether pools are pre-allocated and monitored.
    pub const fn pooling(self) -> bool {
        matches!(self, Self::Aggressive | Self::Extreme)
    }

    /// Whether the LOD manager runs in performance mode.
    pub const fn performance_mode(self) -> bool {
        matches!(self, Self::Extreme)
    }
}

/// Tuning for [`PerformanceController`].
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerConfig {
    /// Element-count change needed before the profile is re-evaluated.
    pub hysteresis: usize,
    /// Smallest count that gets [`OptimizationProfile::Balanced`].
    pub batching_min: usize,
    /// Smallest count that gets [`OptimizationProfile::Aggressive`].
    pub pooling_min: usize,
    /// Smallest count that gets [`OptimizationProfile::Extreme`].
    pub extreme_min: usize,
    /// Frames kept for the rolling frame-time average.
    pub frame_window: usize,
    /// Threshold multiplier in emergency mode.
    pub emergency_factor: f64,
    /// Objects built in every pool when pooling turns on.
    pub preallocate: usize,
    /// Configuration of every archetype pool.
    pub pool: PoolConfig,
    /// Base LOD configuration; profiles scale its thresholds.
    pub lod: LodConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            hysteresis: 100,
            batching_min: 100,
            pooling_min: 500,
            extreme_min: 2000,
            frame_window: 60,
            emergency_factor: 3.0,
            preallocate: 50,
            pool: PoolConfig::default(),
            lod: LodConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Profile for a scene of `count` elements.
    pub fn profile_for(&self, count: usize) -> OptimizationProfile {
        if count >= self.extreme_min {
            OptimizationProfile::Extreme
        } else if count >= self.pooling_min {
            OptimizationProfile::Aggressive
        } else if count >= self.batching_min {
            OptimizationProfile::Balanced
        } else {
            OptimizationProfile::Minimal
        }
    }
}

/// What one [`PerformanceController::render_frame`] call did.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FrameStats {
    /// Elements returned by the viewport query.
    pub visible: usize,
    /// Elements drawn.
    pub rendered: usize,
    /// Visible elements not drawn (hidden level or culled group).
    pub skipped: usize,
    /// Painting calls issued.
    pub draw_calls: usize,
    /// Whether the batch renderer was used.
    pub batched: bool,
    /// Wall time of the frame.
    pub elapsed: Duration,
}

/// Snapshot returned by [`PerformanceController::report`].
#[derive(Clone, Debug, PartialEq)]
pub struct PerformanceReport {
    /// Active profile.
    pub profile: OptimizationProfile,
    /// Last reported element count.
    pub element_count: usize,
    /// Whether emergency mode is on.
    pub emergency: bool,
    /// Frame budget derived from the target frame rate.
    pub budget_ms: f64,
    /// Mean of the frame window, if any frame was recorded.
    pub average_frame_ms: Option<f64>,
    /// Slowest frame in the window.
    pub worst_frame_ms: Option<f64>,
    /// Live batch groups.
    pub batch_groups: usize,
    /// Statistics of the last batched frame.
    pub last_batch: Option<BatchRenderResult>,
    /// Pool totals.
    pub pools: GlobalPoolStats,
    /// Human-readable tuning suggestions.
    pub recommendations: Vec<String>,
}

/// Picks an optimization profile and drives frames through the render components.
#[derive(Debug)]
pub struct PerformanceController {
    config: ControllerConfig,
    profile: OptimizationProfile,
    element_count: usize,
    evaluated_at: Option<usize>,
    emergency: bool,
    lod: LevelOfDetailManager,
    batches: BatchRenderer,
    pools: PoolManager,
    frames: VecDeque<Duration>,
    last_batch: Option<BatchRenderResult>,
}

impl Default for PerformanceController {
    fn default() -> Self {
        Self::new(ControllerConfig::default())
    }
}

impl PerformanceController {
    /// A controller in the [`OptimizationProfile::Minimal`] profile.
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            profile: OptimizationProfile::Minimal,
            element_count: 0,
            evaluated_at: None,
            emergency: false,
            lod: LevelOfDetailManager::new(config.lod),
            batches: BatchRenderer::new(),
            pools: PoolManager::with_archetypes(config.pool),
            frames: VecDeque::with_capacity(config.frame_window),
            last_batch: None,
        }
    }

    /// Configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Active profile.
    pub fn profile(&self) -> OptimizationProfile {
        self.profile
    }

    /// Last reported element count.
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// Whether emergency mode is on.
    pub fn is_emergency(&self) -> bool {
        self.emergency
    }

    /// The LOD manager.
    pub fn lod(&self) -> &LevelOfDetailManager {
        &self.lod
    }

    /// The batch renderer.
    pub fn batches(&self) -> &BatchRenderer {
        &self.batches
    }

    /// The pools.
    pub fn pools(&self) -> &PoolManager {
        &self.pools
    }

    /// Mutable access to the pools. Hosts acquire archetype objects here; frames never do.
    pub fn pools_mut(&mut self) -> &mut PoolManager {
        &mut self.pools
    }

    /// Set the element count and apply its profile unconditionally.
    pub fn initialize(&mut self, element_count: usize) {
        self.element_count = element_count;
        self.evaluate();
    }

    /// Report a new element count. Returns whether the profile was re-evaluated.
    pub fn update_count(&mut self, element_count: usize) -> bool {
        self.element_count = element_count;
        let moved = self
            .evaluated_at
            .is_none_or(|at| at.abs_diff(element_count) > self.config.hysteresis);
        if moved {
            self.evaluate();
        }
        moved
    }

    fn evaluate(&mut self) {
        self.evaluated_at = Some(self.element_count);
        let profile = self.config.profile_for(self.element_count);
        if profile != self.profile {
            log::info!(
                "optimization profile {:?} -> {:?} at {} elements",
                self.profile,
                profile,
                self.element_count
            );
        }
        self.profile = profile;
        self.apply_profile();
    }

    fn apply_profile(&mut self) {
        let profile = self.profile;
        if !self.emergency {
            let base = self.config.lod.thresholds;
            self.lod.set_thresholds(base.tightened(profile.threshold_factor()));
            self.lod
                .set_performance_mode(self.config.lod.performance_mode || profile.performance_mode());
        }
        if profile.pooling() {
            if !self.pools.is_monitoring() {
                let built = self.pools.preallocate_all(self.config.preallocate);
                log::debug!("pooling on, pre-allocated {built} objects");
                self.pools.set_monitoring(true);
            }
        } else {
            self.pools.set_monitoring(false);
        }
        if !profile.batching() {
            self.batches.clear();
        }
    }

    /// Force the most aggressive settings: thresholds × `emergency_factor`, performance
    /// mode, and every batch group and idle pool object dropped.
    pub fn enable_emergency_mode(&mut self) {
        if self.emergency {
            return;
        }
        self.emergency = true;
        let base = self.config.lod.thresholds;
        self.lod.set_thresholds(base.tightened(self.config.emergency_factor));
        self.lod.set_performance_mode(true);
        self.batches.clear();
        let freed = self.pools.clear_all();
        log::warn!("emergency mode on; dropped batch groups and {freed} idle pool objects");
    }

    /// Leave emergency mode and restore the current profile.
    pub fn disable_emergency_mode(&mut self) {
        if !self.emergency {
            return;
        }
        self.emergency = false;
        self.apply_profile();
        log::info!("emergency mode off, back to {:?}", self.profile);
    }

    /// Add a frame duration to the rolling window and feed it to the LOD manager.
    pub fn record_frame(&mut self, elapsed: Duration) {
        if self.config.frame_window == 0 {
            return;
        }
        while self.frames.len() >= self.config.frame_window {
            self.frames.pop_front();
        }
        self.frames.push_back(elapsed);
        self.lod.observe_frame_time(elapsed.as_secs_f64() * 1000.0);
    }

    /// Mean of the frame window in milliseconds.
    pub fn average_frame_ms(&self) -> Option<f64> {
        if self.frames.is_empty() {
            return None;
        }
        let total: Duration = self.frames.iter().sum();
        #[allow(clippy::cast_precision_loss, reason = "frame windows are small")]
        let n = self.frames.len() as f64;
        Some(total.as_secs_f64() * 1000.0 / n)
    }

    /// Query `index` for the viewport and draw the result, batched or element by element
    /// depending on the profile. Records its own duration with
    /// [`PerformanceController::record_frame`] and ticks the pools.
    pub fn render_frame(
        &mut self,
        index: &SpatialIndex<ElementId, RenderElement>,
        ctx: &mut dyn DrawContext,
        viewport: &Viewport,
    ) -> FrameStats {
        let start = Instant::now();
        let scale = viewport.scale;
        let visible: Vec<&RenderElement> =
            index.query_viewport(viewport).map(|item| &item.payload).collect();
        let mut stats = FrameStats {
            visible: visible.len(),
            batched: self.profile.batching(),
            ..FrameStats::default()
        };

        if stats.batched {
            self.batches.prepare(visible.iter().copied(), scale, &self.lod);
            let result = self.batches.render_batches(ctx, viewport, scale);
            stats.rendered = result.rendered_elements;
            stats.skipped = result.skipped_elements;
            stats.draw_calls = result.draw_calls;
            self.last_batch = Some(result);
        } else {
            let mut ordered = visible;
            ordered.sort_by_key(|e| e.z_index);
            for e in ordered {
                let attrs = self.lod.calculate_lod(scale, e.rect.width(), e.rect.height());
                if attrs.level == LodLevel::Hidden {
                    stats.skipped += 1;
                    continue;
                }
                stats.draw_calls += self.batches.render_element(ctx, e, &attrs);
                stats.rendered += 1;
            }
        }

        let now = Instant::now();
        self.pools.tick(now);
        stats.elapsed = now.duration_since(start);
        self.record_frame(stats.elapsed);
        stats
    }

    /// Current state and tuning suggestions.
    pub fn report(&self) -> PerformanceReport {
        let budget_ms = self.lod.frame_budget_ms();
        let average_frame_ms = self.average_frame_ms();
        let worst_frame_ms = self
            .frames
            .iter()
            .max()
            .map(|d| d.as_secs_f64() * 1000.0);
        let pools = self.pools.global_stats();

        let mut recommendations = Vec::new();
        if let Some(avg) = average_frame_ms {
            if avg > budget_ms {
                recommendations.push(format!(
                    "average frame time {avg:.1} ms exceeds the {budget_ms:.1} ms budget; \
                     tighten LOD thresholds"
                ));
            }
            if self.emergency && avg < budget_ms / 2.0 {
                recommendations
                    .push("frame times have recovered; emergency mode can be disabled".into());
            }
        }
        if let Some(worst) = worst_frame_ms
            && worst > budget_ms * 4.0
            && !self.emergency
        {
            recommendations.push(format!(
                "a frame took {worst:.1} ms, over four times the budget; consider emergency mode"
            ));
        }
        if !self.profile.batching() && self.element_count >= self.config.batching_min {
            recommendations.push(format!(
                "{} elements without batching; report the count to re-evaluate the profile",
                self.element_count
            ));
        }
        if pools.max_size_reached > 0 {
            recommendations.push(format!(
                "pools overflowed {} times; raise max_size",
                pools.max_size_reached
            ));
        }
        if self.profile.pooling() && pools.created > 0 && pools.reuse_ratio < 0.5 {
            recommendations.push(format!(
                "pool reuse ratio is {:.0}%; make sure objects are released",
                pools.reuse_ratio * 100.0
            ));
        }

        PerformanceReport {
            profile: self.profile,
            element_count: self.element_count,
            emergency: self.emergency,
            budget_ms,
            average_frame_ms,
            worst_frame_ms,
            batch_groups: self.batches.len(),
            last_batch: self.last_batch,
            pools,
            recommendations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::{DisplayList, Primitive, Shape};
    use crate::element::Rgba;
    use crate::lod::LodThresholds;
    use crate::pool::{STALL_VISUALS, StallVisual};
    use floorplan_index::ElementKind;
    use kurbo::Rect;
    use std::sync::Arc;

    fn grid(n: u64) -> SpatialIndex<ElementId, RenderElement> {
        let mut index = SpatialIndex::new();
        for i in 0..n {
            let x = (i % 20) as f64 * 60.0;
            let y = (i / 20) as f64 * 60.0;
            let mut e = RenderElement::new(
                ElementId(i),
                ElementKind::Stall,
                Rect::new(x, y, x + 50.0, y + 50.0),
            );
            e.label = Arc::from(format!("{i}"));
            index.insert(e.id, e.kind, e.bbox(), e);
        }
        index
    }

    #[test]
    fn profiles_follow_element_count() {
        let cfg = ControllerConfig::default();
        assert_eq!(cfg.profile_for(0), OptimizationProfile::Minimal);
        assert_eq!(cfg.profile_for(99), OptimizationProfile::Minimal);
        assert_eq!(cfg.profile_for(100), OptimizationProfile::Balanced);
        assert_eq!(cfg.profile_for(499), OptimizationProfile::Balanced);
        assert_eq!(cfg.profile_for(500), OptimizationProfile::Aggressive);
        assert_eq!(cfg.profile_for(2000), OptimizationProfile::Extreme);
    }

    #[test]
    fn hysteresis_suppresses_small_changes() {
        let mut c = PerformanceController::default();
        c.initialize(50);
        assert_eq!(c.profile(), OptimizationProfile::Minimal);
        assert!(!c.update_count(150));
        assert_eq!(c.profile(), OptimizationProfile::Minimal);
        assert_eq!(c.element_count(), 150);
        assert!(c.update_count(151));
        assert_eq!(c.profile(), OptimizationProfile::Balanced);
        assert_eq!(*c.lod().thresholds(), LodThresholds::default().tightened(1.25));
    }

    #[test]
    fn extreme_profile_turns_everything_on() {
        let mut c = PerformanceController::default();
        c.initialize(2500);
        assert_eq!(c.profile(), OptimizationProfile::Extreme);
        assert!(c.lod().config().performance_mode);
        assert!(c.pools().is_monitoring());
        let stats = c.pools().global_stats();
        assert_eq!(stats.current_size, 150);

        c.initialize(10);
        assert!(!c.lod().config().performance_mode);
        assert!(!c.pools().is_monitoring());
    }

    #[test]
    fn emergency_mode_overrides_and_restores() {
        let mut c = PerformanceController::default();
        c.initialize(600);
        let index = grid(40);
        let mut list = DisplayList::new();
        c.render_frame(&index, &mut list, &Viewport::new(0.0, 0.0, 1200.0, 200.0, 1.0));
        assert!(!c.batches().is_empty());

        c.enable_emergency_mode();
        assert!(c.is_emergency());
        assert_eq!(*c.lod().thresholds(), LodThresholds::default().tightened(3.0));
        assert!(c.lod().config().performance_mode);
        assert!(c.batches().is_empty());
        assert_eq!(c.pools().global_stats().current_size, 0);

        // Count changes do not undo emergency settings.
        c.update_count(2000);
        assert_eq!(*c.lod().thresholds(), LodThresholds::default().tightened(3.0));

        c.disable_emergency_mode();
        assert_eq!(c.profile(), OptimizationProfile::Extreme);
        assert_eq!(*c.lod().thresholds(), LodThresholds::default().tightened(2.0));
    }

    #[test]
    fn batched_frames_use_fewer_calls() {
        let index = grid(120);
        let viewport = Viewport::new(0.0, 0.0, 1200.0, 400.0, 1.0);

        let mut plain = PerformanceController::default();
        plain.initialize(50);
        let mut a = DisplayList::new();
        let individual = plain.render_frame(&index, &mut a, &viewport);
        assert!(!individual.batched);

        let mut batched = PerformanceController::default();
        batched.initialize(120);
        let mut b = DisplayList::new();
        let grouped = batched.render_frame(&index, &mut b, &viewport);
        assert!(grouped.batched);

        assert_eq!(individual.visible, grouped.visible);
        assert_eq!(individual.rendered, individual.visible);
        assert_eq!(grouped.rendered, grouped.visible);
        assert!(grouped.draw_calls < individual.draw_calls);
        assert_eq!(grouped.draw_calls, b.paint_calls());
        assert!(batched.report().last_batch.is_some());
    }

    #[test]
    fn host_draws_archetypes_from_preallocated_pools() {
        let mut c = PerformanceController::default();
        c.initialize(600);
        assert_eq!(c.profile(), OptimizationProfile::Aggressive);

        let pool = c
            .pools_mut()
            .pool_mut::<StallVisual>(STALL_VISUALS)
            .unwrap();
        let mut preview = pool.acquire();
        assert_eq!(preview.opacity, 1.0);
        preview.rect = Rect::new(0.0, 0.0, 50.0, 50.0);
        preview.opacity = 0.5;
        let s = pool.stats();
        assert_eq!((s.created, s.reused, s.in_use), (50, 1, 1));

        let index = grid(40);
        let mut list = DisplayList::new();
        c.render_frame(&index, &mut list, &Viewport::new(0.0, 0.0, 1200.0, 200.0, 1.0));
        assert_eq!(c.pools().global_stats().in_use, 1);

        let pool = c
            .pools_mut()
            .pool_mut::<StallVisual>(STALL_VISUALS)
            .unwrap();
        assert!(pool.release(preview));
        assert_eq!(*pool.acquire(), StallVisual::default());
    }

    #[test]
    fn stalls_stay_above_their_hall_in_every_profile() {
        let hall_fill = Rgba::rgb(0xf3f4f6);
        let mut index = SpatialIndex::new();
        let mut hall = RenderElement::new(
            ElementId(1),
            ElementKind::Hall,
            Rect::new(0.0, 0.0, 400.0, 300.0),
        );
        hall.fill = hall_fill;
        let mut stall = RenderElement::new(
            ElementId(2),
            ElementKind::Stall,
            Rect::new(20.0, 20.0, 70.0, 70.0),
        );
        stall.fill = Rgba::rgb(0xdbeafe);
        stall.z_index = 1;
        for e in [hall, stall] {
            index.insert(e.id, e.kind, e.bbox(), e);
        }
        let viewport = Viewport::new(0.0, 0.0, 800.0, 600.0, 1.0);

        for count in [10, 150] {
            let mut c = PerformanceController::default();
            c.initialize(count);
            let mut list = DisplayList::new();
            c.render_frame(&index, &mut list, &viewport);
            let first = list.flatten().into_iter().find_map(|p| match p {
                Primitive::Fill {
                    shape: Shape::Rect { .. },
                    color,
                    ..
                } => Some(color),
                _ => None,
            });
            assert_eq!(first, Some(hall_fill), "{:?}", c.profile());
        }
    }

    #[test]
    fn hidden_elements_are_skipped_without_batching() {
        let index = grid(10);
        let mut c = PerformanceController::default();
        c.initialize(10);
        let stats = c.render_frame(
            &index,
            &mut DisplayList::new(),
            &Viewport::new(0.0, 0.0, 1200.0, 200.0, 0.05),
        );
        assert_eq!(stats.visible, 10);
        assert_eq!(stats.skipped, 10);
        assert_eq!(stats.draw_calls, 0);
    }

    #[test]
    fn frame_window_is_bounded() {
        let mut c = PerformanceController::new(ControllerConfig {
            frame_window: 3,
            ..ControllerConfig::default()
        });
        for ms in [10, 20, 30, 40] {
            c.record_frame(Duration::from_millis(ms));
        }
        let avg = c.average_frame_ms().unwrap();
        assert!((avg - 30.0).abs() < 1e-9);
        let worst = c.report().worst_frame_ms.unwrap();
        assert!((worst - 40.0).abs() < 1e-9);
    }

    #[test]
    fn report_recommends_on_slow_frames() {
        let mut c = PerformanceController::default();
        c.initialize(10);
        assert!(c.report().recommendations.is_empty());
        c.record_frame(Duration::from_millis(80));
        let report = c.report();
        assert_eq!(report.recommendations.len(), 2, "{:?}", report.recommendations);
        assert!(report.recommendations[0].contains("budget"));
        assert!(report.recommendations[1].contains("emergency"));
        // Slow frames also degrade LOD through the adaptive threshold.
        assert!(c.lod().is_degraded());
    }
}
