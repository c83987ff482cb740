// Copyright 2025 the Floorplan Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Object pools for transient render objects.
//!
//! An [`ObjectPool`] hands out [`Pooled`] handles. A handle owns its value until it is
//! given back with [`ObjectPool::release`], which resets the value right away so a free
//! object is always clean. When every tracked object is in use and the pool is at
//! `max_size`, `acquire` still succeeds: it builds an untracked overflow object and logs a
//! warning. Releasing such a handle, or a handle from another pool, just drops the value.
//!
//! A tracked handle that is dropped or unwrapped with [`Pooled::into_inner`] instead of
//! being released gives up its slot. The pool forgets that slot the next time it acquires,
//! preallocates or cleans up, and [`ObjectPool::stats`] stops counting it right away.
//!
//! Idle cleanup is cooperative. The host calls [`ObjectPool::tick`] (or
//! [`PoolManager::tick`]) once per frame and the pool runs [`ObjectPool::cleanup_at`]
//! whenever `cleanup_interval` has elapsed.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use kurbo::Rect;

use crate::element::Rgba;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Sizing and idle policy of a pool.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolConfig {
    /// Objects created up front.
    pub initial_size: usize,
    /// Most objects the pool tracks.
    pub max_size: usize,
    /// How often `tick` runs idle cleanup.
    pub cleanup_interval: Duration,
    /// Free objects idle longer than this are destroyed by cleanup.
    pub max_idle: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_size: 0,
            max_size: 100,
            cleanup_interval: Duration::from_secs(30),
            max_idle: Duration::from_secs(60),
        }
    }
}

/// Counters of a single pool.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Objects built, tracked or not.
    pub created: u64,
    /// Acquisitions served by a free tracked object.
    pub reused: u64,
    /// Tracked objects destroyed by cleanup or `clear`.
    pub destroyed: u64,
    /// Tracked objects.
    pub current_size: usize,
    /// Acquisitions that found the pool full and allocated an overflow object.
    pub max_size_reached: u64,
    /// Tracked objects that are free.
    pub available: usize,
    /// Tracked objects that are checked out.
    pub in_use: usize,
}

/// An object checked out of an [`ObjectPool`].
#[must_use = "release the handle to return its object to the pool"]
pub struct Pooled<T> {
    pool: u64,
    slot: Option<u64>,
    // Keeps the slot checked out; tracked handles only.
    lease: Option<Rc<()>>,
    value: T,
}

impl<T> Pooled<T> {
    /// False for overflow objects that the pool does not track.
    pub fn is_tracked(&self) -> bool {
        self.slot.is_some()
    }

    /// Take the value out. The pool gives up the slot.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("slot", &self.slot)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

struct Slot<T> {
    id: u64,
    last_used: Instant,
    // `None` while checked out.
    value: Option<T>,
    lease: Weak<()>,
}

impl<T> Slot<T> {
    fn is_free(&self) -> bool {
        self.value.is_some()
    }

    /// Checked out by a handle that no longer exists.
    fn is_abandoned(&self) -> bool {
        self.value.is_none() && self.lease.strong_count() == 0
    }
}

type CreateFn<T> = Box<dyn FnMut() -> T>;
type ResetFn<T> = Box<dyn FnMut(&mut T)>;
type DestroyFn<T> = Box<dyn FnMut(T)>;

/// A bounded pool of reusable objects.
pub struct ObjectPool<T> {
    id: u64,
    name: String,
    config: PoolConfig,
    slots: Vec<Slot<T>>,
    next_slot: u64,
    create: CreateFn<T>,
    reset: Option<ResetFn<T>>,
    destroy: Option<DestroyFn<T>>,
    created: u64,
    reused: u64,
    destroyed: u64,
    max_size_reached: u64,
    last_cleanup: Instant,
}

impl<T> ObjectPool<T> {
    /// Create a pool and build `config.initial_size` objects.
    pub fn new(
        name: impl Into<String>,
        config: PoolConfig,
        create: impl FnMut() -> T + 'static,
    ) -> Self {
        let mut pool = Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            config,
            slots: Vec::new(),
            next_slot: 0,
            create: Box::new(create),
            reset: None,
            destroy: None,
            created: 0,
            reused: 0,
            destroyed: 0,
            max_size_reached: 0,
            last_cleanup: Instant::now(),
        };
        pool.preallocate(config.initial_size);
        pool
    }

    /// Hook run on every object when it is released and again when it is reused.
    #[must_use]
    pub fn with_reset(mut self, reset: impl FnMut(&mut T) + 'static) -> Self {
        self.reset = Some(Box::new(reset));
        self
    }

    /// Hook run on every tracked object the pool destroys.
    #[must_use]
    pub fn with_destroy(mut self, destroy: impl FnMut(T) + 'static) -> Self {
        self.destroy = Some(Box::new(destroy));
        self
    }

    /// Pool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Check out the first free object, or build one.
    pub fn acquire(&mut self) -> Pooled<T> {
        self.reclaim();
        let now = Instant::now();
        if let Some(slot) = self.slots.iter_mut().find(|s| s.is_free())
            && let Some(mut value) = slot.value.take()
        {
            slot.last_used = now;
            if let Some(reset) = self.reset.as_mut() {
                reset(&mut value);
            }
            self.reused += 1;
            let lease = Rc::new(());
            slot.lease = Rc::downgrade(&lease);
            return Pooled {
                pool: self.id,
                slot: Some(slot.id),
                lease: Some(lease),
                value,
            };
        }

        let value = (self.create)();
        self.created += 1;
        if self.slots.len() < self.config.max_size {
            let id = self.next_slot;
            self.next_slot += 1;
            let lease = Rc::new(());
            self.slots.push(Slot {
                id,
                last_used: now,
                value: None,
                lease: Rc::downgrade(&lease),
            });
            Pooled {
                pool: self.id,
                slot: Some(id),
                lease: Some(lease),
                value,
            }
        } else {
            self.max_size_reached += 1;
            log::warn!(
                "pool `{}` is full ({} objects); handing out an untracked object",
                self.name,
                self.config.max_size
            );
            Pooled {
                pool: self.id,
                slot: None,
                lease: None,
                value,
            }
        }
    }

    /// Return an object. Returns `false`, dropping the value, if this pool does not track it.
    pub fn release(&mut self, handle: Pooled<T>) -> bool {
        let Pooled {
            pool,
            slot,
            lease: _lease,
            mut value,
        } = handle;
        if pool != self.id {
            return false;
        }
        let Some(id) = slot else {
            return false;
        };
        let Some(slot) = self.slots.iter_mut().find(|s| s.id == id && !s.is_free()) else {
            return false;
        };
        if let Some(reset) = self.reset.as_mut() {
            reset(&mut value);
        }
        slot.value = Some(value);
        slot.last_used = Instant::now();
        true
    }

    /// Build free objects until `n` more exist or the pool is full. Returns how many were built.
    pub fn preallocate(&mut self, n: usize) -> usize {
        self.reclaim();
        let room = self.config.max_size.saturating_sub(self.slots.len());
        let count = n.min(room);
        let now = Instant::now();
        for _ in 0..count {
            let value = (self.create)();
            self.created += 1;
            self.slots.push(Slot {
                id: self.next_slot,
                last_used: now,
                value: Some(value),
                lease: Weak::new(),
            });
            self.next_slot += 1;
        }
        count
    }

    /// Destroy free objects idle for longer than `max_idle` as of `now`. Returns how many.
    pub fn cleanup_at(&mut self, now: Instant) -> usize {
        self.reclaim();
        let max_idle = self.config.max_idle;
        self.destroy_where(|slot| now.saturating_duration_since(slot.last_used) > max_idle)
    }

    /// [`ObjectPool::cleanup_at`] with the current time.
    pub fn cleanup(&mut self) -> usize {
        self.cleanup_at(Instant::now())
    }

    /// Run cleanup if `cleanup_interval` has passed since the last run.
    pub fn tick(&mut self, now: Instant) -> Option<usize> {
        if now.saturating_duration_since(self.last_cleanup) < self.config.cleanup_interval {
            return None;
        }
        self.last_cleanup = now;
        Some(self.cleanup_at(now))
    }

    /// Destroy every free object. Checked-out objects stay tracked.
    pub fn clear(&mut self) -> usize {
        self.reclaim();
        self.destroy_where(|_| true)
    }

    /// Current counters. Slots given up by dropped handles are not counted.
    pub fn stats(&self) -> PoolStats {
        let available = self.slots.iter().filter(|s| s.is_free()).count();
        let abandoned = self.slots.iter().filter(|s| s.is_abandoned()).count();
        let current_size = self.slots.len() - abandoned;
        PoolStats {
            created: self.created,
            reused: self.reused,
            destroyed: self.destroyed,
            current_size,
            max_size_reached: self.max_size_reached,
            available,
            in_use: current_size - available,
        }
    }

    /// Forget slots whose handles were dropped without being released.
    fn reclaim(&mut self) {
        let before = self.slots.len();
        self.slots.retain(|s| !s.is_abandoned());
        let lost = before - self.slots.len();
        if lost > 0 {
            log::debug!(
                "pool `{}`: reclaimed {lost} slots from unreleased handles",
                self.name
            );
        }
    }

    fn destroy_where(&mut self, mut doomed: impl FnMut(&Slot<T>) -> bool) -> usize {
        let (gone, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut self.slots)
            .into_iter()
            .partition(|s| s.is_free() && doomed(s));
        self.slots = keep;
        let count = gone.len();
        for value in gone.into_iter().filter_map(|s| s.value) {
            if let Some(destroy) = self.destroy.as_mut() {
                destroy(value);
            }
        }
        self.destroyed += count as u64;
        count
    }
}

impl<T> fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Totals across every pool of a [`PoolManager`].
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct GlobalPoolStats {
    /// Registered pools.
    pub pools: usize,
    /// Sum of [`PoolStats::created`].
    pub created: u64,
    /// Sum of [`PoolStats::reused`].
    pub reused: u64,
    /// Sum of [`PoolStats::destroyed`].
    pub destroyed: u64,
    /// Sum of [`PoolStats::current_size`].
    pub current_size: usize,
    /// Sum of [`PoolStats::in_use`].
    pub in_use: usize,
    /// Sum of [`PoolStats::max_size_reached`].
    pub max_size_reached: u64,
    /// `reused / (created + reused)`, or zero before any acquisition.
    pub reuse_ratio: f64,
}

trait ManagedPool: Any {
    fn stats(&self) -> PoolStats;
    fn tick(&mut self, now: Instant) -> Option<usize>;
    fn preallocate(&mut self, n: usize) -> usize;
    fn clear(&mut self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: 'static> ManagedPool for ObjectPool<T> {
    fn stats(&self) -> PoolStats {
        Self::stats(self)
    }

    fn tick(&mut self, now: Instant) -> Option<usize> {
        Self::tick(self, now)
    }

    fn preallocate(&mut self, n: usize) -> usize {
        Self::preallocate(self, n)
    }

    fn clear(&mut self) -> usize {
        Self::clear(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Name of the [`StallVisual`] pool registered by [`PoolManager::with_archetypes`].
pub const STALL_VISUALS: &str = "stall_visuals";
/// Name of the [`HallVisual`] pool registered by [`PoolManager::with_archetypes`].
pub const HALL_VISUALS: &str = "hall_visuals";
/// Name of the [`TextureBuffer`] pool registered by [`PoolManager::with_archetypes`].
pub const TEXTURE_BUFFERS: &str = "texture_buffers";

/// Named pools with aggregate statistics.
pub struct PoolManager {
    pools: BTreeMap<String, Box<dyn ManagedPool>>,
    monitoring: bool,
    report_interval: Duration,
    last_report: Instant,
}

impl Default for PoolManager {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl PoolManager {
    /// An empty manager that logs a report every `report_interval` while monitoring.
    pub fn new(report_interval: Duration) -> Self {
        Self {
            pools: BTreeMap::new(),
            monitoring: false,
            report_interval,
            last_report: Instant::now(),
        }
    }

    /// A manager with the stall, hall and texture pools registered. These are for host
    /// code; the frame pipeline keeps its own scratch buffers.
    pub fn with_archetypes(config: PoolConfig) -> Self {
        let mut manager = Self::default();
        manager.register(
            ObjectPool::new(STALL_VISUALS, config, StallVisual::default)
                .with_reset(StallVisual::reset),
        );
        manager.register(
            ObjectPool::new(HALL_VISUALS, config, HallVisual::default)
                .with_reset(HallVisual::reset),
        );
        manager.register(
            ObjectPool::new(TEXTURE_BUFFERS, config, TextureBuffer::default)
                .with_reset(TextureBuffer::reset),
        );
        manager
    }

    /// Add a pool under its name, replacing any pool with the same name.
    pub fn register<T: 'static>(&mut self, pool: ObjectPool<T>) {
        self.pools.insert(pool.name().to_owned(), Box::new(pool));
    }

    /// Names of the registered pools, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.pools.keys().map(String::as_str)
    }

    /// Typed access to a pool. `None` if missing or of another object type.
    pub fn pool<T: 'static>(&self, name: &str) -> Option<&ObjectPool<T>> {
        self.pools.get(name)?.as_any().downcast_ref()
    }

    /// Typed mutable access to a pool.
    pub fn pool_mut<T: 'static>(&mut self, name: &str) -> Option<&mut ObjectPool<T>> {
        self.pools.get_mut(name)?.as_any_mut().downcast_mut()
    }

    /// Statistics of one pool.
    pub fn stats(&self, name: &str) -> Option<PoolStats> {
        self.pools.get(name).map(|p| p.stats())
    }

    /// Totals across every pool.
    pub fn global_stats(&self) -> GlobalPoolStats {
        let mut out = GlobalPoolStats {
            pools: self.pools.len(),
            ..GlobalPoolStats::default()
        };
        for pool in self.pools.values() {
            let s = pool.stats();
            out.created += s.created;
            out.reused += s.reused;
            out.destroyed += s.destroyed;
            out.current_size += s.current_size;
            out.in_use += s.in_use;
            out.max_size_reached += s.max_size_reached;
        }
        let acquisitions = out.created + out.reused;
        if acquisitions > 0 {
            #[allow(clippy::cast_precision_loss, reason = "ratio of counters")]
            let ratio = out.reused as f64 / acquisitions as f64;
            out.reuse_ratio = ratio;
        }
        out
    }

    /// Whether periodic reports are logged.
    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    /// Enable or disable periodic reports.
    pub fn set_monitoring(&mut self, on: bool) {
        self.monitoring = on;
    }

    /// Build `n` free objects in every pool. Returns the total built.
    pub fn preallocate_all(&mut self, n: usize) -> usize {
        self.pools.values_mut().map(|p| p.preallocate(n)).sum()
    }

    /// Destroy every free object in every pool.
    pub fn clear_all(&mut self) -> usize {
        self.pools.values_mut().map(|p| p.clear()).sum()
    }

    /// Drive idle cleanup of every pool and, while monitoring, the periodic report.
    /// Returns how many objects cleanup destroyed.
    pub fn tick(&mut self, now: Instant) -> usize {
        let destroyed = self.pools.values_mut().filter_map(|p| p.tick(now)).sum();
        if self.monitoring
            && now.saturating_duration_since(self.last_report) >= self.report_interval
        {
            self.last_report = now;
            let g = self.global_stats();
            log::info!(
                "pools: {} tracked, {} in use, reuse ratio {:.1}%, {} overflow allocations",
                g.current_size,
                g.in_use,
                g.reuse_ratio * 100.0,
                g.max_size_reached
            );
        }
        destroyed
    }
}

impl fmt::Debug for PoolManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolManager")
            .field("pools", &self.pools.keys().collect::<Vec<_>>())
            .field("monitoring", &self.monitoring)
            .finish_non_exhaustive()
    }
}

/// Scratch drawing state for one stall.
#[derive(Clone, Debug, PartialEq)]
pub struct StallVisual {
    /// World rectangle.
    pub rect: Rect,
    /// Fill colour.
    pub fill: Rgba,
    /// Outline colour.
    pub stroke: Rgba,
    /// Label text.
    pub label: String,
    /// Opacity.
    pub opacity: f64,
}

impl Default for StallVisual {
    fn default() -> Self {
        Self {
            rect: Rect::ZERO,
            fill: Rgba::TRANSPARENT,
            stroke: Rgba::TRANSPARENT,
            label: String::new(),
            opacity: 1.0,
        }
    }
}

impl StallVisual {
    /// Return to the blank state, keeping the label allocation.
    pub fn reset(&mut self) {
        self.rect = Rect::ZERO;
        self.fill = Rgba::TRANSPARENT;
        self.stroke = Rgba::TRANSPARENT;
        self.label.clear();
        self.opacity = 1.0;
    }
}

/// Scratch drawing state for one hall.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HallVisual {
    /// World rectangle.
    pub rect: Rect,
    /// Hall name.
    pub name: String,
    /// Stalls inside the hall.
    pub stall_count: usize,
}

impl HallVisual {
    /// Return to the blank state, keeping the name allocation.
    pub fn reset(&mut self) {
        self.rect = Rect::ZERO;
        self.name.clear();
        self.stall_count = 0;
    }
}

/// An RGBA pixel buffer for cached rasterizations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextureBuffer {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Packed pixels, row-major.
    pub pixels: Vec<u32>,
}

impl TextureBuffer {
    /// Resize to `width`×`height`, clearing to transparent.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels.resize(width as usize * height as usize, 0);
    }

    /// Empty the buffer, keeping the allocation.
    pub fn reset(&mut self) {
        self.width = 0;
        self.height = 0;
        self.pixels.clear();
    }
}
