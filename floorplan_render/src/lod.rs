// Copyright 2025 the Floorplan Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Level-of-detail selection.
//!
//! A [`LodLevel`] is picked from the render scale, capped by how large the element is on
//! screen, and lowered by one step while the renderer is over its frame budget. The
//! level then determines a [`RenderAttributes`] record: which features to draw and the
//! stroke/font/effect sizes, expressed in scene units so they look the same at any zoom.

use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::element::RenderElement;

/// Detail tiers, cheapest first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LodLevel {
    /// Not drawn.
    Hidden,
    /// Filled and stroked rectangle only.
    Basic,
    /// Adds the identifying label.
    Simple,
    /// Adds the type indicator for large enough elements.
    Standard,
    /// Adds the secondary value and the status marker.
    Detailed,
    /// Adds dimensions and decorative effects.
    Full,
}

impl LodLevel {
    /// Every level in ascending order.
    pub const ALL: [Self; 6] = [
        Self::Hidden,
        Self::Basic,
        Self::Simple,
        Self::Standard,
        Self::Detailed,
        Self::Full,
    ];

    /// One step less detailed, saturating at [`LodLevel::Hidden`].
    pub const fn lower(self) -> Self {
        match self {
            Self::Hidden | Self::Basic => Self::Hidden,
            Self::Simple => Self::Basic,
            Self::Standard => Self::Simple,
            Self::Detailed => Self::Standard,
            Self::Full => Self::Detailed,
        }
    }

    /// Most detailed level worth drawing for an element whose smaller on-screen side is
    /// `min_px` pixels.
    pub fn cap_for_pixels(min_px: f64) -> Self {
        if min_px < 1.0 {
            Self::Hidden
        } else if min_px < 6.0 {
            Self::Basic
        } else if min_px < 16.0 {
            Self::Simple
        } else {
            Self::Full
        }
    }
}

/// The six scale cutoffs.
///
/// Each cutoff is the upper bound of the level it is named after: scales below `hidden`
/// are [`LodLevel::Hidden`], scales in `[hidden, basic)` are [`LodLevel::Basic`], and so
/// on up to `[detailed, ..)` which is [`LodLevel::Full`].
///
/// `full` plays no part in picking a level. It is the zoom ceiling hosts apply with
/// [`LodThresholds::clamp_scale`], and [`LodThresholds::validate`] checks it sits above
/// `detailed`.
///
/// Callers keep the cutoffs strictly increasing; [`LevelOfDetailManager`] does not check.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LodThresholds {
    /// Below this nothing is drawn.
    pub hidden: f64,
    /// Upper bound of [`LodLevel::Basic`].
    pub basic: f64,
    /// Upper bound of [`LodLevel::Simple`].
    pub simple: f64,
    /// Upper bound of [`LodLevel::Standard`].
    pub standard: f64,
    /// Upper bound of [`LodLevel::Detailed`].
    pub detailed: f64,
    /// Zoom ceiling for [`LodThresholds::clamp_scale`]. Level selection ignores it.
    pub full: f64,
}

impl Default for LodThresholds {
    fn default() -> Self {
        Self {
            hidden: 0.1,
            basic: 0.3,
            simple: 0.6,
            standard: 0.9,
            detailed: 1.2,
            full: 3.0,
        }
    }
}

/// Two adjacent cutoffs are not strictly increasing.
#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
#[error("LOD threshold `{upper}` ({upper_value}) must exceed `{lower}` ({lower_value})")]
pub struct ThresholdOrderError {
    /// Name of the lower cutoff.
    pub lower: &'static str,
    /// Its value.
    pub lower_value: f64,
    /// Name of the upper cutoff.
    pub upper: &'static str,
    /// Its value.
    pub upper_value: f64,
}

impl LodThresholds {
    /// Level for a render scale. Non-positive scales are hidden.
    pub fn level_for(&self, scale: f64) -> LodLevel {
        if scale.is_nan() || scale <= 0.0 || scale < self.hidden {
            LodLevel::Hidden
        } else if scale < self.basic {
            LodLevel::Basic
        } else if scale < self.simple {
            LodLevel::Simple
        } else if scale < self.standard {
            LodLevel::Standard
        } else if scale < self.detailed {
            LodLevel::Detailed
        } else {
            LodLevel::Full
        }
    }

    /// Every cutoff multiplied by `factor`; factors above one push detail to higher zoom.
    pub fn tightened(&self, factor: f64) -> Self {
        Self {
            hidden: self.hidden * factor,
            basic: self.basic * factor,
            simple: self.simple * factor,
            standard: self.standard * factor,
            detailed: self.detailed * factor,
            full: self.full * factor,
        }
    }

    /// Cap a requested zoom at `full`. NaN passes through and renders hidden.
    pub fn clamp_scale(&self, scale: f64) -> f64 {
        if scale > self.full { self.full } else { scale }
    }

    /// Check strict ordering. The manager never calls this; it is for callers that build
    /// thresholds from user input.
    pub fn validate(&self) -> Result<(), ThresholdOrderError> {
        let named = [
            ("hidden", self.hidden),
            ("basic", self.basic),
            ("simple", self.simple),
            ("standard", self.standard),
            ("detailed", self.detailed),
            ("full", self.full),
        ];
        for pair in named.windows(2) {
            let (lower, lower_value) = pair[0];
            let (upper, upper_value) = pair[1];
            if upper_value.partial_cmp(&lower_value) != Some(core::cmp::Ordering::Greater) {
                return Err(ThresholdOrderError {
                    lower,
                    lower_value,
                    upper,
                    upper_value,
                });
            }
        }
        Ok(())
    }
}

bitflags! {
    /// Optional visual features of an element.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Features: u8 {
        /// Identifying label.
        const NUMBER     = 0b0000_0001;
        /// Type indicator.
        const TYPE       = 0b0000_0010;
        /// Secondary value (price).
        const PRICE      = 0b0000_0100;
        /// Status marker.
        const STATUS     = 0b0000_1000;
        /// Dimensions label.
        const DIMENSIONS = 0b0001_0000;
        /// Shadow and thicker outline.
        const EFFECTS    = 0b0010_0000;
    }
}

impl Features {
    /// Minimum on-screen size (px) for the type indicator.
    pub const TYPE_MIN_PX: (f64, f64) = (40.0, 30.0);
    /// Minimum on-screen size (px) for the secondary value.
    pub const PRICE_MIN_PX: (f64, f64) = (60.0, 40.0);

    /// Every feature a level may draw.
    pub const fn for_level(level: LodLevel) -> Self {
        match level {
            LodLevel::Hidden | LodLevel::Basic => Self::empty(),
            LodLevel::Simple => Self::NUMBER,
            LodLevel::Standard => Self::NUMBER.union(Self::TYPE),
            LodLevel::Detailed => Self::NUMBER
                .union(Self::TYPE)
                .union(Self::PRICE)
                .union(Self::STATUS),
            LodLevel::Full => Self::all(),
        }
    }

    /// Drop the size-gated features that do not fit a `w_px`×`h_px` element.
    pub fn gated(self, w_px: f64, h_px: f64) -> Self {
        let mut out = self;
        if w_px <= Self::TYPE_MIN_PX.0 || h_px <= Self::TYPE_MIN_PX.1 {
            out.remove(Self::TYPE);
        }
        if w_px <= Self::PRICE_MIN_PX.0 || h_px <= Self::PRICE_MIN_PX.1 {
            out.remove(Self::PRICE);
        }
        out
    }
}

/// How to draw an element at a given level and scale. Sizes are in scene units.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RenderAttributes {
    /// Selected level.
    pub level: LodLevel,
    /// Features to draw.
    pub features: Features,
    /// Label font size.
    pub font_size: f64,
    /// Outline width.
    pub stroke_width: f64,
    /// Corner radius of the element rectangle.
    pub corner_radius: f64,
    /// Shadow blur; zero unless [`Features::EFFECTS`] is set.
    pub shadow_blur: f64,
}

impl RenderAttributes {
    /// Attributes that draw nothing.
    pub const HIDDEN: Self = Self {
        level: LodLevel::Hidden,
        features: Features::empty(),
        font_size: 0.0,
        stroke_width: 0.0,
        corner_radius: 0.0,
        shadow_blur: 0.0,
    };

    /// Attributes shared by every element at `level`, with size gates not yet applied.
    pub fn shared_for(level: LodLevel, scale: f64) -> Self {
        if level == LodLevel::Hidden || scale.is_nan() || scale <= 0.0 {
            return Self::HIDDEN;
        }
        // Pixel sizes, converted to scene units below.
        let (font_px, stroke_px, radius_px, shadow_px) = match level {
            LodLevel::Hidden => (0.0, 0.0, 0.0, 0.0),
            LodLevel::Basic => (0.0, 0.5, 0.0, 0.0),
            LodLevel::Simple => (10.0, 1.0, 0.0, 0.0),
            LodLevel::Standard => (11.0, 1.0, 0.0, 0.0),
            LodLevel::Detailed => (12.0, 1.5, 2.0, 0.0),
            LodLevel::Full => (13.0, 2.0, 3.0, 6.0),
        };
        Self {
            level,
            features: Features::for_level(level),
            font_size: font_px / scale,
            stroke_width: stroke_px / scale,
            corner_radius: radius_px / scale,
            shadow_blur: shadow_px / scale,
        }
    }

    /// Apply the size gates for an element of `width`×`height` scene units.
    #[must_use]
    pub fn gated(mut self, width: f64, height: f64, scale: f64) -> Self {
        self.features = self.features.gated(width * scale, height * scale);
        self
    }

    /// Whether the identifying label is drawn.
    pub fn show_number(&self) -> bool {
        self.features.contains(Features::NUMBER)
    }

    /// Whether the type indicator is drawn.
    pub fn show_type(&self) -> bool {
        self.features.contains(Features::TYPE)
    }

    /// Whether the secondary value is drawn.
    pub fn show_price(&self) -> bool {
        self.features.contains(Features::PRICE)
    }

    /// Whether the status marker is drawn.
    pub fn show_status(&self) -> bool {
        self.features.contains(Features::STATUS)
    }

    /// Whether the dimensions label is drawn.
    pub fn show_dimensions(&self) -> bool {
        self.features.contains(Features::DIMENSIONS)
    }

    /// Whether decorative effects are drawn.
    pub fn show_effects(&self) -> bool {
        self.features.contains(Features::EFFECTS)
    }
}

/// Tuning for [`LevelOfDetailManager`].
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LodConfig {
    /// Scale cutoffs.
    pub thresholds: LodThresholds,
    /// Frame rate the adaptive mode defends.
    pub target_fps: f64,
    /// Lower detail by one level while the last frame was over budget.
    pub adaptive_thresholds: bool,
    /// Always lower detail by one level.
    pub performance_mode: bool,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            thresholds: LodThresholds::default(),
            target_fps: 60.0,
            adaptive_thresholds: true,
            performance_mode: false,
        }
    }
}

/// Elements sharing one level, with the attributes shared by all of them.
#[derive(Clone, Debug)]
pub struct LodBatch<'a> {
    /// Members in input order.
    pub members: Vec<&'a RenderElement>,
    /// Shared attributes; size gates are evaluated per member at draw time.
    pub attributes: RenderAttributes,
}

/// Picks detail levels and render attributes.
#[derive(Clone, Debug, Default)]
pub struct LevelOfDetailManager {
    config: LodConfig,
    last_frame_ms: Option<f64>,
}

impl LevelOfDetailManager {
    /// Create a manager.
    pub fn new(config: LodConfig) -> Self {
        Self {
            config,
            last_frame_ms: None,
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &LodConfig {
        &self.config
    }

    /// Current thresholds.
    pub fn thresholds(&self) -> &LodThresholds {
        &self.config.thresholds
    }

    /// Replace the thresholds. Ordering is the caller's responsibility.
    pub fn set_thresholds(&mut self, thresholds: LodThresholds) {
        self.config.thresholds = thresholds;
    }

    /// Force one level less detail everywhere.
    pub fn set_performance_mode(&mut self, on: bool) {
        self.config.performance_mode = on;
    }

    /// Enable or disable budget-driven degradation.
    pub fn set_adaptive_thresholds(&mut self, on: bool) {
        self.config.adaptive_thresholds = on;
    }

    /// Frame budget in milliseconds.
    pub fn frame_budget_ms(&self) -> f64 {
        1000.0 / self.config.target_fps
    }

    /// Record the duration of the most recent frame.
    pub fn observe_frame_time(&mut self, ms: f64) {
        self.last_frame_ms = Some(ms);
    }

    /// Most recently observed frame time.
    pub fn last_frame_ms(&self) -> Option<f64> {
        self.last_frame_ms
    }

    /// Whether levels are currently lowered by one step.
    pub fn is_degraded(&self) -> bool {
        self.config.performance_mode
            || (self.config.adaptive_thresholds
                && self
                    .last_frame_ms
                    .is_some_and(|ms| ms > self.frame_budget_ms()))
    }

    /// Level for an element of `width`×`height` scene units at `scale`.
    pub fn level_for(&self, scale: f64, width: f64, height: f64) -> LodLevel {
        let by_scale = self.config.thresholds.level_for(scale);
        let level = by_scale.min(LodLevel::cap_for_pixels(width.min(height) * scale));
        if self.is_degraded() {
            level.lower()
        } else {
            level
        }
    }

    /// Level and attributes for an element of `width`×`height` scene units at `scale`.
    pub fn calculate_lod(&self, scale: f64, width: f64, height: f64) -> RenderAttributes {
        let level = self.level_for(scale, width, height);
        RenderAttributes::shared_for(level, scale).gated(width, height, scale)
    }

    /// Group elements by level. Hidden elements are included under [`LodLevel::Hidden`].
    pub fn batch_by_lod<'a>(
        &self,
        elements: impl IntoIterator<Item = &'a RenderElement>,
        scale: f64,
    ) -> BTreeMap<LodLevel, LodBatch<'a>> {
        let mut out: BTreeMap<LodLevel, LodBatch<'a>> = BTreeMap::new();
        for e in elements {
            let level = self.level_for(scale, e.rect.width(), e.rect.height());
            out.entry(level)
                .or_insert_with(|| LodBatch {
                    members: Vec::new(),
                    attributes: RenderAttributes::shared_for(level, scale),
                })
                .members
                .push(e);
        }
        out
    }
}
