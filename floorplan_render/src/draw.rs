// Copyright 2025 the Floorplan Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The seam between this crate and the host's painter.
//!
//! Renderers in this crate never paint pixels. They drive a [`DrawContext`], which the
//! host implements on top of its canvas or scene-graph library. [`DisplayList`] is the
//! recording implementation: it stores [`DrawCommand`]s that can be replayed later, and
//! [`DisplayList::flatten`] resolves the state machine into one [`Primitive`] per painted
//! shape or text run, which is what two command streams are compared by.

use kurbo::{Point, Rect};

use crate::element::Rgba;

/// Horizontal anchor for [`DrawContext::fill_text`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextAlign {
    /// Anchor at the left edge of the text.
    #[default]
    Left,
    /// Anchor at the center of the text.
    Center,
    /// Anchor at the right edge of the text.
    Right,
}

/// A canvas-like immediate-mode drawing surface.
///
/// State setters affect every later `fill`, `stroke` and `fill_text` until the next
/// `restore` of an enclosing `save`. `fill` and `stroke` paint every shape added since the
/// last `begin_path`.
pub trait DrawContext {
    /// Push the current state.
    fn save(&mut self);
    /// Pop to the last saved state.
    fn restore(&mut self);
    /// Fill colour for shapes and text.
    fn set_fill(&mut self, color: Rgba);
    /// Outline colour and width in scene units.
    fn set_stroke(&mut self, color: Rgba, width: f64);
    /// Global alpha multiplier.
    fn set_opacity(&mut self, opacity: f64);
    /// Shadow blur radius in scene units; `0.0` disables the shadow.
    fn set_shadow(&mut self, blur: f64);
    /// Font size in scene units.
    fn set_font(&mut self, size: f64);
    /// Text anchor.
    fn set_text_align(&mut self, align: TextAlign);
    /// Start a new path.
    fn begin_path(&mut self);
    /// Add a (rounded) rectangle to the path.
    fn rect(&mut self, rect: Rect, radius: f64);
    /// Add a circle to the path.
    fn circle(&mut self, center: Point, radius: f64);
    /// Fill the current path.
    fn fill(&mut self);
    /// Outline the current path.
    fn stroke(&mut self);
    /// Draw a single line of text.
    fn fill_text(&mut self, text: &str, at: Point);
}

/// One recorded call on a [`DisplayList`].
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    /// See [`DrawContext::save`].
    Save,
    /// See [`DrawContext::restore`].
    Restore,
    /// See [`DrawContext::set_fill`].
    SetFill(Rgba),
    /// See [`DrawContext::set_stroke`].
    SetStroke {
        /// Outline colour.
        color: Rgba,
        /// Outline width.
        width: f64,
    },
    /// See [`DrawContext::set_opacity`].
    SetOpacity(f64),
    /// See [`DrawContext::set_shadow`].
    SetShadow(f64),
    /// See [`DrawContext::set_font`].
    SetFont(f64),
    /// See [`DrawContext::set_text_align`].
    SetTextAlign(TextAlign),
    /// See [`DrawContext::begin_path`].
    BeginPath,
    /// See [`DrawContext::rect`].
    Rect {
        /// Rectangle.
        rect: Rect,
        /// Corner radius.
        radius: f64,
    },
    /// See [`DrawContext::circle`].
    Circle {
        /// Center.
        center: Point,
        /// Radius.
        radius: f64,
    },
    /// See [`DrawContext::fill`].
    Fill,
    /// See [`DrawContext::stroke`].
    Stroke,
    /// See [`DrawContext::fill_text`].
    FillText {
        /// Text run.
        text: String,
        /// Anchor point.
        at: Point,
    },
}

/// A path shape as painted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    /// Rounded rectangle.
    Rect {
        /// Rectangle.
        rect: Rect,
        /// Corner radius.
        radius: f64,
    },
    /// Circle.
    Circle {
        /// Center.
        center: Point,
        /// Radius.
        radius: f64,
    },
}

/// A single painted item with its effective state resolved.
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    /// A filled shape.
    Fill {
        /// Geometry.
        shape: Shape,
        /// Fill colour.
        color: Rgba,
        /// Effective opacity.
        opacity: f64,
        /// Shadow blur.
        shadow: f64,
    },
    /// An outlined shape.
    Stroke {
        /// Geometry.
        shape: Shape,
        /// Outline colour.
        color: Rgba,
        /// Outline width.
        width: f64,
        /// Effective opacity.
        opacity: f64,
    },
    /// A text run.
    Text {
        /// Text.
        text: String,
        /// Anchor point.
        at: Point,
        /// Font size.
        size: f64,
        /// Anchor mode.
        align: TextAlign,
        /// Text colour.
        color: Rgba,
        /// Effective opacity.
        opacity: f64,
    },
}

#[derive(Clone, Debug)]
struct PaintState {
    fill: Rgba,
    stroke: Rgba,
    stroke_width: f64,
    opacity: f64,
    shadow: f64,
    font_size: f64,
    align: TextAlign,
}

impl Default for PaintState {
    fn default() -> Self {
        Self {
            fill: Rgba::BLACK,
            stroke: Rgba::BLACK,
            stroke_width: 1.0,
            opacity: 1.0,
            shadow: 0.0,
            font_size: 10.0,
            align: TextAlign::Left,
        }
    }
}

/// Recording [`DrawContext`].
#[derive(Clone, Debug, Default)]
pub struct DisplayList {
    commands: Vec<DrawCommand>,
}

impl DisplayList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded commands in call order.
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Number of recorded commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Forget every recorded command, keeping the allocation.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Number of painting calls (`fill`, `stroke`, `fill_text`).
    pub fn paint_calls(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    DrawCommand::Fill | DrawCommand::Stroke | DrawCommand::FillText { .. }
                )
            })
            .count()
    }

    /// Replay the recorded commands onto another context.
    pub fn replay(&self, ctx: &mut dyn DrawContext) {
        for cmd in &self.commands {
            match cmd {
                DrawCommand::Save => ctx.save(),
                DrawCommand::Restore => ctx.restore(),
                DrawCommand::SetFill(c) => ctx.set_fill(*c),
                DrawCommand::SetStroke { color, width } => ctx.set_stroke(*color, *width),
                DrawCommand::SetOpacity(o) => ctx.set_opacity(*o),
                DrawCommand::SetShadow(b) => ctx.set_shadow(*b),
                DrawCommand::SetFont(s) => ctx.set_font(*s),
                DrawCommand::SetTextAlign(a) => ctx.set_text_align(*a),
                DrawCommand::BeginPath => ctx.begin_path(),
                DrawCommand::Rect { rect, radius } => ctx.rect(*rect, *radius),
                DrawCommand::Circle { center, radius } => ctx.circle(*center, *radius),
                DrawCommand::Fill => ctx.fill(),
                DrawCommand::Stroke => ctx.stroke(),
                DrawCommand::FillText { text, at } => ctx.fill_text(text, *at),
            }
        }
    }

    /// Resolve state and paths into painted primitives, in paint order.
    pub fn flatten(&self) -> Vec<Primitive> {
        let mut out = Vec::new();
        let mut state = PaintState::default();
        let mut stack: Vec<PaintState> = Vec::new();
        let mut path: Vec<Shape> = Vec::new();
        for cmd in &self.commands {
            match cmd {
                DrawCommand::Save => stack.push(state.clone()),
                DrawCommand::Restore => {
                    if let Some(s) = stack.pop() {
                        state = s;
                    }
                }
                DrawCommand::SetFill(c) => state.fill = *c,
                DrawCommand::SetStroke { color, width } => {
                    state.stroke = *color;
                    state.stroke_width = *width;
                }
                DrawCommand::SetOpacity(o) => state.opacity = *o,
                DrawCommand::SetShadow(b) => state.shadow = *b,
                DrawCommand::SetFont(s) => state.font_size = *s,
                DrawCommand::SetTextAlign(a) => state.align = *a,
                DrawCommand::BeginPath => path.clear(),
                DrawCommand::Rect { rect, radius } => path.push(Shape::Rect {
                    rect: *rect,
                    radius: *radius,
                }),
                DrawCommand::Circle { center, radius } => path.push(Shape::Circle {
                    center: *center,
                    radius: *radius,
                }),
                DrawCommand::Fill => out.extend(path.iter().map(|shape| Primitive::Fill {
                    shape: *shape,
                    color: state.fill,
                    opacity: state.opacity,
                    shadow: state.shadow,
                })),
                DrawCommand::Stroke => out.extend(path.iter().map(|shape| Primitive::Stroke {
                    shape: *shape,
                    color: state.stroke,
                    width: state.stroke_width,
                    opacity: state.opacity,
                })),
                DrawCommand::FillText { text, at } => out.push(Primitive::Text {
                    text: text.clone(),
                    at: *at,
                    size: state.font_size,
                    align: state.align,
                    color: state.fill,
                    opacity: state.opacity,
                }),
            }
        }
        out
    }
}

impl DrawContext for DisplayList {
    fn save(&mut self) {
        self.commands.push(DrawCommand::Save);
    }

    fn restore(&mut self) {
        self.commands.push(DrawCommand::Restore);
    }

    fn set_fill(&mut self, color: Rgba) {
        self.commands.push(DrawCommand::SetFill(color));
    }

    fn set_stroke(&mut self, color: Rgba, width: f64) {
        self.commands.push(DrawCommand::SetStroke { color, width });
    }

    fn set_opacity(&mut self, opacity: f64) {
        self.commands.push(DrawCommand::SetOpacity(opacity));
    }

    fn set_shadow(&mut self, blur: f64) {
        self.commands.push(DrawCommand::SetShadow(blur));
    }

    fn set_font(&mut self, size: f64) {
        self.commands.push(DrawCommand::SetFont(size));
    }

    fn set_text_align(&mut self, align: TextAlign) {
        self.commands.push(DrawCommand::SetTextAlign(align));
    }

    fn begin_path(&mut self) {
        self.commands.push(DrawCommand::BeginPath);
    }

    fn rect(&mut self, rect: Rect, radius: f64) {
        self.commands.push(DrawCommand::Rect { rect, radius });
    }

    fn circle(&mut self, center: Point, radius: f64) {
        self.commands.push(DrawCommand::Circle { center, radius });
    }

    fn fill(&mut self) {
        self.commands.push(DrawCommand::Fill);
    }

    fn stroke(&mut self) {
        self.commands.push(DrawCommand::Stroke);
    }

    fn fill_text(&mut self, text: &str, at: Point) {
        self.commands.push(DrawCommand::FillText {
            text: text.to_owned(),
            at,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_resolves_state_per_shape() {
        let mut dl = DisplayList::new();
        dl.set_fill(Rgba::WHITE);
        dl.set_stroke(Rgba::BLACK, 2.0);
        dl.begin_path();
        dl.rect(Rect::new(0.0, 0.0, 10.0, 10.0), 0.0);
        dl.rect(Rect::new(20.0, 0.0, 30.0, 10.0), 0.0);
        dl.fill();
        dl.stroke();
        let prims = dl.flatten();
        assert_eq!(prims.len(), 4);
        assert!(matches!(prims[0], Primitive::Fill { color, .. } if color == Rgba::WHITE));
        assert!(matches!(prims[3], Primitive::Stroke { width, .. } if width == 2.0));
        assert_eq!(dl.paint_calls(), 2);
    }

    #[test]
    fn restore_pops_state() {
        let mut dl = DisplayList::new();
        dl.set_opacity(1.0);
        dl.save();
        dl.set_opacity(0.5);
        dl.fill_text("a", Point::ZERO);
        dl.restore();
        dl.fill_text("b", Point::ZERO);
        let prims = dl.flatten();
        assert!(matches!(&prims[0], Primitive::Text { opacity, .. } if *opacity == 0.5));
        assert!(matches!(&prims[1], Primitive::Text { opacity, .. } if *opacity == 1.0));
    }

    #[test]
    fn replay_reproduces_commands() {
        let mut a = DisplayList::new();
        a.begin_path();
        a.circle(Point::new(1.0, 1.0), 2.0);
        a.fill();
        let mut b = DisplayList::new();
        a.replay(&mut b);
        assert_eq!(a.commands(), b.commands());
    }
}
