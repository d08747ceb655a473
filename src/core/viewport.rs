use crate::core::constants::MAX_TILE_EDGE_PX;
use crate::core::geometry::{Point, Rect, Size};
use serde::{Deserialize, Serialize};

/// The current view of one frame: a translation + uniform scale over a
/// fixed logical content size, plus the on-screen viewport dimensions.
///
/// Translation lives in scaled-content pixels and is re-clamped after every
/// mutation so the viewport rect never leaves `[0, content_size * scale]`
/// on either axis. Scale stays at the 0.0 sentinel until the first layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// On-screen viewport size in pixels
    size: Size,
    /// Translation of the view within the scaled content
    trans: Point,
    /// Uniform scale factor; 0.0 means "not yet sized"
    scale: f64,
    /// Logical (unscaled) size of the captured content
    content_size: Size,
    /// For sub-frames: the portion actually shown, assigned by the parent,
    /// relative to this frame's own origin
    visible_region: Rect,
    /// Fixed tile size propagated down a frame tree
    tile_size_override: Option<Size>,
}

impl Viewport {
    /// Creates a viewport over the given logical content size
    pub fn new(content_size: Size) -> Self {
        Self {
            size: Size::default(),
            trans: Point::default(),
            scale: 0.0,
            content_size,
            visible_region: Rect::zero(),
            tile_size_override: None,
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn trans(&self) -> Point {
        self.trans
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn content_size(&self) -> Size {
        self.content_size
    }

    /// The content size in current-scale pixels
    pub fn scaled_content_size(&self) -> Size {
        self.content_size.scaled(self.scale)
    }

    /// Sets the on-screen viewport size
    pub fn set_size(&mut self, width: f64, height: f64) {
        self.size = Size::new(width, height);
        self.clamp_trans();
    }

    /// Sets the translation directly
    pub fn set_trans(&mut self, x: f64, y: f64) {
        self.trans = Point::new(x, y);
        self.clamp_trans();
    }

    /// Sets the scale factor without adjusting the translation
    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
        self.clamp_trans();
    }

    /// Shifts the view by the given delta, clamped to the content.
    /// Returns the delta that was actually applied.
    pub fn offset(&mut self, dx: f64, dy: f64) -> Point {
        let before = self.trans;
        self.trans = Point::new(self.trans.x + dx, self.trans.y + dy);
        self.clamp_trans();
        self.trans.subtract(&before)
    }

    /// Focal-point-preserving post-scale: the content under `focal` (in
    /// viewport coordinates) stays put while everything grows or shrinks
    /// around it.
    pub fn scale_about(&mut self, factor: f64, focal: Point) {
        self.scale *= factor;
        self.trans = Point::new(
            (self.trans.x + focal.x) * factor - focal.x,
            (self.trans.y + focal.y) * factor - focal.y,
        );
        self.clamp_trans();
    }

    /// The viewport rect in scaled-content coordinates
    pub fn as_rect(&self) -> Rect {
        Rect::from_origin_size(self.trans, self.size)
    }

    /// What is actually shown of this frame.
    ///
    /// A top-level frame shows its full viewport rect. A sub-frame shows
    /// the parent-assigned visible region offset by its own translation:
    /// the parent decides how much of the frame is on screen, the frame
    /// itself decides which part of its content sits under that window.
    pub fn visible_viewport(&self, is_subframe: bool) -> Rect {
        if !is_subframe {
            return self.as_rect();
        }
        self.visible_region.translated(&self.trans)
    }

    /// Parent-assigned visible region, relative to this frame's origin
    pub fn set_visible_region(&mut self, left: f64, top: f64, right: f64, bottom: f64) {
        self.visible_region = Rect::from_coords(left, top, right, bottom);
    }

    pub fn visible_region(&self) -> Rect {
        self.visible_region
    }

    /// Tile dimensions for this viewport: one tile spans the viewport
    /// width and half its height, capped so no edge exceeds
    /// [`MAX_TILE_EDGE_PX`].
    pub fn tile_size(&self) -> Size {
        if let Some(size) = self.tile_size_override {
            return size;
        }
        Size::new(
            self.size.width.min(MAX_TILE_EDGE_PX),
            (self.size.height / 2.0).min(MAX_TILE_EDGE_PX),
        )
    }

    /// Pins the tile size, overriding the viewport-derived default. Used
    /// to keep one tile size across a frame tree.
    pub fn set_tile_size_override(&mut self, size: Option<Size>) {
        self.tile_size_override = size;
    }

    fn clamp_trans(&mut self) {
        let scaled = self.scaled_content_size();
        let max_x = (scaled.width - self.size.width).max(0.0);
        let max_y = (scaled.height - self.size.height).max(0.0);
        self.trans = Point::new(self.trans.x.clamp(0.0, max_x), self.trans.y.clamp(0.0, max_y));
    }
}
