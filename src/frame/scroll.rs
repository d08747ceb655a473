//! Scrolling, fling physics, and overscroll-to-refresh.

use crate::core::geometry::{Point, Rect};
use crate::core::viewport::Viewport;
use instant::Instant;

/// Cooperative handoff target for pulling past the top edge.
///
/// `start` is asked before a pull begins and may decline; `pull`
/// accumulates downward drag; `release` fires the refresh on finger-up;
/// `reset` abandons a pull that scrolled back to neutral.
pub trait OverscrollHandler: Send {
    fn start(&mut self) -> bool;
    fn pull(&mut self, amount: f64);
    fn release(&mut self);
    fn reset(&mut self);
}

/// An active fling: exponentially decaying velocity, integrated each poll
#[derive(Debug, Clone)]
struct Fling {
    /// Translation velocity in px/s (already negated from finger velocity)
    velocity: Point,
    last_tick: Instant,
}

/// Translates scroll and fling gestures into clamped viewport offsets
pub struct ScrollController {
    fling: Option<Fling>,
    overscroll: Option<Box<dyn OverscrollHandler>>,
    overscroll_active: bool,
    overscroll_total: f64,
    fling_half_life: f64,
    fling_min_velocity: f64,
}

impl ScrollController {
    pub fn new(fling_half_life: f64, fling_min_velocity: f64) -> Self {
        Self {
            fling: None,
            overscroll: None,
            overscroll_active: false,
            overscroll_total: 0.0,
            fling_half_life,
            fling_min_velocity,
        }
    }

    pub fn set_overscroll_handler(&mut self, handler: Box<dyn OverscrollHandler>) {
        self.overscroll = Some(handler);
    }

    /// Applies one scroll step. Returns whether the viewport moved (or the
    /// gesture was taken by the overscroll handler); a false return lets
    /// the caller forward the gesture to a parent frame.
    pub fn scroll_by(&mut self, viewport: &mut Viewport, dx: f64, dy: f64) -> bool {
        self.fling = None;
        if self.handle_overscroll(viewport, dy) {
            return true;
        }
        Self::scroll_by_internal(viewport, dx, dy)
    }

    fn scroll_by_internal(viewport: &mut Viewport, dx: f64, dy: f64) -> bool {
        let applied = viewport.offset(dx, dy);
        applied.x != 0.0 || applied.y != 0.0
    }

    /// Seeds a fling from gesture velocity (finger direction, px/s).
    /// Returns whether an animation started.
    pub fn on_fling(&mut self, velocity: Point, now: Instant) -> bool {
        self.end_overscroll();
        let trans_velocity = velocity.multiply(-1.0);
        if trans_velocity.magnitude() < self.fling_min_velocity {
            return false;
        }
        self.fling = Some(Fling {
            velocity: trans_velocity,
            last_tick: now,
        });
        true
    }

    pub fn is_flinging(&self) -> bool {
        self.fling.is_some()
    }

    /// One fling poll: decay the velocity, integrate, scroll. Returns
    /// whether the viewport moved this step.
    pub fn tick(&mut self, viewport: &mut Viewport, now: Instant) -> bool {
        let Some(fling) = self.fling.as_mut() else {
            return false;
        };
        let dt = now.saturating_duration_since(fling.last_tick).as_secs_f64();
        fling.last_tick = now;

        let decay = 0.5_f64.powf(dt / self.fling_half_life);
        fling.velocity = fling.velocity.multiply(decay);
        let step = fling.velocity.multiply(dt);

        let moved = Self::scroll_by_internal(viewport, step.x, step.y);
        if fling.velocity.magnitude() < self.fling_min_velocity || (!moved && dt > 0.0) {
            self.fling = None;
        }
        moved
    }

    /// Finger up without a fling: settle any overscroll pull
    pub fn on_release(&mut self) -> bool {
        if !self.overscroll_active {
            return false;
        }
        self.end_overscroll();
        true
    }

    /// Minimal scroll bringing `target` (unscaled content coordinates)
    /// into view, aligning the nearer edge. Used by accessibility focus
    /// movement. Returns whether the viewport moved.
    pub fn scroll_to_reveal(&mut self, viewport: &mut Viewport, target: &Rect) -> bool {
        let scaled = target.scaled(viewport.scale());
        let view = viewport.as_rect();

        let dx = if scaled.min.x < view.min.x {
            scaled.min.x - view.min.x
        } else if scaled.max.x > view.max.x {
            scaled.max.x - view.max.x
        } else {
            0.0
        };
        let dy = if scaled.min.y < view.min.y {
            scaled.min.y - view.min.y
        } else if scaled.max.y > view.max.y {
            scaled.max.y - view.max.y
        } else {
            0.0
        };

        if dx == 0.0 && dy == 0.0 {
            return false;
        }
        Self::scroll_by_internal(viewport, dx, dy)
    }

    fn handle_overscroll(&mut self, viewport: &Viewport, dy: f64) -> bool {
        let Some(handler) = self.overscroll.as_mut() else {
            return false;
        };
        if !self.overscroll_active {
            // A pull begins only on a strictly upward drag at the top edge
            if dy >= 0.0 || viewport.trans().y > 0.0 {
                return false;
            }
            if !handler.start() {
                return false;
            }
            self.overscroll_active = true;
            self.overscroll_total = 0.0;
        }

        self.overscroll_total += -dy;
        if self.overscroll_total <= 0.0 {
            handler.reset();
            self.overscroll_active = false;
            return false;
        }
        handler.pull(-dy);
        true
    }

    fn end_overscroll(&mut self) {
        if !self.overscroll_active {
            return;
        }
        if let Some(handler) = self.overscroll.as_mut() {
            handler.release();
        }
        self.overscroll_active = false;
    }
}
