//! Pinch-zoom state machine.
//!
//! During a pinch, the committed tile scale stays put; the gesture
//! accumulates an uncommitted scale on the viewport and a lightweight
//! affine matrix over the already-loaded bitmaps for immediate feedback.
//! Only `finish` commits the scale and triggers re-tiling.

use crate::core::geometry::{identity_matrix, post_scale, Matrix, Point};
use crate::core::viewport::Viewport;

/// Accumulates one pinch gesture against a viewport
pub struct ScaleController {
    /// The accumulated gesture scale; 0.0 while idle
    uncommitted: f64,
    /// Visual transform over the committed-scale bitmaps
    gesture_matrix: Matrix,
    max_scale: f64,
}

impl ScaleController {
    pub fn new(max_scale: f64) -> Self {
        Self {
            uncommitted: 0.0,
            gesture_matrix: identity_matrix(),
            max_scale,
        }
    }

    pub fn is_scaling(&self) -> bool {
        self.uncommitted != 0.0
    }

    pub fn gesture_matrix(&self) -> Matrix {
        self.gesture_matrix
    }

    /// Explicitly arms the gesture from the viewport's committed scale
    pub fn begin(&mut self, committed_scale: f64) {
        if self.uncommitted == 0.0 {
            self.uncommitted = committed_scale;
            self.gesture_matrix = identity_matrix();
        }
    }

    /// Applies one pinch step. The accumulated scale saturates inside
    /// `[min_scale, max_scale]`; the factor actually applied is corrected
    /// to `clamped / previous` so the gesture lands exactly on the bound.
    /// At saturation the correction is 1.0 and nothing moves.
    ///
    /// Returns the corrected factor.
    pub fn scale_by(
        &mut self,
        viewport: &mut Viewport,
        factor: f64,
        focal: Point,
        min_scale: f64,
    ) -> f64 {
        if self.uncommitted == 0.0 {
            self.begin(viewport.scale());
        }
        if self.uncommitted == 0.0 {
            // Not laid out yet; there is no scale to accumulate from
            return 1.0;
        }
        let previous = self.uncommitted;
        let clamped = (previous * factor).clamp(min_scale, self.max_scale);
        let applied = clamped / previous;
        self.uncommitted = clamped;

        if (applied - 1.0).abs() < f64::EPSILON {
            return 1.0;
        }

        viewport.scale_about(applied, focal);
        self.gesture_matrix = post_scale(&self.gesture_matrix, applied, focal);
        applied
    }

    /// Ends the gesture, returning the scale to commit. The gesture
    /// matrix stays in place until the rescaled state swaps in.
    pub fn finish(&mut self, viewport: &Viewport) -> f64 {
        let committed = if self.uncommitted != 0.0 {
            self.uncommitted
        } else {
            viewport.scale()
        };
        self.uncommitted = 0.0;
        committed
    }

    /// Drops the gesture matrix once re-tiled bitmaps replace the
    /// stretched ones
    pub fn reset_matrix(&mut self) {
        self.gesture_matrix = identity_matrix();
    }
}
