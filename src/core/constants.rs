//! Engine-wide magic numbers.
//! Keeping them in a single place makes it easier to tweak tuning values.

/// Longest allowed tile edge in pixels, bounding single-bitmap memory.
pub const MAX_TILE_EDGE_PX: f64 = 2500.0;

/// Hard ceiling on the committed zoom scale.
pub const MAX_SCALE_FACTOR: f64 = 5.0;

/// Fling velocity halves every this many seconds.
pub const DEFAULT_FLING_HALF_LIFE: f64 = 0.3;

/// Flings slower than this (px/s) stop.
pub const DEFAULT_FLING_MIN_VELOCITY: f64 = 50.0;
