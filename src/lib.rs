//! # Framelet
//!
//! A tile-based viewer engine for captured web-page snapshots.
//!
//! The engine sits between a user-driven viewport (pan/zoom) and an
//! asynchronous bitmap compositor: it decides which tiles of the captured
//! page are needed for the current view, requests them, double-buffers tile
//! matrices across rescales, and recursively composes nested sub-frames
//! (iframes) with independent viewports. Rendering itself, gesture
//! detection, and rasterization are the embedder's concern.

pub mod compositor;
pub mod core;
pub mod frame;
pub mod input;
pub mod render;
pub mod tiles;

pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    config::PlayerConfig,
    geometry::{identity_matrix, Matrix, Point, Rect, Size},
    viewport::Viewport,
};

pub use compositor::{
    compositor_handle, response_channel, Bitmap, BitmapCompositor, BitmapRequest, BitmapResponse,
    CompositorError, CompositorHandle, FrameId, MemoryPressure, RequestId,
};

pub use frame::{
    coordinator::{FrameCoordinator, FrameDescriptor},
    mediator::FrameMediator,
    scroll::OverscrollHandler,
};

pub use input::{
    dispatcher::GestureDispatcher,
    events::{GestureEvent, GestureResult},
};

pub use render::{FrameViewModel, SubframeView};

pub use tiles::{controller::BitmapStateController, matrix::TileSlot, state::BitmapState};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Errors that cross the engine's public boundary.
///
/// Tile-level failures never show up here: a failed or stale tile fetch
/// degrades to a blank tile and is logged, not raised.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("unknown frame: {0:?}")]
    UnknownFrame(FrameId),

    #[error("compositor response channel disconnected")]
    ChannelDisconnected,

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Error type alias for convenience
pub type Error = PlayerError;
