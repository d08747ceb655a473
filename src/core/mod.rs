pub mod config;
pub mod constants;
pub mod geometry;
pub mod viewport;

// Re-exports for convenience
pub use config::PlayerConfig;
pub use geometry::{Matrix, Point, Rect, Size};
pub use viewport::Viewport;
