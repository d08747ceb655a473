pub mod controller;
pub mod matrix;
pub mod state;

// Re-exports for convenience
pub use controller::{BitmapStateController, StateEvent};
pub use matrix::{BitGrid, TileGrid, TileSlot};
pub use state::BitmapState;
