pub mod coordinator;
pub mod mediator;
pub mod scale;
pub mod scroll;

// Re-exports for convenience
pub use coordinator::{FrameCoordinator, FrameDescriptor};
pub use mediator::FrameMediator;
pub use scale::ScaleController;
pub use scroll::{OverscrollHandler, ScrollController};
