pub mod dispatcher;
pub mod events;

// Re-export the essential types
pub use dispatcher::GestureDispatcher;
pub use events::{GestureEvent, GestureResult};
