//! The composition root.
//!
//! A [`FrameCoordinator`] wires a whole captured page together: it builds
//! the mediator tree from a [`FrameDescriptor`], pumps compositor
//! responses back into it, drives fling animation, and exposes the render
//! models the embedder draws from.

use crate::compositor::{BitmapResponse, CompositorHandle, FrameId, MemoryPressure};
use crate::core::config::PlayerConfig;
use crate::core::geometry::{Rect, Size};
use crate::frame::mediator::FrameMediator;
use crate::frame::scroll::OverscrollHandler;
use crate::input::events::{GestureEvent, GestureResult};
use crate::render::FrameViewModel;
use crate::{PlayerError, Result};
use crossbeam_channel::{Receiver, TryRecvError};
use instant::Instant;
use serde::{Deserialize, Serialize};

/// The captured page's frame tree as data: one entry per frame, children
/// positioned by their clip rect in the parent's unscaled coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDescriptor {
    pub frame: FrameId,
    pub content_size: Size,
    #[serde(default)]
    pub subframes: Vec<(Rect, FrameDescriptor)>,
}

impl FrameDescriptor {
    pub fn new(frame: FrameId, content_size: Size) -> Self {
        Self {
            frame,
            content_size,
            subframes: Vec::new(),
        }
    }

    pub fn with_subframe(mut self, clip: Rect, child: FrameDescriptor) -> Self {
        self.subframes.push((clip, child));
        self
    }
}

/// Owns a player instance: the frame tree plus its compositor wiring
pub struct FrameCoordinator {
    root: FrameMediator,
    compositor: CompositorHandle,
    responses: Receiver<BitmapResponse>,
}

impl FrameCoordinator {
    pub fn new(
        descriptor: &FrameDescriptor,
        compositor: CompositorHandle,
        responses: Receiver<BitmapResponse>,
        config: &PlayerConfig,
    ) -> Self {
        let root = Self::build_tree(descriptor, &compositor, config, false);
        Self {
            root,
            compositor,
            responses,
        }
    }

    fn build_tree(
        descriptor: &FrameDescriptor,
        compositor: &CompositorHandle,
        config: &PlayerConfig,
        is_subframe: bool,
    ) -> FrameMediator {
        let mut mediator = FrameMediator::new(
            descriptor.frame,
            descriptor.content_size,
            config,
            compositor.clone(),
            is_subframe,
        );
        for (clip, child) in &descriptor.subframes {
            let child_mediator = Self::build_tree(child, compositor, config, true);
            mediator.add_subframe(*clip, child_mediator);
        }
        mediator
    }

    /// Lays out (or re-lays-out) the root view
    pub fn set_layout_size(&mut self, width: f64, height: f64) {
        self.root.set_layout_size(width, height);
    }

    /// Feeds one gesture into the frame tree
    pub fn handle_gesture(&mut self, event: &GestureEvent) -> GestureResult {
        self.root.handle_gesture(event, Instant::now())
    }

    /// One frame tick: drains compositor responses into the tree, then
    /// advances fling animation. Whether anything needs redrawing is
    /// reflected in the models' dirty flags.
    pub fn tick(&mut self, now: Instant) -> Result<()> {
        loop {
            match self.responses.try_recv() {
                Ok(response) => {
                    if !self.root.route_response(response) {
                        log::debug!("response for a frame not in this tree");
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Err(PlayerError::ChannelDisconnected),
            }
        }
        self.root.tick(now);
        Ok(())
    }

    /// The system is under memory pressure: shed speculative tiles
    pub fn on_memory_pressure(&mut self, level: MemoryPressure) {
        self.root.on_memory_pressure(level);
    }

    pub fn set_accept_input(&mut self, accept: bool) {
        self.root.set_accept_input(accept);
    }

    pub fn set_touch_exploration(&mut self, active: bool) {
        self.root.set_touch_exploration(active);
    }

    /// Installs the pull-to-refresh handoff on the root frame
    pub fn set_overscroll_handler(&mut self, handler: Box<dyn OverscrollHandler>) {
        self.root.set_overscroll_handler(handler);
    }

    /// Accessibility scroll-into-view on the root frame; `target` is in
    /// unscaled content coordinates
    pub fn scroll_to_reveal(&mut self, target: &Rect) -> bool {
        self.root.scroll_to_reveal(target)
    }

    pub fn root_model(&self) -> &FrameViewModel {
        self.root.model()
    }

    pub fn root_model_mut(&mut self) -> &mut FrameViewModel {
        self.root.model_mut()
    }

    /// Render model for any frame in the tree
    pub fn frame_model(&self, frame: FrameId) -> Result<&FrameViewModel> {
        self.root
            .find_model(frame)
            .ok_or(PlayerError::UnknownFrame(frame))
    }

    pub fn frame_model_mut(&mut self, frame: FrameId) -> Result<&mut FrameViewModel> {
        self.root
            .find_model_mut(frame)
            .ok_or(PlayerError::UnknownFrame(frame))
    }

    pub fn root(&self) -> &FrameMediator {
        &self.root
    }

    /// Tears the player down: all compositor work is cancelled, then the
    /// tree is destroyed parent-first.
    pub fn destroy(&mut self) {
        if let Ok(mut compositor) = self.compositor.lock() {
            compositor.cancel_all();
        }
        self.root.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::test_support::RecordingCompositor;
    use crate::compositor::response_channel;
    use std::sync::{Arc, Mutex};

    fn setup() -> (FrameCoordinator, Arc<Mutex<RecordingCompositor>>) {
        let (tx, rx) = response_channel();
        let compositor = Arc::new(Mutex::new(RecordingCompositor::new(tx)));
        let handle: CompositorHandle = compositor.clone();
        let descriptor = FrameDescriptor::new(FrameId(1), Size::new(1000.0, 4000.0))
            .with_subframe(
                Rect::from_coords(100.0, 200.0, 900.0, 600.0),
                FrameDescriptor::new(FrameId(2), Size::new(800.0, 2000.0)),
            );
        let coordinator =
            FrameCoordinator::new(&descriptor, handle, rx, &PlayerConfig::default());
        (coordinator, compositor)
    }

    #[test]
    fn test_builds_tree_with_models() {
        let (coordinator, _compositor) = setup();
        assert!(coordinator.frame_model(FrameId(1)).is_ok());
        assert!(coordinator.frame_model(FrameId(2)).is_ok());
        assert!(matches!(
            coordinator.frame_model(FrameId(9)),
            Err(PlayerError::UnknownFrame(FrameId(9)))
        ));
    }

    #[test]
    fn test_tick_pumps_responses_and_marks_dirty() {
        let (mut coordinator, compositor) = setup();
        coordinator.set_layout_size(500.0, 500.0);
        coordinator.root_model_mut().take_dirty();

        let ids = compositor.lock().unwrap().pending_ids();
        let root_id = ids
            .into_iter()
            .find(|id| {
                compositor.lock().unwrap().in_flight[id].frame == FrameId(1)
            })
            .unwrap();
        compositor.lock().unwrap().complete(root_id);

        coordinator.tick(Instant::now()).unwrap();
        assert!(coordinator.root_model_mut().take_dirty());
        assert!(coordinator
            .root_model()
            .tile_matrix
            .iter()
            .flatten()
            .count()
            > 0);
    }

    #[test]
    fn test_tick_reports_disconnection() {
        // A receiver whose sender is gone before the first pump
        let (tx, rx) = response_channel();
        drop(tx);

        let (live_tx, _live_rx) = response_channel();
        let compositor = Arc::new(Mutex::new(RecordingCompositor::new(live_tx)));
        let handle: CompositorHandle = compositor;
        let descriptor = FrameDescriptor::new(FrameId(1), Size::new(100.0, 100.0));
        let mut coordinator =
            FrameCoordinator::new(&descriptor, handle, rx, &PlayerConfig::default());

        assert!(matches!(
            coordinator.tick(Instant::now()),
            Err(PlayerError::ChannelDisconnected)
        ));
    }

    #[test]
    fn test_destroy_cancels_outstanding_work() {
        let (mut coordinator, compositor) = setup();
        coordinator.set_layout_size(500.0, 500.0);
        assert!(!compositor.lock().unwrap().in_flight.is_empty());

        coordinator.destroy();
        assert!(compositor.lock().unwrap().in_flight.is_empty());
        assert!(!coordinator.root_model().visible);
    }

    #[test]
    fn test_descriptor_roundtrips_through_serde() {
        let descriptor = FrameDescriptor::new(FrameId(1), Size::new(1000.0, 4000.0))
            .with_subframe(
                Rect::from_coords(0.0, 0.0, 100.0, 100.0),
                FrameDescriptor::new(FrameId(2), Size::new(100.0, 500.0)),
            );
        let json = serde_json::to_string(&descriptor).unwrap();
        let parsed: FrameDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, descriptor);
    }
}
