//! Per-frame orchestration.
//!
//! A [`FrameMediator`] owns one frame's viewport, its double-buffered tile
//! states, its scroll/scale controllers, its render model, and its child
//! sub-frames. It is the single place where "update visuals" happens:
//! every viewport or scale change funnels through [`FrameMediator::update_visuals`],
//! which recomputes sub-frame geometry, pushes display properties, and
//! issues tile requests.

use crate::compositor::{BitmapResponse, CompositorHandle, FrameId, MemoryPressure};
use crate::core::config::PlayerConfig;
use crate::core::geometry::{identity_matrix, Matrix, Point, Rect, Size};
use crate::core::viewport::Viewport;
use crate::frame::scale::ScaleController;
use crate::frame::scroll::{OverscrollHandler, ScrollController};
use crate::input::dispatcher::GestureDispatcher;
use crate::input::events::{GestureEvent, GestureResult};
use crate::render::{FrameViewModel, SubframeView};
use crate::tiles::controller::{BitmapStateController, StateEvent, StateParams};
use instant::Instant;

/// One child frame: its clip position within the parent (unscaled parent
/// coordinates) and its current on-screen geometry
struct SubFrame {
    clip: Rect,
    scaled_rect: Rect,
    screen_rect: Rect,
    visible: bool,
    mediator: FrameMediator,
}

/// Orchestrates one frame of the captured page
pub struct FrameMediator {
    frame: FrameId,
    viewport: Viewport,
    controller: BitmapStateController,
    scroll: ScrollController,
    scale: ScaleController,
    dispatcher: GestureDispatcher,
    model: FrameViewModel,
    subframes: Vec<SubFrame>,
    compositor: CompositorHandle,
    is_subframe: bool,
    min_scale: f64,
    pressure: MemoryPressure,
    prefetch_enabled: bool,
}

impl FrameMediator {
    pub fn new(
        frame: FrameId,
        content_size: Size,
        config: &PlayerConfig,
        compositor: CompositorHandle,
        is_subframe: bool,
    ) -> Self {
        let mut viewport = Viewport::new(content_size);
        if let Some(size) = config.tile_size_override {
            viewport.set_tile_size_override(Some(size));
        }
        Self {
            frame,
            viewport,
            controller: BitmapStateController::new(),
            scroll: ScrollController::new(config.fling_half_life, config.fling_min_velocity),
            scale: ScaleController::new(config.max_scale_factor),
            dispatcher: GestureDispatcher::new(!is_subframe),
            model: FrameViewModel::new(),
            subframes: Vec::new(),
            compositor,
            is_subframe,
            min_scale: 0.0,
            pressure: MemoryPressure::None,
            prefetch_enabled: config.prefetch_enabled,
        }
    }

    /// Attaches a child frame at `clip` (parent-unscaled coordinates)
    pub fn add_subframe(&mut self, clip: Rect, mediator: FrameMediator) {
        self.subframes.push(SubFrame {
            clip,
            scaled_rect: Rect::zero(),
            screen_rect: Rect::zero(),
            visible: false,
            mediator,
        });
    }

    pub fn frame(&self) -> FrameId {
        self.frame
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn model(&self) -> &FrameViewModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut FrameViewModel {
        &mut self.model
    }

    /// Finds a frame's render model anywhere in this subtree
    pub fn find_model(&self, frame: FrameId) -> Option<&FrameViewModel> {
        if frame == self.frame {
            return Some(&self.model);
        }
        self.subframes
            .iter()
            .find_map(|sub| sub.mediator.find_model(frame))
    }

    pub fn find_model_mut(&mut self, frame: FrameId) -> Option<&mut FrameViewModel> {
        if frame == self.frame {
            return Some(&mut self.model);
        }
        self.subframes
            .iter_mut()
            .find_map(|sub| sub.mediator.find_model_mut(frame))
    }

    /// Lays out the root view. The first layout establishes the fit-width
    /// scale, which is also the zoom floor; later calls are resizes.
    pub fn set_layout_size(&mut self, width: f64, height: f64) {
        if self.viewport.content_size().is_empty() {
            return;
        }
        self.viewport.set_size(width, height);
        let first_layout = self.viewport.scale() == 0.0;
        if first_layout {
            let scale = width / self.viewport.content_size().width;
            self.viewport.set_scale(scale);
            self.min_scale = scale;
        }
        self.update_visuals(first_layout);
        self.push_geometry();
    }

    /// The core refresh pass.
    ///
    /// Bails before first layout; leaves a mid-rescale (locked) state
    /// alone; otherwise recomputes sub-frame geometry, pushes display
    /// properties when the shown state is the active one, and requests
    /// tiles for the visible region.
    pub fn update_visuals(&mut self, scale_updated: bool) {
        if self.viewport.scale() == 0.0 || self.viewport.size().is_empty() {
            return;
        }

        let params = StateParams {
            frame: self.frame,
            content_size: self.viewport.content_size(),
            scale: self.viewport.scale(),
            tile_size: self.viewport.tile_size(),
        };
        let swapped_in = self
            .controller
            .ensure_state(scale_updated, &params, &self.compositor);
        if swapped_in {
            self.push_geometry();
            self.push_matrix();
        }

        if self.controller.active_is_locked() {
            return;
        }

        self.update_subframes();

        if self.controller.active_is_visible() {
            self.push_geometry();
        }

        let rect = self.viewport.visible_viewport(self.is_subframe);
        if rect.is_empty() {
            return;
        }
        let pressure = self.pressure;
        let prefetch = self.prefetch_enabled;
        if let Some(state) = self.controller.active_state_mut() {
            state.request_bitmaps_for_rect(&rect, pressure, prefetch);
        }
    }

    /// Recomputes each child's scaled clip, viewport intersection, and
    /// on-screen rect. Children scrolled out of view are hidden and fully
    /// evicted; visible children get their geometry and their own refresh.
    fn update_subframes(&mut self) {
        let scale = self.viewport.scale();
        let view_rect = self.viewport.as_rect();
        let back_shift = self.viewport.trans().multiply(-1.0);
        let tile_size = self.viewport.tile_size();

        let mut views = Vec::with_capacity(self.subframes.len());
        for sub in &mut self.subframes {
            sub.scaled_rect = sub.clip.scaled(scale);
            match view_rect.intersection(&sub.scaled_rect) {
                Some(shown) => {
                    sub.visible = true;
                    sub.screen_rect = shown.translated(&back_shift);
                    let local = shown.translated(&sub.scaled_rect.min.multiply(-1.0));

                    sub.mediator
                        .viewport
                        .set_tile_size_override(Some(tile_size));
                    sub.mediator
                        .viewport
                        .set_size(sub.scaled_rect.width(), sub.scaled_rect.height());
                    sub.mediator.viewport.set_visible_region(
                        local.min.x,
                        local.min.y,
                        local.max.x,
                        local.max.y,
                    );
                    if sub.mediator.viewport.scale() == 0.0 {
                        sub.mediator.viewport.set_scale(scale);
                    }
                    sub.mediator.model.set_visible(true);
                    sub.mediator.update_visuals(false);
                }
                None => {
                    if sub.visible {
                        sub.visible = false;
                        sub.screen_rect = Rect::zero();
                        sub.mediator.hide();
                    }
                }
            }
            views.push(SubframeView {
                frame: sub.mediator.frame,
                rect: sub.screen_rect,
                visible: sub.visible,
            });
        }
        self.model.set_subframes(views);
    }

    /// This frame left the parent's viewport: zero the visible region,
    /// drop every bitmap, hide the subtree.
    fn hide(&mut self) {
        self.viewport.set_visible_region(0.0, 0.0, 0.0, 0.0);
        self.controller.evict_all();
        self.model.set_visible(false);
        self.push_matrix();
        for sub in &mut self.subframes {
            if sub.visible {
                sub.visible = false;
                sub.screen_rect = Rect::zero();
                sub.mediator.hide();
            }
        }
    }

    /// Routes a gesture through this subtree: the deepest visible child
    /// under the pointer gets it first, an unconsumed gesture falls back
    /// to this frame.
    pub fn handle_gesture(&mut self, event: &GestureEvent, now: Instant) -> GestureResult {
        if !self.dispatcher.accepts(event) {
            return GestureResult::Ignored;
        }

        if let Some(position) = event.position() {
            for i in 0..self.subframes.len() {
                if !self.subframes[i].visible || !self.subframes[i].screen_rect.contains(&position)
                {
                    continue;
                }
                let origin = self.subframes[i].screen_rect.min;
                let translated = event.translated(&origin);
                let result = self.subframes[i].mediator.handle_gesture(&translated, now);
                if result != GestureResult::Ignored {
                    return result;
                }
            }
        } else {
            // ScaleEnd / Release carry no position; every child sees them
            for sub in &mut self.subframes {
                sub.mediator.handle_gesture(event, now);
            }
        }

        self.handle_locally(event, now)
    }

    fn handle_locally(&mut self, event: &GestureEvent, now: Instant) -> GestureResult {
        match *event {
            GestureEvent::Scroll { delta, .. } => {
                if self.scroll.scroll_by(&mut self.viewport, delta.x, delta.y) {
                    self.update_visuals(false);
                    self.push_geometry();
                    GestureResult::Consumed
                } else {
                    GestureResult::Ignored
                }
            }
            GestureEvent::Fling { velocity, .. } => {
                if self.scroll.on_fling(velocity, now) {
                    GestureResult::Consumed
                } else {
                    GestureResult::Ignored
                }
            }
            GestureEvent::ScaleBegin { .. } => {
                self.on_start_scaling();
                self.scale.begin(self.viewport.scale());
                GestureResult::Consumed
            }
            GestureEvent::ScaleBy { factor, focal } => self.handle_scale_by(factor, focal),
            GestureEvent::ScaleEnd => self.handle_scale_end(),
            GestureEvent::Tap { position } | GestureEvent::LongPress { position } => {
                self.handle_click(position)
            }
            GestureEvent::Release => {
                if self.scroll.on_release() {
                    GestureResult::Consumed
                } else {
                    GestureResult::Ignored
                }
            }
        }
    }

    /// A pinch is starting: freeze every shown state in the subtree
    fn on_start_scaling(&mut self) {
        self.controller.on_start_scaling();
        for sub in &mut self.subframes {
            sub.mediator.on_start_scaling();
        }
    }

    fn handle_scale_by(&mut self, factor: f64, focal: Point) -> GestureResult {
        if self.viewport.scale() == 0.0 {
            return GestureResult::Ignored;
        }
        if !self.scale.is_scaling() {
            self.on_start_scaling();
        }
        let applied = self
            .scale
            .scale_by(&mut self.viewport, factor, focal, self.min_scale);
        if applied != 1.0 {
            let matrix = self.scale.gesture_matrix();
            self.model.set_scale_matrix(matrix);
            self.update_subframes();
            self.propagate_child_scale_matrix();
            self.push_geometry();
        }
        GestureResult::Consumed
    }

    /// The sole re-tiling trigger: commit the accumulated scale down the
    /// tree and request a full refresh at the new scale. Visible children
    /// are refreshed explicitly; one whose on-screen size did not change
    /// across the gesture would otherwise never notice.
    fn handle_scale_end(&mut self) -> GestureResult {
        if self.viewport.scale() == 0.0 {
            return GestureResult::Ignored;
        }
        let committed = self.scale.finish(&self.viewport);
        for sub in &mut self.subframes {
            sub.mediator.commit_scale(committed);
        }
        self.update_visuals(true);
        for sub in &mut self.subframes {
            if sub.visible {
                sub.mediator.update_visuals(true);
            }
        }
        GestureResult::Consumed
    }

    fn commit_scale(&mut self, scale: f64) {
        let old = self.viewport.scale();
        if old == 0.0 {
            self.viewport.set_scale(scale);
        } else if old != scale {
            let ratio = scale / old;
            let trans = self.viewport.trans();
            self.viewport.set_scale(scale);
            self.viewport.set_trans(trans.x * ratio, trans.y * ratio);
        }
        for sub in &mut self.subframes {
            sub.mediator.commit_scale(scale);
        }
    }

    /// Mid-gesture, a child's view is repositioned by the parent's
    /// geometry pass, so the residual bitmap transform is the pure
    /// accumulated scale about the child origin.
    fn propagate_child_scale_matrix(&mut self) {
        let ratio = self.scale.gesture_matrix()[0];
        let matrix: Matrix = [ratio, 0.0, 0.0, ratio, 0.0, 0.0];
        for sub in &mut self.subframes {
            if sub.visible {
                sub.mediator.set_scale_matrix_recursive(matrix);
            }
        }
    }

    fn set_scale_matrix_recursive(&mut self, matrix: Matrix) {
        self.model.set_scale_matrix(matrix);
        for sub in &mut self.subframes {
            if sub.visible {
                sub.mediator.set_scale_matrix_recursive(matrix);
            }
        }
    }

    fn handle_click(&mut self, position: Point) -> GestureResult {
        let scale = self.viewport.scale();
        if scale == 0.0 {
            return GestureResult::Ignored;
        }
        let content = self.viewport.trans().add(&position);
        let link = self
            .compositor
            .lock()
            .ok()
            .and_then(|mut compositor| {
                compositor.click(self.frame, content.x / scale, content.y / scale)
            });
        match link {
            Some(url) => GestureResult::LinkOpened(url),
            None => GestureResult::Consumed,
        }
    }

    /// Delivers a compositor response to whichever frame in this subtree
    /// issued it. Returns whether the frame was found.
    pub fn route_response(&mut self, response: BitmapResponse) -> bool {
        if response.frame == self.frame {
            self.on_tile_response(response);
            return true;
        }
        for sub in &mut self.subframes {
            if sub.mediator.route_response(response.clone()) {
                return true;
            }
        }
        false
    }

    fn on_tile_response(&mut self, response: BitmapResponse) {
        match self.controller.on_tile_response(response) {
            StateEvent::None => {}
            StateEvent::VisibleUpdated => self.push_matrix(),
            StateEvent::Swapped => {
                // Fresh tiles at the committed scale replace the stretched
                // old ones; drop the gesture transform with them.
                self.scale.reset_matrix();
                self.model.set_scale_matrix(identity_matrix());
                self.push_geometry();
                self.push_matrix();
            }
        }
    }

    /// Advances fling animation for this subtree
    pub fn tick(&mut self, now: Instant) {
        if self.scroll.tick(&mut self.viewport, now) {
            self.update_visuals(false);
            self.push_geometry();
        }
        for sub in &mut self.subframes {
            sub.mediator.tick(now);
        }
    }

    /// Accessibility focus movement: minimal scroll bringing `target`
    /// (unscaled content coordinates) into view
    pub fn scroll_to_reveal(&mut self, target: &Rect) -> bool {
        if self.scroll.scroll_to_reveal(&mut self.viewport, target) {
            self.update_visuals(false);
            self.push_geometry();
            return true;
        }
        false
    }

    pub fn on_memory_pressure(&mut self, level: MemoryPressure) {
        self.pressure = level;
        self.controller.on_memory_pressure(level);
        if level >= MemoryPressure::Moderate {
            self.push_matrix();
        }
        for sub in &mut self.subframes {
            sub.mediator.on_memory_pressure(level);
        }
    }

    pub fn set_accept_input(&mut self, accept: bool) {
        self.dispatcher.set_accept_input(accept);
        for sub in &mut self.subframes {
            sub.mediator.set_accept_input(accept);
        }
    }

    pub fn set_touch_exploration(&mut self, active: bool) {
        self.dispatcher.set_touch_exploration(active);
        for sub in &mut self.subframes {
            sub.mediator.set_touch_exploration(active);
        }
    }

    pub fn set_overscroll_handler(&mut self, handler: Box<dyn OverscrollHandler>) {
        self.scroll.set_overscroll_handler(handler);
    }

    /// Tears the subtree down, this frame before its children
    pub fn destroy(&mut self) {
        self.model.set_visible(false);
        self.controller.destroy();
        for sub in &mut self.subframes {
            sub.mediator.destroy();
        }
    }

    fn push_geometry(&mut self) {
        let Some(state) = self.controller.visible_state() else {
            return;
        };
        let tile_size = state.tile_size();
        self.model
            .set_geometry(tile_size, self.viewport.trans(), self.viewport.as_rect());
    }

    fn push_matrix(&mut self) {
        let Some(state) = self.controller.visible_state() else {
            return;
        };
        let rows = state.grid().rows();
        let cols = state.grid().cols();
        let snapshot = state.snapshot();
        self.model.set_tile_matrix(snapshot, rows, cols);
    }
}
