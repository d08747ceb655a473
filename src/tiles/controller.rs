//! Double-buffered bitmap states.
//!
//! Each frame owns at most two [`BitmapState`]s: the one being shown and
//! the one loading for a new scale. Consumers only ever see a fully
//! populated state (or one explicitly short-circuited for first paint);
//! the swap between the two is atomic from the mediator's point of view.

use crate::compositor::{BitmapResponse, CompositorHandle, FrameId, MemoryPressure};
use crate::core::geometry::Size;
use crate::tiles::state::BitmapState;

/// Everything needed to size a fresh state
#[derive(Debug, Clone)]
pub struct StateParams {
    pub frame: FrameId,
    pub content_size: Size,
    pub scale: f64,
    pub tile_size: Size,
}

/// What a tile response did to the buffered states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    /// Nothing the mediator needs to react to
    None,
    /// The currently shown matrix changed; push it to the render model
    VisibleUpdated,
    /// The loading state became ready and is now the visible one
    Swapped,
}

/// Owns the visible/loading state pair for one frame
#[derive(Default)]
pub struct BitmapStateController {
    visible: Option<BitmapState>,
    loading: Option<BitmapState>,
}

impl BitmapStateController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes sure a state exists for the requested situation.
    ///
    /// Without a scale change this is a no-op while any state exists. On a
    /// scale change (or when nothing exists yet) any half-loaded state is
    /// discarded and a fresh one is built; if there is no visible state at
    /// all, the fresh state is swapped straight in with its readiness gate
    /// skipped, since first paint has nothing better to show. Returns
    /// whether that immediate swap happened.
    pub fn ensure_state(
        &mut self,
        scale_updated: bool,
        params: &StateParams,
        compositor: &CompositorHandle,
    ) -> bool {
        if !scale_updated && (self.visible.is_some() || self.loading.is_some()) {
            return false;
        }

        if let Some(old) = self.loading.take() {
            old.destroy();
        }

        let fresh = BitmapState::new(
            params.frame,
            params.content_size,
            params.scale,
            params.tile_size,
            compositor.clone(),
        );

        if self.visible.is_none() {
            let mut fresh = fresh;
            fresh.skip_ready_gate();
            self.visible = Some(fresh);
            return true;
        }

        self.loading = Some(fresh);
        false
    }

    /// The state new work should go to: the loading one if a rescale is in
    /// flight, otherwise the visible one.
    pub fn active_state_mut(&mut self) -> Option<&mut BitmapState> {
        self.loading.as_mut().or(self.visible.as_mut())
    }

    pub fn visible_state(&self) -> Option<&BitmapState> {
        self.visible.as_ref()
    }

    pub fn loading_state(&self) -> Option<&BitmapState> {
        self.loading.as_ref()
    }

    pub fn active_is_visible(&self) -> bool {
        self.loading.is_none() && self.visible.is_some()
    }

    pub fn active_is_locked(&self) -> bool {
        match (&self.loading, &self.visible) {
            (Some(loading), _) => loading.is_locked(),
            (None, Some(visible)) => visible.is_locked(),
            (None, None) => false,
        }
    }

    /// Routes one compositor response to whichever state owns it
    pub fn on_tile_response(&mut self, response: BitmapResponse) -> StateEvent {
        if let Some(loading) = self.loading.as_mut() {
            if loading.owns_request(response.request) {
                loading.handle_response(response.request, response.result);
                if loading.is_ready_to_show() {
                    self.swap();
                    return StateEvent::Swapped;
                }
                return StateEvent::None;
            }
        }

        if let Some(visible) = self.visible.as_mut() {
            if visible.owns_request(response.request) {
                let changed = visible.handle_response(response.request, response.result);
                return if changed {
                    StateEvent::VisibleUpdated
                } else {
                    StateEvent::None
                };
            }
        }

        log::debug!("response {:?} matches no buffered state", response.request);
        StateEvent::None
    }

    /// Promotes the loading state to visible. The old visible state is
    /// destroyed after the replacement is in place, never before.
    fn swap(&mut self) {
        let Some(fresh) = self.loading.take() else {
            return;
        };
        let old = self.visible.replace(fresh);
        if let Some(old) = old {
            old.destroy();
        }
    }

    /// A scale gesture is starting: freeze the shown state against churn
    pub fn on_start_scaling(&mut self) {
        if let Some(visible) = self.visible.as_mut() {
            visible.lock();
        }
    }

    /// Sheds off-screen tiles from the visible state. The loading state is
    /// left alone so in-flight work is not thrown away.
    pub fn on_memory_pressure(&mut self, level: MemoryPressure) {
        if level < MemoryPressure::Moderate {
            return;
        }
        if let Some(visible) = self.visible.as_mut() {
            visible.release_not_visible_tiles();
        }
    }

    /// Hidden frame: release every bitmap and abandon any rescale in
    /// flight. Re-showing starts from an empty matrix.
    pub fn evict_all(&mut self) {
        if let Some(loading) = self.loading.take() {
            loading.destroy();
        }
        if let Some(visible) = self.visible.as_mut() {
            visible.release_all();
        }
    }

    /// Tears both states down
    pub fn destroy(&mut self) {
        if let Some(loading) = self.loading.take() {
            loading.destroy();
        }
        if let Some(visible) = self.visible.take() {
            visible.destroy();
        }
    }
}
