//! Per-scale tile bookkeeping.
//!
//! A [`BitmapState`] owns the tile matrix for one (frame, scale) pair and
//! everything needed to fill it: which tiles the current viewport needs,
//! which fetches are in flight, and which results to discard as stale. It
//! is created unlocked, locked (frozen) when a new scale gesture starts on
//! it, and destroyed when a rescaled replacement swaps in.

use crate::compositor::{
    Bitmap, BitmapRequest, CompositorError, CompositorHandle, FrameId, MemoryPressure, RequestId,
};
use crate::core::geometry::{Rect, Size};
use crate::tiles::matrix::{BitGrid, TileGrid, TileSlot};
use fxhash::{FxHashMap, FxHashSet};

/// Tile matrix plus request lifecycle for one (frame, scale) pair
pub struct BitmapState {
    frame: FrameId,
    scale: f64,
    tile_size: Size,
    grid: TileGrid,
    /// Tiles needed for the current viewport and its prefetch ring.
    /// None once the state is locked against further churn.
    required: Option<BitGrid>,
    /// Tiles overlapping the viewport itself, used to pick eviction victims
    visible: BitGrid,
    /// In-flight fetches by request id
    pending: FxHashMap<RequestId, usize>,
    /// Tiles from the first request's visible set that have not reported
    /// back yet. None means the state is ready to show.
    initial_missing: Option<FxHashSet<usize>>,
    first_request_seen: bool,
    compositor: CompositorHandle,
}

impl BitmapState {
    pub fn new(
        frame: FrameId,
        content_size: Size,
        scale: f64,
        tile_size: Size,
        compositor: CompositorHandle,
    ) -> Self {
        let grid = TileGrid::for_content(content_size.scaled(scale), tile_size);
        let rows = grid.rows();
        let cols = grid.cols();
        Self {
            frame,
            scale,
            tile_size,
            grid,
            required: Some(BitGrid::new(rows, cols)),
            visible: BitGrid::new(rows, cols),
            pending: FxHashMap::default(),
            initial_missing: Some(FxHashSet::default()),
            first_request_seen: false,
            compositor,
        }
    }

    pub fn frame(&self) -> FrameId {
        self.frame
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn tile_size(&self) -> Size {
        self.tile_size
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Snapshot of loaded bitmaps for the render model
    pub fn snapshot(&self) -> Vec<Option<Bitmap>> {
        self.grid.snapshot()
    }

    /// A locked state is frozen: no new fetches, no eviction churn. It
    /// keeps whatever bitmaps it has until a replacement swaps in.
    pub fn is_locked(&self) -> bool {
        self.required.is_none()
    }

    /// True once every tile of the first request's visible set has been
    /// received at least once, success or error.
    pub fn is_ready_to_show(&self) -> bool {
        self.initial_missing.is_none()
    }

    /// Force-satisfies the readiness gate. Used for the very first state,
    /// where there is nothing better to show.
    pub fn skip_ready_gate(&mut self) {
        self.initial_missing = None;
    }

    pub fn owns_request(&self, id: RequestId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Recomputes the needed-tile set for `rect` (in scaled-content
    /// pixels), issues fetches for missing tiles, cancels fetches for
    /// tiles that fell out of the set, and evicts bitmaps nothing needs.
    ///
    /// Viewport tiles are requested before the prefetch ring; the ring is
    /// skipped entirely at moderate memory pressure and above.
    pub fn request_bitmaps_for_rect(
        &mut self,
        rect: &Rect,
        pressure: MemoryPressure,
        prefetch_enabled: bool,
    ) {
        if self.is_locked() {
            return;
        }

        let range = self.grid.tile_range(rect, self.tile_size);
        self.visible.clear();
        if let Some(required) = self.required.as_mut() {
            required.clear();
        }

        let mut visible_indices = Vec::new();
        if let Some((row_start, col_start, row_end, col_end)) = range {
            for row in row_start..=row_end {
                for col in col_start..=col_end {
                    visible_indices.push(self.grid.index(row, col));
                }
            }
        }

        for &index in &visible_indices {
            self.visible.set(index, true);
        }
        if let Some(required) = self.required.as_mut() {
            for &index in &visible_indices {
                required.set(index, true);
            }
        }

        if !self.first_request_seen && !visible_indices.is_empty() {
            self.first_request_seen = true;
            if let Some(gate) = self.initial_missing.as_mut() {
                for &index in &visible_indices {
                    if !self.grid.get(index).is_loaded() {
                        gate.insert(index);
                    }
                }
                if gate.is_empty() {
                    self.initial_missing = None;
                }
            }
        }

        for &index in &visible_indices {
            self.fetch_tile(index);
        }

        if prefetch_enabled && pressure < MemoryPressure::Moderate {
            let mut ring = Vec::new();
            for &index in &visible_indices {
                for neighbor in self.visible.neighbors(index) {
                    ring.push(neighbor);
                }
            }
            if let Some(required) = self.required.as_mut() {
                for &index in &ring {
                    required.set(index, true);
                }
            }
            for &index in &ring {
                self.fetch_tile(index);
            }
        }

        self.cancel_unrequired_fetches();
        self.delete_unrequired_bitmaps();
    }

    /// Handles one fetch completion. Returns whether the matrix content
    /// changed. Results for requests no longer tracked (cancelled or
    /// superseded) are discarded.
    pub fn handle_response(
        &mut self,
        id: RequestId,
        result: std::result::Result<Bitmap, CompositorError>,
    ) -> bool {
        let Some(index) = self.pending.remove(&id) else {
            log::debug!("discarding stale bitmap response {:?}", id);
            return false;
        };

        // The readiness gate counts any terminal outcome, success or error.
        if let Some(gate) = self.initial_missing.as_mut() {
            gate.remove(&index);
            if gate.is_empty() {
                self.initial_missing = None;
            }
        }

        let mut changed = false;
        match result {
            Ok(bitmap) => {
                // Requirements may have moved on while the fetch ran;
                // check them now, not at request time.
                let still_required = self.required.as_ref().map_or(false, |r| r.get(index));
                if still_required {
                    self.grid.set(index, TileSlot::Loaded(bitmap));
                    changed = true;
                } else {
                    log::debug!("tile {} no longer required, dropping bitmap", index);
                    self.grid.set(index, TileSlot::Empty);
                }
            }
            Err(error) => {
                // A failed tile stays blank; never fatal for the frame.
                log::warn!("tile {} fetch failed: {}", index, error);
                self.grid.set(index, TileSlot::Empty);
            }
        }

        self.delete_unrequired_bitmaps();
        changed
    }

    /// Freezes the state when a scale gesture begins: no further tile
    /// churn, all in-flight fetches cancelled.
    pub fn lock(&mut self) {
        self.required = None;
        self.cancel_all_pending();
    }

    /// Evicts loaded tiles outside the viewport (memory pressure path)
    pub fn release_not_visible_tiles(&mut self) {
        let victims: Vec<usize> = self
            .grid
            .iter()
            .filter(|(index, slot)| slot.is_loaded() && !self.visible.get(*index))
            .map(|(index, _)| index)
            .collect();
        for index in victims {
            self.grid.set(index, TileSlot::Empty);
        }
    }

    /// Releases every bitmap and cancels all fetches (hidden sub-frame).
    /// The state stays usable; re-showing re-fetches from scratch.
    pub fn release_all(&mut self) {
        self.cancel_all_pending();
        let loaded: Vec<usize> = self
            .grid
            .iter()
            .filter(|(_, slot)| slot.is_loaded())
            .map(|(index, _)| index)
            .collect();
        for index in loaded {
            self.grid.set(index, TileSlot::Empty);
        }
    }

    /// Tears the state down, cancelling outstanding work
    pub fn destroy(mut self) {
        self.cancel_all_pending();
    }

    fn fetch_tile(&mut self, index: usize) {
        if !self.grid.get(index).is_empty() {
            return;
        }
        let (row, col) = self.grid.position(index);
        let rect = self.grid.tile_rect(row, col, self.tile_size);
        let Ok(mut compositor) = self.compositor.lock() else {
            return;
        };
        let id = compositor.request_bitmap(BitmapRequest {
            frame: self.frame,
            rect,
            scale: self.scale,
        });
        drop(compositor);
        self.grid.set(index, TileSlot::Pending(id));
        self.pending.insert(id, index);
    }

    fn cancel_unrequired_fetches(&mut self) {
        let stale: Vec<(RequestId, usize)> = self
            .pending
            .iter()
            .filter(|(_, &index)| !self.required.as_ref().map_or(false, |r| r.get(index)))
            .map(|(&id, &index)| (id, index))
            .collect();
        if stale.is_empty() {
            return;
        }
        if let Ok(mut compositor) = self.compositor.lock() {
            for (id, _) in &stale {
                // A cancel the backend cannot honor still drops the pending
                // entry; the late result is discarded on arrival.
                compositor.cancel_request(*id);
            }
        }
        for (id, index) in stale {
            self.pending.remove(&id);
            if self.grid.get(index).is_pending() {
                self.grid.set(index, TileSlot::Empty);
            }
        }
    }

    fn delete_unrequired_bitmaps(&mut self) {
        let Some(required) = self.required.as_ref() else {
            return;
        };
        let victims: Vec<usize> = self
            .grid
            .iter()
            .filter(|(index, slot)| slot.is_loaded() && !required.get(*index))
            .map(|(index, _)| index)
            .collect();
        for index in victims {
            self.grid.set(index, TileSlot::Empty);
        }
    }

    fn cancel_all_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let entries: Vec<(RequestId, usize)> = self.pending.drain().collect();
        if let Ok(mut compositor) = self.compositor.lock() {
            for (id, _) in &entries {
                compositor.cancel_request(*id);
            }
        }
        for (_, index) in entries {
            if self.grid.get(index).is_pending() {
                self.grid.set(index, TileSlot::Empty);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::test_support::RecordingCompositor;
    use crate::compositor::{response_channel, BitmapResponse};
    use crossbeam_channel::Receiver;
    use std::sync::{Arc, Mutex};

    fn setup() -> (
        BitmapState,
        Arc<Mutex<RecordingCompositor>>,
        Receiver<BitmapResponse>,
    ) {
        let (tx, rx) = response_channel();
        let compositor = Arc::new(Mutex::new(RecordingCompositor::new(tx)));
        let handle: CompositorHandle = compositor.clone();
        let state = BitmapState::new(
            FrameId(1),
            Size::new(1000.0, 1000.0),
            1.0,
            Size::new(500.0, 250.0),
            handle,
        );
        (state, compositor, rx)
    }

    fn viewport_rect() -> Rect {
        Rect::from_coords(0.0, 0.0, 500.0, 500.0)
    }

    fn drain_into(state: &mut BitmapState, rx: &Receiver<BitmapResponse>) {
        while let Ok(response) = rx.try_recv() {
            state.handle_response(response.request, response.result);
        }
    }

    #[test]
    fn test_visible_then_prefetch_request_order() {
        let (mut state, compositor, _rx) = setup();
        state.request_bitmaps_for_rect(&viewport_rect(), MemoryPressure::None, true);

        let compositor = compositor.lock().unwrap();
        // Grid is 4 rows x 2 cols; the viewport covers tiles (0,0) and
        // (1,0). Their four-neighborhood adds (0,1), (1,1), (2,0).
        assert_eq!(compositor.request_count(), 5);
        let rects: Vec<Rect> = compositor
            .requests
            .iter()
            .map(|(_, request)| request.rect)
            .collect();
        assert_eq!(rects[0], Rect::from_coords(0.0, 0.0, 500.0, 250.0));
        assert_eq!(rects[1], Rect::from_coords(0.0, 250.0, 500.0, 500.0));
        // Everything after the first two is prefetch
        assert!(rects[2..].iter().all(|rect| {
            *rect != Rect::from_coords(0.0, 0.0, 500.0, 250.0)
                && *rect != Rect::from_coords(0.0, 250.0, 500.0, 500.0)
        }));
    }

    #[test]
    fn test_no_prefetch_under_pressure() {
        let (mut state, compositor, _rx) = setup();
        state.request_bitmaps_for_rect(&viewport_rect(), MemoryPressure::Moderate, true);
        assert_eq!(compositor.lock().unwrap().request_count(), 2);
    }

    #[test]
    fn test_no_prefetch_when_disabled() {
        let (mut state, compositor, _rx) = setup();
        state.request_bitmaps_for_rect(&viewport_rect(), MemoryPressure::None, false);
        assert_eq!(compositor.lock().unwrap().request_count(), 2);
    }

    #[test]
    fn test_repeat_request_is_idempotent() {
        let (mut state, compositor, _rx) = setup();
        state.request_bitmaps_for_rect(&viewport_rect(), MemoryPressure::None, true);
        let first = compositor.lock().unwrap().request_count();

        state.request_bitmaps_for_rect(&viewport_rect(), MemoryPressure::None, true);
        assert_eq!(compositor.lock().unwrap().request_count(), first);
    }

    #[test]
    fn test_ready_gate_tracks_initial_visible_set() {
        let (mut state, compositor, rx) = setup();
        state.request_bitmaps_for_rect(&viewport_rect(), MemoryPressure::None, true);
        assert!(!state.is_ready_to_show());

        // Complete the two visible tiles only; prefetch results are not
        // part of the gate.
        let ids: Vec<RequestId> = compositor
            .lock()
            .unwrap()
            .requests
            .iter()
            .take(2)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            compositor.lock().unwrap().complete(id);
        }
        drain_into(&mut state, &rx);
        assert!(state.is_ready_to_show());
    }

    #[test]
    fn test_fetch_error_counts_toward_gate_and_stays_blank() {
        let (mut state, compositor, rx) = setup();
        state.request_bitmaps_for_rect(&viewport_rect(), MemoryPressure::Moderate, true);

        let ids = compositor.lock().unwrap().pending_ids();
        compositor.lock().unwrap().fail(ids[0]);
        compositor.lock().unwrap().complete(ids[1]);
        drain_into(&mut state, &rx);

        assert!(state.is_ready_to_show());
        assert_eq!(state.grid().loaded_count(), 1);
    }

    #[test]
    fn test_skip_ready_gate() {
        let (mut state, _compositor, _rx) = setup();
        state.skip_ready_gate();
        assert!(state.is_ready_to_show());
        state.request_bitmaps_for_rect(&viewport_rect(), MemoryPressure::None, true);
        assert!(state.is_ready_to_show());
    }

    #[test]
    fn test_scroll_cancels_and_evicts_then_refetches() {
        let (mut state, compositor, rx) = setup();
        state.request_bitmaps_for_rect(&viewport_rect(), MemoryPressure::Moderate, true);
        let ids = compositor.lock().unwrap().pending_ids();
        for id in ids {
            compositor.lock().unwrap().complete(id);
        }
        drain_into(&mut state, &rx);
        assert_eq!(state.grid().loaded_count(), 2);

        // Scroll to the bottom: old tiles leave the required set
        let bottom = Rect::from_coords(500.0, 500.0, 1000.0, 1000.0);
        state.request_bitmaps_for_rect(&bottom, MemoryPressure::Moderate, true);
        assert_eq!(state.grid().loaded_count(), 0);

        // Scroll back: the evicted tiles are fetched again, not served
        // from a stale reference
        let before = compositor.lock().unwrap().request_count();
        state.request_bitmaps_for_rect(&viewport_rect(), MemoryPressure::Moderate, true);
        assert_eq!(compositor.lock().unwrap().request_count(), before + 2);
    }

    #[test]
    fn test_pending_fetch_cancelled_when_unrequired() {
        let (mut state, compositor, _rx) = setup();
        state.request_bitmaps_for_rect(&viewport_rect(), MemoryPressure::Moderate, true);

        let bottom = Rect::from_coords(500.0, 500.0, 1000.0, 1000.0);
        state.request_bitmaps_for_rect(&bottom, MemoryPressure::Moderate, true);

        let compositor = compositor.lock().unwrap();
        assert_eq!(compositor.cancelled.len(), 2);
    }

    #[test]
    fn test_uncancellable_result_discarded_on_arrival() {
        let (mut state, compositor, rx) = setup();
        state.request_bitmaps_for_rect(&viewport_rect(), MemoryPressure::Moderate, true);

        let ids = compositor.lock().unwrap().pending_ids();
        compositor.lock().unwrap().uncancellable.push(ids[0]);

        let bottom = Rect::from_coords(500.0, 500.0, 1000.0, 1000.0);
        state.request_bitmaps_for_rect(&bottom, MemoryPressure::Moderate, true);

        // The backend finished the uncancellable tile anyway
        compositor.lock().unwrap().complete(ids[0]);
        drain_into(&mut state, &rx);

        // The late bitmap was not stored for the now-unrequired tile
        let index = 0;
        assert!(!state.grid().get(index).is_loaded());
    }

    #[test]
    fn test_lock_cancels_everything_and_freezes() {
        let (mut state, compositor, _rx) = setup();
        state.request_bitmaps_for_rect(&viewport_rect(), MemoryPressure::Moderate, true);
        assert!(!state.is_locked());

        state.lock();
        assert!(state.is_locked());
        assert_eq!(compositor.lock().unwrap().cancelled.len(), 2);

        // Frozen: further requests are no-ops
        let before = compositor.lock().unwrap().request_count();
        state.request_bitmaps_for_rect(&viewport_rect(), MemoryPressure::None, true);
        assert_eq!(compositor.lock().unwrap().request_count(), before);
    }

    #[test]
    fn test_release_not_visible_tiles() {
        let (mut state, compositor, rx) = setup();
        state.request_bitmaps_for_rect(&viewport_rect(), MemoryPressure::None, true);
        let ids = compositor.lock().unwrap().pending_ids();
        for id in ids {
            compositor.lock().unwrap().complete(id);
        }
        drain_into(&mut state, &rx);
        assert_eq!(state.grid().loaded_count(), 5);

        state.release_not_visible_tiles();
        // Only the two viewport tiles survive; the prefetch ring goes
        assert_eq!(state.grid().loaded_count(), 2);
    }

    #[test]
    fn test_release_all() {
        let (mut state, compositor, rx) = setup();
        state.request_bitmaps_for_rect(&viewport_rect(), MemoryPressure::Moderate, true);
        let ids = compositor.lock().unwrap().pending_ids();
        compositor.lock().unwrap().complete(ids[0]);
        drain_into(&mut state, &rx);

        state.release_all();
        assert_eq!(state.grid().loaded_count(), 0);
        assert!(compositor.lock().unwrap().in_flight.is_empty());
    }
}
