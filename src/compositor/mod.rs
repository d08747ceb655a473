//! Boundary to the external bitmap compositor.
//!
//! The compositor rasterizes rectangular regions of the captured page into
//! bitmaps. The engine never assumes synchronous completion: it hands out a
//! request and moves on; the compositor implementation delivers a
//! [`BitmapResponse`] into a [`crossbeam_channel::Sender`] from whatever
//! thread it likes, and [`crate::FrameCoordinator::tick`] pumps the paired
//! receiver back on the embedder's frame tick.

use crate::core::geometry::Rect;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Identifies one frame of the captured page (the main frame or a nested
/// iframe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameId(pub u64);

/// Identifies one in-flight bitmap request, minted by the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

/// A rasterized tile. Cloning is cheap; the pixel buffer is shared.
#[derive(Debug, Clone)]
pub struct Bitmap {
    inner: Arc<BitmapData>,
}

#[derive(Debug)]
struct BitmapData {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            inner: Arc::new(BitmapData {
                width,
                height,
                pixels,
            }),
        }
    }

    pub fn width(&self) -> u32 {
        self.inner.width
    }

    pub fn height(&self) -> u32 {
        self.inner.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.inner.pixels
    }
}

/// One tile rasterization request
#[derive(Debug, Clone, PartialEq)]
pub struct BitmapRequest {
    pub frame: FrameId,
    /// Tile rect in scaled-content pixels
    pub rect: Rect,
    pub scale: f64,
}

/// Completion of one tile request, success or failure
#[derive(Debug, Clone)]
pub struct BitmapResponse {
    pub frame: FrameId,
    pub request: RequestId,
    pub result: std::result::Result<Bitmap, CompositorError>,
}

/// Failures reported by the compositor for individual tiles.
///
/// These degrade to blank tiles; they never abort a frame.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompositorError {
    #[error("compositor dropped the request")]
    Dropped,

    #[error("rasterization failed: {0}")]
    Raster(String),
}

/// Coarse system memory pressure, gating speculative prefetch and
/// triggering eviction of off-screen tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MemoryPressure {
    None,
    Moderate,
    Critical,
}

/// The compositor contract.
///
/// `request_bitmap` returns immediately with an id; the result arrives
/// later on the response channel. `cancel_request` returns false when the
/// backend had already started rasterizing; the engine then discards the
/// late result instead.
pub trait BitmapCompositor: Send {
    fn request_bitmap(&mut self, request: BitmapRequest) -> RequestId;

    fn cancel_request(&mut self, id: RequestId) -> bool;

    fn cancel_all(&mut self);

    /// Hit-tests a click at unscaled content coordinates, returning the
    /// link URL under it, if any.
    fn click(&mut self, frame: FrameId, x: f64, y: f64) -> Option<String>;
}

/// Shared compositor handle; every bitmap state holds a clone.
pub type CompositorHandle = Arc<Mutex<dyn BitmapCompositor + Send>>;

/// Creates the response channel wiring a compositor back into the engine.
pub fn response_channel() -> (
    crossbeam_channel::Sender<BitmapResponse>,
    crossbeam_channel::Receiver<BitmapResponse>,
) {
    crossbeam_channel::unbounded()
}

/// Wraps a compositor implementation in a shareable handle.
pub fn compositor_handle<C: BitmapCompositor + 'static>(compositor: C) -> CompositorHandle {
    Arc::new(Mutex::new(compositor))
}

#[cfg(test)]
pub(crate) mod test_support {
    //! A recording compositor for unit tests: remembers every request and
    //! lets tests complete or fail tiles by hand.

    use super::*;
    use crossbeam_channel::Sender;
    use std::collections::HashMap;

    pub struct RecordingCompositor {
        next_id: u64,
        pub requests: Vec<(RequestId, BitmapRequest)>,
        pub cancelled: Vec<RequestId>,
        pub in_flight: HashMap<RequestId, BitmapRequest>,
        /// Ids the backend claims it could not cancel in time
        pub uncancellable: Vec<RequestId>,
        pub links: HashMap<FrameId, String>,
        responses: Sender<BitmapResponse>,
    }

    impl RecordingCompositor {
        pub fn new(responses: Sender<BitmapResponse>) -> Self {
            Self {
                next_id: 0,
                requests: Vec::new(),
                cancelled: Vec::new(),
                in_flight: HashMap::new(),
                uncancellable: Vec::new(),
                links: HashMap::new(),
                responses,
            }
        }

        pub fn request_count(&self) -> usize {
            self.requests.len()
        }

        /// Completes an in-flight request with a 1x1 bitmap.
        pub fn complete(&mut self, id: RequestId) {
            let request = self.in_flight.remove(&id).expect("unknown request");
            self.responses
                .send(BitmapResponse {
                    frame: request.frame,
                    request: id,
                    result: Ok(Bitmap::new(1, 1, vec![0; 4])),
                })
                .unwrap();
        }

        /// Fails an in-flight request.
        pub fn fail(&mut self, id: RequestId) {
            let request = self.in_flight.remove(&id).expect("unknown request");
            self.responses
                .send(BitmapResponse {
                    frame: request.frame,
                    request: id,
                    result: Err(CompositorError::Raster("test failure".into())),
                })
                .unwrap();
        }

        pub fn pending_ids(&self) -> Vec<RequestId> {
            let mut ids: Vec<_> = self.in_flight.keys().copied().collect();
            ids.sort_by_key(|id| id.0);
            ids
        }
    }

    impl BitmapCompositor for RecordingCompositor {
        fn request_bitmap(&mut self, request: BitmapRequest) -> RequestId {
            let id = RequestId(self.next_id);
            self.next_id += 1;
            self.requests.push((id, request.clone()));
            self.in_flight.insert(id, request);
            id
        }

        fn cancel_request(&mut self, id: RequestId) -> bool {
            self.cancelled.push(id);
            if self.uncancellable.contains(&id) {
                return false;
            }
            self.in_flight.remove(&id).is_some()
        }

        fn cancel_all(&mut self) {
            let ids: Vec<_> = self.in_flight.keys().copied().collect();
            for id in ids {
                self.cancel_request(id);
            }
        }

        fn click(&mut self, frame: FrameId, _x: f64, _y: f64) -> Option<String> {
            self.links.get(&frame).cloned()
        }
    }
}
