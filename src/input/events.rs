use crate::core::geometry::Point;
use serde::{Deserialize, Serialize};

/// Gesture events fed into a frame tree.
///
/// Deltas and focal points are in device pixels, relative to the view the
/// event is delivered to; routing into a sub-frame re-bases them onto the
/// child's origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GestureEvent {
    /// One step of a scroll gesture. `delta` follows scroll-distance
    /// convention: positive moves the view down/right through the content.
    Scroll { delta: Point, position: Point },
    /// Finger lifted with velocity (px/s, finger direction)
    Fling { velocity: Point, position: Point },
    /// A pinch gesture begins
    ScaleBegin { focal: Point },
    /// One step of a pinch gesture
    ScaleBy { factor: f64, focal: Point },
    /// The pinch gesture ended; commit the accumulated scale
    ScaleEnd,
    /// Single tap
    Tap { position: Point },
    /// Long press
    LongPress { position: Point },
    /// All pointers lifted without further gesture
    Release,
}

impl GestureEvent {
    /// Gets the position associated with this event, if any
    pub fn position(&self) -> Option<Point> {
        match self {
            GestureEvent::Scroll { position, .. } => Some(*position),
            GestureEvent::Fling { position, .. } => Some(*position),
            GestureEvent::ScaleBegin { focal } => Some(*focal),
            GestureEvent::ScaleBy { focal, .. } => Some(*focal),
            GestureEvent::Tap { position } => Some(*position),
            GestureEvent::LongPress { position } => Some(*position),
            GestureEvent::ScaleEnd | GestureEvent::Release => None,
        }
    }

    /// Re-bases the event onto a child view whose origin sits at `origin`
    /// in this view's coordinates
    pub fn translated(&self, origin: &Point) -> GestureEvent {
        let rebase = |p: &Point| p.subtract(origin);
        match self {
            GestureEvent::Scroll { delta, position } => GestureEvent::Scroll {
                delta: *delta,
                position: rebase(position),
            },
            GestureEvent::Fling { velocity, position } => GestureEvent::Fling {
                velocity: *velocity,
                position: rebase(position),
            },
            GestureEvent::ScaleBegin { focal } => GestureEvent::ScaleBegin {
                focal: rebase(focal),
            },
            GestureEvent::ScaleBy { factor, focal } => GestureEvent::ScaleBy {
                factor: *factor,
                focal: rebase(focal),
            },
            GestureEvent::Tap { position } => GestureEvent::Tap {
                position: rebase(position),
            },
            GestureEvent::LongPress { position } => GestureEvent::LongPress {
                position: rebase(position),
            },
            GestureEvent::ScaleEnd => GestureEvent::ScaleEnd,
            GestureEvent::Release => GestureEvent::Release,
        }
    }

    /// Checks if this is part of a pinch gesture
    pub fn is_scale_event(&self) -> bool {
        matches!(
            self,
            GestureEvent::ScaleBegin { .. } | GestureEvent::ScaleBy { .. } | GestureEvent::ScaleEnd
        )
    }
}

/// Outcome of dispatching a gesture into a frame tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GestureResult {
    /// No frame consumed the gesture
    Ignored,
    /// A frame consumed the gesture
    Consumed,
    /// A tap landed on a link; the embedder should navigate
    LinkOpened(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_position() {
        let tap = GestureEvent::Tap {
            position: Point::new(100.0, 200.0),
        };
        assert_eq!(tap.position(), Some(Point::new(100.0, 200.0)));
        assert_eq!(GestureEvent::ScaleEnd.position(), None);
    }

    #[test]
    fn test_translated_rebases_positions() {
        let scroll = GestureEvent::Scroll {
            delta: Point::new(5.0, 5.0),
            position: Point::new(100.0, 100.0),
        };
        let child = scroll.translated(&Point::new(40.0, 60.0));
        match child {
            GestureEvent::Scroll { delta, position } => {
                assert_eq!(delta, Point::new(5.0, 5.0));
                assert_eq!(position, Point::new(60.0, 40.0));
            }
            _ => panic!("event kind changed"),
        }
    }

    #[test]
    fn test_scale_event_class() {
        assert!(GestureEvent::ScaleEnd.is_scale_event());
        assert!(!GestureEvent::Release.is_scale_event());
    }
}
