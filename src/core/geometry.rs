use serde::{Deserialize, Serialize};

/// Represents a point in screen or scaled-content coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(&self, other: &Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn subtract(&self, other: &Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn multiply(&self, scalar: f64) -> Point {
        Point::new(self.x * scalar, self.y * scalar)
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Euclidean length, treating the point as a vector from the origin.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// A width/height pair in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn scaled(&self, factor: f64) -> Size {
        Size::new(self.width * factor, self.height * factor)
    }
}

impl Default for Size {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Represents a bounding box in screen or scaled-content coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    /// Creates a new rect from two points
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// Creates a rect from individual coordinates
    pub fn from_coords(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::new(Point::new(min_x, min_y), Point::new(max_x, max_y))
    }

    /// Creates a rect from an origin point and a size
    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self::new(
            origin,
            Point::new(origin.x + size.width, origin.y + size.height),
        )
    }

    /// Gets the width of the rect
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Gets the height of the rect
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Gets the size of the rect
    pub fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    /// A rect is empty when it encloses no area
    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Checks if the rect contains a point
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Checks if the rect intersects with another rect
    pub fn intersects(&self, other: &Rect) -> bool {
        !(other.max.x <= self.min.x
            || other.min.x >= self.max.x
            || other.max.y <= self.min.y
            || other.min.y >= self.max.y)
    }

    /// Gets the intersection of two rects
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.intersects(other) {
            return None;
        }

        Some(Rect::new(
            Point::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y)),
            Point::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y)),
        ))
    }

    /// Returns the rect shifted by the given offset
    pub fn translated(&self, offset: &Point) -> Rect {
        Rect::new(self.min.add(offset), self.max.add(offset))
    }

    /// Returns the rect with both corners scaled about the origin
    pub fn scaled(&self, factor: f64) -> Rect {
        Rect::new(self.min.multiply(factor), self.max.multiply(factor))
    }

    /// Creates an empty rect at the origin
    pub fn zero() -> Self {
        Self::from_coords(0.0, 0.0, 0.0, 0.0)
    }
}

impl Default for Rect {
    fn default() -> Self {
        Self::zero()
    }
}

/// Row-major 2D affine transform `[a, b, c, d, e, f]`:
/// `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
pub type Matrix = [f64; 6];

/// The identity transform
pub fn identity_matrix() -> Matrix {
    [1.0, 0.0, 0.0, 1.0, 0.0, 0.0]
}

/// Combine two transformation matrices (`a` applied after `b`)
pub fn combine_matrices(a: &Matrix, b: &Matrix) -> Matrix {
    [
        a[0] * b[0] + a[2] * b[1],
        a[1] * b[0] + a[3] * b[1],
        a[0] * b[2] + a[2] * b[3],
        a[1] * b[2] + a[3] * b[3],
        a[0] * b[4] + a[2] * b[5] + a[4],
        a[1] * b[4] + a[3] * b[5] + a[5],
    ]
}

/// Post-scales a matrix by `factor` about the focal point
pub fn post_scale(m: &Matrix, factor: f64, focal: Point) -> Matrix {
    let scale = [
        factor,
        0.0,
        0.0,
        factor,
        focal.x * (1.0 - factor),
        focal.y * (1.0 - factor),
    ];
    combine_matrices(&scale, m)
}

/// Applies a matrix to a point
pub fn transform_point(m: &Matrix, p: Point) -> Point {
    Point::new(m[0] * p.x + m[2] * p.y + m[4], m[1] * p.x + m[3] * p.y + m[5])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_dimensions() {
        let rect = Rect::from_coords(10.0, 20.0, 30.0, 60.0);
        assert_eq!(rect.width(), 20.0);
        assert_eq!(rect.height(), 40.0);
        assert!(!rect.is_empty());
        assert!(Rect::zero().is_empty());
    }

    #[test]
    fn test_rect_contains() {
        let rect = Rect::from_coords(10.0, 20.0, 30.0, 40.0);
        assert!(rect.contains(&Point::new(15.0, 25.0)));
        assert!(!rect.contains(&Point::new(5.0, 25.0)));
    }

    #[test]
    fn test_rect_intersection() {
        let a = Rect::from_coords(0.0, 0.0, 10.0, 10.0);
        let b = Rect::from_coords(5.0, 5.0, 15.0, 15.0);

        let intersection = a.intersection(&b).unwrap();
        assert_eq!(intersection.min, Point::new(5.0, 5.0));
        assert_eq!(intersection.max, Point::new(10.0, 10.0));
    }

    #[test]
    fn test_rect_no_intersection() {
        let a = Rect::from_coords(0.0, 0.0, 5.0, 5.0);
        let b = Rect::from_coords(10.0, 10.0, 15.0, 15.0);
        assert!(a.intersection(&b).is_none());

        // Touching edges enclose no area
        let c = Rect::from_coords(5.0, 0.0, 10.0, 5.0);
        assert!(a.intersection(&c).is_none());
    }

    #[test]
    fn test_rect_translate_scale() {
        let rect = Rect::from_coords(1.0, 2.0, 3.0, 4.0);
        let moved = rect.translated(&Point::new(10.0, 20.0));
        assert_eq!(moved, Rect::from_coords(11.0, 22.0, 13.0, 24.0));

        let grown = rect.scaled(2.0);
        assert_eq!(grown, Rect::from_coords(2.0, 4.0, 6.0, 8.0));
    }

    #[test]
    fn test_post_scale_preserves_focal_point() {
        let focal = Point::new(100.0, 50.0);
        let m = post_scale(&identity_matrix(), 2.0, focal);
        let mapped = transform_point(&m, focal);
        assert!((mapped.x - focal.x).abs() < 1e-9);
        assert!((mapped.y - focal.y).abs() < 1e-9);

        // A point one unit right of the focal point moves two units out
        let p = transform_point(&m, Point::new(101.0, 50.0));
        assert!((p.x - 102.0).abs() < 1e-9);
    }

    #[test]
    fn test_matrix_accumulation() {
        let m = post_scale(&identity_matrix(), 2.0, Point::new(0.0, 0.0));
        let m = post_scale(&m, 1.5, Point::new(0.0, 0.0));
        assert!((m[0] - 3.0).abs() < 1e-9);
        assert!((m[3] - 3.0).abs() < 1e-9);
    }
}
