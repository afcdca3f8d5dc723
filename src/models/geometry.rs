//! Screen geometry in the global top-left-origin coordinate space used by the
//! window server, event taps and the accessibility API.

use serde::{Deserialize, Serialize};

/// Two-dimensional point in global screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Width and height in display points
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle; `origin` is the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn min_x(&self) -> f64 {
        self.origin.x
    }

    pub fn min_y(&self) -> f64 {
        self.origin.y
    }

    pub fn max_x(&self) -> f64 {
        self.origin.x + self.size.width
    }

    pub fn max_y(&self) -> f64 {
        self.origin.y + self.size.height
    }

    pub fn is_empty(&self) -> bool {
        self.size.width <= 0.0 || self.size.height <= 0.0
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.min_x()
            && point.x < self.max_x()
            && point.y >= self.min_y()
            && point.y < self.max_y()
    }

    /// True when origin and size each differ by at most `tolerance` per axis.
    pub fn approx_eq(&self, other: &Rect, tolerance: f64) -> bool {
        (self.origin.x - other.origin.x).abs() <= tolerance
            && (self.origin.y - other.origin.y).abs() <= tolerance
            && (self.size.width - other.size.width).abs() <= tolerance
            && (self.size.height - other.size.height).abs() <= tolerance
    }

    /// Left half, right half, or the whole rectangle.
    pub fn left_half(&self) -> Rect {
        Rect::new(
            self.origin.x,
            self.origin.y,
            (self.size.width / 2.0).floor(),
            self.size.height,
        )
    }

    pub fn right_half(&self) -> Rect {
        let half = (self.size.width / 2.0).floor();
        Rect::new(
            self.origin.x + half,
            self.origin.y,
            self.size.width - half,
            self.size.height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_excludes_far_edges() {
        let rect = Rect::new(0.0, 0.0, 100.0, 50.0);
        assert!(rect.contains(Point::new(0.0, 0.0)));
        assert!(rect.contains(Point::new(99.9, 49.9)));
        assert!(!rect.contains(Point::new(100.0, 10.0)));
        assert!(!rect.contains(Point::new(10.0, 50.0)));
    }

    #[test]
    fn approx_eq_respects_tolerance() {
        let a = Rect::new(10.0, 10.0, 800.0, 600.0);
        let b = Rect::new(14.0, 6.0, 804.0, 596.0);
        let c = Rect::new(16.0, 10.0, 800.0, 600.0);
        assert!(a.approx_eq(&b, 5.0));
        assert!(!a.approx_eq(&c, 5.0));
    }

    #[test]
    fn halves_cover_odd_widths() {
        let rect = Rect::new(0.0, 25.0, 1441.0, 875.0);
        let left = rect.left_half();
        let right = rect.right_half();
        assert_eq!(left.size.width, 720.0);
        assert_eq!(right.origin.x, 720.0);
        assert_eq!(left.size.width + right.size.width, 1441.0);
        assert_eq!(right.origin.y, 25.0);
    }
}
