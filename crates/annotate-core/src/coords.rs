//! Coordinate transformation between screen, page-normalized and PDF space
//!
//! Three frames are involved:
//! - screen space: canvas pixels at the current zoom, origin top-left, y down
//! - page-normalized space: screen space divided by the zoom, origin top-left, y down
//! - PDF page space: native page units, origin bottom-left, y up
//!
//! Everything here is pure. Callers clamp zoom to a strictly positive range.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Axis-aligned rectangle, `(x, y)` is the corner nearest the frame origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a rectangle from two arbitrary corners, normalizing negative
    /// deltas so width and height are never negative.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (b.x - a.x).abs(),
            height: (b.y - a.y).abs(),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Inclusive point-in-box test.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Grow the rectangle by `pad` on every side.
    pub fn expanded(&self, pad: f64) -> Self {
        Self {
            x: self.x - pad,
            y: self.y - pad,
            width: self.width + pad * 2.0,
            height: self.height + pad * 2.0,
        }
    }

    /// Square of side `size` centered on `center`.
    pub fn centered_on(center: Point, size: f64) -> Self {
        let half = size / 2.0;
        Self::new(center.x - half, center.y - half, size, size)
    }

    /// Bounding box of a point list, `None` when empty.
    pub fn bounding(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }
}

/// Screen pixels to page-normalized units.
pub fn to_page_normalized(screen: Point, zoom: f64) -> Point {
    Point {
        x: screen.x / zoom,
        y: screen.y / zoom,
    }
}

/// Page-normalized units to screen pixels.
pub fn to_screen(page: Point, zoom: f64) -> Point {
    Point {
        x: page.x * zoom,
        y: page.y * zoom,
    }
}

/// Page-normalized rectangle to PDF page space (vertical flip including the
/// region's own height).
pub fn to_pdf_space(rect: Rect, page_height: f64) -> Rect {
    Rect {
        x: rect.x,
        y: page_height - rect.y - rect.height,
        width: rect.width,
        height: rect.height,
    }
}

/// Point anchors carry no height, so only the axis is flipped.
pub fn to_pdf_point(point: Point, page_height: f64) -> Point {
    Point {
        x: point.x,
        y: page_height - point.y,
    }
}

/// PDF page-space rectangle back to page-normalized units.
pub fn from_pdf_space(rect: Rect, page_height: f64) -> Rect {
    Rect {
        x: rect.x,
        y: page_height - rect.y - rect.height,
        width: rect.width,
        height: rect.height,
    }
}

/// Re-express a value captured at `from_zoom` for display at `to_zoom`.
pub fn rescale(value: f64, from_zoom: f64, to_zoom: f64) -> f64 {
    value * (to_zoom / from_zoom)
}

/// Euclidean distance from `p` to segment `a`-`b`: project onto the line,
/// clamp the parameter to `[0, 1]`, measure to the clamped point.
pub fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    p.distance(Point::new(a.x + t * dx, a.y + t * dy))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_flip_letter_page() {
        let rect = Rect::new(72.0, 82.0, 40.0, 10.0);
        let pdf = to_pdf_space(rect, 792.0);
        assert_eq!(pdf, Rect::new(72.0, 700.0, 40.0, 10.0));
    }

    #[test]
    fn test_point_flip_omits_height() {
        let p = to_pdf_point(Point::new(10.0, 100.0), 792.0);
        assert_eq!(p, Point::new(10.0, 692.0));
    }

    #[test]
    fn test_from_corners_reversed_drag() {
        let forward = Rect::from_corners(Point::new(50.0, 50.0), Point::new(150.0, 90.0));
        let reversed = Rect::from_corners(Point::new(150.0, 90.0), Point::new(50.0, 50.0));
        assert_eq!(forward, Rect::new(50.0, 50.0, 100.0, 40.0));
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_rescale_doubles_at_twice_zoom() {
        assert_eq!(rescale(30.0, 1.5, 3.0), 60.0);
    }

    #[test]
    fn test_segment_distance_clamps_to_endpoint() {
        let d = point_segment_distance(
            Point::new(13.0, 4.0),
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
        );
        assert!((d - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_segment_distance_degenerate_segment() {
        let d = point_segment_distance(
            Point::new(3.0, 4.0),
            Point::new(0.0, 0.0),
            Point::new(0.0, 0.0),
        );
        assert!((d - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_bounding_box() {
        let pts = [
            Point::new(5.0, 9.0),
            Point::new(-2.0, 3.0),
            Point::new(7.0, 1.0),
        ];
        assert_eq!(Rect::bounding(&pts), Some(Rect::new(-2.0, 1.0, 9.0, 8.0)));
        assert_eq!(Rect::bounding(&[]), None);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn zoom() -> impl Strategy<Value = f64> {
        0.25f64..8.0
    }

    fn coord() -> impl Strategy<Value = f64> {
        0.0f64..2000.0
    }

    proptest! {
        /// Geometry captured at one zoom, shown at another, and normalized
        /// back through the capture zoom is unchanged.
        #[test]
        fn zoom_round_trip(
            x in coord(), y in coord(), w in coord(), h in coord(),
            z1 in zoom(), z2 in zoom(),
        ) {
            let g = Rect::new(x, y, w, h);
            let captured = g.scaled(z1);
            let displayed = Rect::new(
                rescale(captured.x, z1, z2),
                rescale(captured.y, z1, z2),
                rescale(captured.width, z1, z2),
                rescale(captured.height, z1, z2),
            );
            let back = displayed.scaled(1.0 / z2);
            prop_assert!((back.x - g.x).abs() < 1e-6);
            prop_assert!((back.y - g.y).abs() < 1e-6);
            prop_assert!((back.width - g.width).abs() < 1e-6);
            prop_assert!((back.height - g.height).abs() < 1e-6);

            let normalized = to_page_normalized(Point::new(captured.x, captured.y), z1);
            prop_assert!((normalized.x - g.x).abs() < 1e-6);
            prop_assert!((normalized.y - g.y).abs() < 1e-6);
        }

        #[test]
        fn pdf_flip_matches_formula(
            x in coord(), y in coord(), w in coord(), h in coord(),
            page_height in 100.0f64..3000.0,
        ) {
            let pdf = to_pdf_space(Rect::new(x, y, w, h), page_height);
            prop_assert_eq!(pdf.x, x);
            prop_assert!((pdf.y - (page_height - y - h)).abs() < 1e-9);
            prop_assert_eq!(pdf.width, w);
            prop_assert_eq!(pdf.height, h);

            let back = from_pdf_space(pdf, page_height);
            prop_assert!((back.y - y).abs() < 1e-6);
        }

        #[test]
        fn from_corners_is_order_independent(
            ax in coord(), ay in coord(), bx in coord(), by in coord(),
        ) {
            let a = Point::new(ax, ay);
            let b = Point::new(bx, by);
            let r1 = Rect::from_corners(a, b);
            let r2 = Rect::from_corners(b, a);
            prop_assert_eq!(r1, r2);
            prop_assert!(r1.width >= 0.0 && r1.height >= 0.0);
        }
    }
}
