//! Landmark geometry mapping.
//!
//! Converts a face's normalized bounding box and face-relative landmark
//! points into pixel coordinates. The output space is always top-left
//! origin with y growing downward, matching image rows. Detectors that
//! report bottom-left-origin values are flipped here, once, and drawing
//! code never flips again.

use crate::types::{NormalizedPoint, NormalizedRect, Point, Rect, Size};
use serde::{Deserialize, Serialize};

/// Vertical origin of the normalized values a detector reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateConvention {
    /// y = 0 is the bottom edge (platform vision libraries).
    #[default]
    BottomLeft,
    /// y = 0 is the top edge (most ONNX detectors, image crates).
    TopLeft,
}

impl CoordinateConvention {
    pub fn flips_vertically(self) -> bool {
        matches!(self, CoordinateConvention::BottomLeft)
    }
}

/// A face's bounding box resolved against a concrete canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceFrame {
    rect: Rect,
    convention: CoordinateConvention,
}

impl FaceFrame {
    /// Resolve `bbox` against a canvas of `canvas` pixels.
    pub fn new(bbox: &NormalizedRect, canvas: Size, convention: CoordinateConvention) -> Self {
        let width = bbox.width * canvas.width;
        let height = bbox.height * canvas.height;
        let x = bbox.x * canvas.width;
        let y = match convention {
            CoordinateConvention::BottomLeft => (1.0 - bbox.y - bbox.height) * canvas.height,
            CoordinateConvention::TopLeft => bbox.y * canvas.height,
        };

        Self {
            rect: Rect::new(x, y, width, height),
            convention,
        }
    }

    /// Face rectangle in pixel space.
    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn convention(&self) -> CoordinateConvention {
        self.convention
    }

    /// Map a face-relative normalized point into pixel space.
    pub fn map_point(&self, p: NormalizedPoint) -> Point {
        let x = self.rect.origin.x + p.x * self.rect.size.width;
        let y = if self.convention.flips_vertically() {
            self.rect.origin.y + (1.0 - p.y) * self.rect.size.height
        } else {
            self.rect.origin.y + p.y * self.rect.size.height
        };
        Point::new(x, y)
    }

    pub fn map_group(&self, points: &[NormalizedPoint]) -> Vec<Point> {
        points.iter().map(|&p| self.map_point(p)).collect()
    }
}

/// Mean of a landmark group, still in normalized face-relative units.
///
/// Returns `None` for an empty group.
pub fn centroid(points: &[NormalizedPoint]) -> Option<NormalizedPoint> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f32;
    let (sum_x, sum_y) = points
        .iter()
        .fold((0.0f32, 0.0f32), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(NormalizedPoint::new(sum_x / n, sum_y / n))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-3;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < EPS && (a.y - b.y).abs() < EPS
    }

    fn bbox() -> NormalizedRect {
        NormalizedRect { x: 0.2, y: 0.1, width: 0.4, height: 0.5 }
    }

    #[test]
    fn test_face_rect_bottom_left() {
        let frame = FaceFrame::new(&bbox(), Size::new(1000.0, 800.0), CoordinateConvention::BottomLeft);
        let rect = frame.rect();
        assert!((rect.origin.x - 200.0).abs() < EPS);
        // (1 - 0.1 - 0.5) * 800
        assert!((rect.origin.y - 320.0).abs() < EPS);
        assert!((rect.size.width - 400.0).abs() < EPS);
        assert!((rect.size.height - 400.0).abs() < EPS);
    }

    #[test]
    fn test_face_rect_top_left() {
        let frame = FaceFrame::new(&bbox(), Size::new(1000.0, 800.0), CoordinateConvention::TopLeft);
        let rect = frame.rect();
        assert!((rect.origin.x - 200.0).abs() < EPS);
        assert!((rect.origin.y - 80.0).abs() < EPS);
    }

    #[test]
    fn test_unit_corners_map_to_opposite_corners() {
        for convention in [CoordinateConvention::BottomLeft, CoordinateConvention::TopLeft] {
            let frame = FaceFrame::new(&bbox(), Size::new(640.0, 480.0), convention);
            let rect = frame.rect();
            let a = frame.map_point(NormalizedPoint::new(0.0, 0.0));
            let b = frame.map_point(NormalizedPoint::new(1.0, 1.0));

            // x always runs left to right
            assert!((a.x - rect.min_x()).abs() < EPS);
            assert!((b.x - rect.max_x()).abs() < EPS);

            let (expected_a, expected_b) = match convention {
                CoordinateConvention::BottomLeft => (rect.max_y(), rect.min_y()),
                CoordinateConvention::TopLeft => (rect.min_y(), rect.max_y()),
            };
            assert!((a.y - expected_a).abs() < EPS, "{convention:?}: {a:?}");
            assert!((b.y - expected_b).abs() < EPS, "{convention:?}: {b:?}");
        }
    }

    #[test]
    fn test_bottom_left_flip_applied_once() {
        // A whole-image face in bottom-left space: a point near the top of the
        // face (y = 0.9) must land near the top of the canvas.
        let full = NormalizedRect { x: 0.0, y: 0.0, width: 1.0, height: 1.0 };
        let frame = FaceFrame::new(&full, Size::new(100.0, 100.0), CoordinateConvention::BottomLeft);
        let p = frame.map_point(NormalizedPoint::new(0.5, 0.9));
        assert!(close(p, Point::new(50.0, 10.0)), "{p:?}");
    }

    #[test]
    fn test_map_group_preserves_order() {
        let frame = FaceFrame::new(&bbox(), Size::new(100.0, 100.0), CoordinateConvention::TopLeft);
        let pts = frame.map_group(&[NormalizedPoint::new(0.0, 0.0), NormalizedPoint::new(1.0, 0.0)]);
        assert_eq!(pts.len(), 2);
        assert!(pts[0].x < pts[1].x);
    }

    #[test]
    fn test_centroid() {
        let c = centroid(&[
            NormalizedPoint::new(0.0, 0.0),
            NormalizedPoint::new(1.0, 0.0),
            NormalizedPoint::new(1.0, 1.0),
            NormalizedPoint::new(0.0, 1.0),
        ])
        .unwrap();
        assert!((c.x - 0.5).abs() < EPS);
        assert!((c.y - 0.5).abs() < EPS);
        assert!(centroid(&[]).is_none());
    }
}
