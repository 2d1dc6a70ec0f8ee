//! Rasterization of overlay primitives onto RGBA canvases.
//!
//! Every shape is first drawn as coverage into a grayscale mask sized to the
//! shape's bounds, then the mask is blended onto the canvas. imageproc's
//! filled shapes revisit some pixels, so blending through a mask is what
//! keeps translucent fills from compounding.

use funnyface_core::{Color, OverlayPrimitive, Point, Rect, Stroke};
use image::{GrayImage, Luma, Pixel, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_ellipse_mut, draw_filled_rect_mut, draw_hollow_ellipse_mut,
    draw_line_segment_mut, draw_polygon_mut,
};
use imageproc::point::Point as PixelPoint;
use imageproc::rect::Rect as PixelRect;

const COVERED: Luma<u8> = Luma([255]);

/// Draw `primitives` onto `canvas` in order.
pub fn draw_primitives(canvas: &mut RgbaImage, primitives: &[OverlayPrimitive]) {
    for primitive in primitives {
        draw_primitive(canvas, primitive);
    }
}

/// Fill, then stroke, a single primitive. Degenerate shapes draw nothing.
pub fn draw_primitive(canvas: &mut RgbaImage, primitive: &OverlayPrimitive) {
    match primitive {
        OverlayPrimitive::Ellipse {
            center,
            radius_x,
            radius_y,
            fill,
            stroke,
        } => draw_ellipse(canvas, *center, *radius_x, *radius_y, *fill, stroke.as_ref()),
        OverlayPrimitive::FilledPolygon { vertices, fill, stroke } => {
            draw_polygon(canvas, vertices, *fill, stroke.as_ref())
        }
        OverlayPrimitive::Rectangle {
            origin,
            size,
            fill,
            corner_radius,
        } => draw_rect(
            canvas,
            Rect { origin: *origin, size: *size },
            *fill,
            *corner_radius,
        ),
    }
}

/// Coverage mask covering a clipped window of the canvas.
struct Mask {
    coverage: GrayImage,
    x0: i32,
    y0: i32,
}

impl Mask {
    /// Mask over `bounds` grown by `pad` pixels, clipped to the canvas.
    /// `None` when nothing of it is visible.
    fn over(canvas: &RgbaImage, bounds: Rect, pad: f32) -> Option<Self> {
        let (cw, ch) = canvas.dimensions();
        let x0 = ((bounds.min_x() - pad).floor() as i64).max(0);
        let y0 = ((bounds.min_y() - pad).floor() as i64).max(0);
        let x1 = ((bounds.max_x() + pad).ceil() as i64 + 1).min(cw as i64);
        let y1 = ((bounds.max_y() + pad).ceil() as i64 + 1).min(ch as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(Self {
            coverage: GrayImage::new((x1 - x0) as u32, (y1 - y0) as u32),
            x0: x0 as i32,
            y0: y0 as i32,
        })
    }

    fn local(&self, p: Point) -> (f32, f32) {
        (p.x - self.x0 as f32, p.y - self.y0 as f32)
    }

    fn local_i(&self, p: Point) -> (i32, i32) {
        let (x, y) = self.local(p);
        (x.round() as i32, y.round() as i32)
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let (lx, ly) = self.local(Point::new(x, y));
        let w = width.round();
        let h = height.round();
        if w < 1.0 || h < 1.0 {
            return;
        }
        let rect = PixelRect::at(lx.round() as i32, ly.round() as i32).of_size(w as u32, h as u32);
        draw_filled_rect_mut(&mut self.coverage, rect, COVERED);
    }

    /// Zero coverage outside the pixel span `fill_rect` would give the same rectangle.
    fn clip_to_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let (lx, ly) = self.local(Point::new(x, y));
        let (x0, y0) = (lx.round() as i64, ly.round() as i64);
        let (x1, y1) = (x0 + width.round() as i64, y0 + height.round() as i64);
        for (px, py, coverage) in self.coverage.enumerate_pixels_mut() {
            let (px, py) = (px as i64, py as i64);
            if px < x0 || px >= x1 || py < y0 || py >= y1 {
                coverage[0] = 0;
            }
        }
    }

    fn blend_onto(&self, canvas: &mut RgbaImage, color: Color) {
        let rgba = Rgba(color.to_rgba());
        for (x, y, coverage) in self.coverage.enumerate_pixels() {
            if coverage[0] > 0 {
                let cx = x + self.x0 as u32;
                let cy = y + self.y0 as u32;
                canvas.get_pixel_mut(cx, cy).blend(&rgba);
            }
        }
    }
}

/// Integer offsets spanning a stroke of `width` pixels centered on the path.
fn stroke_offsets(width: f32) -> std::ops::RangeInclusive<i32> {
    let w = width.round().max(1.0) as i32;
    -(w / 2)..=(w - 1) / 2
}

fn draw_ellipse(
    canvas: &mut RgbaImage,
    center: Point,
    radius_x: f32,
    radius_y: f32,
    fill: Color,
    stroke: Option<&Stroke>,
) {
    let rx = radius_x.round() as i32;
    let ry = radius_y.round() as i32;
    if rx <= 0 || ry <= 0 {
        return;
    }
    let bounds = Rect::centered_at(center, radius_x * 2.0, radius_y * 2.0);

    if fill.a > 0 {
        if let Some(mut mask) = Mask::over(canvas, bounds, 1.0) {
            let c = mask.local_i(center);
            draw_filled_ellipse_mut(&mut mask.coverage, c, rx, ry, COVERED);
            mask.blend_onto(canvas, fill);
        }
    }

    if let Some(stroke) = stroke.filter(|s| s.color.a > 0) {
        if let Some(mut mask) = Mask::over(canvas, bounds, stroke.width + 1.0) {
            let c = mask.local_i(center);
            for k in stroke_offsets(stroke.width) {
                if rx + k > 0 && ry + k > 0 {
                    draw_hollow_ellipse_mut(&mut mask.coverage, c, rx + k, ry + k, COVERED);
                }
            }
            mask.blend_onto(canvas, stroke.color);
        }
    }
}

fn draw_polygon(canvas: &mut RgbaImage, vertices: &[Point], fill: Color, stroke: Option<&Stroke>) {
    let bounds = Rect::bounding(vertices);

    if fill.a > 0 {
        if let Some(mut mask) = Mask::over(canvas, bounds, 1.0) {
            let mut points: Vec<PixelPoint<i32>> = Vec::with_capacity(vertices.len());
            for &v in vertices {
                let (x, y) = mask.local_i(v);
                let p = PixelPoint::new(x, y);
                if points.last() != Some(&p) {
                    points.push(p);
                }
            }
            // imageproc rejects an explicitly closed ring.
            while points.len() > 1 && points.first() == points.last() {
                points.pop();
            }
            if points.len() >= 3 {
                draw_polygon_mut(&mut mask.coverage, &points, COVERED);
                mask.blend_onto(canvas, fill);
            }
        }
    }

    if vertices.len() < 2 {
        return;
    }
    if let Some(stroke) = stroke.filter(|s| s.color.a > 0) {
        if let Some(mut mask) = Mask::over(canvas, bounds, stroke.width + 1.0) {
            let n = vertices.len();
            for i in 0..n {
                let (ax, ay) = mask.local(vertices[i]);
                let (bx, by) = mask.local(vertices[(i + 1) % n]);
                let (dx, dy) = (bx - ax, by - ay);
                let len = dx.hypot(dy);
                if len <= f32::EPSILON {
                    continue;
                }
                let (nx, ny) = (-dy / len, dx / len);
                for k in stroke_offsets(stroke.width) {
                    let k = k as f32;
                    draw_line_segment_mut(
                        &mut mask.coverage,
                        (ax + nx * k, ay + ny * k),
                        (bx + nx * k, by + ny * k),
                        COVERED,
                    );
                }
            }
            // Round joins so thick outlines have no notches at the corners.
            let join = (stroke.width / 2.0).floor() as i32;
            if join > 0 {
                for &v in vertices {
                    let c = mask.local_i(v);
                    draw_filled_circle_mut(&mut mask.coverage, c, join, COVERED);
                }
            }
            mask.blend_onto(canvas, stroke.color);
        }
    }
}

fn draw_rect(canvas: &mut RgbaImage, rect: Rect, fill: Color, corner_radius: f32) {
    if fill.a == 0 || rect.size.width < 0.5 || rect.size.height < 0.5 {
        return;
    }
    let Some(mut mask) = Mask::over(canvas, rect, 1.0) else {
        return;
    };

    let r = corner_radius
        .min(rect.size.width / 2.0)
        .min(rect.size.height / 2.0);
    let (x, y, w, h) = (rect.min_x(), rect.min_y(), rect.size.width, rect.size.height);

    if r < 1.0 {
        mask.fill_rect(x, y, w, h);
    } else {
        mask.fill_rect(x + r, y, w - 2.0 * r, h);
        mask.fill_rect(x, y + r, w, h - 2.0 * r);
        let radius = r.floor() as i32;
        for corner in [
            Point::new(x + r, y + r),
            Point::new(x + w - r, y + r),
            Point::new(x + r, y + h - r),
            Point::new(x + w - r, y + h - r),
        ] {
            let c = mask.local_i(corner);
            draw_filled_circle_mut(&mut mask.coverage, c, radius, COVERED);
        }
        mask.clip_to_rect(x, y, w, h);
    }
    mask.blend_onto(canvas, fill);
}
