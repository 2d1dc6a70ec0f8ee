//! Overlay primitive builder.
//!
//! Turns a face observation plus the enabled features into drawable shapes.
//! All sizing and styling constants live in [`OverlayStyle`]; there are two
//! profiles, one tuned for still photos and one for the live preview.

use crate::geometry::{centroid, CoordinateConvention, FaceFrame};
use crate::types::{
    Color, FaceObservation, Feature, FeatureSelection, LandmarkGroup, Point, Rect, Size,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Eye rule used when the detector reports pupils.
const PUPIL_EYE_DIAMETER_OF_FACE_WIDTH: f32 = 0.12;
const PUPIL_INSET_OF_DIAMETER: f32 = 0.25;
// Eye rule used when only eye-region outlines are reported.
const REGION_EYE_RADIUS_OF_FACE_HEIGHT: f32 = 0.08;
const REGION_PUPIL_DIAMETER_OF_RADIUS: f32 = 0.6;

const MIN_MOUTH_POINTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: Color,
    pub width: f32,
}

/// A drawable shape in top-left-origin pixel space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverlayPrimitive {
    Ellipse {
        center: Point,
        radius_x: f32,
        radius_y: f32,
        fill: Color,
        stroke: Option<Stroke>,
    },
    FilledPolygon {
        vertices: Vec<Point>,
        fill: Color,
        stroke: Option<Stroke>,
    },
    Rectangle {
        origin: Point,
        size: Size,
        fill: Color,
        corner_radius: f32,
    },
}

impl OverlayPrimitive {
    /// Ellipse inscribed in `rect`.
    pub fn ellipse_in(rect: Rect, fill: Color, stroke: Option<Stroke>) -> Self {
        OverlayPrimitive::Ellipse {
            center: rect.center(),
            radius_x: rect.size.width / 2.0,
            radius_y: rect.size.height / 2.0,
            fill,
            stroke,
        }
    }

    /// Axis-aligned bounds of the fill area (strokes not included).
    pub fn bounds(&self) -> Rect {
        match self {
            OverlayPrimitive::Ellipse { center, radius_x, radius_y, .. } => {
                Rect::centered_at(*center, radius_x * 2.0, radius_y * 2.0)
            }
            OverlayPrimitive::FilledPolygon { vertices, .. } => Rect::bounding(vertices),
            OverlayPrimitive::Rectangle { origin, size, .. } => Rect { origin: *origin, size: *size },
        }
    }
}

/// Placement of the two sunglasses lenses inside the face rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum SunglassesRule {
    /// Lenses of `width/3 × height/4`, vertically centered, `margin` px in
    /// from each side of the face.
    Inset { margin: f32 },
    /// Lenses at fractional offsets of the face rectangle.
    Fractional {
        left_x: f32,
        right_x_from_max: f32,
        top: f32,
        lens_width: f32,
        lens_height: f32,
    },
}

/// Every color and sizing constant the builder uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayStyle {
    pub eye_white: Color,
    pub eye_pupil: Color,
    pub eye_outline: Option<Stroke>,
    pub mouth_fill: Color,
    pub mouth_stroke: Option<Stroke>,
    pub sunglasses: SunglassesRule,
    pub lens_fill: Color,
    pub lens_stroke: Option<Stroke>,
    pub bridge_fill: Color,
    pub bridge_thickness: f32,
    pub bridge_corner_radius: f32,
}

impl OverlayStyle {
    /// Profile for shapes rasterized permanently into a still photo.
    pub fn still() -> Self {
        let lens = Color::BLACK.with_alpha(0.8);
        Self {
            eye_white: Color::WHITE,
            eye_pupil: Color::BLACK,
            eye_outline: None,
            mouth_fill: Color::RED,
            mouth_stroke: None,
            sunglasses: SunglassesRule::Inset { margin: 10.0 },
            lens_fill: lens,
            lens_stroke: None,
            bridge_fill: lens,
            bridge_thickness: 10.0,
            bridge_corner_radius: 0.0,
        }
    }

    /// Profile for the transient layer drawn over a live preview.
    pub fn live() -> Self {
        Self {
            eye_white: Color::WHITE,
            eye_pupil: Color::BLACK,
            eye_outline: Some(Stroke { color: Color::BLACK, width: 1.0 }),
            mouth_fill: Color::RED.with_alpha(0.6),
            mouth_stroke: Some(Stroke { color: Color::RED, width: 2.0 }),
            sunglasses: SunglassesRule::Fractional {
                left_x: 0.15,
                right_x_from_max: 0.45,
                top: 0.35,
                lens_width: 0.3,
                lens_height: 0.15,
            },
            lens_fill: Color::BLACK.with_alpha(0.8),
            lens_stroke: Some(Stroke { color: Color::BLACK, width: 3.0 }),
            bridge_fill: Color::BLACK,
            bridge_thickness: 3.0,
            bridge_corner_radius: 1.5,
        }
    }

    pub fn for_profile(profile: StyleProfile) -> Self {
        match profile {
            StyleProfile::Still => Self::still(),
            StyleProfile::Live => Self::live(),
        }
    }
}

/// Named [`OverlayStyle`] profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleProfile {
    #[default]
    Still,
    Live,
}

impl fmt::Display for StyleProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StyleProfile::Still => "still",
            StyleProfile::Live => "live",
        })
    }
}

impl FromStr for StyleProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "still" => Ok(StyleProfile::Still),
            "live" => Ok(StyleProfile::Live),
            other => Err(format!("unknown style profile {other:?} (expected still or live)")),
        }
    }
}

/// Build primitives for every face, concatenated in detection order.
pub fn build_overlays(
    faces: &[FaceObservation],
    canvas: Size,
    convention: CoordinateConvention,
    selection: &FeatureSelection,
    style: &OverlayStyle,
) -> Vec<OverlayPrimitive> {
    let mut primitives = Vec::new();
    for face in faces {
        let frame = FaceFrame::new(&face.bounding_box, canvas, convention);
        primitives.extend(build_face_overlays(face, &frame, selection, style));
    }
    tracing::debug!(
        faces = faces.len(),
        primitives = primitives.len(),
        %selection,
        "built overlays"
    );
    primitives
}

/// Build primitives for one face, in feature order eyes, mouth, sunglasses.
pub fn build_face_overlays(
    face: &FaceObservation,
    frame: &FaceFrame,
    selection: &FeatureSelection,
    style: &OverlayStyle,
) -> Vec<OverlayPrimitive> {
    let mut out = Vec::new();
    for feature in selection.iter() {
        match feature {
            Feature::Eyes => eyes(face, frame, style, &mut out),
            Feature::Mouth => mouth(face, frame, style, &mut out),
            Feature::Sunglasses => sunglasses(frame.rect(), style, &mut out),
        }
    }
    out
}

fn eyes(face: &FaceObservation, frame: &FaceFrame, style: &OverlayStyle, out: &mut Vec<OverlayPrimitive>) {
    let face_rect = frame.rect();
    let sides = [
        (LandmarkGroup::LeftPupil, LandmarkGroup::LeftEye),
        (LandmarkGroup::RightPupil, LandmarkGroup::RightEye),
    ];

    for (pupil_group, region_group) in sides {
        if let Some(&pupil) = face.group(pupil_group).and_then(|points| points.first()) {
            let diameter = face_rect.size.width * PUPIL_EYE_DIAMETER_OF_FACE_WIDTH;
            let inset = diameter * PUPIL_INSET_OF_DIAMETER;
            let white = Rect::centered_at(frame.map_point(pupil), diameter, diameter);
            out.push(OverlayPrimitive::ellipse_in(white, style.eye_white, style.eye_outline));
            out.push(OverlayPrimitive::ellipse_in(white.inset_by(inset, inset), style.eye_pupil, None));
        } else if let Some(center) = face.group(region_group).and_then(centroid) {
            let radius = face_rect.size.height * REGION_EYE_RADIUS_OF_FACE_HEIGHT;
            let pupil = radius * REGION_PUPIL_DIAMETER_OF_RADIUS;
            let center = frame.map_point(center);
            out.push(OverlayPrimitive::ellipse_in(
                Rect::centered_at(center, radius * 2.0, radius * 2.0),
                style.eye_white,
                style.eye_outline,
            ));
            out.push(OverlayPrimitive::ellipse_in(
                Rect::centered_at(center, pupil, pupil),
                style.eye_pupil,
                None,
            ));
        } else {
            tracing::trace!(group = ?pupil_group, "no pupil or eye landmarks; skipping eye");
        }
    }
}

fn mouth(face: &FaceObservation, frame: &FaceFrame, style: &OverlayStyle, out: &mut Vec<OverlayPrimitive>) {
    match face.group(LandmarkGroup::OuterLips) {
        Some(lips) if lips.len() >= MIN_MOUTH_POINTS => {
            out.push(OverlayPrimitive::FilledPolygon {
                vertices: frame.map_group(lips),
                fill: style.mouth_fill,
                stroke: style.mouth_stroke,
            });
        }
        lips => {
            tracing::trace!(points = lips.map_or(0, <[_]>::len), "outer lips unusable; skipping mouth");
        }
    }
}

fn sunglasses(face: Rect, style: &OverlayStyle, out: &mut Vec<OverlayPrimitive>) {
    let (left, right) = match style.sunglasses {
        SunglassesRule::Inset { margin } => {
            let lens_w = face.size.width / 3.0;
            let lens_h = face.size.height / 4.0;
            let y = face.mid_y() - lens_h / 2.0;
            (
                Rect::new(face.min_x() + margin, y, lens_w, lens_h),
                Rect::new(face.max_x() - lens_w - margin, y, lens_w, lens_h),
            )
        }
        SunglassesRule::Fractional {
            left_x,
            right_x_from_max,
            top,
            lens_width,
            lens_height,
        } => {
            let w = face.size.width;
            let h = face.size.height;
            let y = face.min_y() + h * top;
            (
                Rect::new(face.min_x() + w * left_x, y, w * lens_width, h * lens_height),
                Rect::new(face.max_x() - w * right_x_from_max, y, w * lens_width, h * lens_height),
            )
        }
    };

    out.push(OverlayPrimitive::ellipse_in(left, style.lens_fill, style.lens_stroke));
    out.push(OverlayPrimitive::ellipse_in(right, style.lens_fill, style.lens_stroke));

    // Lenses can overlap on very narrow faces; the bridge collapses to zero width.
    let gap = (right.min_x() - left.max_x()).max(0.0);
    out.push(OverlayPrimitive::Rectangle {
        origin: Point::new(left.max_x(), left.mid_y() - style.bridge_thickness / 2.0),
        size: Size::new(gap, style.bridge_thickness),
        fill: style.bridge_fill,
        corner_radius: style.bridge_corner_radius,
    });
}
