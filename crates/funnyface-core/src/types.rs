use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Face bounding box in normalized [0, 1] units relative to the image.
///
/// Which vertical edge `y` is measured from depends on the detector's
/// [`CoordinateConvention`](crate::geometry::CoordinateConvention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A landmark point in normalized [0, 1] units relative to the face bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f32,
    pub y: f32,
}

impl NormalizedPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Named landmark groups a platform face detector can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LandmarkGroup {
    FaceContour,
    LeftEye,
    RightEye,
    LeftEyebrow,
    RightEyebrow,
    Nose,
    NoseCrest,
    MedianLine,
    OuterLips,
    InnerLips,
    LeftPupil,
    RightPupil,
}

/// One detected face: a bounding box plus whatever landmark groups were found.
///
/// Groups the detector could not locate are simply absent from `landmarks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceObservation {
    pub bounding_box: NormalizedRect,
    #[serde(default)]
    pub landmarks: BTreeMap<LandmarkGroup, Vec<NormalizedPoint>>,
}

impl FaceObservation {
    pub fn new(bounding_box: NormalizedRect) -> Self {
        Self {
            bounding_box,
            landmarks: BTreeMap::new(),
        }
    }

    /// Builder-style helper for attaching a landmark group.
    pub fn with_group(mut self, group: LandmarkGroup, points: Vec<NormalizedPoint>) -> Self {
        self.landmarks.insert(group, points);
        self
    }

    /// Points of a landmark group. An empty group counts as absent.
    pub fn group(&self, group: LandmarkGroup) -> Option<&[NormalizedPoint]> {
        self.landmarks
            .get(&group)
            .map(Vec::as_slice)
            .filter(|points| !points.is_empty())
    }
}

/// Point in pixel space (top-left origin, y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    /// Smallest rectangle containing every point; empty at the origin for no points.
    pub fn bounding(points: &[Point]) -> Self {
        let Some(first) = points.first() else {
            return Self::default();
        };
        let (mut min, mut max) = (*first, *first);
        for p in points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Self::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }

    /// Rectangle of the given size whose center is `center`.
    pub fn centered_at(center: Point, width: f32, height: f32) -> Self {
        Self::new(center.x - width / 2.0, center.y - height / 2.0, width, height)
    }

    pub fn min_x(&self) -> f32 {
        self.origin.x
    }

    pub fn max_x(&self) -> f32 {
        self.origin.x + self.size.width
    }

    pub fn min_y(&self) -> f32 {
        self.origin.y
    }

    pub fn max_y(&self) -> f32 {
        self.origin.y + self.size.height
    }

    pub fn mid_x(&self) -> f32 {
        self.origin.x + self.size.width / 2.0
    }

    pub fn mid_y(&self) -> f32 {
        self.origin.y + self.size.height / 2.0
    }

    pub fn center(&self) -> Point {
        Point::new(self.mid_x(), self.mid_y())
    }

    /// Shrink by `dx` on the left and right and `dy` on the top and bottom.
    pub fn inset_by(&self, dx: f32, dy: f32) -> Self {
        Self::new(
            self.origin.x + dx,
            self.origin.y + dy,
            self.size.width - 2.0 * dx,
            self.size.height - 2.0 * dy,
        )
    }

    /// True when `other` lies entirely inside `self`.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.min_x() >= self.min_x()
            && other.max_x() <= self.max_x()
            && other.min_y() >= self.min_y()
            && other.max_y() <= self.max_y()
    }
}

/// 8-bit RGBA color, straight (non-premultiplied) alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const CLEAR: Color = Color { r: 0, g: 0, b: 0, a: 0 };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Same color with alpha set to `alpha` (0.0–1.0).
    pub fn with_alpha(self, alpha: f32) -> Self {
        Self {
            a: (alpha.clamp(0.0, 1.0) * 255.0).round() as u8,
            ..self
        }
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Comedic overlay features a user can toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Eyes,
    Mouth,
    Sunglasses,
}

impl Feature {
    pub const ALL: [Feature; 3] = [Feature::Eyes, Feature::Mouth, Feature::Sunglasses];

    pub fn name(self) -> &'static str {
        match self {
            Feature::Eyes => "eyes",
            Feature::Mouth => "mouth",
            Feature::Sunglasses => "sunglasses",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown feature {0:?} (expected eyes, mouth or sunglasses)")]
pub struct ParseFeatureError(pub String);

impl FromStr for Feature {
    type Err = ParseFeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eyes" => Ok(Feature::Eyes),
            "mouth" => Ok(Feature::Mouth),
            "sunglasses" => Ok(Feature::Sunglasses),
            _ => Err(ParseFeatureError(s.to_string())),
        }
    }
}

/// Set of enabled features. Defaults to `{eyes}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSelection(BTreeSet<Feature>);

impl Default for FeatureSelection {
    fn default() -> Self {
        Self::from_iter([Feature::Eyes])
    }
}

impl FeatureSelection {
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    pub fn all() -> Self {
        Self::from_iter(Feature::ALL)
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.0.contains(&feature)
    }

    pub fn insert(&mut self, feature: Feature) -> bool {
        self.0.insert(feature)
    }

    pub fn remove(&mut self, feature: Feature) -> bool {
        self.0.remove(&feature)
    }

    /// Enable or disable `feature`, mirroring a toggle switch.
    pub fn set(&mut self, feature: Feature, enabled: bool) {
        if enabled {
            self.0.insert(feature);
        } else {
            self.0.remove(&feature);
        }
    }

    pub fn toggle(&mut self, feature: Feature) {
        let enabled = self.contains(feature);
        self.set(feature, !enabled);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Feature> for FeatureSelection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl FromStr for FeatureSelection {
    type Err = ParseFeatureError;

    /// Comma-separated feature names; `""` or `"none"` is the empty set.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("none") {
            return Ok(Self::empty());
        }
        s.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(str::parse::<Feature>)
            .collect()
    }
}

impl fmt::Display for FeatureSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.iter().map(Feature::name).collect();
        f.write_str(&names.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_selection_is_eyes() {
        let selection = FeatureSelection::default();
        assert!(selection.contains(Feature::Eyes));
        assert!(!selection.contains(Feature::Mouth));
        assert!(!selection.contains(Feature::Sunglasses));
    }

    #[test]
    fn test_selection_parse() {
        let selection: FeatureSelection = "mouth, Sunglasses".parse().unwrap();
        assert!(!selection.contains(Feature::Eyes));
        assert!(selection.contains(Feature::Mouth));
        assert!(selection.contains(Feature::Sunglasses));
        assert_eq!(selection.to_string(), "mouth,sunglasses");
    }

    #[test]
    fn test_selection_parse_none() {
        assert!("none".parse::<FeatureSelection>().unwrap().is_empty());
        assert!("".parse::<FeatureSelection>().unwrap().is_empty());
        assert_eq!(FeatureSelection::empty().to_string(), "none");
    }

    #[test]
    fn test_selection_parse_unknown() {
        let err = "eyes,hat".parse::<FeatureSelection>().unwrap_err();
        assert_eq!(err, ParseFeatureError("hat".into()));
    }

    #[test]
    fn test_selection_toggle() {
        let mut selection = FeatureSelection::default();
        selection.toggle(Feature::Eyes);
        selection.toggle(Feature::Mouth);
        assert!(!selection.contains(Feature::Eyes));
        assert!(selection.contains(Feature::Mouth));
    }

    #[test]
    fn test_empty_group_is_absent() {
        let face = FaceObservation::new(NormalizedRect { x: 0.0, y: 0.0, width: 1.0, height: 1.0 })
            .with_group(LandmarkGroup::OuterLips, vec![]);
        assert!(face.group(LandmarkGroup::OuterLips).is_none());
        assert!(face.group(LandmarkGroup::LeftPupil).is_none());
    }

    #[test]
    fn test_observation_json_uses_group_names() {
        let json = r#"{
            "bounding_box": {"x": 0.1, "y": 0.2, "width": 0.3, "height": 0.4},
            "landmarks": {"leftPupil": [{"x": 0.25, "y": 0.6}]}
        }"#;
        let face: FaceObservation = serde_json::from_str(json).unwrap();
        let pupil = face.group(LandmarkGroup::LeftPupil).unwrap();
        assert_eq!(pupil, &[NormalizedPoint::new(0.25, 0.6)]);
    }

    #[test]
    fn test_color_with_alpha() {
        assert_eq!(Color::BLACK.with_alpha(0.8).a, 204);
        assert_eq!(Color::RED.with_alpha(0.6).a, 153);
        assert_eq!(Color::WHITE.with_alpha(2.0).a, 255);
    }

    #[test]
    fn test_rect_inset_and_contains() {
        let outer = Rect::new(10.0, 10.0, 100.0, 100.0);
        let inner = outer.inset_by(25.0, 25.0);
        assert_eq!(inner, Rect::new(35.0, 35.0, 50.0, 50.0));
        assert!(outer.contains_rect(&inner));
        assert!(!inner.contains_rect(&outer));
    }
}
