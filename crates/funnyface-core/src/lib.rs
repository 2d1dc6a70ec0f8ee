//! funnyface-core — Landmark geometry and overlay primitives.
//!
//! Maps the normalized output of a platform face detector into pixel space
//! and builds the comedic overlay shapes (eyes, mouth, sunglasses) for the
//! enabled features.

pub mod detector;
pub mod geometry;
pub mod overlay;
pub mod source;
pub mod types;

pub use detector::{DetectorError, FaceDetector, RecordedDetector, Recording};
pub use geometry::{CoordinateConvention, FaceFrame};
pub use overlay::{build_face_overlays, build_overlays, OverlayPrimitive, OverlayStyle, Stroke, StyleProfile};
pub use source::{FrameSource, VideoFrame};
pub use types::{
    Color, FaceObservation, Feature, FeatureSelection, LandmarkGroup, NormalizedPoint, NormalizedRect,
    ParseFeatureError, Point, Rect, Size,
};
