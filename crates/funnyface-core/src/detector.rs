//! Face detector contract and a recorded-observation implementation.
//!
//! Detection itself belongs to the platform vision library. This crate only
//! fixes the shape of what a detector hands back: normalized bounding boxes
//! plus named landmark groups, in a documented coordinate convention.

use crate::geometry::CoordinateConvention;
use crate::types::FaceObservation;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("detector unavailable: {0}")]
    Unavailable(String),
    #[error("cannot build image representation: {0}")]
    ImageRepresentation(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// A face detector backed by some external vision library.
pub trait FaceDetector {
    /// Convention of the normalized values returned by [`detect`](Self::detect).
    fn convention(&self) -> CoordinateConvention;

    /// Detect faces in `image`. An empty list is a valid result.
    fn detect(&mut self, image: &RgbaImage) -> Result<Vec<FaceObservation>, DetectorError>;
}

impl<D: FaceDetector + ?Sized> FaceDetector for Box<D> {
    fn convention(&self) -> CoordinateConvention {
        (**self).convention()
    }

    fn detect(&mut self, image: &RgbaImage) -> Result<Vec<FaceObservation>, DetectorError> {
        (**self).detect(image)
    }
}

/// On-disk recording of detector output, one entry per frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    #[serde(default)]
    pub convention: CoordinateConvention,
    pub frames: Vec<Vec<FaceObservation>>,
}

/// Replays observations previously captured from a platform detector.
///
/// Each call to `detect` returns the next recorded frame, wrapping around
/// at the end, so a one-frame recording serves both still images and a
/// live feed.
pub struct RecordedDetector {
    recording: Recording,
    cursor: usize,
}

impl RecordedDetector {
    pub fn new(recording: Recording) -> Self {
        Self { recording, cursor: 0 }
    }

    /// Single frame of faces, reported in `convention`.
    pub fn from_faces(convention: CoordinateConvention, faces: Vec<FaceObservation>) -> Self {
        Self::new(Recording {
            convention,
            frames: vec![faces],
        })
    }

    pub fn from_json(json: &str) -> Result<Self, DetectorError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Load a JSON recording from disk.
    pub fn load(path: &Path) -> Result<Self, DetectorError> {
        let json = std::fs::read_to_string(path)?;
        let detector = Self::from_json(&json)?;
        tracing::info!(
            path = %path.display(),
            frames = detector.recording.frames.len(),
            convention = ?detector.recording.convention,
            "loaded detector recording"
        );
        Ok(detector)
    }

    pub fn recording(&self) -> &Recording {
        &self.recording
    }
}

impl FaceDetector for RecordedDetector {
    fn convention(&self) -> CoordinateConvention {
        self.recording.convention
    }

    fn detect(&mut self, image: &RgbaImage) -> Result<Vec<FaceObservation>, DetectorError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(DetectorError::ImageRepresentation(format!(
                "zero-sized image {}x{}",
                image.width(),
                image.height()
            )));
        }
        if self.recording.frames.is_empty() {
            return Err(DetectorError::Unavailable("recording has no frames".into()));
        }

        let faces = self.recording.frames[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.recording.frames.len();
        tracing::trace!(faces = faces.len(), "replayed detection");
        Ok(faces)
    }
}
