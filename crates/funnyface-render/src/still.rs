//! Static compositor for still photos.

use crate::raster::draw_primitives;
use funnyface_core::{build_overlays, FaceDetector, FeatureSelection, OverlayPrimitive, OverlayStyle, Size};
use image::RgbaImage;

/// Copy `source` and rasterize `primitives` onto the copy, in order.
///
/// Primitives are already in top-left pixel space; no flip happens here.
pub fn composite(source: &RgbaImage, primitives: &[OverlayPrimitive]) -> RgbaImage {
    let mut canvas = source.clone();
    draw_primitives(&mut canvas, primitives);
    canvas
}

/// What a call to [`StillPipeline::apply`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied { faces: usize, primitives: usize },
    /// The detector failed; the displayed image was left as it was.
    DetectorFailed,
}

/// Still-image pipeline: keeps the untouched original next to the displayed result.
///
/// Every [`apply`](Self::apply) starts over from the original, so toggling
/// features and reapplying never stacks overlays.
pub struct StillPipeline {
    original: RgbaImage,
    displayed: RgbaImage,
}

impl StillPipeline {
    pub fn new(original: RgbaImage) -> Self {
        let displayed = original.clone();
        Self { original, displayed }
    }

    pub fn original(&self) -> &RgbaImage {
        &self.original
    }

    pub fn displayed(&self) -> &RgbaImage {
        &self.displayed
    }

    pub fn into_displayed(self) -> RgbaImage {
        self.displayed
    }

    /// Drop any applied overlays.
    pub fn reset(&mut self) {
        self.displayed = self.original.clone();
    }

    /// Detect faces in the original and replace the displayed image with an
    /// overlaid copy. A detector failure is logged and leaves the displayed
    /// image unchanged.
    pub fn apply<D: FaceDetector + ?Sized>(
        &mut self,
        detector: &mut D,
        selection: &FeatureSelection,
        style: &OverlayStyle,
    ) -> ApplyOutcome {
        let faces = match detector.detect(&self.original) {
            Ok(faces) => faces,
            Err(e) => {
                tracing::warn!(error = %e, "face detection failed; keeping displayed image");
                return ApplyOutcome::DetectorFailed;
            }
        };

        let (w, h) = self.original.dimensions();
        let primitives = build_overlays(
            &faces,
            Size::new(w as f32, h as f32),
            detector.convention(),
            selection,
            style,
        );
        self.displayed = composite(&self.original, &primitives);

        tracing::info!(
            faces = faces.len(),
            primitives = primitives.len(),
            %selection,
            "applied overlays to still image"
        );
        ApplyOutcome::Applied {
            faces: faces.len(),
            primitives: primitives.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use funnyface_core::{
        CoordinateConvention, DetectorError, FaceObservation, LandmarkGroup, NormalizedPoint, NormalizedRect,
        RecordedDetector, Recording,
    };
    use image::Rgba;

    fn photo() -> RgbaImage {
        RgbaImage::from_fn(200, 160, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 90, 255]))
    }

    fn face() -> FaceObservation {
        FaceObservation::new(NormalizedRect { x: 0.25, y: 0.2, width: 0.5, height: 0.6 })
            .with_group(LandmarkGroup::LeftPupil, vec![NormalizedPoint::new(0.3, 0.65)])
            .with_group(LandmarkGroup::RightPupil, vec![NormalizedPoint::new(0.7, 0.65)])
            .with_group(
                LandmarkGroup::OuterLips,
                vec![
                    NormalizedPoint::new(0.3, 0.25),
                    NormalizedPoint::new(0.5, 0.3),
                    NormalizedPoint::new(0.7, 0.25),
                    NormalizedPoint::new(0.5, 0.15),
                ],
            )
    }

    struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn convention(&self) -> CoordinateConvention {
            CoordinateConvention::BottomLeft
        }

        fn detect(&mut self, _image: &RgbaImage) -> Result<Vec<FaceObservation>, DetectorError> {
            Err(DetectorError::Unavailable("no vision backend".into()))
        }
    }

    #[test]
    fn test_zero_faces_leaves_image_identical() {
        let mut pipeline = StillPipeline::new(photo());
        let mut detector = RecordedDetector::from_faces(CoordinateConvention::BottomLeft, vec![]);
        let outcome = pipeline.apply(&mut detector, &FeatureSelection::all(), &OverlayStyle::still());

        assert_eq!(outcome, ApplyOutcome::Applied { faces: 0, primitives: 0 });
        assert_eq!(pipeline.displayed().as_raw(), photo().as_raw());
    }

    #[test]
    fn test_apply_draws_overlays() {
        let mut pipeline = StillPipeline::new(photo());
        let mut detector = RecordedDetector::from_faces(CoordinateConvention::BottomLeft, vec![face()]);
        let outcome = pipeline.apply(&mut detector, &FeatureSelection::all(), &OverlayStyle::still());

        assert_eq!(outcome, ApplyOutcome::Applied { faces: 1, primitives: 8 });
        assert_ne!(pipeline.displayed(), pipeline.original());
        assert_eq!(pipeline.original(), &photo());

        // Left pupil: face rect (50, 32, 100, 96) -> (80, 32 + 0.35 * 96)
        let px = pipeline.displayed().get_pixel(80, 66);
        assert_eq!(px, &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_reapply_is_idempotent() {
        let mut pipeline = StillPipeline::new(photo());
        let mut detector = RecordedDetector::from_faces(CoordinateConvention::BottomLeft, vec![face()]);
        let selection = FeatureSelection::all();

        pipeline.apply(&mut detector, &selection, &OverlayStyle::still());
        let first = pipeline.displayed().clone();
        pipeline.apply(&mut detector, &selection, &OverlayStyle::still());
        assert_eq!(pipeline.displayed(), &first);
    }

    #[test]
    fn test_toggle_and_reapply_starts_from_original() {
        let mut pipeline = StillPipeline::new(photo());
        let mut detector = RecordedDetector::from_faces(CoordinateConvention::BottomLeft, vec![face()]);

        pipeline.apply(&mut detector, &FeatureSelection::all(), &OverlayStyle::still());
        pipeline.apply(&mut detector, &FeatureSelection::empty(), &OverlayStyle::still());
        assert_eq!(pipeline.displayed(), pipeline.original());
    }

    #[test]
    fn test_detector_failure_keeps_displayed() {
        let mut pipeline = StillPipeline::new(photo());
        let mut detector = RecordedDetector::from_faces(CoordinateConvention::BottomLeft, vec![face()]);
        pipeline.apply(&mut detector, &FeatureSelection::default(), &OverlayStyle::still());
        let before = pipeline.displayed().clone();

        let outcome = pipeline.apply(&mut FailingDetector, &FeatureSelection::all(), &OverlayStyle::still());
        assert_eq!(outcome, ApplyOutcome::DetectorFailed);
        assert_eq!(pipeline.displayed(), &before);
    }

    #[test]
    fn test_empty_recording_is_a_failure_not_a_panic() {
        let mut pipeline = StillPipeline::new(photo());
        let mut detector = RecordedDetector::new(Recording::default());
        let outcome = pipeline.apply(&mut detector, &FeatureSelection::all(), &OverlayStyle::still());
        assert_eq!(outcome, ApplyOutcome::DetectorFailed);
        assert_eq!(pipeline.displayed(), pipeline.original());
    }

    #[test]
    fn test_reset() {
        let mut pipeline = StillPipeline::new(photo());
        let mut detector = RecordedDetector::from_faces(CoordinateConvention::BottomLeft, vec![face()]);
        pipeline.apply(&mut detector, &FeatureSelection::all(), &OverlayStyle::still());
        pipeline.reset();
        assert_eq!(pipeline.displayed(), pipeline.original());
    }

    #[test]
    fn test_composite_does_not_touch_source() {
        let source = photo();
        let prims = build_overlays(
            &[face()],
            Size::new(200.0, 160.0),
            CoordinateConvention::BottomLeft,
            &FeatureSelection::all(),
            &OverlayStyle::still(),
        );
        let out = composite(&source, &prims);
        assert_eq!(source, photo());
        assert_eq!(out.dimensions(), source.dimensions());
        assert_ne!(out, source);
    }
}
