//! Live overlay rendering.
//!
//! Detection runs on a dedicated frame-loop thread. Its results are handed
//! to the rendering task over a bounded tokio channel, and only the
//! [`LiveRenderer`] ever touches the [`OverlayLayer`]. The layer is rebuilt
//! from scratch for every update; nothing carries over between frames.

use crate::raster::draw_primitives;
use funnyface_core::{
    build_overlays, CoordinateConvention, FaceDetector, FaceObservation, FeatureSelection, FrameSource,
    OverlayPrimitive, OverlayStyle, Size,
};
use image::RgbaImage;
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Transient vector layer drawn over the live preview. The frame pixels
/// underneath are never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayLayer {
    width: u32,
    height: u32,
    sublayers: Vec<OverlayPrimitive>,
}

impl OverlayLayer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            sublayers: Vec::new(),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn clear(&mut self) {
        self.sublayers.clear();
    }

    pub fn add(&mut self, primitive: OverlayPrimitive) {
        self.sublayers.push(primitive);
    }

    pub fn sublayers(&self) -> &[OverlayPrimitive] {
        &self.sublayers
    }

    pub fn len(&self) -> usize {
        self.sublayers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sublayers.is_empty()
    }

    /// Draw the layer onto a fully transparent canvas of the layer's size.
    pub fn rasterize(&self) -> RgbaImage {
        let mut canvas = RgbaImage::new(self.width, self.height);
        draw_primitives(&mut canvas, &self.sublayers);
        canvas
    }
}

/// Detection result for one frame, sent from the frame loop to the renderer.
#[derive(Debug, Clone)]
pub struct LiveUpdate {
    pub sequence: u32,
    pub faces: Vec<FaceObservation>,
    pub convention: CoordinateConvention,
}

/// Sole owner and mutator of the live overlay layer.
pub struct LiveRenderer {
    layer: OverlayLayer,
    selection: FeatureSelection,
    style: OverlayStyle,
    last_sequence: Option<u32>,
}

impl LiveRenderer {
    /// Renderer for a preview viewport of `width` x `height` pixels.
    pub fn new(width: u32, height: u32, selection: FeatureSelection, style: OverlayStyle) -> Self {
        Self {
            layer: OverlayLayer::new(width, height),
            selection,
            style,
            last_sequence: None,
        }
    }

    pub fn layer(&self) -> &OverlayLayer {
        &self.layer
    }

    pub fn selection(&self) -> &FeatureSelection {
        &self.selection
    }

    /// Takes effect from the next update.
    pub fn set_selection(&mut self, selection: FeatureSelection) {
        self.selection = selection;
    }

    /// Sequence number of the last applied update.
    pub fn last_sequence(&self) -> Option<u32> {
        self.last_sequence
    }

    /// Replace every shape from the previous update with this update's shapes.
    pub fn apply(&mut self, update: &LiveUpdate) {
        let (w, h) = self.layer.size();
        let primitives = build_overlays(
            &update.faces,
            Size::new(w as f32, h as f32),
            update.convention,
            &self.selection,
            &self.style,
        );

        self.layer.clear();
        for primitive in primitives {
            self.layer.add(primitive);
        }
        self.last_sequence = Some(update.sequence);

        tracing::trace!(
            sequence = update.sequence,
            faces = update.faces.len(),
            sublayers = self.layer.len(),
            "overlay layer rebuilt"
        );
    }

    /// Drain updates on the rendering task until the frame loop hangs up,
    /// calling `present` after every rebuild.
    pub async fn run<F>(mut self, mut updates: mpsc::Receiver<LiveUpdate>, mut present: F) -> Self
    where
        F: FnMut(&OverlayLayer),
    {
        while let Some(update) = updates.recv().await {
            self.apply(&update);
            present(&self.layer);
        }
        tracing::debug!(last_sequence = ?self.last_sequence, "live renderer finished");
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FrameLoopConfig {
    /// Bounded channel depth between the frame loop and the renderer.
    pub capacity: usize,
    /// Stop after this many frames; `None` runs until the source ends.
    pub max_frames: Option<usize>,
    /// Drop an update when the channel is full instead of waiting for the
    /// renderer. Keeps the camera thread from stalling behind a slow consumer.
    pub discard_late: bool,
}

impl Default for FrameLoopConfig {
    fn default() -> Self {
        Self {
            capacity: 4,
            max_frames: None,
            discard_late: true,
        }
    }
}

/// Counters reported when the frame loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameLoopStats {
    /// Frames whose detection result was handed to the renderer.
    pub processed: usize,
    /// Frames dropped because detection failed.
    pub skipped: usize,
    /// Updates dropped because the renderer was still behind.
    pub late: usize,
}

/// Handle to the frame-loop thread.
pub struct FrameLoop {
    handle: JoinHandle<FrameLoopStats>,
}

impl FrameLoop {
    /// Wait for the thread to finish. Blocks; call off the async runtime.
    pub fn join(self) -> FrameLoopStats {
        match self.handle.join() {
            Ok(stats) => stats,
            Err(_) => {
                tracing::error!("frame loop thread panicked");
                FrameLoopStats::default()
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawn the camera-delivery thread.
///
/// Pulls frames from `source`, runs `detector` synchronously on each, and
/// sends one [`LiveUpdate`] per successful detection. A failed detection
/// skips that frame so the previous overlay stays up. With
/// [`FrameLoopConfig::discard_late`] an update that finds the channel full
/// is dropped; otherwise the thread waits for the renderer. The thread exits
/// when the source ends, the frame budget is spent, or the receiver is
/// dropped.
pub fn spawn_frame_loop<S, D>(
    mut source: S,
    mut detector: D,
    config: FrameLoopConfig,
) -> std::io::Result<(FrameLoop, mpsc::Receiver<LiveUpdate>)>
where
    S: FrameSource + Send + 'static,
    D: FaceDetector + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<LiveUpdate>(config.capacity.max(1));

    let handle = std::thread::Builder::new()
        .name("funnyface-frames".into())
        .spawn(move || {
            tracing::info!("frame loop started");
            let mut stats = FrameLoopStats::default();
            let mut seen = 0usize;

            while config.max_frames.map_or(true, |max| seen < max) {
                let Some(frame) = source.next_frame() else {
                    tracing::info!("frame source ended");
                    break;
                };
                seen += 1;

                let faces = match detector.detect(&frame.image) {
                    Ok(faces) => faces,
                    Err(e) => {
                        stats.skipped += 1;
                        tracing::debug!(
                            sequence = frame.sequence,
                            error = %e,
                            "detection failed; keeping previous overlay"
                        );
                        continue;
                    }
                };

                let update = LiveUpdate {
                    sequence: frame.sequence,
                    faces,
                    convention: detector.convention(),
                };
                if config.discard_late {
                    match tx.try_send(update) {
                        Ok(()) => {}
                        Err(TrySendError::Full(late)) => {
                            stats.late += 1;
                            tracing::trace!(sequence = late.sequence, "renderer behind; dropping update");
                            continue;
                        }
                        Err(TrySendError::Closed(_)) => {
                            tracing::debug!("renderer hung up; stopping frame loop");
                            break;
                        }
                    }
                } else if tx.blocking_send(update).is_err() {
                    tracing::debug!("renderer hung up; stopping frame loop");
                    break;
                }
                stats.processed += 1;
            }

            tracing::info!(
                processed = stats.processed,
                skipped = stats.skipped,
                late = stats.late,
                "frame loop exiting"
            );
            stats
        })?;

    Ok((FrameLoop { handle }, rx))
}
