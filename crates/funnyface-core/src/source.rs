//! Live frame source contract.

use image::RgbaImage;

/// One frame delivered by a live source.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub image: RgbaImage,
    /// Monotonic sequence number assigned by the source.
    pub sequence: u32,
}

/// A continuous sequence of frames, e.g. a camera.
///
/// Sources drop frames they cannot decode on their own; `None` means the
/// stream has ended.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<VideoFrame>;

    /// Viewport size the frames are shown at, if known ahead of the first frame.
    fn dimensions(&self) -> Option<(u32, u32)> {
        None
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Option<VideoFrame> {
        (**self).next_frame()
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        (**self).dimensions()
    }
}
