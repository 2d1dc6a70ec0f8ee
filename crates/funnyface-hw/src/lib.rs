//! funnyface-hw: frame sources for the live overlay pipeline.
//!
//! V4L2 camera capture with RGBA conversion, plus image-sequence replay
//! for running without a camera.

pub mod camera;
pub mod frame;
pub mod replay;

pub use camera::{Camera, CameraError, CameraStream, DeviceInfo, PixelFormat};
pub use frame::FrameError;
pub use replay::ImageSequence;
