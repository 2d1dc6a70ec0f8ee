//! V4L2 camera capture via the `v4l` crate.

use crate::frame::{self, FrameError};
use funnyface_core::{FrameSource, VideoFrame};
use image::{imageops, RgbaImage};
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

const STREAM_BUFFERS: u32 = 4;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel).
    Yuyv,
    /// Motion-JPEG, one JPEG per buffer.
    Mjpg,
    /// 8-bit grayscale.
    Grey,
}

impl PixelFormat {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        if fourcc == FourCC::new(b"YUYV") {
            Some(PixelFormat::Yuyv)
        } else if fourcc == FourCC::new(b"MJPG") {
            Some(PixelFormat::Mjpg)
        } else if fourcc == FourCC::new(b"GREY") {
            Some(PixelFormat::Grey)
        } else {
            None
        }
    }

    /// Convert one raw capture buffer to RGBA.
    pub fn decode(self, buf: &[u8], width: u32, height: u32) -> Result<RgbaImage, FrameError> {
        match self {
            PixelFormat::Yuyv => frame::yuyv_to_rgba(buf, width, height),
            PixelFormat::Mjpg => frame::mjpg_to_rgba(buf),
            PixelFormat::Grey => frame::grey_to_rgba(buf, width, height),
        }
    }
}

/// How raw buffers of one stream become RGBA frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Conversion {
    pixel_format: PixelFormat,
    width: u32,
    height: u32,
    mirrored: bool,
}

impl Conversion {
    fn convert(&self, buf: &[u8]) -> Result<RgbaImage, FrameError> {
        let mut image = self.pixel_format.decode(buf, self.width, self.height)?;
        if self.mirrored {
            imageops::flip_horizontal_in_place(&mut image);
        }
        Ok(image)
    }
}

/// V4L2 camera device handle.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pub fourcc: FourCC,
    pixel_format: PixelFormat,
}

impl Camera {
    /// Open a V4L2 camera device by path (e.g., "/dev/video0"), requesting
    /// `width` x `height`. The driver may negotiate a different size.
    pub fn open(device_path: &str, width: u32, height: u32) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }

        // Ask for YUYV; webcams that only stream compressed video fall back to MJPG.
        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = width;
        fmt.height = height;

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        let fourcc = negotiated.fourcc;
        let pixel_format = PixelFormat::from_fourcc(fourcc).ok_or_else(|| {
            CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {fourcc:?} (need YUYV, MJPG, or GREY)"
            ))
        })?;

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?fourcc,
            "negotiated format"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
            fourcc,
            pixel_format,
        })
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Start streaming. The returned stream is a [`FrameSource`]. Frames are
    /// delivered unmirrored until [`CameraStream::set_mirrored`] is called.
    pub fn stream(&self) -> Result<CameraStream, CameraError> {
        let stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| CameraError::CaptureFailed(format!("failed to create mmap stream: {e}")))?;

        Ok(CameraStream {
            stream,
            conversion: Conversion {
                pixel_format: self.pixel_format,
                width: self.width,
                height: self.height,
                mirrored: false,
            },
        })
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
                bus: caps.bus.clone(),
            });
        }

        devices
    }
}

/// Memory-mapped capture stream delivering RGBA frames.
pub struct CameraStream {
    stream: MmapStream<'static>,
    conversion: Conversion,
}

impl CameraStream {
    /// Flip every frame horizontally, like a mirror, before it is handed on.
    pub fn set_mirrored(&mut self, mirrored: bool) {
        self.conversion.mirrored = mirrored;
    }

    pub fn is_mirrored(&self) -> bool {
        self.conversion.mirrored
    }

    /// Discard `count` frames while auto exposure settles.
    pub fn warm_up(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        tracing::info!(count, "discarding warmup frames");
        for _ in 0..count {
            if let Err(e) = self.stream.next() {
                tracing::warn!(error = %e, "warmup capture failed");
                return;
            }
        }
    }
}

impl FrameSource for CameraStream {
    fn next_frame(&mut self) -> Option<VideoFrame> {
        loop {
            let (buf, meta) = match self.stream.next() {
                Ok(next) => next,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to dequeue buffer; ending stream");
                    return None;
                }
            };
            let sequence = meta.sequence;

            match self.conversion.convert(buf) {
                Ok(image) => return Some(VideoFrame { image, sequence }),
                Err(e) => {
                    tracing::debug!(seq = sequence, error = %e, "dropping undecodable frame");
                }
            }
        }
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        Some((self.conversion.width, self.conversion.height))
    }
}
