//! Pixel format conversion for captured frames: YUYV, MJPG and GREY to RGBA.

use image::{ImageFormat, Rgba, RgbaImage};

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Convert packed YUYV (4:2:2) to RGBA using BT.601 studio-range coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share U/V.
pub fn yuyv_to_rgba(yuyv: &[u8], width: u32, height: u32) -> Result<RgbaImage, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgba = Vec::with_capacity((width * height * 4) as usize);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgba.extend_from_slice(&yuv_to_rgba(y0, u, v));
        rgba.extend_from_slice(&yuv_to_rgba(y1, u, v));
    }

    RgbaImage::from_raw(width, height, rgba).ok_or(FrameError::InvalidLength {
        expected,
        actual: yuyv.len(),
    })
}

fn yuv_to_rgba(y: u8, u: u8, v: u8) -> [u8; 4] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clip = |x: i32| (x >> 8).clamp(0, 255) as u8;
    [
        clip(298 * c + 409 * e + 128),
        clip(298 * c - 100 * d - 208 * e + 128),
        clip(298 * c + 516 * d + 128),
        255,
    ]
}

/// Expand 8-bit grayscale to opaque RGBA.
pub fn grey_to_rgba(gray: &[u8], width: u32, height: u32) -> Result<RgbaImage, FrameError> {
    let pixels = (width * height) as usize;
    if gray.len() < pixels {
        return Err(FrameError::InvalidLength {
            expected: pixels,
            actual: gray.len(),
        });
    }
    Ok(RgbaImage::from_fn(width, height, |x, y| {
        let g = gray[(y * width + x) as usize];
        Rgba([g, g, g, 255])
    }))
}

/// Decode a Motion-JPEG buffer.
pub fn mjpg_to_rgba(jpeg: &[u8]) -> Result<RgbaImage, FrameError> {
    Ok(image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)?.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_white_and_black() {
        // 2x1 image: white pixel, black pixel with neutral chroma
        let yuyv = vec![235, 128, 16, 128];
        let rgba = yuyv_to_rgba(&yuyv, 2, 1).unwrap();
        assert_eq!(rgba.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(rgba.get_pixel(1, 0), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_yuyv_red_dominant() {
        // High V pushes toward red
        let yuyv = vec![82, 90, 82, 240];
        let rgba = yuyv_to_rgba(&yuyv, 2, 1).unwrap();
        let px = rgba.get_pixel(0, 0);
        assert!(px[0] > 200, "{px:?}");
        assert!(px[1] < 40, "{px:?}");
        assert!(px[2] < 40, "{px:?}");
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let yuyv = vec![100, 128]; // too short for 2x1
        assert!(matches!(
            yuyv_to_rgba(&yuyv, 2, 1),
            Err(FrameError::InvalidLength { expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn test_grey_to_rgba() {
        let rgba = grey_to_rgba(&[0, 128, 255, 7], 2, 2).unwrap();
        assert_eq!(rgba.get_pixel(1, 0), &Rgba([128, 128, 128, 255]));
        assert_eq!(rgba.get_pixel(1, 1), &Rgba([7, 7, 7, 255]));
        assert!(grey_to_rgba(&[0; 3], 2, 2).is_err());
    }

    #[test]
    fn test_mjpg_garbage_rejected() {
        assert!(matches!(mjpg_to_rgba(&[0xFF, 0x00, 0x12]), Err(FrameError::Decode(_))));
    }
}
