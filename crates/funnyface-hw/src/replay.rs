//! Frame replay from still images, for running the live pipeline without a camera.

use crate::frame::FrameError;
use funnyface_core::{FrameSource, VideoFrame};
use image::{ImageFormat, RgbaImage};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

enum Entry {
    Image(RgbaImage),
    File(PathBuf),
}

/// Plays a fixed list of images as consecutive frames.
pub struct ImageSequence {
    entries: VecDeque<Entry>,
    next_sequence: u32,
}

impl ImageSequence {
    pub fn from_images(images: Vec<RgbaImage>) -> Self {
        Self {
            entries: images.into_iter().map(Entry::Image).collect(),
            next_sequence: 0,
        }
    }

    /// Every decodable image file in `dir`, in file-name order. Files are
    /// read lazily as frames are requested.
    pub fn from_dir(dir: &Path) -> Result<Self, FrameError> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && ImageFormat::from_path(path).is_ok())
            .collect();
        paths.sort();

        tracing::info!(dir = %dir.display(), frames = paths.len(), "replaying image sequence");
        Ok(Self {
            entries: paths.into_iter().map(Entry::File).collect(),
            next_sequence: 0,
        })
    }

    /// Frames not yet delivered.
    pub fn remaining(&self) -> usize {
        self.entries.len()
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Option<VideoFrame> {
        while let Some(entry) = self.entries.pop_front() {
            let image = match entry {
                Entry::Image(image) => image,
                Entry::File(path) => match image::open(&path) {
                    Ok(image) => image.to_rgba8(),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping unreadable frame");
                        continue;
                    }
                },
            };
            let sequence = self.next_sequence;
            self.next_sequence = self.next_sequence.wrapping_add(1);
            return Some(VideoFrame { image, sequence });
        }
        None
    }

    /// Size of the first frame that can actually be read.
    fn dimensions(&self) -> Option<(u32, u32)> {
        self.entries.iter().find_map(|entry| match entry {
            Entry::Image(image) => Some(image.dimensions()),
            Entry::File(path) => image::image_dimensions(path).ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_sequence() {
        let mut source = ImageSequence::from_images(vec![RgbaImage::new(8, 6), RgbaImage::new(8, 6)]);
        assert_eq!(source.dimensions(), Some((8, 6)));
        assert_eq!(source.remaining(), 2);

        let first = source.next_frame().unwrap();
        let second = source.next_frame().unwrap();
        assert_eq!((first.sequence, second.sequence), (0, 1));
        assert!(source.next_frame().is_none());
        assert_eq!(source.dimensions(), None);
    }

    #[test]
    fn test_missing_dir() {
        let result = ImageSequence::from_dir(Path::new("/nonexistent/funnyface-frames"));
        assert!(matches!(result, Err(FrameError::Io(_))));
    }

    #[test]
    fn test_dir_sequence_skips_unreadable() {
        let dir = std::env::temp_dir().join(format!("funnyface-replay-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        RgbaImage::new(4, 3).save(dir.join("000.png")).unwrap();
        std::fs::write(dir.join("001.png"), b"not a png").unwrap();
        RgbaImage::new(4, 3).save(dir.join("002.png")).unwrap();
        std::fs::write(dir.join("notes.txt"), b"ignored").unwrap();

        let mut source = ImageSequence::from_dir(&dir).unwrap();
        assert_eq!(source.remaining(), 3);
        assert_eq!(source.dimensions(), Some((4, 3)));

        let frames: Vec<u32> = std::iter::from_fn(|| source.next_frame()).map(|f| f.sequence).collect();
        assert_eq!(frames, vec![0, 1]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_dimensions_skip_unreadable_first_file() {
        let dir = std::env::temp_dir().join(format!("funnyface-replay-dims-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("000.png"), b"truncated").unwrap();
        RgbaImage::new(6, 5).save(dir.join("001.png")).unwrap();

        let source = ImageSequence::from_dir(&dir).unwrap();
        assert_eq!(source.dimensions(), Some((6, 5)));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
