use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::FrameSource;

/// Plays a directory of still images as a video, in file-name order.
///
/// Useful for recorded webcam dumps (`frame_0001.png`, ...). Files with
/// unrecognized extensions are ignored; images that fail to decode are
/// logged and skipped.
pub struct ImageSequenceFrameSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    acquired: bool,
}

impl ImageSequenceFrameSource {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            files: Vec::new(),
            cursor: 0,
            acquired: false,
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceFrameSource {
    fn acquire(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image(p))
            .collect();
        if files.is_empty() {
            return Err(format!("No images found in {}", self.dir.display()).into());
        }
        files.sort();

        log::info!("Found {} frames in {}", files.len(), self.dir.display());
        self.files = files;
        self.cursor = 0;
        self.acquired = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if !self.acquired {
            return None;
        }
        let path = self.files.get(self.cursor)?;
        let index = self.cursor;
        self.cursor += 1;

        match image::open(path) {
            Ok(img) => {
                let rgb = img.to_rgb8();
                let (width, height) = rgb.dimensions();
                Some(Frame::new(rgb.into_raw(), width, height, index))
            }
            Err(e) => {
                log::warn!("Skipping unreadable frame {}: {e}", path.display());
                None
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.acquired && self.cursor >= self.files.len()
    }

    fn release(&mut self) {
        self.acquired = false;
        self.files.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_png(dir: &Path, name: &str, shade: u8) {
        let mut img = image::RgbImage::new(4, 2);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([shade, shade, shade]);
        }
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_plays_images_in_name_order() {
        let tmp = TempDir::new().unwrap();
        write_png(tmp.path(), "frame_002.png", 20);
        write_png(tmp.path(), "frame_001.png", 10);
        std::fs::write(tmp.path().join("notes.txt"), b"ignored").unwrap();

        let mut source = ImageSequenceFrameSource::new(tmp.path());
        source.acquire().unwrap();
        assert_eq!(source.len(), 2);

        let first = source.next_frame().unwrap();
        assert_eq!((first.width(), first.height()), (4, 2));
        assert_eq!(first.index(), 0);
        assert_eq!(first.data()[0], 10);

        let second = source.next_frame().unwrap();
        assert_eq!(second.data()[0], 20);

        assert!(source.next_frame().is_none());
        assert!(source.is_finished());
    }

    #[test]
    fn test_acquire_empty_dir_fails() {
        let tmp = TempDir::new().unwrap();
        let mut source = ImageSequenceFrameSource::new(tmp.path());
        assert!(source.acquire().is_err());
    }

    #[test]
    fn test_acquire_missing_dir_fails() {
        let mut source = ImageSequenceFrameSource::new(Path::new("/nonexistent/frames"));
        assert!(source.acquire().is_err());
    }

    #[test]
    fn test_corrupt_image_is_skipped() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.png"), b"not a png").unwrap();
        write_png(tmp.path(), "b.png", 30);

        let mut source = ImageSequenceFrameSource::new(tmp.path());
        source.acquire().unwrap();

        assert!(source.next_frame().is_none());
        assert!(!source.is_finished());
        assert_eq!(source.next_frame().unwrap().data()[0], 30);
    }

    #[test]
    fn test_release_stops_frames() {
        let tmp = TempDir::new().unwrap();
        write_png(tmp.path(), "a.png", 1);

        let mut source = ImageSequenceFrameSource::new(tmp.path());
        source.acquire().unwrap();
        source.release();
        source.release();

        assert!(source.next_frame().is_none());
        assert!(!source.is_finished());
    }
}
