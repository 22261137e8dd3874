//! Still-image directory capture.

use std::path::PathBuf;

use crate::capture::CaptureSource;
use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Replays the images of a directory in file-name order, once.
#[derive(Debug)]
pub struct ImageDirCapture {
    files: Vec<PathBuf>,
    next: usize,
}

impl ImageDirCapture {
    pub fn open(dir: PathBuf) -> MediaResult<Self> {
        if !dir.is_dir() {
            return Err(MediaError::FileNotFound(dir));
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(MediaError::capture_failed(format!(
                "no images in {}",
                dir.display()
            )));
        }

        Ok(Self { files, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl CaptureSource for ImageDirCapture {
    fn read(&mut self) -> MediaResult<Frame> {
        let path = self.files.get(self.next).ok_or(MediaError::EndOfStream)?;
        self.next += 1;
        let image = image::open(path)?.to_rgb8();
        Ok(Frame::new(image))
    }
}
