//! JPEG encoding and frame persistence.

use argus_models::frame_file_name;
use chrono::{DateTime, Local, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, RgbImage};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::MediaResult;

/// JPEG quality for saved and sent frames.
pub const JPEG_QUALITY: u8 = 90;

/// A frame written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFrame {
    pub path: PathBuf,
    pub file_name: String,
}

/// Encode an RGB image as JPEG.
pub fn encode_jpeg(image: &RgbImage) -> MediaResult<Vec<u8>> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    encoder.encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)?;
    Ok(buf)
}

/// Write a frame under `stills_dir`, named after its capture time in local time.
///
/// Creates the directory if missing. Blocking.
pub fn save_frame(
    stills_dir: &Path,
    image: &RgbImage,
    captured_at: DateTime<Utc>,
    detected: bool,
) -> MediaResult<SavedFrame> {
    std::fs::create_dir_all(stills_dir)?;

    let file_name = frame_file_name(&captured_at.with_timezone(&Local), detected);
    let path = stills_dir.join(&file_name);
    std::fs::write(&path, encode_jpeg(image)?)?;

    debug!(path = %path.display(), "Saved frame");
    Ok(SavedFrame { path, file_name })
}
