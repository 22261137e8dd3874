//! Capture sources.
//!
//! A capture source wraps one physical or network video input and produces
//! frames on demand. Reads are blocking; each source is driven by its own
//! capture thread.

mod ffmpeg;
mod image_dir;

pub use ffmpeg::{build_ffmpeg_args, FfmpegCapture};
pub use image_dir::ImageDirCapture;

use argus_models::SourceConfig;
use std::path::PathBuf;

use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;
use crate::stream_info::inspect_stream;

/// Descriptor prefix selecting a still-image directory source.
pub const IMAGE_DIR_PREFIX: &str = "dir:";

/// A video input producing frames.
pub trait CaptureSource: Send {
    /// Block until the next frame is available.
    ///
    /// An error means the source is unusable and must be reopened.
    fn read(&mut self) -> MediaResult<Frame>;
}

/// Open the capture source described by the config.
///
/// `dir:<path>` opens a still-image directory; anything else is handed to
/// FFmpeg (RTSP/HTTP URL or a video file). FFmpeg sources without a
/// configured frame size are measured with ffprobe first.
pub fn open_source(config: &SourceConfig) -> MediaResult<Box<dyn CaptureSource>> {
    if let Some(dir) = config.source.strip_prefix(IMAGE_DIR_PREFIX) {
        let capture = ImageDirCapture::open(PathBuf::from(dir))
            .map_err(|e| MediaError::source_unavailable(&config.name, e.to_string()))?;
        return Ok(Box::new(capture));
    }

    let (width, height) = match config.frame_size {
        Some(size) => (size.width, size.height),
        None => {
            let info = inspect_stream(&config.source)
                .map_err(|e| MediaError::source_unavailable(&config.name, e.to_string()))?;
            (info.width, info.height)
        }
    };

    let capture = FfmpegCapture::spawn(&config.source, width, height)
        .map_err(|e| MediaError::source_unavailable(&config.name, e.to_string()))?;
    Ok(Box::new(capture))
}
