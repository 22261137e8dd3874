//! FFmpeg rawvideo pipe capture.

use std::io::Read;
use std::process::{Child, ChildStdout, Command, Stdio};
use tracing::{debug, warn};

use crate::capture::CaptureSource;
use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;

/// Build FFmpeg arguments decoding `input` into RGB24 frames on stdout.
pub fn build_ffmpeg_args(input: &str) -> Vec<String> {
    let mut args: Vec<String> = vec!["-nostdin".into(), "-v".into(), "error".into()];

    if input.starts_with("rtsp://") {
        args.extend(["-rtsp_transport".into(), "tcp".into()]);
    }

    args.extend([
        "-i".into(),
        input.to_string(),
        "-an".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgb24".into(),
        "pipe:1".into(),
    ]);
    args
}

/// Frames read from an FFmpeg child process.
pub struct FfmpegCapture {
    child: Child,
    stdout: ChildStdout,
    width: u32,
    height: u32,
}

impl FfmpegCapture {
    /// Spawn FFmpeg for the given input and fixed output frame size.
    pub fn spawn(input: &str, width: u32, height: u32) -> MediaResult<Self> {
        if width == 0 || height == 0 {
            return Err(MediaError::InvalidFrame(format!(
                "invalid frame size {}x{}",
                width, height
            )));
        }
        let ffmpeg = which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let mut child = Command::new(ffmpeg)
            .args(build_ffmpeg_args(input))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stdout not captured"))?;

        debug!(width, height, "Spawned FFmpeg capture");
        Ok(Self {
            child,
            stdout,
            width,
            height,
        })
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl CaptureSource for FfmpegCapture {
    fn read(&mut self) -> MediaResult<Frame> {
        let mut buf = vec![0u8; self.frame_len()];
        self.stdout.read_exact(&mut buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => MediaError::EndOfStream,
            _ => MediaError::capture_failed(e.to_string()),
        })?;

        Frame::from_rgb24(self.width, self.height, buf)
            .ok_or_else(|| MediaError::InvalidFrame("short rawvideo frame".to_string()))
    }
}

impl Drop for FfmpegCapture {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            debug!(error = %e, "FFmpeg already exited");
        }
        if let Err(e) = self.child.wait() {
            warn!(error = %e, "Failed to reap FFmpeg");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rtsp_uses_tcp_transport() {
        let args = build_ffmpeg_args("rtsp://cam.local/stream");
        let pos = args.iter().position(|a| a == "-rtsp_transport").unwrap();
        assert_eq!(args[pos + 1], "tcp");
        assert!(pos < args.iter().position(|a| a == "-i").unwrap());
    }

    #[test]
    fn test_file_input_outputs_rgb24() {
        let args = build_ffmpeg_args("clip.mp4");
        assert!(!args.contains(&"-rtsp_transport".to_string()));
        assert!(args.contains(&"rgb24".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(
            FfmpegCapture::spawn("clip.mp4", 0, 480),
            Err(MediaError::InvalidFrame(_))
        ));
    }
}
