//! Stream geometry via ffprobe.

use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Geometry of the first video stream of a source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    /// Nominal frame rate, when the container reports one
    pub fps: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct StreamReport {
    #[serde(default)]
    streams: Vec<ReportedStream>,
}

#[derive(Debug, Deserialize)]
struct ReportedStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
}

/// Ask ffprobe for the size of the first video stream of `descriptor`.
///
/// Blocking; capture threads call it when a source has no configured frame
/// size.
pub fn inspect_stream(descriptor: &str) -> MediaResult<StreamInfo> {
    let ffprobe = which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

    let output = Command::new(ffprobe)
        .args(["-v", "error", "-select_streams", "v:0"])
        .args(["-show_entries", "stream=width,height,avg_frame_rate"])
        .args(["-of", "json"])
        .arg(descriptor)
        .stdin(Stdio::null())
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(MediaError::FfprobeFailed {
            message: format!("ffprobe exited with {} for {}", output.status, descriptor),
            stderr: (!stderr.is_empty()).then_some(stderr),
        });
    }

    let info = parse_report(&output.stdout)?;
    debug!(descriptor, width = info.width, height = info.height, "Read stream geometry");
    Ok(info)
}

fn parse_report(stdout: &[u8]) -> MediaResult<StreamInfo> {
    let report: StreamReport = serde_json::from_slice(stdout)?;
    let stream = report
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| MediaError::InvalidFrame("source has no video stream".into()))?;

    match (stream.width, stream.height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => Ok(StreamInfo {
            width,
            height,
            fps: stream.avg_frame_rate.as_deref().and_then(frame_rate),
        }),
        _ => Err(MediaError::InvalidFrame(
            "video stream reports no frame size".into(),
        )),
    }
}

/// `"30000/1001"` or `"25"`; `"0/0"` means unknown.
fn frame_rate(raw: &str) -> Option<f64> {
    let rate = match raw.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num.parse::<f64>().ok()? / den
        }
        None => raw.parse().ok()?,
    };
    (rate > 0.0).then_some(rate)
}
