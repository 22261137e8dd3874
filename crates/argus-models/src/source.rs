//! Per-source capture and detection policy.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::{ModelError, ModelResult};

/// Default save cadence for frames without detections.
pub const DEFAULT_SAVE_EVERY_SEC: u64 = 30;

fn default_important_objects() -> Vec<String> {
    vec!["person".to_string()]
}

fn default_save_every_sec() -> u64 {
    DEFAULT_SAVE_EVERY_SEC
}

/// Configuration of one capture source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique source name (also names the capture thread)
    pub name: String,
    /// Capture descriptor: RTSP/HTTP URL, video file, or `dir:<path>`
    pub source: String,
    /// Labels whose detection can raise a notification
    #[serde(default = "default_important_objects")]
    pub important_objects: Vec<String>,
    /// Labels that are detected and saved but never alert on their own
    #[serde(default)]
    pub other_objects: Vec<String>,
    /// Labels promoted to important while the system is armed.
    /// `None` promotes every entry of `other_objects`.
    #[serde(default)]
    pub armed_objects: Option<Vec<String>>,
    /// Save cadence in seconds for frames without important detections
    #[serde(default = "default_save_every_sec")]
    pub save_every_sec: u64,
    /// Boxes with an area at or above this are treated as noise
    #[serde(default)]
    pub max_object_area: Option<u64>,
    /// Local directory for persisted frames
    pub stills_dir: PathBuf,
    /// Externally reachable URL prefix for `stills_dir`
    #[serde(default)]
    pub host_stills_uri: Option<String>,
    /// Raw frame size; probed with ffprobe when absent
    #[serde(default)]
    pub frame_size: Option<FrameSize>,
    #[serde(default)]
    pub bad_frame_checker: Option<BadFrameCheckerConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

/// Template-matching check for corrupted frames.
///
/// `coords` is `[y0, y1, x0, x1]` in frame pixels; the template must be a
/// grayscale image of exactly that size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadFrameCheckerConfig {
    pub coords: [u32; 4],
    pub template_path: PathBuf,
    pub threshold: f64,
    /// `[y, x]` inside the region; a bright pixel here means the region is inverted
    #[serde(default)]
    pub reverse_pixel: Option<[u32; 2]>,
}

impl SourceConfig {
    /// Create a config with default policy for the given source.
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        stills_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            important_objects: default_important_objects(),
            other_objects: Vec::new(),
            armed_objects: None,
            save_every_sec: DEFAULT_SAVE_EVERY_SEC,
            max_object_area: None,
            stills_dir: stills_dir.into(),
            host_stills_uri: None,
            frame_size: None,
            bad_frame_checker: None,
        }
    }

    /// Whether a label is detectable (important or other).
    pub fn is_detectable(&self, label: &str) -> bool {
        self.important_objects.iter().any(|l| l == label)
            || self.other_objects.iter().any(|l| l == label)
    }

    /// Whether a label counts as important given the armed state.
    pub fn is_important(&self, label: &str, armed: bool) -> bool {
        if self.important_objects.iter().any(|l| l == label) {
            return true;
        }
        if !armed {
            return false;
        }
        match &self.armed_objects {
            Some(armed_objects) => armed_objects.iter().any(|l| l == label),
            None => self.other_objects.iter().any(|l| l == label),
        }
    }

    /// All detectable labels, important first.
    pub fn detectable_objects(&self) -> Vec<&str> {
        self.important_objects
            .iter()
            .chain(self.other_objects.iter())
            .map(String::as_str)
            .collect()
    }

    /// Whether an object area passes the configured noise limit.
    pub fn area_allowed(&self, area: u64) -> bool {
        self.max_object_area.map_or(true, |max| area < max)
    }

    /// Public URL of a persisted frame, if a URL prefix is configured.
    pub fn frame_url(&self, file_name: &str) -> Option<String> {
        self.host_stills_uri
            .as_ref()
            .map(|prefix| format!("{}/{}", prefix.trim_end_matches('/'), file_name))
    }

    /// Validate the policy.
    pub fn validate(&self) -> ModelResult<()> {
        if self.name.trim().is_empty() {
            return Err(ModelError::invalid_source(&self.name, "name must not be empty"));
        }
        if self.source.trim().is_empty() {
            return Err(ModelError::invalid_source(&self.name, "source must not be empty"));
        }
        if self.save_every_sec == 0 {
            return Err(ModelError::invalid_source(&self.name, "save_every_sec must be > 0"));
        }
        if self.max_object_area == Some(0) {
            return Err(ModelError::invalid_source(&self.name, "max_object_area must be > 0"));
        }
        if let Some(armed) = &self.armed_objects {
            if let Some(label) = armed.iter().find(|l| !self.is_detectable(l)) {
                return Err(ModelError::invalid_source(
                    &self.name,
                    format!("armed object '{}' is not detectable", label),
                ));
            }
        }
        if let Some(size) = &self.frame_size {
            if size.width == 0 || size.height == 0 {
                return Err(ModelError::invalid_source(&self.name, "frame_size must be non-zero"));
            }
        }
        if let Some(bfc) = &self.bad_frame_checker {
            let [y0, y1, x0, x1] = bfc.coords;
            if y1 <= y0 || x1 <= x0 {
                return Err(ModelError::invalid_source(
                    &self.name,
                    "bad_frame_checker coords must be [y0, y1, x0, x1] with y0 < y1 and x0 < x1",
                ));
            }
        }
        Ok(())
    }
}

/// Validate a set of sources, including name uniqueness.
pub fn validate_sources(sources: &[SourceConfig]) -> ModelResult<()> {
    let mut seen = HashSet::new();
    for source in sources {
        source.validate()?;
        if !seen.insert(source.name.as_str()) {
            return Err(ModelError::DuplicateSource(source.name.clone()));
        }
    }
    Ok(())
}
