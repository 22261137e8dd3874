//! Prometheus metrics and per-minute rate logging.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

/// Install the Prometheus recorder with an HTTP listener.
///
/// Must be called inside a tokio runtime.
pub fn init_metrics(listen: SocketAddr) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(listen)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter: {}", e)))
}

/// Metric names as constants for consistency.
pub mod names {
    // Capture
    pub const FRAMES_CAPTURED_TOTAL: &str = "argus_frames_captured_total";
    pub const SOURCE_FPS: &str = "argus_source_fps";
    pub const CAPTURE_RESTARTS_TOTAL: &str = "argus_capture_restarts_total";
    pub const BAD_FRAMES_TOTAL: &str = "argus_bad_frames_total";

    // Inference
    pub const INFERENCE_COMPLETED_TOTAL: &str = "argus_inference_completed_total";
    pub const INFERENCE_IN_FLIGHT: &str = "argus_inference_in_flight";
    pub const DEVICE_TEMPERATURE: &str = "argus_device_temperature";

    // Disposal
    pub const FRAMES_SAVED_TOTAL: &str = "argus_frames_saved_total";
    pub const NOTIFICATIONS_TOTAL: &str = "argus_notifications_total";
}

pub fn record_frame_captured(source: &str) {
    let labels = [("source", source.to_string())];
    counter!(names::FRAMES_CAPTURED_TOTAL, &labels).increment(1);
}

pub fn set_source_fps(source: &str, fps: f64) {
    let labels = [("source", source.to_string())];
    gauge!(names::SOURCE_FPS, &labels).set(fps);
}

pub fn record_capture_restart(source: &str) {
    let labels = [("source", source.to_string())];
    counter!(names::CAPTURE_RESTARTS_TOTAL, &labels).increment(1);
}

pub fn record_bad_frame(source: &str) {
    let labels = [("source", source.to_string())];
    counter!(names::BAD_FRAMES_TOTAL, &labels).increment(1);
}

pub fn record_inference_completed() {
    counter!(names::INFERENCE_COMPLETED_TOTAL).increment(1);
}

pub fn inference_started() {
    gauge!(names::INFERENCE_IN_FLIGHT).increment(1.0);
}

pub fn inference_finished() {
    gauge!(names::INFERENCE_IN_FLIGHT).decrement(1.0);
}

pub fn set_device_temperature(celsius: f32) {
    gauge!(names::DEVICE_TEMPERATURE).set(f64::from(celsius));
}

pub fn record_frame_saved(source: &str, detected: bool) {
    let labels = [
        ("source", source.to_string()),
        ("detected", detected.to_string()),
    ];
    counter!(names::FRAMES_SAVED_TOTAL, &labels).increment(1);
}

pub fn record_notification(source: &str, kind: &'static str) {
    let labels = [("source", source.to_string()), ("kind", kind.to_string())];
    counter!(names::NOTIFICATIONS_TOTAL, &labels).increment(1);
}

/// Counts events and yields a per-second rate once per period.
#[derive(Debug)]
pub struct RateMeter {
    period: Duration,
    window_start: Instant,
    count: u64,
}

impl RateMeter {
    /// Rate logged once a minute.
    pub const DEFAULT_PERIOD: Duration = Duration::from_secs(60);

    pub fn new(period: Duration, now: Instant) -> Self {
        Self {
            period,
            window_start: now,
            count: 0,
        }
    }

    /// Count one event; returns the rate when a period has elapsed.
    pub fn record(&mut self, now: Instant) -> Option<f64> {
        self.count += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.period {
            return None;
        }
        let rate = self.count as f64 / elapsed.as_secs_f64();
        self.window_start = now;
        self.count = 0;
        Some(rate)
    }
}
