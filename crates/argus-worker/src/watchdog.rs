//! Periodic detector health check.
//!
//! Reads the inference device temperature. A backend without a sensor
//! answers `None`; an error means the device is gone and is fatal.

use std::sync::Arc;
use std::time::Duration;

use argus_media::{Detector, MediaResult};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::fatal::{FatalSender, ShutdownReason};
use crate::metrics;

/// Check the detector once.
pub async fn check_once(detector: &dyn Detector) -> MediaResult<Option<f32>> {
    let temperature = detector.device_temperature().await?;
    match temperature {
        Some(celsius) => {
            info!(detector = detector.name(), celsius, "Device temperature");
            metrics::set_device_temperature(celsius);
        }
        None => debug!(detector = detector.name(), "No temperature sensor"),
    }
    Ok(temperature)
}

/// Check every `interval` until a check fails.
pub async fn run_watchdog(detector: Arc<dyn Detector>, interval: Duration, fatal: FatalSender) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(e) = check_once(detector.as_ref()).await {
            error!(detector = detector.name(), error = %e, "Watchdog check failed");
            fatal.report(ShutdownReason::WatchdogFailed(e.to_string()));
            return;
        }
    }
}
