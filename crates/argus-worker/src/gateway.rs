//! Bounded asynchronous access to the detector.
//!
//! `submit` never waits: it takes a semaphore permit, marks the source as in
//! flight and spawns the request. The outcome arrives on the results
//! channel. A detector error is fatal to the whole process.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use argus_media::Detector;
use argus_models::Detection;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};

use crate::fatal::{FatalSender, ShutdownReason};
use crate::frame_item::FrameItem;
use crate::metrics::{self, RateMeter};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Why a frame was not accepted. Neither case is an error for the caller:
/// the frame stays unsubmitted and a newer one is tried on a later tick.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Detector saturated: {0} requests in flight")]
    Saturated(usize),

    #[error("Source {0} already has a request in flight")]
    SourceBusy(String),
}

/// A completed detection request.
#[derive(Debug)]
pub struct InferenceOutcome {
    /// The submitted frame, detections not yet applied
    pub item: FrameItem,
    /// Raw detector output in the frame's pixel space
    pub detections: Vec<Detection>,
}

/// Single entry point to the detector for every source.
///
/// At most `max_in_flight` requests run at once and at most one per source,
/// so results for a source arrive in capture order.
pub struct DetectorGateway {
    detector: Arc<dyn Detector>,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
    in_flight: Arc<Mutex<HashSet<String>>>,
    results: mpsc::Sender<InferenceOutcome>,
    fatal: FatalSender,
    completed: Arc<Mutex<RateMeter>>,
}

impl DetectorGateway {
    /// Create a gateway.
    ///
    /// # Arguments
    /// * `detector` - Backend every request goes to
    /// * `max_in_flight` - Concurrent request bound (at least 1)
    /// * `results` - Where completed requests are delivered
    /// * `fatal` - Receives `DetectorFailed` when a request errors
    pub fn new(
        detector: Arc<dyn Detector>,
        max_in_flight: usize,
        results: mpsc::Sender<InferenceOutcome>,
        fatal: FatalSender,
    ) -> Self {
        let max_in_flight = max_in_flight.max(1);
        info!(
            detector = detector.name(),
            max_in_flight, "Detector gateway ready"
        );
        Self {
            detector,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            results,
            fatal,
            completed: Arc::new(Mutex::new(RateMeter::new(
                RateMeter::DEFAULT_PERIOD,
                Instant::now(),
            ))),
        }
    }

    /// Hand a frame to the detector. Must be called inside a tokio runtime.
    ///
    /// Returns immediately. An accepted frame produces exactly one
    /// [`InferenceOutcome`] on the results channel, or a fatal report if the
    /// detector fails.
    ///
    /// # Errors
    /// * [`GatewayError::SourceBusy`] - the source already has a request in flight
    /// * [`GatewayError::Saturated`] - all permits are taken
    pub fn submit(&self, item: FrameItem) -> Result<(), GatewayError> {
        let source = item.source_name().to_string();
        if self.is_busy(&source) {
            return Err(GatewayError::SourceBusy(source));
        }
        let permit = Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|_| GatewayError::Saturated(self.max_in_flight))?;
        lock(&self.in_flight).insert(source.clone());

        let detector = Arc::clone(&self.detector);
        let in_flight = Arc::clone(&self.in_flight);
        let results = self.results.clone();
        let fatal = self.fatal.clone();
        let completed = Arc::clone(&self.completed);

        tokio::spawn(async move {
            let _permit = permit;
            metrics::inference_started();
            let result = detector.detect(item.frame()).await;
            metrics::inference_finished();

            match result {
                Ok(detections) => {
                    metrics::record_inference_completed();
                    let rate = lock(&completed).record(Instant::now());
                    if let Some(rate) = rate {
                        info!(rps = rate, "Recognition rate");
                    }
                    if results
                        .send(InferenceOutcome { item, detections })
                        .await
                        .is_err()
                    {
                        warn!(source = %source, "Result processor stopped, outcome dropped");
                    }
                }
                Err(e) => {
                    error!(
                        source = %source,
                        detector = detector.name(),
                        error = %e,
                        "Detector failed"
                    );
                    fatal.report(ShutdownReason::DetectorFailed(e.to_string()));
                }
            }
            lock(&in_flight).remove(&source);
        });

        Ok(())
    }

    pub fn is_busy(&self, source: &str) -> bool {
        lock(&self.in_flight).contains(source)
    }

    /// Whether a `submit` now would get a permit.
    pub fn has_capacity(&self) -> bool {
        self.permits.available_permits() > 0
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fatal::fatal_channel;
    use crate::test_support::{item, BlockingDetector, FailingDetector, FixedDetector};
    use std::time::Duration;

    #[tokio::test]
    async fn test_outcome_delivered_once() {
        let (results_tx, mut results_rx) = mpsc::channel(4);
        let (fatal, _fatal_rx) = fatal_channel();
        let detector = Arc::new(FixedDetector::new(vec![Detection::new(
            0,
            "person",
            0.9,
            (1, 1, 5, 5),
        )]));
        let gateway = DetectorGateway::new(detector, 2, results_tx, fatal);

        gateway.submit(item("front")).unwrap();
        let outcome = results_rx.recv().await.unwrap();

        assert_eq!(outcome.item.source_name(), "front");
        assert_eq!(outcome.detections.len(), 1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!gateway.is_busy("front"));
        assert!(results_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_busy_and_saturated() {
        let (results_tx, mut results_rx) = mpsc::channel(4);
        let (fatal, _fatal_rx) = fatal_channel();
        let detector = Arc::new(BlockingDetector::default());
        let gateway = DetectorGateway::new(detector.clone(), 1, results_tx, fatal);

        gateway.submit(item("front")).unwrap();
        assert_eq!(
            gateway.submit(item("front")),
            Err(GatewayError::SourceBusy("front".into()))
        );
        assert_eq!(
            gateway.submit(item("back")),
            Err(GatewayError::Saturated(1))
        );
        assert!(!gateway.has_capacity());

        detector.release();
        results_rx.recv().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(gateway.has_capacity());
        gateway.submit(item("back")).unwrap();
    }

    #[tokio::test]
    async fn test_detector_failure_is_fatal() {
        let (results_tx, mut results_rx) = mpsc::channel(4);
        let (fatal, mut fatal_rx) = fatal_channel();
        let gateway = DetectorGateway::new(Arc::new(FailingDetector), 2, results_tx, fatal);

        gateway.submit(item("front")).unwrap();

        let reason = fatal_rx.recv().await.unwrap();
        assert!(matches!(reason, ShutdownReason::DetectorFailed(_)));
        assert_eq!(reason.exit_code(), 1);
        drop(gateway);
        assert!(results_rx.recv().await.is_none());
    }
}
