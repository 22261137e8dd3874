//! Process-wide shutdown reasons.
//!
//! Components never exit the process themselves. They report a
//! [`ShutdownReason`] on the fatal channel; the run loop returns the first
//! one and `main` turns it into the exit code.

use std::fmt;

use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The `restart` control command; an outer service manager restarts us
    RestartRequested,
    DetectorFailed(String),
    WatchdogFailed(String),
}

impl ShutdownReason {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::RestartRequested => 0,
            Self::DetectorFailed(_) | Self::WatchdogFailed(_) => 1,
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RestartRequested => write!(f, "restart requested"),
            Self::DetectorFailed(msg) => write!(f, "detector failed: {}", msg),
            Self::WatchdogFailed(msg) => write!(f, "watchdog failed: {}", msg),
        }
    }
}

/// Sending half of the fatal channel.
#[derive(Debug, Clone)]
pub struct FatalSender(mpsc::Sender<ShutdownReason>);

impl FatalSender {
    /// Report a reason without waiting. Only the first report matters, so a
    /// full channel is ignored.
    pub fn report(&self, reason: ShutdownReason) {
        if let Err(e) = self.0.try_send(reason) {
            debug!(error = %e, "Shutdown already pending, reason dropped");
        }
    }
}

pub fn fatal_channel() -> (FatalSender, mpsc::Receiver<ShutdownReason>) {
    let (tx, rx) = mpsc::channel(8);
    (FatalSender(tx), rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ShutdownReason::RestartRequested.exit_code(), 0);
        assert_eq!(ShutdownReason::DetectorFailed("x".into()).exit_code(), 1);
        assert_eq!(ShutdownReason::WatchdogFailed("x".into()).exit_code(), 1);
    }

    #[tokio::test]
    async fn test_first_reason_wins() {
        let (tx, mut rx) = fatal_channel();
        tx.report(ShutdownReason::DetectorFailed("a".into()));
        tx.report(ShutdownReason::RestartRequested);

        assert_eq!(rx.recv().await, Some(ShutdownReason::DetectorFailed("a".into())));
    }
}
