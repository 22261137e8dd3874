//! Notification channel interface.

use argus_models::DetectionEvent;
use async_trait::async_trait;

use crate::error::NotifyResult;

/// An external notification channel.
///
/// Every operation defaults to a no-op so a channel only implements what it
/// supports: a chat bot takes messages and photos, a broker takes events, a
/// home-automation hub runs scenes.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name for logging.
    fn name(&self) -> &'static str;

    async fn send_message(&self, _text: &str) -> NotifyResult<()> {
        Ok(())
    }

    /// Send a JPEG with a caption.
    async fn send_photo(&self, _jpeg: &[u8], _caption: &str) -> NotifyResult<()> {
        Ok(())
    }

    async fn publish_event(&self, _event: &DetectionEvent) -> NotifyResult<()> {
        Ok(())
    }

    async fn run_scene(&self) -> NotifyResult<()> {
        Ok(())
    }

    /// Exchange an authorization code for API tokens.
    async fn save_auth_code(&self, _code: &str) -> NotifyResult<()> {
        Ok(())
    }

    /// Whether this channel wants photos; the dispatcher skips encoding otherwise.
    fn accepts_photos(&self) -> bool {
        false
    }
}
