//! Notification transports and the async dispatcher.
//!
//! This crate provides:
//! - `Notifier`: the channel interface
//! - Telegram bot, MQTT and Aqara scene channels
//! - `NotificationDispatcher`: a bounded, non-blocking hand-off to a
//!   dedicated delivery task

pub mod aqara;
pub mod dispatcher;
pub mod error;
pub mod mqtt;
pub mod notifier;
pub mod telegram;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use aqara::{AqaraConfig, AqaraNotifier};
pub use dispatcher::{
    DispatchWorker, NotificationDispatcher, DEFAULT_DELIVERY_TIMEOUT, DEFAULT_QUEUE_CAPACITY,
};
pub use error::{NotifyError, NotifyResult};
pub use mqtt::{MqttConfig, MqttNotifier};
pub use notifier::Notifier;
pub use telegram::{TelegramConfig, TelegramNotifier};

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_delivery_timeout_secs() -> u64 {
    DEFAULT_DELIVERY_TIMEOUT.as_secs()
}

/// Channel configuration; every channel is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub mqtt: Option<MqttConfig>,
    #[serde(default)]
    pub aqara: Option<AqaraConfig>,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Longest one channel may take to deliver one notification
    #[serde(default = "default_delivery_timeout_secs")]
    pub delivery_timeout_secs: u64,
}

impl NotifyConfig {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs.max(1))
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            telegram: None,
            mqtt: None,
            aqara: None,
            queue_capacity: default_queue_capacity(),
            delivery_timeout_secs: default_delivery_timeout_secs(),
        }
    }
}

/// Build the configured channels.
///
/// Must be called inside a tokio runtime (MQTT starts its event loop).
pub async fn build_notifiers(config: &NotifyConfig) -> NotifyResult<Vec<Arc<dyn Notifier>>> {
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();

    if let Some(telegram) = &config.telegram {
        notifiers.push(Arc::new(TelegramNotifier::new(telegram.clone())?));
    }
    if let Some(mqtt) = &config.mqtt {
        notifiers.push(Arc::new(MqttNotifier::connect(mqtt)));
    }
    if let Some(aqara) = &config.aqara {
        let notifier = AqaraNotifier::new(aqara.clone())?;
        if !notifier.is_authorized().await {
            if let Err(e) = notifier.request_auth_code().await {
                tracing::warn!(error = %e, "Failed to request Aqara auth code");
            }
        }
        notifiers.push(Arc::new(notifier));
    }

    Ok(notifiers)
}
