//! MQTT detection-event publisher.

use std::time::Duration;

use argus_models::DetectionEvent;
use async_trait::async_trait;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::NotifyResult;
use crate::notifier::Notifier;

/// Pending publishes held while the broker is away.
const REQUEST_QUEUE_CAPACITY: usize = 16;

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "argus".to_string()
}

fn default_keep_alive_secs() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

/// Publishes detection events; the connection is driven by a background task.
pub struct MqttNotifier {
    client: AsyncClient,
    event_loop: JoinHandle<()>,
}

impl MqttNotifier {
    /// Connect lazily; must be called inside a tokio runtime.
    pub fn connect(config: &MqttConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_QUEUE_CAPACITY);
        let host = config.host.clone();
        let event_loop = tokio::spawn(async move {
            loop {
                if let Err(e) = event_loop.poll().await {
                    warn!(host = %host, error = %e, "MQTT connection error, reconnecting");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        });

        Self { client, event_loop }
    }
}

impl Drop for MqttNotifier {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}

/// JSON payload for a detection event.
pub fn event_payload(event: &DetectionEvent) -> NotifyResult<Vec<u8>> {
    Ok(serde_json::to_vec(event)?)
}

#[async_trait]
impl Notifier for MqttNotifier {
    fn name(&self) -> &'static str {
        "mqtt"
    }

    /// Hands the event to the client's request queue without waiting.
    ///
    /// While the broker is unreachable that queue is not drained; once it is
    /// full, further events fail immediately instead of stalling delivery.
    async fn publish_event(&self, event: &DetectionEvent) -> NotifyResult<()> {
        let topic = event.topic();
        self.client
            .try_publish(&topic, QoS::AtLeastOnce, false, event_payload(event)?)?;
        debug!(topic = %topic, "MQTT event queued");
        Ok(())
    }
}
