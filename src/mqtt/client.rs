//! MQTT client wrapper for the door control and state topics.

use std::time::Duration;

use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;

use crate::config::MqttConfig;
use crate::error::{BridgeError, Result};

/// Message received from the MQTT broker.
#[derive(Debug, Clone)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// MQTT client for the door bridge.
///
/// Wraps a [`rumqttc::AsyncClient`] plus its event loop. Topics passed to
/// `new` are (re-)subscribed on every ConnAck, so a broker restart does not
/// silently drop the control channel.
pub struct MqttClient {
    client: AsyncClient,
    event_loop: EventLoop,
    subscriptions: Vec<String>,
}

impl MqttClient {
    /// Create a new MQTT client from configuration.
    pub fn new(config: &MqttConfig, subscriptions: Vec<String>) -> Self {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(30));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 100);

        Self {
            client,
            event_loop,
            subscriptions,
        }
    }

    /// Get a clone of the async client for publishing from the bridge loop.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    /// Run the MQTT event loop and forward inbound publishes to `tx`.
    ///
    /// Connection loss is recovered with a bounded sleep-and-retry; any
    /// other protocol fault is returned as an error and treated as fatal
    /// by the caller.
    pub async fn run(mut self, tx: mpsc::Sender<MqttMessage>, reconnect_delay: Duration) -> Result<()> {
        info!("Starting MQTT event loop");

        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Connected to broker");
                    for topic in &self.subscriptions {
                        info!("Subscribing to MQTT topic: {}", topic);
                        self.client.try_subscribe(topic, QoS::AtMostOnce)?;
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    debug!(
                        "Received MQTT message on {} ({} bytes)",
                        publish.topic,
                        publish.payload.len()
                    );
                    let msg = MqttMessage {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    };
                    if tx.send(msg).await.is_err() {
                        error!("MQTT message channel closed");
                        return Ok(());
                    }
                }
                Ok(_) => {}
                Err(e) if is_disconnect(&e) => {
                    warn!("MQTT connection lost: {:?}", e);
                    // Blocking retry with a fixed delay; the event loop
                    // reconnects on the next poll.
                    tokio::time::sleep(reconnect_delay).await;
                    info!("Reconnecting to broker");
                }
                Err(e) => {
                    error!("MQTT protocol fault: {:?}", e);
                    return Err(BridgeError::MqttProtocol(format!("{e:?}")));
                }
            }
        }
    }
}

/// Transient transport failures that warrant a reconnect attempt rather
/// than a shutdown.
fn is_disconnect(error: &ConnectionError) -> bool {
    matches!(
        error,
        ConnectionError::Io(_) | ConnectionError::NetworkTimeout | ConnectionError::FlushTimeout
    )
}
