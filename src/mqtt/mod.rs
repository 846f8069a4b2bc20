//! MQTT transport layer.

pub mod client;

pub use client::{MqttClient, MqttMessage};

/// Topic the bridge publishes door state changes to (retained).
pub fn state_topic(hostname: &str) -> String {
    format!("/{hostname}/door/state")
}

/// Topic the bridge accepts single-byte control commands on.
pub fn control_topic(hostname: &str) -> String {
    format!("/{hostname}/door/control")
}
