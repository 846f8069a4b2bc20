use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{BridgeError, Result};

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            if (value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\''))
            {
                value = &value[1..value.len() - 1];
            }

            // Only set if not already set (env vars take precedence)
            if std::env::var(key).is_err() {
                // SAFETY: We're single-threaded at this point (called before any async runtime)
                unsafe { std::env::set_var(key, value) };
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub gpio: GpioConfig,
    #[serde(default)]
    pub door: DoorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// BCM pin assignments for the two endpoint sensors and the two relay
/// trigger outputs. Defaults match the reference deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioConfig {
    pub closed_sensor_pin: u8,
    pub open_sensor_pin: u8,
    pub open_relay_pin: u8,
    pub close_relay_pin: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DoorConfig {
    /// Seconds between periodic sensor re-evaluations.
    pub poll_interval_secs: u64,
    /// Seconds to wait before retrying a lost broker connection.
    pub reconnect_delay_secs: u64,
}

fn default_client_id() -> String {
    "garage-door-bridge".to_string()
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            closed_sensor_pin: 22,
            open_sensor_pin: 15,
            open_relay_pin: 18,
            close_relay_pin: 24,
        }
    }
}

impl Default for DoorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 15,
            reconnect_delay_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then apply environment
    /// overrides. A missing or malformed file is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| BridgeError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: Config =
            toml::from_str(&content).map_err(|source| BridgeError::ConfigParse {
                path: path.display().to_string(),
                source,
            })?;
        config.apply_env();
        Ok(config)
    }

    /// Apply `MQTT_*` environment overrides on top of the file values.
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("MQTT_BROKER_HOST") {
            self.mqtt.broker_host = host;
        }
        if let Ok(port) = std::env::var("MQTT_BROKER_PORT")
            && let Ok(p) = port.parse()
        {
            self.mqtt.broker_port = p;
        }
        if let Ok(client_id) = std::env::var("MQTT_CLIENT_ID") {
            self.mqtt.client_id = client_id;
        }
        if let Ok(username) = std::env::var("MQTT_USERNAME") {
            self.mqtt.username = Some(username);
        }
        if let Ok(password) = std::env::var("MQTT_PASSWORD") {
            self.mqtt.password = Some(password);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_parses_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [mqtt]
            broker_host = "10.0.0.2"
            broker_port = 1883
            "#,
        )
        .unwrap();
        assert_eq!(config.mqtt.broker_host, "10.0.0.2");
        assert_eq!(config.mqtt.broker_port, 1883);
        assert_eq!(config.mqtt.client_id, "garage-door-bridge");
        assert_eq!(config.gpio.closed_sensor_pin, 22);
        assert_eq!(config.gpio.open_sensor_pin, 15);
        assert_eq!(config.door.poll_interval_secs, 15);
        assert_eq!(config.door.reconnect_delay_secs, 30);
    }

    #[test]
    fn test_full_config_parses() {
        let config: Config = toml::from_str(
            r#"
            [mqtt]
            broker_host = "broker.local"
            broker_port = 8883
            client_id = "door-test"
            username = "user"
            password = "pass"

            [gpio]
            closed_sensor_pin = 5
            open_sensor_pin = 6
            open_relay_pin = 13
            close_relay_pin = 19

            [door]
            poll_interval_secs = 5
            reconnect_delay_secs = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.mqtt.client_id, "door-test");
        assert_eq!(config.mqtt.username.as_deref(), Some("user"));
        assert_eq!(config.gpio.close_relay_pin, 19);
        assert_eq!(config.door.poll_interval_secs, 5);
    }

    #[test]
    fn test_missing_broker_is_rejected() {
        let result = toml::from_str::<Config>("[mqtt]\nbroker_port = 1883\n");
        assert!(result.is_err());
    }
}
