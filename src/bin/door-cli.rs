//! Operator CLI for the garage door bridge.
//!
//! Usage:
//!   door-cli open             # pulse the door open
//!   door-cli close            # pulse the door closed
//!   door-cli reset            # clear errors / abort a stuck command
//!   door-cli watch            # follow the state topic
//!
//! Commands are single bytes on the control topic; `watch` subscribes to
//! the retained state topic and prints every change.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{error, info};
use rumqttc::QoS;
use tokio::sync::mpsc;

use garage_door_bridge::config::{self, Config};
use garage_door_bridge::mqtt::{self, MqttClient, MqttMessage};

#[derive(Parser, Debug)]
#[command(name = "door-cli", about = "Send commands to the garage door bridge")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, env = "DOOR_BRIDGE_CONFIG", default_value = "/etc/garage-door-bridge.toml")]
    config: PathBuf,

    /// Hostname of the bridge (defaults to this machine's hostname)
    #[arg(long)]
    host: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Drive the door open
    Open,
    /// Drive the door closed
    Close,
    /// Cancel pending commands and clear an error state
    Reset,
    /// Follow the state topic and print changes
    Watch,
}

#[tokio::main]
async fn main() {
    config::load_dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };
    // Do not fight the bridge for its client id.
    config.mqtt.client_id = format!("{}-cli", config.mqtt.client_id);

    let hostname = args
        .host
        .unwrap_or_else(|| gethostname::gethostname().to_string_lossy().into_owned());

    match args.command {
        CliCommand::Open => send(&config, &hostname, b'1').await,
        CliCommand::Close => send(&config, &hostname, b'0').await,
        CliCommand::Reset => send(&config, &hostname, b'q').await,
        CliCommand::Watch => watch(&config, &hostname).await,
    }
}

async fn send(config: &Config, hostname: &str, byte: u8) {
    let topic = mqtt::control_topic(hostname);
    let mqtt_client = MqttClient::new(&config.mqtt, Vec::new());
    let client = mqtt_client.client();

    let (tx, _rx) = mpsc::channel::<MqttMessage>(16);
    let event_loop = tokio::spawn(async move {
        let _ = mqtt_client.run(tx, Duration::from_secs(5)).await;
    });

    if let Err(e) = client.publish(&topic, QoS::AtLeastOnce, false, vec![byte]).await {
        error!("Failed to publish command: {e}");
        std::process::exit(1);
    }

    // Give the event loop a moment to flush the publish.
    tokio::time::sleep(Duration::from_secs(1)).await;
    info!("Sent '{}' to {}", byte as char, topic);

    event_loop.abort();
}

async fn watch(config: &Config, hostname: &str) {
    let topic = mqtt::state_topic(hostname);
    let mqtt_client = MqttClient::new(&config.mqtt, vec![topic.clone()]);

    let (tx, mut rx) = mpsc::channel::<MqttMessage>(16);
    let event_loop = tokio::spawn(async move {
        let _ = mqtt_client.run(tx, Duration::from_secs(5)).await;
    });

    info!("Watching {} (ctrl-c to exit)", topic);

    loop {
        tokio::select! {
            msg = rx.recv() => {
                let Some(msg) = msg else {
                    error!("MQTT event loop ended");
                    break;
                };
                println!("{}", String::from_utf8_lossy(&msg.payload));
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    event_loop.abort();
}
