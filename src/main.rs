use std::path::PathBuf;

use clap::Parser;
use log::{error, info};

use garage_door_bridge::bridge;
use garage_door_bridge::config::{self, Config};

#[derive(Parser, Debug)]
#[command(name = "garage-door-bridge", about = "MQTT bridge for a garage door")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, env = "DOOR_BRIDGE_CONFIG", default_value = "/etc/garage-door-bridge.toml")]
    config: PathBuf,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    config::load_dotenv();
    init_logger();

    let args = Args::parse();
    info!("Starting garage door bridge");

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };
    info!(
        "MQTT server: {}:{}",
        config.mqtt.broker_host, config.mqtt.broker_port
    );

    if let Err(e) = bridge::run(config).await {
        error!("{e}");
        std::process::exit(1);
    }
}
