//! Tuya cloud to MQTT bridge - Main Entry Point
//!
//! Loads configuration, connects the MQTT publisher and the signed Tuya
//! client, then runs the poll loop until SIGINT/SIGTERM.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tuya_mqtt_bridge::config::{redact, BridgeConfig};
use tuya_mqtt_bridge::logging::init_default_logging;
use tuya_mqtt_bridge::mqtt::MqttPublisher;
use tuya_mqtt_bridge::tuya::{TuyaClient, TuyaShadowSource};
use tuya_mqtt_bridge::BridgeLoop;

/// Tuya cloud to MQTT bridge
#[derive(Parser)]
#[command(name = "tuya-mqtt-bridge")]
#[command(about = "Polls a Tuya device shadow and republishes it over MQTT")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge loop
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting tuya-mqtt-bridge v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_bridge(config).await,
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Bridge shutdown complete");
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<BridgeConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(BridgeConfig::load_from_file(path)?)
        }
        None => {
            let default_paths = vec!["bridge.toml", "config/bridge.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(BridgeConfig::load_from_file(&path)?);
                }
            }

            error!(
                "No configuration file found. Please provide one with -c/--config or create bridge.toml"
            );
            process::exit(1);
        }
    }
}

async fn run_bridge(config: BridgeConfig) -> Result<(), Box<dyn std::error::Error>> {
    // Credentials are required before anything connects
    let access_id = config.tuya_access_id()?;
    let access_key = config.tuya_access_key()?;

    info!(
        region = ?config.tuya.region,
        device_id = %config.tuya.device_id,
        entity_id = %config.sensor.entity_id,
        access_id = %redact(&access_id),
        "Bridge configuration loaded"
    );

    let publisher = MqttPublisher::connect(&config).await?;

    let mut client = TuyaClient::new(config.tuya.region.base_url(), &access_id, &access_key)?;

    // Token acquisition up front is best effort; the poll loop refreshes
    // on demand when the API reports an expired token.
    if let Err(e) = client.authenticate().await {
        warn!(error = %e, "Initial Tuya authentication failed; will retry during polling");
    }

    let source = TuyaShadowSource::new(client, &config.tuya.device_id);
    let mut bridge = BridgeLoop::new(
        source,
        publisher,
        Duration::from_secs(config.bridge.poll_interval_secs),
        Duration::from_secs(config.bridge.offline_after_secs),
    );

    bridge.announce().await?;

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
        _ = bridge.run() => {}
    }

    bridge.publisher().announce_offline().await;
    bridge.publisher_mut().disconnect().await?;
    Ok(())
}

fn handle_config_command(
    config: BridgeConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(&config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
