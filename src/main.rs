// MIT License - Copyright (c) 2026 Peter Wright
// MQTT bridge

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rumqttc::AsyncClient;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tracing::{info, warn};

use satel_integra::mqtt::{self, MqttPlatform, RoutedCommand, Topics};
use satel_integra::{Integration, SatelClient, Settings};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "satel2mqtt")]
#[command(about = "Bridge between a Satel INTEGRA alarm panel and Home Assistant over MQTT")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=satel_integra=trace).
    // Default: info.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();
    let mut settings = Settings::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config))?;

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        // Set up MQTT
        let topics = Topics::new(&settings.mqtt);
        let mqtt_opts = mqtt::mqtt_options(&settings.mqtt, &topics)?;
        let (client, eventloop) = AsyncClient::new(mqtt_opts, 256);
        let (command_tx, mut command_rx) = mpsc::channel::<RoutedCommand>(64);
        let mut mqtt_handle = tokio::spawn(mqtt::run_event_loop(
            eventloop,
            client.clone(),
            topics.clone(),
            command_tx,
        ));
        let platform = Arc::new(MqttPlatform::new(client.clone(), topics));

        // Connect to panel and register entities
        info!(
            "Connecting to Satel panel at {}:{}",
            settings.satel.host, settings.satel.port
        );
        let controller = SatelClient::new(settings.client_config());
        let integration = Integration::setup(&settings, controller, platform.clone())
            .await
            .context("Failed to set up integration")?;

        // Route commands until a signal arrives
        info!("MQTT bridge running. Send SIGHUP to reload, SIGINT/SIGTERM to stop.");
        let restart = loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Received SIGINT, shutting down...");
                    break false;
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down...");
                    break false;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, reloading config and restarting connections...");
                    break true;
                }
                Some(routed) = command_rx.recv() => {
                    if !integration
                        .command(routed.platform, &routed.unique_id, routed.command)
                        .await
                    {
                        warn!("No {} entity {} accepts commands", routed.platform, routed.unique_id);
                    }
                }
            }
        };

        integration.shutdown().await;
        platform.set_bridge_status(false).await;
        if let Err(e) = client.disconnect().await {
            warn!("Error disconnecting from MQTT: {e}");
        }
        // give the event loop a moment to flush the offline status
        if timeout(Duration::from_secs(1), &mut mqtt_handle).await.is_err() {
            mqtt_handle.abort();
        }

        if !restart {
            break;
        }

        // Reload config from disk; keep previous config on failure
        info!("Reloading config from {}", cli.config);
        match Settings::load(&cli.config) {
            Ok(new_settings) => {
                settings = new_settings;
                info!("Config reloaded successfully");
            }
            Err(e) => warn!("Failed to reload config, keeping previous: {e}"),
        }

        info!("Reconnecting...");
    }

    info!("Shutdown complete");
    Ok(())
}
