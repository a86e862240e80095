// MIT License - Copyright (c) 2026 Peter Wright
// Satel INTEGRA integration
//
//! # satel_integra
//!
//! Monitoring and control of Satel INTEGRA alarm panels through an ETHM-1
//! (or ETHM-1 Plus) module, exposed to a home automation host as alarm
//! control panels, binary sensors and switches.
//!
//! The crate has three layers:
//!
//! - [`SatelClient`] speaks the ETHM-1 integration protocol: framing,
//!   commands, monitoring and reconnection.
//! - [`entities`] turn the client's status into host entities and route user
//!   commands back to the panel.
//! - [`Integration`] wires configured partitions, zones, inputs and outputs
//!   to a [`HostPlatform`]; [`mqtt::MqttPlatform`] publishes them with
//!   Home Assistant MQTT discovery.
//!
//! ## Quick Start
//!
//! ```no_run
//! use satel_integra::{AlarmController, ClientConfig, SatelClient, SatelEvent};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::builder()
//!         .host("192.168.0.100")
//!         .monitored_zones([1, 2, 3])
//!         .monitored_outputs([5])
//!         .build();
//!
//!     let client = SatelClient::new(config);
//!     client.connect().await?;
//!
//!     let mut events = client.subscribe();
//!     let monitor = client.clone();
//!     tokio::spawn(async move { monitor.monitor_status().await });
//!
//!     while let Ok(event) = events.recv().await {
//!         if let SatelEvent::ZonesUpdated(zones) = event {
//!             println!("Inputs changed: {zones:?}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod entities;
pub mod error;
pub mod event;
pub mod integration;
pub mod mqtt;
pub mod protocol;
pub mod settings;
pub mod signal;
pub mod state;
pub mod transport;

// Re-exports for convenience
pub use client::{AlarmController, SatelClient};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use constants::AlarmState;
pub use entities::{EntityCommand, EntityInfo, EntityKind, HostPlatform, Platform};
pub use error::{ConfigError, Result, ResultCode, SatelError, SetupError};
pub use event::{EventReceiver, SatelEvent};
pub use integration::Integration;
pub use settings::Settings;
pub use signal::{Dispatcher, Signal};
pub use state::{PanelStatus, PartitionState};
