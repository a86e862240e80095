// MIT License - Copyright (c) 2026 Peter Wright
// Client configuration

use crate::constants::DEFAULT_PORT;

/// Configuration for connecting to the ETHM module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// ETHM-1 IP address or host name
    pub host: String,
    /// ETHM-1 integration port (default: 7094)
    pub port: u16,
    /// Inputs reported in `ZonesUpdated` notifications
    pub monitored_zones: Vec<u32>,
    /// Outputs reported in `OutputsUpdated` notifications
    pub monitored_outputs: Vec<u32>,
    /// Keep-alive query interval in milliseconds (the module drops idle links after ~25s)
    pub keep_alive_interval_ms: u64,
    /// Delay between reconnection attempts in milliseconds
    pub reconnect_delay_ms: u64,
    /// How long to wait for the result of a control command
    pub command_timeout_ms: u64,
    /// TCP connect timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "192.168.0.100".to_string(),
            port: DEFAULT_PORT,
            monitored_zones: Vec::new(),
            monitored_outputs: Vec::new(),
            keep_alive_interval_ms: 20000,
            reconnect_delay_ms: 10000,
            command_timeout_ms: 3000,
            connect_timeout_ms: 5000,
        }
    }
}

impl ClientConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for ClientConfig.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn monitored_zones(mut self, zones: impl IntoIterator<Item = u32>) -> Self {
        self.config.monitored_zones = zones.into_iter().collect();
        self
    }

    pub fn monitored_outputs(mut self, outputs: impl IntoIterator<Item = u32>) -> Self {
        self.config.monitored_outputs = outputs.into_iter().collect();
        self
    }

    pub fn keep_alive_interval_ms(mut self, ms: u64) -> Self {
        self.config.keep_alive_interval_ms = ms;
        self
    }

    pub fn reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.config.reconnect_delay_ms = ms;
        self
    }

    pub fn command_timeout_ms(mut self, ms: u64) -> Self {
        self.config.command_timeout_ms = ms;
        self
    }

    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}
