// MIT License - Copyright (c) 2026 Peter Wright
// Bridge configuration file

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::config::ClientConfig;
use crate::constants::{DEFAULT_PORT, OUTPUT_MASK_LEN, ZONE_MASK_LEN};
use crate::error::ConfigError;

/// Highest input number on an INTEGRA 256 Plus.
pub const MAX_INPUT: u32 = 256;
/// Highest panel partition number.
pub const MAX_ZONE: u32 = (ZONE_MASK_LEN * 8) as u32;
/// Highest output number.
pub const MAX_OUTPUT: u32 = (OUTPUT_MASK_LEN * 8) as u32;
/// Highest configured alarm panel id.
pub const MAX_PARTITION: u32 = 255;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub satel: SatelSettings,
    pub mqtt: MqttSettings,
    #[serde(default, deserialize_with = "deserialize_numbered")]
    pub partitions: BTreeMap<u32, PartitionSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SatelSettings {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Alarm code used for switchable outputs
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_ms: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_keep_alive() -> u64 {
    20
}
fn default_reconnect_delay() -> u64 {
    10
}
fn default_command_timeout() -> u64 {
    3000
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttSettings {
    pub url: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,
    #[serde(default = "default_base_topic")]
    pub base_topic: String,
}

fn default_client_id() -> String {
    "satel2mqtt".to_string()
}
fn default_discovery_prefix() -> String {
    "homeassistant".to_string()
}
fn default_base_topic() -> String {
    "satel".to_string()
}

/// One alarm control entity.
#[derive(Debug, Clone, Deserialize)]
pub struct PartitionSettings {
    pub name: String,
    #[serde(default = "default_arm_home_mode")]
    pub arm_home_mode: u8,
    #[serde(default, deserialize_with = "deserialize_numbered")]
    pub zones: BTreeMap<u32, ZoneSettings>,
}

fn default_arm_home_mode() -> u8 {
    1
}

/// A panel partition, armed and disarmed as part of its alarm entity.
#[derive(Debug, Clone, Deserialize)]
pub struct ZoneSettings {
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_numbered")]
    pub inputs: BTreeMap<u32, SensorSettings>,
    #[serde(default, deserialize_with = "deserialize_numbered")]
    pub outputs: BTreeMap<u32, SensorSettings>,
    #[serde(default, deserialize_with = "deserialize_numbered")]
    pub switchable_outputs: BTreeMap<u32, SwitchSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SensorSettings {
    pub name: String,
    /// Binary sensor device class
    #[serde(rename = "type", default = "default_sensor_type")]
    pub kind: String,
}

fn default_sensor_type() -> String {
    "motion".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SwitchSettings {
    pub name: String,
}

/// TOML keys are always strings; coerce them to numbers.
fn deserialize_numbered<'de, D, T>(deserializer: D) -> Result<BTreeMap<u32, T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let string_map: BTreeMap<String, T> = BTreeMap::deserialize(deserializer)?;
    let mut numbered = BTreeMap::new();
    for (k, v) in string_map {
        let id = k
            .trim()
            .parse::<u32>()
            .map_err(|_| serde::de::Error::custom(format!("invalid number: {k}")))?;
        if numbered.insert(id, v).is_some() {
            return Err(serde::de::Error::custom(format!("duplicate number: {k}")));
        }
    }
    Ok(numbered)
}

impl PartitionSettings {
    /// Panel partitions controlled by this entity.
    pub fn zone_numbers(&self) -> Vec<u32> {
        self.zones.keys().copied().collect()
    }

    /// Inputs of all zones, keyed by input number.
    pub fn inputs(&self) -> BTreeMap<u32, &SensorSettings> {
        merge_numbered(self.zones.values().map(|z| &z.inputs))
    }

    pub fn outputs(&self) -> BTreeMap<u32, &SensorSettings> {
        merge_numbered(self.zones.values().map(|z| &z.outputs))
    }

    pub fn switchable_outputs(&self) -> BTreeMap<u32, &SwitchSettings> {
        merge_numbered(self.zones.values().map(|z| &z.switchable_outputs))
    }

    /// Output numbers whose state is tracked: outputs first, then switchable outputs.
    pub fn monitored_outputs(&self) -> Vec<u32> {
        self.outputs()
            .into_keys()
            .chain(self.switchable_outputs().into_keys())
            .collect()
    }
}

fn merge_numbered<'a, T: 'a>(
    maps: impl Iterator<Item = &'a BTreeMap<u32, T>>,
) -> BTreeMap<u32, &'a T> {
    let mut all = BTreeMap::new();
    for map in maps {
        for (id, v) in map {
            all.entry(*id).or_insert(v);
        }
    }
    all
}

fn check_range(kind: &'static str, id: u32, max: u32) -> Result<(), ConfigError> {
    if id == 0 || id > max {
        return Err(ConfigError::InvalidNumber { kind, id, max });
    }
    Ok(())
}

impl Settings {
    /// Read, parse and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse and validate configuration text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.satel.port == 0 {
            return Err(ConfigError::InvalidPort(self.satel.port));
        }
        for (field, value) in [
            ("keep_alive_secs", self.satel.keep_alive_secs),
            ("reconnect_delay_secs", self.satel.reconnect_delay_secs),
            ("command_timeout_ms", self.satel.command_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroInterval(field));
            }
        }
        parse_mqtt_url(&self.mqtt.url)?;

        let mut outputs = BTreeSet::new();
        let mut switchable = BTreeSet::new();
        for (id, partition) in &self.partitions {
            check_range("partition", *id, MAX_PARTITION)?;
            if partition.arm_home_mode > 3 {
                return Err(ConfigError::InvalidArmHomeMode {
                    partition: *id,
                    mode: partition.arm_home_mode,
                });
            }
            let mut partition_inputs = BTreeSet::new();
            let mut partition_outputs = BTreeSet::new();
            for (zone_id, zone) in &partition.zones {
                check_range("zone", *zone_id, MAX_ZONE)?;
                for input in zone.inputs.keys() {
                    check_range("input", *input, MAX_INPUT)?;
                    if !partition_inputs.insert(*input) {
                        return Err(ConfigError::Duplicate { kind: "input", id: *input });
                    }
                }
                for output in zone.outputs.keys().chain(zone.switchable_outputs.keys()) {
                    check_range("output", *output, MAX_OUTPUT)?;
                    if !partition_outputs.insert(*output) {
                        return Err(ConfigError::Duplicate { kind: "output", id: *output });
                    }
                }
                outputs.extend(zone.outputs.keys().copied());
                switchable.extend(zone.switchable_outputs.keys().copied());
            }
        }

        if let Some(id) = outputs.intersection(&switchable).next() {
            return Err(ConfigError::Duplicate { kind: "output", id: *id });
        }
        if !switchable.is_empty() && self.alarm_code().is_none() {
            return Err(ConfigError::AlarmCodeRequired);
        }
        Ok(())
    }

    /// The configured alarm code, if any.
    pub fn alarm_code(&self) -> Option<&str> {
        self.satel.code.as_deref().filter(|c| !c.is_empty())
    }

    /// Client settings monitoring the inputs and outputs of every partition.
    pub fn client_config(&self) -> ClientConfig {
        let zones: BTreeSet<u32> = self
            .partitions
            .values()
            .flat_map(|p| p.inputs().into_keys())
            .collect();
        let outputs: BTreeSet<u32> = self
            .partitions
            .values()
            .flat_map(|p| p.monitored_outputs())
            .collect();

        ClientConfig::builder()
            .host(&self.satel.host)
            .port(self.satel.port)
            .monitored_zones(zones)
            .monitored_outputs(outputs)
            .keep_alive_interval_ms(self.satel.keep_alive_secs.saturating_mul(1000))
            .reconnect_delay_ms(self.satel.reconnect_delay_secs.saturating_mul(1000))
            .command_timeout_ms(self.satel.command_timeout_ms)
            .build()
    }
}

/// Split `mqtt://host:port` into host and port.
pub fn parse_mqtt_url(url: &str) -> Result<(String, u16), ConfigError> {
    let invalid = |reason| ConfigError::InvalidMqttUrl {
        url: url.to_string(),
        reason,
    };
    let stripped = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port_str) = stripped
        .rsplit_once(':')
        .ok_or_else(|| invalid("must be in format mqtt://host:port"))?;
    if host.is_empty() {
        return Err(invalid("missing host"));
    }
    let port: u16 = port_str
        .parse()
        .map_err(|_| invalid("invalid port number"))?;

    Ok((host.to_string(), port))
}
