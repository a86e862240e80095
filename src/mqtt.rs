// MIT License - Copyright (c) 2026 Peter Wright
// Home Assistant MQTT discovery host

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use crate::entities::{slugify, EntityCommand, EntityInfo, EntityKind, HostPlatform, Platform};
use crate::error::ConfigError;
use crate::settings::{parse_mqtt_url, MqttSettings};

pub const ONLINE: &str = "online";
pub const OFFLINE: &str = "offline";

/// Alarm panel command payload rendered by Home Assistant.
const ALARM_COMMAND_TEMPLATE: &str = r#"{"action":"{{ action }}","code":"{{ code }}"}"#;

/// Topic layout for one bridge instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    discovery_prefix: String,
    base_topic: String,
    node_id: String,
}

impl Topics {
    pub fn new(settings: &MqttSettings) -> Self {
        Self {
            discovery_prefix: settings.discovery_prefix.trim_end_matches('/').to_string(),
            base_topic: settings.base_topic.trim_end_matches('/').to_string(),
            node_id: slugify(&settings.client_id, '_'),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn config(&self, platform: Platform, unique_id: &str) -> String {
        format!(
            "{}/{}/{}/{}/config",
            self.discovery_prefix, platform, self.node_id, unique_id
        )
    }

    pub fn state(&self, platform: Platform, unique_id: &str) -> String {
        format!("{}/{}/{}/state", self.base_topic, platform, unique_id)
    }

    pub fn command(&self, platform: Platform, unique_id: &str) -> String {
        format!("{}/{}/{}/set", self.base_topic, platform, unique_id)
    }

    pub fn availability(&self, platform: Platform, unique_id: &str) -> String {
        format!("{}/{}/{}/availability", self.base_topic, platform, unique_id)
    }

    pub fn attributes(&self, platform: Platform, unique_id: &str) -> String {
        format!("{}/{}/{}/attributes", self.base_topic, platform, unique_id)
    }

    /// Bridge availability, also the last-will topic.
    pub fn bridge_status(&self) -> String {
        format!("{}/status", self.base_topic)
    }

    /// Subscription covering every command topic.
    pub fn command_filter(&self) -> String {
        format!("{}/+/+/set", self.base_topic)
    }

    /// Split a command topic into platform and entity id.
    pub fn parse_command_topic<'a>(&self, topic: &'a str) -> Option<(Platform, &'a str)> {
        let rest = topic.strip_prefix(&self.base_topic)?.strip_prefix('/')?;
        let rest = rest.strip_suffix("/set")?;
        let (component, unique_id) = rest.split_once('/')?;
        if unique_id.is_empty() || unique_id.contains('/') {
            return None;
        }
        let platform = match component {
            "alarm_control_panel" => Platform::AlarmControlPanel,
            "switch" => Platform::Switch,
            "binary_sensor" => Platform::BinarySensor,
            _ => return None,
        };
        Some((platform, unique_id))
    }
}

// ---------------------------------------------------------------------------
// Discovery payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct Availability {
    pub topic: String,
}

#[derive(Debug, Serialize)]
pub struct Device {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub sw_version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryConfig {
    pub name: String,
    pub unique_id: String,
    pub object_id: String,
    pub state_topic: String,
    pub availability: Vec<Availability>,
    pub availability_mode: &'static str,
    pub device: Device,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_attributes_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_template: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_features: Option<Vec<String>>,
}

/// Discovery config for one entity.
pub fn discovery_config(topics: &Topics, info: &EntityInfo) -> DiscoveryConfig {
    let platform = info.platform();
    let id = &info.unique_id;
    let mut config = DiscoveryConfig {
        name: info.name.clone(),
        unique_id: format!("{}_{}", topics.node_id, id),
        object_id: id.clone(),
        state_topic: topics.state(platform, id),
        availability: vec![
            Availability {
                topic: topics.bridge_status(),
            },
            Availability {
                topic: topics.availability(platform, id),
            },
        ],
        availability_mode: "all",
        device: Device {
            identifiers: vec![topics.node_id.clone()],
            name: "Satel INTEGRA".to_string(),
            manufacturer: "Satel",
            model: "INTEGRA (ETHM-1)",
            sw_version: env!("CARGO_PKG_VERSION"),
        },
        command_topic: None,
        device_class: None,
        icon: None,
        json_attributes_topic: None,
        code: None,
        command_template: None,
        supported_features: None,
    };

    match &info.kind {
        EntityKind::AlarmPanel { features, .. } => {
            config.command_topic = Some(topics.command(platform, id));
            config.json_attributes_topic = Some(topics.attributes(platform, id));
            config.code = Some("REMOTE_CODE");
            config.command_template = Some(ALARM_COMMAND_TEMPLATE);
            config.supported_features = Some(features.names());
        }
        EntityKind::BinarySensor { device_class, icon } => {
            config.device_class = Some(device_class.clone());
            config.icon = *icon;
        }
        EntityKind::Switch => {
            config.command_topic = Some(topics.command(platform, id));
        }
    }
    config
}

/// Extra attributes published alongside an alarm panel's state.
#[derive(Debug, Serialize)]
pub struct AlarmAttributes<'a> {
    pub zones: &'a [u32],
    pub changed_at: String,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AlarmCommandPayload {
    action: String,
    #[serde(default)]
    code: Option<String>,
}

/// Parse a command payload for an entity of `platform`.
///
/// Alarm panels accept `{"action": "...", "code": "..."}` or a bare action;
/// switches accept `ON`/`OFF`.
pub fn parse_command(platform: Platform, payload: &[u8]) -> Option<EntityCommand> {
    let text = std::str::from_utf8(payload).ok()?.trim();
    match platform {
        Platform::AlarmControlPanel => {
            let (action, code) = match serde_json::from_str::<AlarmCommandPayload>(text) {
                Ok(p) => (p.action, p.code),
                Err(_) => (text.to_string(), None),
            };
            let code = code.filter(|c| !c.is_empty());
            match action.to_ascii_uppercase().as_str() {
                "DISARM" => Some(EntityCommand::Disarm { code }),
                "ARM_AWAY" => Some(EntityCommand::ArmAway { code }),
                "ARM_HOME" => Some(EntityCommand::ArmHome { code }),
                _ => None,
            }
        }
        Platform::Switch => match text.to_ascii_uppercase().as_str() {
            "ON" => Some(EntityCommand::TurnOn),
            "OFF" => Some(EntityCommand::TurnOff),
            _ => None,
        },
        Platform::BinarySensor => None,
    }
}

/// A parsed command addressed to an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedCommand {
    pub platform: Platform,
    pub unique_id: String,
    pub command: EntityCommand,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// MQTT options with the bridge's last will.
pub fn mqtt_options(settings: &MqttSettings, topics: &Topics) -> Result<MqttOptions, ConfigError> {
    let (host, port) = parse_mqtt_url(&settings.url)?;
    let mut opts = MqttOptions::new(&settings.client_id, host, port);
    opts.set_keep_alive(Duration::from_secs(30));
    opts.set_last_will(LastWill::new(
        topics.bridge_status(),
        OFFLINE,
        QoS::AtLeastOnce,
        true,
    ));
    Ok(opts)
}

async fn publish_json(client: &AsyncClient, topic: &str, payload: &impl Serialize, retain: bool) {
    match serde_json::to_string(payload) {
        Ok(json) => publish(client, topic, json, retain).await,
        Err(e) => error!("Failed to serialize MQTT payload: {e}"),
    }
}

async fn publish(client: &AsyncClient, topic: &str, payload: impl Into<Vec<u8>>, retain: bool) {
    if let Err(e) = client.publish(topic, QoS::AtLeastOnce, retain, payload).await {
        error!("Failed to publish to {topic}: {e}");
    }
}

/// Publishes entities through MQTT discovery.
pub struct MqttPlatform {
    client: AsyncClient,
    topics: Topics,
    alarm_zones: Mutex<HashMap<String, Vec<u32>>>,
}

impl MqttPlatform {
    pub fn new(client: AsyncClient, topics: Topics) -> Self {
        Self {
            client,
            topics,
            alarm_zones: Mutex::new(HashMap::new()),
        }
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Mark the bridge itself online or offline.
    pub async fn set_bridge_status(&self, online: bool) {
        let status = if online { ONLINE } else { OFFLINE };
        publish(&self.client, &self.topics.bridge_status(), status, true).await;
    }

    fn remember_zones(&self, unique_id: &str, zones: &[u32]) {
        if let Ok(mut alarm_zones) = self.alarm_zones.lock() {
            alarm_zones.insert(unique_id.to_string(), zones.to_vec());
        }
    }

    fn zones_of(&self, unique_id: &str) -> Vec<u32> {
        self.alarm_zones
            .lock()
            .map(|zones| zones.get(unique_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

impl HostPlatform for MqttPlatform {
    async fn add_entity(&self, info: &EntityInfo) {
        let platform = info.platform();
        if let EntityKind::AlarmPanel { zones, .. } = &info.kind {
            self.remember_zones(&info.unique_id, zones);
        }
        let config = discovery_config(&self.topics, info);
        info!("MQTT: announcing {} {}", platform, info.unique_id);
        publish_json(
            &self.client,
            &self.topics.config(platform, &info.unique_id),
            &config,
            true,
        )
        .await;
    }

    async fn write_state(&self, platform: Platform, unique_id: &str, state: Option<&str>) {
        let availability = self.topics.availability(platform, unique_id);
        let Some(state) = state else {
            debug!("{} {} state unknown", platform, unique_id);
            publish(&self.client, &availability, OFFLINE, true).await;
            return;
        };

        publish(&self.client, &availability, ONLINE, true).await;
        publish(
            &self.client,
            &self.topics.state(platform, unique_id),
            state.to_string(),
            true,
        )
        .await;

        if platform == Platform::AlarmControlPanel {
            let zones = self.zones_of(unique_id);
            let attributes = AlarmAttributes {
                zones: &zones,
                changed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            };
            publish_json(
                &self.client,
                &self.topics.attributes(platform, unique_id),
                &attributes,
                true,
            )
            .await;
        }
    }
}

/// Drive the MQTT connection: announce the bridge, (re)subscribe on every
/// connect and forward parsed commands to `commands`.
pub async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    topics: Topics,
    commands: mpsc::Sender<RoutedCommand>,
) {
    loop {
        match eventloop.poll().await {
            Ok(event) => {
                if !handle_event(event, &client, &topics, &commands).await {
                    info!("Command receiver closed, stopping MQTT loop");
                    break;
                }
            }
            Err(e) => {
                error!("MQTT event loop error: {e}");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Handle one event from the broker. Returns false once `commands` is closed.
async fn handle_event(
    event: Event,
    client: &AsyncClient,
    topics: &Topics,
    commands: &mpsc::Sender<RoutedCommand>,
) -> bool {
    match event {
        Event::Incoming(Packet::ConnAck(_)) => {
            // rumqttc does not resubscribe after a broker reconnect
            let filter = topics.command_filter();
            info!("MQTT: connected, subscribing to {filter}");
            publish(client, &topics.bridge_status(), ONLINE, true).await;
            if let Err(e) = client.subscribe(&filter, QoS::AtLeastOnce).await {
                error!("Failed to subscribe to {filter}: {e}");
            }
        }
        Event::Incoming(Packet::Publish(msg)) => {
            let Some((platform, unique_id)) = topics.parse_command_topic(&msg.topic) else {
                return true;
            };
            match parse_command(platform, &msg.payload) {
                Some(command) => {
                    info!("MQTT command for {platform} {unique_id}: {:?}", redact(&command));
                    let routed = RoutedCommand {
                        platform,
                        unique_id: unique_id.to_string(),
                        command,
                    };
                    return commands.send(routed).await.is_ok();
                }
                None => warn!("Unrecognised command on {}", msg.topic),
            }
        }
        _ => {}
    }
    true
}

/// Command with any alarm code masked, for logging.
fn redact(command: &EntityCommand) -> EntityCommand {
    let mask = |code: &Option<String>| code.as_ref().map(|_| "****".to_string());
    match command {
        EntityCommand::Disarm { code } => EntityCommand::Disarm { code: mask(code) },
        EntityCommand::ArmAway { code } => EntityCommand::ArmAway { code: mask(code) },
        EntityCommand::ArmHome { code } => EntityCommand::ArmHome { code: mask(code) },
        other => other.clone(),
    }
}
