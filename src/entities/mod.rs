// MIT License - Copyright (c) 2026 Peter Wright
// Entities exposed to the home automation host

pub mod alarm_panel;
pub mod binary_sensor;
pub mod switch;

#[cfg(test)]
pub(crate) mod fakes;

use std::fmt;
use std::future::Future;

use bitflags::bitflags;

pub use alarm_panel::AlarmPanel;
pub use binary_sensor::{BinarySensor, SensorSource};
pub use switch::Switch;

/// Host component an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    AlarmControlPanel,
    BinarySensor,
    Switch,
}

impl Platform {
    /// Component name used in discovery topics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlarmControlPanel => "alarm_control_panel",
            Self::BinarySensor => "binary_sensor",
            Self::Switch => "switch",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Arming actions offered by an alarm panel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AlarmPanelFeatures: u32 {
        const ARM_HOME = 1;
        const ARM_AWAY = 2;
    }
}

impl AlarmPanelFeatures {
    /// Feature names in the form the host's discovery schema expects.
    pub fn names(&self) -> Vec<String> {
        self.iter_names()
            .map(|(name, _)| name.to_ascii_lowercase())
            .collect()
    }
}

/// Platform-specific description of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKind {
    AlarmPanel {
        features: AlarmPanelFeatures,
        /// Panel partitions controlled by this entity
        zones: Vec<u32>,
    },
    BinarySensor {
        device_class: String,
        icon: Option<&'static str>,
    },
    Switch,
}

/// Everything the host needs to register an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityInfo {
    pub unique_id: String,
    pub name: String,
    pub kind: EntityKind,
}

impl EntityInfo {
    pub fn platform(&self) -> Platform {
        match self.kind {
            EntityKind::AlarmPanel { .. } => Platform::AlarmControlPanel,
            EntityKind::BinarySensor { .. } => Platform::BinarySensor,
            EntityKind::Switch => Platform::Switch,
        }
    }
}

/// User actions routed from the host to an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityCommand {
    Disarm { code: Option<String> },
    ArmAway { code: Option<String> },
    ArmHome { code: Option<String> },
    TurnOn,
    TurnOff,
}

/// The home automation host the entities are published to.
pub trait HostPlatform: Send + Sync + 'static {
    /// Register an entity.
    fn add_entity(&self, info: &EntityInfo) -> impl Future<Output = ()> + Send;

    /// Publish an entity's state. `None` means the state is unknown.
    fn write_state(
        &self,
        platform: Platform,
        unique_id: &str,
        state: Option<&str>,
    ) -> impl Future<Output = ()> + Send;
}

/// Lowercase ASCII identifier: every script is transliterated and runs of
/// other characters collapse to `separator`.
pub fn slugify(text: &str, separator: char) -> String {
    let slug = slug::slugify(text);
    if separator == '-' {
        slug
    } else {
        slug.replace('-', &separator.to_string())
    }
}
