// MIT License - Copyright (c) 2026 Peter Wright
// Input and output binary sensors

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::client::AlarmController;
use crate::entities::{slugify, EntityInfo, EntityKind, HostPlatform, Platform};
use crate::settings::SensorSettings;
use crate::signal::Signal;

/// Which notification a sensor follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorSource {
    /// Violated inputs (`ZonesUpdated`)
    Input,
    /// Active outputs (`OutputsUpdated`)
    Output,
}

pub struct BinarySensor<C, P> {
    controller: Arc<C>,
    platform: Arc<P>,
    info: EntityInfo,
    number: u32,
    source: SensorSource,
    state: bool,
}

fn on_off(state: bool) -> &'static str {
    if state { "ON" } else { "OFF" }
}

impl<C: AlarmController, P: HostPlatform> BinarySensor<C, P> {
    pub fn new(
        controller: Arc<C>,
        platform: Arc<P>,
        partition_id: u32,
        number: u32,
        settings: &SensorSettings,
        source: SensorSource,
    ) -> Self {
        let icon = (settings.kind == "smoke").then_some("mdi:fire");
        Self {
            controller,
            platform,
            info: EntityInfo {
                unique_id: slugify(&format!("partition_{partition_id}_{}", settings.name), '_'),
                name: settings.name.clone(),
                kind: EntityKind::BinarySensor {
                    device_class: settings.kind.clone(),
                    icon,
                },
            },
            number,
            source,
            state: false,
        }
    }

    pub fn info(&self) -> &EntityInfo {
        &self.info
    }

    pub fn is_on(&self) -> bool {
        self.state
    }

    async fn write_state(&self) {
        self.platform
            .write_state(Platform::BinarySensor, &self.info.unique_id, Some(on_off(self.state)))
            .await;
    }

    /// Register with the host and publish the state the client already knows.
    pub async fn added(&mut self) {
        self.platform.add_entity(&self.info).await;
        let status = self.controller.status().await;
        self.state = match self.source {
            SensorSource::Input => status.violated_zones.contains(&self.number),
            SensorSource::Output => status.violated_outputs.contains(&self.number),
        };
        self.write_state().await;
    }

    /// Apply a status map; unrelated or unchanged entries are ignored.
    pub async fn devices_updated(&mut self, status: &BTreeMap<u32, bool>) {
        if let Some(state) = status.get(&self.number)
            && *state != self.state
        {
            debug!("{} is now {}", self.info.unique_id, on_off(*state));
            self.state = *state;
            self.write_state().await;
        }
    }

    pub async fn run(mut self, mut signals: broadcast::Receiver<Signal>) {
        self.added().await;
        loop {
            match signals.recv().await {
                Ok(Signal::ZonesUpdated(status)) if self.source == SensorSource::Input => {
                    self.devices_updated(&status).await;
                }
                Ok(Signal::OutputsUpdated(status)) if self.source == SensorSource::Output => {
                    self.devices_updated(&status).await;
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("{} missed {} signals", self.info.unique_id, n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
