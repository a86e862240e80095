// MIT License - Copyright (c) 2026 Peter Wright
// Alarm control panel entity

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

use crate::client::AlarmController;
use crate::entities::{
    AlarmPanelFeatures, EntityCommand, EntityInfo, EntityKind, HostPlatform, Platform,
};
use crate::settings::PartitionSettings;
use crate::signal::Signal;
use crate::state::{resolve_partition_state, PartitionState};

/// Delay between a disarm and the clear-alarm that follows it.
const CLEAR_ALARM_DELAY: Duration = Duration::from_secs(1);

/// One configured partition, exposed as an alarm control panel.
pub struct AlarmPanel<C, P> {
    controller: Arc<C>,
    platform: Arc<P>,
    info: EntityInfo,
    partition_id: u32,
    arm_home_mode: u8,
    zones: Vec<u32>,
    state: Option<PartitionState>,
}

impl<C: AlarmController, P: HostPlatform> AlarmPanel<C, P> {
    pub fn new(
        controller: Arc<C>,
        platform: Arc<P>,
        partition_id: u32,
        settings: &PartitionSettings,
    ) -> Self {
        let zones = settings.zone_numbers();
        Self {
            controller,
            platform,
            info: EntityInfo {
                unique_id: format!("alarm_partition_{partition_id}"),
                name: settings.name.clone(),
                kind: EntityKind::AlarmPanel {
                    features: AlarmPanelFeatures::ARM_HOME | AlarmPanelFeatures::ARM_AWAY,
                    zones: zones.clone(),
                },
            },
            partition_id,
            arm_home_mode: settings.arm_home_mode,
            zones,
            state: None,
        }
    }

    pub fn info(&self) -> &EntityInfo {
        &self.info
    }

    pub fn state(&self) -> Option<PartitionState> {
        self.state
    }

    /// Current state from the client; unknown while disconnected.
    async fn read_state(&self) -> Option<PartitionState> {
        let status = self.controller.status().await;
        if !status.connected {
            return None;
        }
        debug!("State map of partition {}: {:?}", self.partition_id, status.partition_states);
        Some(resolve_partition_state(&status.partition_states, &self.zones))
    }

    async fn write_state(&self) {
        self.platform
            .write_state(
                Platform::AlarmControlPanel,
                &self.info.unique_id,
                self.state.map(|s| s.as_str()),
            )
            .await;
    }

    /// Register with the host and publish the initial state.
    pub async fn added(&mut self) {
        debug!("Starts listening for panel messages");
        self.platform.add_entity(&self.info).await;
        self.state = self.read_state().await;
        self.write_state().await;
    }

    /// Handle a `PanelMessage` signal.
    pub async fn update(&mut self) {
        let state = self.read_state().await;
        debug!("Got status update, current status: {:?}", state);
        if state != self.state {
            self.state = state;
            self.write_state().await;
        } else {
            debug!("Ignoring alarm status message, same state");
        }
    }

    pub async fn disarm(&self, code: Option<&str>) {
        let Some(code) = code.filter(|c| !c.is_empty()) else {
            debug!("Code was empty or None");
            return;
        };

        let clear_alarm_necessary = self.state == Some(PartitionState::Triggered);
        debug!("Disarming, state: {:?}", self.state);

        if let Err(e) = self.controller.disarm(code, &self.zones).await {
            warn!("Disarm of partition {} failed: {}", self.partition_id, e);
        }

        if clear_alarm_necessary {
            sleep(CLEAR_ALARM_DELAY).await;
            if let Err(e) = self.controller.clear_alarm(code, &self.zones).await {
                warn!("Clear alarm of partition {} failed: {}", self.partition_id, e);
            }
        }
    }

    pub async fn arm_away(&self, code: Option<&str>) {
        debug!("Arming away");
        self.arm(code, 0).await;
    }

    pub async fn arm_home(&self, code: Option<&str>) {
        debug!("Arming home");
        self.arm(code, self.arm_home_mode).await;
    }

    async fn arm(&self, code: Option<&str>, mode: u8) {
        let Some(code) = code.filter(|c| !c.is_empty()) else {
            return;
        };
        if let Err(e) = self.controller.arm(code, &self.zones, mode).await {
            warn!("Arming partition {} failed: {}", self.partition_id, e);
        }
    }

    async fn handle_command(&self, command: EntityCommand) {
        match command {
            EntityCommand::Disarm { code } => self.disarm(code.as_deref()).await,
            EntityCommand::ArmAway { code } => self.arm_away(code.as_deref()).await,
            EntityCommand::ArmHome { code } => self.arm_home(code.as_deref()).await,
            other => debug!("Alarm panel ignores {:?}", other),
        }
    }

    /// Entity task: publish, then follow signals and user commands until
    /// either channel closes.
    pub async fn run(
        mut self,
        mut signals: broadcast::Receiver<Signal>,
        mut commands: mpsc::Receiver<EntityCommand>,
    ) {
        self.added().await;
        loop {
            tokio::select! {
                biased;
                signal = signals.recv() => match signal {
                    Ok(Signal::PanelMessage) => self.update().await,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Alarm panel {} missed {} signals", self.partition_id, n);
                        self.update().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }
        }
    }
}
