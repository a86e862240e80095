// MIT License - Copyright (c) 2026 Peter Wright
// Switchable outputs

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::client::AlarmController;
use crate::entities::{slugify, EntityCommand, EntityInfo, EntityKind, HostPlatform, Platform};
use crate::settings::SwitchSettings;
use crate::signal::Signal;

/// A panel output the user can turn on and off with the alarm code.
pub struct Switch<C, P> {
    controller: Arc<C>,
    platform: Arc<P>,
    info: EntityInfo,
    number: u32,
    code: String,
    state: bool,
}

impl<C: AlarmController, P: HostPlatform> Switch<C, P> {
    pub fn new(
        controller: Arc<C>,
        platform: Arc<P>,
        partition_id: u32,
        number: u32,
        settings: &SwitchSettings,
        code: &str,
    ) -> Self {
        Self {
            controller,
            platform,
            info: EntityInfo {
                unique_id: slugify(
                    &format!("partition_{partition_id}_switch_{}", settings.name),
                    '_',
                ),
                name: settings.name.clone(),
                kind: EntityKind::Switch,
            },
            number,
            code: code.to_string(),
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
        let state = if self.state { "ON" } else { "OFF" };
        self.platform
            .write_state(Platform::Switch, &self.info.unique_id, Some(state))
            .await;
    }

    pub async fn added(&mut self) {
        self.platform.add_entity(&self.info).await;
        self.state = self
            .controller
            .status()
            .await
            .violated_outputs
            .contains(&self.number);
        self.write_state().await;
    }

    pub async fn devices_updated(&mut self, status: &BTreeMap<u32, bool>) {
        if let Some(state) = status.get(&self.number)
            && *state != self.state
        {
            self.state = *state;
            self.write_state().await;
        }
    }

    /// Switch the output. The published state follows the panel's next
    /// outputs notification.
    pub async fn turn(&self, on: bool) {
        debug!("Switching output {} {}", self.number, if on { "on" } else { "off" });
        if let Err(e) = self.controller.set_output(&self.code, self.number, on).await {
            warn!("Switching output {} failed: {}", self.number, e);
        }
    }

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
                    Ok(Signal::OutputsUpdated(status)) => self.devices_updated(&status).await,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("{} missed {} signals", self.info.unique_id, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                command = commands.recv() => match command {
                    Some(EntityCommand::TurnOn) => self.turn(true).await,
                    Some(EntityCommand::TurnOff) => self.turn(false).await,
                    Some(other) => debug!("Switch ignores {:?}", other),
                    None => break,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::fakes::{Call, FakeController, RecordingPlatform};

    fn switch() -> (
        Switch<FakeController, RecordingPlatform>,
        Arc<FakeController>,
        Arc<RecordingPlatform>,
    ) {
        let controller = Arc::new(FakeController::new());
        let platform = Arc::new(RecordingPlatform::default());
        let settings = SwitchSettings {
            name: "Gate".to_string(),
        };
        let switch = Switch::new(controller.clone(), platform.clone(), 1, 10, &settings, "1234");
        (switch, controller, platform)
    }

    #[tokio::test]
    async fn test_added_and_updates() {
        let (mut switch, controller, platform) = switch();
        controller.status.lock().unwrap().violated_outputs.insert(10);
        switch.added().await;
        assert!(switch.is_on());

        switch.devices_updated(&BTreeMap::from([(10, true)])).await;
        switch.devices_updated(&BTreeMap::from([(10, false)])).await;
        assert_eq!(
            platform.states_of("partition_1_switch_gate"),
            vec![Some("ON".to_string()), Some("OFF".to_string())]
        );
    }

    #[tokio::test]
    async fn test_commands_use_configured_code() {
        let (switch, controller, _platform) = switch();
        let (_signal_tx, signal_rx) = broadcast::channel(8);
        let (command_tx, command_rx) = mpsc::channel(8);
        let task = tokio::spawn(switch.run(signal_rx, command_rx));

        command_tx.send(EntityCommand::TurnOn).await.unwrap();
        command_tx.send(EntityCommand::TurnOff).await.unwrap();
        drop(command_tx);
        task.await.unwrap();

        assert_eq!(
            controller.calls(),
            vec![
                Call::SetOutput {
                    code: "1234".to_string(),
                    output: 10,
                    on: true
                },
                Call::SetOutput {
                    code: "1234".to_string(),
                    output: 10,
                    on: false
                },
            ]
        );
    }
}
