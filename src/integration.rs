// MIT License - Copyright (c) 2026 Peter Wright
// Integration setup: entities, callbacks and background loops

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::AlarmController;
use crate::entities::{
    AlarmPanel, BinarySensor, EntityCommand, EntityInfo, HostPlatform, Platform, SensorSource,
    Switch,
};
use crate::error::SetupError;
use crate::event::{EventReceiver, SatelEvent};
use crate::settings::Settings;
use crate::signal::{Dispatcher, Signal};

const COMMAND_QUEUE: usize = 16;

/// A running integration: the entity tasks, the client loops and the
/// routes for user commands.
pub struct Integration<C: AlarmController> {
    controller: Arc<C>,
    dispatcher: Dispatcher,
    entities: Vec<EntityInfo>,
    routes: HashMap<(Platform, String), mpsc::Sender<EntityCommand>>,
    tasks: Vec<JoinHandle<()>>,
}

impl<C: AlarmController> Integration<C> {
    /// Connect to the panel, register every configured entity and start
    /// monitoring.
    pub async fn setup<P: HostPlatform>(
        settings: &Settings,
        controller: Arc<C>,
        platform: Arc<P>,
    ) -> Result<Self, SetupError> {
        settings.validate()?;
        controller.connect().await.map_err(SetupError::Connect)?;

        let dispatcher = Dispatcher::default();
        let mut integration = Self {
            controller: controller.clone(),
            dispatcher: dispatcher.clone(),
            entities: Vec::new(),
            routes: HashMap::new(),
            tasks: Vec::new(),
        };

        let events = controller.subscribe();
        integration
            .tasks
            .push(tokio::spawn(forward_events(events, dispatcher.clone())));

        let mut seen = HashSet::new();
        for (partition_id, partition) in &settings.partitions {
            let panel = AlarmPanel::new(controller.clone(), platform.clone(), *partition_id, partition);
            if integration.register(&mut seen, panel.info()) {
                let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
                integration.route(panel.info(), tx);
                integration
                    .tasks
                    .push(tokio::spawn(panel.run(dispatcher.connect(), rx)));
            }

            let sensors = partition
                .inputs()
                .into_iter()
                .map(|(n, s)| (n, s, SensorSource::Input))
                .chain(
                    partition
                        .outputs()
                        .into_iter()
                        .map(|(n, s)| (n, s, SensorSource::Output)),
                );
            for (number, sensor_settings, source) in sensors {
                let sensor = BinarySensor::new(
                    controller.clone(),
                    platform.clone(),
                    *partition_id,
                    number,
                    sensor_settings,
                    source,
                );
                if integration.register(&mut seen, sensor.info()) {
                    integration
                        .tasks
                        .push(tokio::spawn(sensor.run(dispatcher.connect())));
                }
            }

            let switches = partition.switchable_outputs();
            if let Some(code) = settings.alarm_code() {
                for (number, switch_settings) in switches {
                    let switch = Switch::new(
                        controller.clone(),
                        platform.clone(),
                        *partition_id,
                        number,
                        switch_settings,
                        code,
                    );
                    if integration.register(&mut seen, switch.info()) {
                        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
                        integration.route(switch.info(), tx);
                        integration
                            .tasks
                            .push(tokio::spawn(switch.run(dispatcher.connect(), rx)));
                    }
                }
            }
        }

        let keep_alive = controller.clone();
        integration
            .tasks
            .push(tokio::spawn(async move { keep_alive.keep_alive().await }));
        let monitor = controller.clone();
        integration
            .tasks
            .push(tokio::spawn(async move { monitor.monitor_status().await }));

        info!("Integration set up with {} entities", integration.entities.len());
        Ok(integration)
    }

    fn register(&mut self, seen: &mut HashSet<(Platform, String)>, info: &EntityInfo) -> bool {
        if !seen.insert((info.platform(), info.unique_id.clone())) {
            warn!("Duplicate entity id {}, skipping {}", info.unique_id, info.name);
            return false;
        }
        self.entities.push(info.clone());
        true
    }

    fn route(&mut self, info: &EntityInfo, tx: mpsc::Sender<EntityCommand>) {
        self.routes
            .insert((info.platform(), info.unique_id.clone()), tx);
    }

    /// Registered entities, in registration order.
    pub fn entities(&self) -> &[EntityInfo] {
        &self.entities
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Deliver a user command to an entity. Returns false if no entity
    /// accepts commands under that id.
    pub async fn command(&self, platform: Platform, unique_id: &str, command: EntityCommand) -> bool {
        let Some(tx) = self.routes.get(&(platform, unique_id.to_string())) else {
            debug!("No {} entity {}", platform, unique_id);
            return false;
        };
        tx.send(command).await.is_ok()
    }

    /// Close the client and stop every task.
    pub async fn shutdown(self) {
        self.controller.close().await;
        for task in self.tasks {
            task.abort();
        }
    }
}

/// Turn client notifications into bus signals.
async fn forward_events(mut events: EventReceiver, dispatcher: Dispatcher) {
    loop {
        match events.recv().await {
            Ok(SatelEvent::AlarmStatus) => {
                debug!("Sending request to update panel state");
                dispatcher.send(Signal::PanelMessage);
            }
            Ok(SatelEvent::ZonesUpdated(status)) => {
                debug!("Inputs callback, status: {:?}", status);
                dispatcher.send(Signal::ZonesUpdated(Arc::new(status)));
            }
            Ok(SatelEvent::OutputsUpdated(status)) => {
                debug!("Outputs updated callback, status: {:?}", status);
                dispatcher.send(Signal::OutputsUpdated(Arc::new(status)));
            }
            Ok(event) => debug!("Client event: {:?}", event),
            Err(RecvError::Lagged(n)) => {
                warn!("Missed {} client events", n);
                dispatcher.send(Signal::PanelMessage);
            }
            Err(RecvError::Closed) => break,
        }
    }
}
