// MIT License - Copyright (c) 2026 Peter Wright
// Test doubles for the panel client and the host platform

use std::sync::Mutex;

use crate::client::AlarmController;
use crate::entities::{EntityInfo, HostPlatform, Platform};
use crate::error::{Result, SatelError};
use crate::event::{event_channel, EventReceiver, EventSender, SatelEvent};
use crate::state::PanelStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect,
    Arm { code: String, zones: Vec<u32>, mode: u8 },
    Disarm { code: String, zones: Vec<u32> },
    ClearAlarm { code: String, zones: Vec<u32> },
    SetOutput { code: String, output: u32, on: bool },
    KeepAlive,
    MonitorStatus,
    Close,
}

pub struct FakeController {
    pub status: Mutex<PanelStatus>,
    pub calls: Mutex<Vec<Call>>,
    pub fail_connect: bool,
    events: EventSender,
}

impl FakeController {
    pub fn new() -> Self {
        let (events, _) = event_channel(64);
        Self {
            status: Mutex::new(PanelStatus {
                connected: true,
                ..Default::default()
            }),
            calls: Mutex::new(Vec::new()),
            fail_connect: false,
            events,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_connect: true,
            ..Self::new()
        }
    }

    pub fn emit(&self, event: SatelEvent) {
        let _ = self.events.send(event);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl AlarmController for FakeController {
    async fn connect(&self) -> Result<()> {
        self.record(Call::Connect);
        if self.fail_connect {
            Err(SatelError::ConnectionTimeout)
        } else {
            Ok(())
        }
    }

    async fn status(&self) -> PanelStatus {
        self.status.lock().unwrap().clone()
    }

    fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    async fn arm(&self, code: &str, zones: &[u32], mode: u8) -> Result<()> {
        self.record(Call::Arm {
            code: code.to_string(),
            zones: zones.to_vec(),
            mode,
        });
        Ok(())
    }

    async fn disarm(&self, code: &str, zones: &[u32]) -> Result<()> {
        self.record(Call::Disarm {
            code: code.to_string(),
            zones: zones.to_vec(),
        });
        Ok(())
    }

    async fn clear_alarm(&self, code: &str, zones: &[u32]) -> Result<()> {
        self.record(Call::ClearAlarm {
            code: code.to_string(),
            zones: zones.to_vec(),
        });
        Ok(())
    }

    async fn set_output(&self, code: &str, output: u32, on: bool) -> Result<()> {
        self.record(Call::SetOutput {
            code: code.to_string(),
            output,
            on,
        });
        Ok(())
    }

    async fn keep_alive(&self) {
        self.record(Call::KeepAlive);
    }

    async fn monitor_status(&self) {
        self.record(Call::MonitorStatus);
    }

    async fn close(&self) {
        self.record(Call::Close);
    }
}

#[derive(Default)]
pub struct RecordingPlatform {
    pub added: Mutex<Vec<EntityInfo>>,
    pub states: Mutex<Vec<(Platform, String, Option<String>)>>,
}

impl RecordingPlatform {
    pub fn added(&self) -> Vec<EntityInfo> {
        self.added.lock().unwrap().clone()
    }

    /// States written for one entity, in order.
    pub fn states_of(&self, unique_id: &str) -> Vec<Option<String>> {
        self.states
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, id, _)| id == unique_id)
            .map(|(_, _, state)| state.clone())
            .collect()
    }
}

impl HostPlatform for RecordingPlatform {
    async fn add_entity(&self, info: &EntityInfo) {
        self.added.lock().unwrap().push(info.clone());
    }

    async fn write_state(&self, platform: Platform, unique_id: &str, state: Option<&str>) {
        self.states.lock().unwrap().push((
            platform,
            unique_id.to_string(),
            state.map(str::to_string),
        ));
    }
}
