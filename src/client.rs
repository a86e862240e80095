// MIT License - Copyright (c) 2026 Peter Wright
// Asynchronous Satel INTEGRA client

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::constants::{cmd, monitored_commands, AlarmState};
use crate::error::{ResultCode, Result, SatelError};
use crate::event::{event_channel, EventReceiver, EventSender, SatelEvent};
use crate::protocol::{decode_mask, Command, Frame};
use crate::state::PanelStatus;
use crate::transport::command::CommandEngine;
use crate::transport::direct::DirectTcpTransport;

/// The operations the integration needs from an alarm panel client.
///
/// [`SatelClient`] is the production implementation; tests drive the
/// integration through a fake.
pub trait AlarmController: Send + Sync + 'static {
    /// Open the connection to the panel.
    fn connect(&self) -> impl Future<Output = Result<()>> + Send;

    /// Snapshot of the last known panel state.
    fn status(&self) -> impl Future<Output = PanelStatus> + Send;

    /// Subscribe to client notifications.
    fn subscribe(&self) -> EventReceiver;

    fn arm(&self, code: &str, zones: &[u32], mode: u8) -> impl Future<Output = Result<()>> + Send;

    fn disarm(&self, code: &str, zones: &[u32]) -> impl Future<Output = Result<()>> + Send;

    fn clear_alarm(&self, code: &str, zones: &[u32]) -> impl Future<Output = Result<()>> + Send;

    fn set_output(&self, code: &str, output: u32, on: bool) -> impl Future<Output = Result<()>> + Send;

    /// Keep the connection from idling out. Runs until closed.
    fn keep_alive(&self) -> impl Future<Output = ()> + Send;

    /// Reconnect, start monitoring and process notifications. Runs until closed.
    fn monitor_status(&self) -> impl Future<Output = ()> + Send;

    /// Stop the background loops and drop the connection.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Client for the ETHM-1 integration protocol.
pub struct SatelClient {
    config: ClientConfig,
    status: RwLock<PanelStatus>,
    transport: Mutex<Option<DirectTcpTransport>>,
    frames: Mutex<Option<mpsc::Receiver<Frame>>>,
    event_tx: EventSender,
    shutdown_tx: watch::Sender<bool>,
}

impl SatelClient {
    pub fn new(config: ClientConfig) -> Arc<Self> {
        let (event_tx, _) = event_channel(256);
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            config,
            status: RwLock::new(PanelStatus::default()),
            transport: Mutex::new(None),
            frames: Mutex::new(None),
            event_tx,
            shutdown_tx,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn connected(&self) -> bool {
        if !self.status.read().await.connected {
            return false;
        }
        match self.transport.lock().await.as_ref() {
            Some(t) => t.is_connected().await,
            None => false,
        }
    }

    fn is_closed(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    async fn engine(&self) -> Option<Arc<CommandEngine>> {
        self.transport
            .lock()
            .await
            .as_ref()
            .map(|t| t.engine().clone())
    }

    /// Send a control command and map a refusal to [`SatelError::Rejected`].
    async fn execute(&self, command: Command) -> Result<()> {
        let engine = self.engine().await.ok_or(SatelError::Disconnected)?;
        let result = engine.send_command(&command).await?;
        if result.is_success() {
            Ok(())
        } else {
            Err(SatelError::Rejected(result))
        }
    }

    async fn start_monitoring(&self) -> Result<()> {
        let engine = self.engine().await.ok_or(SatelError::Disconnected)?;
        let result = engine
            .send_command(&Command::StartMonitoring {
                commands: monitored_commands(),
            })
            .await?;
        if result == ResultCode::Accepted {
            info!("Monitoring started");
            Ok(())
        } else {
            Err(SatelError::MonitoringRejected(result))
        }
    }

    async fn mark_disconnected(&self) {
        if let Some(transport) = self.transport.lock().await.take() {
            let _ = transport.disconnect().await;
        }
        self.frames.lock().await.take();

        let was_connected = {
            let mut status = self.status.write().await;
            std::mem::replace(&mut status.connected, false)
        };
        if was_connected {
            let _ = self.event_tx.send(SatelEvent::Disconnected);
            let _ = self.event_tx.send(SatelEvent::AlarmStatus);
        }
    }

    /// Sleep for the reconnect delay, returning early when closed.
    async fn pause(&self) {
        let mut shutdown = self.shutdown_tx.subscribe();
        if self.is_closed() {
            return;
        }
        tokio::select! {
            _ = sleep(Duration::from_millis(self.config.reconnect_delay_ms)) => {}
            _ = shutdown.changed() => {}
        }
    }

    /// Apply one notification frame to the panel status.
    async fn handle_frame(&self, frame: Frame) {
        match frame.command {
            cmd::ZONES_VIOLATION => {
                let violated = decode_mask(&frame.data);
                let flags = PanelStatus::flags_for(&violated, &self.config.monitored_zones);
                debug!("Violated zones: {:?}", violated);
                self.status.write().await.violated_zones = violated;
                let _ = self.event_tx.send(SatelEvent::ZonesUpdated(flags));
            }
            cmd::OUTPUTS_STATE => {
                let active = decode_mask(&frame.data);
                let flags = PanelStatus::flags_for(&active, &self.config.monitored_outputs);
                debug!("Active outputs: {:?}", active);
                self.status.write().await.violated_outputs = active;
                let _ = self.event_tx.send(SatelEvent::OutputsUpdated(flags));
            }
            code => match AlarmState::from_command(code) {
                Some(tag) => {
                    let zones = decode_mask(&frame.data);
                    debug!("{}: {:?}", tag.description(), zones);
                    self.status
                        .write()
                        .await
                        .partition_states
                        .insert(tag, zones);
                    let _ = self.event_tx.send(SatelEvent::AlarmStatus);
                }
                None => debug!("Ignoring frame 0x{:02X}", code),
            },
        }
    }
}

impl AlarmController for SatelClient {
    async fn connect(&self) -> Result<()> {
        if self.is_closed() {
            return Err(SatelError::Closed);
        }
        let (frame_tx, frame_rx) = mpsc::channel(64);
        let transport = DirectTcpTransport::connect(&self.config, frame_tx).await?;

        *self.transport.lock().await = Some(transport);
        *self.frames.lock().await = Some(frame_rx);
        self.status.write().await.connected = true;

        info!("Connected to panel at {}:{}", self.config.host, self.config.port);
        let _ = self.event_tx.send(SatelEvent::Connected);
        Ok(())
    }

    async fn status(&self) -> PanelStatus {
        let mut status = self.status.read().await.clone();
        status.connected = self.connected().await;
        status
    }

    fn subscribe(&self) -> EventReceiver {
        self.event_tx.subscribe()
    }

    async fn arm(&self, code: &str, zones: &[u32], mode: u8) -> Result<()> {
        debug!("Sending arm command, mode: {}", mode);
        self.execute(Command::Arm {
            mode,
            code: code.to_string(),
            zones: zones.to_vec(),
        })
        .await
    }

    async fn disarm(&self, code: &str, zones: &[u32]) -> Result<()> {
        debug!("Sending disarm command");
        self.execute(Command::Disarm {
            code: code.to_string(),
            zones: zones.to_vec(),
        })
        .await
    }

    async fn clear_alarm(&self, code: &str, zones: &[u32]) -> Result<()> {
        debug!("Sending clear alarm command");
        self.execute(Command::ClearAlarm {
            code: code.to_string(),
            zones: zones.to_vec(),
        })
        .await
    }

    async fn set_output(&self, code: &str, output: u32, on: bool) -> Result<()> {
        debug!("Turning output {} {}", output, if on { "on" } else { "off" });
        self.execute(Command::SetOutputs {
            on,
            code: code.to_string(),
            outputs: vec![output],
        })
        .await
    }

    async fn keep_alive(&self) {
        if self.config.keep_alive_interval_ms == 0 {
            warn!("Keep-alive interval is zero, keep-alive disabled");
            return;
        }
        let mut shutdown = self.shutdown_tx.subscribe();
        let interval = Duration::from_millis(self.config.keep_alive_interval_ms);
        loop {
            tokio::select! {
                _ = sleep(interval) => {}
                _ = shutdown.changed() => {}
            }
            if self.is_closed() {
                break;
            }
            if let Some(engine) = self.engine().await
                && let Err(e) = engine.send_raw(&Command::KeepAlive).await
            {
                debug!("Keep-alive failed: {}", e);
            }
        }
        debug!("Closed, quit keep-alive");
    }

    async fn monitor_status(&self) {
        let mut shutdown = self.shutdown_tx.subscribe();

        while !self.is_closed() {
            if !self.connected().await {
                info!("Not connected, re-connecting...");
                self.mark_disconnected().await;
                if let Err(e) = self.connect().await {
                    warn!(
                        "Not connected ({}), sleeping for {}s...",
                        e,
                        self.config.reconnect_delay_ms / 1000
                    );
                    self.pause().await;
                    continue;
                }
            }

            match self.start_monitoring().await {
                Ok(()) => {}
                Err(SatelError::MonitoringRejected(code)) => {
                    warn!("Monitoring not accepted: {}", code);
                }
                Err(e) => {
                    warn!("Failed to start monitoring: {}", e);
                    self.mark_disconnected().await;
                    self.pause().await;
                    continue;
                }
            }

            let Some(mut frames) = self.frames.lock().await.take() else {
                self.mark_disconnected().await;
                continue;
            };

            loop {
                tokio::select! {
                    frame = frames.recv() => match frame {
                        Some(frame) => self.handle_frame(frame).await,
                        None => break,
                    },
                    _ = shutdown.changed() => break,
                }
            }

            if !self.is_closed() {
                warn!("Connection to panel lost");
                self.mark_disconnected().await;
            }
        }
        info!("Closed, quit monitoring");
    }

    async fn close(&self) {
        self.shutdown_tx.send_replace(true);
        if let Some(transport) = self.transport.lock().await.take() {
            let _ = transport.disconnect().await;
        }
        self.frames.lock().await.take();
        self.status.write().await.connected = false;
    }
}
