// MIT License - Copyright (c) 2026 Peter Wright
// Command/result engine

use std::time::Instant;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, warn};

use crate::error::{ResultCode, Result, SatelError};
use crate::protocol::Command;

type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// Sends commands and routes the panel's `0xEF` answers back to the caller.
///
/// The protocol carries no sequence IDs, so only one result-bearing command
/// is in flight at a time.
pub struct CommandEngine {
    /// Write half of the connection
    writer: Mutex<Writer>,
    /// Sender for the result of the command in flight
    pending: Mutex<Option<oneshot::Sender<ResultCode>>>,
    /// Serializes result-bearing commands
    in_flight: Mutex<()>,
    /// Whether the connection is usable
    connected: RwLock<bool>,
    /// Bad checksum counter
    bad_checksum_count: Mutex<u32>,
    /// Time of last checksum error (for the reset window)
    last_checksum_error: Mutex<Option<Instant>>,
    command_timeout: Duration,
}

const BAD_CHECKSUM_LIMIT: u32 = 10;
const CHECKSUM_RESET_WINDOW: Duration = Duration::from_secs(60);

impl CommandEngine {
    pub fn new<W>(writer: W, command_timeout: Duration) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            writer: Mutex::new(Box::new(writer)),
            pending: Mutex::new(None),
            in_flight: Mutex::new(()),
            connected: RwLock::new(true),
            bad_checksum_count: Mutex::new(0),
            last_checksum_error: Mutex::new(None),
            command_timeout,
        }
    }

    pub async fn set_connected(&self, connected: bool) {
        *self.connected.write().await = connected;
    }

    pub async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }

    /// Send a command and wait for the panel's result code.
    pub async fn send_command(&self, command: &Command) -> Result<ResultCode> {
        if !self.is_connected().await {
            return Err(SatelError::Disconnected);
        }
        let frame = command.encode()?;
        let code = command.code();

        let _guard = self.in_flight.lock().await;
        let (tx, rx) = oneshot::channel();
        *self.pending.lock().await = Some(tx);

        debug!("Sending command 0x{:02X}", code);
        if let Err(e) = self.write(code, &frame).await {
            self.pending.lock().await.take();
            return Err(e);
        }

        match timeout(self.command_timeout, rx).await {
            Ok(Ok(result)) => {
                debug!("Result for command 0x{:02X}: {}", code, result);
                Ok(result)
            }
            Ok(Err(_)) => {
                self.pending.lock().await.take();
                Err(SatelError::ChannelClosed)
            }
            Err(_) => {
                self.pending.lock().await.take();
                debug!("Command timeout: 0x{:02X}", code);
                Err(SatelError::CommandTimeout { command: code })
            }
        }
    }

    /// Send a command without waiting for any answer (e.g. keep-alive).
    pub async fn send_raw(&self, command: &Command) -> Result<()> {
        if !self.is_connected().await {
            return Err(SatelError::Disconnected);
        }
        let frame = command.encode()?;
        self.write(command.code(), &frame).await
    }

    /// Write a frame, giving up after the command timeout on a stalled socket.
    async fn write(&self, code: u8, frame: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let written = timeout(self.command_timeout, async {
            writer.write_all(frame).await?;
            writer.flush().await
        })
        .await;
        match written {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!("Failed to write command: {}", e);
                Err(SatelError::Io(e))
            }
            Err(_) => {
                warn!("Write of command 0x{:02X} stalled", code);
                Err(SatelError::CommandTimeout { command: code })
            }
        }
    }

    /// Route a result frame to the command in flight.
    pub async fn complete_result(&self, result: ResultCode) {
        match self.pending.lock().await.take() {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => debug!("Result {} with no command in flight", result),
        }
    }

    /// Handle a frame with a bad checksum. Returns true if the limit has been exceeded.
    pub async fn handle_bad_checksum(&self) -> bool {
        let mut count = self.bad_checksum_count.lock().await;

        let mut last_error = self.last_checksum_error.lock().await;
        if let Some(last) = *last_error
            && last.elapsed() > CHECKSUM_RESET_WINDOW
        {
            *count = 0;
        }

        *count += 1;
        *last_error = Some(Instant::now());

        if *count > BAD_CHECKSUM_LIMIT {
            error!("Too many bad checksums ({})", *count);
            true
        } else {
            warn!("Bad checksum (count: {})", *count);
            false
        }
    }

    /// Mark as disconnected and shut the write half down.
    pub async fn disconnect(&self) -> Result<()> {
        self.set_connected(false).await;
        if let Some(tx) = self.pending.lock().await.take() {
            drop(tx);
        }
        let mut writer = self.writer.lock().await;
        let _ = timeout(self.command_timeout, writer.shutdown()).await;
        Ok(())
    }
}
