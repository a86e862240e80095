// MIT License - Copyright (c) 2026 Peter Wright
// Direct TCP link to the ETHM module

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::constants::cmd;
use crate::error::{ResultCode, Result, SatelError};
use crate::protocol::{Frame, FrameDecoder};
use crate::transport::command::CommandEngine;

/// Direct TCP transport: connects to the integration port of the ETHM module.
///
/// Result frames (`0xEF`) are routed to the [`CommandEngine`]; every other
/// frame is forwarded on `frame_tx`. The sender is dropped when the
/// connection ends, which closes the receiving side.
pub struct DirectTcpTransport {
    pub command_engine: Arc<CommandEngine>,
    reader_handle: Option<tokio::task::JoinHandle<()>>,
}

impl DirectTcpTransport {
    pub async fn connect(config: &ClientConfig, frame_tx: mpsc::Sender<Frame>) -> Result<Self> {
        info!("Connecting to panel at {}:{}", config.host, config.port);

        let connect = TcpStream::connect((config.host.as_str(), config.port));
        let stream = timeout(Duration::from_millis(config.connect_timeout_ms), connect)
            .await
            .map_err(|_| SatelError::ConnectionTimeout)?
            .map_err(|e| {
                error!("TCP connect failed: {}", e);
                SatelError::Io(e)
            })?;
        let _ = stream.set_nodelay(true);

        debug!("TCP socket connected");
        Ok(Self::from_stream(
            stream,
            Duration::from_millis(config.command_timeout_ms),
            frame_tx,
        ))
    }

    /// Build a transport over an already connected stream.
    pub fn from_stream<S>(stream: S, command_timeout: Duration, frame_tx: mpsc::Sender<Frame>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let command_engine = Arc::new(CommandEngine::new(writer, command_timeout));
        let reader_handle = spawn_reader_task(reader, command_engine.clone(), frame_tx);
        Self {
            command_engine,
            reader_handle: Some(reader_handle),
        }
    }

    pub async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting from panel");
        self.command_engine.disconnect().await
    }

    pub async fn is_connected(&self) -> bool {
        self.command_engine.is_connected().await
    }

    pub fn engine(&self) -> &Arc<CommandEngine> {
        &self.command_engine
    }
}

impl Drop for DirectTcpTransport {
    fn drop(&mut self) {
        if let Some(handle) = self.reader_handle.take() {
            handle.abort();
        }
    }
}

/// Spawn the reader task that decodes frames from the panel.
fn spawn_reader_task<R>(
    mut reader: R,
    engine: Arc<CommandEngine>,
    frame_tx: mpsc::Sender<Frame>,
) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; 1024];
        let mut decoder = FrameDecoder::new();

        loop {
            match reader.read(&mut buf).await {
                Ok(0) => {
                    debug!("Reader: connection closed");
                    break;
                }
                Ok(n) => {
                    for decoded in decoder.push(&buf[..n]) {
                        if !process_frame(decoded, &engine, &frame_tx).await {
                            engine.set_connected(false).await;
                            return;
                        }
                    }
                }
                Err(e) => {
                    error!("Reader: read error: {}", e);
                    break;
                }
            }
        }
        engine.set_connected(false).await;
    })
}

/// Handle one decoded frame. Returns false when the connection should be dropped.
async fn process_frame(
    decoded: Result<Frame>,
    engine: &CommandEngine,
    frame_tx: &mpsc::Sender<Frame>,
) -> bool {
    let frame = match decoded {
        Ok(frame) => frame,
        Err(SatelError::ChecksumMismatch) => return !engine.handle_bad_checksum().await,
        Err(e) => {
            warn!("Dropping frame: {}", e);
            return true;
        }
    };

    if frame.command == cmd::RESULT {
        match frame.data.first() {
            Some(b) => engine.complete_result(ResultCode::from_byte(*b)).await,
            None => warn!("Empty result frame"),
        }
        return true;
    }

    if frame_tx.send(frame).await.is_err() {
        debug!("Frame receiver gone, stopping reader");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::protocol::{encode_frame, Command};

    #[tokio::test]
    async fn test_reader_routes_result_and_notifications() {
        let (ours, mut panel) = tokio::io::duplex(1024);
        let (frame_tx, mut frame_rx) = mpsc::channel(8);
        let transport = DirectTcpTransport::from_stream(ours, Duration::from_secs(1), frame_tx);
        let engine = transport.engine().clone();

        let command = tokio::spawn(async move {
            engine
                .send_command(&Command::StartMonitoring {
                    commands: vec![0x00],
                })
                .await
        });

        let mut sent = [0u8; 64];
        let n = panel.read(&mut sent).await.unwrap();
        assert_eq!(sent[2], 0x7F);
        assert!(n > 0);

        // A notification followed by the result in a single read
        let mut reply = encode_frame(0x0A, &[0x01, 0, 0, 0]);
        reply.extend(encode_frame(0xEF, &[0xFF]));
        panel.write_all(&reply).await.unwrap();

        assert_eq!(command.await.unwrap().unwrap(), ResultCode::Accepted);
        let frame = frame_rx.recv().await.unwrap();
        assert_eq!(frame.command, 0x0A);
        assert_eq!(frame.data, vec![0x01, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_eof_closes_frame_channel() {
        let (ours, panel) = tokio::io::duplex(64);
        let (frame_tx, mut frame_rx) = mpsc::channel(8);
        let transport = DirectTcpTransport::from_stream(ours, Duration::from_secs(1), frame_tx);
        drop(panel);

        assert!(frame_rx.recv().await.is_none());
        tokio::task::yield_now().await;
        assert!(!transport.is_connected().await);
    }

    #[tokio::test]
    async fn test_too_many_bad_checksums_disconnects() {
        let (ours, mut panel) = tokio::io::duplex(4096);
        let (frame_tx, mut frame_rx) = mpsc::channel(8);
        let transport = DirectTcpTransport::from_stream(ours, Duration::from_secs(1), frame_tx);

        let mut bad = encode_frame(0x00, &[0x01, 0, 0, 0]);
        bad[3] = 0x03;
        for _ in 0..11 {
            panel.write_all(&bad).await.unwrap();
        }

        assert!(frame_rx.recv().await.is_none());
        assert!(!transport.is_connected().await);
    }
}
