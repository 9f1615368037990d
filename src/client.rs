//! IPC client used by the CLI subcommands

use anyhow::{Context, Result};
use notifier_ipc::{FramedMessage, Request, Response, read_frame, socket_path, write_frame};
use std::path::Path;
use tokio::net::UnixStream;
use tracing::debug;

/// Connection to a running daemon
pub struct IpcClient {
    stream: UnixStream,
}

impl IpcClient {
    /// Connect to the daemon on the default socket.
    pub async fn connect() -> Result<Self> {
        Self::connect_to(&socket_path()).await
    }

    pub async fn connect_to(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow::anyhow!("IPC socket not found: {:?}", path));
        }

        let stream = UnixStream::connect(path)
            .await
            .context("Failed to connect to IPC socket")?;
        debug!("Connected to daemon at {:?}", path);

        Ok(Self { stream })
    }

    /// Send one request and wait for its response.
    pub async fn send(&mut self, request: &Request) -> Result<Response> {
        write_frame(&mut self.stream, request).await?;
        let frame = read_frame(&mut self.stream)
            .await?
            .context("Daemon closed the connection")?;
        FramedMessage::decode_response(&frame)
    }
}
