//! IPC server for hook events and control commands

use anyhow::Result;
use notifier_ipc::{FramedMessage, Response, read_frame, socket_path, write_frame};
use std::path::{Path, PathBuf};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

use crate::ui::UiHandle;

/// Accepts clients on the notifier socket and forwards requests to the UI loop
pub struct IpcServer {
    listener: UnixListener,
    path: PathBuf,
}

impl IpcServer {
    /// Bind the default socket, replacing a stale one.
    pub fn bind() -> Result<Self> {
        Self::bind_at(&socket_path())
    }

    pub fn bind_at(path: &Path) -> Result<Self> {
        // Remove existing socket if present
        if path.exists() {
            std::fs::remove_file(path)?;
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(path)?;
        info!("IPC server listening on {:?}", path);

        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    /// Accept clients until the task is dropped.
    pub async fn run(self, ui: UiHandle) {
        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    debug!("Client connected");
                    tokio::spawn(handle_client(stream, ui.clone()));
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!("Failed to remove socket {:?}: {}", self.path, e);
        }
    }
}

/// Serve one client: a sequence of request frames, each answered in order.
async fn handle_client(stream: UnixStream, ui: UiHandle) {
    let (mut reader, mut writer) = stream.into_split();

    loop {
        let frame = match read_frame(&mut reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read request: {}", e);
                break;
            }
        };

        let response = match FramedMessage::decode_request(&frame) {
            Ok(request) => match ui.request(request).await {
                Ok(response) => response,
                Err(e) => Response::Error { message: e.to_string() },
            },
            Err(e) => {
                warn!("Failed to decode request: {}", e);
                Response::Error {
                    message: format!("invalid request: {e}"),
                }
            }
        };

        if let Err(e) = write_frame(&mut writer, &response).await {
            warn!("Failed to send response: {}", e);
            break;
        }
    }

    debug!("Client disconnected");
}
