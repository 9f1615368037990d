//! Hook Notifier IPC Protocol
//!
//! Shared message types for communication between the `hook-notifier` daemon
//! and the short-lived client invocations run from hook scripts.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Socket path for IPC communication
pub fn socket_path() -> std::path::PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .unwrap_or_else(|_| format!("/run/user/{}", unsafe { libc::getuid() }));
    std::path::PathBuf::from(runtime_dir).join("hook-notifier.sock")
}

/// Upper bound for a single frame; anything larger is treated as a broken peer
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

// ============================================================================
// Hook payload
// ============================================================================

/// Event data produced by a hook script.
///
/// Unknown fields are kept in `extra` so that the payload can be handed to a
/// custom focus command unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookPayload {
    #[serde(default)]
    pub cwd: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notification_type: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// Hook JSON exactly as received, handed to custom focus commands
    #[serde(skip)]
    pub raw: Option<Value>,
}

impl HookPayload {
    /// Parse a hook event, keeping the original JSON alongside.
    pub fn from_raw(raw: Value) -> Result<Self, serde_json::Error> {
        let mut payload: Self = serde_json::from_value(raw.clone())?;
        payload.raw = Some(raw);
        Ok(payload)
    }

    /// Project name shown on cards and used for window matching.
    ///
    /// Falls back to the last component of `cwd`.
    pub fn project_name(&self) -> String {
        if let Some(name) = self.project_name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        match self.cwd.trim_end_matches('/').rsplit('/').next() {
            Some(last) if !last.is_empty() => last.to_string(),
            _ => "Claude Code".to_string(),
        }
    }

    /// Fill in `project_name`, `timestamp` and a default message.
    pub fn normalize(&mut self, timestamp: String) {
        if self.message.is_empty() {
            self.message = "Task completed".to_string();
        }
        if self.project_name.is_none() {
            self.project_name = Some(self.project_name());
        }
        if self.timestamp.is_none() {
            self.timestamp = Some(timestamp);
        }
    }
}

// ============================================================================
// Client → Daemon Requests
// ============================================================================

/// Requests sent from a client to the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Show a notification card for a hook event, sent as the hook's raw JSON
    Notify { payload: Value },

    /// Focus the window that belongs to a card (a card click)
    Focus { card_id: u64 },

    /// Focus the window configured for a project directory
    FocusProject { cwd: String },

    /// Activate a specific window from the shortcut bar
    FocusWindow { window_id: u32 },

    /// Rescan open editor windows for the shortcut bar
    ListWindows,

    /// Remove a single card
    Dismiss { card_id: u64 },

    /// Remove all cards
    ClearAll,

    /// Re-read the focus mapping file
    Reload,

    /// Report the cards currently on screen
    Status,
}

// ============================================================================
// Daemon → Client Responses
// ============================================================================

/// Open editor window listed on the shortcut bar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowEntry {
    pub editor: String,
    pub window_id: u32,
    pub title: String,
}

/// Card summary for `Status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSummary {
    pub id: u64,
    pub title: String,
    pub project: String,
    pub critical: bool,
    /// Multi-line card text: project, session, time, directory, message
    #[serde(default)]
    pub body: String,
}

/// Responses sent from the daemon back to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Ack {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        card_id: Option<u64>,
    },
    FocusStatus { ok: bool, message: String },
    Windows { entries: Vec<WindowEntry> },
    Cards {
        cards: Vec<CardSummary>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
        /// Editor windows on the shortcut bar
        #[serde(default)]
        shortcuts: Vec<WindowEntry>,
    },
    Error { message: String },
}

// ============================================================================
// Message Framing
// ============================================================================

/// A framed message with length prefix for reliable socket reads
#[derive(Debug)]
pub struct FramedMessage {
    pub data: Vec<u8>,
}

impl FramedMessage {
    /// Create a new framed message from serializable data
    pub fn new<T: Serialize>(msg: &T) -> anyhow::Result<Self> {
        let data = serde_json::to_vec(msg)?;
        Ok(Self { data })
    }

    /// Encode message with length prefix (4 bytes, big-endian)
    pub fn encode(&self) -> Vec<u8> {
        let len = self.data.len() as u32;
        let mut buf = Vec::with_capacity(4 + self.data.len());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(&self.data);
        buf
    }

    /// Decode a request from bytes
    pub fn decode_request(data: &[u8]) -> anyhow::Result<Request> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Decode a response from bytes
    pub fn decode_response(data: &[u8]) -> anyhow::Result<Response> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Read one length-prefixed frame.
///
/// Returns `Ok(None)` when the peer closed the stream before a new frame.
pub async fn read_frame<R>(reader: &mut R) -> anyhow::Result<Option<Vec<u8>>>
where
    R: tokio::io::AsyncRead + Unpin,
{
    use tokio::io::AsyncReadExt;

    let mut len_buf = [0u8; 4];
    if reader.read_exact(&mut len_buf).await.is_err() {
        return Ok(None);
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        anyhow::bail!("message too large: {len} bytes");
    }

    let mut msg_buf = vec![0u8; len];
    reader.read_exact(&mut msg_buf).await?;
    Ok(Some(msg_buf))
}

/// Write one length-prefixed frame and flush it.
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> anyhow::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
    T: Serialize,
{
    use tokio::io::AsyncWriteExt;

    let frame = FramedMessage::new(msg)?.encode();
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
