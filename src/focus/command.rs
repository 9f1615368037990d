//! Custom focus commands.
//!
//! A project can hand focusing over to an external program. When `pass_data`
//! is set the hook JSON is written to its stdin exactly as the hook sent it;
//! payloads without one (focus by directory) are written in normalized form.

use notifier_ipc::HookPayload;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use tracing::{info, warn};

use crate::focus::error::{ExitInfo, FocusError};
use crate::focus::process::{self, RunError};

/// Run `command`, returning an error unless it exits with status 0.
pub fn run_custom_command(
    command: &Path,
    pass_data: bool,
    payload: &HookPayload,
    timeout: Duration,
) -> Result<(), FocusError> {
    let input = if pass_data {
        let json = match &payload.raw {
            Some(raw) => serde_json::to_vec(raw),
            None => serde_json::to_vec(payload),
        }
            .map_err(|e| FocusError::CommandFailed(ExitInfo::Io(format!("encode payload: {e}"))))?;
        Some(json)
    } else {
        None
    };

    let mut cmd = Command::new(command);
    if !payload.cwd.is_empty() && Path::new(&payload.cwd).is_dir() {
        cmd.current_dir(&payload.cwd);
    }

    let finished = process::run(&mut cmd, input.as_deref(), false, timeout).map_err(|e| match e {
        RunError::NotFound { program } => FocusError::ExternalToolMissing { tool: program },
        RunError::TimedOut { .. } => FocusError::CommandFailed(ExitInfo::TimedOut),
        RunError::Io { source, .. } => FocusError::CommandFailed(ExitInfo::Io(source.to_string())),
    })?;

    match finished.status.code() {
        Some(0) => {
            info!(command = %command.display(), "Custom focus command succeeded");
            Ok(())
        }
        Some(code) => {
            warn!(command = %command.display(), code, "Custom focus command failed");
            Err(FocusError::CommandFailed(ExitInfo::Code(code)))
        }
        None => Err(FocusError::CommandFailed(ExitInfo::Signal)),
    }
}
