//! Error taxonomy for the focus subsystem.

use std::fmt;
use thiserror::Error;

use crate::focus::activate::ActivationStep;

/// Failure of a single display-protocol request.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Connection(#[from] x11rb::errors::ConnectionError),
    #[error(transparent)]
    Reply(#[from] x11rb::errors::ReplyError),
    #[error(transparent)]
    ReplyOrId(#[from] x11rb::errors::ReplyOrIdError),
    #[error("{0}")]
    Other(String),
}

/// How a custom focus command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitInfo {
    /// Exited with a non-zero status code
    Code(i32),
    /// Killed by a signal (no exit code)
    Signal,
    /// Still running after the deadline and killed
    TimedOut,
    /// Could not be started or talked to
    Io(String),
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "exit code {code}"),
            Self::Signal => write!(f, "terminated by signal"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Io(e) => write!(f, "{e}"),
        }
    }
}

/// Everything that can go wrong while focusing a window.
#[derive(Debug, Error)]
pub enum FocusError {
    /// Display server unreachable or handle unusable
    #[error("display connection unavailable: {0}")]
    Connection(String),

    /// Window search or title lookup failed or timed out
    #[error("window enumeration failed: {0}")]
    Enumeration(String),

    /// One of the activation steps failed; later steps were not sent
    #[error("activation failed at {step}: {source}")]
    Activation {
        step: ActivationStep,
        #[source]
        source: ProtocolError,
    },

    /// A required helper executable is not installed
    #[error("{tool} is not installed")]
    ExternalToolMissing { tool: String },

    /// Custom focus command did not succeed
    #[error("custom command failed: {0}")]
    CommandFailed(ExitInfo),
}
