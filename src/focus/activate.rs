//! Window activation sequence.
//!
//! Some applications (Electron-based editors in particular) ignore a plain
//! `_NET_ACTIVE_WINDOW` request. The sequence below de-minimizes, asks the
//! window manager politely, then overrides the root property and restacks the
//! window directly. Every step runs unconditionally in order; the first error
//! stops the sequence.

use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::focus::error::{FocusError, ProtocolError};

/// X11 window identifier.
pub type WindowId = u32;

/// One step of the activation sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationStep {
    /// `WM_CHANGE_STATE` → NormalState on the root window
    Deminimize,
    /// `_NET_ACTIVE_WINDOW` client message on the root window
    RequestActivation,
    /// Overwrite the root `_NET_ACTIVE_WINDOW` property
    ForceActiveProperty,
    /// `MapWindow`
    Map,
    /// `ConfigureWindow` with `StackMode::ABOVE`
    Raise,
}

impl ActivationStep {
    pub const SEQUENCE: [Self; 5] = [
        Self::Deminimize,
        Self::RequestActivation,
        Self::ForceActiveProperty,
        Self::Map,
        Self::Raise,
    ];
}

impl fmt::Display for ActivationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Deminimize => "de-minimize",
            Self::RequestActivation => "request activation",
            Self::ForceActiveProperty => "force active window",
            Self::Map => "map",
            Self::Raise => "raise",
        };
        f.write_str(name)
    }
}

/// Low-level operations the activation sequence is made of.
pub trait WindowActivator {
    fn deminimize(&mut self, window: WindowId) -> Result<(), ProtocolError>;
    fn request_activation(&mut self, window: WindowId) -> Result<(), ProtocolError>;
    fn force_active_property(&mut self, window: WindowId) -> Result<(), ProtocolError>;
    fn map(&mut self, window: WindowId) -> Result<(), ProtocolError>;
    fn raise(&mut self, window: WindowId) -> Result<(), ProtocolError>;
}

/// Run the full sequence against `window`, sleeping `settle` between steps.
pub fn activate<A: WindowActivator + ?Sized>(
    activator: &mut A,
    window: WindowId,
    settle: Duration,
) -> Result<(), FocusError> {
    for (i, step) in ActivationStep::SEQUENCE.into_iter().enumerate() {
        if i > 0 && !settle.is_zero() {
            std::thread::sleep(settle);
        }

        let result = match step {
            ActivationStep::Deminimize => activator.deminimize(window),
            ActivationStep::RequestActivation => activator.request_activation(window),
            ActivationStep::ForceActiveProperty => activator.force_active_property(window),
            ActivationStep::Map => activator.map(window),
            ActivationStep::Raise => activator.raise(window),
        };

        if let Err(source) = result {
            warn!(window, %step, error = %source, "Activation step failed");
            return Err(FocusError::Activation { step, source });
        }
        debug!(window, %step, "Activation step sent");
    }
    Ok(())
}
