//! X11 backend for the focus subsystem.
//!
//! One `RustConnection` per handle, with the handful of atoms the activation
//! sequence needs interned up front.

use tracing::debug;
use x11rb::CURRENT_TIME;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    Atom, AtomEnum, ClientMessageEvent, ConfigureWindowAux, ConnectionExt, EventMask, PropMode,
    StackMode, Window,
};
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use crate::focus::activate::{WindowActivator, WindowId};
use crate::focus::connection::{Connector, DisplayHandle};
use crate::focus::error::{FocusError, ProtocolError};

/// ICCCM `WM_STATE` value for a normal (non-iconic) window
const NORMAL_STATE: u32 = 1;

/// `_NET_ACTIVE_WINDOW` source indication: pager / direct user action
const SOURCE_PAGER: u32 = 2;

/// Atoms used by the activation sequence
#[derive(Debug, Clone, Copy)]
struct Atoms {
    net_active_window: Atom,
    wm_change_state: Atom,
}

impl Atoms {
    fn new(conn: &RustConnection) -> Result<Self, ProtocolError> {
        let intern = |name: &str| -> Result<Atom, ProtocolError> {
            Ok(conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
        };

        Ok(Self {
            net_active_window: intern("_NET_ACTIVE_WINDOW")?,
            wm_change_state: intern("WM_CHANGE_STATE")?,
        })
    }
}

/// Opens connections to the display named by `$DISPLAY`.
#[derive(Debug, Default, Clone)]
pub struct X11Connector {
    /// Explicit display name; `None` uses `$DISPLAY`
    pub display: Option<String>,
}

impl Connector for X11Connector {
    type Handle = X11Display;

    fn connect(&self) -> Result<X11Display, FocusError> {
        let (conn, screen_num) = x11rb::connect(self.display.as_deref())
            .map_err(|e| FocusError::Connection(format!("connect failed: {e}")))?;

        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .ok_or_else(|| FocusError::Connection(format!("screen {screen_num} missing")))?;

        let atoms = Atoms::new(&conn)
            .map_err(|e| FocusError::Connection(format!("intern_atom: {e}")))?;

        debug!(screen_num, root, "Connected to X server");
        Ok(X11Display { conn, root, atoms })
    }
}

/// Open X11 connection plus the root window of its default screen.
pub struct X11Display {
    conn: RustConnection,
    root: Window,
    atoms: Atoms,
}

/// Reject the null window id before it reaches the server.
fn target(window: WindowId) -> Result<Window, ProtocolError> {
    if window == x11rb::NONE {
        return Err(ProtocolError::Other("null window id".into()));
    }
    Ok(window)
}

impl X11Display {
    /// Send a 32-bit client message to the root window the way pagers do.
    fn send_root_message(&self, window: Window, kind: Atom, data: [u32; 5]) -> Result<(), ProtocolError> {
        let event = ClientMessageEvent::new(32, target(window)?, kind, data);
        self.conn
            .send_event(
                false,
                self.root,
                EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY,
                &event,
            )?
            .check()?;
        Ok(())
    }
}

impl DisplayHandle for X11Display {
    fn probe(&self) -> Result<(), ProtocolError> {
        self.conn.get_input_focus()?.reply()?;
        Ok(())
    }
}

impl WindowActivator for X11Display {
    fn deminimize(&mut self, window: WindowId) -> Result<(), ProtocolError> {
        self.send_root_message(window, self.atoms.wm_change_state, [NORMAL_STATE, 0, 0, 0, 0])
    }

    fn request_activation(&mut self, window: WindowId) -> Result<(), ProtocolError> {
        self.send_root_message(
            window,
            self.atoms.net_active_window,
            [SOURCE_PAGER, CURRENT_TIME, 0, 0, 0],
        )
    }

    fn force_active_property(&mut self, window: WindowId) -> Result<(), ProtocolError> {
        self.conn
            .change_property32(
                PropMode::REPLACE,
                self.root,
                self.atoms.net_active_window,
                AtomEnum::WINDOW,
                &[target(window)?],
            )?
            .check()?;
        Ok(())
    }

    fn map(&mut self, window: WindowId) -> Result<(), ProtocolError> {
        self.conn.map_window(target(window)?)?.check()?;
        Ok(())
    }

    fn raise(&mut self, window: WindowId) -> Result<(), ProtocolError> {
        self.conn
            .configure_window(target(window)?, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE))?
            .check()?;
        self.conn.flush()?;
        Ok(())
    }
}
