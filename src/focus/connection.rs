//! Display Connection Module
//!
//! Owns the single reusable handle to the display server. The handle is
//! opened lazily, probed before every use and replaced when the probe fails
//! or when a caller marks it suspect.
//!
//! `acquire` and `invalidate` take `&mut self`; the focus service keeps the
//! manager behind its mutex, so a caller can only reach them while holding
//! the lock.

use tracing::{debug, info, warn};

use crate::focus::error::{FocusError, ProtocolError};

/// An open handle to the display server.
pub trait DisplayHandle: Send {
    /// Cheap round trip proving the handle still works.
    fn probe(&self) -> Result<(), ProtocolError>;
}

/// Opens new display handles.
pub trait Connector: Send + Sync {
    type Handle: DisplayHandle;

    /// Open a fresh handle. Fails only when the display server is unreachable.
    fn connect(&self) -> Result<Self::Handle, FocusError>;
}

/// Lazily created, self-healing display handle.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    current: Option<C::Handle>,
    /// Number of handles opened so far
    generation: u64,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            current: None,
            generation: 0,
        }
    }

    /// Return the live handle, reconnecting if there is none or the probe fails.
    pub fn acquire(&mut self) -> Result<&mut C::Handle, FocusError> {
        let healthy = match &self.current {
            Some(handle) => match handle.probe() {
                Ok(()) => true,
                Err(e) => {
                    warn!(generation = self.generation, error = %e, "Display handle failed probe, reconnecting");
                    false
                }
            },
            None => false,
        };

        if !healthy {
            // Old handle goes away before the new one is opened.
            self.drop_current();
            let handle = self.connector.connect()?;
            self.generation += 1;
            info!(generation = self.generation, "Opened display connection");
            self.current = Some(handle);
        }

        self.current
            .as_mut()
            .ok_or_else(|| FocusError::Connection("no display handle".into()))
    }

    /// Mark the current handle suspect; the next `acquire` opens a new one.
    pub fn invalidate(&mut self) {
        if self.is_open() {
            debug!(generation = self.generation, "Display handle invalidated");
        }
        self.drop_current();
    }

    /// Number of handles opened over the manager's lifetime.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a handle is currently held.
    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    /// Best-effort close; a panic while tearing down a broken handle is swallowed.
    fn drop_current(&mut self) {
        if let Some(handle) = self.current.take() {
            let closed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || drop(handle)));
            if closed.is_err() {
                warn!("Closing stale display handle panicked, ignoring");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::focus::activate::{ActivationStep, WindowActivator, WindowId};

    /// State shared by a fake connector and every handle it opens.
    #[derive(Default)]
    pub(crate) struct FakeDisplayState {
        pub next_id: AtomicU64,
        pub live: AtomicUsize,
        pub max_live: AtomicUsize,
        pub unreachable: AtomicBool,
        /// Broken flag of the most recently opened handle
        pub last_broken: Mutex<Option<Arc<AtomicBool>>>,
        /// Protocol operations currently executing
        pub in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
        pub steps: Mutex<Vec<(u64, ActivationStep, WindowId)>>,
        pub fail_at: Mutex<Option<ActivationStep>>,
        pub step_delay: Mutex<Duration>,
    }

    /// Fake handle that counts how many instances are alive.
    pub(crate) struct FakeHandle {
        pub id: u64,
        broken: Arc<AtomicBool>,
        state: Arc<FakeDisplayState>,
    }

    impl FakeHandle {
        fn step(&mut self, step: ActivationStep, window: WindowId) -> Result<(), ProtocolError> {
            let state = &self.state;
            let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            state.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let delay = *state.step_delay.lock().unwrap();
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            let result = if *state.fail_at.lock().unwrap() == Some(step) {
                Err(ProtocolError::Other(format!("{step} rejected")))
            } else {
                state.steps.lock().unwrap().push((self.id, step, window));
                Ok(())
            };

            state.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    impl DisplayHandle for FakeHandle {
        fn probe(&self) -> Result<(), ProtocolError> {
            if self.broken.load(Ordering::SeqCst) {
                Err(ProtocolError::Other("probe failed".into()))
            } else {
                Ok(())
            }
        }
    }

    impl WindowActivator for FakeHandle {
        fn deminimize(&mut self, window: WindowId) -> Result<(), ProtocolError> {
            self.step(ActivationStep::Deminimize, window)
        }
        fn request_activation(&mut self, window: WindowId) -> Result<(), ProtocolError> {
            self.step(ActivationStep::RequestActivation, window)
        }
        fn force_active_property(&mut self, window: WindowId) -> Result<(), ProtocolError> {
            self.step(ActivationStep::ForceActiveProperty, window)
        }
        fn map(&mut self, window: WindowId) -> Result<(), ProtocolError> {
            self.step(ActivationStep::Map, window)
        }
        fn raise(&mut self, window: WindowId) -> Result<(), ProtocolError> {
            self.step(ActivationStep::Raise, window)
        }
    }

    impl Drop for FakeHandle {
        fn drop(&mut self) {
            self.state.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[derive(Default, Clone)]
    pub(crate) struct FakeConnector {
        pub state: Arc<FakeDisplayState>,
    }

    impl FakeConnector {
        pub(crate) fn break_current(&self) {
            if let Some(flag) = self.state.last_broken.lock().unwrap().as_ref() {
                flag.store(true, Ordering::SeqCst);
            }
        }

        pub(crate) fn live(&self) -> usize {
            self.state.live.load(Ordering::SeqCst)
        }

        pub(crate) fn max_live(&self) -> usize {
            self.state.max_live.load(Ordering::SeqCst)
        }

        pub(crate) fn set_unreachable(&self, unreachable: bool) {
            self.state.unreachable.store(unreachable, Ordering::SeqCst);
        }
    }

    impl Connector for FakeConnector {
        type Handle = FakeHandle;

        fn connect(&self) -> Result<FakeHandle, FocusError> {
            if self.state.unreachable.load(Ordering::SeqCst) {
                return Err(FocusError::Connection("no display".into()));
            }
            let live = self.state.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.state.max_live.fetch_max(live, Ordering::SeqCst);
            let broken = Arc::new(AtomicBool::new(false));
            *self.state.last_broken.lock().unwrap() = Some(broken.clone());
            Ok(FakeHandle {
                id: self.state.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                broken,
                state: self.state.clone(),
            })
        }
    }

    #[test]
    fn acquire_is_lazy_and_reuses_handle() {
        let connector = FakeConnector::default();
        let mut manager = ConnectionManager::new(connector.clone());
        assert!(!manager.is_open());
        assert_eq!(connector.live(), 0);

        let first = manager.acquire().unwrap().id;
        let second = manager.acquire().unwrap().id;
        assert_eq!(first, second);
        assert_eq!(manager.generation(), 1);
    }

    #[test]
    fn failed_probe_yields_new_handle_with_single_live() {
        let connector = FakeConnector::default();
        let mut manager = ConnectionManager::new(connector.clone());

        let first = manager.acquire().unwrap().id;
        connector.break_current();
        let second = manager.acquire().unwrap().id;

        assert_ne!(first, second);
        assert_eq!(connector.live(), 1);
        assert_eq!(connector.max_live(), 1);
        assert_eq!(manager.generation(), 2);
    }

    #[test]
    fn invalidate_forces_reconnect() {
        let connector = FakeConnector::default();
        let mut manager = ConnectionManager::new(connector.clone());

        let first = manager.acquire().unwrap().id;
        manager.invalidate();
        assert_eq!(connector.live(), 0);

        let second = manager.acquire().unwrap().id;
        assert_ne!(first, second);
        assert_eq!(connector.live(), 1);
    }

    #[test]
    fn unreachable_display_is_connection_error_and_recovers() {
        let connector = FakeConnector::default();
        connector.set_unreachable(true);
        let mut manager = ConnectionManager::new(connector.clone());

        assert!(matches!(manager.acquire(), Err(FocusError::Connection(_))));
        assert!(!manager.is_open());

        connector.set_unreachable(false);
        assert!(manager.acquire().is_ok());
    }
}
