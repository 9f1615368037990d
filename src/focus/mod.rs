//! Focus Module
//!
//! Brings the editor window of a notification's project to the front.
//!
//! Flow per request: resolve the project's [`mapping::ProjectFocusConfig`], then either
//! run its custom command or enumerate windows, pick one and drive the
//! activation sequence. Everything that touches the display runs under one
//! mutex together with the shared connection, because the protocol client
//! cannot be used from several threads at once.
//!
//! All calls block and must run on a worker thread, never on the UI loop.

pub mod activate;
pub mod command;
pub mod connection;
pub mod enumerate;
pub mod error;
pub mod error_log;
pub mod mapping;
pub mod matcher;
pub mod process;
pub mod x11;

use notifier_ipc::{HookPayload, WindowEntry};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use activate::{WindowActivator, WindowId};
use connection::{ConnectionManager, Connector};
use enumerate::{WindowQuery, WindowSearch};
use error::{ExitInfo, FocusError};
use error_log::ErrorLog;
use mapping::{ConfigError, FocusMapping, FocusTarget, WindowSpec};

/// Result of one focus request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusOutcome {
    /// Window activated
    Success(WindowId),
    /// Custom command ran and exited 0
    CommandCompleted,
    NoMatchFound,
    ConnectionUnavailable,
    ExternalToolMissing { tool: String },
    ActivationFailed(String),
    CommandFailed(ExitInfo),
}

impl FocusOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_) | Self::CommandCompleted)
    }

    /// Short machine-readable name for the error log
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::CommandCompleted => "command_completed",
            Self::NoMatchFound => "no_match",
            Self::ConnectionUnavailable => "connection_unavailable",
            Self::ExternalToolMissing { .. } => "tool_missing",
            Self::ActivationFailed(_) => "activation_failed",
            Self::CommandFailed(_) => "command_failed",
        }
    }
}

impl From<&FocusError> for FocusOutcome {
    fn from(e: &FocusError) -> Self {
        match e {
            FocusError::Connection(_) => Self::ConnectionUnavailable,
            FocusError::Enumeration(_) => Self::NoMatchFound,
            FocusError::Activation { .. } => Self::ActivationFailed(e.to_string()),
            FocusError::ExternalToolMissing { tool } => Self::ExternalToolMissing { tool: tool.clone() },
            FocusError::CommandFailed(info) => Self::CommandFailed(info.clone()),
        }
    }
}

/// Outcome plus the line shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusReport {
    pub outcome: FocusOutcome,
    pub message: String,
}

/// Tunables for the focus service
#[derive(Debug, Clone)]
pub struct FocusOptions {
    /// Pause between activation steps
    pub settle: Duration,
    /// Deadline for custom focus commands
    pub command_timeout: Duration,
}

impl Default for FocusOptions {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(50),
            command_timeout: Duration::from_secs(10),
        }
    }
}

/// Focus orchestrator shared by all worker threads.
pub struct FocusService<C: Connector, S: WindowSearch> {
    display: Mutex<ConnectionManager<C>>,
    search: S,
    mapping: RwLock<Arc<FocusMapping>>,
    mapping_path: Option<PathBuf>,
    options: FocusOptions,
    error_log: ErrorLog,
    /// Install hint for a missing helper is shown once
    tool_hint_shown: AtomicBool,
}

impl<C, S> FocusService<C, S>
where
    C: Connector,
    C::Handle: WindowActivator,
    S: WindowSearch,
{
    pub fn new(connector: C, search: S, mapping: FocusMapping, options: FocusOptions, error_log: ErrorLog) -> Self {
        Self {
            display: Mutex::new(ConnectionManager::new(connector)),
            search,
            mapping: RwLock::new(Arc::new(mapping)),
            mapping_path: None,
            options,
            error_log,
            tool_hint_shown: AtomicBool::new(false),
        }
    }

    /// Remember where the mapping came from so it can be reloaded.
    pub fn with_mapping_path(mut self, path: PathBuf) -> Self {
        self.mapping_path = Some(path);
        self
    }

    /// Snapshot of the current mapping; a reload does not affect a running request.
    pub fn mapping(&self) -> Arc<FocusMapping> {
        self.mapping
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-read the mapping file. The old mapping stays on failure.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let Some(path) = &self.mapping_path else {
            return Ok(());
        };
        let mapping = FocusMapping::load(path)?;
        *self.mapping.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(mapping);
        info!("Focus mapping reloaded");
        Ok(())
    }

    /// Focus whatever belongs to the payload's project.
    pub fn focus_project(&self, payload: &HookPayload) -> FocusReport {
        let project = payload.project_name();
        let result = self.try_focus_project(payload, &project);
        self.finish(&payload.cwd, result)
    }

    /// Activate a known window (shortcut bar click).
    pub fn focus_window(&self, window: WindowId) -> FocusReport {
        let result = {
            let mut display = self.lock_display();
            Self::activate_locked(&mut display, window, self.options.settle)
        };
        self.finish(&format!("window {window:#x}"), result.map(|()| FocusOutcome::Success(window)))
    }

    /// Content windows of every built-in editor, for the shortcut bar.
    pub fn open_editor_windows(&self) -> Result<Vec<WindowEntry>, FocusError> {
        let mapping = self.mapping();
        let _display = self.lock_display();

        let mut entries = Vec::new();
        for (editor, window) in &mapping.builtin_editors {
            let query = WindowQuery::Class(window.window_class.clone());
            let candidates = match enumerate::list_windows(&self.search, &query) {
                Ok(candidates) => candidates,
                Err(e @ FocusError::ExternalToolMissing { .. }) => return Err(e),
                Err(e) => {
                    warn!(editor, error = %e, "Editor window scan failed");
                    continue;
                }
            };
            entries.extend(candidates.into_iter().filter(|w| !w.is_decoy).map(|w| WindowEntry {
                editor: editor.clone(),
                window_id: w.id,
                title: w.title,
            }));
        }
        debug!(count = entries.len(), "Scanned editor windows");
        Ok(entries)
    }

    fn try_focus_project(&self, payload: &HookPayload, project: &str) -> Result<FocusOutcome, FocusError> {
        let mapping = self.mapping();
        match mapping.resolve(&payload.cwd) {
            FocusTarget::Command { command, pass_data } => {
                command::run_custom_command(&command, pass_data, payload, self.options.command_timeout)?;
                Ok(FocusOutcome::CommandCompleted)
            }
            FocusTarget::Window(spec) => {
                let Some(query) = query_for(&spec) else {
                    return Ok(FocusOutcome::NoMatchFound);
                };

                let mut display = self.lock_display();
                display.acquire()?;

                let candidates = enumerate::list_windows(&self.search, &query)?;
                let Some(window) = matcher::select(&candidates, Some(project)) else {
                    debug!(?query, project, "No candidate window");
                    return Ok(FocusOutcome::NoMatchFound);
                };

                Self::activate_locked(&mut display, window, self.options.settle)?;
                Ok(FocusOutcome::Success(window))
            }
        }
    }

    /// Acquire the connection and run the activation sequence.
    ///
    /// Any failure drops the connection so the next request starts fresh.
    fn activate_locked(
        display: &mut ConnectionManager<C>,
        window: WindowId,
        settle: Duration,
    ) -> Result<(), FocusError> {
        let result = {
            let handle = display.acquire()?;
            activate::activate(handle, window, settle)
        };
        if let Err(e) = &result {
            let generation = display.generation();
            warn!(generation, window, error = %e, "Activation failed, dropping display connection");
            display.invalidate();
        }
        result
    }

    fn lock_display(&self) -> MutexGuard<'_, ConnectionManager<C>> {
        match self.display.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Display lock poisoned, discarding connection");
                let mut guard = poisoned.into_inner();
                guard.invalidate();
                guard
            }
        }
    }

    /// Turn a result into a report, logging failures.
    fn finish(&self, subject: &str, result: Result<FocusOutcome, FocusError>) -> FocusReport {
        let (outcome, detail) = match result {
            Ok(outcome) => (outcome, None),
            Err(e) => (FocusOutcome::from(&e), Some(e.to_string())),
        };

        if outcome.is_success() {
            info!(subject, outcome = outcome.kind(), "Focus succeeded");
        } else {
            let detail = detail.unwrap_or_else(|| outcome.kind().to_string());
            warn!(subject, outcome = outcome.kind(), detail = %detail, "Focus failed");
            self.error_log.record(subject, outcome.kind(), &detail);
        }

        let message = self.describe(&outcome);
        FocusReport { outcome, message }
    }

    fn describe(&self, outcome: &FocusOutcome) -> String {
        match outcome {
            FocusOutcome::Success(_) => "Focus succeeded".to_string(),
            FocusOutcome::CommandCompleted => "Focus command completed".to_string(),
            FocusOutcome::NoMatchFound => "Window not found".to_string(),
            FocusOutcome::ConnectionUnavailable => "Display not available".to_string(),
            FocusOutcome::ExternalToolMissing { tool } => {
                if self.tool_hint_shown.swap(true, Ordering::Relaxed) {
                    format!("{tool} not installed")
                } else {
                    format!("{tool} not installed (install it with your package manager, e.g. `sudo apt install {tool}`)")
                }
            }
            FocusOutcome::ActivationFailed(_) => "Could not activate window".to_string(),
            FocusOutcome::CommandFailed(info) => format!("Focus command failed ({info})"),
        }
    }
}

/// Class search when a class is known, title search otherwise.
fn query_for(spec: &WindowSpec) -> Option<WindowQuery> {
    match (&spec.window_class, &spec.window_title) {
        (Some(class), _) => Some(WindowQuery::Class(class.clone())),
        (None, Some(title)) => Some(WindowQuery::Title(title.clone())),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::thread;

    use super::activate::ActivationStep;
    use super::connection::tests::FakeConnector;
    use super::enumerate::tests::FakeSearch;
    use super::mapping::ProjectFocusConfig;

    fn service(search: FakeSearch, mapping: FocusMapping) -> (FocusService<FakeConnector, FakeSearch>, FakeConnector) {
        let connector = FakeConnector::default();
        let options = FocusOptions {
            settle: Duration::ZERO,
            command_timeout: Duration::from_secs(5),
        };
        let service = FocusService::new(connector.clone(), search, mapping, options, ErrorLog::disabled());
        (service, connector)
    }

    fn cursor_mapping() -> FocusMapping {
        let mut mapping = FocusMapping::default();
        mapping.projects.insert(
            "/home/u/proj-b".into(),
            ProjectFocusConfig::BuiltinEditor {
                editor: "cursor".into(),
                window_title: None,
                window_class: None,
            },
        );
        mapping
    }

    fn cursor_search() -> FakeSearch {
        FakeSearch::with_windows(
            "Cursor",
            &[(1, "cursor"), (2, "proj-a - Cursor"), (3, "proj-b - Cursor")],
        )
    }

    fn payload(cwd: &str) -> HookPayload {
        HookPayload {
            cwd: cwd.into(),
            message: "done".into(),
            ..Default::default()
        }
    }

    #[test]
    fn focuses_matching_project_window() {
        let (service, connector) = service(cursor_search(), cursor_mapping());
        let report = service.focus_project(&payload("/home/u/proj-b"));

        assert_eq!(report.outcome, FocusOutcome::Success(3));
        let steps = connector.state.steps.lock().unwrap();
        assert_eq!(steps.len(), 5);
        assert!(steps.iter().all(|(_, _, w)| *w == 3));
        assert_eq!(
            steps.iter().map(|(_, s, _)| *s).collect::<Vec<_>>(),
            ActivationStep::SEQUENCE.to_vec()
        );
    }

    fn title_only_mapping() -> FocusMapping {
        let mut mapping = FocusMapping::default();
        mapping.projects.insert(
            "/home/u/notes".into(),
            ProjectFocusConfig::ExplicitWindow {
                window_class: None,
                window_title: Some("Obsidian".into()),
            },
        );
        mapping
    }

    #[test]
    fn title_only_config_searches_by_name() {
        let search = FakeSearch::with_windows("Obsidian", &[(4, "Obsidian"), (5, "vault - Obsidian")]);
        let queries = search.queries.clone();
        let (service, _) = service(search, title_only_mapping());

        let report = service.focus_project(&payload("/home/u/notes"));
        assert_eq!(report.outcome, FocusOutcome::Success(5));
        assert_eq!(*queries.lock().unwrap(), vec![WindowQuery::Title("Obsidian".into())]);
    }

    #[test]
    fn title_only_config_falls_back_to_decoy() {
        let search = FakeSearch::with_windows("Obsidian", &[(4, "obsidian")]);
        let (service, connector) = service(search, title_only_mapping());

        let report = service.focus_project(&payload("/home/u/notes"));
        assert_eq!(report.outcome, FocusOutcome::Success(4));
        assert_eq!(connector.state.steps.lock().unwrap().len(), 5);
    }

    #[test]
    fn unknown_project_uses_default_editor() {
        let search = FakeSearch::with_windows("Code", &[(7, "Code"), (8, "notes - Visual Studio Code")]);
        let (service, _) = service(search, FocusMapping::default());

        let report = service.focus_project(&payload("/somewhere/else"));
        assert_eq!(report.outcome, FocusOutcome::Success(8));
    }

    #[test]
    fn no_windows_is_no_match() {
        let (service, connector) = service(FakeSearch::default(), cursor_mapping());
        let report = service.focus_project(&payload("/home/u/proj-b"));

        assert_eq!(report.outcome, FocusOutcome::NoMatchFound);
        assert_eq!(report.message, "Window not found");
        assert!(connector.state.steps.lock().unwrap().is_empty());
    }

    #[test]
    fn unreachable_display_reports_connection_unavailable() {
        let (service, connector) = service(cursor_search(), cursor_mapping());
        connector.set_unreachable(true);

        let report = service.focus_project(&payload("/home/u/proj-b"));
        assert_eq!(report.outcome, FocusOutcome::ConnectionUnavailable);

        connector.set_unreachable(false);
        let report = service.focus_project(&payload("/home/u/proj-b"));
        assert_eq!(report.outcome, FocusOutcome::Success(3));
    }

    #[test]
    fn missing_tool_hint_is_shown_once() {
        let search = FakeSearch {
            missing_tool: true,
            ..Default::default()
        };
        let (service, _) = service(search, cursor_mapping());

        let first = service.focus_project(&payload("/home/u/proj-b"));
        let second = service.focus_project(&payload("/home/u/proj-b"));
        assert!(matches!(first.outcome, FocusOutcome::ExternalToolMissing { .. }));
        assert!(first.message.contains("install"));
        assert_eq!(second.message, "xdotool not installed");
    }

    #[test]
    fn activation_failure_invalidates_connection() {
        let (service, connector) = service(cursor_search(), cursor_mapping());
        *connector.state.fail_at.lock().unwrap() = Some(ActivationStep::ForceActiveProperty);

        let report = service.focus_project(&payload("/home/u/proj-b"));
        assert!(matches!(report.outcome, FocusOutcome::ActivationFailed(_)));
        assert_eq!(connector.live(), 0);
        {
            let steps = connector.state.steps.lock().unwrap();
            assert_eq!(
                steps.iter().map(|(_, s, _)| *s).collect::<Vec<_>>(),
                vec![ActivationStep::Deminimize, ActivationStep::RequestActivation]
            );
        }

        // The next request heals itself on a fresh connection.
        *connector.state.fail_at.lock().unwrap() = None;
        let report = service.focus_project(&payload("/home/u/proj-b"));
        assert_eq!(report.outcome, FocusOutcome::Success(3));
        let steps = connector.state.steps.lock().unwrap();
        assert_eq!(steps.last().map(|(id, _, _)| *id), Some(2));
    }

    #[test]
    fn concurrent_requests_never_interleave() {
        let (service, connector) = service(cursor_search(), cursor_mapping());
        *connector.state.step_delay.lock().unwrap() = Duration::from_millis(2);
        let service = Arc::new(service);

        let workers: Vec<_> = (0..8)
            .map(|i| {
                let service = service.clone();
                thread::spawn(move || {
                    if i % 2 == 0 {
                        service.focus_project(&payload("/home/u/proj-b"))
                    } else {
                        service.focus_window(100 + i)
                    }
                })
            })
            .collect();

        for worker in workers {
            assert!(worker.join().unwrap().outcome.is_success());
        }
        assert_eq!(connector.state.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(connector.state.steps.lock().unwrap().len(), 8 * 5);
        assert_eq!(connector.max_live(), 1);

        // Each request's five steps are contiguous.
        let steps = connector.state.steps.lock().unwrap();
        for chunk in steps.chunks(5) {
            let window = chunk[0].2;
            assert!(chunk.iter().all(|(_, _, w)| *w == window));
            assert_eq!(
                chunk.iter().map(|(_, s, _)| *s).collect::<Vec<_>>(),
                ActivationStep::SEQUENCE.to_vec()
            );
        }
    }

    #[test]
    fn custom_command_receives_payload_and_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("stdin.json");
        let script = command::tests::script(
            dir.path(),
            "focus.sh",
            &format!("cat > '{}'\nexit 4", out.display()),
        );

        let mut mapping = FocusMapping::default();
        mapping.projects.insert(
            "/home/u/hooked".into(),
            ProjectFocusConfig::CustomCommand {
                command: script,
                pass_data: true,
            },
        );
        let (service, connector) = service(FakeSearch::default(), mapping);

        let mut event = payload("/home/u/hooked");
        event.session_id = "s-42".into();
        event.normalize("2026-10-16 09:00:00".into());
        let report = service.focus_project(&event);

        assert_eq!(report.outcome, FocusOutcome::CommandFailed(ExitInfo::Code(4)));
        assert_eq!(report.message, "Focus command failed (exit code 4)");
        let received: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(received, serde_json::to_value(&event).unwrap());
        assert_eq!(connector.live(), 0);
    }

    #[test]
    fn shortcut_scan_lists_content_windows_of_all_editors() {
        let mut search = cursor_search();
        search.add("Code", &[(20, "api - Visual Studio Code"), (21, "Code")]);
        let (service, _) = service(search, FocusMapping::default());

        let entries = service.open_editor_windows().unwrap();
        let ids: Vec<_> = entries.iter().map(|e| (e.editor.as_str(), e.window_id)).collect();
        assert_eq!(ids, vec![("cursor", 2), ("cursor", 3), ("vscode", 20)]);
    }

    #[test]
    fn reload_keeps_old_mapping_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("focus-mapping.json");
        std::fs::write(&path, r#"{"default": {"type": "cursor"}}"#).unwrap();

        let (service, _) = service(FakeSearch::default(), FocusMapping::load(&path).unwrap());
        let service = service.with_mapping_path(path.clone());

        std::fs::write(&path, r#"{"default": {"type": "vim"}}"#).unwrap();
        assert!(service.reload().is_err());
        assert!(matches!(
            &service.mapping().default,
            ProjectFocusConfig::BuiltinEditor { editor, .. } if editor == "cursor"
        ));

        std::fs::write(&path, r#"{"default": {"window_class": "kitty"}}"#).unwrap();
        service.reload().unwrap();
        assert!(matches!(service.mapping().default, ProjectFocusConfig::ExplicitWindow { .. }));
    }
}
