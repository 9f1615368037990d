//! Window enumeration through `xdotool`.
//!
//! Searches return windows in the order the tool reports them, and that order
//! is kept all the way through matching.

use std::process::{Command, ExitStatus};
use std::time::Duration;
use tracing::{debug, trace};

use crate::focus::activate::WindowId;
use crate::focus::error::FocusError;
use crate::focus::process::{self, RunError};

/// Name of the helper executable
pub const XDOTOOL: &str = "xdotool";

/// What to search for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowQuery {
    /// `WM_CLASS` match
    Class(String),
    /// Window title match, used when only a title is configured
    Title(String),
}

impl WindowQuery {
    /// The text a decoy window's title consists of.
    pub fn term(&self) -> &str {
        match self {
            Self::Class(s) | Self::Title(s) => s,
        }
    }
}

/// A window found by a search, produced fresh for every focus attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateWindow {
    pub id: WindowId,
    pub title: String,
    /// Title is nothing but the class name (DevTools panes, hidden helpers).
    ///
    /// This is a heuristic: a real window whose title happens to equal its
    /// class is misclassified, and only ends up used as a fallback.
    pub is_decoy: bool,
}

/// Decoy test: title equals the searched class, ignoring case.
pub fn is_decoy(title: &str, window_class: &str) -> bool {
    title.to_lowercase() == window_class.to_lowercase()
}

/// Backend able to search windows and read their titles.
pub trait WindowSearch: Send + Sync {
    /// All matching window ids, unlimited, in search order.
    fn search(&self, query: &WindowQuery) -> Result<Vec<WindowId>, FocusError>;

    /// Title of a single window.
    fn window_title(&self, window: WindowId) -> Result<String, FocusError>;
}

/// Enumerate candidates for `query`, preserving search order.
///
/// A failed title lookup leaves that window with an empty title instead of
/// failing the whole enumeration.
pub fn list_windows<S: WindowSearch + ?Sized>(
    search: &S,
    query: &WindowQuery,
) -> Result<Vec<CandidateWindow>, FocusError> {
    let ids = search.search(query)?;
    let term = query.term();

    let candidates: Vec<CandidateWindow> = ids
        .into_iter()
        .map(|id| {
            let title = match search.window_title(id) {
                Ok(title) => title,
                Err(e) => {
                    debug!(window = id, error = %e, "Title lookup failed, using empty title");
                    String::new()
                }
            };
            let is_decoy = is_decoy(&title, term);
            trace!(window = id, title = %title, is_decoy, "Candidate window");
            CandidateWindow { id, title, is_decoy }
        })
        .collect();

    debug!(?query, count = candidates.len(), "Enumerated windows");
    Ok(candidates)
}

/// `xdotool`-backed search with bounded call durations.
#[derive(Debug, Clone)]
pub struct Xdotool {
    pub program: String,
    pub search_timeout: Duration,
    pub title_timeout: Duration,
}

impl Default for Xdotool {
    fn default() -> Self {
        Self {
            program: XDOTOOL.to_string(),
            search_timeout: Duration::from_secs(2),
            title_timeout: Duration::from_secs(1),
        }
    }
}

impl Xdotool {
    fn map_run_error(&self, e: RunError) -> FocusError {
        match e {
            RunError::NotFound { .. } => FocusError::ExternalToolMissing {
                tool: self.program.clone(),
            },
            other => FocusError::Enumeration(other.to_string()),
        }
    }
}

/// Parse the newline separated decimal ids printed by `xdotool search`.
pub fn parse_window_ids(output: &str) -> Vec<WindowId> {
    output
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}

/// Interpret the outcome of `xdotool search`.
///
/// xdotool exits 1 with no output when nothing matched.
fn search_result(status: ExitStatus, stdout: &str) -> Result<Vec<WindowId>, FocusError> {
    if !status.success() && !stdout.trim().is_empty() {
        return Err(FocusError::Enumeration(format!(
            "xdotool search exited with {status}"
        )));
    }
    Ok(parse_window_ids(stdout))
}

impl WindowSearch for Xdotool {
    fn search(&self, query: &WindowQuery) -> Result<Vec<WindowId>, FocusError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("search");
        match query {
            WindowQuery::Class(class) => cmd.args(["--class", class.as_str()]),
            WindowQuery::Title(title) => cmd.args(["--name", title.as_str()]),
        };

        let finished = process::run(&mut cmd, None, true, self.search_timeout)
            .map_err(|e| self.map_run_error(e))?;
        search_result(finished.status, &String::from_utf8_lossy(&finished.stdout))
    }

    fn window_title(&self, window: WindowId) -> Result<String, FocusError> {
        let finished = process::run(
            Command::new(&self.program).args(["getwindowname", window.to_string().as_str()]),
            None,
            true,
            self.title_timeout,
        )
        .map_err(|e| self.map_run_error(e))?;

        if !finished.status.success() {
            return Err(FocusError::Enumeration(format!(
                "xdotool getwindowname {window} exited with {}",
                finished.status
            )));
        }
        Ok(String::from_utf8_lossy(&finished.stdout).trim_end().to_string())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::os::unix::process::ExitStatusExt;
    use std::sync::{Arc, Mutex};

    /// Canned search results keyed by query term.
    #[derive(Default, Clone)]
    pub(crate) struct FakeSearch {
        pub results: HashMap<String, Vec<WindowId>>,
        pub titles: HashMap<WindowId, String>,
        pub missing_tool: bool,
        /// Every query issued, in order
        pub queries: Arc<Mutex<Vec<WindowQuery>>>,
    }

    impl FakeSearch {
        pub(crate) fn with_windows(term: &str, windows: &[(WindowId, &str)]) -> Self {
            let mut search = Self::default();
            search.add(term, windows);
            search
        }

        pub(crate) fn add(&mut self, term: &str, windows: &[(WindowId, &str)]) {
            self.results
                .insert(term.to_string(), windows.iter().map(|(id, _)| *id).collect());
            for (id, title) in windows {
                self.titles.insert(*id, title.to_string());
            }
        }
    }

    impl WindowSearch for FakeSearch {
        fn search(&self, query: &WindowQuery) -> Result<Vec<WindowId>, FocusError> {
            self.queries.lock().unwrap().push(query.clone());
            if self.missing_tool {
                return Err(FocusError::ExternalToolMissing {
                    tool: XDOTOOL.into(),
                });
            }
            Ok(self.results.get(query.term()).cloned().unwrap_or_default())
        }

        fn window_title(&self, window: WindowId) -> Result<String, FocusError> {
            self.titles
                .get(&window)
                .cloned()
                .ok_or_else(|| FocusError::Enumeration(format!("no title for {window}")))
        }
    }

    #[test]
    fn search_exit_one_without_output_is_empty() {
        let exit_one = ExitStatus::from_raw(1 << 8);
        assert_eq!(search_result(exit_one, "").unwrap(), Vec::<WindowId>::new());
        assert_eq!(search_result(exit_one, "\n").unwrap(), Vec::<WindowId>::new());
        assert!(matches!(
            search_result(exit_one, "Can't open display\n"),
            Err(FocusError::Enumeration(_))
        ));
    }

    #[test]
    fn search_success_parses_ids_in_order() {
        let ok = ExitStatus::from_raw(0);
        assert_eq!(search_result(ok, "42\n7\n\n19\n").unwrap(), vec![42, 7, 19]);
    }

    #[test]
    fn decoy_is_exact_case_insensitive_match() {
        assert!(is_decoy("Cursor", "Cursor"));
        assert!(is_decoy("cursor", "Cursor"));
        assert!(!is_decoy("myproj - Cursor", "Cursor"));
        assert!(!is_decoy("", "Cursor"));
    }

    #[test]
    fn list_windows_preserves_search_order() {
        let search = FakeSearch::with_windows(
            "Cursor",
            &[(30, "zeta - Cursor"), (10, "Cursor"), (20, "alpha - Cursor")],
        );
        let windows = list_windows(&search, &WindowQuery::Class("Cursor".into())).unwrap();

        let ids: Vec<_> = windows.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![30, 10, 20]);
        assert_eq!(
            windows.iter().map(|w| w.is_decoy).collect::<Vec<_>>(),
            vec![false, true, false]
        );
    }

    #[test]
    fn failed_title_lookup_yields_empty_title() {
        let mut search = FakeSearch::with_windows("Code", &[(1, "proj - Visual Studio Code")]);
        search.results.get_mut("Code").unwrap().push(2);

        let windows = list_windows(&search, &WindowQuery::Class("Code".into())).unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].title, "");
        assert!(!windows[1].is_decoy);
    }

    #[test]
    fn missing_tool_propagates() {
        let search = FakeSearch {
            missing_tool: true,
            ..Default::default()
        };
        let err = list_windows(&search, &WindowQuery::Class("Code".into())).unwrap_err();
        assert!(matches!(err, FocusError::ExternalToolMissing { .. }));
    }

    #[test]
    fn parse_window_ids_skips_garbage() {
        assert_eq!(parse_window_ids("123\n\n456\nnot-a-number\n"), vec![123, 456]);
    }

    #[test]
    fn xdotool_absent_reports_missing_tool() {
        let tool = Xdotool {
            program: "xdotool-not-installed-4711".into(),
            ..Default::default()
        };
        let err = tool.search(&WindowQuery::Class("Code".into())).unwrap_err();
        assert!(matches!(err, FocusError::ExternalToolMissing { .. }));
    }
}
