//! Target window selection.
//!
//! Preference order: a content window whose title names the project, then
//! the first content window, then the first decoy, then nothing.

use tracing::debug;

use crate::focus::activate::WindowId;
use crate::focus::enumerate::CandidateWindow;

/// Pick the window to activate from `candidates` (in enumeration order).
pub fn select(candidates: &[CandidateWindow], project_name: Option<&str>) -> Option<WindowId> {
    let (content, decoys): (Vec<&CandidateWindow>, Vec<&CandidateWindow>) =
        candidates.iter().partition(|w| !w.is_decoy);

    if let Some(project) = project_name.filter(|p| !p.is_empty()) {
        let needle = project.to_lowercase();
        if let Some(hit) = content.iter().find(|w| w.title.to_lowercase().contains(&needle)) {
            debug!(window = hit.id, project, title = %hit.title, "Matched window by project name");
            return Some(hit.id);
        }
        debug!(project, "No window title mentions the project, falling back");
    }

    content
        .first()
        .or_else(|| decoys.first())
        .map(|w| w.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(id: WindowId, title: &str, is_decoy: bool) -> CandidateWindow {
        CandidateWindow {
            id,
            title: title.to_string(),
            is_decoy,
        }
    }

    fn cursor_windows() -> Vec<CandidateWindow> {
        vec![
            window(1, "cursor", true),
            window(2, "proj-a - Cursor", false),
            window(3, "proj-b - Cursor", false),
        ]
    }

    #[test]
    fn prefers_project_match() {
        assert_eq!(select(&cursor_windows(), Some("proj-b")), Some(3));
    }

    #[test]
    fn project_match_is_case_insensitive() {
        assert_eq!(select(&cursor_windows(), Some("PROJ-B")), Some(3));
    }

    #[test]
    fn falls_back_to_first_content_window() {
        assert_eq!(select(&cursor_windows(), Some("zzz")), Some(2));
        assert_eq!(select(&cursor_windows(), None), Some(2));
    }

    #[test]
    fn decoys_never_win_a_project_match() {
        let windows = vec![window(1, "proj", true), window(2, "other - Code", false)];
        assert_eq!(select(&windows, Some("proj")), Some(2));
    }

    #[test]
    fn all_decoys_returns_first_decoy() {
        let windows = vec![window(9, "cursor", true)];
        assert_eq!(select(&windows, Some("anything")), Some(9));
        assert_eq!(select(&windows, None), Some(9));
    }

    #[test]
    fn empty_input_returns_none() {
        assert_eq!(select(&[], Some("proj")), None);
        assert_eq!(select(&[], None), None);
    }
}
