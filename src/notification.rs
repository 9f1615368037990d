//! Notification cards built from hook events.

use notifier_ipc::{CardSummary, HookPayload};
use std::time::Instant;

/// How loudly a card presents itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Normal,
    Critical,
}

/// Title, urgency and sound chosen for an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub title: &'static str,
    pub urgency: Urgency,
    /// freedesktop sound theme name
    pub sound: &'static str,
}

const PERMISSION: Classification = Classification {
    title: "🔐 Claude Code - Permission",
    urgency: Urgency::Critical,
    sound: "dialog-warning",
};

const WAITING: Classification = Classification {
    title: "⏸️  Claude Code - Waiting",
    urgency: Urgency::Critical,
    sound: "dialog-question",
};

const AUTH_SUCCESS: Classification = Classification {
    title: "✅ Claude Code - Auth Success",
    urgency: Urgency::Normal,
    sound: "complete",
};

const ERROR: Classification = Classification {
    title: "❌ Claude Code - Error",
    urgency: Urgency::Critical,
    sound: "dialog-error",
};

const COMPLETED: Classification = Classification {
    title: "✅ Claude Code - Completed",
    urgency: Urgency::Normal,
    sound: "message-new-instant",
};

/// Classify an event by its notification type, then by keywords in the message.
pub fn classify(notification_type: &str, message: &str) -> Classification {
    match notification_type {
        "permission_prompt" => return PERMISSION,
        "idle_prompt" => return WAITING,
        "auth_success" => return AUTH_SUCCESS,
        _ => {}
    }

    let message = message.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| message.contains(w));

    if message.contains("waiting for your input") {
        WAITING
    } else if mentions(&["error", "failed", "exception"]) {
        ERROR
    } else if mentions(&["permission", "approve"]) {
        PERMISSION
    } else {
        COMPLETED
    }
}

/// Card body: project, session, time and directory, then the message.
pub fn format_body(payload: &HookPayload, project: &str, timestamp: &str) -> String {
    let mut lines = vec![format!("Project: {project}")];
    if !payload.session_id.is_empty() {
        lines.push(format!("Session: {}", payload.session_id));
    }
    lines.push(format!("Time: {timestamp}"));
    if !payload.cwd.is_empty() {
        lines.push(format!("Dir: {}", payload.cwd));
    }
    lines.push(String::new());
    lines.push(payload.message.clone());
    lines.join("\n")
}

/// One notification on the board
#[derive(Debug, Clone)]
pub struct Card {
    pub id: u64,
    pub title: String,
    pub body: String,
    pub urgency: Urgency,
    pub sound: &'static str,
    pub project: String,
    /// Original event, used to focus the project window on click
    pub payload: HookPayload,
    pub created: Instant,
}

impl Card {
    /// Build a card from a normalized payload.
    pub fn new(id: u64, payload: HookPayload) -> Self {
        let class = classify(&payload.notification_type, &payload.message);
        let project = payload.project_name();
        let timestamp = payload.timestamp.clone().unwrap_or_default();
        let body = format_body(&payload, &project, &timestamp);

        Self {
            id,
            title: class.title.to_string(),
            body,
            urgency: class.urgency,
            sound: class.sound,
            project,
            payload,
            created: Instant::now(),
        }
    }

    pub fn summary(&self) -> CardSummary {
        CardSummary {
            id: self.id,
            title: self.title.clone(),
            project: self.project.clone(),
            critical: self.urgency == Urgency::Critical,
            body: self.body.clone(),
        }
    }
}
