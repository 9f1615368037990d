//! Focus mapping: which window (or command) belongs to which project.
//!
//! Loaded from JSON at `~/.config/hook-notifier/focus-mapping.json`. Entries
//! are validated once at load time and turned into [`ProjectFocusConfig`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Configuration loading failure
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid focus mapping: {0}")]
    Invalid(String),
}

/// Window identification defaults for a built-in editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorWindow {
    pub window_title: String,
    pub window_class: String,
}

/// What to do when a card of a project is clicked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawProjectConfig", into = "RawProjectConfig")]
pub enum ProjectFocusConfig {
    /// Built-in editor, optionally overriding its title/class
    BuiltinEditor {
        editor: String,
        window_title: Option<String>,
        window_class: Option<String>,
    },
    /// Any window identified by class and/or title
    ExplicitWindow {
        window_class: Option<String>,
        window_title: Option<String>,
    },
    /// Hand the event to an external program
    CustomCommand { command: PathBuf, pass_data: bool },
}

/// On-disk shape of a project entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawProjectConfig {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    window_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    window_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pass_data: Option<bool>,
}

impl TryFrom<RawProjectConfig> for ProjectFocusConfig {
    type Error = String;

    fn try_from(raw: RawProjectConfig) -> Result<Self, Self::Error> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        match raw.kind.as_deref() {
            Some("custom") => {
                let command = non_empty(raw.custom_command)
                    .ok_or("custom entry requires \"custom_command\"")?;
                Ok(Self::CustomCommand {
                    command: PathBuf::from(command),
                    pass_data: raw.pass_data.unwrap_or(false),
                })
            }
            Some(editor) => Ok(Self::BuiltinEditor {
                editor: editor.to_string(),
                window_title: non_empty(raw.window_title),
                window_class: non_empty(raw.window_class),
            }),
            None => {
                let window_class = non_empty(raw.window_class);
                let window_title = non_empty(raw.window_title);
                if window_class.is_none() && window_title.is_none() {
                    return Err("entry needs \"type\", \"window_class\" or \"window_title\"".into());
                }
                Ok(Self::ExplicitWindow {
                    window_class,
                    window_title,
                })
            }
        }
    }
}

impl From<ProjectFocusConfig> for RawProjectConfig {
    fn from(config: ProjectFocusConfig) -> Self {
        match config {
            ProjectFocusConfig::BuiltinEditor {
                editor,
                window_title,
                window_class,
            } => Self {
                kind: Some(editor),
                window_title,
                window_class,
                ..Default::default()
            },
            ProjectFocusConfig::ExplicitWindow {
                window_class,
                window_title,
            } => Self {
                window_title,
                window_class,
                ..Default::default()
            },
            ProjectFocusConfig::CustomCommand { command, pass_data } => Self {
                kind: Some("custom".into()),
                custom_command: Some(command.to_string_lossy().into_owned()),
                pass_data: Some(pass_data),
                ..Default::default()
            },
        }
    }
}

impl Default for ProjectFocusConfig {
    fn default() -> Self {
        Self::BuiltinEditor {
            editor: "vscode".into(),
            window_title: None,
            window_class: None,
        }
    }
}

/// Class and title to look for, after built-in defaults are applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
    pub window_class: Option<String>,
    pub window_title: Option<String>,
}

/// Resolved action for a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusTarget {
    Window(WindowSpec),
    Command { command: PathBuf, pass_data: bool },
}

/// Process-wide focus configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusMapping {
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectFocusConfig>,
    #[serde(default)]
    pub default: ProjectFocusConfig,
    #[serde(default = "builtin_editors")]
    pub builtin_editors: BTreeMap<String, EditorWindow>,
}

impl Default for FocusMapping {
    fn default() -> Self {
        Self {
            projects: BTreeMap::new(),
            default: ProjectFocusConfig::default(),
            builtin_editors: builtin_editors(),
        }
    }
}

/// Editors known without any configuration
pub fn builtin_editors() -> BTreeMap<String, EditorWindow> {
    let mut editors = BTreeMap::new();
    editors.insert(
        "vscode".to_string(),
        EditorWindow {
            window_title: "Visual Studio Code".into(),
            window_class: "Code".into(),
        },
    );
    editors.insert(
        "cursor".to_string(),
        EditorWindow {
            window_title: "Cursor".into(),
            window_class: "Cursor".into(),
        },
    );
    editors
}

impl FocusMapping {
    /// Load the mapping, writing the defaults if the file does not exist yet.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("Focus mapping not found at {:?}, using defaults", path);
            let mapping = Self::default();
            if let Err(e) = mapping.save(path) {
                warn!("Failed to write default focus mapping: {}", e);
            }
            return Ok(mapping);
        }
        Self::load(path)
    }

    /// Parse and validate a mapping file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut mapping: Self =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        // Built-ins stay available even if the file only lists extra editors.
        for (key, editor) in builtin_editors() {
            mapping.builtin_editors.entry(key).or_insert(editor);
        }
        mapping.validate()?;

        info!(
            projects = mapping.projects.len(),
            editors = mapping.builtin_editors.len(),
            "Focus mapping loaded from {:?}",
            path
        );
        Ok(mapping)
    }

    /// Write the mapping as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io_err)?;
        debug!("Wrote focus mapping to {:?}", path);
        Ok(())
    }

    /// Every editor reference must name a known editor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let entries = self
            .projects
            .iter()
            .map(|(path, config)| (path.as_str(), config))
            .chain(std::iter::once(("default", &self.default)));

        for (name, config) in entries {
            if let ProjectFocusConfig::BuiltinEditor { editor, .. } = config
                && !self.builtin_editors.contains_key(editor)
            {
                return Err(ConfigError::Invalid(format!(
                    "{name}: unknown editor type \"{editor}\""
                )));
            }
        }
        Ok(())
    }

    /// Config for `project_path`: exact match, else the default.
    pub fn config_for(&self, project_path: &str) -> &ProjectFocusConfig {
        self.projects.get(project_path).unwrap_or(&self.default)
    }

    /// Resolve `project_path` into a concrete window spec or command.
    pub fn resolve(&self, project_path: &str) -> FocusTarget {
        match self.config_for(project_path) {
            ProjectFocusConfig::BuiltinEditor {
                editor,
                window_title,
                window_class,
            } => {
                let defaults = self.builtin_editors.get(editor);
                FocusTarget::Window(WindowSpec {
                    window_class: window_class
                        .clone()
                        .or_else(|| defaults.map(|d| d.window_class.clone())),
                    window_title: window_title
                        .clone()
                        .or_else(|| defaults.map(|d| d.window_title.clone())),
                })
            }
            ProjectFocusConfig::ExplicitWindow {
                window_class,
                window_title,
            } => FocusTarget::Window(WindowSpec {
                window_class: window_class.clone(),
                window_title: window_title.clone(),
            }),
            ProjectFocusConfig::CustomCommand { command, pass_data } => FocusTarget::Command {
                command: command.clone(),
                pass_data: *pass_data,
            },
        }
    }
}
