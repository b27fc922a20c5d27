//! Configuration types and structures

use serde::{Deserialize, Serialize};

/// Default host polling interval of the watcher
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 4;

/// Default window for ignoring repeated file events
pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;

/// How conflicting modules are resolved when nobody is asked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
    /// Ask for every conflict
    #[default]
    Prompt,
    /// Overwrite the target side
    Overwrite,
    /// Leave the target side untouched
    Skip,
    /// Stop processing the document
    Cancel,
}

/// Configuration file contents
///
/// Every field is optional so that a higher-precedence file only overrides
/// what it actually sets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Explicit host codepage (`cp1251`, `windows-1250`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codepage: Option<String>,

    /// Folder-annotation mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hierarchical: Option<bool>,

    /// Allow replacing the document code-behind module
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_document: Option<bool>,

    /// Conflict strategy for one-shot commands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictStrategy>,

    /// Watcher: remove host modules when their files are deleted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_delete: Option<bool>,

    /// Watcher: poll the host for changes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bidirectional: Option<bool>,

    /// Watcher: seconds between host polls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,

    /// Watcher: window for ignoring repeated file events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
}

impl Config {
    /// Resolve unset fields to their defaults
    #[must_use]
    pub fn settings(&self) -> Settings {
        Settings {
            codepage: self.codepage.clone(),
            hierarchical: self.hierarchical.unwrap_or(false),
            force_document: self.force_document.unwrap_or(false),
            conflict: self.conflict.unwrap_or_default(),
            sync_delete: self.sync_delete.unwrap_or(false),
            bidirectional: self.bidirectional.unwrap_or(true),
            poll_interval_secs: self.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            debounce_ms: self.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS),
        }
    }
}

/// Effective settings after defaults are applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Settings {
    /// Explicit host codepage
    pub codepage: Option<String>,
    /// Folder-annotation mode
    pub hierarchical: bool,
    /// Allow replacing the document code-behind module
    pub force_document: bool,
    /// Conflict strategy for one-shot commands
    pub conflict: ConflictStrategy,
    /// Watcher: remove host modules when their files are deleted
    pub sync_delete: bool,
    /// Watcher: poll the host for changes
    pub bidirectional: bool,
    /// Watcher: seconds between host polls
    pub poll_interval_secs: u64,
    /// Watcher: window for ignoring repeated file events
    pub debounce_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Config::default().settings()
    }
}
