//! Host automation seam
//!
//! Everything the sync engine needs from the host application goes through
//! [`HostAutomation`]. Documents are addressed by the full path the host
//! reports for them; components by their name inside the document's project.

mod memory;
mod snapshot;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use memory::{MemoryDocument, MemoryHost};
pub use snapshot::SnapshotHost;

use crate::document::{Document, ModuleKind};

/// Hint printed when the host refuses access to the VBA project
pub const TRUST_CENTER_HINT: &str = "Enable File > Options > Trust Center > Trust Center Settings > \
     Macro Settings > 'Trust access to the VBA project object model'";

/// Failures reported by the host automation layer
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The host process is not reachable
    #[error("Host application is not reachable: {reason}")]
    NotConnected {
        /// What the connection attempt reported
        reason: String,
    },

    /// The requested document is not open in the host
    #[error("Document not open: {path} (open documents: {open})")]
    DocumentNotOpen {
        /// Requested document path
        path: PathBuf,
        /// Comma-separated display names of the open documents
        open: String,
    },

    /// The host blocks programmatic access to the VBA project
    #[error("Access to the VBA project of {document} was denied. {hint}")]
    ProjectAccessDenied {
        /// Document display name
        document: String,
        /// Remediation hint for the user
        hint: &'static str,
    },

    /// No component with this name exists in the project
    #[error("Module '{module}' not found in {document}")]
    ComponentNotFound {
        /// Document display name
        document: String,
        /// Requested module name
        module: String,
    },

    /// The component cannot be modified
    #[error("Module '{module}' is locked")]
    ModuleLocked {
        /// Module name
        module: String,
    },

    /// The host rejected the requested operation
    #[error("Host rejected {operation}: {reason}")]
    Rejected {
        /// Operation that was attempted
        operation: &'static str,
        /// Reason given by the host
        reason: String,
    },

    /// File system error while exchanging files with the host
    #[error("I/O error at {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl HostError {
    /// Wrap an I/O error with the path it occurred at
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure concerns the connection rather than one module
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::NotConnected { .. } | Self::DocumentNotOpen { .. } | Self::ProjectAccessDenied { .. }
        )
    }
}

/// Component as enumerated by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentInfo {
    /// Component name, unique within the project
    pub name: String,
    /// Component kind
    pub kind: ModuleKind,
    /// Current number of code lines
    pub line_count: usize,
}

/// Per-thread host environment guard
///
/// Acquired at the top of every thread entry point that touches the host and
/// released when dropped, on every exit path.
#[must_use = "the attachment is released as soon as the guard is dropped"]
pub struct ThreadAttachment {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ThreadAttachment {
    /// Guard for hosts that need no per-thread setup
    pub const fn detached() -> Self {
        Self { release: None }
    }

    /// Guard that runs `release` when dropped
    pub fn with_release(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for ThreadAttachment {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for ThreadAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadAttachment")
            .field("attached", &self.release.is_some())
            .finish()
    }
}

/// Operations the sync engine needs from the host application
///
/// Line numbers are 1-based, like the host's code module API.
pub trait HostAutomation: Send {
    /// Initialize the host environment for the calling thread
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be attached.
    fn attach_thread(&self) -> Result<ThreadAttachment, HostError> {
        Ok(ThreadAttachment::detached())
    }

    /// Whether the host is currently reachable
    fn is_connected(&self) -> bool;

    /// Re-establish the connection if it was lost
    ///
    /// # Errors
    ///
    /// Returns [`HostError::NotConnected`] if the host cannot be reached.
    fn reconnect(&mut self) -> Result<(), HostError>;

    /// All documents open in the host
    ///
    /// # Errors
    ///
    /// Returns an error if the host is not reachable.
    fn documents(&self) -> Result<Vec<Document>, HostError>;

    /// Components of a document's project in host enumeration order
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not open or its project is locked
    /// away from automation.
    fn components(&self, document: &Path) -> Result<Vec<ComponentInfo>, HostError>;

    /// Full code body of a component, lines joined with `\n`
    ///
    /// # Errors
    ///
    /// Returns an error if the component does not exist.
    fn read_code(&self, document: &Path, module: &str) -> Result<String, HostError>;

    /// A single code line
    ///
    /// # Errors
    ///
    /// Returns an error if the component or the line does not exist.
    fn read_line(&self, document: &Path, module: &str, line: usize) -> Result<String, HostError> {
        let code = self.read_code(document, module)?;
        line.checked_sub(1)
            .and_then(|idx| code.lines().nth(idx))
            .map(str::to_string)
            .ok_or_else(|| HostError::Rejected {
                operation: "read line",
                reason: format!("line {line} is out of range in '{module}'"),
            })
    }

    /// Replace a single code line
    ///
    /// # Errors
    ///
    /// Returns an error if the component is missing, locked, or the line is
    /// out of range.
    fn replace_line(
        &mut self,
        document: &Path,
        module: &str,
        line: usize,
        text: &str,
    ) -> Result<(), HostError>;

    /// Delete `count` lines starting at `start`
    ///
    /// # Errors
    ///
    /// Returns an error if the component is missing or locked.
    fn delete_lines(
        &mut self,
        document: &Path,
        module: &str,
        start: usize,
        count: usize,
    ) -> Result<(), HostError>;

    /// Append code to the end of a component
    ///
    /// # Errors
    ///
    /// Returns an error if the component is missing or locked.
    fn add_code(&mut self, document: &Path, module: &str, code: &str) -> Result<(), HostError>;

    /// Remove a component from the project
    ///
    /// # Errors
    ///
    /// Returns an error if the component is missing or cannot be removed.
    fn remove_component(&mut self, document: &Path, module: &str) -> Result<(), HostError>;

    /// Import a component from a module file in the host's native codepage
    ///
    /// Returns the name of the created component.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the host rejects it.
    fn import_component(&mut self, document: &Path, file: &Path) -> Result<String, HostError>;

    /// Export a component to a file, header included, in the native codepage
    ///
    /// Forms also produce a sibling binary resource file.
    ///
    /// # Errors
    ///
    /// Returns an error if the component is missing or the file cannot be
    /// written.
    fn export_component(&self, document: &Path, module: &str, file: &Path)
    -> Result<(), HostError>;
}
