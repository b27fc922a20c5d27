//! File-backed host state
//!
//! A [`MemoryHost`] persisted as JSON. Every mutation is written back so that
//! separate processes (and `reconnect`) observe the same host state.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{ComponentInfo, HostAutomation, HostError, MemoryHost, ThreadAttachment};
use crate::document::Document;
use crate::error::Result;

/// Host state loaded from and saved to a JSON file
#[derive(Debug)]
pub struct SnapshotHost {
    path: PathBuf,
    inner: MemoryHost,
}

impl SnapshotHost {
    /// Load host state from a snapshot file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let inner = Self::read_state(path)
            .with_context(|| format!("Failed to load host state: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded host state");
        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }

    /// Write `host` to `path` and wrap it
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn create(path: &Path, host: MemoryHost) -> Result<Self> {
        let snapshot = Self {
            path: path.to_path_buf(),
            inner: host,
        };
        snapshot
            .save()
            .with_context(|| format!("Failed to write host state: {}", path.display()))?;
        Ok(snapshot)
    }

    /// Snapshot file location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The in-memory host state
    #[must_use]
    pub const fn host(&self) -> &MemoryHost {
        &self.inner
    }

    fn read_state(path: &Path) -> Result<MemoryHost> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Persist the current state
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> std::result::Result<(), HostError> {
        let json = serde_json::to_string_pretty(&self.inner)
            .map_err(|e| HostError::io(&self.path, std::io::Error::other(e)))?;
        fs::write(&self.path, json).map_err(|e| HostError::io(&self.path, e))
    }

    fn mutate<T>(
        &mut self,
        op: impl FnOnce(&mut MemoryHost) -> std::result::Result<T, HostError>,
    ) -> std::result::Result<T, HostError> {
        let value = op(&mut self.inner)?;
        self.save()?;
        Ok(value)
    }
}

impl HostAutomation for SnapshotHost {
    fn attach_thread(&self) -> std::result::Result<ThreadAttachment, HostError> {
        self.inner.attach_thread()
    }

    fn is_connected(&self) -> bool {
        self.path.is_file()
    }

    fn reconnect(&mut self) -> std::result::Result<(), HostError> {
        let state = Self::read_state(&self.path).map_err(|e| HostError::NotConnected {
            reason: format!("cannot read host state {}: {e}", self.path.display()),
        })?;
        self.inner = state;
        Ok(())
    }

    fn documents(&self) -> std::result::Result<Vec<Document>, HostError> {
        self.inner.documents()
    }

    fn components(&self, document: &Path) -> std::result::Result<Vec<ComponentInfo>, HostError> {
        self.inner.components(document)
    }

    fn read_code(&self, document: &Path, module: &str) -> std::result::Result<String, HostError> {
        self.inner.read_code(document, module)
    }

    fn replace_line(
        &mut self,
        document: &Path,
        module: &str,
        line: usize,
        text: &str,
    ) -> std::result::Result<(), HostError> {
        self.mutate(|host| host.replace_line(document, module, line, text))
    }

    fn delete_lines(
        &mut self,
        document: &Path,
        module: &str,
        start: usize,
        count: usize,
    ) -> std::result::Result<(), HostError> {
        self.mutate(|host| host.delete_lines(document, module, start, count))
    }

    fn add_code(
        &mut self,
        document: &Path,
        module: &str,
        code: &str,
    ) -> std::result::Result<(), HostError> {
        self.mutate(|host| host.add_code(document, module, code))
    }

    fn remove_component(
        &mut self,
        document: &Path,
        module: &str,
    ) -> std::result::Result<(), HostError> {
        self.mutate(|host| host.remove_component(document, module))
    }

    fn import_component(
        &mut self,
        document: &Path,
        file: &Path,
    ) -> std::result::Result<String, HostError> {
        self.mutate(|host| host.import_component(document, file))
    }

    fn export_component(
        &self,
        document: &Path,
        module: &str,
        file: &Path,
    ) -> std::result::Result<(), HostError> {
        self.inner.export_component(document, module, file)
    }
}
