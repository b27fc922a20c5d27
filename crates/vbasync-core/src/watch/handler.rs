//! Filesystem events: observer, filtering, and debouncing

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use anyhow::Context;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::poller::Pausable;
use crate::document::ModuleKind;
use crate::error::Result;

/// A local change that needs to reach the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    /// File created or modified
    Modified(PathBuf),
    /// File deleted
    Removed(PathBuf),
}

impl FileChange {
    /// Path of the changed file
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Modified(path) | Self::Removed(path) => path,
        }
    }
}

/// Turns raw filesystem events into debounced module changes
pub struct FileEventHandler {
    window: Duration,
    sync_delete: bool,
    exporting: Arc<AtomicBool>,
    last_seen: HashMap<PathBuf, Instant>,
}

impl FileEventHandler {
    /// Create a handler
    ///
    /// Events are dropped while `exporting` is set.
    #[must_use]
    pub fn new(window: Duration, sync_delete: bool, exporting: Arc<AtomicBool>) -> Self {
        Self {
            window,
            sync_delete,
            exporting,
            last_seen: HashMap::new(),
        }
    }

    /// Module changes carried by a raw event
    pub fn accept(&mut self, event: &Event, now: Instant) -> Vec<FileChange> {
        let removed = match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) => false,
            EventKind::Remove(_) => true,
            _ => return Vec::new(),
        };

        event
            .paths
            .iter()
            .filter_map(|path| {
                let change = if removed {
                    FileChange::Removed(path.clone())
                } else {
                    FileChange::Modified(path.clone())
                };
                self.accept_change(change, now)
            })
            .collect()
    }

    /// Filter a single change
    ///
    /// Drops changes during an export, non-module files, deletions when
    /// delete sync is off, modifications of files that no longer exist, and
    /// repeats for the same path inside the debounce window.
    pub fn accept_change(&mut self, change: FileChange, now: Instant) -> Option<FileChange> {
        if self.exporting.load(Ordering::SeqCst) {
            tracing::debug!(path = %change.path().display(), "Ignoring event during export");
            return None;
        }
        ModuleKind::from_path(change.path())?;

        match &change {
            FileChange::Removed(_) if !self.sync_delete => return None,
            FileChange::Modified(path) if !path.is_file() => return None,
            _ => {}
        }

        let window = self.window;
        self.last_seen
            .retain(|_, seen| now.saturating_duration_since(*seen) < window);
        if self.last_seen.contains_key(change.path()) {
            tracing::debug!(path = %change.path().display(), "Debounced");
            return None;
        }
        self.last_seen.insert(change.path().to_path_buf(), now);
        Some(change)
    }
}

/// Recursive filesystem observer over the module tree
pub struct Observer {
    watcher: RecommendedWatcher,
    root: PathBuf,
    watching: bool,
}

impl Observer {
    /// Start watching `root`, sending raw events to `events`
    ///
    /// # Errors
    ///
    /// Returns an error if the platform watcher cannot be created.
    pub fn start(root: &Path, events: Sender<notify::Result<Event>>) -> Result<Self> {
        let watcher = notify::recommended_watcher(events).context("Failed to create file watcher")?;
        let mut observer = Self {
            watcher,
            root: root.to_path_buf(),
            watching: false,
        };
        observer.resume()?;
        Ok(observer)
    }

    /// Watched directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Pausable for Observer {
    fn pause(&mut self) -> Result<()> {
        if self.watching {
            self.watcher
                .unwatch(&self.root)
                .with_context(|| format!("Failed to stop watching {}", self.root.display()))?;
            self.watching = false;
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        if !self.watching {
            self.watcher
                .watch(&self.root, RecursiveMode::Recursive)
                .with_context(|| format!("Failed to watch {}", self.root.display()))?;
            self.watching = true;
        }
        Ok(())
    }
}
