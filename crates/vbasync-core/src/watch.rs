//! Change watcher coordinating both sync directions
//!
//! File events (disk to host) are handled on the calling thread. The host
//! poll (host to disk) runs on its own thread. Both go through the shared
//! session lock, and the poll additionally pauses the file observer and
//! raises the exporting flag so that its own writes are not read back as
//! edits.

mod handler;
mod poller;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

pub use handler::{FileChange, FileEventHandler, Observer};
pub use poller::{ExportGate, HostPoller, Pausable};

use crate::config::Settings;
use crate::error::Result;
use crate::host::HostAutomation;
use crate::sync::{EditModePolicy, ImportOutcome, RemovalOutcome, SyncReport, SyncSession};

const EVENT_TICK: Duration = Duration::from_millis(200);

/// Default settle time after an export before file events are watched again
pub const DEFAULT_GRACE: Duration = Duration::from_millis(500);

/// Watcher timing and behaviour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    /// Window for ignoring repeated events on the same file
    pub debounce: Duration,
    /// Time between host polls
    pub poll_interval: Duration,
    /// Poll the host at all
    pub bidirectional: bool,
    /// Remove host modules when their files are deleted
    pub sync_delete: bool,
    /// Settle time after each export
    pub grace: Duration,
}

impl WatchOptions {
    /// Options from effective settings
    #[must_use]
    pub const fn from_settings(settings: &Settings) -> Self {
        Self {
            debounce: Duration::from_millis(settings.debounce_ms),
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
            bidirectional: settings.bidirectional,
            sync_delete: settings.sync_delete,
            grace: DEFAULT_GRACE,
        }
    }
}

/// Something the watcher did
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// A local file was pushed into the host
    Imported {
        /// Changed file
        path: PathBuf,
        /// Import result
        outcome: ImportOutcome,
    },
    /// A local deletion was applied to the host
    Removed {
        /// Deleted file
        path: PathBuf,
        /// Removal result
        outcome: RemovalOutcome,
    },
    /// The host poll exported changes
    Exported(SyncReport),
    /// A change or poll failed; watching continues
    Failed {
        /// What was being done
        context: String,
        /// Error chain
        error: String,
    },
}

/// Runs both sync directions until stopped
pub struct ChangeWatcher<H: HostAutomation> {
    session: Arc<Mutex<SyncSession<H>>>,
    options: WatchOptions,
    exporting: Arc<AtomicBool>,
}

impl<H: HostAutomation + 'static> ChangeWatcher<H> {
    /// Create a watcher over a session
    pub fn new(session: SyncSession<H>, options: WatchOptions) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            options,
            exporting: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared session
    #[must_use]
    pub fn session(&self) -> Arc<Mutex<SyncSession<H>>> {
        Arc::clone(&self.session)
    }

    /// Watch until `stop` is raised, reporting every action to `on_event`
    ///
    /// # Errors
    ///
    /// Returns an error if the file observer cannot be started.
    pub fn run(&self, stop: &Arc<AtomicBool>, mut on_event: impl FnMut(&WatchEvent)) -> Result<()> {
        let root = lock(&self.session, "session")?
            .canonicalize_root()?
            .to_path_buf();

        let (fs_tx, fs_rx) = mpsc::channel();
        let observer = Arc::new(Mutex::new(Observer::start(&root, fs_tx)?));
        let (event_tx, event_rx) = mpsc::channel();

        let poll_thread = if self.options.bidirectional {
            let session = Arc::clone(&self.session);
            let observer = Arc::clone(&observer);
            let stop = Arc::clone(stop);
            let poller = HostPoller::new(Arc::clone(&self.exporting), self.options.grace);
            let interval = self.options.poll_interval;
            Some(thread::spawn(move || {
                poller.run(&session, &observer, &stop, interval, &event_tx);
            }))
        } else {
            drop(event_tx);
            None
        };

        tracing::debug!(root = %root.display(), "Watching for changes");
        let mut handler = FileEventHandler::new(
            self.options.debounce,
            self.options.sync_delete,
            Arc::clone(&self.exporting),
        );

        while !stop.load(Ordering::SeqCst) {
            match fs_rx.recv_timeout(EVENT_TICK) {
                Ok(Ok(event)) => {
                    for change in handler.accept(&event, Instant::now()) {
                        on_event(&self.apply(change));
                    }
                }
                Ok(Err(err)) => tracing::warn!("File watcher error: {err}"),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            while let Ok(event) = event_rx.try_recv() {
                on_event(&event);
            }
        }

        if let Some(handle) = poll_thread
            && handle.join().is_err()
        {
            tracing::error!("Host poller panicked");
        }
        tracing::debug!("Watcher stopped");
        Ok(())
    }

    /// Push one local change into the host
    pub fn apply(&self, change: FileChange) -> WatchEvent {
        let path = change.path().to_path_buf();
        self.try_apply(change).unwrap_or_else(|err| {
            tracing::error!(file = %path.display(), "Failed to apply change: {err:#}");
            WatchEvent::Failed {
                context: path.display().to_string(),
                error: format!("{err:#}"),
            }
        })
    }

    fn try_apply(&self, change: FileChange) -> Result<WatchEvent> {
        let mut session = lock(&self.session, "session")?;
        session.reconnect()?;
        let _attachment = session.host().attach_thread()?;

        match change {
            FileChange::Modified(path) => {
                let outcome = session.import_file(&path, &mut EditModePolicy)?;
                Ok(WatchEvent::Imported { path, outcome })
            }
            FileChange::Removed(path) => {
                let outcome = session.remove_module_for(&path)?;
                Ok(WatchEvent::Removed { path, outcome })
            }
        }
    }
}

pub(crate) fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| anyhow::anyhow!("The {what} lock is poisoned"))
}
