//! Timer-driven host to disk export

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::{WatchEvent, lock};
use crate::error::Result;
use crate::host::HostAutomation;
use crate::sync::{ExportOutcome, FixedPolicy, SyncSession};

const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Something that can stop and restart delivering filesystem events
pub trait Pausable {
    /// Stop delivering events
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying watcher refuses.
    fn pause(&mut self) -> Result<()>;

    /// Start delivering events again
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying watcher refuses.
    fn resume(&mut self) -> Result<()>;
}

/// Raises the exporting flag and pauses the observer until dropped
pub struct ExportGate<'a> {
    flag: &'a AtomicBool,
    observer: &'a mut dyn Pausable,
    grace: Duration,
}

impl<'a> ExportGate<'a> {
    /// Enter the export section
    ///
    /// # Errors
    ///
    /// Returns an error if the observer cannot be paused; the flag is
    /// cleared again in that case.
    pub fn enter(flag: &'a AtomicBool, observer: &'a mut dyn Pausable, grace: Duration) -> Result<Self> {
        flag.store(true, Ordering::SeqCst);
        if let Err(err) = observer.pause() {
            flag.store(false, Ordering::SeqCst);
            return Err(err);
        }
        Ok(Self {
            flag,
            observer,
            grace,
        })
    }
}

impl Drop for ExportGate<'_> {
    fn drop(&mut self) {
        if !self.grace.is_zero() {
            thread::sleep(self.grace);
        }
        if let Err(err) = self.observer.resume() {
            tracing::warn!("Failed to resume file watching: {err:#}");
        }
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Periodic host poll
pub struct HostPoller {
    exporting: Arc<AtomicBool>,
    grace: Duration,
}

impl HostPoller {
    /// Create a poller sharing the exporting flag with the file handler
    #[must_use]
    pub const fn new(exporting: Arc<AtomicBool>, grace: Duration) -> Self {
        Self { exporting, grace }
    }

    /// One poll: reconnect if needed and export with overwrite
    ///
    /// Local files are overwritten without asking since the host is the
    /// source of truth while watching; orphaned files are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the host stays unreachable or the export fails
    /// at connection level.
    pub fn cycle<H: HostAutomation>(
        &self,
        session: &mut SyncSession<H>,
        observer: &mut dyn Pausable,
    ) -> Result<ExportOutcome> {
        let _gate = ExportGate::enter(&self.exporting, observer, self.grace)?;
        session.reconnect()?;
        let _attachment = session.host().attach_thread()?;

        let mut policy = FixedPolicy::overwrite();
        session.export(&mut policy)
    }

    /// Poll until `stop` is raised
    ///
    /// A failed cycle is reported and the next one runs on schedule.
    pub(super) fn run<H: HostAutomation, P: Pausable>(
        &self,
        session: &Mutex<SyncSession<H>>,
        observer: &Mutex<P>,
        stop: &AtomicBool,
        interval: Duration,
        events: &Sender<WatchEvent>,
    ) {
        while wait(interval, stop) {
            let result = lock(session, "session").and_then(|mut session| {
                let mut observer = lock(observer, "observer")?;
                self.cycle(&mut session, &mut *observer)
            });

            let event = match result {
                Ok(outcome) if outcome.report.events.is_empty() => continue,
                Ok(outcome) => WatchEvent::Exported(outcome.report),
                Err(err) => {
                    tracing::warn!("Host poll failed: {err:#}");
                    WatchEvent::Failed {
                        context: "Host poll".to_string(),
                        error: format!("{err:#}"),
                    }
                }
            };
            if events.send(event).is_err() {
                break;
            }
        }
        tracing::debug!("Host poller stopped");
    }
}

/// Sleep for `interval`, returning `false` early once `stop` is raised
fn wait(interval: Duration, stop: &AtomicBool) -> bool {
    let mut remaining = interval;
    while !remaining.is_zero() {
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        let step = remaining.min(STOP_CHECK_INTERVAL);
        thread::sleep(step);
        remaining -= step;
    }
    !stop.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tempfile::TempDir;

    use super::*;
    use crate::document::{DocumentType, ModuleKind};
    use crate::host::MemoryHost;
    use crate::sync::SyncOptions;

    const DRAWING: &str = "C:\\Docs\\Plan.vsdm";

    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
        fail_pause: bool,
    }

    impl Pausable for Recorder {
        fn pause(&mut self) -> Result<()> {
            if self.fail_pause {
                anyhow::bail!("cannot pause");
            }
            self.calls.push("pause");
            Ok(())
        }

        fn resume(&mut self) -> Result<()> {
            self.calls.push("resume");
            Ok(())
        }
    }

    fn session(root: &Path) -> SyncSession<MemoryHost> {
        let mut host = MemoryHost::new();
        host.open_document(DRAWING, DocumentType::Drawing, None)
            .add_module("Module1", ModuleKind::Standard, "Sub A()\nEnd Sub");
        SyncSession::new(host, DRAWING, root, SyncOptions::default())
    }

    #[test]
    fn test_cycle_pauses_and_resumes() {
        let tmp = TempDir::new().unwrap();
        let mut session = session(tmp.path());
        let flag = Arc::new(AtomicBool::new(false));
        let poller = HostPoller::new(Arc::clone(&flag), Duration::ZERO);
        let mut observer = Recorder::default();

        let outcome = poller.cycle(&mut session, &mut observer).unwrap();

        assert_eq!(outcome.written_count(), 1);
        assert_eq!(observer.calls, vec!["pause", "resume"]);
        assert!(!flag.load(Ordering::SeqCst));
        assert_eq!(session.host().active_attachments(), 0);
        assert_eq!(session.host().total_attachments(), 1);
    }

    #[test]
    fn test_cycle_reconnects_after_drop() {
        let tmp = TempDir::new().unwrap();
        let mut session = session(tmp.path());
        session.host_mut().drop_connection();
        let poller = HostPoller::new(Arc::new(AtomicBool::new(false)), Duration::ZERO);

        let outcome = poller
            .cycle(&mut session, &mut Recorder::default())
            .unwrap();
        assert_eq!(outcome.written_count(), 1);
        assert!(session.host().is_connected());
    }

    #[test]
    fn test_failed_cycle_still_resumes() {
        let tmp = TempDir::new().unwrap();
        let mut session = session(tmp.path());
        session.host_mut().set_reachable(false);
        let flag = Arc::new(AtomicBool::new(false));
        let poller = HostPoller::new(Arc::clone(&flag), Duration::ZERO);
        let mut observer = Recorder::default();

        assert!(poller.cycle(&mut session, &mut observer).is_err());
        assert_eq!(observer.calls, vec!["pause", "resume"]);
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_gate_clears_flag_when_pause_fails() {
        let flag = AtomicBool::new(false);
        let mut observer = Recorder {
            fail_pause: true,
            ..Recorder::default()
        };
        assert!(ExportGate::enter(&flag, &mut observer, Duration::ZERO).is_err());
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_second_cycle_skips_unchanged_project() {
        let tmp = TempDir::new().unwrap();
        let mut session = session(tmp.path());
        let poller = HostPoller::new(Arc::new(AtomicBool::new(false)), Duration::ZERO);

        poller.cycle(&mut session, &mut Recorder::default()).unwrap();
        let second = poller.cycle(&mut session, &mut Recorder::default()).unwrap();
        assert_eq!(second.written_count(), 0);
        assert!(second.report.events.is_empty());
    }

    #[test]
    fn test_wait_returns_early_on_stop() {
        let stop = AtomicBool::new(true);
        assert!(!wait(Duration::from_secs(30), &stop));
    }
}
