//! Dedicated host worker thread with request/reply channels

use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::host::{ComponentInfo, HostAutomation, HostError};

/// Prefix of the line that replaces a breakpoint location
pub const STOP_PREFIX: &str = "Stop '";

/// Host operations the bridge can run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOp {
    /// Enumerate the components of a document
    ListModules {
        /// Document full path
        document: PathBuf,
    },
    /// Read a module's code body
    ReadCode {
        /// Document full path
        document: PathBuf,
        /// Module name
        module: String,
    },
    /// Replace a line with a `Stop` statement
    InjectBreakpoint {
        /// Document full path
        document: PathBuf,
        /// Module name
        module: String,
        /// 1-based line number
        line: usize,
    },
    /// Put the original line back
    RemoveBreakpoint {
        /// Document full path
        document: PathBuf,
        /// Module name
        module: String,
        /// 1-based line number
        line: usize,
        /// Line text before injection
        original: String,
    },
}

impl BridgeOp {
    /// Short operation name for logs and errors
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ListModules { .. } => "list_modules",
            Self::ReadCode { .. } => "read_code",
            Self::InjectBreakpoint { .. } => "inject_breakpoint",
            Self::RemoveBreakpoint { .. } => "remove_breakpoint",
        }
    }
}

/// Successful result of a [`BridgeOp`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeReply {
    /// Components of the document
    Modules(Vec<ComponentInfo>),
    /// Code body
    Code(String),
    /// Breakpoint injected
    Injected {
        /// Line text before injection
        original: String,
        /// Line the breakpoint ended up on
        line: usize,
    },
    /// Original line restored
    Restored,
}

/// Bridge failures
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// No reply within the allowed time
    #[error("Host operation '{operation}' timed out after {timeout:?}")]
    Timeout {
        /// Operation name
        operation: &'static str,
        /// Time waited
        timeout: Duration,
    },

    /// The worker thread is gone
    #[error("Host bridge is not running")]
    Stopped,

    /// The worker returned a reply of another kind than requested
    #[error("Unexpected reply to '{operation}'")]
    UnexpectedReply {
        /// Operation name
        operation: &'static str,
    },

    /// The host failed the operation
    #[error(transparent)]
    Host(#[from] HostError),
}

struct Request {
    op: BridgeOp,
    reply: Sender<Result<BridgeReply, HostError>>,
}

/// Owns a host on a dedicated thread and serves operations to other threads
///
/// The worker attaches its thread guard once at start and keeps it for its
/// whole life.
pub struct HostBridge<H: HostAutomation + 'static> {
    requests: Option<Sender<Request>>,
    worker: Option<JoinHandle<H>>,
}

impl<H: HostAutomation + 'static> HostBridge<H> {
    /// Start the worker thread
    pub fn start(host: H) -> Self {
        let (tx, rx) = mpsc::channel::<Request>();
        let worker = thread::spawn(move || {
            let mut host = host;
            let _attachment = match host.attach_thread() {
                Ok(attachment) => Some(attachment),
                Err(err) => {
                    tracing::warn!("Host bridge could not attach its thread: {err}");
                    None
                }
            };

            for request in rx {
                let name = request.op.name();
                let result = dispatch(&mut host, request.op);
                if let Err(err) = &result {
                    tracing::error!(operation = name, "Host operation failed: {err}");
                }
                // The caller may have timed out and dropped its receiver
                let _ = request.reply.send(result);
            }
            tracing::debug!("Host bridge stopped");
            host
        });

        Self {
            requests: Some(tx),
            worker: Some(worker),
        }
    }

    /// Run an operation and wait up to `timeout` for its reply
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Timeout`] when no reply arrives in time,
    /// [`BridgeError::Stopped`] when the worker is gone, and
    /// [`BridgeError::Host`] when the host fails the operation.
    pub fn execute(&self, op: BridgeOp, timeout: Duration) -> Result<BridgeReply, BridgeError> {
        let operation = op.name();
        let requests = self.requests.as_ref().ok_or(BridgeError::Stopped)?;
        let (reply_tx, reply_rx) = mpsc::channel();
        requests
            .send(Request {
                op,
                reply: reply_tx,
            })
            .map_err(|_| BridgeError::Stopped)?;

        match reply_rx.recv_timeout(timeout) {
            Ok(result) => Ok(result?),
            Err(RecvTimeoutError::Timeout) => Err(BridgeError::Timeout { operation, timeout }),
            Err(RecvTimeoutError::Disconnected) => Err(BridgeError::Stopped),
        }
    }

    /// Stop the worker and take the host back
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Stopped`] if the worker panicked.
    pub fn shutdown(mut self) -> Result<H, BridgeError> {
        self.requests = None;
        self.worker
            .take()
            .ok_or(BridgeError::Stopped)?
            .join()
            .map_err(|_| BridgeError::Stopped)
    }
}

impl<H: HostAutomation + 'static> Drop for HostBridge<H> {
    fn drop(&mut self) {
        self.requests = None;
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            tracing::error!("Host bridge worker panicked");
        }
    }
}

fn dispatch<H: HostAutomation>(host: &mut H, op: BridgeOp) -> Result<BridgeReply, HostError> {
    match op {
        BridgeOp::ListModules { document } => host.components(&document).map(BridgeReply::Modules),
        BridgeOp::ReadCode { document, module } => {
            host.read_code(&document, &module).map(BridgeReply::Code)
        }
        BridgeOp::InjectBreakpoint {
            document,
            module,
            line,
        } => {
            let original = host.read_line(&document, &module, line)?;
            host.replace_line(
                &document,
                &module,
                line,
                &format!("{STOP_PREFIX}{}", original.trim()),
            )?;
            tracing::debug!(%module, line, "Breakpoint injected");
            Ok(BridgeReply::Injected { original, line })
        }
        BridgeOp::RemoveBreakpoint {
            document,
            module,
            line,
            original,
        } => {
            host.replace_line(&document, &module, line, &original)?;
            tracing::debug!(%module, line, "Breakpoint removed");
            Ok(BridgeReply::Restored)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::document::{Document, DocumentType, ModuleKind};
    use crate::host::{MemoryHost, ThreadAttachment};

    const DRAWING: &str = "C:\\Docs\\Plan.vsdm";

    fn host() -> MemoryHost {
        let mut host = MemoryHost::new();
        host.open_document(DRAWING, DocumentType::Drawing, None).add_module(
            "Module1",
            ModuleKind::Standard,
            "Sub A()\n    x = 1\nEnd Sub",
        );
        host
    }

    #[test]
    fn test_inject_and_restore() {
        let bridge = HostBridge::start(host());
        let timeout = Duration::from_secs(5);

        let reply = bridge
            .execute(
                BridgeOp::InjectBreakpoint {
                    document: PathBuf::from(DRAWING),
                    module: "Module1".to_string(),
                    line: 2,
                },
                timeout,
            )
            .unwrap();
        assert_eq!(
            reply,
            BridgeReply::Injected {
                original: "    x = 1".to_string(),
                line: 2
            }
        );

        let code = bridge
            .execute(
                BridgeOp::ReadCode {
                    document: PathBuf::from(DRAWING),
                    module: "Module1".to_string(),
                },
                timeout,
            )
            .unwrap();
        assert_eq!(code, BridgeReply::Code("Sub A()\nStop 'x = 1\nEnd Sub".to_string()));

        bridge
            .execute(
                BridgeOp::RemoveBreakpoint {
                    document: PathBuf::from(DRAWING),
                    module: "Module1".to_string(),
                    line: 2,
                    original: "    x = 1".to_string(),
                },
                timeout,
            )
            .unwrap();

        let host = bridge.shutdown().unwrap();
        assert_eq!(
            host.document(Path::new(DRAWING)).unwrap().code("Module1").unwrap(),
            "Sub A()\n    x = 1\nEnd Sub"
        );
        assert_eq!(host.active_attachments(), 0);
        assert_eq!(host.total_attachments(), 1);
    }

    #[test]
    fn test_host_error_passes_through() {
        let bridge = HostBridge::start(host());
        let err = bridge
            .execute(
                BridgeOp::ReadCode {
                    document: PathBuf::from(DRAWING),
                    module: "Missing".to_string(),
                },
                Duration::from_secs(5),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Host(HostError::ComponentNotFound { .. })
        ));
    }

    struct SlowHost(Duration);

    impl HostAutomation for SlowHost {
        fn attach_thread(&self) -> Result<ThreadAttachment, HostError> {
            Ok(ThreadAttachment::detached())
        }
        fn is_connected(&self) -> bool {
            true
        }
        fn reconnect(&mut self) -> Result<(), HostError> {
            Ok(())
        }
        fn documents(&self) -> Result<Vec<Document>, HostError> {
            Ok(Vec::new())
        }
        fn components(&self, _document: &Path) -> Result<Vec<ComponentInfo>, HostError> {
            thread::sleep(self.0);
            Ok(Vec::new())
        }
        fn read_code(&self, _document: &Path, _module: &str) -> Result<String, HostError> {
            Ok(String::new())
        }
        fn replace_line(&mut self, _: &Path, _: &str, _: usize, _: &str) -> Result<(), HostError> {
            Ok(())
        }
        fn delete_lines(&mut self, _: &Path, _: &str, _: usize, _: usize) -> Result<(), HostError> {
            Ok(())
        }
        fn add_code(&mut self, _: &Path, _: &str, _: &str) -> Result<(), HostError> {
            Ok(())
        }
        fn remove_component(&mut self, _: &Path, _: &str) -> Result<(), HostError> {
            Ok(())
        }
        fn import_component(&mut self, _: &Path, _: &Path) -> Result<String, HostError> {
            Ok(String::new())
        }
        fn export_component(&self, _: &Path, _: &str, _: &Path) -> Result<(), HostError> {
            Ok(())
        }
    }

    #[test]
    fn test_timeout() {
        let bridge = HostBridge::start(SlowHost(Duration::from_millis(500)));
        let err = bridge
            .execute(
                BridgeOp::ListModules {
                    document: PathBuf::from(DRAWING),
                },
                Duration::from_millis(20),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Timeout {
                operation: "list_modules",
                ..
            }
        ));
    }
}
