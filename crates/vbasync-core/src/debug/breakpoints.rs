//! Breakpoints as textual `Stop` substitutions

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use super::bridge::{BridgeError, BridgeOp, BridgeReply, HostBridge};
use super::retry::RetryPolicy;
use crate::host::HostAutomation;

/// Default wait for a single bridge operation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// An injected breakpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    /// Module name
    pub module: String,
    /// 1-based line number
    pub line: usize,
    /// Line text before injection
    pub original: String,
}

impl Breakpoint {
    /// `Module:line` identifier
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}:{}", self.module, self.line)
    }
}

/// Result of setting one breakpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointResult {
    /// Requested or actual line
    pub line: usize,
    /// Whether the breakpoint is in place
    pub verified: bool,
    /// Failure reason
    pub message: Option<String>,
}

/// Tracks breakpoints injected into one document
pub struct BreakpointManager<'b, H: HostAutomation + 'static> {
    bridge: &'b HostBridge<H>,
    document: PathBuf,
    timeout: Duration,
    retry: RetryPolicy,
    breakpoints: BTreeMap<(String, usize), Breakpoint>,
}

impl<'b, H: HostAutomation + 'static> BreakpointManager<'b, H> {
    /// Create a manager for a document
    pub fn new(bridge: &'b HostBridge<H>, document: impl Into<PathBuf>) -> Self {
        Self {
            bridge,
            document: document.into(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::once(),
            breakpoints: BTreeMap::new(),
        }
    }

    /// Use a different per-operation timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retry failed bridge operations
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the module's breakpoints with breakpoints at `lines`
    ///
    /// Existing breakpoints of the module are removed first. Lines that
    /// cannot be injected come back unverified.
    pub fn set_breakpoints(&mut self, module: &str, lines: &[usize]) -> Vec<BreakpointResult> {
        self.clear_module(module);

        lines
            .iter()
            .map(|&line| match self.inject(module, line) {
                Ok(breakpoint) => {
                    let result = BreakpointResult {
                        line: breakpoint.line,
                        verified: true,
                        message: None,
                    };
                    tracing::debug!(id = %breakpoint.id(), "Breakpoint set");
                    self.breakpoints
                        .insert((module.to_string(), breakpoint.line), breakpoint);
                    result
                }
                Err(err) => {
                    tracing::warn!(module, line, "Failed to set breakpoint: {err}");
                    BreakpointResult {
                        line,
                        verified: false,
                        message: Some(err.to_string()),
                    }
                }
            })
            .collect()
    }

    fn inject(&self, module: &str, line: usize) -> Result<Breakpoint, BridgeError> {
        let reply = self.retry.run(|_| {
            self.bridge.execute(
                BridgeOp::InjectBreakpoint {
                    document: self.document.clone(),
                    module: module.to_string(),
                    line,
                },
                self.timeout,
            )
        })?;

        match reply {
            BridgeReply::Injected { original, line } => Ok(Breakpoint {
                module: module.to_string(),
                line,
                original,
            }),
            _ => Err(BridgeError::UnexpectedReply {
                operation: "inject_breakpoint",
            }),
        }
    }

    /// Remove one breakpoint and restore its line
    ///
    /// Returns `false` if no such breakpoint is tracked or the host refused
    /// the restore; in the latter case the breakpoint stays tracked.
    pub fn remove_breakpoint(&mut self, module: &str, line: usize) -> bool {
        let key = (module.to_string(), line);
        let Some(breakpoint) = self.breakpoints.get(&key) else {
            tracing::warn!(module, line, "Breakpoint not found");
            return false;
        };

        let op = BridgeOp::RemoveBreakpoint {
            document: self.document.clone(),
            module: breakpoint.module.clone(),
            line,
            original: breakpoint.original.clone(),
        };
        match self.retry.run(|_| self.bridge.execute(op.clone(), self.timeout)) {
            Ok(_) => {
                self.breakpoints.remove(&key);
                true
            }
            Err(err) => {
                tracing::error!(module, line, "Failed to remove breakpoint: {err}");
                false
            }
        }
    }

    fn clear_module(&mut self, module: &str) {
        let lines: Vec<usize> = self
            .breakpoints
            .keys()
            .filter(|(m, _)| m == module)
            .map(|(_, line)| *line)
            .collect();
        for line in lines {
            self.remove_breakpoint(module, line);
        }
    }

    /// Remove every tracked breakpoint
    pub fn clear_all(&mut self) {
        let keys: Vec<(String, usize)> = self.breakpoints.keys().cloned().collect();
        for (module, line) in keys {
            self.remove_breakpoint(&module, line);
        }
        tracing::debug!("Cleared all breakpoints");
    }

    /// Breakpoint at a location
    #[must_use]
    pub fn get(&self, module: &str, line: usize) -> Option<&Breakpoint> {
        self.breakpoints.get(&(module.to_string(), line))
    }

    /// All tracked breakpoints
    pub fn all(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.values()
    }
}
