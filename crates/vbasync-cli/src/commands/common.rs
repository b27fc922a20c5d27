//! Common types and utilities for command execution

use std::path::{Path, PathBuf};

use anyhow::Context;
use dialoguer::console::Term;
use vbasync_core::config::{Config, ConfigManager, ConfigMerger, ConfigValidator, ConflictStrategy, Settings};
use vbasync_core::host::{HostError, SnapshotHost};
use vbasync_core::sync::{
    ConflictPolicy, EventKind, FixedPolicy, OrphanAction, SyncOptions, SyncReport, SyncReporter,
    SyncSession,
};

use crate::cli::{OrphanMode, SyncArgs};
use crate::interactive::InteractivePrompter;

/// Options shared by every command
pub struct CommandOptions<'a> {
    /// Path to custom config file
    pub config_path: Option<&'a Path>,
    /// Skip loading all config files
    pub no_config: bool,
    /// Host state file
    pub host_state: Option<&'a Path>,
}

impl<'a> CommandOptions<'a> {
    /// Create new command options
    #[must_use]
    pub const fn new(
        config_path: Option<&'a Path>,
        no_config: bool,
        host_state: Option<&'a Path>,
    ) -> Self {
        Self {
            config_path,
            no_config,
            host_state,
        }
    }

    /// Load configuration from files
    ///
    /// # Errors
    ///
    /// Returns an error if a config file cannot be loaded or is invalid.
    pub fn load_config(&self) -> anyhow::Result<Config> {
        if self.no_config {
            return Ok(Config::default());
        }
        ConfigManager::load(self.config_path)
    }

    /// Effective settings: config files with CLI flags on top
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be loaded or the result is
    /// invalid.
    pub fn settings(&self, cli_layer: Config) -> anyhow::Result<Settings> {
        let mut config = self.load_config()?;
        ConfigMerger::overlay(&mut config, cli_layer);
        ConfigValidator::validate(&config)?;
        Ok(config.settings())
    }

    /// Connect to the host
    ///
    /// # Errors
    ///
    /// Returns [`HostError::NotConnected`] if no host state is given or it
    /// cannot be loaded.
    pub fn connect(&self) -> anyhow::Result<SnapshotHost> {
        let Some(path) = self.host_state else {
            return Err(HostError::NotConnected {
                reason: "no host state given (use --host-state or VBASYNC_HOST_STATE)"
                    .to_string(),
            }
            .into());
        };

        SnapshotHost::load(path).map_err(|e| {
            anyhow::Error::from(HostError::NotConnected {
                reason: format!("{e:#}"),
            })
        })
    }

    /// Connect and open a session on `root`
    ///
    /// # Errors
    ///
    /// Returns an error if the host is unreachable.
    pub fn open_session(
        &self,
        sync: &SyncArgs,
        root: &Path,
        settings: &Settings,
    ) -> anyhow::Result<SyncSession<SnapshotHost>> {
        let host = self.connect()?;
        Ok(SyncSession::new(
            host,
            &sync.file,
            root,
            SyncOptions::from_settings(settings),
        ))
    }
}

impl SyncArgs {
    /// Config layer holding the flags given on the command line
    #[must_use]
    pub fn config_layer(&self) -> Config {
        Config {
            codepage: self.codepage.clone(),
            hierarchical: self.hierarchical.then_some(true),
            force_document: self.force.then_some(true),
            conflict: self.conflict.map(Into::into),
            ..Config::default()
        }
    }
}

/// Absolute directory, defaulting to the current one
///
/// # Errors
///
/// Returns an error if the current directory cannot be determined.
pub fn resolve_dir(dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = dir.unwrap_or_else(|| Path::new("."));
    std::path::absolute(dir)
        .with_context(|| format!("Failed to resolve directory: {}", dir.display()))
}

/// Conflict policy for a one-shot command
///
/// Prompts need a terminal; without one, conflicts are skipped.
pub fn conflict_policy(
    strategy: ConflictStrategy,
    orphans: Option<OrphanMode>,
) -> Box<dyn ConflictPolicy> {
    let orphans: Option<OrphanAction> = orphans.map(Into::into);

    match FixedPolicy::from_strategy(strategy) {
        Some(policy) => Box::new(policy.with_orphans(orphans.unwrap_or_default())),
        None if Term::stderr().is_term() => Box::new(InteractivePrompter::new(orphans)),
        None => {
            tracing::warn!("No terminal for conflict prompts, conflicts will be skipped");
            Box::new(FixedPolicy::skip().with_orphans(orphans.unwrap_or_default()))
        }
    }
}

/// Print every event that did something, unchanged items left out
pub fn print_events(report: &SyncReport) {
    for event in &report.events {
        match event.kind {
            EventKind::Unchanged => {}
            EventKind::Failed => eprintln!("{event}"),
            _ => println!("{event}"),
        }
    }
}

/// Print the events followed by the summary
pub fn print_report(report: &SyncReport) {
    print_events(report);
    println!("{}", SyncReporter::generate_summary(report));
}
