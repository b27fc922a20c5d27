//! A sync session: one host connection, one main document, one output tree

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use super::conflict::{ConflictPolicy, ConflictResolver};
use super::export::{ExportEngine, ExportOutcome};
use super::import::{ImportEngine, ImportOutcome, RemovalOutcome};
use super::reporting::{EventKind, SyncReport};
use crate::config::Settings;
use crate::document::{DocumentSet, LocatorMode, ModuleLocator};
use crate::error::Result;
use crate::host::HostAutomation;
use crate::scanner::{ScanMode, Scanner};

/// Last known project digest per document folder name
pub type Fingerprints = BTreeMap<String, String>;

/// Options shared by the export and import engines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Explicit host codepage
    pub codepage: Option<String>,
    /// Folder-annotation layout
    pub hierarchical: bool,
    /// Replace the code-behind module on import and re-export unchanged
    /// form resources
    pub force: bool,
}

impl SyncOptions {
    /// Options from effective settings
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            codepage: settings.codepage.clone(),
            hierarchical: settings.hierarchical,
            force: settings.force_document,
        }
    }

    /// Locator mode matching the layout
    #[must_use]
    pub const fn locator_mode(&self) -> LocatorMode {
        if self.hierarchical {
            LocatorMode::Hierarchical
        } else {
            LocatorMode::Flat
        }
    }
}

/// Host connection plus everything needed to sync one document tree
///
/// All host calls of a session go through `&mut self`, so two engines can
/// never touch the same module collection at once.
pub struct SyncSession<H: HostAutomation> {
    host: H,
    main_document: PathBuf,
    root: PathBuf,
    options: SyncOptions,
    fingerprints: Fingerprints,
}

impl<H: HostAutomation> SyncSession<H> {
    /// Create a session
    pub fn new(
        host: H,
        main_document: impl Into<PathBuf>,
        root: impl Into<PathBuf>,
        options: SyncOptions,
    ) -> Self {
        Self {
            host,
            main_document: main_document.into(),
            root: root.into(),
            options,
            fingerprints: Fingerprints::new(),
        }
    }

    /// Host connection
    pub const fn host(&self) -> &H {
        &self.host
    }

    /// Mutable host connection
    pub const fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Output/input directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the main document
    #[must_use]
    pub fn main_document(&self) -> &Path {
        &self.main_document
    }

    /// Engine options
    #[must_use]
    pub const fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Fingerprints recorded by the last exports
    #[must_use]
    pub const fn fingerprints(&self) -> &Fingerprints {
        &self.fingerprints
    }

    /// Create the root directory and switch to its canonical path
    ///
    /// File watchers report canonical paths, which must line up with the
    /// root for document resolution.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or resolved.
    pub fn canonicalize_root(&mut self) -> Result<&Path> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create directory: {}", self.root.display()))?;
        self.root = dunce::canonicalize(&self.root)
            .with_context(|| format!("Failed to resolve directory: {}", self.root.display()))?;
        Ok(&self.root)
    }

    /// Discover the documents currently open in the host
    ///
    /// # Errors
    ///
    /// Returns an error if the host is unreachable or the main document is
    /// not open.
    pub fn documents(&self) -> Result<DocumentSet> {
        DocumentSet::discover(&self.host, &self.main_document)
    }

    /// Locator over freshly discovered documents
    ///
    /// # Errors
    ///
    /// Returns an error if document discovery fails.
    pub fn locator(&self) -> Result<ModuleLocator> {
        Ok(ModuleLocator::new(
            self.root.clone(),
            self.documents()?,
            self.options.locator_mode(),
        ))
    }

    /// Reconnect to the host if the connection was lost
    ///
    /// # Errors
    ///
    /// Returns an error if the host is still unreachable.
    pub fn reconnect(&mut self) -> Result<()> {
        if !self.host.is_connected() {
            tracing::debug!("Connection lost, reconnecting");
            self.host.reconnect()?;
        }
        Ok(())
    }

    /// Export every document, skipping unchanged projects
    ///
    /// # Errors
    ///
    /// Returns an error on connection-level failures. Per-module failures
    /// are recorded in the outcome's report.
    pub fn export(&mut self, policy: &mut dyn ConflictPolicy) -> Result<ExportOutcome> {
        let locator = self.locator()?;
        let mut resolver = ConflictResolver::new(policy);
        let outcome = ExportEngine::new(&mut self.host, &locator, &self.options)
            .run(&self.fingerprints, &mut resolver)?;

        self.fingerprints
            .extend(outcome.fingerprints.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(outcome)
    }

    /// Import a single local file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the host rejects it.
    pub fn import_file(
        &mut self,
        path: &Path,
        policy: &mut dyn ConflictPolicy,
    ) -> Result<ImportOutcome> {
        let locator = self.locator()?;
        let mut resolver = ConflictResolver::new(policy);
        ImportEngine::new(&mut self.host, &locator, &self.options).import_file(path, &mut resolver)
    }

    /// Import every module file under the root
    ///
    /// Failures of single files are recorded and the batch moves on. Once a
    /// document is cancelled its remaining files are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery or scanning fails.
    pub fn import_batch(&mut self, policy: &mut dyn ConflictPolicy) -> Result<SyncReport> {
        let locator = self.locator()?;
        let mode = match locator.mode() {
            LocatorMode::Flat => ScanMode::OneLevel,
            LocatorMode::Hierarchical => ScanMode::Recursive,
        };
        let files = Scanner::scan(&self.root, mode)?;
        tracing::debug!(count = files.len(), "Module files to import");

        let mut resolver = ConflictResolver::new(policy);
        let mut engine = ImportEngine::new(&mut self.host, &locator, &self.options);
        let mut report = SyncReport::default();
        let mut cancelled: HashSet<PathBuf> = HashSet::new();

        for file in &files {
            let subject = relative(&file.path, &self.root);

            if let Some(document) = locator.resolve_document(&file.path) {
                if cancelled.contains(&document.full_path) {
                    report.record(
                        EventKind::Skipped,
                        subject,
                        Some(format!("{} was cancelled", document.display_name)),
                    );
                    continue;
                }
                resolver.begin_document();
            }

            match engine.import_file(&file.path, &mut resolver) {
                Ok(outcome) => {
                    if let ImportOutcome::Cancelled { document } = &outcome {
                        cancelled.insert(document.clone());
                    }
                    outcome.record(&mut report, subject);
                }
                Err(err) if super::is_fatal(&err) => return Err(err),
                Err(err) => {
                    tracing::error!(file = %file.path.display(), "Import failed: {err:#}");
                    report.record(EventKind::Failed, subject, Some(format!("{err:#}")));
                }
            }
        }

        Ok(report)
    }

    /// Remove the host module backing a deleted local file
    ///
    /// # Errors
    ///
    /// Returns an error if the host rejects the removal.
    pub fn remove_module_for(&mut self, path: &Path) -> Result<RemovalOutcome> {
        let locator = self.locator()?;
        ImportEngine::new(&mut self.host, &locator, &self.options).remove_for_file(path)
    }
}

/// Path relative to `root` for display
pub(super) fn relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
