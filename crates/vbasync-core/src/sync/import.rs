//! Disk to host import

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tempfile::TempDir;

use super::conflict::{ConflictDirection, ConflictResolver, ModuleConflict, Resolution};
use super::reporting::{EventKind, SyncReport};
use super::session::SyncOptions;
use crate::document::{
    Document, FORM_RESOURCE_EXTENSION, LocatorMode, ModuleKind, ModuleLocator, folder_annotation,
};
use crate::encoding::{Codepage, read_utf8_with_fallback};
use crate::error::Result;
use crate::host::{ComponentInfo, HostAutomation};
use crate::source::{
    are_different, ensure_annotation, ensure_header, module_name_attribute, path_to_annotation,
    strip_header,
};

/// What happened to a single imported file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// New module created in the host
    Created {
        /// Module name assigned by the host
        module: String,
    },
    /// Existing module removed and recreated
    Replaced {
        /// Module name
        module: String,
    },
    /// Code-behind module rewritten in place
    Updated {
        /// Module name
        module: String,
    },
    /// Host already holds the same code
    Unchanged {
        /// Module name
        module: String,
    },
    /// Conflict resolved as skip
    Skipped {
        /// Module name
        module: String,
    },
    /// Conflict resolved as cancel for the document
    Cancelled {
        /// Full path of the cancelled document
        document: PathBuf,
    },
    /// Code-behind module left alone because force is off
    Refused {
        /// Module name
        module: String,
    },
    /// No document owns the file
    Unmapped,
}

impl ImportOutcome {
    /// Whether the host was modified
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(
            self,
            Self::Created { .. } | Self::Replaced { .. } | Self::Updated { .. }
        )
    }

    /// Add this outcome to a report
    pub fn record(&self, report: &mut SyncReport, subject: String) {
        match self {
            Self::Created { .. } | Self::Replaced { .. } | Self::Updated { .. } => {
                report.record(EventKind::Imported, subject, None);
            }
            Self::Unchanged { .. } => report.record(EventKind::Unchanged, subject, None),
            Self::Skipped { .. } => report.record(EventKind::Skipped, subject, None),
            Self::Cancelled { document } => report.record(
                EventKind::Cancelled,
                subject,
                Some(format!("remaining files of {} left alone", document.display())),
            ),
            Self::Refused { module } => report.record(
                EventKind::Refused,
                subject,
                Some(format!("'{module}' is the document module, use --force to replace it")),
            ),
            Self::Unmapped => report.record(EventKind::Unmapped, subject, None),
        }
    }
}

/// What happened to the host module behind a deleted file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// Module removed from the host
    Removed {
        /// Module name
        module: String,
    },
    /// Module already empty, left in place
    Empty {
        /// Module name
        module: String,
    },
    /// Code-behind module, never removed
    Protected {
        /// Module name
        module: String,
    },
    /// The host has no such module
    NotFound,
    /// No document owns the file
    Unmapped,
}

/// Pushes local module files into the host
pub struct ImportEngine<'a, H: HostAutomation + ?Sized> {
    host: &'a mut H,
    locator: &'a ModuleLocator,
    options: &'a SyncOptions,
}

impl<'a, H: HostAutomation + ?Sized> ImportEngine<'a, H> {
    /// Create an engine over a host and a locator
    pub const fn new(host: &'a mut H, locator: &'a ModuleLocator, options: &'a SyncOptions) -> Self {
        Self {
            host,
            locator,
            options,
        }
    }

    /// Import a single file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or encoded, or the host
    /// rejects the change.
    pub fn import_file(
        &mut self,
        path: &Path,
        resolver: &mut ConflictResolver<'_>,
    ) -> Result<ImportOutcome> {
        let locator = self.locator;
        if ModuleKind::from_path(path).is_none() {
            anyhow::bail!("Not a module file: {}", path.display());
        }
        let Some(document) = locator.resolve_document(path) else {
            return Ok(ImportOutcome::Unmapped);
        };
        let module = module_name(path)?;

        let text = read_utf8_with_fallback(path)?;
        let prepared = self.prepare(document, path, &text);

        let components = self.host.components(&document.full_path)?;
        let Some(existing) = find_component(&components, &module) else {
            let created = self.create(document, path, &module, &prepared)?;
            tracing::debug!(module = %created, "Module created");
            return Ok(ImportOutcome::Created { module: created });
        };

        if existing.kind == ModuleKind::Document {
            return self.update_document_module(document, existing, &prepared);
        }

        let host_text = self.host.read_code(&document.full_path, &existing.name)?;
        if !are_different(&prepared, &host_text) {
            return Ok(ImportOutcome::Unchanged {
                module: existing.name.clone(),
            });
        }

        let conflict = ModuleConflict {
            document: document.display_name.clone(),
            module: existing.name.clone(),
            path: path.to_path_buf(),
            direction: ConflictDirection::DiskToHost,
            host_text,
            local_text: prepared.clone(),
        };
        match resolver.resolve(&conflict)? {
            Resolution::Skip => Ok(ImportOutcome::Skipped {
                module: existing.name.clone(),
            }),
            Resolution::Cancel => Ok(ImportOutcome::Cancelled {
                document: document.full_path.clone(),
            }),
            Resolution::Overwrite => {
                let module = self.replace(document, path, existing, &module, &prepared)?;
                Ok(ImportOutcome::Replaced { module })
            }
        }
    }

    /// Create a module from a file without any conflict check
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or encoded, or the host
    /// rejects the import.
    pub fn create_from_file(&mut self, document: &Document, path: &Path) -> Result<String> {
        let module = module_name(path)?;
        let text = read_utf8_with_fallback(path)?;
        let prepared = self.prepare(document, path, &text);
        self.create(document, path, &module, &prepared)
    }

    /// Remove the host module behind a deleted local file
    ///
    /// Empty modules and the code-behind module stay in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the host rejects the removal.
    pub fn remove_for_file(&mut self, path: &Path) -> Result<RemovalOutcome> {
        let locator = self.locator;
        let Some(document) = locator.resolve_document(path) else {
            return Ok(RemovalOutcome::Unmapped);
        };
        let module = module_name(path)?;
        let components = self.host.components(&document.full_path)?;

        let outcome = match find_component(&components, &module) {
            None => RemovalOutcome::NotFound,
            Some(c) if c.kind == ModuleKind::Document => RemovalOutcome::Protected {
                module: c.name.clone(),
            },
            Some(c) if c.line_count == 0 => RemovalOutcome::Empty {
                module: c.name.clone(),
            },
            Some(c) => {
                self.host.remove_component(&document.full_path, &c.name)?;
                RemovalOutcome::Removed {
                    module: c.name.clone(),
                }
            }
        };
        tracing::debug!(file = %path.display(), ?outcome, "Removal processed");
        Ok(outcome)
    }

    /// Inject the folder annotation in hierarchical mode
    fn prepare(&self, document: &Document, path: &Path, text: &str) -> String {
        if self.locator.mode() == LocatorMode::Hierarchical
            && let Some(folder) = folder_annotation(path, &document.folder_name())
        {
            return ensure_annotation(text, &path_to_annotation(&folder));
        }
        text.to_string()
    }

    fn update_document_module(
        &mut self,
        document: &Document,
        existing: &ComponentInfo,
        prepared: &str,
    ) -> Result<ImportOutcome> {
        let module = existing.name.clone();
        if !self.options.force {
            return Ok(ImportOutcome::Refused { module });
        }

        let host_text = self.host.read_code(&document.full_path, &module)?;
        if !are_different(prepared, &host_text) {
            return Ok(ImportOutcome::Unchanged { module });
        }

        if existing.line_count > 0 {
            self.host
                .delete_lines(&document.full_path, &module, 1, existing.line_count)?;
        }
        let body = strip_header(prepared, false);
        if !body.trim().is_empty() {
            self.host.add_code(&document.full_path, &module, &body)?;
        }
        Ok(ImportOutcome::Updated { module })
    }

    /// Import through a staging file in the host codepage
    fn create(
        &mut self,
        document: &Document,
        path: &Path,
        module: &str,
        prepared: &str,
    ) -> Result<String> {
        let staged = self.stage(document, path, module, prepared)?;
        Ok(self.host.import_component(&document.full_path, &staged.file)?)
    }

    /// Swap an existing module for the local file
    ///
    /// The host module is only removed once the replacement is staged and
    /// carries the same name. If the host then rejects the import, the
    /// previous module is imported back from a backup export.
    fn replace(
        &mut self,
        document: &Document,
        path: &Path,
        existing: &ComponentInfo,
        module: &str,
        prepared: &str,
    ) -> Result<String> {
        let staged = self.stage(document, path, module, prepared)?;
        if !staged.name.eq_ignore_ascii_case(&existing.name) {
            anyhow::bail!(
                "{} declares module '{}' but would replace '{}'",
                path.display(),
                staged.name,
                existing.name
            );
        }

        let backup_dir = staged.dir.path().join("backup");
        fs::create_dir(&backup_dir).with_context(|| {
            format!("Failed to create backup directory: {}", backup_dir.display())
        })?;
        let backup = backup_dir.join(format!("{}.{}", existing.name, existing.kind.extension()));
        self.host
            .export_component(&document.full_path, &existing.name, &backup)?;

        self.host
            .remove_component(&document.full_path, &existing.name)?;
        match self.host.import_component(&document.full_path, &staged.file) {
            Ok(name) => Ok(name),
            Err(err) => {
                tracing::error!(module = %existing.name, "Import rejected, restoring previous module: {err}");
                self.host
                    .import_component(&document.full_path, &backup)
                    .with_context(|| format!("Failed to restore module '{}'", existing.name))?;
                Err(err.into())
            }
        }
    }

    /// Write the host-ready file into a fresh staging directory
    fn stage(
        &self,
        document: &Document,
        path: &Path,
        module: &str,
        prepared: &str,
    ) -> Result<StagedModule> {
        let codepage = Codepage::resolve(self.options.codepage.as_deref(), document.language_id)?;
        let text = ensure_header(prepared, module);
        let bytes = codepage
            .encode(&text)
            .with_context(|| format!("Cannot import {}", path.display()))?;

        let dir = tempfile::tempdir().context("Failed to create import staging directory")?;
        let file_name = path
            .file_name()
            .with_context(|| format!("Invalid module path: {}", path.display()))?;
        let file = dir.path().join(file_name);
        fs::write(&file, bytes)
            .with_context(|| format!("Failed to write staging file: {}", file.display()))?;

        if ModuleKind::from_path(path) == Some(ModuleKind::Form) {
            let resource = path.with_extension(FORM_RESOURCE_EXTENSION);
            if resource.exists() {
                fs::copy(&resource, file.with_extension(FORM_RESOURCE_EXTENSION))
                    .with_context(|| format!("Failed to stage form resource: {}", resource.display()))?;
            }
        }

        let name = module_name_attribute(&text).unwrap_or_else(|| module.to_string());
        Ok(StagedModule { dir, file, name })
    }
}

/// Module file in the host codepage, removed with its directory on drop
struct StagedModule {
    dir: TempDir,
    file: PathBuf,
    /// Name the host will give the component
    name: String,
}

fn module_name(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .with_context(|| format!("Invalid module path: {}", path.display()))
}

fn find_component<'c>(components: &'c [ComponentInfo], name: &str) -> Option<&'c ComponentInfo> {
    components.iter().find(|c| c.name.eq_ignore_ascii_case(name))
}
