//! Local files whose modules are gone from the host

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::Context;

use super::conflict::{ConflictResolver, OrphanAction, OrphanSet};
use super::export::ExportEngine;
use super::import::ImportEngine;
use super::reporting::{EventKind, SyncReport};
use super::session::relative;
use crate::comparison::ModuleBody;
use crate::document::{Document, FORM_RESOURCE_EXTENSION, LocatorMode};
use crate::error::Result;
use crate::host::{ComponentInfo, HostAutomation};
use crate::scanner::{ScanMode, Scanner};
use crate::source::extract_folder_annotation;

impl<H: HostAutomation + ?Sized> ExportEngine<'_, H> {
    /// Find orphaned local files of a document and apply the chosen action
    ///
    /// A file is orphaned when no host module maps to its path. In
    /// hierarchical mode that includes the old copy of a module whose
    /// `'@Folder` annotation moved it elsewhere.
    pub(super) fn sync_deletions(
        &mut self,
        document: &Document,
        components: &[ComponentInfo],
        bodies: &[ModuleBody],
        resolver: &mut ConflictResolver<'_>,
        report: &mut SyncReport,
    ) -> Result<()> {
        let dir = self.locator.document_dir(document);
        let mode = match self.locator.mode() {
            LocatorMode::Flat => ScanMode::Flat,
            LocatorMode::Hierarchical => ScanMode::Recursive,
        };
        let expected: HashSet<String> = components
            .iter()
            .zip(bodies)
            .map(|(component, body)| {
                let folder = match self.locator.mode() {
                    LocatorMode::Hierarchical => extract_folder_annotation(&body.body),
                    LocatorMode::Flat => None,
                };
                path_key(&self.locator.module_path(
                    document,
                    &component.name,
                    component.kind,
                    folder.as_deref(),
                ))
            })
            .collect();

        let files: Vec<_> = Scanner::scan(&dir, mode)?
            .into_iter()
            .filter(|f| !expected.contains(&path_key(&f.path)))
            .map(|f| f.path)
            .collect();
        if files.is_empty() {
            return Ok(());
        }

        tracing::debug!(
            document = %document.display_name,
            count = files.len(),
            "Local files without host module"
        );
        let orphans = OrphanSet {
            document: document.display_name.clone(),
            folder: document.folder_name(),
            files,
        };
        let root = self.locator.root();

        match resolver.orphans(&orphans)? {
            OrphanAction::Delete => {
                for file in &orphans.files {
                    match delete_module_file(file) {
                        Ok(()) => report.record(EventKind::Deleted, relative(file, root), None),
                        Err(err) => {
                            tracing::error!(file = %file.display(), "Delete failed: {err:#}");
                            report.record(EventKind::Failed, relative(file, root), Some(format!("{err:#}")));
                        }
                    }
                }
            }
            OrphanAction::Import => {
                let mut importer = ImportEngine::new(&mut *self.host, self.locator, self.options);
                for file in &orphans.files {
                    match importer.create_from_file(document, file) {
                        Ok(name) => report.record(
                            EventKind::Imported,
                            relative(file, root),
                            Some(format!("created {name}")),
                        ),
                        Err(err) if super::is_fatal(&err) => return Err(err),
                        Err(err) => {
                            report.record(EventKind::Failed, relative(file, root), Some(format!("{err:#}")));
                        }
                    }
                }
            }
            OrphanAction::Keep => {
                for file in &orphans.files {
                    report.record(EventKind::Kept, relative(file, root), None);
                }
            }
        }

        Ok(())
    }
}

/// Remove a module file and its form resource
fn delete_module_file(file: &Path) -> Result<()> {
    fs::remove_file(file).with_context(|| format!("Failed to delete file: {}", file.display()))?;
    let resource = file.with_extension(FORM_RESOURCE_EXTENSION);
    if resource.exists() {
        fs::remove_file(&resource)
            .with_context(|| format!("Failed to delete file: {}", resource.display()))?;
    }
    Ok(())
}

/// Case-insensitive comparison key, matching the host's module names
fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}
