//! Host to disk export

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use super::conflict::{ConflictDirection, ConflictResolver, ModuleConflict, Resolution};
use super::reporting::{EventKind, SyncReport};
use super::session::{Fingerprints, SyncOptions, relative};
use crate::comparison::{Fingerprinter, ModuleBody};
use crate::document::{Document, FORM_RESOURCE_EXTENSION, LocatorMode, ModuleKind, ModuleLocator};
use crate::encoding::{Codepage, read_utf8_with_fallback};
use crate::error::Result;
use crate::host::{ComponentInfo, HostAutomation, HostError};
use crate::source::{are_different, extract_folder_annotation, strip_header};

/// Result of an export run
#[derive(Debug, Clone, Default)]
pub struct ExportOutcome {
    /// Files written, per document folder name
    pub exported: BTreeMap<String, Vec<PathBuf>>,
    /// Project digests after the export, per document folder name
    pub fingerprints: Fingerprints,
    /// Per-item outcomes
    pub report: SyncReport,
}

impl ExportOutcome {
    /// Total number of files written
    #[must_use]
    pub fn written_count(&self) -> usize {
        self.exported.values().map(Vec::len).sum()
    }
}

/// Pulls module bodies out of the host and writes them to disk
pub struct ExportEngine<'a, H: HostAutomation + ?Sized> {
    pub(super) host: &'a mut H,
    pub(super) locator: &'a ModuleLocator,
    pub(super) options: &'a SyncOptions,
}

impl<'a, H: HostAutomation + ?Sized> ExportEngine<'a, H> {
    /// Create an engine over a host and a locator
    pub const fn new(host: &'a mut H, locator: &'a ModuleLocator, options: &'a SyncOptions) -> Self {
        Self {
            host,
            locator,
            options,
        }
    }

    /// Export every document of the locator's set
    ///
    /// A document whose project digest equals its entry in `previous` only
    /// gets the deletion check.
    ///
    /// # Errors
    ///
    /// Returns an error when the host connection is lost or the document is
    /// no longer open. Anything narrower is recorded in the report.
    pub fn run(
        &mut self,
        previous: &Fingerprints,
        resolver: &mut ConflictResolver<'_>,
    ) -> Result<ExportOutcome> {
        let mut outcome = ExportOutcome::default();
        let locator = self.locator;

        for document in locator.documents().documents() {
            resolver.begin_document();
            let last = previous.get(&document.folder_name()).map(String::as_str);

            if let Err(err) = self.export_document(document, last, resolver, &mut outcome) {
                if super::is_fatal(&err)
                    && !matches!(
                        err.downcast_ref::<HostError>(),
                        Some(HostError::ProjectAccessDenied { .. })
                    )
                {
                    return Err(err);
                }
                outcome.report.record(
                    EventKind::Failed,
                    document.display_name.clone(),
                    Some(format!("{err:#}")),
                );
            }
        }

        Ok(outcome)
    }

    fn export_document(
        &mut self,
        document: &Document,
        last: Option<&str>,
        resolver: &mut ConflictResolver<'_>,
        outcome: &mut ExportOutcome,
    ) -> Result<()> {
        let folder = document.folder_name();
        let (components, bodies) = self.project_bodies(document)?;
        let digest = Fingerprinter::project_digest(&bodies);

        if last == Some(digest.as_str()) {
            tracing::debug!(document = %document.display_name, "No changes since last export");
            self.sync_deletions(document, &components, &bodies, resolver, &mut outcome.report)?;
            outcome.fingerprints.insert(folder, digest);
            return Ok(());
        }

        let codepage = Codepage::resolve(self.options.codepage.as_deref(), document.language_id)?;
        tracing::debug!(
            document = %document.display_name,
            codepage = codepage.name(),
            modules = components.len(),
            "Exporting document"
        );

        let staging = tempfile::tempdir().context("Failed to create export staging directory")?;
        let mut written = Vec::new();

        for (component, body) in components.iter().zip(&bodies) {
            match self.export_module(
                document,
                component,
                &body.body,
                codepage,
                staging.path(),
                resolver,
                &mut outcome.report,
            ) {
                Ok(Some(path)) => written.push(path),
                Ok(None) => {}
                Err(err) if super::is_fatal(&err) => return Err(err),
                Err(err) => {
                    tracing::error!(module = %component.name, "Export failed: {err:#}");
                    outcome.report.record(
                        EventKind::Failed,
                        format!("{}/{}", folder, component.name),
                        Some(format!("{err:#}")),
                    );
                }
            }

            if resolver.is_cancelled() {
                outcome
                    .report
                    .record(EventKind::Cancelled, document.display_name.clone(), None);
                outcome.exported.insert(folder, written);
                return Ok(());
            }
        }

        self.sync_deletions(document, &components, &bodies, resolver, &mut outcome.report)?;

        // Digest of what the host holds now, so the next poll compares like with like
        let (_, after) = self.project_bodies(document)?;
        outcome
            .fingerprints
            .insert(folder.clone(), Fingerprinter::project_digest(&after));
        outcome.exported.insert(folder, written);
        Ok(())
    }

    fn project_bodies(&self, document: &Document) -> Result<(Vec<ComponentInfo>, Vec<ModuleBody>)> {
        let components = self.host.components(&document.full_path)?;
        let mut bodies = Vec::with_capacity(components.len());
        for component in &components {
            let body = self.host.read_code(&document.full_path, &component.name)?;
            bodies.push(ModuleBody::new(component.name.clone(), body));
        }
        Ok((components, bodies))
    }

    #[allow(clippy::too_many_arguments)]
    fn export_module(
        &mut self,
        document: &Document,
        component: &ComponentInfo,
        body: &str,
        codepage: Codepage,
        staging: &Path,
        resolver: &mut ConflictResolver<'_>,
        report: &mut SyncReport,
    ) -> Result<Option<PathBuf>> {
        let folder = match self.locator.mode() {
            LocatorMode::Hierarchical => extract_folder_annotation(body),
            LocatorMode::Flat => None,
        };
        let target =
            self.locator
                .module_path(document, &component.name, component.kind, folder.as_deref());
        let subject = relative(&target, self.locator.root());

        if !codepage.can_encode(body) {
            report.record(
                EventKind::Failed,
                subject,
                Some(format!("contains characters not representable in {}", codepage.name())),
            );
            return Ok(None);
        }

        if target.exists() {
            let local = read_utf8_with_fallback(&target)?;
            if are_different(&local, body) {
                let conflict = ModuleConflict {
                    document: document.display_name.clone(),
                    module: component.name.clone(),
                    path: target.clone(),
                    direction: ConflictDirection::HostToDisk,
                    host_text: body.to_string(),
                    local_text: local,
                };
                match resolver.resolve(&conflict)? {
                    Resolution::Overwrite => {}
                    Resolution::Skip => {
                        report.record(EventKind::Skipped, subject, None);
                        return Ok(None);
                    }
                    Resolution::Cancel => return Ok(None),
                }
            } else if !(component.kind == ModuleKind::Form && self.options.force) {
                report.record(EventKind::Unchanged, subject, None);
                return Ok(None);
            }
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        self.write_module(document, component, codepage, staging, &target)?;
        report.record(EventKind::Written, subject, None);
        Ok(Some(target))
    }

    /// Export through the host, re-encode as UTF-8, strip the header
    fn write_module(
        &self,
        document: &Document,
        component: &ComponentInfo,
        codepage: Codepage,
        staging: &Path,
        target: &Path,
    ) -> Result<()> {
        let staged = staging.join(format!("{}.{}", component.name, component.kind.extension()));
        self.host
            .export_component(&document.full_path, &component.name, &staged)?;

        let raw = fs::read(&staged)
            .with_context(|| format!("Failed to read exported module: {}", staged.display()))?;
        let mut text = strip_header(&codepage.decode(&raw), true);
        text.push('\n');
        fs::write(target, text)
            .with_context(|| format!("Failed to write file: {}", target.display()))?;

        if component.kind == ModuleKind::Form {
            let resource = staged.with_extension(FORM_RESOURCE_EXTENSION);
            if resource.exists() {
                let dest = target.with_extension(FORM_RESOURCE_EXTENSION);
                fs::copy(&resource, &dest)
                    .with_context(|| format!("Failed to copy form resource: {}", dest.display()))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentSet, DocumentType};
    use crate::host::MemoryHost;
    use crate::sync::conflict::FixedPolicy;
    use tempfile::TempDir;

    fn host() -> MemoryHost {
        let mut host = MemoryHost::new();
        host.open_document("C:\\Docs\\Plan.vsdm", DocumentType::Drawing, Some(1033))
            .add_module("Module1", ModuleKind::Standard, "Option Explicit\nSub A()\nEnd Sub")
            .add_module("Class1", ModuleKind::Class, "Public X As Long")
            .add_module("Form1", ModuleKind::Form, "Private Sub UserForm_Click()\nEnd Sub");
        host
    }

    fn locator(host: &MemoryHost, root: &Path, mode: LocatorMode) -> ModuleLocator {
        let set = DocumentSet::discover(host, Path::new("C:\\Docs\\Plan.vsdm")).unwrap();
        ModuleLocator::new(root.to_path_buf(), set, mode)
    }

    #[test]
    fn test_export_writes_stripped_files() {
        let tmp = TempDir::new().unwrap();
        let mut host = host();
        let locator = locator(&host, tmp.path(), LocatorMode::Flat);
        let options = SyncOptions::default();
        let mut policy = FixedPolicy::overwrite();
        let mut resolver = ConflictResolver::new(&mut policy);

        let outcome = ExportEngine::new(&mut host, &locator, &options)
            .run(&Fingerprints::new(), &mut resolver)
            .unwrap();

        assert_eq!(outcome.written_count(), 3);
        let class = fs::read_to_string(tmp.path().join("plan/Class1.cls")).unwrap();
        assert_eq!(class, "Attribute VB_Name = \"Class1\"\nPublic X As Long\n");
        let form = fs::read_to_string(tmp.path().join("plan/Form1.frm")).unwrap();
        assert!(!form.contains("Begin {"));
        assert!(tmp.path().join("plan/Form1.frx").exists());
        assert!(outcome.fingerprints.contains_key("plan"));
    }

    #[test]
    fn test_hierarchical_export_follows_annotation() {
        let tmp = TempDir::new().unwrap();
        let mut host = host();
        host.document_mut(Path::new("C:\\Docs\\Plan.vsdm"))
            .unwrap()
            .add_module(
                "Geometry",
                ModuleKind::Standard,
                "'@Folder(\"Shapes.Math\")\nSub Area()\nEnd Sub",
            );
        let locator = locator(&host, tmp.path(), LocatorMode::Hierarchical);
        let options = SyncOptions {
            hierarchical: true,
            ..SyncOptions::default()
        };
        let mut policy = FixedPolicy::overwrite();
        let mut resolver = ConflictResolver::new(&mut policy);

        ExportEngine::new(&mut host, &locator, &options)
            .run(&Fingerprints::new(), &mut resolver)
            .unwrap();

        assert!(tmp.path().join("plan/Shapes/Math/Geometry.bas").exists());
        assert!(tmp.path().join("plan/Module1.bas").exists());
    }

    #[test]
    fn test_unchanged_form_resource_not_rewritten() {
        let tmp = TempDir::new().unwrap();
        let mut host = host();
        let locator = locator(&host, tmp.path(), LocatorMode::Flat);
        let options = SyncOptions::default();
        let mut policy = FixedPolicy::overwrite();

        let mut resolver = ConflictResolver::new(&mut policy);
        ExportEngine::new(&mut host, &locator, &options)
            .run(&Fingerprints::new(), &mut resolver)
            .unwrap();

        let frx = tmp.path().join("plan/Form1.frx");
        fs::write(&frx, b"edited locally").unwrap();

        let mut resolver = ConflictResolver::new(&mut policy);
        let outcome = ExportEngine::new(&mut host, &locator, &options)
            .run(&Fingerprints::new(), &mut resolver)
            .unwrap();
        assert_eq!(outcome.written_count(), 0);
        assert_eq!(fs::read(&frx).unwrap(), b"edited locally");

        let forced = SyncOptions {
            force: true,
            ..SyncOptions::default()
        };
        let mut resolver = ConflictResolver::new(&mut policy);
        let outcome = ExportEngine::new(&mut host, &locator, &forced)
            .run(&Fingerprints::new(), &mut resolver)
            .unwrap();
        assert_eq!(outcome.written_count(), 1);
        assert_eq!(fs::read(&frx).unwrap(), b"Form1");
    }

    #[test]
    fn test_access_denied_recorded_per_document() {
        let tmp = TempDir::new().unwrap();
        let mut host = host();
        host.open_document("C:\\Docs\\Locked.vssm", DocumentType::Stencil, None)
            .add_module("Secret", ModuleKind::Standard, "Sub S()\nEnd Sub")
            .set_access_denied(true);
        let locator = locator(&host, tmp.path(), LocatorMode::Flat);
        let options = SyncOptions::default();
        let mut policy = FixedPolicy::overwrite();
        let mut resolver = ConflictResolver::new(&mut policy);

        let outcome = ExportEngine::new(&mut host, &locator, &options)
            .run(&Fingerprints::new(), &mut resolver)
            .unwrap();

        assert_eq!(outcome.written_count(), 3);
        let failure = outcome.report.of_kind(EventKind::Failed).next().unwrap();
        assert_eq!(failure.subject, "Locked.vssm");
        assert!(failure.detail.as_deref().unwrap().contains("Trust Center"));
        assert!(!tmp.path().join("locked").exists());
    }

    #[test]
    fn test_lost_connection_aborts() {
        let tmp = TempDir::new().unwrap();
        let mut host = host();
        let locator = locator(&host, tmp.path(), LocatorMode::Flat);
        host.drop_connection();
        let options = SyncOptions::default();
        let mut policy = FixedPolicy::overwrite();
        let mut resolver = ConflictResolver::new(&mut policy);

        let err = ExportEngine::new(&mut host, &locator, &options)
            .run(&Fingerprints::new(), &mut resolver)
            .unwrap_err();
        assert!(err.downcast_ref::<HostError>().is_some());
    }

    #[test]
    fn test_skip_keeps_local_edit() {
        let tmp = TempDir::new().unwrap();
        let mut host = host();
        let locator = locator(&host, tmp.path(), LocatorMode::Flat);
        let options = SyncOptions::default();
        fs::create_dir_all(tmp.path().join("plan")).unwrap();
        let local = "Attribute VB_Name = \"Module1\"\nOption Explicit\nSub A()\n    Debug.Print 1\nEnd Sub\n";
        fs::write(tmp.path().join("plan/Module1.bas"), local).unwrap();

        let mut policy = FixedPolicy::skip();
        let mut resolver = ConflictResolver::new(&mut policy);
        let outcome = ExportEngine::new(&mut host, &locator, &options)
            .run(&Fingerprints::new(), &mut resolver)
            .unwrap();

        assert_eq!(outcome.report.count(EventKind::Skipped), 1);
        assert_eq!(
            fs::read_to_string(tmp.path().join("plan/Module1.bas")).unwrap(),
            local
        );
    }
}
