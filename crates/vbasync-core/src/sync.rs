//! Bidirectional synchronization engine
//!
//! Export pulls module bodies out of the host and writes them as UTF-8
//! files; import pushes edited files back. Both directions share the
//! conflict resolver, and export finishes with a deletion check for local
//! files whose modules are gone from the host.

mod conflict;
mod deletion;
mod export;
mod import;
mod reporting;
mod session;

pub use conflict::{
    Choice, ConflictDirection, ConflictPolicy, ConflictResolver, EditModePolicy, FixedPolicy,
    ModuleConflict, OrphanAction, OrphanSet, Resolution,
};
pub use export::{ExportEngine, ExportOutcome};
pub use import::{ImportEngine, ImportOutcome, RemovalOutcome};
pub use reporting::{EventKind, SyncEvent, SyncReport, SyncReporter};
pub use session::{Fingerprints, SyncOptions, SyncSession};

use crate::host::HostError;

/// Whether an error ends the whole operation instead of a single item
pub(crate) fn is_fatal(err: &anyhow::Error) -> bool {
    err.downcast_ref::<HostError>()
        .is_some_and(HostError::is_connection_error)
}

#[cfg(test)]
mod integration_tests {
    use std::fs;
    use std::path::Path;

    use tempfile::TempDir;

    use super::*;
    use crate::document::{DocumentType, ModuleKind};
    use crate::host::MemoryHost;

    const DRAWING: &str = "C:\\Projects\\Test Drawing.vsdm";

    fn session(root: &Path, options: SyncOptions) -> SyncSession<MemoryHost> {
        let mut host = MemoryHost::new();
        host.open_document(DRAWING, DocumentType::Drawing, Some(1033))
            .add_module("ThisDocument", ModuleKind::Document, "Private Sub Document_Opened()\nEnd Sub")
            .add_module("Module1", ModuleKind::Standard, "Sub One()\nEnd Sub")
            .add_module("Module2", ModuleKind::Standard, "Sub Two()\nEnd Sub");
        SyncSession::new(host, DRAWING, root, options)
    }

    fn set_code(session: &mut SyncSession<MemoryHost>, module: &str, code: &str) {
        let doc = session.host_mut().document_mut(Path::new(DRAWING)).unwrap();
        doc.component_mut(module).unwrap().lines = code.lines().map(str::to_string).collect();
    }

    fn host_code(session: &SyncSession<MemoryHost>, module: &str) -> String {
        session
            .host()
            .document(Path::new(DRAWING))
            .unwrap()
            .code(module)
            .unwrap()
    }

    #[test]
    fn test_export_rewrites_only_changed_module() {
        let tmp = TempDir::new().unwrap();
        let mut session = session(tmp.path(), SyncOptions::default());
        let mut policy = FixedPolicy::overwrite();

        let first = session.export(&mut policy).unwrap();
        assert_eq!(first.written_count(), 3);
        let before = first.fingerprints["test_drawing"].clone();

        let module1 = tmp.path().join("test_drawing/Module1.bas");
        let module2 = tmp.path().join("test_drawing/Module2.bas");
        let untouched = fs::read_to_string(&module1).unwrap();
        let mtime = fs::metadata(&module1).unwrap().modified().unwrap();

        set_code(&mut session, "Module2", "Sub Two()\n    Beep\nEnd Sub");
        let second = session.export(&mut policy).unwrap();

        assert_eq!(second.exported["test_drawing"], vec![module2.clone()]);
        assert_eq!(second.report.count(EventKind::Unchanged), 2);
        assert_eq!(fs::read_to_string(&module1).unwrap(), untouched);
        assert_eq!(fs::metadata(&module1).unwrap().modified().unwrap(), mtime);
        assert!(fs::read_to_string(&module2).unwrap().contains("Beep"));
        assert_ne!(second.fingerprints["test_drawing"], before);
    }

    #[test]
    fn test_export_skips_project_with_same_fingerprint() {
        let tmp = TempDir::new().unwrap();
        let mut session = session(tmp.path(), SyncOptions::default());
        let mut policy = FixedPolicy::overwrite();
        session.export(&mut policy).unwrap();

        // A local edit is not seen as a conflict when the host is unchanged
        let module1 = tmp.path().join("test_drawing/Module1.bas");
        fs::write(&module1, "Sub One()\n    ' local\nEnd Sub\n").unwrap();

        let outcome = session.export(&mut policy).unwrap();
        assert_eq!(outcome.written_count(), 0);
        assert!(outcome.report.events.is_empty());
        assert!(fs::read_to_string(&module1).unwrap().contains("' local"));
    }

    #[test]
    fn test_orphaned_file_kept_by_default() {
        let tmp = TempDir::new().unwrap();
        let mut session = session(tmp.path(), SyncOptions::default());
        let mut policy = FixedPolicy::overwrite();
        session.export(&mut policy).unwrap();

        let orphan = tmp.path().join("test_drawing/Retired.bas");
        fs::write(&orphan, "Sub Retired()\nEnd Sub\n").unwrap();
        set_code(&mut session, "Module1", "Sub One()\n    Beep\nEnd Sub");

        let outcome = session.export(&mut policy).unwrap();
        assert_eq!(outcome.report.count(EventKind::Kept), 1);
        assert!(orphan.exists());

        let summary = SyncReporter::generate_summary(&outcome.report);
        assert!(summary.contains("Kept:      1"));
    }

    #[test]
    fn test_orphan_check_runs_after_fingerprint_match() {
        let tmp = TempDir::new().unwrap();
        let mut session = session(tmp.path(), SyncOptions::default());
        let mut policy = FixedPolicy::overwrite();
        session.export(&mut policy).unwrap();

        let orphan = tmp.path().join("test_drawing/Retired.bas");
        fs::write(&orphan, "Sub Retired()\nEnd Sub\n").unwrap();

        let mut deleting = FixedPolicy::overwrite().with_orphans(OrphanAction::Delete);
        let outcome = session.export(&mut deleting).unwrap();
        assert_eq!(outcome.written_count(), 0);
        assert_eq!(outcome.report.count(EventKind::Deleted), 1);
        assert!(!orphan.exists());
    }

    #[test]
    fn test_edit_mode_import_overwrites_without_prompt() {
        let tmp = TempDir::new().unwrap();
        let mut session = session(tmp.path(), SyncOptions::default());
        let mut policy = FixedPolicy::overwrite();
        session.export(&mut policy).unwrap();

        let file = tmp.path().join("test_drawing/Module1.bas");
        fs::write(
            &file,
            "Attribute VB_Name = \"Module1\"\nSub One()\n    MsgBox \"edited\"\nEnd Sub\n",
        )
        .unwrap();

        let outcome = session.import_file(&file, &mut EditModePolicy).unwrap();
        assert_eq!(
            outcome,
            ImportOutcome::Replaced {
                module: "Module1".to_string()
            }
        );
        assert_eq!(
            host_code(&session, "Module1"),
            "Sub One()\n    MsgBox \"edited\"\nEnd Sub"
        );
    }

    #[test]
    fn test_document_module_requires_force() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("test_drawing/ThisDocument.cls");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(
            &file,
            "VERSION 1.0 CLASS\nBEGIN\n  MultiUse = -1  'True\nEND\nAttribute VB_Name = \"ThisDocument\"\nPrivate Sub Document_Opened()\n    MsgBox \"hi\"\nEnd Sub\n",
        )
        .unwrap();

        let mut refused = session(tmp.path(), SyncOptions::default());
        let outcome = refused.import_file(&file, &mut EditModePolicy).unwrap();
        assert!(matches!(outcome, ImportOutcome::Refused { .. }));
        assert_eq!(
            host_code(&refused, "ThisDocument"),
            "Private Sub Document_Opened()\nEnd Sub"
        );

        let options = SyncOptions {
            force: true,
            ..SyncOptions::default()
        };
        let mut forced = session(tmp.path(), options);
        let outcome = forced.import_file(&file, &mut EditModePolicy).unwrap();
        assert!(matches!(outcome, ImportOutcome::Updated { .. }));
        assert_eq!(
            host_code(&forced, "ThisDocument"),
            "Private Sub Document_Opened()\n    MsgBox \"hi\"\nEnd Sub"
        );
    }

    #[test]
    fn test_folder_annotation_paths() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("test_drawing/Sub1/Sub2/Module1.bas");
        let direct = tmp.path().join("test_drawing/Module1.bas");

        let folder = crate::document::folder_annotation(&nested, "test_drawing").unwrap();
        assert_eq!(crate::source::path_to_annotation(&folder), "Sub1.Sub2");
        assert_eq!(crate::document::folder_annotation(&direct, "test_drawing"), None);
    }

    #[test]
    fn test_hierarchical_round_trip_keeps_layout() {
        let tmp = TempDir::new().unwrap();
        let options = SyncOptions {
            hierarchical: true,
            ..SyncOptions::default()
        };
        let mut session = session(tmp.path(), options);
        let file = tmp.path().join("test_drawing/Sub1/Sub2/Module3.bas");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, "Option Explicit\nSub Three()\nEnd Sub\n").unwrap();

        let outcome = session.import_file(&file, &mut EditModePolicy).unwrap();
        assert!(outcome.is_applied());
        assert!(host_code(&session, "Module3").contains("'@Folder(\"Sub1.Sub2\")"));

        fs::remove_file(&file).unwrap();
        let mut policy = FixedPolicy::overwrite();
        let exported = session.export(&mut policy).unwrap();
        assert!(exported.exported["test_drawing"].contains(&file));
        assert!(file.exists());
    }

    #[test]
    fn test_import_batch_isolates_failures() {
        let tmp = TempDir::new().unwrap();
        let mut session = session(tmp.path(), SyncOptions::default());
        session
            .host_mut()
            .document_mut(Path::new(DRAWING))
            .unwrap()
            .lock_module("Module2");

        let dir = tmp.path().join("test_drawing");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Module2.bas"), "Sub Two()\n    Beep\nEnd Sub\n").unwrap();
        fs::write(dir.join("Module9.bas"), "Sub Nine()\nEnd Sub\n").unwrap();

        let mut policy = FixedPolicy::overwrite();
        let report = session.import_batch(&mut policy).unwrap();

        assert_eq!(report.count(EventKind::Failed), 1);
        assert_eq!(report.count(EventKind::Imported), 1);
        assert_eq!(host_code(&session, "Module9"), "Sub Nine()\nEnd Sub");
    }

    #[test]
    fn test_skip_is_not_a_failure() {
        let tmp = TempDir::new().unwrap();
        let mut session = session(tmp.path(), SyncOptions::default());
        let dir = tmp.path().join("test_drawing");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Module1.bas"), "Sub One()\n    Beep\nEnd Sub\n").unwrap();

        let mut policy = FixedPolicy::skip();
        let report = session.import_batch(&mut policy).unwrap();
        assert_eq!(report.count(EventKind::Skipped), 1);
        assert!(report.is_success());
        assert_eq!(host_code(&session, "Module1"), "Sub One()\nEnd Sub");
    }
}
