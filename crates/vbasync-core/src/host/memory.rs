//! In-process model of the host application
//!
//! Behaves like the real host where the sync engine can tell the difference:
//! code bodies never carry header boilerplate, imports are read in the
//! document's native codepage and named after `Attribute VB_Name`, exports
//! regenerate the header, and the code-behind module cannot be removed.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{ComponentInfo, HostAutomation, HostError, TRUST_CENTER_HINT, ThreadAttachment};
use crate::document::{Document, DocumentType, FORM_RESOURCE_EXTENSION, ModuleKind};
use crate::encoding::Codepage;
use crate::source::strip_header;

static NAME_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?im)^\s*Attribute\s+VB_Name\s*=\s*"([^"]+)""#).expect("valid VB_Name pattern")
});

const FORM_CLASS_ID: &str = "{C62A69F0-16DC-11CE-9E98-00AA00574A4F}";

/// A component held by [`MemoryHost`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryComponent {
    /// Component name
    pub name: String,
    /// Component kind
    pub kind: ModuleKind,
    /// Code lines without header boilerplate
    #[serde(default)]
    pub lines: Vec<String>,
    /// Rejects every modification when set
    #[serde(default)]
    pub locked: bool,
    /// Designer resource written next to exported forms
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<u8>,
}

impl MemoryComponent {
    /// Code body, lines joined with `\n`
    #[must_use]
    pub fn code(&self) -> String {
        self.lines.join("\n")
    }
}

/// A document held by [`MemoryHost`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryDocument {
    /// Name as shown by the host
    pub display_name: String,
    /// Full path reported by the host
    pub full_path: PathBuf,
    /// Drawing, stencil, or template
    #[serde(default)]
    pub document_type: DocumentType,
    /// Recorded language id
    #[serde(default)]
    pub language_id: Option<u32>,
    /// Simulates a trust-center refusal of project access
    #[serde(default)]
    pub access_denied: bool,
    /// VBA components in enumeration order
    #[serde(default)]
    pub components: Vec<MemoryComponent>,
}

impl MemoryDocument {
    /// Add a component with the given code
    pub fn add_module(&mut self, name: &str, kind: ModuleKind, code: &str) -> &mut Self {
        self.components.push(MemoryComponent {
            name: name.to_string(),
            kind,
            lines: code.lines().map(str::to_string).collect(),
            locked: false,
            resource: if kind == ModuleKind::Form {
                name.as_bytes().to_vec()
            } else {
                Vec::new()
            },
        });
        self
    }

    /// Deny or allow access to the VBA project
    pub const fn set_access_denied(&mut self, denied: bool) -> &mut Self {
        self.access_denied = denied;
        self
    }

    /// Lock a component against modification
    pub fn lock_module(&mut self, name: &str) -> &mut Self {
        if let Some(component) = self.component_mut(name) {
            component.locked = true;
        }
        self
    }

    /// Component by name (case-insensitive, like the host)
    #[must_use]
    pub fn component(&self, name: &str) -> Option<&MemoryComponent> {
        self.components
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Mutable component by name
    pub fn component_mut(&mut self, name: &str) -> Option<&mut MemoryComponent> {
        self.components
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Code body of a component
    #[must_use]
    pub fn code(&self, name: &str) -> Option<String> {
        self.component(name).map(MemoryComponent::code)
    }

    fn to_document(&self) -> Document {
        Document {
            display_name: self.display_name.clone(),
            full_path: self.full_path.clone(),
            document_type: self.document_type,
            language_id: self.language_id,
            component_count: self.components.len(),
        }
    }

    fn native_codepage(&self) -> Codepage {
        Codepage::resolve(None, self.language_id).unwrap_or_else(|_| Codepage::fallback())
    }
}

#[derive(Debug, Default)]
struct AttachmentStats {
    active: AtomicUsize,
    total: AtomicUsize,
}

/// In-memory host application
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryHost {
    #[serde(default)]
    documents: Vec<MemoryDocument>,
    #[serde(skip)]
    unreachable: bool,
    #[serde(skip)]
    dropped: bool,
    #[serde(skip)]
    attachments: Arc<AttachmentStats>,
}

impl MemoryHost {
    /// Create a host with no open documents
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a document; the display name is the last path segment
    pub fn open_document(
        &mut self,
        full_path: impl Into<PathBuf>,
        document_type: DocumentType,
        language_id: Option<u32>,
    ) -> &mut MemoryDocument {
        let full_path = full_path.into();
        let raw = full_path.to_string_lossy();
        let display_name = raw
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .to_string();

        self.documents.push(MemoryDocument {
            display_name,
            full_path,
            document_type,
            language_id,
            access_denied: false,
            components: Vec::new(),
        });
        let last = self.documents.len() - 1;
        &mut self.documents[last]
    }

    /// Open documents
    #[must_use]
    pub fn open_documents(&self) -> &[MemoryDocument] {
        &self.documents
    }

    /// Document by full path
    #[must_use]
    pub fn document(&self, full_path: &Path) -> Option<&MemoryDocument> {
        self.documents.iter().find(|d| d.full_path == full_path)
    }

    /// Mutable document by full path
    pub fn document_mut(&mut self, full_path: &Path) -> Option<&mut MemoryDocument> {
        self.documents.iter_mut().find(|d| d.full_path == full_path)
    }

    /// Make the host unreachable (or reachable again)
    pub const fn set_reachable(&mut self, reachable: bool) {
        self.unreachable = !reachable;
    }

    /// Drop the current connection; the next `reconnect` restores it
    pub const fn drop_connection(&mut self) {
        self.dropped = true;
    }

    /// Thread attachments currently held
    #[must_use]
    pub fn active_attachments(&self) -> usize {
        self.attachments.active.load(Ordering::SeqCst)
    }

    /// Thread attachments ever made
    #[must_use]
    pub fn total_attachments(&self) -> usize {
        self.attachments.total.load(Ordering::SeqCst)
    }

    fn ensure_connected(&self) -> Result<(), HostError> {
        if self.unreachable {
            return Err(HostError::NotConnected {
                reason: "host process is not running".to_string(),
            });
        }
        if self.dropped {
            return Err(HostError::NotConnected {
                reason: "connection was lost".to_string(),
            });
        }
        Ok(())
    }

    fn project(&self, document: &Path) -> Result<&MemoryDocument, HostError> {
        self.ensure_connected()?;
        let doc = self.document(document).ok_or_else(|| not_open(self, document))?;
        if doc.access_denied {
            return Err(HostError::ProjectAccessDenied {
                document: doc.display_name.clone(),
                hint: TRUST_CENTER_HINT,
            });
        }
        Ok(doc)
    }

    fn project_mut(&mut self, document: &Path) -> Result<&mut MemoryDocument, HostError> {
        self.project(document)?;
        self.document_mut(document)
            .ok_or_else(|| HostError::DocumentNotOpen {
                path: document.to_path_buf(),
                open: String::new(),
            })
    }

    fn component_mut(
        &mut self,
        document: &Path,
        module: &str,
    ) -> Result<&mut MemoryComponent, HostError> {
        let doc = self.project_mut(document)?;
        let display_name = doc.display_name.clone();
        let component = doc
            .component_mut(module)
            .ok_or_else(|| HostError::ComponentNotFound {
                document: display_name,
                module: module.to_string(),
            })?;
        if component.locked {
            return Err(HostError::ModuleLocked {
                module: component.name.clone(),
            });
        }
        Ok(component)
    }
}

fn not_open(host: &MemoryHost, document: &Path) -> HostError {
    let open: Vec<&str> = host
        .documents
        .iter()
        .map(|d| d.display_name.as_str())
        .collect();
    HostError::DocumentNotOpen {
        path: document.to_path_buf(),
        open: open.join(", "),
    }
}

fn line_index(component: &MemoryComponent, line: usize) -> Result<usize, HostError> {
    line.checked_sub(1)
        .filter(|idx| *idx < component.lines.len())
        .ok_or_else(|| HostError::Rejected {
            operation: "line access",
            reason: format!(
                "line {line} is out of range in '{}' ({} lines)",
                component.name,
                component.lines.len()
            ),
        })
}

fn exported_header(component: &MemoryComponent) -> String {
    let name = &component.name;
    let mut out = String::new();
    match component.kind {
        ModuleKind::Standard => {}
        ModuleKind::Class | ModuleKind::Document => {
            out.push_str("VERSION 1.0 CLASS\r\nBEGIN\r\n  MultiUse = -1  'True\r\nEND\r\n");
        }
        ModuleKind::Form => {
            write!(
                out,
                "VERSION 5.00\r\nBegin {FORM_CLASS_ID} {name} \r\n   Caption         =   \"{name}\"\r\n   ClientHeight    =   3000\r\n   ClientWidth     =   4500\r\nEnd\r\n"
            )
            .expect("Writing to String should never fail");
        }
    }
    write!(out, "Attribute VB_Name = \"{name}\"\r\n").expect("Writing to String should never fail");
    if component.kind != ModuleKind::Standard {
        out.push_str("Attribute VB_GlobalNameSpace = False\r\n");
        out.push_str("Attribute VB_Creatable = False\r\n");
        out.push_str("Attribute VB_PredeclaredId = True\r\n");
        out.push_str("Attribute VB_Exposed = False\r\n");
    }
    out
}

impl HostAutomation for MemoryHost {
    fn attach_thread(&self) -> Result<ThreadAttachment, HostError> {
        self.ensure_connected()?;
        self.attachments.active.fetch_add(1, Ordering::SeqCst);
        self.attachments.total.fetch_add(1, Ordering::SeqCst);
        let stats = Arc::clone(&self.attachments);
        Ok(ThreadAttachment::with_release(move || {
            stats.active.fetch_sub(1, Ordering::SeqCst);
        }))
    }

    fn is_connected(&self) -> bool {
        self.ensure_connected().is_ok()
    }

    fn reconnect(&mut self) -> Result<(), HostError> {
        if self.unreachable {
            return Err(HostError::NotConnected {
                reason: "host process is not running".to_string(),
            });
        }
        if self.dropped {
            tracing::debug!("Reconnected to host");
            self.dropped = false;
        }
        Ok(())
    }

    fn documents(&self) -> Result<Vec<Document>, HostError> {
        self.ensure_connected()?;
        Ok(self.documents.iter().map(MemoryDocument::to_document).collect())
    }

    fn components(&self, document: &Path) -> Result<Vec<ComponentInfo>, HostError> {
        let doc = self.project(document)?;
        Ok(doc
            .components
            .iter()
            .map(|c| ComponentInfo {
                name: c.name.clone(),
                kind: c.kind,
                line_count: c.lines.len(),
            })
            .collect())
    }

    fn read_code(&self, document: &Path, module: &str) -> Result<String, HostError> {
        let doc = self.project(document)?;
        doc.code(module).ok_or_else(|| HostError::ComponentNotFound {
            document: doc.display_name.clone(),
            module: module.to_string(),
        })
    }

    fn replace_line(
        &mut self,
        document: &Path,
        module: &str,
        line: usize,
        text: &str,
    ) -> Result<(), HostError> {
        let component = self.component_mut(document, module)?;
        let idx = line_index(component, line)?;
        component.lines[idx] = text.to_string();
        Ok(())
    }

    fn delete_lines(
        &mut self,
        document: &Path,
        module: &str,
        start: usize,
        count: usize,
    ) -> Result<(), HostError> {
        let component = self.component_mut(document, module)?;
        if count == 0 {
            return Ok(());
        }
        let first = line_index(component, start)?;
        let last = line_index(component, start + count - 1)?;
        component.lines.drain(first..=last);
        Ok(())
    }

    fn add_code(&mut self, document: &Path, module: &str, code: &str) -> Result<(), HostError> {
        let component = self.component_mut(document, module)?;
        component.lines.extend(code.lines().map(str::to_string));
        Ok(())
    }

    fn remove_component(&mut self, document: &Path, module: &str) -> Result<(), HostError> {
        let component = self.component_mut(document, module)?;
        if component.kind == ModuleKind::Document {
            return Err(HostError::Rejected {
                operation: "remove component",
                reason: format!("'{}' is the document's code-behind module", component.name),
            });
        }
        let name = component.name.clone();
        let doc = self.project_mut(document)?;
        doc.components.retain(|c| c.name != name);
        Ok(())
    }

    fn import_component(&mut self, document: &Path, file: &Path) -> Result<String, HostError> {
        let bytes = fs::read(file).map_err(|e| HostError::io(file, e))?;
        let kind = ModuleKind::from_path(file).ok_or_else(|| HostError::Rejected {
            operation: "import component",
            reason: format!("unsupported file type: {}", file.display()),
        })?;

        let doc = self.project_mut(document)?;
        let text = doc.native_codepage().decode(&bytes);

        let name = NAME_ATTRIBUTE
            .captures(&text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .or_else(|| file.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .ok_or_else(|| HostError::Rejected {
                operation: "import component",
                reason: format!("cannot derive a module name from {}", file.display()),
            })?;

        if doc.component(&name).is_some() {
            return Err(HostError::Rejected {
                operation: "import component",
                reason: format!("a component named '{name}' already exists"),
            });
        }

        let resource = if kind == ModuleKind::Form {
            fs::read(file.with_extension(FORM_RESOURCE_EXTENSION)).unwrap_or_default()
        } else {
            Vec::new()
        };

        doc.components.push(MemoryComponent {
            name: name.clone(),
            kind,
            lines: strip_header(&text, false)
                .lines()
                .map(str::to_string)
                .collect(),
            locked: false,
            resource,
        });
        Ok(name)
    }

    fn export_component(
        &self,
        document: &Path,
        module: &str,
        file: &Path,
    ) -> Result<(), HostError> {
        let doc = self.project(document)?;
        let component = doc
            .component(module)
            .ok_or_else(|| HostError::ComponentNotFound {
                document: doc.display_name.clone(),
                module: module.to_string(),
            })?;

        let mut text = exported_header(component);
        for line in &component.lines {
            text.push_str(line);
            text.push_str("\r\n");
        }

        let (bytes, _, _) = doc.native_codepage().encoding().encode(&text);
        fs::write(file, &bytes).map_err(|e| HostError::io(file, e))?;

        if component.kind == ModuleKind::Form {
            let resource = file.with_extension(FORM_RESOURCE_EXTENSION);
            fs::write(&resource, &component.resource).map_err(|e| HostError::io(&resource, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DOC: &str = "C:\\Docs\\Drawing.vsdm";

    fn host() -> MemoryHost {
        let mut host = MemoryHost::new();
        host.open_document(DOC, DocumentType::Drawing, Some(1049))
            .add_module("ThisDocument", ModuleKind::Document, "")
            .add_module("Module1", ModuleKind::Standard, "Sub A()\n  x = 1\nEnd Sub");
        host
    }

    #[test]
    fn test_display_name_from_windows_path() {
        let host = host();
        let docs = host.documents().unwrap();
        assert_eq!(docs[0].display_name, "Drawing.vsdm");
        assert_eq!(docs[0].component_count, 2);
    }

    #[test]
    fn test_line_operations() {
        let mut host = host();
        let doc = Path::new(DOC);

        host.replace_line(doc, "Module1", 2, "  x = 2").unwrap();
        assert_eq!(host.read_line(doc, "Module1", 2).unwrap(), "  x = 2");

        host.delete_lines(doc, "Module1", 1, 3).unwrap();
        assert_eq!(host.read_code(doc, "Module1").unwrap(), "");

        host.add_code(doc, "Module1", "Sub B()\nEnd Sub").unwrap();
        assert_eq!(host.read_code(doc, "Module1").unwrap(), "Sub B()\nEnd Sub");

        assert!(host.replace_line(doc, "Module1", 9, "x").is_err());
    }

    #[test]
    fn test_document_module_cannot_be_removed() {
        let mut host = host();
        let err = host
            .remove_component(Path::new(DOC), "ThisDocument")
            .unwrap_err();
        assert!(matches!(err, HostError::Rejected { .. }));
    }

    #[test]
    fn test_locked_module_rejects_changes() {
        let mut host = host();
        host.document_mut(Path::new(DOC))
            .unwrap()
            .lock_module("Module1");
        let err = host
            .add_code(Path::new(DOC), "Module1", "' x")
            .unwrap_err();
        assert!(matches!(err, HostError::ModuleLocked { .. }));
    }

    #[test]
    fn test_access_denied() {
        let mut host = host();
        host.document_mut(Path::new(DOC))
            .unwrap()
            .set_access_denied(true);
        let err = host.components(Path::new(DOC)).unwrap_err();
        assert!(matches!(err, HostError::ProjectAccessDenied { .. }));
    }

    #[test]
    fn test_export_then_import_uses_native_codepage() {
        let tmp = TempDir::new().unwrap();
        let mut host = host();
        let doc = Path::new(DOC);
        host.add_code(doc, "Module1", "' Привет").unwrap();

        let file = tmp.path().join("Module1.bas");
        host.export_component(doc, "Module1", &file).unwrap();

        let raw = fs::read(&file).unwrap();
        assert!(String::from_utf8(raw.clone()).is_err());
        let decoded = Codepage::from_name("cp1251").unwrap().decode(&raw);
        assert!(decoded.starts_with("Attribute VB_Name = \"Module1\""));

        host.remove_component(doc, "Module1").unwrap();
        let name = host.import_component(doc, &file).unwrap();
        assert_eq!(name, "Module1");
        assert!(host.read_code(doc, "Module1").unwrap().ends_with("' Привет"));
        assert!(!host.read_code(doc, "Module1").unwrap().contains("Attribute"));
    }

    #[test]
    fn test_import_names_from_attribute() {
        let tmp = TempDir::new().unwrap();
        let mut host = host();
        let file = tmp.path().join("whatever.bas");
        fs::write(&file, "Attribute VB_Name = \"Helpers\"\r\nSub H()\r\nEnd Sub\r\n").unwrap();

        let name = host.import_component(Path::new(DOC), &file).unwrap();
        assert_eq!(name, "Helpers");
        assert_eq!(
            host.read_code(Path::new(DOC), "Helpers").unwrap(),
            "Sub H()\nEnd Sub"
        );
    }

    #[test]
    fn test_export_form_writes_resource() {
        let tmp = TempDir::new().unwrap();
        let mut host = host();
        host.document_mut(Path::new(DOC))
            .unwrap()
            .add_module("UserForm1", ModuleKind::Form, "Private Sub UserForm_Click()\nEnd Sub");

        let file = tmp.path().join("UserForm1.frm");
        host.export_component(Path::new(DOC), "UserForm1", &file)
            .unwrap();

        assert!(tmp.path().join("UserForm1.frx").exists());
        let text = fs::read_to_string(&file).unwrap();
        assert_eq!(
            strip_header(&text, false),
            "Private Sub UserForm_Click()\nEnd Sub"
        );
    }

    #[test]
    fn test_attachment_counting() {
        let host = host();
        {
            let _a = host.attach_thread().unwrap();
            let _b = host.attach_thread().unwrap();
            assert_eq!(host.active_attachments(), 2);
        }
        assert_eq!(host.active_attachments(), 0);
        assert_eq!(host.total_attachments(), 2);
    }

    #[test]
    fn test_reconnect_after_drop() {
        let mut host = host();
        host.drop_connection();
        assert!(!host.is_connected());
        host.reconnect().unwrap();
        assert!(host.is_connected());

        host.set_reachable(false);
        assert!(host.reconnect().is_err());
        assert!(host.documents().unwrap_err().is_connection_error());
    }
}
