//! Host documents, module kinds, and the document set of a session
//!
//! A [`Document`] is only observed, never created: documents are discovered by
//! enumerating what the host has open when the session connects.

mod locator;
mod naming;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use locator::{LocatorMode, ModuleLocator, folder_annotation};
pub use naming::sanitize_document_name;

use crate::error::Result;
use crate::host::{HostAutomation, HostError};

/// Kind of a VBA component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleKind {
    /// Standard code module (`.bas`)
    Standard,
    /// Class module (`.cls`)
    Class,
    /// User form (`.frm` plus binary `.frx` resource)
    Form,
    /// Built-in code-behind module of the document (`.cls`)
    Document,
}

impl ModuleKind {
    /// File extension used on disk (without the dot)
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Standard => "bas",
            Self::Class | Self::Document => "cls",
            Self::Form => "frm",
        }
    }

    /// Kind inferred from a file extension
    ///
    /// `.cls` maps to [`ModuleKind::Class`]; whether it is actually the
    /// code-behind module is only known once the host module is looked up.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "bas" => Some(Self::Standard),
            "cls" => Some(Self::Class),
            "frm" => Some(Self::Form),
            _ => None,
        }
    }

    /// Kind inferred from a file path
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Binary resource extension accompanying form files
pub const FORM_RESOURCE_EXTENSION: &str = "frx";

/// Kind of host document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentType {
    /// Drawing (`.vsdx`, `.vsdm`)
    #[default]
    Drawing,
    /// Stencil (`.vssx`, `.vssm`)
    Stencil,
    /// Template (`.vstx`, `.vstm`)
    Template,
}

impl DocumentType {
    /// Human-readable name
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Drawing => "Drawing",
            Self::Stencil => "Stencil",
            Self::Template => "Template",
        }
    }
}

/// A document open in the host process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Name as shown by the host (`Drawing1.vsdm`)
    pub display_name: String,
    /// Full path the host reports for the document
    pub full_path: PathBuf,
    /// Drawing, stencil, or template
    pub document_type: DocumentType,
    /// Recorded language id, used to pick the default codepage
    pub language_id: Option<u32>,
    /// Number of VBA components in the document's project
    pub component_count: usize,
}

impl Document {
    /// Whether the document's project has at least one component
    #[must_use]
    pub const fn has_vba(&self) -> bool {
        self.component_count > 0
    }

    /// Sanitized folder name derived from the display name
    #[must_use]
    pub fn folder_name(&self) -> String {
        sanitize_document_name(&self.display_name)
    }
}

/// The documents a session operates on
#[derive(Debug, Clone)]
pub struct DocumentSet {
    main: Document,
    documents: Vec<Document>,
}

impl DocumentSet {
    /// Discover the main document and every open document with VBA code
    ///
    /// The main document is matched by full path first and by file name
    /// second, since documents opened from synced cloud folders report a
    /// different path than the local one.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::DocumentNotOpen`] if the main document is not open.
    pub fn discover<H: HostAutomation + ?Sized>(host: &H, main_path: &Path) -> Result<Self> {
        let open = host.documents()?;
        let wanted_path = main_path.to_string_lossy().to_lowercase();
        let wanted_name = main_path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let by_path = open
            .iter()
            .find(|d| d.full_path.to_string_lossy().to_lowercase() == wanted_path);
        let main = by_path
            .or_else(|| {
                open.iter()
                    .find(|d| d.display_name.to_lowercase() == wanted_name)
            })
            .cloned();

        let Some(main) = main else {
            let names: Vec<&str> = open.iter().map(|d| d.display_name.as_str()).collect();
            return Err(HostError::DocumentNotOpen {
                path: main_path.to_path_buf(),
                open: names.join(", "),
            }
            .into());
        };

        if by_path.is_none() {
            tracing::debug!(
                expected = %main_path.display(),
                actual = %main.full_path.display(),
                "Main document matched by file name"
            );
        }

        let documents: Vec<Document> = open.into_iter().filter(Document::has_vba).collect();
        tracing::debug!(count = documents.len(), "Documents with VBA discovered");

        Ok(Self { main, documents })
    }

    /// Build a set from already-known documents
    #[must_use]
    pub const fn from_parts(main: Document, documents: Vec<Document>) -> Self {
        Self { main, documents }
    }

    /// The main document named on the command line
    #[must_use]
    pub const fn main(&self) -> &Document {
        &self.main
    }

    /// All documents with VBA code
    #[must_use]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Stencil documents with VBA code
    pub fn stencils(&self) -> impl Iterator<Item = &Document> {
        self.documents
            .iter()
            .filter(|d| d.document_type == DocumentType::Stencil)
    }

    /// Document owning the given sanitized folder name
    #[must_use]
    pub fn by_folder_name(&self, folder: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.folder_name() == folder)
    }

    /// Human-readable summary of the discovered documents
    #[must_use]
    pub fn summary(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        if self.documents.is_empty() {
            out.push_str("No documents with VBA code found\n");
            return out;
        }

        writeln!(out, "Documents with VBA found: {}", self.documents.len())
            .expect("Writing to String should never fail");
        writeln!(
            out,
            "  Main document: {} ({})",
            self.main.display_name,
            self.main.document_type.display_name()
        )
        .expect("Writing to String should never fail");

        let stencils: Vec<&Document> = self.stencils().collect();
        if !stencils.is_empty() {
            writeln!(out, "  Stencils: {}", stencils.len())
                .expect("Writing to String should never fail");
            for stencil in stencils {
                writeln!(out, "    - {}", stencil.display_name)
                    .expect("Writing to String should never fail");
            }
        }

        out
    }
}
