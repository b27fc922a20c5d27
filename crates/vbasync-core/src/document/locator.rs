//! Mapping between local file paths and the documents that own them

use std::path::{Path, PathBuf};

use super::naming::folder_matches;
use super::{Document, DocumentSet, ModuleKind};

/// How far up the tree the hierarchical mapper looks for a document folder
const MAX_ANCESTOR_DEPTH: usize = 16;

/// Directory layout under the output root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocatorMode {
    /// `<root>/<document>/<Module>.<ext>`
    #[default]
    Flat,
    /// `<root>/<document>/<folder annotation path>/<Module>.<ext>`
    Hierarchical,
}

/// Resolves owning documents for files and target paths for modules
#[derive(Debug, Clone)]
pub struct ModuleLocator {
    root: PathBuf,
    mode: LocatorMode,
    documents: DocumentSet,
}

impl ModuleLocator {
    /// Create a locator over the given output root
    #[must_use]
    pub const fn new(root: PathBuf, documents: DocumentSet, mode: LocatorMode) -> Self {
        Self {
            root,
            mode,
            documents,
        }
    }

    /// Output root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory layout mode
    #[must_use]
    pub const fn mode(&self) -> LocatorMode {
        self.mode
    }

    /// Documents known to this locator
    #[must_use]
    pub const fn documents(&self) -> &DocumentSet {
        &self.documents
    }

    /// Directory holding a document's module files
    #[must_use]
    pub fn document_dir(&self, document: &Document) -> PathBuf {
        self.root.join(document.folder_name())
    }

    /// Target path for a module
    ///
    /// `folder` is the slash-joined annotation path; it is only honoured in
    /// hierarchical mode.
    #[must_use]
    pub fn module_path(
        &self,
        document: &Document,
        name: &str,
        kind: ModuleKind,
        folder: Option<&str>,
    ) -> PathBuf {
        let mut dir = self.document_dir(document);
        if self.mode == LocatorMode::Hierarchical
            && let Some(folder) = folder
        {
            for part in folder.split('/').filter(|p| !p.is_empty() && *p != "..") {
                dir.push(part);
            }
        }
        dir.join(format!("{name}.{}", kind.extension()))
    }

    /// Resolve the document a file belongs to
    ///
    /// Flat mode matches the immediate parent directory and falls back to the
    /// main document. Hierarchical mode walks up through ancestors and returns
    /// `None` on a miss instead of guessing.
    #[must_use]
    pub fn resolve_document(&self, file: &Path) -> Option<&Document> {
        match self.mode {
            LocatorMode::Flat => {
                let parent = file
                    .parent()
                    .and_then(Path::file_name)
                    .map(|n| n.to_string_lossy());
                let matched = parent.and_then(|dir| self.match_folder(&dir));
                if matched.is_none() {
                    tracing::debug!(
                        file = %file.display(),
                        "No document folder matched, using main document"
                    );
                }
                matched.or_else(|| self.main_in_set())
            }
            LocatorMode::Hierarchical => {
                let found = file
                    .ancestors()
                    .skip(1)
                    .take(MAX_ANCESTOR_DEPTH)
                    .take_while(|dir| *dir != self.root)
                    .filter_map(Path::file_name)
                    .find_map(|dir| self.match_folder(&dir.to_string_lossy()));
                if found.is_none() {
                    tracing::warn!(file = %file.display(), "No owning document found");
                }
                found
            }
        }
    }

    fn match_folder(&self, dir_name: &str) -> Option<&Document> {
        self.documents
            .documents()
            .iter()
            .find(|d| folder_matches(dir_name, &d.folder_name()))
    }

    fn main_in_set(&self) -> Option<&Document> {
        let main = self.documents.main();
        self.documents
            .documents()
            .iter()
            .find(|d| d.full_path == main.full_path)
            .or(Some(main))
    }
}

/// Sub-path between a document's folder and the file's directory
///
/// Returns the slash-joined path, or `None` when the file sits directly in
/// the document folder or no ancestor matches the document folder.
#[must_use]
pub fn folder_annotation(file: &Path, document_folder_name: &str) -> Option<String> {
    let mut parts = Vec::new();

    for dir in file.ancestors().skip(1).take(MAX_ANCESTOR_DEPTH) {
        let name = dir.file_name()?.to_string_lossy();
        if folder_matches(&name, document_folder_name) {
            if parts.is_empty() {
                return None;
            }
            parts.reverse();
            return Some(parts.join("/"));
        }
        parts.push(name.into_owned());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentType;
    use crate::source::path_to_annotation;

    fn doc(name: &str) -> Document {
        Document {
            display_name: name.to_string(),
            full_path: PathBuf::from(format!("/docs/{name}")),
            document_type: DocumentType::Drawing,
            language_id: None,
            component_count: 1,
        }
    }

    fn locator(mode: LocatorMode) -> ModuleLocator {
        let main = doc("DocA.vsdm");
        let set = DocumentSet::from_parts(main.clone(), vec![main, doc("Stencil B.vssm")]);
        ModuleLocator::new(PathBuf::from("/root"), set, mode)
    }

    #[test]
    fn test_flat_resolves_parent_folder() {
        let locator = locator(LocatorMode::Flat);
        let found = locator
            .resolve_document(Path::new("/root/stencil_b/Module1.bas"))
            .unwrap();
        assert_eq!(found.display_name, "Stencil B.vssm");
    }

    #[test]
    fn test_flat_falls_back_to_main() {
        let locator = locator(LocatorMode::Flat);
        let found = locator.resolve_document(Path::new("/root/Module1.bas")).unwrap();
        assert_eq!(found.display_name, "DocA.vsdm");
    }

    #[test]
    fn test_hierarchical_walks_ancestors() {
        let locator = locator(LocatorMode::Hierarchical);
        let found = locator
            .resolve_document(Path::new("/root/stencil_b/Folder/Sub/Module.bas"))
            .unwrap();
        assert_eq!(found.display_name, "Stencil B.vssm");
    }

    #[test]
    fn test_hierarchical_miss_is_none() {
        let locator = locator(LocatorMode::Hierarchical);
        assert!(locator.resolve_document(Path::new("/root/Other/Module.bas")).is_none());
        assert!(locator.resolve_document(Path::new("/root/Module.bas")).is_none());
    }

    #[test]
    fn test_module_path_layouts() {
        let flat = locator(LocatorMode::Flat);
        let hier = locator(LocatorMode::Hierarchical);
        let doc = doc("DocA.vsdm");

        assert_eq!(
            flat.module_path(&doc, "Module1", ModuleKind::Standard, Some("A/B")),
            PathBuf::from("/root/doca/Module1.bas")
        );
        assert_eq!(
            hier.module_path(&doc, "Module1", ModuleKind::Standard, Some("A/B")),
            PathBuf::from("/root/doca/A/B/Module1.bas")
        );
        assert_eq!(
            hier.module_path(&doc, "Class1", ModuleKind::Class, None),
            PathBuf::from("/root/doca/Class1.cls")
        );
    }

    #[test]
    fn test_folder_annotation_nested() {
        let path = Path::new("/root/DocA/Sub1/Sub2/Module1.bas");
        let annotation = folder_annotation(path, "doca").unwrap();
        assert_eq!(annotation, "Sub1/Sub2");
        assert_eq!(path_to_annotation(&annotation), "Sub1.Sub2");
    }

    #[test]
    fn test_folder_annotation_document_root() {
        assert_eq!(folder_annotation(Path::new("/root/DocA/Module1.bas"), "doca"), None);
    }

    #[test]
    fn test_folder_annotation_unrelated() {
        assert_eq!(folder_annotation(Path::new("/root/Other/Module1.bas"), "doca"), None);
    }
}
