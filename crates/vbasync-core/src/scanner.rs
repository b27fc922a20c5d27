//! Module file scanning
//!
//! Three layouts are scanned:
//! - flat: module files directly in a directory
//! - one level: the root plus one level of document folders
//! - recursive: hierarchical folder-annotation trees

use std::path::{Path, PathBuf};

use anyhow::Context;
use walkdir::WalkDir;

use crate::document::ModuleKind;
use crate::error::Result;

/// How deep to look for module files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Only the directory itself
    Flat,
    /// The directory and its immediate subdirectories
    OneLevel,
    /// The whole tree
    Recursive,
}

impl ScanMode {
    const fn max_depth(self) -> usize {
        match self {
            Self::Flat => 1,
            Self::OneLevel => 2,
            Self::Recursive => usize::MAX,
        }
    }
}

/// A module file found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Path of the file
    pub path: PathBuf,
    /// Module name (file stem)
    pub module_name: String,
    /// Kind inferred from the extension
    pub kind: ModuleKind,
}

/// Module file scanner
pub struct Scanner;

impl Scanner {
    /// Find module files under `base`, sorted by path
    ///
    /// A missing directory yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if directory traversal fails.
    pub fn scan(base: &Path, mode: ScanMode) -> Result<Vec<ScannedFile>> {
        if !base.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(base).max_depth(mode.max_depth()).follow_links(false) {
            let entry =
                entry.with_context(|| format!("Failed to scan directory: {}", base.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(file) = Self::classify(entry.path()) {
                files.push(file);
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::debug!(base = %base.display(), count = files.len(), "Scanned module files");
        Ok(files)
    }

    /// Recognise a module file by extension
    #[must_use]
    pub fn classify(path: &Path) -> Option<ScannedFile> {
        let kind = ModuleKind::from_path(path)?;
        let module_name = path.file_stem()?.to_string_lossy().into_owned();
        Some(ScannedFile {
            path: path.to_path_buf(),
            module_name,
            kind,
        })
    }
}
