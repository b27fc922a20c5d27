//! Content fingerprints using SHA-256
//!
//! Fingerprints are a change-detection shortcut only. Callers must feed the
//! same normalization level every time: raw host text for the project-level
//! skip check, header-stripped and normalized text for file-level checks.

use std::fmt::Write;

use sha2::{Digest, Sha256};

/// A module's name together with its code body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleBody {
    /// Module name as enumerated by the host
    pub name: String,
    /// Code body text
    pub body: String,
}

impl ModuleBody {
    /// Create a new module body
    #[must_use]
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }
}

/// Fingerprint calculator
pub struct Fingerprinter;

impl Fingerprinter {
    /// Digest of a single module
    #[must_use]
    pub fn module_digest(name: &str, body: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update(b":");
        hasher.update(body.as_bytes());
        Self::to_hex(&hasher.finalize())
    }

    /// Digest over every module with a non-empty body, in the given order
    #[must_use]
    pub fn project_digest(modules: &[ModuleBody]) -> String {
        let mut hasher = Sha256::new();
        for module in modules.iter().filter(|m| !m.body.is_empty()) {
            hasher.update(module.name.as_bytes());
            hasher.update(b":");
            hasher.update(module.body.as_bytes());
        }
        Self::to_hex(&hasher.finalize())
    }

    fn to_hex(bytes: &[u8]) -> String {
        let mut out = String::with_capacity(bytes.len() * 2);
        for byte in bytes {
            write!(out, "{byte:02x}").expect("Writing to String should never fail");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<ModuleBody> {
        vec![
            ModuleBody::new("Module1", "Sub A()\nEnd Sub"),
            ModuleBody::new("ThisDocument", ""),
            ModuleBody::new("Class1", "Public X As Long"),
        ]
    }

    #[test]
    fn test_project_digest_stable() {
        assert_eq!(
            Fingerprinter::project_digest(&sample()),
            Fingerprinter::project_digest(&sample())
        );
    }

    #[test]
    fn test_project_digest_changes_with_any_body() {
        let base = Fingerprinter::project_digest(&sample());
        let mut changed = sample();
        changed[2].body.push_str("\nPublic Y As Long");
        assert_ne!(base, Fingerprinter::project_digest(&changed));
    }

    #[test]
    fn test_project_digest_ignores_empty_modules() {
        let mut without_empty = sample();
        without_empty.remove(1);
        assert_eq!(
            Fingerprinter::project_digest(&sample()),
            Fingerprinter::project_digest(&without_empty)
        );
    }

    #[test]
    fn test_project_digest_covers_module_names() {
        let mut renamed = sample();
        renamed[0].name = "Module2".to_string();
        assert_ne!(
            Fingerprinter::project_digest(&sample()),
            Fingerprinter::project_digest(&renamed)
        );
    }

    #[test]
    fn test_module_digest_is_hex() {
        let digest = Fingerprinter::module_digest("M", "x");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(digest, Fingerprinter::module_digest("M", "y"));
    }
}
