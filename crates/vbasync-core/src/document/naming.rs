//! Folder names derived from document display names

/// Characters that are not allowed in folder names
const INVALID_CHARS: [char; 10] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*', ' '];

/// Sanitize a document name for use as a folder name
///
/// Strips the extension, replaces invalid characters and spaces with `_`,
/// lowercases, collapses repeated `_`, and trims leading/trailing `_`.
/// Falls back to `"document"` when nothing is left.
#[must_use]
pub fn sanitize_document_name(name: &str) -> String {
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);

    let mut out = String::with_capacity(stem.len());
    for c in stem.chars() {
        let c = if INVALID_CHARS.contains(&c) { '_' } else { c };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.extend(c.to_lowercase());
    }

    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Whether a directory name refers to the given document folder
pub(crate) fn folder_matches(dir_name: &str, folder_name: &str) -> bool {
    dir_name.eq_ignore_ascii_case(folder_name) || sanitize_document_name(dir_name) == folder_name
}
