//! VBA source text transformations
//!
//! Everything in here is pure string processing:
//! - Normalization for comparisons (trailing whitespace, blank edges)
//! - Removal and re-insertion of IDE-managed header boilerplate
//! - `'@Folder(...)` annotations used by the hierarchical layout

mod annotation;
mod header;
mod normalize;

pub use annotation::{
    annotation_to_path, ensure_annotation, extract_folder_annotation, path_to_annotation,
};
pub use header::{
    MODULE_NAME_ATTRIBUTE, StrippedSource, ensure_header, has_module_name_attribute,
    module_name_attribute, strip_header, strip_header_checked,
};
pub use normalize::normalize;

/// Whether two module texts differ once header boilerplate and cosmetic
/// whitespace are ignored
#[must_use]
pub fn are_different(local: &str, host: &str) -> bool {
    comparable_body(local) != comparable_body(host)
}

/// Header-stripped, normalized body used for every content comparison
#[must_use]
pub fn comparable_body(text: &str) -> String {
    normalize(&strip_header(text, false))
}
