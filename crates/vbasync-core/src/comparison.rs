//! Content comparison between host modules and local files
//!
//! This module provides read-only analysis:
//! - Fingerprints over a module or a whole project (SHA-256)
//! - Unified diffs between two normalized module bodies

mod diff;
mod hash;

pub use diff::{DiffGenerator, DiffLabels};
pub use hash::{Fingerprinter, ModuleBody};
