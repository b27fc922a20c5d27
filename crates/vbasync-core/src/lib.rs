//! # vbasync
//!
//! Core library for keeping the VBA project embedded in a Visio document in
//! sync with plain-text module files on disk.
//!
//! The host document stays authoritative. This library pulls module bodies
//! out of it (export), pushes edited files back in (import), and watches
//! both sides so that an external editor can be used for day-to-day work.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Core error types for the vbasync library
pub mod error {
    /// Result type alias using `anyhow::Error`
    pub type Result<T> = anyhow::Result<T>;

    pub use crate::host::HostError;
}

/// Text normalization, header stripping, and folder annotations
pub mod source;

/// Diffing and content fingerprints
pub mod comparison;

/// Host-native codepage resolution
pub mod encoding;

/// Documents, module kinds, and file-to-document mapping
pub mod document;

/// Host automation interface and backends
pub mod host;

/// Local module file discovery
pub mod scanner;

/// Configuration file parsing and management
pub mod config;

/// Export and import engines with conflict resolution
pub mod sync;

/// Change watcher coordinating both sync directions
pub mod watch;

/// Breakpoint injection bridge used by the debugger integration
pub mod debug;
