//! Configuration file discovery, parsing, merging, and validation
//!
//! This module handles:
//! - Config file discovery from multiple locations
//! - TOML parsing with serde
//! - Field-level merging with precedence rules
//! - Validation and error reporting

mod discovery;
mod merge;
mod types;
mod validation;

#[cfg(test)]
mod integration_tests;

pub use discovery::{ConfigDiscovery, ConfigFiles};
pub use merge::ConfigMerger;
pub use types::{Config, ConflictStrategy, Settings};
pub use validation::ConfigValidator;

use std::path::Path;

use crate::error::Result;

/// Coordinates discovery, parsing, merging, and validation
pub struct ConfigManager;

impl ConfigManager {
    /// Load and merge configuration from all discovered sources
    ///
    /// # Errors
    ///
    /// Returns an error if a config file cannot be read, parsed, or fails
    /// validation.
    pub fn load(cli_config_path: Option<&Path>) -> Result<Config> {
        let files = ConfigDiscovery::discover(cli_config_path)?;
        Self::load_files(&files)
    }

    /// Merge and validate an explicit set of config files
    ///
    /// # Errors
    ///
    /// Returns an error if a config file cannot be read, parsed, or fails
    /// validation.
    pub fn load_files(files: &ConfigFiles) -> Result<Config> {
        let merged = ConfigMerger::merge(files)?;
        ConfigValidator::validate(&merged)?;
        Ok(merged)
    }
}
