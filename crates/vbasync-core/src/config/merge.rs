//! Configuration merging with precedence rules
//!
//! Every field is optional. Files are applied from lowest to highest
//! precedence and a field set in a later file replaces the earlier value, so
//! a project config can switch off something the global config switched on.

use std::fs;
use std::path::Path;

use anyhow::Context;

use super::discovery::ConfigFiles;
use super::types::Config;
use crate::error::Result;

/// Configuration merger
pub struct ConfigMerger;

impl ConfigMerger {
    /// Merge config files with precedence rules
    ///
    /// Precedence order (highest to lowest):
    /// 1. CLI config
    /// 2. `.vbasync.local.toml`
    /// 3. `.vbasync.toml`
    /// 4. Global config
    ///
    /// # Errors
    ///
    /// Returns an error if config files cannot be read or parsed.
    pub fn merge(files: &ConfigFiles) -> Result<Config> {
        let mut merged = Config::default();

        for path in [&files.global, &files.project, &files.local, &files.cli]
            .into_iter()
            .flatten()
        {
            let layer = Self::load(path)?;
            Self::overlay(&mut merged, layer);
        }

        Ok(merged)
    }

    /// Parse a single config file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Apply every field `layer` sets on top of `base`
    pub fn overlay(base: &mut Config, layer: Config) {
        let Config {
            codepage,
            hierarchical,
            force_document,
            conflict,
            sync_delete,
            bidirectional,
            poll_interval_secs,
            debounce_ms,
        } = layer;

        if codepage.is_some() {
            base.codepage = codepage;
        }
        base.hierarchical = hierarchical.or(base.hierarchical);
        base.force_document = force_document.or(base.force_document);
        base.conflict = conflict.or(base.conflict);
        base.sync_delete = sync_delete.or(base.sync_delete);
        base.bidirectional = bidirectional.or(base.bidirectional);
        base.poll_interval_secs = poll_interval_secs.or(base.poll_interval_secs);
        base.debounce_ms = debounce_ms.or(base.debounce_ms);
    }
}
