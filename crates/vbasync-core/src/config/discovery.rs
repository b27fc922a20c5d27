//! Configuration file discovery from multiple locations

use std::path::{Path, PathBuf};

use crate::error::Result;

/// Project config file name
pub const PROJECT_CONFIG: &str = ".vbasync.toml";

/// Uncommitted per-user project config file name
pub const LOCAL_CONFIG: &str = ".vbasync.local.toml";

/// Configuration file locations in order of precedence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFiles {
    /// Config from CLI flag (highest precedence)
    pub cli: Option<PathBuf>,
    /// Project-local config (`.vbasync.local.toml`)
    pub local: Option<PathBuf>,
    /// Project config (`.vbasync.toml`)
    pub project: Option<PathBuf>,
    /// Global XDG config
    pub global: Option<PathBuf>,
}

impl ConfigFiles {
    /// Discovered files with a label, highest precedence first
    #[must_use]
    pub fn found(&self) -> Vec<(&'static str, &Path)> {
        [
            ("cli", self.cli.as_deref()),
            ("local", self.local.as_deref()),
            ("project", self.project.as_deref()),
            ("global", self.global.as_deref()),
        ]
        .into_iter()
        .filter_map(|(label, path)| path.map(|p| (label, p)))
        .collect()
    }
}

/// Config file discovery
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Discover config files starting from the current directory
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit CLI config path does not exist.
    pub fn discover(cli_path: Option<&Path>) -> Result<ConfigFiles> {
        let start = std::env::current_dir().ok();
        Self::discover_from(cli_path, start.as_deref())
    }

    /// Discover config files searching upwards from `start`
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit CLI config path does not exist.
    pub fn discover_from(cli_path: Option<&Path>, start: Option<&Path>) -> Result<ConfigFiles> {
        let cli = match cli_path {
            Some(path) if path.is_file() => Some(path.to_path_buf()),
            Some(path) => anyhow::bail!("Config file not found: {}", path.display()),
            None => None,
        };

        let local = start.and_then(|dir| Self::find_file(dir, LOCAL_CONFIG));
        let project = start.and_then(|dir| Self::find_file(dir, PROJECT_CONFIG));
        let global = Self::find_global_config();

        let files = ConfigFiles {
            cli,
            local,
            project,
            global,
        };
        tracing::debug!(?files, "Config files discovered");
        Ok(files)
    }

    /// Find a config file in `start` or one of its parents
    fn find_file(start: &Path, name: &str) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    /// Find global config in XDG config directory
    fn find_global_config() -> Option<PathBuf> {
        let global_config = dirs::config_dir()?.join("vbasync").join("config.toml");
        global_config.is_file().then_some(global_config)
    }
}
