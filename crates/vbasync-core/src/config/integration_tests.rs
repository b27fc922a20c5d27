//! Integration tests for configuration module

use std::fs;
use tempfile::TempDir;

use super::{ConfigFiles, ConfigManager, ConflictStrategy};

#[test]
fn test_full_config_workflow() {
    let tmp = TempDir::new().unwrap();
    let config_file = tmp.path().join("config.toml");

    fs::write(
        &config_file,
        r#"
codepage = "cp1251"
hierarchical = true
force_document = false
conflict = "overwrite"
sync_delete = true
bidirectional = false
poll_interval_secs = 2
debounce_ms = 500
"#,
    )
    .unwrap();

    let files = ConfigFiles {
        cli: Some(config_file),
        ..ConfigFiles::default()
    };
    let settings = ConfigManager::load_files(&files).unwrap().settings();

    assert_eq!(settings.codepage.as_deref(), Some("cp1251"));
    assert!(settings.hierarchical);
    assert!(!settings.force_document);
    assert_eq!(settings.conflict, ConflictStrategy::Overwrite);
    assert!(settings.sync_delete);
    assert!(!settings.bidirectional);
    assert_eq!(settings.poll_interval_secs, 2);
    assert_eq!(settings.debounce_ms, 500);
}

#[test]
fn test_invalid_config_validation() {
    let tmp = TempDir::new().unwrap();
    let config_file = tmp.path().join("config.toml");
    fs::write(&config_file, "poll_interval_secs = 0\n").unwrap();

    let files = ConfigFiles {
        project: Some(config_file),
        ..ConfigFiles::default()
    };
    let result = ConfigManager::load_files(&files);

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("poll_interval_secs"));
}

#[test]
fn test_layered_config_validates_merged_result() {
    let tmp = TempDir::new().unwrap();
    let global = tmp.path().join("global.toml");
    fs::write(&global, "codepage = \"nonsense\"\n").unwrap();
    let project = tmp.path().join("project.toml");
    fs::write(&project, "codepage = \"cp1250\"\n").unwrap();

    let files = ConfigFiles {
        project: Some(project),
        global: Some(global),
        ..ConfigFiles::default()
    };
    let config = ConfigManager::load_files(&files).unwrap();
    assert_eq!(config.codepage.as_deref(), Some("cp1250"));
}

#[test]
fn test_load_with_missing_cli_path_fails() {
    let tmp = TempDir::new().unwrap();
    let result = ConfigManager::load(Some(&tmp.path().join("absent.toml")));
    assert!(result.is_err());
}
