//! Configuration validation and error reporting

use super::types::Config;
use crate::encoding::encoding_for_codepage;
use crate::error::Result;

/// Largest accepted debounce window
pub const MAX_DEBOUNCE_MS: u64 = 60_000;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(config: &Config) -> Result<()> {
        if let Some(codepage) = &config.codepage
            && encoding_for_codepage(codepage).is_none()
        {
            anyhow::bail!("Unknown codepage in configuration: {codepage}");
        }

        if config.poll_interval_secs == Some(0) {
            anyhow::bail!("poll_interval_secs must be at least 1");
        }

        if let Some(debounce) = config.debounce_ms
            && debounce > MAX_DEBOUNCE_MS
        {
            anyhow::bail!("debounce_ms must not exceed {MAX_DEBOUNCE_MS} (got {debounce})");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_empty_config() {
        assert!(ConfigValidator::validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_unknown_codepage() {
        let config = Config {
            codepage: Some("cp4242".to_string()),
            ..Config::default()
        };
        let err = ConfigValidator::validate(&config).unwrap_err();
        assert!(err.to_string().contains("Unknown codepage"));
    }

    #[test]
    fn test_validate_poll_interval() {
        let config = Config {
            poll_interval_secs: Some(0),
            ..Config::default()
        };
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_validate_debounce_limit() {
        let config = Config {
            debounce_ms: Some(60_001),
            ..Config::default()
        };
        assert!(ConfigValidator::validate(&config).is_err());

        let config = Config {
            debounce_ms: Some(250),
            codepage: Some("windows-1251".to_string()),
            ..Config::default()
        };
        assert!(ConfigValidator::validate(&config).is_ok());
    }
}
