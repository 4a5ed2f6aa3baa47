//! Configuration for the citation validation pass.
//!
//! The embedding pipeline normally constructs [`ValidationConfig`] in code and
//! passes it to [`CitationPipeline::new`]; TOML round-tripping and `CITEMEND_*`
//! environment overrides are provided for deployments that keep the knobs in a
//! settings file.
//!
//! ```rust
//! use citemend_core::ValidationConfig;
//!
//! let mut config = ValidationConfig::default();
//! config.max_attempts = 5;
//! assert!(config.enabled);
//! ```
//!
//! [`CitationPipeline::new`]: crate::CitationPipeline::new

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Knobs for the validation/repair pass.
///
/// All fields have conservative defaults; `..Default::default()` is the
/// expected construction style for overriding one or two of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Whether URL validation runs at all.
    ///
    /// When disabled, extracted citations pass through with only scheme
    /// normalization and renumbering.
    pub enabled: bool,

    /// Maximum alternative-search attempts per citation needing repair.
    pub max_attempts: usize,

    /// Timeout for each HTTP reachability check, in seconds.
    pub timeout_secs: u64,

    /// User-Agent header sent on validation requests.
    pub user_agent: String,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            timeout_secs: 8,
            user_agent: concat!("citemend/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ValidationConfig {
    /// Per-request HTTP timeout as a [`Duration`].
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Load configuration from a TOML file, then apply environment overrides.
    ///
    /// A missing file yields the defaults (still with overrides applied); a
    /// malformed file is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;
            toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as pretty-printed TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write config: {e}")))?;

        Ok(())
    }

    /// Apply `CITEMEND_*` environment variable overrides in place.
    ///
    /// Recognized: `CITEMEND_ENABLED`, `CITEMEND_MAX_ATTEMPTS`,
    /// `CITEMEND_TIMEOUT_SECS`, `CITEMEND_USER_AGENT`. Unparseable values are
    /// ignored with a warning rather than failing the load.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("CITEMEND_ENABLED") {
            match value.parse::<bool>() {
                Ok(parsed) => self.enabled = parsed,
                Err(_) => tracing::warn!(%value, "ignoring unparseable CITEMEND_ENABLED"),
            }
        }
        if let Ok(value) = std::env::var("CITEMEND_MAX_ATTEMPTS") {
            match value.parse::<usize>() {
                Ok(parsed) => self.max_attempts = parsed,
                Err(_) => tracing::warn!(%value, "ignoring unparseable CITEMEND_MAX_ATTEMPTS"),
            }
        }
        if let Ok(value) = std::env::var("CITEMEND_TIMEOUT_SECS") {
            match value.parse::<u64>() {
                Ok(parsed) => self.timeout_secs = parsed,
                Err(_) => tracing::warn!(%value, "ignoring unparseable CITEMEND_TIMEOUT_SECS"),
            }
        }
        if let Ok(value) = std::env::var("CITEMEND_USER_AGENT") {
            if !value.trim().is_empty() {
                self.user_agent = value;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be at least 1".into()));
        }
        if self.user_agent.trim().is_empty() {
            return Err(Error::Config("user_agent must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ValidationConfig::default();
        assert!(config.enabled);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.timeout_secs, 8);
        assert!(config.user_agent.starts_with("citemend/"));
        assert_eq!(config.http_timeout(), Duration::from_secs(8));
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("citemend.toml");

        let config = ValidationConfig {
            enabled: false,
            max_attempts: 5,
            timeout_secs: 12,
            user_agent: "test-agent/1.0".to_string(),
        };
        config.save(&path).unwrap();

        let loaded = ValidationConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.toml");

        let config = ValidationConfig::load_from(&path).unwrap();
        assert_eq!(config, ValidationConfig::default());
    }

    #[test]
    fn test_load_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "max_attempts = \"three\"").unwrap();

        let err = ValidationConfig::load_from(&path).unwrap_err();
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        fs::write(&path, "max_attempts = 7\n").unwrap();

        let config = ValidationConfig::load_from(&path).unwrap();
        assert_eq!(config.max_attempts, 7);
        assert_eq!(config.timeout_secs, 8);
        assert!(config.enabled);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zero.toml");
        fs::write(&path, "timeout_secs = 0\n").unwrap();

        let err = ValidationConfig::load_from(&path).unwrap_err();
        assert_eq!(err.category(), "config");
    }
}
