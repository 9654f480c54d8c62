use anyhow::{Context, Result};
use labapi::DEFAULT_BASE_URL;
use reconcile::RetryConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("labstate"))
}

/// Get the default config file path
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

// ============================================================================
// Provider Config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub per_page: u32,
    pub timeout_secs: u64,
    pub read_retry: ReadRetry,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            per_page: 20,
            timeout_secs: 30,
            read_retry: ReadRetry::default(),
        }
    }
}

/// Backoff for reading an object back after mutating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadRetry {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for ReadRetry {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            base_delay_ms: defaults.base_delay.as_millis() as u64,
            backoff_factor: defaults.backoff_factor,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
        }
    }
}

impl From<&ReadRetry> for RetryConfig {
    fn from(retry: &ReadRetry) -> Self {
        Self {
            max_attempts: retry.max_attempts.max(1),
            base_delay: Duration::from_millis(retry.base_delay_ms),
            backoff_factor: retry.backoff_factor,
            max_delay: Duration::from_millis(retry.max_delay_ms),
        }
    }
}

impl ProviderConfig {
    /// Load from `path`, or from the default location when `path` is `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file is
    /// an error.
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(custom) => {
                let expanded = shellexpand::tilde(custom);
                Self::load_from(Path::new(expanded.as_ref()))
            }
            None => {
                let path = default_config_path()?;
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    log::debug!("no config at {}, using defaults", path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load a TOML config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Save as TOML, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Apply command-line and environment overrides. `None` keeps the file
    /// value.
    pub fn with_overrides(mut self, base_url: Option<String>, token: Option<String>) -> Self {
        if let Some(base_url) = base_url {
            self.base_url = base_url;
        }
        if token.is_some() {
            self.token = token;
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::from(&self.read_retry)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::default();
        assert_eq!(config.base_url, "https://gitlab.com/api/v4");
        assert_eq!(config.per_page, 20);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.retry_config(), RetryConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
base_url = "https://gitlab.example.com/api/v4"
per_page = 50

[read_retry]
max_attempts = 3
"#,
        )
        .unwrap();

        let config = ProviderConfig::load_from(&path).unwrap();
        assert_eq!(config.base_url, "https://gitlab.example.com/api/v4");
        assert_eq!(config.per_page, 50);
        assert_eq!(config.timeout_secs, 30);
        assert!(config.token.is_none());

        let retry = config.retry_config();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.base_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = ProviderConfig {
            token: Some("glpat-test".to_string()),
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = ProviderConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        let err = ProviderConfig::load(Some(path.to_str().unwrap())).unwrap_err();
        assert!(err.to_string().contains("Could not read"));
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "per_page = \"many\"").unwrap();
        assert!(ProviderConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = ProviderConfig {
            token: Some("from-file".to_string()),
            ..Default::default()
        };

        let kept = config.clone().with_overrides(None, None);
        assert_eq!(kept.token.as_deref(), Some("from-file"));

        let overridden = config.with_overrides(
            Some("https://self-hosted/api/v4".to_string()),
            Some("from-env".to_string()),
        );
        assert_eq!(overridden.base_url, "https://self-hosted/api/v4");
        assert_eq!(overridden.token.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let retry = ReadRetry {
            max_attempts: 0,
            ..Default::default()
        };
        assert_eq!(RetryConfig::from(&retry).max_attempts, 1);
    }
}
