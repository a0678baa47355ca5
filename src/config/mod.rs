//! Configuration module
//!
//! Runner tunables with defaults, overridable from a config file, from
//! `FITNESSE_RUNNER_*` environment variables and from the command line.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::{find_config_file, CONFIG_LOCATIONS};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::retry::RetryOptions;

/// Default report file name
pub const DEFAULT_FILE_NAME: &str = "tests-results.xml";

/// Runner configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Seconds to wait for a free executor, and for the final drain
    pub pool_wait_timeout_secs: u64,

    /// Retry budget for the suite listing
    pub discovery_retry: RetryOptions,

    /// Retry budget for page properties and test runs
    pub test_retry: RetryOptions,

    /// Reruns of a page whose result reports failures or errors
    pub failed_test_retries: u32,

    /// Pause before rerunning a failing page, in milliseconds
    pub failed_test_retry_timeout_ms: u64,

    /// HTTP request timeout in seconds
    pub http_timeout_secs: u64,

    /// Report file name
    pub file_name: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            pool_wait_timeout_secs: 600,
            discovery_retry: RetryOptions::discovery(),
            test_retry: RetryOptions::test_execution(),
            failed_test_retries: 3,
            failed_test_retry_timeout_ms: 5_000,
            // FitNesse answers a suite run only when it is done
            http_timeout_secs: 1_800,
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if file::is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Defaults, overlaid with the first config file found, then the environment
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let env = EnvConfig::load();

        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| env.config_file.as_deref().map(file::expand_path))
            .or_else(find_config_file);

        let mut config = match path {
            Some(path) => {
                tracing::debug!("Loading config from {}", path.display());
                Self::load(&path)?
            }
            None => Self::default(),
        };

        env.apply_to(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if file::is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.pool_wait_timeout_secs == 0 {
            anyhow::bail!("pool_wait_timeout_secs must be greater than 0");
        }
        if self.http_timeout_secs == 0 {
            anyhow::bail!("http_timeout_secs must be greater than 0");
        }
        if self.file_name.trim().is_empty() {
            anyhow::bail!("file_name must not be empty");
        }

        for (name, retry) in [
            ("discovery_retry", &self.discovery_retry),
            ("test_retry", &self.test_retry),
        ] {
            if retry.min_timeout_ms > retry.max_timeout_ms {
                anyhow::bail!(
                    "{}: min_timeout_ms ({}) is greater than max_timeout_ms ({})",
                    name,
                    retry.min_timeout_ms,
                    retry.max_timeout_ms
                );
            }
        }

        Ok(())
    }

    /// Example configuration written by `config init`
    pub fn example() -> Self {
        Self {
            discovery_retry: RetryOptions::discovery().with_randomize(true),
            test_retry: RetryOptions::test_execution().with_randomize(true),
            ..Self::default()
        }
    }

    pub fn pool_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_wait_timeout_secs)
    }

    pub fn failed_test_retry_timeout(&self) -> Duration {
        Duration::from_millis(self.failed_test_retry_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert_eq!(config.pool_wait_timeout(), Duration::from_secs(600));
        assert_eq!(config.discovery_retry.retries, 5);
        assert_eq!(config.discovery_retry.min_timeout_ms, 5_000);
        assert_eq!(config.test_retry.max_timeout_ms, 30_000);
        assert_eq!(config.failed_test_retries, 3);
        assert_eq!(config.failed_test_retry_timeout(), Duration::from_secs(5));
        assert_eq!(config.file_name, "tests-results.xml");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runner.yaml");

        let config = RunnerConfig::example();
        config.save(&path).unwrap();

        let loaded = RunnerConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_save_load_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("runner.json");

        let config = RunnerConfig {
            failed_test_retries: 1,
            ..Default::default()
        };
        config.save(&path).unwrap();

        assert_eq!(RunnerConfig::load(&path).unwrap().failed_test_retries, 1);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runner.yml");
        std::fs::write(&path, "pool_wait_timeout_secs: 30\ntest_retry:\n  retries: 2\n").unwrap();

        let config = RunnerConfig::load(&path).unwrap();
        assert_eq!(config.pool_wait_timeout_secs, 30);
        assert_eq!(config.test_retry.retries, 2);
        assert_eq!(config.test_retry.min_timeout_ms, 1_000);
        assert_eq!(config.failed_test_retries, 3);
    }

    #[test]
    fn test_validate_rejects_inverted_backoff() {
        let mut config = RunnerConfig::default();
        config.discovery_retry.min_timeout_ms = 20_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("discovery_retry"));
    }

    #[test]
    fn test_validate_rejects_zero_pool_wait() {
        let config = RunnerConfig {
            pool_wait_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
