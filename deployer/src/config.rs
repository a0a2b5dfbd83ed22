//! Configuration loading for the deployer
//!
//! Configuration is loaded from:
//! 1. An explicit path (`--config` or `DEPLOYER_CONFIG`)
//! 2. `~/.config/deployer/deployer.toml`
//! 3. Default values
//!
//! A handful of environment variables override individual fields
//! afterwards: `GITHUB_API_URL`, `GITHUB_TOKEN`, `DEPLOYER_DOMAIN` and
//! `DEPLOYER_USER`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::history::HISTORY_LIMIT;
use crate::retry::RetryPolicy;

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployerConfig {
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub hosting: HostingConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// GitHub endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// REST API base, used for tree listings
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Raw content host
    #[serde(default = "default_raw_url")]
    pub raw_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Optional token for the tree API (raises rate limits)
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

/// Per-file download retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

/// Where sites are staged and published
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostingConfig {
    /// Public domain sites are served under (`https://{name}.{domain}`)
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Directory in which deployment working directories are created
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: PathBuf,
    /// Directory the publisher exposes, one entry per subdomain
    #[serde(default = "default_sites_dir")]
    pub sites_dir: PathBuf,
}

/// Deployment history storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Records kept, newest first
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

/// Local sign-in settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Username to deploy as; when unset the user is prompted
    #[serde(default)]
    pub username: Option<String>,
}

// Default value functions
fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_raw_url() -> String {
    "https://raw.githubusercontent.com".to_string()
}

fn default_user_agent() -> String {
    concat!("deployer/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1500
}

fn default_domain() -> String {
    "site.localhost".to_string()
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("deployer")
}

fn default_workspace_dir() -> PathBuf {
    data_dir().join("workspace")
}

fn default_sites_dir() -> PathBuf {
    data_dir().join("sites")
}

fn default_db_path() -> PathBuf {
    data_dir().join("history.db")
}

fn default_history_limit() -> usize {
    HISTORY_LIMIT
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            raw_url: default_raw_url(),
            user_agent: default_user_agent(),
            timeout_seconds: default_timeout(),
            token: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl Default for HostingConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            workspace_dir: default_workspace_dir(),
            sites_dir: default_sites_dir(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            limit: default_history_limit(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }
}

impl DeployerConfig {
    /// Load configuration from file or use defaults, then apply env overrides
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match Self::find_config_path(explicit) {
            Some(path) if path.exists() => {
                tracing::info!("Loading config from: {}", path.display());
                Self::load_from_path(&path)?
            }
            Some(path) => {
                tracing::debug!("Config file {} not found, using defaults", path.display());
                Self::default()
            }
            None => {
                tracing::debug!("No config path available, using defaults");
                Self::default()
            }
        };

        config.apply_env();
        Ok(config)
    }

    /// Load from a specific path without env overrides
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn find_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        if let Ok(path) = std::env::var("DEPLOYER_CONFIG") {
            return Some(PathBuf::from(path));
        }

        dirs::config_dir().map(|dir| dir.join("deployer").join("deployer.toml"))
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("GITHUB_API_URL") {
            self.github.api_url = url;
        }
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            if !token.is_empty() {
                self.github.token = Some(token);
            }
        }
        if let Ok(domain) = std::env::var("DEPLOYER_DOMAIN") {
            self.hosting.domain = domain;
        }
        if let Ok(user) = std::env::var("DEPLOYER_USER") {
            self.auth.username = Some(user);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeployerConfig::default();
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 1500);
        assert!(config.history.db_path.ends_with("history.db"));
        assert_eq!(config.history.limit, 50);
    }

    #[test]
    fn test_partial_toml() {
        let config = DeployerConfig::from_toml(
            r#"
            [retry]
            base_delay_ms = 10

            [hosting]
            domain = "pages.example.org"
            "#,
        )
        .unwrap();

        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 10);
        assert_eq!(config.hosting.domain, "pages.example.org");
        assert_eq!(config.github.raw_url, "https://raw.githubusercontent.com");
    }

    #[test]
    fn test_retry_policy_from_config() {
        let policy = RetryConfig::default().policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for(2), Duration::from_millis(3000));
    }

    #[test]
    fn test_load_from_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = DeployerConfig::load_from_path(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
