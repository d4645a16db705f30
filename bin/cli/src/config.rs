//! Client configuration.
//!
//! Loaded via the `config` crate from an optional `ilm.toml` in the working
//! directory, overridden by environment variables such as
//! `ILM__API__BASE_URL` or `ILM__SSO__TENANT_ID`.
//!
//! See [`SsoConfig`](ilm_platform_access::SsoConfig) for the single sign-on
//! settings.

use ilm_platform_access::SsoConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Client configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct CliConfig {
    /// Backing API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Single sign-on settings. SSO is unavailable when absent.
    #[serde(default)]
    pub sso: Option<SsoConfig>,

    /// Local storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Backing API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout, in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000/api/v1".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

impl ApiConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Local storage settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// File holding the persisted session.
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
}

fn default_session_file() -> PathBuf {
    PathBuf::from(".ilm/session.json")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            session_file: default_session_file(),
        }
    }
}

impl CliConfig {
    /// Loads configuration from `ilm.toml` and environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a source is unreadable or a value has the wrong
    /// type.
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::from_builder(
            config::Config::builder().add_source(config::File::with_name("ilm").required(false)),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, config::ConfigError> {
        builder
            .add_source(
                config::Environment::with_prefix("ILM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
