//! Configuration management for the MusBlossom client

use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix, e.g. `MUSBLOSSOM__API__BASE_URL`
pub const ENV_PREFIX: &str = "MUSBLOSSOM";

/// Main client configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Remote API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Session persistence settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Remote API configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// User agent sent with every request
    pub user_agent: String,
}

/// Session persistence configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Session file; defaults to the platform data directory
    pub path: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            timeout_secs: 10,
            user_agent: concat!("musblossom-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ApiConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl StorageConfig {
    /// Configured session file, or `<data dir>/musblossom/session.json`
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("musblossom")
                .join("session.json")
        })
    }
}

impl ClientConfig {
    /// Load configuration from defaults, an optional file and the environment
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value fails to parse
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        let defaults = Self::default();

        let mut builder = config::Config::builder()
            .set_default("api.base_url", defaults.api.base_url)?
            .set_default("api.timeout_secs", defaults.api.timeout_secs)?
            .set_default("api.user_agent", defaults.api.user_agent)?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the base URL is an absolute http(s) URL
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] describing the offending value
    pub fn validate(&self) -> CoreResult<()> {
        let url = url::Url::parse(&self.api.base_url).map_err(|e| {
            CoreError::invalid_config(format!("api.base_url {:?}: {e}", self.api.base_url))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::invalid_config(format!(
                "api.base_url must use http or https, got {}",
                url.scheme()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Tests that load from the process environment must not interleave
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn write_config(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("client.toml");
        std::fs::write(
            &path,
            "[api]\nbase_url = \"https://musblossom.example/api\"\ntimeout_secs = 3\n\n[storage]\npath = \"/tmp/mb.json\"\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:5000/api");
        assert_eq!(config.api.timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
        assert!(
            config
                .storage
                .resolved_path()
                .ends_with("musblossom/session.json")
        );
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let _env = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir);

        let config = ClientConfig::load(Some(&path)).unwrap();
        assert_eq!(config.api.base_url, "https://musblossom.example/api");
        assert_eq!(config.api.timeout_secs, 3);
        assert_eq!(config.storage.resolved_path(), PathBuf::from("/tmp/mb.json"));
        assert!(config.api.user_agent.starts_with("musblossom-client/"));
    }

    #[test]
    fn test_env_overrides_defaults_and_file() {
        let _env = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir);

        unsafe {
            std::env::set_var("MUSBLOSSOM__API__BASE_URL", "https://staging.musblossom.example/api");
            std::env::set_var("MUSBLOSSOM__API__TIMEOUT_SECS", "25");
        }

        let from_env = ClientConfig::load(None);
        let over_file = ClientConfig::load(Some(&path));

        unsafe {
            std::env::remove_var("MUSBLOSSOM__API__BASE_URL");
            std::env::remove_var("MUSBLOSSOM__API__TIMEOUT_SECS");
        }

        let from_env = from_env.unwrap();
        assert_eq!(from_env.api.base_url, "https://staging.musblossom.example/api");
        assert_eq!(from_env.api.timeout(), Duration::from_secs(25));

        let over_file = over_file.unwrap();
        assert_eq!(over_file.api.base_url, "https://staging.musblossom.example/api");
        assert_eq!(over_file.api.timeout_secs, 25);
        // Keys the environment leaves alone still come from the file
        assert_eq!(over_file.storage.resolved_path(), PathBuf::from("/tmp/mb.json"));
    }

    #[test]
    fn test_invalid_env_value_is_rejected() {
        let _env = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        unsafe {
            std::env::set_var("MUSBLOSSOM__API__BASE_URL", "ftp://musblossom.example");
        }
        let result = ClientConfig::load(None);
        unsafe {
            std::env::remove_var("MUSBLOSSOM__API__BASE_URL");
        }

        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let mut config = ClientConfig::default();
        config.api.base_url = "ftp://example.com".to_string();
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidConfig { .. })
        ));

        config.api.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }
}
