//! Layered client configuration using figment.
//!
//! Sources, highest priority first:
//! 1. Environment variables with the `SCHOOL_` prefix (`SCHOOL_BASE_URL`, ...)
//! 2. `./school-client.toml`
//! 3. `<config_dir>/school-client/config.toml`
//! 4. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://school-management-system-2-wck6.onrender.com/api";

const LOCAL_CONFIG_FILE: &str = "school-client.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError::Figment(Box::new(e))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClientConfig {
    /// API root; endpoint paths such as `/admin/classes` are appended to it.
    pub base_url: String,

    /// Whole-request timeout in seconds. `None` waits indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Where the session is persisted. Defaults to `<config_dir>/school-client`.
    #[serde(default)]
    pub session_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: None,
            session_dir: None,
        }
    }
}

impl ClientConfig {
    /// Load from all sources and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    /// The provider chain, exposed so callers can layer extra providers.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global) = dirs::config_dir().map(|d| d.join("school-client").join("config.toml")) {
            if global.exists() {
                figment = figment.merge(Toml::file(global));
            }
        }

        figment
            .merge(Toml::file(LOCAL_CONFIG_FILE))
            .merge(Env::prefixed("SCHOOL_"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidValue {
            field: "base_url".into(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                field: "base_url".into(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "timeout_secs".into(),
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_point_at_hosted_api() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_file_and_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                LOCAL_CONFIG_FILE,
                r#"
                base_url = "http://file.example/api"
                timeout_secs = 5
                "#,
            )?;
            jail.set_env("SCHOOL_BASE_URL", "http://env.example/api");

            let config: ClientConfig = ClientConfig::figment().extract()?;
            assert_eq!(config.base_url, "http://env.example/api");
            assert_eq!(config.timeout(), Some(Duration::from_secs(5)));
            Ok(())
        });
    }

    #[test]
    fn rejects_non_http_base_url() {
        let config = ClientConfig {
            base_url: "ftp://school.example".into(),
            ..ClientConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "base_url"));
    }

    #[test]
    fn rejects_unparseable_base_url() {
        let config = ClientConfig {
            base_url: "not a url".into(),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        let config = ClientConfig {
            timeout_secs: Some(0),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
