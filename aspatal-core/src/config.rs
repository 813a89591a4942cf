//! Configuration management for Aspatal
//!
//! Settings come from built-in defaults, an optional TOML file and
//! `ASPATAL__SECTION__KEY` environment variables, in that order of precedence.

use crate::auth::{PasswordHasher, MIN_SECRET_LEN};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Aspatal server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub notify: NotifySettings,
    pub logging: LoggingSettings,
    pub bootstrap: BootstrapSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec!["http://localhost:4200".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HMAC signing key for session tokens. Loaded once at startup.
    pub jwt_secret: String,
    pub token_ttl_minutes: u64,
    pub verification_ttl_hours: u64,
    pub password_hash_cost: u32,
    /// Entries kept in the in-memory audit ring
    pub audit_capacity: usize,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_minutes: 60,
            verification_ttl_hours: 24,
            password_hash_cost: 12,
            audit_capacity: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    /// Write mail to the log
    Log,
    /// Keep mail in memory
    Outbox,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    pub backend: NotifierKind,
    /// Base URL used when building verification links
    pub public_base_url: String,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            backend: NotifierKind::Log,
            public_base_url: "http://localhost:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive, overridden by `RUST_LOG`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// First administrator, created at startup when no ADMIN account exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapSettings {
    pub admin_email: Option<String>,
    /// Generated and logged when absent
    pub admin_password: Option<String>,
    pub admin_name: String,
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            admin_email: None,
            admin_password: None,
            admin_name: "Administrator".to_string(),
        }
    }
}

impl Config {
    /// Load defaults, then `path` (if given), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix("ASPATAL")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.cors_origins")
                .try_parsing(true),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server port cannot be 0".into()));
        }

        if self.auth.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid(format!(
                "auth.jwt_secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        if self.auth.token_ttl_minutes == 0 {
            return Err(ConfigError::Invalid("token TTL cannot be 0".into()));
        }
        if self.auth.verification_ttl_hours == 0 {
            return Err(ConfigError::Invalid("verification TTL cannot be 0".into()));
        }
        if !(PasswordHasher::MIN_COST..=PasswordHasher::MAX_COST)
            .contains(&self.auth.password_hash_cost)
        {
            return Err(ConfigError::Invalid(format!(
                "password hash cost must be between {} and {}",
                PasswordHasher::MIN_COST,
                PasswordHasher::MAX_COST
            )));
        }
        if self.auth.audit_capacity == 0 {
            return Err(ConfigError::Invalid("audit capacity cannot be 0".into()));
        }

        if self.notify.public_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("notify.public_base_url is required".into()));
        }

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the default configuration to `path`, creating parent directories.
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = Config::default().to_toml()?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn valid() -> Config {
        let mut config = Config::default();
        config.auth.jwt_secret = "0123456789abcdef0123456789abcdef".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.token_ttl_minutes, 60);
        assert_eq!(config.server.cors_origins, vec!["http://localhost:4200"]);
        assert_eq!(config.notify.backend, NotifierKind::Log);
    }

    #[test]
    fn test_config_validation() {
        let mut config = valid();
        assert!(config.validate().is_ok());

        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.auth.jwt_secret = "too-short".to_string();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.auth.password_hash_cost = 3;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.auth.verification_ttl_hours = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_write_default_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conf").join("aspatal.toml");

        Config::write_default(&path).unwrap();
        assert!(path.exists());

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.server.port, 8080);
        assert_eq!(loaded.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("aspatal.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9090\n\n[auth]\njwt_secret = \"0123456789abcdef0123456789abcdef\"\n\n[notify]\nbackend = \"outbox\"\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.auth.token_ttl_minutes, 60);
        assert_eq!(config.notify.backend, NotifierKind::Outbox);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        assert!(Config::load(Some(&temp_dir.path().join("absent.toml"))).is_err());
    }
}
