//! Server configuration.
//!
//! Layers, lowest to highest precedence: built-in defaults, an optional YAML file,
//! `TASKBOARD__*` environment variables (`__` separates nesting levels, e.g.
//! `TASKBOARD__SERVER__BIND`), then command-line overrides.

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "taskboard.yaml";
const ENV_PREFIX: &str = "TASKBOARD__";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {0} does not exist")]
    Missing(PathBuf),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Allowed browser origin. `None` allows any origin.
    pub cors_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".into(),
            cors_origin: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret. When unset a random one is generated per process,
    /// which invalidates every token on restart.
    pub jwt_secret: Option<SecretString>,
    pub token_ttl_hours: u32,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_hours: 24,
            argon2_memory_kib: 19 * 1024,
            argon2_iterations: 2,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON document file. In-memory only when unset.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

/// Command-line values that win over every other layer.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub bind: Option<String>,
    pub store: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration. An explicitly named file must exist; the default
    /// `taskboard.yaml` is used only when present.
    pub fn load(file: Option<&Path>, overrides: Overrides) -> Result<Self, ConfigError> {
        let file = match file {
            Some(path) if !path.exists() => return Err(ConfigError::Missing(path.to_path_buf())),
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let mut figment = Figment::new()
            .merge(Yaml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        if let Some(bind) = overrides.bind {
            figment = figment.merge(("server.bind", bind));
        }
        if let Some(store) = overrides.store {
            figment = figment.merge(("store.path", store));
        }

        figment.extract().map_err(|e| ConfigError::Invalid(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.bind, "127.0.0.1:5000");
        assert_eq!(cfg.auth.token_ttl_hours, 24);
        assert!(cfg.store.path.is_none());
    }

    #[test]
    fn named_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = AppConfig::load(Some(&dir.path().join("nope.yaml")), Overrides::default());
        assert!(matches!(missing, Err(ConfigError::Missing(_))));
    }

    #[test]
    fn file_then_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taskboard.yaml");
        std::fs::write(
            &path,
            "server:\n  bind: 0.0.0.0:8080\nauth:\n  jwt_secret: s3cret\n  token_ttl_hours: 2\nlogging:\n  json: true\n",
        )
        .unwrap();

        let cfg = AppConfig::load(
            Some(&path),
            Overrides {
                bind: Some("127.0.0.1:9000".into()),
                store: Some(dir.path().join("db.json")),
            },
        )
        .unwrap();

        assert_eq!(cfg.server.bind, "127.0.0.1:9000");
        assert_eq!(cfg.auth.token_ttl_hours, 2);
        assert_eq!(cfg.auth.argon2_iterations, 2);
        assert_eq!(
            cfg.auth.jwt_secret.as_ref().map(|s| s.expose_secret().to_string()),
            Some("s3cret".to_string())
        );
        assert!(cfg.logging.json);
        assert_eq!(cfg.store.path, Some(dir.path().join("db.json")));
    }
}
