//! # Configuration
//!
//! `Settings` are read from an optional TOML file and then overridden by
//! `EGREGORE_*` environment variables. Every field has a default, so an
//! empty file (or no file at all) is a valid configuration.
//!
//! ## Environment Variables
//!
//! | Variable | Field |
//! |----------|-------|
//! | `EGREGORE_INSTANCE` | `instance` |
//! | `EGREGORE_HOST` / `EGREGORE_PORT` | `server.host` / `server.port` |
//! | `EGREGORE_BACKEND` | `storage.backend` (`redb` or `memory`) |
//! | `EGREGORE_DATABASE` | `storage.database` |
//! | `EGREGORE_STORE_TIMEOUT_MS` | `storage.timeout_ms` |
//! | `EGREGORE_INDEX` / `EGREGORE_INDEX_URL` | `index.kind` / `index.url` |
//! | `EGREGORE_LOCK_FILE` / `EGREGORE_PID_FILE` / `EGREGORE_LOG_FILE` | `daemon.*` |
//! | `EGREGORE_CORS_ORIGINS` | `http.cors_origins` |
//! | `EGREGORE_RATE_LIMIT` | `http.rate_limit` (0 disables) |
//! | `EGREGORE_API_KEY` | `http.api_key` |

use egregore_core::{BackendKind, EgregoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "egregore.toml";

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Instance name, used in log lines and the status output.
    pub instance: String,
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub index: IndexSettings,
    pub daemon: DaemonSettings,
    pub http: HttpSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            instance: "egregore".to_string(),
            server: ServerSettings::default(),
            storage: StorageSettings::default(),
            index: IndexSettings::default(),
            daemon: DaemonSettings::default(),
            http: HttpSettings::default(),
        }
    }
}

/// Listening address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9000,
        }
    }
}

impl ServerSettings {
    /// `host:port` for binding.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL clients should use.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Graph storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: BackendKind,
    pub database: PathBuf,
    /// Upper bound for any single store call, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Redb,
            database: PathBuf::from("egregore.redb"),
            timeout_ms: 5_000,
        }
    }
}

impl StorageSettings {
    /// The store timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Which similarity index to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// In-process term-overlap index.
    #[default]
    Memory,
    /// External search service over HTTP.
    Http,
}

/// Similarity index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub kind: IndexKind,
    /// Base URL of the external service, required for `kind = "http"`.
    pub url: Option<String>,
}

/// Fixed locations used by the daemon supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    pub lock_file: PathBuf,
    pub pid_file: PathBuf,
    pub log_file: PathBuf,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            lock_file: PathBuf::from("/tmp/egregore.lock"),
            pid_file: PathBuf::from("/tmp/egregore.pid"),
            log_file: PathBuf::from("/tmp/egregore.log"),
        }
    }
}

/// HTTP security knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Comma-separated origins, `*` for any. `None` means localhost only.
    pub cors_origins: Option<String>,
    /// Requests per second; 0 disables rate limiting.
    pub rate_limit: u32,
    /// Bearer token; `None` disables authentication.
    pub api_key: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            cors_origins: None,
            rate_limit: 100,
            api_key: None,
        }
    }
}

// =============================================================================
// LOADING
// =============================================================================

impl Settings {
    /// Load settings from `path` (or `egregore.toml` if present), then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, EgregoreError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, EgregoreError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            EgregoreError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Parse TOML text.
    pub fn from_toml(text: &str) -> Result<Self, EgregoreError> {
        toml::from_str(text)
            .map_err(|e| EgregoreError::SerializationError(format!("Invalid config: {e}")))
    }

    /// Apply `EGREGORE_*` overrides from the given lookup.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), EgregoreError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("EGREGORE_INSTANCE") {
            self.instance = v;
        }
        if let Some(v) = var("EGREGORE_HOST") {
            self.server.host = v;
        }
        if let Some(v) = var("EGREGORE_PORT") {
            self.server.port = parse_number("EGREGORE_PORT", &v)?;
        }
        if let Some(v) = var("EGREGORE_BACKEND") {
            self.storage.backend = v.parse()?;
        }
        if let Some(v) = var("EGREGORE_DATABASE") {
            self.storage.database = PathBuf::from(v);
        }
        if let Some(v) = var("EGREGORE_STORE_TIMEOUT_MS") {
            self.storage.timeout_ms = parse_number("EGREGORE_STORE_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("EGREGORE_INDEX") {
            self.index.kind = match v.trim().to_ascii_lowercase().as_str() {
                "memory" => IndexKind::Memory,
                "http" => IndexKind::Http,
                other => {
                    return Err(EgregoreError::InvalidInput(format!(
                        "EGREGORE_INDEX must be 'memory' or 'http', got '{other}'"
                    )));
                }
            };
        }
        if let Some(v) = var("EGREGORE_INDEX_URL") {
            self.index.url = Some(v);
        }
        if let Some(v) = var("EGREGORE_LOCK_FILE") {
            self.daemon.lock_file = PathBuf::from(v);
        }
        if let Some(v) = var("EGREGORE_PID_FILE") {
            self.daemon.pid_file = PathBuf::from(v);
        }
        if let Some(v) = var("EGREGORE_LOG_FILE") {
            self.daemon.log_file = PathBuf::from(v);
        }
        if let Some(v) = var("EGREGORE_CORS_ORIGINS") {
            self.http.cors_origins = Some(v);
        }
        if let Some(v) = var("EGREGORE_RATE_LIMIT") {
            self.http.rate_limit = parse_number("EGREGORE_RATE_LIMIT", &v)?;
        }
        if let Some(v) = var("EGREGORE_API_KEY") {
            self.http.api_key = Some(v);
        }
        Ok(())
    }

    /// Cross-field checks.
    pub fn validate(&self) -> Result<(), EgregoreError> {
        if self.index.kind == IndexKind::Http && self.index.url.is_none() {
            return Err(EgregoreError::InvalidInput(
                "index.kind = \"http\" requires index.url".to_string(),
            ));
        }
        if self.storage.timeout_ms == 0 {
            return Err(EgregoreError::InvalidInput(
                "storage.timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, EgregoreError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| EgregoreError::InvalidInput(format!("{key}: {e}")))
}

// =============================================================================
// TESTS
// =============================================================================
