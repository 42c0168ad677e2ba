//! Monitor configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::registry::{file, FileRegistry};

/// Placeholder substituted with the task handle in the status endpoint.
pub const TASK_ID_PLACEHOLDER: &str = "{task_id}";

/// Configuration for talking to the job service and persisting state.
///
/// # Example Configuration File
///
/// ```toml
/// base_url = "http://localhost:8000/api"
/// poll_interval_ms = 2000
/// request_timeout_ms = 30000
/// auth_token = "token123"
///
/// [headers]
/// "X-Client" = "jobwatch"
///
/// [endpoints]
/// start = "train/"
/// status = "task-status/{task_id}/"
/// artifacts = "trained-models/"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Root URL of the job service.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Delay between status queries.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Per-request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Directory holding the registry file. Platform data dir when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_dir: Option<PathBuf>,

    /// Bearer token sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Extra headers sent with every request.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// Endpoint paths relative to `base_url`.
    #[serde(default)]
    pub endpoints: Endpoints,
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_poll_interval() -> u64 {
    2_000
}

fn default_request_timeout() -> u64 {
    30_000
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            poll_interval_ms: default_poll_interval(),
            request_timeout_ms: default_request_timeout(),
            registry_dir: None,
            auth_token: None,
            headers: HashMap::new(),
            endpoints: Endpoints::default(),
        }
    }
}

/// Endpoint paths, joined onto the base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    /// Start endpoint (POST).
    #[serde(default = "default_start")]
    pub start: String,

    /// Status endpoint (GET). Must contain `{task_id}`.
    #[serde(default = "default_status")]
    pub status: String,

    /// Artifact listing endpoint (GET).
    #[serde(default = "default_artifacts")]
    pub artifacts: String,
}

fn default_start() -> String {
    "train/".to_string()
}

fn default_status() -> String {
    format!("task-status/{TASK_ID_PLACEHOLDER}/")
}

fn default_artifacts() -> String {
    "trained-models/".to_string()
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            start: default_start(),
            status: default_status(),
            artifacts: default_artifacts(),
        }
    }
}

impl MonitorConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(Into::into)
    }

    /// Defaults overlaid with environment variables.
    ///
    /// - `JOBWATCH_BASE_URL`
    /// - `JOBWATCH_POLL_INTERVAL_MS`
    /// - `JOBWATCH_REQUEST_TIMEOUT_MS`
    /// - `JOBWATCH_REGISTRY_DIR`
    /// - `JOBWATCH_AUTH_TOKEN`
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Loads the optional file, overlays the environment and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlays values from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Overlays values from `lookup`, which maps a variable name to its value.
    pub fn apply_vars<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("JOBWATCH_BASE_URL") {
            self.base_url = url;
        }
        if let Some(ms) = lookup("JOBWATCH_POLL_INTERVAL_MS") {
            self.poll_interval_ms = parse_ms("poll_interval_ms", &ms)?;
        }
        if let Some(ms) = lookup("JOBWATCH_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = parse_ms("request_timeout_ms", &ms)?;
        }
        if let Some(dir) = lookup("JOBWATCH_REGISTRY_DIR") {
            self.registry_dir = Some(PathBuf::from(dir));
        }
        if let Some(token) = lookup("JOBWATCH_AUTH_TOKEN") {
            self.auth_token = Some(token).filter(|t| !t.is_empty());
        }
        Ok(())
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the registry directory.
    pub fn with_registry_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.registry_dir = Some(dir.into());
        self
    }

    /// Set the bearer token.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Add an extra request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Checks values that would otherwise fail late.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        url::Url::parse(&self.base_url).map_err(|e| ConfigError::Invalid {
            field: "base_url",
            reason: e.to_string(),
        })?;
        if !self.endpoints.status.contains(TASK_ID_PLACEHOLDER) {
            return Err(ConfigError::Invalid {
                field: "endpoints.status",
                reason: format!("must contain {TASK_ID_PLACEHOLDER}"),
            });
        }
        Ok(())
    }

    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Directory the file registry lives in.
    pub fn registry_dir(&self) -> PathBuf {
        self.registry_dir.clone().unwrap_or_else(file::default_dir)
    }

    /// File registry at the configured location.
    pub fn file_registry(&self) -> FileRegistry {
        FileRegistry::new(self.registry_dir())
    }

    /// Serialize the configuration to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid {
            field: "config",
            reason: e.to_string(),
        })
    }
}

fn parse_ms(field: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
        field,
        reason: format!("{raw:?}: {e}"),
    })
}
