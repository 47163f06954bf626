//! Configuration, persisted as TOML.
//!
//! Every field has a default, so an absent or partial `semantica.toml` is valid.
//! A handful of deployment knobs can be overridden from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::vocab::Vocabulary;

/// Errors from loading or writing configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(semantica::config::read),
        help("Ensure the config file is readable, or remove it to fall back to defaults.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(semantica::config::parse),
        help("Check the TOML syntax. Unknown sections are rejected to catch typos.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(semantica::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid IRI in vocabulary: {iri:?} ({message})")]
    #[diagnostic(
        code(semantica::config::invalid_iri),
        help("`vocabulary.namespace` and `vocabulary.transfer_class` must be absolute IRIs.")
    )]
    InvalidIri { iri: String, message: String },

    #[error("invalid value for {field}: {message}")]
    #[diagnostic(code(semantica::config::invalid_value))]
    InvalidValue { field: String, message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Environment variable overriding `store.endpoint`.
pub const ENV_SPARQL_ENDPOINT: &str = "SEMANTICA_SPARQL_ENDPOINT";
/// Environment variable overriding `server.bind`.
pub const ENV_SERVER_BIND: &str = "SEMANTICA_SERVER_BIND";
/// Environment variable overriding `server.port`.
pub const ENV_SERVER_PORT: &str = "SEMANTICA_SERVER_PORT";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SemanticaConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub vocabulary: Vocabulary,
    #[serde(default)]
    pub trace: TraceConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Where transfers are queried from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Remote SPARQL endpoint. When unset, the embedded store is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Directory of the embedded store. `None` selects the XDG data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Per-query timeout for the remote endpoint.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            data_dir: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Defaults and ceilings applied to trace requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceConfig {
    #[serde(default = "default_max_depth")]
    pub default_max_depth: usize,
    #[serde(default = "default_max_total_paths")]
    pub default_max_total_paths: usize,
    #[serde(default = "default_max_depth_limit")]
    pub max_depth_limit: usize,
    #[serde(default = "default_max_total_paths_limit")]
    pub max_total_paths_limit: usize,
}

fn default_max_depth() -> usize {
    3
}
fn default_max_total_paths() -> usize {
    10
}
fn default_max_depth_limit() -> usize {
    32
}
fn default_max_total_paths_limit() -> usize {
    1000
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            default_max_depth: default_max_depth(),
            default_max_total_paths: default_max_total_paths(),
            max_depth_limit: default_max_depth_limit(),
            max_total_paths_limit: default_max_total_paths_limit(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl SemanticaConfig {
    /// Parse a config from TOML text. `origin` is only used in error messages.
    pub fn from_toml(text: &str, origin: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&text, &path.display().to_string())
    }

    /// Write the config as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let text = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            field: "config".into(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, text).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Apply `SEMANTICA_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        if let Some(endpoint) = lookup(ENV_SPARQL_ENDPOINT).filter(|v| !v.trim().is_empty()) {
            self.store.endpoint = Some(endpoint);
        }
        if let Some(bind) = lookup(ENV_SERVER_BIND) {
            self.server.bind = bind;
        }
        if let Some(port) = lookup(ENV_SERVER_PORT) {
            self.server.port = port.parse().map_err(|e| ConfigError::InvalidValue {
                field: ENV_SERVER_PORT.into(),
                message: format!("{port:?}: {e}"),
            })?;
        }
        self.validate()
    }

    fn validate(&self) -> ConfigResult<()> {
        self.vocabulary.compile()?;
        if self.store.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "store.timeout_secs".into(),
                message: "must be greater than zero".into(),
            });
        }
        let trace = &self.trace;
        if trace.max_total_paths_limit == 0 || trace.default_max_total_paths == 0 {
            return Err(ConfigError::InvalidValue {
                field: "trace".into(),
                message: "path counts must be at least 1".into(),
            });
        }
        if trace.default_max_depth > trace.max_depth_limit
            || trace.default_max_total_paths > trace.max_total_paths_limit
        {
            return Err(ConfigError::InvalidValue {
                field: "trace".into(),
                message: "defaults must not exceed their limits".into(),
            });
        }
        Ok(())
    }
}
