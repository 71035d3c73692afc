//! Configuration loading and validation for the RustedClaw snapshot loader.
//!
//! Loads configuration from `~/.rustedclaw/load.toml` with environment
//! variable overrides. Validates all settings before they reach the loader.

use rustedclaw_load::{LoadOptions, OptionalBuilderRegistry, DEFAULT_MAX_DEPTH};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// The loader configuration.
///
/// Maps directly to `~/.rustedclaw/load.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Maximum nesting depth accepted while decoding
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Fall back to environment variables for secrets not supplied explicitly
    #[serde(default = "default_true")]
    pub secrets_from_env: bool,

    /// Extra namespaces treated as pluggable (`/`-delimited, e.g. `langchain/llms/acme`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub optional_entrypoints: Vec<String>,

    /// TOML file holding a flat table of secret key → value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets_file: Option<PathBuf>,

    /// Root package aliases (alias → canonical root)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub root_aliases: BTreeMap<String, String>,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}
fn default_true() -> bool {
    true
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            secrets_from_env: true,
            optional_entrypoints: vec![],
            secrets_file: None,
            root_aliases: BTreeMap::new(),
        }
    }
}

/// Secrets read from a secrets file. Debug output never shows values.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct SecretsTable(pub HashMap<String, String>);

impl std::fmt::Debug for SecretsTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.0.keys().collect();
        keys.sort();
        f.debug_map()
            .entries(keys.into_iter().map(|k| (k, "[REDACTED]")))
            .finish()
    }
}

impl LoaderConfig {
    /// Load configuration from the default path (~/.rustedclaw/load.toml).
    ///
    /// Environment overrides:
    /// - `RUSTEDCLAW_LOAD_MAX_DEPTH`
    /// - `RUSTEDCLAW_LOAD_SECRETS_FROM_ENV` (`true`/`false`/`1`/`0`)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("load.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No loader config found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".rustedclaw")
    }

    fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = var("RUSTEDCLAW_LOAD_MAX_DEPTH") {
            self.max_depth = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "RUSTEDCLAW_LOAD_MAX_DEPTH must be a positive integer, got {raw:?}"
                ))
            })?;
        }

        if let Some(raw) = var("RUSTEDCLAW_LOAD_SECRETS_FROM_ENV") {
            self.secrets_from_env = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::ValidationError(format!(
                        "RUSTEDCLAW_LOAD_SECRETS_FROM_ENV must be a boolean, got {raw:?}"
                    )));
                }
            };
        }

        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::ValidationError("max_depth must be > 0".into()));
        }

        for entrypoint in &self.optional_entrypoints {
            let segments: Vec<&str> = entrypoint.split('/').collect();
            if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) {
                return Err(ConfigError::ValidationError(format!(
                    "optional entrypoint {entrypoint:?} must be a '/'-delimited namespace"
                )));
            }
        }

        for (alias, root) in &self.root_aliases {
            if alias.is_empty() || root.is_empty() {
                return Err(ConfigError::ValidationError(
                    "root aliases must not be empty".into(),
                ));
            }
        }

        Ok(())
    }

    /// Read the configured secrets file, if any.
    pub fn read_secrets(&self) -> Result<SecretsTable, ConfigError> {
        let Some(path) = &self.secrets_file else {
            return Ok(SecretsTable::default());
        };

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.clone(),
            reason: e.to_string(),
        })
    }

    /// Build per-call loader options, including secrets from `secrets_file`.
    pub fn into_options(self) -> Result<LoadOptions, ConfigError> {
        let secrets = self.read_secrets()?;

        let mut optional = OptionalBuilderRegistry::new();
        for entrypoint in &self.optional_entrypoints {
            optional.add_entrypoint(entrypoint.as_str());
        }
        for (alias, root) in &self.root_aliases {
            optional.alias_root(alias.as_str(), root.as_str());
        }

        Ok(LoadOptions::new()
            .with_secrets(secrets.0)
            .with_secrets_from_env(self.secrets_from_env)
            .with_optional_registry(optional)
            .with_max_depth(self.max_depth))
    }

    /// Render this configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Failed to serialize config: {0}")]
    SerializeError(String),
}
