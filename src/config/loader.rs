//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::resolve::resolve;
use crate::config::schema::WatcherConfig;
use crate::config::settings::Settings;
use crate::config::validation::ValidationError;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse yaml config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse toml config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(", ")
}

/// On-disk format, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// `.toml` files are TOML, everything else is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Parse configuration text without validating it.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<WatcherConfig, ConfigError> {
    let config = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
        ConfigFormat::Toml => toml::from_str(content)?,
    };
    Ok(config)
}

/// Load, validate and resolve configuration from a file.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    tracing::debug!(path = ?path, "Reading configuration");
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config = parse_config(&content, ConfigFormat::from_path(path))?;
    tracing::trace!(config = ?config, "Parsed configuration");

    resolve(&config).map_err(ConfigError::Validation)
}
