use std::path::{Path, PathBuf};

use rate_core::RoundingPolicy;
use rate_core::db::DbConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings for `rate-tool`, read from a TOML file.
///
/// ```toml
/// [database]
/// backend = "sqlite"
/// connection_string = "rates.db"
///
/// [rounding]
/// decimal_places = 2
/// mode = "half-up"
/// ```
///
/// Every key is optional; missing keys take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    pub database: DbConfig,
    pub rounding: RoundingPolicy,
}

impl ToolConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }
}
