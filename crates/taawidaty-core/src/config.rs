//! Engine configuration.
//!
//! Parsed from JSON, typically bundled with the host application:
//!
//! ```json
//! {
//!   "search_limit": 50,
//!   "catalog": { "kind": "sqlite", "path": "assets/medications.db" }
//! }
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{CatalogSource, JsonCatalogSource, SqliteCatalogSource};
use crate::search::DEFAULT_SEARCH_LIMIT;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Where the catalog is read from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CatalogSourceConfig {
    Json { path: PathBuf },
    Sqlite { path: PathBuf },
}

impl CatalogSourceConfig {
    pub fn into_source(self) -> Box<dyn CatalogSource> {
        match self {
            CatalogSourceConfig::Json { path } => Box::new(JsonCatalogSource::from_path(path)),
            CatalogSourceConfig::Sqlite { path } => Box::new(SqliteCatalogSource::new(path)),
        }
    }
}

/// Top-level engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Maximum number of search hits returned by default
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    pub catalog: CatalogSourceConfig,
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

impl EngineConfig {
    /// Configuration with defaults for the given catalog source.
    pub fn new(catalog: CatalogSourceConfig) -> Self {
        Self {
            search_limit: DEFAULT_SEARCH_LIMIT,
            catalog,
        }
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.search_limit == 0 {
            return Err(ConfigError::Invalid("search_limit must be positive".into()));
        }
        let path = match &self.catalog {
            CatalogSourceConfig::Json { path } | CatalogSourceConfig::Sqlite { path } => path,
        };
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("catalog path is empty".into()));
        }
        Ok(())
    }
}
