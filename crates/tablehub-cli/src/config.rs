//! Configuration for the tablehub binary
//!
//! Loads configuration from:
//! 1. config.yaml - operational settings (database, store, logging)
//! 2. .env file - deployment-specific overrides
//!
//! Environment variables always override config.yaml values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tablehub_core::HubConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {name}: {value}")]
    InvalidEnvVar { name: String, value: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// DuckDB file with the durable datasets, opened read-only
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory mirroring view records; in-process only when unset
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterializerConfig {
    /// Pages kept in the row cache
    pub cache_capacity: usize,

    /// Lines buffered ahead of a CSV consumer
    pub csv_batch: usize,
}

impl Default for MaterializerConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 256,
            csv_batch: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PivotConfig {
    pub max_columns: usize,
}

impl Default for PivotConfig {
    fn default() -> Self {
        Self { max_columns: 35 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON list of datasets for the `main` listing
    pub datasets: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: stdout, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            output: "stdout".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub store: StoreConfig,
    pub materializer: MaterializerConfig,
    pub pivot: PivotConfig,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file with environment variable overrides.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config: Config = match std::fs::read_to_string(path) {
            Ok(contents) => serde_yaml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(e.into()),
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(path) = std::env::var("TABLEHUB_DATABASE") {
            self.database.path = Some(path);
        }
        if let Ok(dir) = std::env::var("TABLEHUB_STORE_DIR") {
            self.store.directory = Some(dir);
        }
        if let Ok(cap) = std::env::var("TABLEHUB_PIVOT_MAX_COLUMNS") {
            self.pivot.max_columns = cap.parse().map_err(|_| ConfigError::InvalidEnvVar {
                name: "TABLEHUB_PIVOT_MAX_COLUMNS".to_string(),
                value: cap.clone(),
            })?;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.logging.directory = dir;
        }
        Ok(())
    }

    /// Settings the view hub needs
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            database: self.database.path.as_ref().map(PathBuf::from),
            store_directory: self.store.directory.as_ref().map(PathBuf::from),
            page_cache_capacity: self.materializer.cache_capacity,
            csv_channel_depth: self.materializer.csv_batch,
            pivot_max_columns: self.pivot.max_columns,
            ..HubConfig::default()
        }
    }

    /// Set logging environment variables for the logging module
    pub fn apply_logging_env(&self) {
        std::env::set_var("RUST_LOG", &self.logging.level);
        std::env::set_var("LOG_FORMAT", &self.logging.format);
        std::env::set_var("LOG_OUTPUT", &self.logging.output);
        std::env::set_var("LOG_DIR", &self.logging.directory);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.path, None);
        assert_eq!(config.materializer.cache_capacity, 256);
        assert_eq!(config.pivot.max_columns, 35);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.logging.output, "stdout");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: Config = serde_yaml::from_str(
            r#"
database:
  path: "data/big.duckdb"
materializer:
  cache_capacity: 16
"#,
        )
        .unwrap();

        assert_eq!(config.database.path.as_deref(), Some("data/big.duckdb"));
        assert_eq!(config.materializer.cache_capacity, 16);
        assert_eq!(config.materializer.csv_batch, 1024);
        assert_eq!(config.logging.directory, "./logs");

        let hub = config.hub_config();
        assert_eq!(hub.database, Some(PathBuf::from("data/big.duckdb")));
        assert_eq!(hub.page_cache_capacity, 16);
        assert_eq!(hub.pivot_max_columns, 35);
    }

    #[test]
    fn test_load_with_env_var_override() {
        let dir = tempfile::tempdir().unwrap();
        let defaults = Config::load(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(defaults.materializer.csv_batch, 1024);

        std::env::set_var("TABLEHUB_STORE_DIR", "/tmp/tablehub-records");
        std::env::set_var("TABLEHUB_PIVOT_MAX_COLUMNS", "12");

        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
store:
  directory: "./records"
pivot:
  max_columns: 35
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.store.directory.as_deref(), Some("/tmp/tablehub-records"));
        assert_eq!(config.pivot.max_columns, 12);

        std::env::set_var("TABLEHUB_PIVOT_MAX_COLUMNS", "many");
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::InvalidEnvVar { .. })
        ));

        std::env::remove_var("TABLEHUB_STORE_DIR");
        std::env::remove_var("TABLEHUB_PIVOT_MAX_COLUMNS");
    }
}
