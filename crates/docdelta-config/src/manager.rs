//! Configuration manager implementation

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use tracing::debug;

use crate::{
    error::{ConfigError, Result},
    types::{ConfigStore, EngineConfig},
};

/// Environment variable prefix for overrides (`DOCDELTA_BACKUP_ENABLED=false`)
const ENV_PREFIX: &str = "DOCDELTA";

/// Configuration manager
pub struct ConfigManager {
    /// Configuration file path
    config_path: PathBuf,
    /// Environment prefix
    env_prefix: String,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Create with custom config path
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            config_path: path,
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Override the environment prefix
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Path this manager reads from and writes to
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get default config path
    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docdelta")
            .join("config.yaml")
    }

    /// Load, then validate
    pub fn load_validated(&mut self) -> Result<EngineConfig> {
        let config = self.load_config()?;
        self.validate_config(&config)?;
        Ok(config)
    }
}

impl ConfigStore for ConfigManager {
    fn load_config(&mut self) -> Result<EngineConfig> {
        let builder = Config::builder()
            .add_source(File::from(self.config_path.clone()).required(false))
            .add_source(Environment::with_prefix(&self.env_prefix).try_parsing(true));

        let config = builder.build()?;
        let engine_config: EngineConfig = config.try_deserialize()?;
        debug!(
            path = %self.config_path.display(),
            docs = %engine_config.default_docs_path.display(),
            "loaded configuration"
        );
        Ok(engine_config)
    }

    fn save_config(&self, config: &EngineConfig) -> Result<()> {
        let extension = self
            .config_path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let content = match extension.as_str() {
            "yaml" | "yml" => serde_yaml::to_string(config)?,
            "toml" => toml::to_string_pretty(config)?,
            "json" => serde_json::to_string_pretty(config)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.config_path, content)?;
        Ok(())
    }

    fn validate_config(&self, config: &EngineConfig) -> Result<()> {
        config.validate()
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
