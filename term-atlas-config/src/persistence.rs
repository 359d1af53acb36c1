//! YAML persistence and path resolution for `AtlasConfig`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::atlas_config::AtlasConfig;
use crate::error::ConfigError;

impl AtlasConfig {
    /// Directory holding term-atlas configuration.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("term-atlas")
    }

    /// Default config file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("atlas.yaml")
    }

    /// Load from the default path, or defaults if no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            log::info!(
                "Config file not found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load and validate a config file. Missing fields take their defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        log::info!("Loading atlas config from {:?}", path);
        let contents = fs::read_to_string(path)?;
        let config: AtlasConfig = serde_yaml_ng::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to the default path.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml_ng::to_string(self)?;

        // Atomic save: write to temp file then rename to prevent corruption on crash
        let temp_path = path.with_extension("yaml.tmp");
        fs::write(&temp_path, &yaml)?;
        fs::rename(&temp_path, path)?;
        log::debug!("Saved atlas config to {:?}", path);
        Ok(())
    }
}
