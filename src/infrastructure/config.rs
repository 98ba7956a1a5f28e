use crate::domain::{
    config::UartLinkConfig,
    error::{UartLinkError, UartLinkResult},
};
use std::fs;
use std::path::{Path, PathBuf};

/// Loads and saves the crate configuration as TOML.
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    /// Store rooted at the user's global configuration file
    pub fn new() -> UartLinkResult<Self> {
        let home = dirs::home_dir().ok_or_else(|| UartLinkError::Config {
            message: "Could not determine home directory".to_string(),
        })?;

        Ok(Self {
            config_path: home.join(".config").join("uartlink").join("config.toml"),
        })
    }

    /// Store rooted at an explicit path
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Load the configuration, falling back to defaults when the file
    /// does not exist yet.
    pub fn load(&self) -> UartLinkResult<UartLinkConfig> {
        if self.config_path.exists() {
            Self::load_from_path(&self.config_path)
        } else {
            Ok(UartLinkConfig::default())
        }
    }

    /// Save the configuration, creating parent directories as needed.
    pub fn save(&self, config: &UartLinkConfig) -> UartLinkResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| UartLinkError::Config {
                message: format!("Failed to create config directory: {}", e),
            })?;
        }

        Self::save_to_path(&self.config_path, config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> UartLinkResult<UartLinkConfig> {
        let content = fs::read_to_string(path).map_err(|e| UartLinkError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| UartLinkError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }

    /// Save configuration to a specific path
    pub fn save_to_path(path: &Path, config: &UartLinkConfig) -> UartLinkResult<()> {
        let content = toml::to_string_pretty(config).map_err(|e| UartLinkError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| UartLinkError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }
}
