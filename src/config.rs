//! Configuration handling for the LightVPN client

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Name of the settings directory under the user's home
const SETTINGS_DIR_NAME: &str = "LightVPN";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Could not determine the home directory")]
    NoHomeDir,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    pub openvpn: OpenVpnConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Scheme and host every API path is joined onto
    pub origin: String,
    /// Platform name sent in the client identity header
    pub platform: String,
    /// Lowercase fragment the server certificate issuer must contain
    pub pinned_issuer: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Overrides `~/LightVPN`
    pub settings_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenVpnConfig {
    pub binary: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                origin: "https://lightvpn.org".to_string(),
                platform: "Linux".to_string(),
                pinned_issuer: "cloudflare".to_string(),
            },
            paths: PathsConfig::default(),
            openvpn: OpenVpnConfig {
                binary: PathBuf::from("/usr/bin/openvpn"),
            },
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load config from the working directory, then the settings root, else defaults
    pub fn discover() -> Result<Self, ConfigError> {
        let local_config = PathBuf::from("lightvpn.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(SETTINGS_DIR_NAME).join("config.toml");
            if home_config.exists() {
                return Self::load(&home_config);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Resolve every on-disk location from the settings root
    pub fn paths(&self) -> Result<Paths, ConfigError> {
        let root = match &self.paths.settings_dir {
            Some(dir) => dir.clone(),
            None => dirs::home_dir()
                .ok_or(ConfigError::NoHomeDir)?
                .join(SETTINGS_DIR_NAME),
        };
        Ok(Paths::new(root))
    }
}

/// Locations of all persisted client state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub settings_dir: PathBuf,
    pub auth_file: PathBuf,
    pub config_cache_dir: PathBuf,
    pub drivers_dir: PathBuf,
    pub openvpn_dir: PathBuf,
}

impl Paths {
    pub fn new(settings_dir: PathBuf) -> Self {
        Self {
            auth_file: settings_dir.join("auth.bin"),
            config_cache_dir: settings_dir.join("cache"),
            drivers_dir: settings_dir.join("drivers"),
            openvpn_dir: settings_dir.join("ovpn"),
            settings_dir,
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.settings_dir.join("config.toml")
    }
}
