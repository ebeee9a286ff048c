//! Hand a resolved profile to the tunnel binary

use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Failed to start {binary}: {message}")]
    SpawnError { binary: String, message: String },
    #[error("Tunnel exited with status {0}")]
    ExitStatus(String),
}

/// Starts a tunnel from an OpenVPN profile
pub trait TunnelLauncher {
    fn launch(&self, config_path: &Path) -> Result<(), LaunchError>;
}

/// Runs `openvpn --config <profile>` and waits for it to exit
pub struct OpenVpnLauncher {
    binary: PathBuf,
}

impl OpenVpnLauncher {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }
}

impl TunnelLauncher for OpenVpnLauncher {
    fn launch(&self, config_path: &Path) -> Result<(), LaunchError> {
        info!(
            "Starting {} with {}",
            self.binary.display(),
            config_path.display()
        );

        let status = Command::new(&self.binary)
            .arg("--config")
            .arg(config_path)
            .status()
            .map_err(|e| LaunchError::SpawnError {
                binary: self.binary.display().to_string(),
                message: e.to_string(),
            })?;

        if !status.success() {
            return Err(LaunchError::ExitStatus(status.to_string()));
        }

        Ok(())
    }
}
