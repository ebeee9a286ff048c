//! Driver, OpenVPN and updater downloads
//!
//! Unlike the config cache these are never considered fresh: each call
//! downloads the bundle again.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::ApiClient;
use crate::sync::SyncError;
use crate::sync::archive::{discard_dir, extract_bundle, publish_dir, staging_path};

#[cfg(windows)]
pub const OPENVPN_BINARY: &str = "openvpn.exe";
#[cfg(not(windows))]
pub const OPENVPN_BINARY: &str = "openvpn";

pub const UPDATER_FILE_NAME: &str = "LightVPNUpdater";

pub struct Downloads {
    api: Arc<ApiClient>,
    drivers_dir: PathBuf,
    openvpn_dir: PathBuf,
}

impl Downloads {
    pub fn new(api: Arc<ApiClient>, drivers_dir: PathBuf, openvpn_dir: PathBuf) -> Self {
        Self {
            api,
            drivers_dir,
            openvpn_dir,
        }
    }

    pub fn drivers_dir(&self) -> &Path {
        &self.drivers_dir
    }

    pub fn openvpn_binary(&self) -> PathBuf {
        self.openvpn_dir.join(OPENVPN_BINARY)
    }

    /// True when the bundled OpenVPN binary is present
    pub fn has_openvpn(&self) -> bool {
        self.openvpn_binary().is_file()
    }

    /// Replace the drivers directory with a fresh download
    pub async fn fetch_drivers(&self, cancel: &CancellationToken) -> Result<usize, SyncError> {
        info!("Fetching drivers");
        let bytes = self
            .api
            .request_bytes("/api/download/drivers", cancel)
            .await?;
        let count = install_bundle(bytes, self.drivers_dir.clone(), "drivers.zip").await?;
        info!("Installed {} driver files", count);
        Ok(count)
    }

    /// Download the OpenVPN bundle unless the binary is already installed
    ///
    /// Returns true when a download happened.
    pub async fn ensure_openvpn(&self, cancel: &CancellationToken) -> Result<bool, SyncError> {
        if self.has_openvpn() {
            return Ok(false);
        }

        info!("Fetching OpenVPN binaries");
        let bytes = self.api.request_bytes("/api/download/ovpn", cancel).await?;
        let count = install_bundle(bytes, self.openvpn_dir.clone(), "openvpn.zip").await?;
        info!("Installed {} OpenVPN files", count);
        Ok(true)
    }

    /// Download the updater binary
    pub async fn fetch_updater(&self, cancel: &CancellationToken) -> Result<Vec<u8>, SyncError> {
        info!("Fetching updater");
        Ok(self
            .api
            .request_bytes("/api/download/updater", cancel)
            .await?)
    }

    /// Download the updater into `dir` and return its path
    pub async fn save_updater(
        &self,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, SyncError> {
        let bytes = self.fetch_updater(cancel).await?;
        let path = dir.join(UPDATER_FILE_NAME);
        tokio::fs::write(&path, bytes).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).await?;
        }

        info!("Updater saved to {}", path.display());
        Ok(path)
    }
}

async fn install_bundle(
    bytes: Vec<u8>,
    dest: PathBuf,
    archive_name: &'static str,
) -> Result<usize, SyncError> {
    tokio::task::spawn_blocking(move || -> Result<usize, SyncError> {
        let staging = staging_path(&dest);
        discard_dir(&staging);
        match extract_bundle(&bytes, &staging, archive_name) {
            Ok(files) => {
                publish_dir(&staging, &dest)?;
                Ok(files.len())
            }
            Err(e) => {
                discard_dir(&staging);
                Err(e)
            }
        }
    })
    .await?
}
