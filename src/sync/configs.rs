//! Server configuration cache
//!
//! `GET /api/configs` returns every server's OpenVPN profile as one base64
//! zip. The profiles are extracted into the cache directory and any line
//! mentioning `udp6` is dropped, since the tunnel binary cannot use it.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Method;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ConfigResponse};
use crate::sync::SyncError;
use crate::sync::archive::{discard_dir, extract_bundle, publish_dir, staging_path};

/// Transport variant removed from every profile
const DISALLOWED_TRANSPORT: &str = "udp6";

const ARCHIVE_NAME: &str = "configs.zip";

pub struct ConfigSync {
    api: Arc<ApiClient>,
    cache_dir: PathBuf,
    lock: Mutex<()>,
}

impl ConfigSync {
    pub fn new(api: Arc<ApiClient>, cache_dir: PathBuf) -> Self {
        Self {
            api,
            cache_dir,
            lock: Mutex::new(()),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// True when the cache directory exists and holds at least one file
    pub fn is_cached(&self) -> bool {
        is_populated(&self.cache_dir)
    }

    /// Make sure the profile cache is populated, refetching when `force` is set
    ///
    /// A populated cache is trusted regardless of age. Otherwise the directory
    /// is emptied, the bundle fetched, extracted and sanitized in a staging
    /// directory, then moved into place. On failure the cache directory is left
    /// empty so the next call fetches again.
    pub async fn ensure_cached(
        &self,
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        let _guard = self.lock.lock().await;

        if !force && self.is_cached() {
            debug!("Config cache already populated");
            return Ok(());
        }

        if tokio::fs::try_exists(&self.cache_dir).await? {
            tokio::fs::remove_dir_all(&self.cache_dir).await?;
        }
        tokio::fs::create_dir_all(&self.cache_dir).await?;

        info!("Fetching server configs");
        let response: ConfigResponse = self
            .api
            .request_json(Method::GET, "/api/configs", None, cancel)
            .await?;
        let archive = BASE64.decode(response.archive_base64.trim())?;

        let cache_dir = self.cache_dir.clone();
        let count =
            tokio::task::spawn_blocking(move || stage_profiles(&archive, &cache_dir)).await??;

        info!("Cached {} server configs", count);
        Ok(())
    }
}

fn stage_profiles(archive: &[u8], cache_dir: &Path) -> Result<usize, SyncError> {
    let staging = staging_path(cache_dir);
    discard_dir(&staging);

    match extract_and_sanitize(archive, &staging) {
        Ok(count) => {
            publish_dir(&staging, cache_dir)?;
            Ok(count)
        }
        Err(e) => {
            warn!("Config extraction failed: {}", e);
            discard_dir(&staging);
            Err(e)
        }
    }
}

fn extract_and_sanitize(archive: &[u8], staging: &Path) -> Result<usize, SyncError> {
    let files = extract_bundle(archive, staging, ARCHIVE_NAME)?;
    for file in &files {
        // Profiles are not guaranteed to be UTF-8
        let raw = fs::read(file)?;
        fs::write(file, sanitize_profile(&String::from_utf8_lossy(&raw)))?;
    }
    Ok(files.len())
}

/// Drop every line mentioning the disallowed transport, keeping line order
pub fn sanitize_profile(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    for line in content.lines() {
        if line.contains(DISALLOWED_TRANSPORT) {
            continue;
        }
        result.push_str(line);
        result.push('\n');
    }
    result
}

fn is_populated(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .any(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        })
        .unwrap_or(false)
}
