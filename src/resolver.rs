//! Map a server's file key to its cached OpenVPN profile

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Failed to resolve configuration, the server cache may be out of date ({0})")]
    ConfigNotFound(String),
    #[error("Failed to read config cache: {0}")]
    Io(#[from] io::Error),
}

pub struct ConfigResolver {
    cache_dir: PathBuf,
}

impl ConfigResolver {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Path of the first cached file whose name contains `file_key`
    ///
    /// Entries are visited in directory-listing order and the first match
    /// wins, even if a later entry matches more closely.
    pub fn resolve(&self, file_key: &str) -> Result<PathBuf, ResolveError> {
        let entries = fs::read_dir(&self.cache_dir).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                ResolveError::ConfigNotFound(format!("no cache at {}", self.cache_dir.display()))
            }
            _ => ResolveError::Io(e),
        })?;

        for entry in entries {
            let entry = entry?;
            if !entry.file_name().to_string_lossy().contains(file_key) {
                continue;
            }

            // Follows symlinks, so a linked profile counts as a file
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if is_blank(&path) {
                return Err(ResolveError::ConfigNotFound("whitespace".to_string()));
            }
            debug!("Resolved {} -> {}", file_key, path.display());
            return Ok(path);
        }

        Err(ResolveError::ConfigNotFound(format!(
            "no profile matches {}",
            file_key
        )))
    }
}

fn is_blank(path: &Path) -> bool {
    path.to_string_lossy().trim().is_empty()
}
