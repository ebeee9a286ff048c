//! Synchronization of server-provided bundles
//!
//! Everything the client downloads from the API as an archive lands here:
//! the per-server connection profiles, the TAP drivers and the OpenVPN
//! binaries. Bundles are extracted into a staging directory next to their
//! destination and only renamed into place once fully written, so a failure
//! halfway never leaves a directory that looks complete.

pub mod archive;
pub mod configs;
pub mod downloads;

pub use configs::{ConfigSync, sanitize_profile};
pub use downloads::Downloads;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("API request failed: {0}")]
    Api(#[from] crate::api::ApiError),
    #[error("Config bundle is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("Invalid archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
