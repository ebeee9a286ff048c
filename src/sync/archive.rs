//! Zip extraction and directory publishing

use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

use crate::sync::SyncError;

/// Sibling directory used to assemble `dest` before publishing it
pub fn staging_path(dest: &Path) -> PathBuf {
    let mut name: OsString = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("bundle"));
    name.push(".staging");
    dest.with_file_name(name)
}

/// Write `bytes` as `archive_name` inside `dest`, extract it there and delete it
///
/// Returns the paths of the extracted regular files.
pub fn extract_bundle(
    bytes: &[u8],
    dest: &Path,
    archive_name: &str,
) -> Result<Vec<PathBuf>, SyncError> {
    fs::create_dir_all(dest)?;

    let archive_path = dest.join(archive_name);
    fs::write(&archive_path, bytes)?;
    let extracted = extract_zip(&archive_path, dest);

    match fs::remove_file(&archive_path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) if extracted.is_ok() => return Err(e.into()),
        Err(_) => {}
    }

    extracted
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<Vec<PathBuf>, SyncError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;
    let mut files = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;

        let outpath = match entry.enclosed_name() {
            Some(path) => dest.join(path),
            None => {
                debug!("Skipping unsafe archive entry {}", entry.name());
                continue;
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = File::create(&outpath)?;
        io::copy(&mut entry, &mut outfile)?;
        files.push(outpath);
    }

    debug!(
        "Extracted {} files from {}",
        files.len(),
        archive_path.display()
    );
    Ok(files)
}

/// Replace `dest` with the fully assembled `staging` directory
pub fn publish_dir(staging: &Path, dest: &Path) -> Result<(), SyncError> {
    if dest.exists() {
        fs::remove_dir_all(dest)?;
    }
    fs::rename(staging, dest)?;
    Ok(())
}

/// Remove a leftover staging directory, ignoring a missing one
pub fn discard_dir(path: &Path) {
    if let Err(e) = fs::remove_dir_all(path) {
        if e.kind() != io::ErrorKind::NotFound {
            debug!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::{Cursor, Write};
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    /// Build an in-memory zip with the given `(name, contents)` entries
    pub fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let raw: Vec<(&str, &[u8])> = entries
            .iter()
            .map(|(name, contents)| (*name, contents.as_bytes()))
            .collect();
        build_zip_bytes(&raw)
    }

    pub fn build_zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(contents).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::build_zip;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_staging_path_is_sibling() {
        let staging = staging_path(Path::new("/home/alice/LightVPN/cache"));
        assert_eq!(staging, PathBuf::from("/home/alice/LightVPN/cache.staging"));
    }

    #[test]
    fn test_extract_bundle_removes_archive() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("out");
        let bytes = build_zip(&[("a.ovpn", "remote a\n"), ("nested/b.ovpn", "remote b\n")]);

        let mut files = extract_bundle(&bytes, &dest, "bundle.zip").unwrap();
        files.sort();

        assert_eq!(files, vec![dest.join("a.ovpn"), dest.join("nested").join("b.ovpn")]);
        assert_eq!(fs::read_to_string(dest.join("a.ovpn")).unwrap(), "remote a\n");
        assert!(!dest.join("bundle.zip").exists());
    }

    #[test]
    fn test_extract_bundle_rejects_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("out");

        let result = extract_bundle(b"not a zip file", &dest, "bundle.zip");
        assert!(matches!(result, Err(SyncError::Archive(_))));
        assert!(!dest.join("bundle.zip").exists());
    }

    #[test]
    fn test_publish_dir_replaces_destination() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("cache");
        let staging = staging_path(&dest);
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("old.ovpn"), "old").unwrap();
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("new.ovpn"), "new").unwrap();

        publish_dir(&staging, &dest).unwrap();

        assert!(!staging.exists());
        assert!(!dest.join("old.ovpn").exists());
        assert_eq!(fs::read_to_string(dest.join("new.ovpn")).unwrap(), "new");
    }

    #[test]
    fn test_discard_missing_dir_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        discard_dir(&temp_dir.path().join("nothing-here"));
    }
}
