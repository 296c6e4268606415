//! Atomic file writes for downloaded payloads.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::client::PubChemError;
use crate::models::DownloadResult;

/// Fail early when `path` exists and may not be replaced
pub fn check_destination(path: &Path, overwrite: bool) -> Result<(), PubChemError> {
    if !overwrite && path.exists() {
        return Err(PubChemError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", path.display()),
        )));
    }
    Ok(())
}

/// Write `bytes` to a temporary file beside `path`, then move it into place
///
/// The temporary file is removed if anything fails, so `path` never holds a
/// partial payload.
pub fn write_atomic(
    path: &Path,
    bytes: &[u8],
    overwrite: bool,
) -> Result<DownloadResult, PubChemError> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;

    let mut file = tempfile::NamedTempFile::new_in(&parent)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;

    if overwrite {
        file.persist(path).map_err(|e| PubChemError::Io(e.error))?;
    } else {
        file.persist_noclobber(path)
            .map_err(|e| PubChemError::Io(e.error))?;
    }

    Ok(DownloadResult {
        path: path.to_path_buf(),
        bytes: bytes.len() as u64,
    })
}

/// [`write_atomic`] on the blocking thread pool
pub async fn save(
    path: PathBuf,
    bytes: Vec<u8>,
    overwrite: bool,
) -> Result<DownloadResult, PubChemError> {
    tokio::task::spawn_blocking(move || write_atomic(&path, &bytes, overwrite))
        .await
        .map_err(|e| PubChemError::Io(std::io::Error::other(e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_atomic_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("2244.sdf");

        let result = write_atomic(&path, b"M  END\n$$$$\n", false).unwrap();
        assert_eq!(result.bytes, 12);
        assert_eq!(std::fs::read(&path).unwrap(), b"M  END\n$$$$\n");
    }

    #[test]
    fn test_existing_file_is_kept_without_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "original").unwrap();

        assert!(check_destination(&path, false).is_err());
        assert!(write_atomic(&path, b"new", false).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "original");

        write_atomic(&path, b"new", true).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");

        // no temporary files left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
