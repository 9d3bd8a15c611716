//! Staleness detection for the shared workbook file.
//!
//! The workbook lives on a shared folder and can be edited externally. The
//! coordinator fingerprints the file's modification time on every commit and
//! refuses the next transaction with a `Conflict` error when the file has
//! changed underneath it, instead of silently overwriting the external edit.
//! This is advisory detection, not an OS-level lock: the caller may
//! explicitly override and proceed.

use crate::error::{Result, StoreError};
use std::fs;
use std::path::Path;
use std::time::SystemTime;

/// Modification-time fingerprint of the workbook file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Fingerprint(SystemTime);

impl Fingerprint {
    /// True if the file has been modified after this fingerprint was taken.
    pub fn is_stale(&self, current: Fingerprint) -> bool {
        current.0 > self.0
    }
}

/// Fingerprints the file at `path`. Returns `None` if the file is absent
/// (nothing to be stale against).
pub fn fingerprint(path: &Path) -> Result<Option<Fingerprint>> {
    match fs::metadata(path) {
        Ok(meta) => {
            let modified = meta.modified().map_err(|e| StoreError::from_io(e, path))?;
            Ok(Some(Fingerprint(modified)))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::from_io(e, path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_staleness_ordering() {
        let earlier = Fingerprint(SystemTime::UNIX_EPOCH + Duration::from_secs(100));
        let later = Fingerprint(SystemTime::UNIX_EPOCH + Duration::from_secs(200));

        assert!(earlier.is_stale(later));
        assert!(!later.is_stale(earlier));
        assert!(!earlier.is_stale(earlier));
    }

    #[test]
    fn test_fingerprint_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.wb");
        assert!(fingerprint(&path).unwrap().is_none());
    }

    #[test]
    fn test_fingerprint_tracks_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orders.wb");

        std::fs::write(&path, "first").unwrap();
        let first = fingerprint(&path).unwrap().unwrap();

        // mtime resolution can be coarse, give it headroom
        std::thread::sleep(Duration::from_millis(50));
        std::fs::write(&path, "second").unwrap();
        let second = fingerprint(&path).unwrap().unwrap();

        assert!(first.is_stale(second));
    }
}
