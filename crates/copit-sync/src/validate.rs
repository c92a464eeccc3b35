//! Checks run on a source/destination pair before anything is copied.

use std::fs;
use std::path::{Path, PathBuf};

use copit_core::SyncError;

/// A source folder and the destination it is copied into.
///
/// Neither path has to exist when the pair is built; existence is only
/// checked by [`FolderPair::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderPair {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl FolderPair {
    /// Create a new pair.
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// Run [`validate`] on this pair.
    pub fn validate(&self) -> Result<(), SyncError> {
        validate(&self.source, &self.destination)
    }
}

/// Reject a copy that cannot or should not run.
///
/// Checks run in a fixed order and the first failure is returned:
///
/// 1. `source` is an existing directory, else [`SyncError::NoSource`].
/// 2. `dest` is an existing, writable directory, else
///    [`SyncError::NoDestination`].
/// 3. both do not canonicalize to the same path, else
///    [`SyncError::SameDirectory`].
/// 4. `dest` is not below `source`, else [`SyncError::IsChild`].
///
/// Only metadata is read.
pub fn validate(source: &Path, dest: &Path) -> Result<(), SyncError> {
    if !fs::metadata(source).is_ok_and(|m| m.is_dir()) {
        return Err(SyncError::NoSource {
            path: source.to_path_buf(),
        });
    }

    if !fs::metadata(dest).is_ok_and(|m| m.is_dir()) || !is_writable(dest) {
        return Err(SyncError::NoDestination {
            path: dest.to_path_buf(),
        });
    }

    let source_canon = source.canonicalize().map_err(|e| SyncError::io(source, e))?;
    let dest_canon = dest.canonicalize().map_err(|e| SyncError::io(dest, e))?;

    if source_canon == dest_canon {
        return Err(SyncError::SameDirectory { path: source_canon });
    }

    if dest_canon.ancestors().skip(1).any(|a| a == source_canon) {
        return Err(SyncError::IsChild {
            source_dir: source_canon,
            destination: dest_canon,
        });
    }

    Ok(())
}

/// Reject a backup folder that would be created at or below `source`.
///
/// `folder` does not have to exist yet. Its nearest existing ancestor is
/// canonicalized and the missing components are appended to it, so the
/// check runs before anything is created.
pub fn validate_backup_folder(source: &Path, folder: &Path) -> Result<(), SyncError> {
    let source_canon = source.canonicalize().map_err(|e| SyncError::io(source, e))?;
    let folder_resolved = resolve_missing(folder)?;

    if folder_resolved.starts_with(&source_canon) {
        return Err(SyncError::IsChild {
            source_dir: source_canon,
            destination: folder_resolved,
        });
    }

    Ok(())
}

/// Canonicalize the longest existing prefix of `path` and append the rest.
fn resolve_missing(path: &Path) -> Result<PathBuf, SyncError> {
    let mut existing = path;
    let mut missing = Vec::new();

    loop {
        match existing.canonicalize() {
            Ok(mut resolved) => {
                resolved.extend(missing.iter().rev());
                return Ok(resolved);
            }
            Err(e) => match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name);
                    existing = parent;
                }
                _ => return Err(SyncError::io(path, e)),
            },
        }
    }
}

/// Whether the current process may create entries in `dir`.
#[cfg(unix)]
fn is_writable(dir: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(dir.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: `c_path` is a valid NUL-terminated string that outlives the call.
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 }
}

#[cfg(not(unix))]
fn is_writable(dir: &Path) -> bool {
    fs::metadata(dir).is_ok_and(|m| !m.permissions().readonly())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_valid_pair() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        assert!(validate(source.path(), dest.path()).is_ok());
    }

    #[test]
    fn test_missing_source_wins_over_missing_dest() {
        let tmp = TempDir::new().unwrap();
        let err = validate(&tmp.path().join("nope"), &tmp.path().join("nada")).unwrap_err();
        assert!(matches!(err, SyncError::NoSource { .. }));
    }

    #[test]
    fn test_source_is_a_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("photo.jpg");
        std::fs::write(&file, b"jpeg").unwrap();
        let dest = TempDir::new().unwrap();

        let err = validate(&file, dest.path()).unwrap_err();
        assert!(matches!(err, SyncError::NoSource { .. }));
    }

    #[test]
    fn test_dest_is_a_file() {
        let source = TempDir::new().unwrap();
        let file = source.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        let other = TempDir::new().unwrap();

        let err = validate(other.path(), &file).unwrap_err();
        assert!(matches!(err, SyncError::NoDestination { .. }));
    }

    #[test]
    fn test_same_directory_through_relative_segments() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("photos");
        std::fs::create_dir(&dir).unwrap();
        let roundabout = dir.join("..").join("photos");

        let err = validate(&dir, &roundabout).unwrap_err();
        assert!(matches!(err, SyncError::SameDirectory { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_same_directory_through_symlink() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("photos");
        std::fs::create_dir(&dir).unwrap();
        let link = tmp.path().join("link");
        std::os::unix::fs::symlink(&dir, &link).unwrap();

        let err = validate(&dir, &link).unwrap_err();
        assert!(matches!(err, SyncError::SameDirectory { .. }));
    }

    #[test]
    fn test_nested_destination() {
        let source = TempDir::new().unwrap();
        let nested = source.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let err = validate(source.path(), &nested).unwrap_err();
        assert!(matches!(err, SyncError::IsChild { .. }));
    }

    #[test]
    fn test_source_inside_dest_is_allowed() {
        let dest = TempDir::new().unwrap();
        let source = dest.path().join("DCIM");
        std::fs::create_dir(&source).unwrap();

        assert!(validate(&source, dest.path()).is_ok());
    }

    #[test]
    fn test_sibling_with_common_prefix_is_not_a_child() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("photos");
        let dest = tmp.path().join("photos-backup");
        std::fs::create_dir(&source).unwrap();
        std::fs::create_dir(&dest).unwrap();

        assert!(FolderPair::new(&source, &dest).validate().is_ok());
    }

    #[test]
    fn test_backup_folder_below_source() {
        let dest = TempDir::new().unwrap();
        let source = dest.path().join("copit_backup");
        std::fs::create_dir(&source).unwrap();
        let folder = source.join("copit_backup");

        let err = validate_backup_folder(&source, &folder).unwrap_err();
        assert!(matches!(err, SyncError::IsChild { .. }));
        assert!(!folder.exists());

        let err = validate_backup_folder(&source, &source).unwrap_err();
        assert!(matches!(err, SyncError::IsChild { .. }));
    }

    #[test]
    fn test_backup_folder_outside_source() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("DCIM");
        std::fs::create_dir(&source).unwrap();

        let folder = tmp.path().join("copit_backup").join("DCIM");
        assert!(validate_backup_folder(&source, &folder).is_ok());
        assert!(!folder.exists());
    }

    #[test]
    fn test_validation_has_no_side_effects() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        std::fs::write(source.path().join("a.png"), b"png").unwrap();

        for _ in 0..3 {
            validate(source.path(), dest.path()).unwrap();
        }
        assert_eq!(std::fs::read_dir(dest.path()).unwrap().count(), 0);
    }
}
