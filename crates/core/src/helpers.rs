//! Small filesystem helpers shared by the file writers

use crate::error::{FireModelError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Remove whatever currently sits at `path`. A missing file is not an error.
pub(crate) fn remove_existing(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(FireModelError::write(path, e)),
    }
}

/// Delete-then-create `path` with `contents`, returning the absolute path.
pub(crate) fn overwrite(path: &Path, contents: &str) -> Result<PathBuf> {
    remove_existing(path)?;
    fs::write(path, contents).map_err(|e| FireModelError::write(path, e))?;
    std::path::absolute(path).map_err(|e| FireModelError::write(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overwrite_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.txt");
        fs::write(&path, "old contents that are longer").unwrap();

        let written = overwrite(&path, "new").unwrap();

        assert!(written.is_absolute());
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_overwrite_missing_directory_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("run.txt");

        let err = overwrite(&path, "x").unwrap_err();
        assert!(matches!(err, FireModelError::WriteError { .. }));
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remove_existing(&dir.path().join("nothing")).is_ok());
    }
}
