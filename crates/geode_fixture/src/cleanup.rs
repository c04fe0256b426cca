// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fs;
use std::path::Path;

/// Removes every subdirectory of `path`, leaving plain files in place.
///
/// Member directories left behind by a previous run are usually what we find here. This never
/// fails: directories that are still locked by a lingering process, or a `path` that does not
/// exist, are logged and skipped. Residue may remain.
pub fn remove_subdirectories(path: &Path) {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(error) => {
            tracing::debug!(path = %path.display(), %error, "skipping cleanup, directory is not readable");
            return;
        }
    };

    for entry in entries.flatten() {
        let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
        if !is_dir {
            continue;
        }

        let dir = entry.path();
        match fs::remove_dir_all(&dir) {
            Ok(()) => tracing::debug!(path = %dir.display(), "removed leftover directory"),
            Err(error) => tracing::debug!(path = %dir.display(), %error, "failed to remove leftover directory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_directories_and_keeps_files() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("locator0/ConfigDiskDir")).unwrap();
        fs::create_dir(root.path().join("server0")).unwrap();
        fs::write(root.path().join("keep.txt"), b"x").unwrap();

        remove_subdirectories(root.path());

        assert!(!root.path().join("locator0").exists());
        assert!(!root.path().join("server0").exists());
        assert!(root.path().join("keep.txt").exists());
    }

    #[test]
    fn missing_directory_is_ignored() {
        let root = tempfile::tempdir().unwrap();

        remove_subdirectories(&root.path().join("does-not-exist"));
    }
}
