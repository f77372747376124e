//! Filesystem helpers shared by the resolver, namer and unpacker

use camino::{Utf8Path, Utf8PathBuf};
use nix::unistd::{AccessFlags, access};
use std::path::PathBuf;
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::{Error, Result};

/// Check that a path exists, is a directory and is writable by this process
pub fn is_valid_directory(path: &Utf8Path) -> bool {
    path.is_dir() && access(path.as_std_path(), AccessFlags::W_OK).is_ok()
}

/// Convert a std path into a UTF-8 path
pub fn to_utf8(path: PathBuf) -> Result<Utf8PathBuf> {
    Utf8PathBuf::try_from(path).map_err(|e| {
        Error::config(
            format!("Path is not valid UTF-8: {:?}", e.into_path_buf()),
            "Ensure all file paths contain only valid UTF-8 characters",
        )
    })
}

/// Modification time of a path, or `None` if it cannot be read
pub fn modified(path: &Utf8Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Remove a directory tree, logging instead of failing
///
/// Returns whether the tree is gone afterwards.
pub fn remove_dir_tree(path: &Utf8Path) -> bool {
    if !path.exists() {
        return true;
    }

    match std::fs::remove_dir_all(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Failed to delete directory");
            false
        }
    }
}

/// Copy the tree under `src` into `dst`, preserving symlinks
///
/// Existing files in `dst` are overwritten; entries only present in `dst` are
/// kept.
pub fn copy_dir_recursive(src: &Utf8Path, dst: &Utf8Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;

    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| {
            Error::deploy(
                format!("Cannot walk artifact tree {}: {}", src, e),
                "Check that the artifact directory is readable",
            )
        })?;
        let relative = entry.path().strip_prefix(src).map_err(|_| {
            Error::deploy(
                format!("{} is outside the artifact tree {}", entry.path().display(), src),
                "Avoid copying a directory into itself",
            )
        })?;
        let target = dst.join(to_utf8(relative.to_path_buf())?);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if file_type.is_symlink() {
            if target.is_symlink() || target.exists() {
                std::fs::remove_file(&target)?;
            }
            std::os::unix::fs::symlink(std::fs::read_link(entry.path())?, &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }

    tracing::debug!(src = %src, dst = %dst, "Copied artifact tree");
    Ok(())
}
