//! Filesystem utilities for cross-device file operations.
//!
//! Chunk files live next to the final output, but the output directory may
//! be a different mount than the one a caller hands us; renames fall back to
//! copy-and-delete on EXDEV.

use std::fs;
use std::path::Path;

use crate::error::{MediaError, MediaResult};

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// Tries a rename first. On EXDEV it copies to a temporary sibling of
/// `dst` and renames that into place.
pub fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename detected, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst)
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Remove files, logging failures instead of returning them.
pub fn remove_files_best_effort<P: AsRef<Path>>(paths: &[P]) {
    for path in paths {
        let path = path.as_ref();
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    // EXDEV is error code 18 on Linux/macOS
    e.raw_os_error() == Some(18)
}

fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    let tmp_dst = dst.with_extension("tmp");

    fs::copy(src, &tmp_dst).map_err(|e| {
        tracing::error!(
            "Failed to copy file during cross-device move: {} -> {}: {}",
            src.display(),
            tmp_dst.display(),
            e
        );
        MediaError::from(e)
    })?;

    fs::rename(&tmp_dst, dst).map_err(|e| {
        let _ = fs::remove_file(&tmp_dst);
        MediaError::from(e)
    })?;

    if let Err(e) = fs::remove_file(src) {
        tracing::warn!(
            "Failed to remove source file after cross-device move: {}: {}",
            src.display(),
            e
        );
    }

    Ok(())
}
