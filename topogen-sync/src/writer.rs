//! Change detection and the staged atomic write.
//!
//! ## Protocol
//!
//! 1. SHA-256 the rendered bytes and the current destination (if any).
//! 2. Equal digests: stop. No staging file, no write, no commands.
//! 3. Otherwise write a hidden sibling `.<basename>-XXXXXX` in the
//!    destination's directory, copying the destination's mode and owner.
//! 4. Rename the staging file onto the destination.
//! 5. On `EBUSY` / `EXDEV`, copy the bytes over instead (non-atomic), then
//!    copy mode and owner from the staging file.

use std::fs::{self, Metadata};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{io_err, SyncError};

/// `rename(2)` failures that the copy fallback handles (`EBUSY`, `EXDEV`).
fn needs_copy_fallback(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::ResourceBusy | ErrorKind::CrossesDevices
    )
}

// ---------------------------------------------------------------------------
// Change detection
// ---------------------------------------------------------------------------

/// Hex SHA-256 of `bytes`.
pub fn content_digest(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

/// Hex SHA-256 of the file at `path`, or `None` when it does not exist.
pub fn file_digest(path: &Path) -> Result<Option<String>, SyncError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(content_digest(&bytes))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SyncError::Compare {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Whether `dest` already holds exactly `rendered`.
///
/// A missing destination never matches.
pub fn is_unchanged(dest: &Path, rendered: &[u8]) -> Result<bool, SyncError> {
    let current = file_digest(dest)?;
    Ok(current.as_deref() == Some(content_digest(rendered).as_str()))
}

// ---------------------------------------------------------------------------
// Staging
// ---------------------------------------------------------------------------

/// Write `content` to a fresh hidden sibling of `dest` and return its path.
///
/// When `dest` exists its permission bits and owner/group are copied onto the
/// staging file. The staging file is left on disk; the caller swaps it in and
/// removes whatever remains.
pub fn stage(dest: &Path, content: &[u8]) -> Result<PathBuf, SyncError> {
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let basename = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut staged = tempfile::Builder::new()
        .prefix(&format!(".{basename}-"))
        .tempfile_in(dir)
        .map_err(|e| io_err(dir, e))?;
    staged
        .write_all(content)
        .map_err(|e| io_err(staged.path(), e))?;

    match fs::metadata(dest) {
        Ok(existing) => copy_attributes_to_file(&existing, staged.as_file(), staged.path())?,
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(dest, e)),
    }

    let (_file, path) = staged.keep().map_err(|e| io_err(dir, e.error))?;
    tracing::debug!("staged {} for {}", path.display(), dest.display());
    Ok(path)
}

fn copy_attributes_to_file(
    from: &Metadata,
    file: &fs::File,
    path: &Path,
) -> Result<(), SyncError> {
    file.set_permissions(from.permissions())
        .map_err(|e| io_err(path, e))?;
    std::os::unix::fs::fchown(file, Some(from.uid()), Some(from.gid()))
        .map_err(|e| io_err(path, e))
}

// ---------------------------------------------------------------------------
// Swap
// ---------------------------------------------------------------------------

/// How the staging file reached its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapMethod {
    /// Atomic `rename(2)`.
    Renamed,
    /// Cross-device fallback: content copied, staging file left behind.
    Copied,
}

/// Move `staging` onto `dest`.
pub fn swap_into_place(staging: &Path, dest: &Path) -> Result<SwapMethod, SyncError> {
    swap_into_place_with(staging, dest, |from, to| fs::rename(from, to))
}

/// [`swap_into_place`] with an injectable rename, for exercising the fallback.
pub fn swap_into_place_with<F>(
    staging: &Path,
    dest: &Path,
    rename: F,
) -> Result<SwapMethod, SyncError>
where
    F: FnOnce(&Path, &Path) -> std::io::Result<()>,
{
    match rename(staging, dest) {
        Ok(()) => Ok(SwapMethod::Renamed),
        Err(e) if needs_copy_fallback(&e) => {
            tracing::debug!(
                "rename {} -> {} failed ({e}), copying instead",
                staging.display(),
                dest.display()
            );
            copy_into_place(staging, dest)?;
            Ok(SwapMethod::Copied)
        }
        Err(e) => Err(io_err(dest, e)),
    }
}

fn copy_into_place(staging: &Path, dest: &Path) -> Result<(), SyncError> {
    let content = fs::read(staging).map_err(|e| io_err(staging, e))?;
    fs::write(dest, content).map_err(|e| io_err(dest, e))?;
    let meta = fs::metadata(staging).map_err(|e| io_err(staging, e))?;
    fs::set_permissions(dest, meta.permissions()).map_err(|e| io_err(dest, e))?;
    std::os::unix::fs::chown(dest, Some(meta.uid()), Some(meta.gid()))
        .map_err(|e| io_err(dest, e))
}

/// Remove a leftover staging file. Already-gone is fine.
pub fn remove_staging(staging: &Path) {
    match fs::remove_file(staging) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("could not remove {}: {e}", staging.display()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
