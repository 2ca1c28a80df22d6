//! Link classification and the low-level file operations behind it.
//!
//! Classification never follows the link at the target path: a dangling
//! link is still a link, and a link to a directory is still a link.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use mirra_core::paths::normalize;

use crate::error::{io_err, SyncError};

/// What currently occupies a target path, relative to its canonical file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// Nothing exists at the target.
    Absent,
    /// A link whose destination is the canonical file.
    CorrectLink,
    /// A link pointing somewhere else.
    WrongLink { points_to: PathBuf },
    /// A regular file (or directory) that is not a link.
    ForeignFile,
}

/// Classify `target` against `canonical`.
///
/// Both sides are normalized to absolute lexical form before comparison; a
/// relative link destination is interpreted against the link's parent.
pub fn classify(target: &Path, canonical: &Path) -> Result<LinkState, SyncError> {
    let meta = match std::fs::symlink_metadata(target) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(LinkState::Absent),
        Err(err) => return Err(io_err(target, err)),
    };

    if !meta.file_type().is_symlink() {
        return Ok(LinkState::ForeignFile);
    }

    let dest = std::fs::read_link(target).map_err(|e| io_err(target, e))?;
    let dest = link_destination(target, &dest);
    if dest == normalize(canonical) {
        Ok(LinkState::CorrectLink)
    } else {
        Ok(LinkState::WrongLink { points_to: dest })
    }
}

/// Absolute form of a link's stored destination.
fn link_destination(link: &Path, stored: &Path) -> PathBuf {
    if stored.is_absolute() {
        return normalize(stored);
    }
    let parent = link.parent().unwrap_or_else(|| Path::new("."));
    normalize(&parent.join(stored))
}

/// Create a link at `target` pointing to `canonical`, creating parent
/// directories as needed. Fails if anything already exists at `target`.
pub fn create_link(canonical: &Path, target: &Path) -> Result<(), SyncError> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    symlink(canonical, target).map_err(|e| io_err(target, e))
}

/// Remove the link at `target` (the link itself, never its destination).
pub fn remove_link(target: &Path) -> Result<(), SyncError> {
    std::fs::remove_file(target).map_err(|e| io_err(target, e))
}

/// Copy `src` to `dst`, creating parent directories as needed.
pub fn copy_file(src: &Path, dst: &Path) -> Result<(), SyncError> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    std::fs::copy(src, dst).map_err(|e| io_err(dst, e))?;
    Ok(())
}

/// Replace the link at `target` with a real copy of `canonical`.
///
/// A missing target is materialized from the canonical file; a target that
/// is not a link is left alone.
pub fn restore_file(target: &Path, canonical: &Path) -> Result<(), SyncError> {
    match std::fs::symlink_metadata(target) {
        Ok(meta) if !meta.file_type().is_symlink() => return Ok(()),
        Ok(_) => {
            // Stage next to the target so the swap is a same-filesystem rename.
            let tmp = sibling_with_suffix(target, ".mirra.tmp");
            copy_file(canonical, &tmp)?;
            if let Err(err) = std::fs::rename(&tmp, target) {
                let _ = std::fs::remove_file(&tmp);
                return Err(io_err(target, err));
            }
        }
        Err(err) if err.kind() == ErrorKind::NotFound => copy_file(canonical, target)?,
        Err(err) => return Err(io_err(target, err)),
    }
    Ok(())
}

/// `<path><suffix>`, keeping non-UTF-8 names intact.
pub(crate) fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(unix)]
fn symlink(canonical: &Path, target: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(canonical, target)
}

#[cfg(windows)]
fn symlink(canonical: &Path, target: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(canonical, target)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
