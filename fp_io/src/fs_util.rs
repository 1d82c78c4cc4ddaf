//! Filesystem primitives: recursive copy, replace-directory, atomic write.
//!
//! Every durable artifact is produced by writing to a temp name in the
//! same directory and renaming into place, so readers never observe a
//! half-written file.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use fp_core::Error;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A name unique across processes and across calls within this process,
/// for temp files and directories that race against siblings.
pub fn unique_suffix() -> String {
    format!(
        "{}-{}",
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

#[cfg(unix)]
pub fn make_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
pub fn make_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// Recursively copy `src` into `dst`, creating `dst` and any missing
/// parents. Symlinks are copied as symlinks, not followed.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<(), Error> {
    fs::create_dir_all(dst).map_err(|e| Error::Filesystem {
        message: format!("failed to create {}: {e}", dst.display()),
    })?;

    let entries = fs::read_dir(src).map_err(|e| Error::Filesystem {
        message: format!("failed to read {}: {e}", src.display()),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| Error::Filesystem {
            message: format!("failed to read {}: {e}", src.display()),
        })?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        let file_type = entry.file_type().map_err(|e| Error::Filesystem {
            message: format!("failed to stat {}: {e}", src_path.display()),
        })?;

        if file_type.is_dir() {
            copy_dir(&src_path, &dst_path)?;
        } else if file_type.is_symlink() {
            let target = fs::read_link(&src_path).map_err(|e| Error::Filesystem {
                message: format!("failed to read link {}: {e}", src_path.display()),
            })?;
            make_symlink(&target, &dst_path).map_err(|e| Error::Filesystem {
                message: format!("failed to link {}: {e}", dst_path.display()),
            })?;
        } else {
            fs::copy(&src_path, &dst_path).map_err(|e| Error::Filesystem {
                message: format!(
                    "failed to copy {} to {}: {e}",
                    src_path.display(),
                    dst_path.display()
                ),
            })?;
        }
    }

    Ok(())
}

/// Replace `dst` with a copy of `src`, removing any previous contents.
pub fn replace_dir(src: &Path, dst: &Path) -> Result<(), Error> {
    if dst.exists() {
        fs::remove_dir_all(dst).map_err(|e| Error::Filesystem {
            message: format!("failed to remove {}: {e}", dst.display()),
        })?;
    }
    copy_dir(src, dst)
}

/// Write `data` to `path` atomically via a same-directory temp file.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), Error> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artifact");
    let tmp = parent.join(format!(".{file_name}.{}.tmp", unique_suffix()));

    fs::write(&tmp, data).map_err(|e| Error::Filesystem {
        message: format!("failed to write {}: {e}", tmp.display()),
    })?;

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(Error::Filesystem {
            message: format!("failed to rename {} into place: {e}", path.display()),
        });
    }

    Ok(())
}
