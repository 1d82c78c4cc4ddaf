//! Tarball extraction.
//!
//! Registry archives are gzip-compressed tarballs whose entries live under
//! a single `package/` root; that component is stripped on the way out.
//! Extraction into a fresh directory is idempotent but not safe against
//! concurrent writers on the same destination; the cache serializes that.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};

use crate::fs_util::make_symlink;
use fp_core::Error;

pub fn extract_tarball(tarball: &Path, dest: &Path) -> Result<(), Error> {
    let file = File::open(tarball).map_err(|e| Error::Filesystem {
        message: format!("failed to open {}: {e}", tarball.display()),
    })?;

    let mut archive = Archive::new(GzDecoder::new(file));
    let entries = archive.entries().map_err(extract_err)?;

    for entry in entries {
        let mut entry = entry.map_err(extract_err)?;
        let raw = entry.path().map_err(extract_err)?.into_owned();

        let stripped = match raw.strip_prefix("package") {
            Ok(rest) => rest.to_path_buf(),
            // No conventional root: extract under the literal name.
            Err(_) => raw.clone(),
        };

        let rel = safe_relative(&raw, &stripped)?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(&rel);

        match entry.header().entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&target).map_err(|e| Error::Filesystem {
                    message: format!("failed to create {}: {e}", target.display()),
                })?;
                set_mode(&target, 0o755)?;
            }
            EntryType::Symlink => {
                let link_target = entry
                    .link_name()
                    .map_err(extract_err)?
                    .ok_or_else(|| Error::ExtractFailed {
                        message: format!("symlink entry '{}' has no target", raw.display()),
                    })?
                    .into_owned();

                create_parent(&target)?;
                if target.symlink_metadata().is_ok() {
                    let _ = fs::remove_file(&target);
                }
                // Recreated, never followed.
                make_symlink(&link_target, &target).map_err(|e| Error::Filesystem {
                    message: format!("failed to link {}: {e}", target.display()),
                })?;
            }
            EntryType::Regular | EntryType::Continuous => {
                create_parent(&target)?;
                let mut out = File::create(&target).map_err(|e| Error::Filesystem {
                    message: format!("failed to create {}: {e}", target.display()),
                })?;
                io::copy(&mut entry, &mut out).map_err(extract_err)?;

                let mode = entry.header().mode().unwrap_or(0o644);
                set_mode(&target, mode & 0o777)?;
            }
            // Hard links, fifos, and metadata entries have no place in a
            // registry package; skip them.
            _ => {}
        }
    }

    Ok(())
}

/// Clean `stripped` into a destination-relative path, rejecting anything
/// that could escape the destination. `raw` is only used for diagnostics.
fn safe_relative(raw: &Path, stripped: &Path) -> Result<PathBuf, Error> {
    let mut clean = PathBuf::new();
    for component in stripped.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::UnsafeArchivePath {
                    entry: raw.display().to_string(),
                });
            }
        }
    }
    Ok(clean)
}

fn create_parent(target: &Path) -> Result<(), Error> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::Filesystem {
            message: format!("failed to create {}: {e}", parent.display()),
        })?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), Error> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| Error::Filesystem {
        message: format!("failed to set mode on {}: {e}", path.display()),
    })
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), Error> {
    Ok(())
}

fn extract_err(e: io::Error) -> Error {
    Error::ExtractFailed {
        message: e.to_string(),
    }
}
