//! Executable linking into the shared `.bin` directory.
//!
//! After a package is materialized, its declared executables are linked at
//! `node_modules/.bin/<name>`. Two packages may declare the same bin name;
//! the last writer wins and the replacement is reported. All symlink
//! creation runs behind one mutex so concurrent packages never race on
//! the same link path.

use std::fs;
use std::path::{Path, PathBuf};

use console::style;
use tokio::sync::Mutex;

use crate::fs_util::make_symlink;
use fp_core::{Error, PackageManifest};

#[derive(Debug, Clone)]
pub struct LinkedBin {
    pub name: String,
    pub target: PathBuf,
}

pub struct BinLinker {
    bin_dir: PathBuf,
    lock: Mutex<()>,
}

impl BinLinker {
    pub fn new(bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin_dir: bin_dir.into(),
            lock: Mutex::new(()),
        }
    }

    /// Link every executable declared by the package at `package_dir`.
    /// A package without a manifest or without a `bin` table links nothing.
    pub async fn link_package(&self, package_dir: &Path) -> Result<Vec<LinkedBin>, Error> {
        let manifest_path = package_dir.join("package.json");
        let manifest: PackageManifest = match fs::read(&manifest_path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => return Ok(Vec::new()),
        };

        let package_name = package_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let entries = manifest.bin.entries(if manifest.name.is_empty() {
            &package_name
        } else {
            &manifest.name
        });
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut linked = Vec::new();
        let _guard = self.lock.lock().await;

        fs::create_dir_all(&self.bin_dir).map_err(|e| Error::Filesystem {
            message: format!("failed to create {}: {e}", self.bin_dir.display()),
        })?;

        for (link_name, rel_path) in entries {
            // A link name with path separators could escape .bin entirely.
            if link_name.is_empty() || link_name.contains('/') || link_name.contains('\\') {
                eprintln!(
                    "    {} skipping bin entry '{}' with an unusable name",
                    style("Warning:").yellow(),
                    link_name
                );
                continue;
            }

            let target = package_dir.join(rel_path.trim_start_matches("./"));
            let link = self.bin_dir.join(&link_name);

            if link.symlink_metadata().is_ok() {
                eprintln!(
                    "    {} replacing existing bin link '{}'",
                    style("Warning:").yellow(),
                    link_name
                );
                fs::remove_file(&link).map_err(|e| Error::Filesystem {
                    message: format!("failed to remove {}: {e}", link.display()),
                })?;
            }

            make_symlink(&target, &link).map_err(|e| Error::Filesystem {
                message: format!("failed to link {}: {e}", link.display()),
            })?;

            linked.push(LinkedBin {
                name: link_name,
                target,
            });
        }

        Ok(linked)
    }
}
