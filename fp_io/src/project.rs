//! Project layout and the manifest/lock store.
//!
//! All paths are relative to one project root:
//!
//! - `dependencies.json` — the root manifest (human-edited)
//! - `dependencies-lock.json` — the lockfile (machine-written)
//! - `.cache/<name>/<version>/` — the content-addressed cache
//! - `node_modules/<name>/` — the flat install tree
//! - `node_modules/.bin/` — linked executables
//! - `node_modules/.package-lock.json` — lockfile mirror for tooling

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::fs_util::atomic_write;
use fp_core::{Error, Lockfile, Manifest};

pub const MANIFEST_FILE: &str = "dependencies.json";
pub const LOCK_FILE: &str = "dependencies-lock.json";
pub const CACHE_DIR: &str = ".cache";
pub const MODULES_DIR: &str = "node_modules";

#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(CACHE_DIR)
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.root.join(MODULES_DIR)
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.modules_dir().join(".bin")
    }

    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.modules_dir().join(name)
    }

    pub fn modules_lock_path(&self) -> PathBuf {
        self.modules_dir().join(".package-lock.json")
    }

    /// Recreate the working directories an install needs. Deleting
    /// `.cache` or `node_modules` between runs is supported.
    pub fn ensure_dirs(&self) -> Result<(), Error> {
        for dir in [self.cache_dir(), self.modules_dir()] {
            fs::create_dir_all(&dir).map_err(|e| Error::Filesystem {
                message: format!("failed to create {}: {e}", dir.display()),
            })?;
        }
        Ok(())
    }

    /// Load the root manifest. A missing or empty file is a user error:
    /// the project has not been initialized.
    pub fn load_manifest(&self) -> Result<Manifest, Error> {
        let path = self.manifest_path();
        match fs::read(&path) {
            Ok(bytes) if !bytes.is_empty() => {
                serde_json::from_slice(&bytes).map_err(|e| Error::ManifestInvalid {
                    path,
                    message: e.to_string(),
                })
            }
            Ok(_) => Err(Error::ManifestMissing { path }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::ManifestMissing { path })
            }
            Err(e) => Err(Error::Filesystem {
                message: format!("failed to read {}: {e}", path.display()),
            }),
        }
    }

    /// Load the lockfile. Missing or empty means a fresh resolution.
    pub fn load_lock(&self) -> Result<Lockfile, Error> {
        let path = self.lock_path();
        match fs::read(&path) {
            Ok(bytes) if !bytes.is_empty() => {
                serde_json::from_slice(&bytes).map_err(|e| Error::ManifestInvalid {
                    path,
                    message: e.to_string(),
                })
            }
            Ok(_) => Ok(Lockfile::default()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Lockfile::default()),
            Err(e) => Err(Error::Filesystem {
                message: format!("failed to read {}: {e}", path.display()),
            }),
        }
    }

    pub fn save_manifest(&self, manifest: &Manifest) -> Result<(), Error> {
        save_json(&self.manifest_path(), manifest)
    }

    pub fn save_lock(&self, lock: &Lockfile) -> Result<(), Error> {
        save_json(&self.lock_path(), lock)
    }

    /// The `.package-lock.json` mirror inside the install tree.
    pub fn save_modules_lock(&self, lock: &Lockfile) -> Result<(), Error> {
        save_json(&self.modules_lock_path(), lock)
    }
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), Error> {
    let mut bytes = serde_json::to_vec_pretty(value).map_err(|e| Error::Filesystem {
        message: format!("failed to serialize {}: {e}", path.display()),
    })?;
    bytes.push(b'\n');
    atomic_write(path, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fp_core::VersionRequest;
    use tempfile::TempDir;

    #[test]
    fn missing_manifest_is_a_user_error() {
        let tmp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(tmp.path());

        let err = layout.load_manifest().unwrap_err();
        assert!(matches!(err, Error::ManifestMissing { .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn empty_manifest_is_a_user_error() {
        let tmp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(tmp.path());
        fs::write(layout.manifest_path(), b"").unwrap();

        let err = layout.load_manifest().unwrap_err();
        assert!(matches!(err, Error::ManifestMissing { .. }));
    }

    #[test]
    fn malformed_manifest_reports_the_parse_error() {
        let tmp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(tmp.path());
        fs::write(layout.manifest_path(), b"{ nope").unwrap();

        let err = layout.load_manifest().unwrap_err();
        assert!(matches!(err, Error::ManifestInvalid { .. }));
    }

    #[test]
    fn missing_lock_yields_a_fresh_one() {
        let tmp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(tmp.path());

        let lock = layout.load_lock().unwrap();
        assert!(lock.dependencies.is_empty());
    }

    #[test]
    fn manifest_round_trips_and_misses_nothing() {
        let tmp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(tmp.path());

        let mut manifest = Manifest::project_default("roundtrip");
        manifest
            .dependencies
            .insert("left-pad".to_string(), VersionRequest::parse("1.3.0"));

        layout.save_manifest(&manifest).unwrap();
        let loaded = layout.load_manifest().unwrap();
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn saved_lock_is_byte_stable() {
        let tmp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(tmp.path());

        let mut lock = Lockfile::default();
        lock.dependencies.insert(
            "left-pad".to_string(),
            fp_core::LockEntry {
                version: "1.3.0".to_string(),
                resolved: "https://registry.example/left-pad-1.3.0.tgz".to_string(),
                parent_package: "left-pad".to_string(),
                dependencies: Default::default(),
            },
        );

        layout.save_lock(&lock).unwrap();
        let first = fs::read(layout.lock_path()).unwrap();

        layout.save_lock(&lock).unwrap();
        let second = fs::read(layout.lock_path()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn ensure_dirs_recreates_deleted_trees() {
        let tmp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(tmp.path());

        layout.ensure_dirs().unwrap();
        assert!(layout.cache_dir().is_dir());
        assert!(layout.modules_dir().is_dir());

        fs::remove_dir_all(layout.modules_dir()).unwrap();
        layout.ensure_dirs().unwrap();
        assert!(layout.modules_dir().is_dir());
    }
}
