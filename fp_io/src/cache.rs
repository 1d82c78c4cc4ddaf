//! The shared content-addressed package cache.
//!
//! Keyed by `(name, version)`, laid out as `.cache/<name>/<version>/` with
//! the extracted package tree inside. Population happens at most once per
//! key: within a process, concurrent callers rendezvous on a shared future
//! held in the `ongoing` map; across processes, a per-key advisory file
//! lock serializes populators and an exists-after-rename check resolves
//! the race. A `(name, version)` directory that exists and is non-empty is
//! complete and never revalidated.

use std::collections::HashMap;
use std::fs::{self, File};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs4::fs_std::FileExt;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::extract::extract_tarball;
use crate::fs_util::unique_suffix;
use fp_core::{Error, PackageKey};

type PopulateFuture = Shared<BoxFuture<'static, Result<PathBuf, Error>>>;

pub struct PackageCache {
    root: PathBuf,
    ongoing: Mutex<HashMap<PackageKey, PopulateFuture>>,
}

impl PackageCache {
    /// No directories are created until the first population, so pointing
    /// a cache at an uninitialized project is free.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ongoing: Mutex::new(HashMap::new()),
        }
    }

    pub fn entry_path(&self, key: &PackageKey) -> PathBuf {
        self.root.join(&key.name).join(&key.version)
    }

    /// A cache entry is complete once its directory exists and is
    /// non-empty; a populator never exposes a partial one.
    pub fn has_entry(&self, key: &PackageKey) -> bool {
        dir_is_nonempty(&self.entry_path(key))
    }

    /// Return the extracted tree for `key`, populating it if absent.
    ///
    /// `fetch` is invoked by at most one caller per key per process; it
    /// receives a private temp path and must leave the tarball there.
    /// Concurrent callers for the same key wait on the populator's result.
    pub async fn ensure<F, Fut>(&self, key: &PackageKey, fetch: F) -> Result<PathBuf, Error>
    where
        F: FnOnce(PathBuf) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        let entry_path = self.entry_path(key);

        // Fast path: already populated.
        if dir_is_nonempty(&entry_path) {
            return Ok(entry_path);
        }

        // Under the cache mutex, either join an in-flight population or
        // install our own future and become the populator.
        let (future, we_populate) = {
            let mut ongoing = self.ongoing.lock().expect("cache mutex poisoned");
            if let Some(existing) = ongoing.get(key) {
                (existing.clone(), false)
            } else {
                let future = populate(self.root.clone(), key.clone(), fetch)
                    .boxed()
                    .shared();
                ongoing.insert(key.clone(), future.clone());
                (future, true)
            }
        };

        let result = future.await;

        if we_populate {
            let mut ongoing = self.ongoing.lock().expect("cache mutex poisoned");
            ongoing.remove(key);
        }

        result
    }
}

/// The populator: download to a temp blob, extract into a sibling temp
/// directory, atomically rename into place. Runs outside the cache mutex;
/// the shared future is the only rendezvous.
async fn populate<F, Fut>(root: PathBuf, key: PackageKey, fetch: F) -> Result<PathBuf, Error>
where
    F: FnOnce(PathBuf) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    let entry_path = root.join(&key.name).join(&key.version);
    let name_dir = root.join(&key.name);

    fs::create_dir_all(&name_dir).map_err(|e| Error::Filesystem {
        message: format!("failed to create {}: {e}", name_dir.display()),
    })?;

    // Serialize against other processes populating the same key.
    let _lock_file = acquire_key_lock(&root, &key)?;

    // Double-check after acquiring the lock: another process may have
    // finished while we waited.
    if dir_is_nonempty(&entry_path) {
        return Ok(entry_path);
    }
    if entry_path.exists() {
        // A leftover empty directory would make the final rename ambiguous.
        let _ = fs::remove_dir(&entry_path);
    }

    let suffix = unique_suffix();
    let blob_path = name_dir.join(format!(".{}.{suffix}.tgz", key.version));
    let tmp_dir = name_dir.join(format!("{}.tmp-{suffix}", key.version));

    let downloaded = fetch(blob_path.clone()).await;
    if let Err(e) = downloaded {
        let _ = fs::remove_file(&blob_path);
        return Err(e);
    }

    let extract_result = {
        let blob = blob_path.clone();
        let dir = tmp_dir.clone();
        tokio::task::spawn_blocking(move || {
            fs::create_dir_all(&dir).map_err(|e| Error::Filesystem {
                message: format!("failed to create {}: {e}", dir.display()),
            })?;
            extract_tarball(&blob, &dir)
        })
        .await
        .unwrap_or_else(|e| {
            Err(Error::Filesystem {
                message: format!("extraction task failed: {e}"),
            })
        })
    };

    let _ = fs::remove_file(&blob_path);

    if let Err(e) = extract_result {
        let _ = fs::remove_dir_all(&tmp_dir);
        return Err(e);
    }

    if let Err(e) = fs::rename(&tmp_dir, &entry_path) {
        let _ = fs::remove_dir_all(&tmp_dir);
        // If the target exists, another process won the race and the
        // cache is populated regardless.
        if dir_is_nonempty(&entry_path) {
            return Ok(entry_path);
        }
        return Err(Error::Filesystem {
            message: format!("failed to rename cache entry {}: {e}", entry_path.display()),
        });
    }

    Ok(entry_path)
}

fn acquire_key_lock(root: &Path, key: &PackageKey) -> Result<File, Error> {
    let locks_dir = root.join(".locks");
    fs::create_dir_all(&locks_dir).map_err(|e| Error::Filesystem {
        message: format!("failed to create {}: {e}", locks_dir.display()),
    })?;

    // Scoped names contain a slash; flatten for the lock file name.
    let lock_name = format!("{}+{}.lock", key.name.replace('/', "+"), key.version);
    let lock_file = File::create(locks_dir.join(&lock_name)).map_err(|e| Error::Filesystem {
        message: format!("failed to create lock file {lock_name}: {e}"),
    })?;

    lock_file.lock_exclusive().map_err(|e| Error::Filesystem {
        message: format!("failed to acquire lock {lock_name}: {e}"),
    })?;

    Ok(lock_file)
}

fn dir_is_nonempty(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn test_tarball(content: &[u8]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_path("package/index.js").unwrap();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, content).unwrap();
        let tar_data = builder.into_inner().unwrap();

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&tar_data).unwrap();
        encoder.finish().unwrap()
    }

    fn write_fetch(bytes: Vec<u8>) -> impl FnOnce(PathBuf) -> BoxFuture<'static, Result<(), Error>> {
        move |blob: PathBuf| {
            async move {
                fs::write(&blob, bytes).map_err(|e| Error::Filesystem {
                    message: e.to_string(),
                })
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn populates_and_reuses_an_entry() {
        let tmp = TempDir::new().unwrap();
        let cache = PackageCache::new(tmp.path());
        let key = PackageKey::new("left-pad", "1.3.0");

        let path = cache
            .ensure(&key, write_fetch(test_tarball(b"module.exports = pad;")))
            .await
            .unwrap();

        assert_eq!(path, tmp.path().join("left-pad/1.3.0"));
        assert!(path.join("index.js").exists());

        // Second call takes the fast path; a failing fetch proves it was
        // never invoked.
        let again = cache
            .ensure(&key, |_blob: PathBuf| {
                async {
                    Err(Error::Filesystem {
                        message: "fetch must not run for a populated entry".to_string(),
                    })
                }
                .boxed()
            })
            .await
            .unwrap();
        assert_eq!(again, path);
    }

    #[tokio::test]
    async fn concurrent_callers_fetch_once() {
        let tmp = TempDir::new().unwrap();
        let cache = Arc::new(PackageCache::new(tmp.path()));
        let key = PackageKey::new("is-odd", "3.0.1");
        let fetches = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            let fetches = Arc::clone(&fetches);
            handles.push(tokio::spawn(async move {
                cache
                    .ensure(&key, move |blob: PathBuf| {
                        async move {
                            fetches.fetch_add(1, Ordering::SeqCst);
                            // Give other callers time to pile onto the map.
                            tokio::time::sleep(std::time::Duration::from_millis(25)).await;
                            fs::write(&blob, test_tarball(b"odd")).map_err(|e| {
                                Error::Filesystem {
                                    message: e.to_string(),
                                }
                            })
                        }
                        .boxed()
                    })
                    .await
            }));
        }

        for handle in handles {
            let path = handle.await.unwrap().unwrap();
            assert!(path.join("index.js").exists());
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_population_leaves_no_entry_and_allows_retry() {
        let tmp = TempDir::new().unwrap();
        let cache = PackageCache::new(tmp.path());
        let key = PackageKey::new("flaky", "1.0.0");

        let err = cache
            .ensure(&key, |_blob: PathBuf| {
                async {
                    Err(Error::DownloadFailed {
                        url: "https://registry.example/flaky-1.0.0.tgz".to_string(),
                        message: "HTTP 502".to_string(),
                    })
                }
                .boxed()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DownloadFailed { .. }));
        assert!(!cache.has_entry(&key));

        // No half-written temp directories survive the failure.
        let leftovers: Vec<_> = fs::read_dir(tmp.path().join("flaky"))
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert!(leftovers.is_empty(), "leftovers: {leftovers:?}");

        let path = cache
            .ensure(&key, write_fetch(test_tarball(b"recovered")))
            .await
            .unwrap();
        assert!(path.join("index.js").exists());
    }

    #[tokio::test]
    async fn corrupt_tarball_discards_the_blob() {
        let tmp = TempDir::new().unwrap();
        let cache = PackageCache::new(tmp.path());
        let key = PackageKey::new("corrupt", "0.0.1");

        let err = cache
            .ensure(&key, write_fetch(b"not a gzip stream".to_vec()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ExtractFailed { .. }));
        assert!(!cache.has_entry(&key));
    }

    #[tokio::test]
    async fn scoped_names_nest_under_the_scope_directory() {
        let tmp = TempDir::new().unwrap();
        let cache = PackageCache::new(tmp.path());
        let key = PackageKey::new("@scope/pkg", "2.0.0");

        let path = cache
            .ensure(&key, write_fetch(test_tarball(b"scoped")))
            .await
            .unwrap();

        assert_eq!(path, tmp.path().join("@scope/pkg/2.0.0"));
        assert!(path.join("index.js").exists());
    }
}
