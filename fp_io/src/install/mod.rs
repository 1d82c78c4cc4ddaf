//! The resolver/installer pipeline.
//!
//! An explicit work queue replaces recursive installation: every work item
//! resolves a request, populates the cache, records the lock entry,
//! materializes the package into `node_modules`, links its executables,
//! and enqueues its children. A claim set of package names is the sole
//! synchronization point for graph walking; it both dedups (the install
//! tree is flat) and terminates cycles.
//!
//! Every queued item carries its own sender clone, so the channel closes
//! exactly when no task that could still enqueue work remains. That makes
//! "queue empty and no worker active" a single observable event: the
//! receiver returning `None`.


use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use console::style;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinSet;

use crate::cache::PackageCache;
use crate::fs_util;
use crate::link::BinLinker;
use crate::progress::{InstallProgress, ProgressCallback};
use crate::project::ProjectLayout;
use crate::registry::RegistryClient;
use fp_core::{
    Error, LockEntry, Lockfile, Manifest, PackageKey, PackageSpec, VersionRequest,
    resolve_version,
};

/// Caps simultaneous HTTP fetches and filesystem writers.
pub const DEFAULT_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    /// Install the manifest's declared dependencies.
    ManifestDriven,
    /// Install the named packages and record them in the manifest.
    ArgumentDriven,
}

/// Summary of an install run. Per-item errors do not abort the pipeline;
/// the run succeeded only if no item failed.
#[derive(Debug)]
pub struct InstallReport {
    pub installed: usize,
    pub failed: usize,
    pub first_error: Option<Error>,
}

impl InstallReport {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Debug, Clone)]
struct WorkItem {
    name: String,
    request: VersionRequest,
    /// The package that introduced this item; `None` for roots.
    parent: Option<String>,
}

/// A queued item owns a sender clone; see the module docs for why.
struct Queued {
    item: WorkItem,
    tx: UnboundedSender<Queued>,
}

struct GraphState {
    manifest: Manifest,
    lock: Lockfile,
}

struct PipelineState {
    registry: RegistryClient,
    cache: PackageCache,
    linker: BinLinker,
    layout: ProjectLayout,
    /// Lockfile loaded at the start of the run; pins that satisfy a
    /// request are served from here without consulting the registry.
    prior_lock: Lockfile,
    /// Names claimed in this run. Held only across membership test +
    /// insert.
    claimed: Mutex<HashSet<String>>,
    /// The manifest and lockfile under construction. Held only across
    /// mutation.
    graph: Mutex<GraphState>,
    semaphore: Semaphore,
    /// Set on fatal errors; short-circuits admission of new work.
    cancelled: AtomicBool,
    installed: AtomicUsize,
    failed: AtomicUsize,
    first_error: Mutex<Option<Error>>,
    progress: Option<ProgressCallback>,
}

impl PipelineState {
    fn report(&self, event: InstallProgress) {
        if let Some(ref callback) = self.progress {
            callback(event);
        }
    }

    fn record_failure(&self, item: &WorkItem, error: Error) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        eprintln!(
            "    {} {}@{}: {}",
            style("Failed").red().bold(),
            item.name,
            item.request,
            error
        );
        self.report(InstallProgress::Failed {
            name: item.name.clone(),
            message: error.to_string(),
        });

        if matches!(error, Error::Filesystem { .. }) {
            // The filesystem is in an unknown state; stop taking on new
            // work but let in-flight items drain so no temp dirs orphan.
            self.cancelled.store(true, Ordering::Relaxed);
        }

        let mut slot = self.first_error.lock().expect("error slot poisoned");
        if slot.is_none() {
            *slot = Some(error);
        }
    }
}

pub struct Installer {
    registry: RegistryClient,
    layout: ProjectLayout,
    concurrency: usize,
    progress: Option<ProgressCallback>,
}

impl Installer {
    pub fn new(layout: ProjectLayout, registry: RegistryClient, concurrency: usize) -> Self {
        Self {
            registry,
            layout,
            concurrency: concurrency.max(1),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Run a full install. `specs` is consulted only in
    /// [`InstallMode::ArgumentDriven`]; manifest-driven installs enqueue
    /// each declared dependency with its declared request.
    ///
    /// Returns `Err` only for failures outside the pipeline (missing
    /// manifest, final persistence). Item-level failures land in the
    /// report.
    pub async fn install(
        &self,
        mode: InstallMode,
        specs: Vec<PackageSpec>,
    ) -> Result<InstallReport, Error> {
        let manifest = self.layout.load_manifest()?;
        let prior_lock = self.layout.load_lock()?;
        self.layout.ensure_dirs()?;

        let seeds: Vec<WorkItem> = match mode {
            InstallMode::ArgumentDriven => specs
                .into_iter()
                .map(|spec| WorkItem {
                    name: spec.name,
                    request: spec.request,
                    parent: None,
                })
                .collect(),
            InstallMode::ManifestDriven => manifest
                .dependencies
                .iter()
                .map(|(name, request)| WorkItem {
                    name: name.clone(),
                    request: request.clone(),
                    parent: None,
                })
                .collect(),
        };

        let state = Arc::new(PipelineState {
            registry: self.registry.clone(),
            cache: PackageCache::new(self.layout.cache_dir()),
            linker: BinLinker::new(self.layout.bin_dir()),
            layout: self.layout.clone(),
            prior_lock,
            claimed: Mutex::new(HashSet::new()),
            graph: Mutex::new(GraphState {
                manifest,
                lock: Lockfile::default(),
            }),
            semaphore: Semaphore::new(self.concurrency),
            cancelled: AtomicBool::new(false),
            installed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            first_error: Mutex::new(None),
            progress: self.progress.clone(),
        });

        // Claim every root before any worker starts: a declared root must
        // win over a transitive request for the same name regardless of
        // scheduling. Duplicate arguments collapse here too.
        let seeds: Vec<WorkItem> = {
            let mut claimed = state.claimed.lock().expect("claim set poisoned");
            seeds
                .into_iter()
                .filter(|item| claimed.insert(item.name.clone()))
                .collect()
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<Queued>();
        for item in seeds {
            let _ = tx.send(Queued {
                item,
                tx: tx.clone(),
            });
        }
        drop(tx);

        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                queued = rx.recv() => match queued {
                    Some(Queued { item, tx }) => {
                        tasks.spawn(process_item(Arc::clone(&state), item, tx));
                    }
                    // All senders gone: the queue is drained and no
                    // running task can enqueue more.
                    None => break,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if joined.is_err() {
                        state.failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }
        while let Some(joined) = tasks.join_next().await {
            if joined.is_err() {
                state.failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        // Persist exactly once, after full drain. Single-threaded from
        // here on; the mutexes are uncontended.
        let (manifest, lock) = {
            let graph = state.graph.lock().expect("graph poisoned");
            (graph.manifest.clone(), graph.lock.clone())
        };
        self.layout.save_manifest(&manifest)?;
        self.layout.save_lock(&lock)?;
        self.layout.save_modules_lock(&lock)?;

        Ok(InstallReport {
            installed: state.installed.load(Ordering::Relaxed),
            failed: state.failed.load(Ordering::Relaxed),
            first_error: state.first_error.lock().expect("error slot poisoned").take(),
        })
    }
}

async fn process_item(state: Arc<PipelineState>, item: WorkItem, tx: UnboundedSender<Queued>) {
    if state.cancelled.load(Ordering::Relaxed) {
        return;
    }

    // Roots were claimed during seeding; transitive items claim here.
    // Losing the claim means the name is already installing in this run
    // (or a cycle led back to it): drop the item, even if the requested
    // version differs. That is the flat layout's documented trade-off.
    if item.parent.is_some() {
        let mut claimed = state.claimed.lock().expect("claim set poisoned");
        if !claimed.insert(item.name.clone()) {
            return;
        }
    }

    let _permit = match state.semaphore.acquire().await {
        Ok(permit) => permit,
        Err(_) => return,
    };

    match run_item(&state, &item).await {
        Ok(children) => {
            state.installed.fetch_add(1, Ordering::Relaxed);
            for (name, request) in children {
                let child = WorkItem {
                    name,
                    request,
                    parent: Some(item.name.clone()),
                };
                let _ = tx.send(Queued {
                    item: child,
                    tx: tx.clone(),
                });
            }
        }
        Err(error) => state.record_failure(&item, error),
    }
}

struct ResolvedPackage {
    version: String,
    tarball: String,
    dependencies: BTreeMap<String, VersionRequest>,
}

/// Resolve a request to a concrete version, tarball URL, and child
/// requests.
///
/// A lockfile pin that satisfies the request short-circuits the registry
/// entirely: the pinned version, tarball URL, and child requests are
/// reused. With a warm cache that makes reinstalls fully offline; with a
/// cold cache only the tarball itself is fetched.
async fn resolve_item(state: &PipelineState, item: &WorkItem) -> Result<ResolvedPackage, Error> {
    if let Some(entry) = state.prior_lock.dependencies.get(&item.name)
        && item.request.matches_pin(&entry.version)
    {
        return Ok(ResolvedPackage {
            version: entry.version.clone(),
            tarball: entry.resolved.clone(),
            dependencies: entry.dependencies.clone(),
        });
    }

    let metadata = state.registry.fetch_metadata(&item.name).await?;
    let (version, info) = resolve_version(&metadata, &item.request)?;

    Ok(ResolvedPackage {
        version: version.to_string(),
        tarball: info.dist.tarball.clone(),
        dependencies: info.dependencies.clone(),
    })
}

/// The per-item protocol: resolve, populate the cache, record the lock
/// entry, materialize, link. Returns the child requests to enqueue.
async fn run_item(
    state: &PipelineState,
    item: &WorkItem,
) -> Result<Vec<(String, VersionRequest)>, Error> {
    let resolved = resolve_item(state, item).await?;
    state.report(InstallProgress::Resolved {
        name: item.name.clone(),
        version: resolved.version.clone(),
    });

    let key = PackageKey::new(item.name.clone(), resolved.version.clone());
    if !state.cache.has_entry(&key) {
        state.report(InstallProgress::FetchStarted {
            name: item.name.clone(),
            version: resolved.version.clone(),
        });
    }

    let cache_path = {
        let registry = state.registry.clone();
        let url = resolved.tarball.clone();
        state
            .cache
            .ensure(&key, move |blob| async move {
                registry.download_tarball(&url, &blob).await
            })
            .await?
    };
    state.report(InstallProgress::Cached {
        name: item.name.clone(),
        version: resolved.version.clone(),
    });

    {
        let mut graph = state.graph.lock().expect("graph poisoned");
        if item.parent.is_none() {
            // The manifest records the user's request, not the resolved
            // version; `dependencies` is a request, not a pin.
            graph
                .manifest
                .dependencies
                .insert(item.name.clone(), item.request.clone());
        }
        graph.lock.dependencies.insert(
            item.name.clone(),
            LockEntry {
                version: resolved.version.clone(),
                resolved: resolved.tarball.clone(),
                parent_package: item.parent.clone().unwrap_or_else(|| item.name.clone()),
                dependencies: resolved.dependencies.clone(),
            },
        );
    }

    // Copy rather than symlink: the install tree stays self-contained
    // and survives cache eviction.
    let dest = state.layout.package_dir(&item.name);
    {
        let src = cache_path.clone();
        let dest = dest.clone();
        tokio::task::spawn_blocking(move || fs_util::replace_dir(&src, &dest))
            .await
            .unwrap_or_else(|e| {
                Err(Error::Filesystem {
                    message: format!("copy task failed: {e}"),
                })
            })?;
    }
    state.report(InstallProgress::Materialized {
        name: item.name.clone(),
        version: resolved.version.clone(),
    });

    let linked = state.linker.link_package(&dest).await?;
    state.report(InstallProgress::Linked {
        name: item.name.clone(),
        bins: linked.len(),
    });

    Ok(resolved.dependencies.into_iter().collect())
}
