//! Progress events emitted by the install pipeline.

use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum InstallProgress {
    /// A request was mapped to a concrete version.
    Resolved { name: String, version: String },
    /// The cache had no entry; the tarball is being fetched.
    FetchStarted { name: String, version: String },
    /// The extracted tree is available in the cache.
    Cached { name: String, version: String },
    /// The package was copied into the install tree.
    Materialized { name: String, version: String },
    /// Executables were linked into `.bin`.
    Linked { name: String, bins: usize },
    /// The item failed; its subtree is abandoned.
    Failed { name: String, message: String },
}

pub type ProgressCallback = Arc<dyn Fn(InstallProgress) + Send + Sync>;
