//! The lockfile: the resolved, reproducible dependency graph.
//!
//! One entry per installed package name (the install tree is flat). Keys
//! live in `BTreeMap`s so serialization emits them sorted; combined with
//! stable pretty-printing this makes the lockfile byte-identical across
//! runs that resolve the same graph.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::request::VersionRequest;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Lockfile {
    #[serde(default)]
    pub dependencies: BTreeMap<String, LockEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LockEntry {
    /// Resolved concrete version.
    pub version: String,
    /// Tarball URL the package was fetched from.
    pub resolved: String,
    /// The package that introduced this entry; for roots, the package
    /// name itself.
    pub parent_package: String,
    /// Child requests copied from the registry's version info.
    #[serde(default)]
    pub dependencies: BTreeMap<String, VersionRequest>,
}
