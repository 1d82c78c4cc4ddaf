//! Registry metadata model.
//!
//! The registry serves one JSON document per package name (the packument):
//! dist-tags plus a map from version string to that version's tarball URL
//! and dependency requests. `BTreeMap` keeps every mapping sorted so
//! iteration and serialization are deterministic.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::request::VersionRequest;
use crate::Error;

/// Resolved package identity: the cache, install tree, and lockfile key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageKey {
    pub name: String,
    pub version: String,
}

impl PackageKey {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PackageMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: DistTags,
    #[serde(default)]
    pub versions: BTreeMap<String, VersionInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DistTags {
    #[serde(default)]
    pub latest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct VersionInfo {
    #[serde(default)]
    pub dist: Dist,
    #[serde(default)]
    pub dependencies: BTreeMap<String, VersionRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Dist {
    #[serde(default)]
    pub tarball: String,
}

/// Map a version request to a concrete version in `metadata`.
///
/// `Latest` and range requests take the registry's pin (`dist-tags.latest`);
/// an exact request must name an existing version. Returns the resolved
/// version string together with its `VersionInfo`.
pub fn resolve_version<'a>(
    metadata: &'a PackageMetadata,
    request: &VersionRequest,
) -> Result<(&'a str, &'a VersionInfo), Error> {
    let version = match request {
        VersionRequest::Exact(v) => v.as_str(),
        VersionRequest::Latest | VersionRequest::Range(_) => metadata.dist_tags.latest.as_str(),
    };

    match metadata.versions.get_key_value(version) {
        Some((resolved, info)) => Ok((resolved.as_str(), info)),
        None => Err(Error::VersionNotFound {
            name: metadata.name.clone(),
            version: if version.is_empty() {
                request.as_str().to_string()
            } else {
                version.to_string()
            },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(name: &str, latest: &str, versions: &[&str]) -> PackageMetadata {
        let mut map = BTreeMap::new();
        for v in versions {
            map.insert(
                v.to_string(),
                VersionInfo {
                    dist: Dist {
                        tarball: format!("https://registry.example/{name}/-/{name}-{v}.tgz"),
                    },
                    dependencies: BTreeMap::new(),
                },
            );
        }
        PackageMetadata {
            name: name.to_string(),
            dist_tags: DistTags {
                latest: latest.to_string(),
            },
            versions: map,
        }
    }

    #[test]
    fn latest_resolves_to_dist_tag() {
        let meta = metadata("left-pad", "1.3.0", &["1.2.0", "1.3.0"]);
        let (version, info) = resolve_version(&meta, &VersionRequest::Latest).unwrap();

        assert_eq!(version, "1.3.0");
        assert!(info.dist.tarball.ends_with("left-pad-1.3.0.tgz"));
    }

    #[test]
    fn exact_resolves_to_named_version() {
        let meta = metadata("left-pad", "1.3.0", &["1.2.0", "1.3.0"]);
        let request = VersionRequest::Exact("1.2.0".to_string());
        let (version, _) = resolve_version(&meta, &request).unwrap();

        assert_eq!(version, "1.2.0");
    }

    #[test]
    fn range_takes_the_registry_pin() {
        let meta = metadata("left-pad", "1.3.0", &["1.2.0", "1.3.0"]);
        let request = VersionRequest::parse("^1.0.0");
        let (version, _) = resolve_version(&meta, &request).unwrap();

        assert_eq!(version, "1.3.0");
    }

    #[test]
    fn missing_exact_version_is_an_error() {
        let meta = metadata("left-pad", "1.3.0", &["1.3.0"]);
        let request = VersionRequest::Exact("9.9.9".to_string());
        let err = resolve_version(&meta, &request).unwrap_err();

        assert!(matches!(
            err,
            Error::VersionNotFound { name, version } if name == "left-pad" && version == "9.9.9"
        ));
    }

    #[test]
    fn dangling_dist_tag_is_an_error() {
        let meta = metadata("broken", "2.0.0", &["1.0.0"]);
        let err = resolve_version(&meta, &VersionRequest::Latest).unwrap_err();

        assert!(matches!(err, Error::VersionNotFound { version, .. } if version == "2.0.0"));
    }

    #[test]
    fn packument_deserializes_from_registry_shape() {
        let json = r#"{
            "name": "tiny",
            "dist-tags": { "latest": "0.1.0" },
            "versions": {
                "0.1.0": {
                    "dist": { "tarball": "https://registry.example/tiny/-/tiny-0.1.0.tgz" },
                    "dependencies": { "left-pad": "^1.0.0" }
                }
            }
        }"#;

        let meta: PackageMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.dist_tags.latest, "0.1.0");

        let info = &meta.versions["0.1.0"];
        assert_eq!(
            info.dependencies["left-pad"],
            VersionRequest::parse("^1.0.0")
        );
    }
}
