//! Version requests and package specs.
//!
//! A version request is what the user or a package asked for: the `latest`
//! sentinel, an exact dotted version, or a range-shaped string. Ranges are
//! not solved; they resolve to the registry's pin (`dist-tags.latest`).
//! Whatever the user wrote is preserved verbatim so the manifest records
//! requests, not resolutions.

use std::fmt;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum VersionRequest {
    Latest,
    Exact(String),
    Range(String),
}

impl VersionRequest {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("latest") {
            return VersionRequest::Latest;
        }
        if is_exact_version(raw) {
            VersionRequest::Exact(raw.to_string())
        } else {
            VersionRequest::Range(raw.to_string())
        }
    }

    /// The literal string form, as written by the user or the registry.
    pub fn as_str(&self) -> &str {
        match self {
            VersionRequest::Latest => "latest",
            VersionRequest::Exact(v) => v,
            VersionRequest::Range(r) => r,
        }
    }

    /// Whether a lockfile pin of `version` satisfies this request without
    /// consulting the registry again.
    pub fn matches_pin(&self, version: &str) -> bool {
        match self {
            VersionRequest::Exact(v) => v == version,
            // A pin is by definition the registry resolution of a previous
            // run; latest and range requests accept it for reproducibility.
            VersionRequest::Latest | VersionRequest::Range(_) => true,
        }
    }
}

/// An exact version is a plain dotted version string, optionally with a
/// prerelease or build suffix: `1.2.3`, `1.2.3-beta.1`, `2.0.0+build5`.
/// Anything carrying range syntax (`^`, `~`, comparators, wildcards,
/// alternation, spaces) is a range.
fn is_exact_version(s: &str) -> bool {
    let starts_with_digit = s.chars().next().is_some_and(|c| c.is_ascii_digit());
    let version_chars = s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+'));
    let wildcard_component = s
        .split(['.', '-', '+'])
        .any(|part| part.eq_ignore_ascii_case("x") || part == "*");

    starts_with_digit && version_chars && !wildcard_component
}

impl fmt::Display for VersionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for VersionRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for VersionRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(VersionRequest::parse(&raw))
    }
}

/// A parsed `name[@request]` command-line token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub request: VersionRequest,
}

impl PackageSpec {
    /// Split at the last `@`, so scoped names keep their leading `@`:
    /// `@scope/pkg@1.0.0` is name `@scope/pkg`, request `1.0.0`.
    pub fn parse(token: &str) -> Result<Self, Error> {
        let token = token.trim();
        if token.is_empty() || token == "@" {
            return Err(Error::InvalidPackageSpec {
                spec: token.to_string(),
            });
        }

        // Ignore a leading @ (scope marker) when looking for the separator.
        match token[1..].rfind('@').map(|i| i + 1) {
            Some(at) => {
                let name = &token[..at];
                let request = &token[at + 1..];
                if name.is_empty() {
                    return Err(Error::InvalidPackageSpec {
                        spec: token.to_string(),
                    });
                }
                Ok(PackageSpec {
                    name: name.to_string(),
                    request: VersionRequest::parse(request),
                })
            }
            None => Ok(PackageSpec {
                name: token.to_string(),
                request: VersionRequest::Latest,
            }),
        }
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.request)
    }
}
