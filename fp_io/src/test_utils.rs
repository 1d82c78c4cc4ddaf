//! Test utilities for fastpack.
//!
//! Common infrastructure for integration and unit tests:
//!
//! - `TestContext` - wraps a TempDir project, a wiremock registry, and an
//!   `Installer` wired against both
//! - `VersionFixture` / `packument_json` - registry metadata fixtures
//! - `package_tarball` - gzip+tar package fixtures, bin files included
//!
//! # Example
//!
//! ```ignore
//! use fp_io::test_utils::TestContext;
//!
//! #[tokio::test]
//! async fn installs_a_package() {
//!     let ctx = TestContext::new().await;
//!     ctx.mount_package("left-pad", "1.3.0", &[]).await;
//!
//!     let report = ctx.install_args(&["left-pad@1.3.0"]).await;
//!     assert!(report.success());
//! }
//! ```

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::install::{InstallMode, InstallReport, Installer};
use crate::project::ProjectLayout;
use crate::registry::{RegistryClient, encode_name};
use fp_core::{Lockfile, Manifest, PackageSpec};

// ============================================================================
// Fixtures
// ============================================================================

/// One version of a package in a registry fixture.
#[derive(Debug, Clone)]
pub struct VersionFixture {
    pub version: String,
    pub deps: Vec<(String, String)>,
    pub bins: Vec<(String, String)>,
}

impl VersionFixture {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            deps: Vec::new(),
            bins: Vec::new(),
        }
    }

    pub fn dep(mut self, name: &str, request: &str) -> Self {
        self.deps.push((name.to_string(), request.to_string()));
        self
    }

    pub fn bin(mut self, name: &str, rel_path: &str) -> Self {
        self.bins.push((name.to_string(), rel_path.to_string()));
        self
    }
}

/// Tarball URL used by fixtures for a given package version.
pub fn tarball_url(base_url: &str, name: &str, version: &str) -> String {
    format!(
        "{base_url}/tarballs/{}-{version}.tgz",
        name.replace('/', "-")
    )
}

/// Build a packument JSON document for `name` with the given versions.
pub fn packument_json(
    base_url: &str,
    name: &str,
    latest: &str,
    versions: &[VersionFixture],
) -> String {
    let mut version_map = serde_json::Map::new();
    for fixture in versions {
        let deps: serde_json::Map<String, serde_json::Value> = fixture
            .deps
            .iter()
            .map(|(dep, request)| (dep.clone(), serde_json::Value::String(request.clone())))
            .collect();
        version_map.insert(
            fixture.version.clone(),
            serde_json::json!({
                "dist": { "tarball": tarball_url(base_url, name, &fixture.version) },
                "dependencies": deps,
            }),
        );
    }

    serde_json::json!({
        "name": name,
        "dist-tags": { "latest": latest },
        "versions": version_map,
    })
    .to_string()
}

/// Build a gzip-compressed package tarball under the conventional
/// `package/` root: a `package.json`, an `index.js`, and one executable
/// file per bin entry.
pub fn package_tarball(name: &str, version: &str, bins: &[(String, String)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());

    let manifest = if bins.is_empty() {
        serde_json::json!({ "name": name, "version": version })
    } else {
        let bin_map: serde_json::Map<String, serde_json::Value> = bins
            .iter()
            .map(|(bin, rel)| (bin.clone(), serde_json::Value::String(rel.clone())))
            .collect();
        serde_json::json!({ "name": name, "version": version, "bin": bin_map })
    };

    append_file(
        &mut builder,
        "package/package.json",
        0o644,
        manifest.to_string().as_bytes(),
    );
    append_file(
        &mut builder,
        "package/index.js",
        0o644,
        format!("module.exports = '{name}@{version}';\n").as_bytes(),
    );
    for (_, rel) in bins {
        let entry = format!("package/{}", rel.trim_start_matches("./"));
        append_file(&mut builder, &entry, 0o755, b"#!/usr/bin/env node\n");
    }

    let tar_data = builder.into_inner().unwrap();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_data).unwrap();
    encoder.finish().unwrap()
}

fn append_file(builder: &mut tar::Builder<Vec<u8>>, path: &str, mode: u32, content: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_path(path).unwrap();
    header.set_size(content.len() as u64);
    header.set_mode(mode);
    header.set_cksum();
    builder.append(&header, content).unwrap();
}

// ============================================================================
// TestContext
// ============================================================================

/// A temp project with a mock registry and an installer wired to both.
pub struct TestContext {
    project: TempDir,
    pub server: MockServer,
    installer: Installer,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_concurrency(8).await
    }

    pub async fn with_concurrency(concurrency: usize) -> Self {
        let project = TempDir::new().unwrap();
        let server = MockServer::start().await;

        let layout = ProjectLayout::new(project.path());
        layout
            .save_manifest(&Manifest::project_default("fixture"))
            .unwrap();

        let registry = RegistryClient::with_base_url(server.uri());
        let installer = Installer::new(layout, registry, concurrency);

        Self {
            project,
            server,
            installer,
        }
    }

    pub fn layout(&self) -> ProjectLayout {
        ProjectLayout::new(self.project.path())
    }

    pub fn installer(&self) -> &Installer {
        &self.installer
    }

    /// Mount a single-version package whose version is also `latest`.
    pub async fn mount_package(&self, name: &str, version: &str, deps: &[(&str, &str)]) {
        let mut fixture = VersionFixture::new(version);
        for (dep, request) in deps {
            fixture = fixture.dep(dep, request);
        }
        self.mount_packument(name, version, &[fixture]).await;
    }

    /// Mount a packument plus one tarball per version.
    pub async fn mount_packument(&self, name: &str, latest: &str, versions: &[VersionFixture]) {
        let body = packument_json(&self.server.uri(), name, latest, versions);

        Mock::given(method("GET"))
            .and(path(format!("/{}", encode_name(name))))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&self.server)
            .await;

        for fixture in versions {
            let tarball = package_tarball(name, &fixture.version, &fixture.bins);
            let tarball_path = format!(
                "/tarballs/{}-{}.tgz",
                name.replace('/', "-"),
                fixture.version
            );
            Mock::given(method("GET"))
                .and(path(tarball_path))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(tarball))
                .mount(&self.server)
                .await;
        }
    }

    pub async fn install_args(&self, tokens: &[&str]) -> InstallReport {
        let specs: Vec<PackageSpec> = tokens
            .iter()
            .map(|token| PackageSpec::parse(token).unwrap())
            .collect();
        self.installer
            .install(InstallMode::ArgumentDriven, specs)
            .await
            .unwrap()
    }

    pub async fn install_manifest(&self) -> InstallReport {
        self.installer
            .install(InstallMode::ManifestDriven, Vec::new())
            .await
            .unwrap()
    }

    // ------------------------------------------------------------------
    // On-disk state readers
    // ------------------------------------------------------------------

    pub fn manifest(&self) -> Manifest {
        self.layout().load_manifest().unwrap()
    }

    pub fn lock(&self) -> Lockfile {
        self.layout().load_lock().unwrap()
    }

    pub fn lock_bytes(&self) -> Vec<u8> {
        fs::read(self.layout().lock_path()).unwrap()
    }

    pub fn modules_lock(&self) -> Lockfile {
        let bytes = fs::read(self.layout().modules_lock_path()).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.layout().package_dir(name)
    }

    pub fn cache_entry(&self, name: &str, version: &str) -> PathBuf {
        self.layout().cache_dir().join(name).join(version)
    }
}
