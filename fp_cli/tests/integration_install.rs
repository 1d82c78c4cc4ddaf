//! Integration tests for the install flow, driving the library through
//! the shared TestContext the same way the CLI does.

use fp_core::{Lockfile, Manifest};
use fp_io::ProjectLayout;
use fp_io::test_utils::{TestContext, VersionFixture};

// ============================================================================
// init contract
// ============================================================================

mod init_defaults {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_manifest_matches_the_init_contract() {
        let manifest = Manifest::project_default("p");

        assert_eq!(manifest.name, "p");
        assert_eq!(manifest.version, "1.0.0");
        assert_eq!(manifest.description, "My App");
        assert_eq!(manifest.main, "index.js");
        assert_eq!(manifest.scripts["start"], "node index.js");
        assert!(manifest.dependencies.is_empty());
        assert!(manifest.dev_dependencies.is_empty());
    }

    #[test]
    fn freshly_initialized_project_round_trips() {
        let tmp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(tmp.path());

        layout.ensure_dirs().unwrap();
        layout.save_manifest(&Manifest::project_default("p")).unwrap();
        layout.save_lock(&Lockfile::default()).unwrap();

        assert!(layout.cache_dir().is_dir());
        assert!(layout.modules_dir().is_dir());
        assert_eq!(layout.load_manifest().unwrap().name, "p");
        assert!(layout.load_lock().unwrap().dependencies.is_empty());
    }
}

// ============================================================================
// install scenarios
// ============================================================================

mod install {
    use super::*;

    #[tokio::test]
    async fn exact_install_produces_manifest_lock_and_tree() {
        let ctx = TestContext::new().await;
        ctx.mount_package("left-pad", "1.3.0", &[]).await;

        let report = ctx.install_args(&["left-pad@1.3.0"]).await;
        assert!(report.success());

        assert_eq!(ctx.manifest().dependencies["left-pad"].as_str(), "1.3.0");
        assert_eq!(ctx.lock().dependencies["left-pad"].version, "1.3.0");
        assert!(ctx.package_dir("left-pad").join("package.json").exists());
    }

    #[tokio::test]
    async fn latest_install_records_latest_in_the_manifest() {
        let ctx = TestContext::new().await;
        ctx.mount_package("left-pad", "1.3.0", &[]).await;

        let report = ctx.install_args(&["left-pad"]).await;
        assert!(report.success());

        assert_eq!(ctx.manifest().dependencies["left-pad"].as_str(), "latest");
        assert_eq!(ctx.lock().dependencies["left-pad"].version, "1.3.0");
    }

    #[tokio::test]
    async fn bins_resolve_through_dot_bin() {
        let ctx = TestContext::new().await;
        ctx.mount_package("left-pad", "1.3.0", &[]).await;
        ctx.mount_packument(
            "padded-cli",
            "0.2.0",
            &[VersionFixture::new("0.2.0")
                .dep("left-pad", "^1.0.0")
                .bin("pad", "./cli.js")],
        )
        .await;

        let report = ctx.install_args(&["padded-cli"]).await;
        assert!(report.success());

        let link = ctx.layout().bin_dir().join("pad");
        let target = std::fs::read_link(&link).unwrap();
        assert!(target.ends_with("padded-cli/cli.js"));
        assert!(target.exists());

        // The transitive dependency landed too.
        assert!(ctx.package_dir("left-pad").exists());
    }

    #[tokio::test]
    async fn unknown_package_fails_with_a_registry_error() {
        let ctx = TestContext::new().await;

        let report = ctx.install_args(&["no-such-package"]).await;
        assert!(!report.success());
        assert_eq!(report.failed, 1);

        let err = report.first_error.unwrap();
        assert_eq!(err.exit_code(), 2);
    }
}
