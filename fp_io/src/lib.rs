pub mod cache;
pub mod extract;
pub mod fs_util;
pub mod install;
pub mod link;
pub mod progress;
pub mod project;
pub mod registry;
pub mod scripts;
pub mod test_utils;

pub use cache::PackageCache;
pub use extract::extract_tarball;
pub use install::{DEFAULT_CONCURRENCY, InstallMode, InstallReport, Installer};
pub use link::{BinLinker, LinkedBin};
pub use progress::{InstallProgress, ProgressCallback};
pub use project::ProjectLayout;
pub use registry::RegistryClient;
pub use scripts::run_script;
