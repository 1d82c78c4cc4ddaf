pub mod errors;
pub mod lockfile;
pub mod manifest;
pub mod metadata;
pub mod request;

pub use errors::Error;
pub use lockfile::{LockEntry, Lockfile};
pub use manifest::{BinTable, Manifest, PackageManifest, to_snake_case};
pub use metadata::{
    Dist, DistTags, PackageKey, PackageMetadata, VersionInfo, resolve_version,
};
pub use request::{PackageSpec, VersionRequest};
