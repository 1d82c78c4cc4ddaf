use std::fmt;
use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    ManifestMissing {
        path: PathBuf,
    },
    ManifestInvalid {
        path: PathBuf,
        message: String,
    },
    UnknownScript {
        name: String,
    },
    InvalidPackageSpec {
        spec: String,
    },
    RegistryUnavailable {
        name: String,
        message: String,
    },
    VersionNotFound {
        name: String,
        version: String,
    },
    DownloadFailed {
        url: String,
        message: String,
    },
    ExtractFailed {
        message: String,
    },
    UnsafeArchivePath {
        entry: String,
    },
    Filesystem {
        message: String,
    },
}

impl Error {
    /// Process exit code for this error category: 1 for user errors,
    /// 2 for registry errors, 3 for filesystem errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ManifestMissing { .. }
            | Error::ManifestInvalid { .. }
            | Error::UnknownScript { .. }
            | Error::InvalidPackageSpec { .. } => 1,
            Error::RegistryUnavailable { .. }
            | Error::VersionNotFound { .. }
            | Error::DownloadFailed { .. } => 2,
            Error::ExtractFailed { .. }
            | Error::UnsafeArchivePath { .. }
            | Error::Filesystem { .. } => 3,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ManifestMissing { path } => {
                write!(
                    f,
                    "no manifest found at '{}'\n  hint: run 'fp init .' to initialize the project first",
                    path.display()
                )
            }
            Error::ManifestInvalid { path, message } => {
                write!(
                    f,
                    "could not parse '{}': {}\n  hint: the file must be valid JSON",
                    path.display(),
                    message
                )
            }
            Error::UnknownScript { name } => {
                write!(
                    f,
                    "no script named '{}'\n  hint: scripts are listed under \"scripts\" in the manifest",
                    name
                )
            }
            Error::InvalidPackageSpec { spec } => {
                write!(
                    f,
                    "invalid package spec '{}'\n  hint: use name or name@version, e.g. left-pad@1.3.0",
                    spec
                )
            }
            Error::RegistryUnavailable { name, message } => {
                write!(
                    f,
                    "registry request for '{}' failed: {}\n  hint: check your internet connection and try again",
                    name, message
                )
            }
            Error::VersionNotFound { name, version } => {
                write!(
                    f,
                    "version '{}' of '{}' does not exist in the registry",
                    version, name
                )
            }
            Error::DownloadFailed { url, message } => {
                write!(
                    f,
                    "download failed: {}\n  url: {}\n  hint: this may be a transient CDN issue; try again",
                    message, url
                )
            }
            Error::ExtractFailed { message } => {
                write!(f, "archive extraction failed: {}", message)
            }
            Error::UnsafeArchivePath { entry } => {
                write!(
                    f,
                    "archive entry '{}' escapes the destination directory; refusing to extract",
                    entry
                )
            }
            Error::Filesystem { message } => {
                write!(f, "filesystem error: {}", message)
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_missing_display_includes_init_hint() {
        let err = Error::ManifestMissing {
            path: PathBuf::from("/tmp/app/dependencies.json"),
        };

        let msg = err.to_string();
        assert!(msg.contains("dependencies.json"));
        assert!(msg.contains("fp init"));
    }

    #[test]
    fn version_not_found_display_names_package_and_version() {
        let err = Error::VersionNotFound {
            name: "left-pad".to_string(),
            version: "9.9.9".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("left-pad"));
        assert!(msg.contains("9.9.9"));
    }

    #[test]
    fn download_failed_display_includes_url() {
        let err = Error::DownloadFailed {
            url: "https://registry.example/pkg-1.0.0.tgz".to_string(),
            message: "HTTP 502 Bad Gateway".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("pkg-1.0.0.tgz"));
        assert!(msg.contains("502"));
    }

    #[test]
    fn exit_codes_follow_error_category() {
        let user = Error::UnknownScript {
            name: "build".to_string(),
        };
        let registry = Error::RegistryUnavailable {
            name: "left-pad".to_string(),
            message: "HTTP 503".to_string(),
        };
        let fs = Error::Filesystem {
            message: "disk full".to_string(),
        };

        assert_eq!(user.exit_code(), 1);
        assert_eq!(registry.exit_code(), 2);
        assert_eq!(fs.exit_code(), 3);
    }
}
