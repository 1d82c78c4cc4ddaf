//! HTTP client for the package registry.
//!
//! Two operations: fetch a package's metadata document, and stream a
//! tarball body to disk. Transport errors and 5xx responses retry with
//! exponential backoff; 4xx responses fail immediately.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use tokio::io::AsyncWriteExt;

use fp_core::{Error, PackageMetadata};

const METADATA_TIMEOUT: Duration = Duration::from_secs(30);
const TARBALL_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(250);

/// Escape a package name for use as a single URL path segment. Scoped
/// names keep their slash as `%2F` so `@scope/pkg` stays one segment.
const NAME_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'`')
    .add(b'{')
    .add(b'}');

pub fn encode_name(name: &str) -> String {
    utf8_percent_encode(name, NAME_SEGMENT).to_string()
}

#[derive(Clone)]
pub struct RegistryClient {
    base_url: String,
    client: reqwest::Client,
}

impl RegistryClient {
    pub fn new() -> Self {
        Self::with_base_url("https://registry.npmjs.org".to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        // Pooled connections multiplex the many small metadata requests a
        // dependency walk issues against the same host.
        let client = reqwest::Client::builder()
            .user_agent("fastpack/0.1")
            .pool_max_idle_per_host(20)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Fetch the metadata document for a package name.
    pub async fn fetch_metadata(&self, name: &str) -> Result<PackageMetadata, Error> {
        let url = format!("{}/{}", self.base_url, encode_name(name));

        let response = self
            .get_with_retry(&url, METADATA_TIMEOUT, |message| {
                Error::RegistryUnavailable {
                    name: name.to_string(),
                    message,
                }
            })
            .await?;

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::RegistryUnavailable {
                name: name.to_string(),
                message: format!("failed to read response body: {e}"),
            })?;

        serde_json::from_slice(&body).map_err(|e| Error::RegistryUnavailable {
            name: name.to_string(),
            message: format!("failed to parse metadata JSON: {e}"),
        })
    }

    /// Stream a tarball body into `dest`. The file is created (or
    /// truncated) before the first byte is written; callers hand in a
    /// private temp path and own its cleanup.
    pub async fn download_tarball(&self, url: &str, dest: &Path) -> Result<(), Error> {
        let response = self
            .get_with_retry(url, TARBALL_TIMEOUT, |message| Error::DownloadFailed {
                url: url.to_string(),
                message,
            })
            .await?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| Error::Filesystem {
                message: format!("failed to create {}: {e}", dest.display()),
            })?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::DownloadFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;
            file.write_all(&chunk).await.map_err(|e| Error::Filesystem {
                message: format!("failed to write {}: {e}", dest.display()),
            })?;
        }

        file.flush().await.map_err(|e| Error::Filesystem {
            message: format!("failed to flush {}: {e}", dest.display()),
        })?;

        Ok(())
    }

    async fn get_with_retry(
        &self,
        url: &str,
        timeout: Duration,
        mut make_error: impl FnMut(String) -> Error,
    ) -> Result<reqwest::Response, Error> {
        let mut backoff = INITIAL_BACKOFF;
        let mut last_error = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }

            match self.client.get(url).timeout(timeout).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    let err = make_error(format!("HTTP {status}"));
                    // Client errors are definitive; retrying cannot help.
                    if status.is_client_error() {
                        return Err(err);
                    }
                    last_error = Some(err);
                }
                Err(e) => {
                    last_error = Some(make_error(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| make_error("request failed".to_string())))
    }
}

impl Default for RegistryClient {
    fn default() -> Self {
        Self::new()
    }
}
