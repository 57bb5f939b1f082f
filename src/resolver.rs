//! Locating and downloading prebuilt toolchain artifacts.
//!
//! The resolver never retries and never distinguishes "no artifact for this version"
//! from "no artifact for this platform": both mean the caller should build from source.

use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use tempfile::TempPath;
use tracing::{debug, info};

use crate::error::{IoContext, Result, ZirconError};
use crate::layout::DOWNLOAD_PREFIX;
use crate::platform::Host;
use crate::repo::RepoLocation;
use crate::util::{format_hash, sha256_file};
use crate::version::VersionRef;

/// A downloaded artifact. The file is deleted when this value is dropped.
#[derive(Debug)]
pub struct DownloadedArtifact {
    pub url: String,
    pub path: TempPath,
}

/// Produces a local copy of a prebuilt artifact for a version.
pub trait ArtifactResolver {
    fn resolve(&self, version: &VersionRef, repo: &RepoLocation) -> Result<DownloadedArtifact>;
}

/// Downloads `{base}/releases/download/{version}/{product}-{platform}.tar.gz` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpResolver {
    client: Client,
    host: Host,
    product: String,
    download_dir: std::path::PathBuf,
    verify_checksums: bool,
}

impl HttpResolver {
    pub fn new(product: &str, download_dir: &Path, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("zircon/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ZirconError::config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            host: Host::current(),
            product: product.to_string(),
            download_dir: download_dir.to_path_buf(),
            verify_checksums: true,
        })
    }

    /// Overrides the detected host; used to resolve for another platform.
    pub fn with_host(mut self, host: Host) -> Self {
        self.host = host;
        self
    }

    pub fn with_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    fn download(&self, url: &str) -> Result<TempPath> {
        let not_found = |reason: String| ZirconError::ArtifactNotFound {
            url: url.to_string(),
            reason,
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| not_found(e.without_url().to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(not_found(format!("HTTP {status}")));
        }

        std::fs::create_dir_all(&self.download_dir)
            .io_context(|| format!("failed to create {}", self.download_dir.display()))?;
        let mut file = tempfile::Builder::new()
            .prefix(DOWNLOAD_PREFIX)
            .suffix(".tar.gz")
            .tempfile_in(&self.download_dir)
            .io_context(|| "failed to create temporary download file")?;

        let mut buffer = [0u8; 8192];
        let mut downloaded: u64 = 0;
        loop {
            let read = response
                .read(&mut buffer)
                .map_err(|e| not_found(format!("connection interrupted: {e}")))?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read])
                .io_context(|| "failed to write temporary download file")?;
            downloaded += read as u64;
        }
        file.as_file()
            .sync_all()
            .io_context(|| "failed to sync temporary download file")?;
        debug!(bytes = downloaded, url, "download complete");

        Ok(file.into_temp_path())
    }

    /// Compares against `{url}.sha256` when the release publishes one.
    fn verify(&self, url: &str, path: &Path) -> Result<()> {
        let sidecar = format!("{url}.sha256");
        let response = match self.client.get(&sidecar).send() {
            Ok(response) if response.status().is_success() => response,
            _ => {
                debug!(sidecar = %sidecar, "no checksum published; skipping verification");
                return Ok(());
            }
        };
        let Ok(body) = response.text() else {
            return Ok(());
        };
        let expected = format_hash(&body);
        if expected.is_empty() {
            return Ok(());
        }
        let actual = sha256_file(path)?;
        if actual != expected {
            return Err(ZirconError::ChecksumMismatch { expected, actual });
        }
        debug!("checksum verified");
        Ok(())
    }
}

impl ArtifactResolver for HttpResolver {
    fn resolve(&self, version: &VersionRef, repo: &RepoLocation) -> Result<DownloadedArtifact> {
        let platform = self.host.platform()?;
        let url = repo.artifact_url(version.as_str(), &platform.artifact_name(&self.product));
        info!("downloading {url}");

        let path = self.download(&url)?;
        if self.verify_checksums {
            self.verify(&url, &path)?;
        }
        Ok(DownloadedArtifact { url, path })
    }
}
