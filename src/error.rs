//! Error types shared by every part of the toolchain manager.
//!
//! Each variant maps onto one stage of an install or activation so that the
//! outer layer can report the deepest concrete cause instead of a generic
//! "install failed".

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, ZirconError>;

#[derive(Debug, Error)]
pub enum ZirconError {
    /// The host OS/architecture has no prebuilt artifact naming.
    #[error("unsupported platform: {os} on {arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// No prebuilt artifact could be fetched (network error, HTTP error, timeout).
    #[error("no prebuilt artifact at {url}: {reason}")]
    ArtifactNotFound { url: String, reason: String },

    /// The downloaded artifact does not match its published checksum.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("failed to clone {url}: {message}")]
    Clone { url: String, message: String },

    #[error("failed to check out '{reference}': {message}")]
    Checkout { reference: String, message: String },

    #[error("build failed: {message}")]
    Build { message: String },

    #[error("failed to extract {archive}: {reason}")]
    Extraction { archive: PathBuf, reason: String },

    /// The expected entry point was not produced by extraction or build.
    #[error("expected binary not found at {path}")]
    MissingBinary { path: PathBuf },

    /// Both install paths failed; `source` is the last concrete failure.
    #[error("could not install {version}")]
    Install {
        version: String,
        #[source]
        source: Box<ZirconError>,
    },

    #[error("toolchain '{version}' is not installed")]
    NotInstalled { version: String },

    #[error("toolchain '{version}' is the current toolchain; switch to another one first")]
    IsCurrent { version: String },

    /// A registered installation lost its entry point after registration.
    #[error("toolchain '{version}' is broken: {path} is missing or not executable")]
    BrokenInstallation { version: String, path: PathBuf },

    #[error("invalid version reference '{reference}': {reason}")]
    InvalidVersion { reference: String, reason: String },

    #[error("invalid repository '{input}': expected owner/name or a URL")]
    InvalidRepository { input: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("timed out waiting for lock on {path}")]
    LockTimeout { path: PathBuf },

    #[error("{message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

impl ZirconError {
    #[must_use]
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    #[must_use]
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_installed(version: impl Into<String>) -> Self {
        Self::NotInstalled {
            version: version.into(),
        }
    }

    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Wraps `cause` as the reason `version` could not be installed.
    #[must_use]
    pub fn install(version: impl Into<String>, cause: ZirconError) -> Self {
        Self::Install {
            version: version.into(),
            source: Box::new(cause),
        }
    }

    /// Failures that only mean "no usable prebuilt artifact" rather than a broken install.
    #[must_use]
    pub fn is_fallback_trigger(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedPlatform { .. }
                | Self::ArtifactNotFound { .. }
                | Self::ChecksumMismatch { .. }
        )
    }

    /// Walks the `Install` wrappers down to the concrete failure.
    #[must_use]
    pub fn root_cause(&self) -> &ZirconError {
        match self {
            Self::Install { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Attaches a message to an `io::Error`, the way `anyhow::Context` does for the CLI.
pub(crate) trait IoContext<T> {
    fn io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| ZirconError::io(f(), e))
    }
}
