//! Host platform detection and the `{os}-{arch}` tag used in artifact names.

use std::fmt;

use crate::error::{Result, ZirconError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Linux,
    Macos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X64,
    Arm64,
}

/// A platform that prebuilt toolchain artifacts are published for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

/// The raw OS/architecture strings reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub os: String,
    pub arch: String,
}

impl Host {
    /// The host this process was compiled for.
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }

    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    pub fn platform(&self) -> Result<Platform> {
        Platform::from_host(&self.os, &self.arch)
    }
}

impl Platform {
    /// Maps host strings onto a supported platform.
    ///
    /// Matching is case-insensitive: `linux*` maps to linux, `darwin*`/`macos*` to macos,
    /// `x86_64` to x64 and `aarch64`/`arm64` to arm64. Anything else is
    /// [`ZirconError::UnsupportedPlatform`], which callers treat as "build from source".
    pub fn from_host(os: &str, arch: &str) -> Result<Self> {
        let unsupported = || ZirconError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        };

        let os_lower = os.to_ascii_lowercase();
        let os_tag = if os_lower.starts_with("linux") {
            Os::Linux
        } else if os_lower.starts_with("darwin") || os_lower.starts_with("macos") {
            Os::Macos
        } else {
            return Err(unsupported());
        };

        let arch_tag = match arch.to_ascii_lowercase().as_str() {
            "x86_64" => Arch::X64,
            "aarch64" | "arm64" => Arch::Arm64,
            _ => return Err(unsupported()),
        };

        Ok(Self {
            os: os_tag,
            arch: arch_tag,
        })
    }

    /// Canonical tag, e.g. `linux-x64`.
    pub fn tag(self) -> String {
        let os = match self.os {
            Os::Linux => "linux",
            Os::Macos => "macos",
        };
        let arch = match self.arch {
            Arch::X64 => "x64",
            Arch::Arm64 => "arm64",
        };
        format!("{os}-{arch}")
    }

    /// Artifact file name for a product, e.g. `zrc-linux-x64.tar.gz`.
    pub fn artifact_name(self, product: &str) -> String {
        format!("{}-{}.tar.gz", product, self.tag())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}
