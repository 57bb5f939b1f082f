use std::path::{Path, PathBuf};

use directories::BaseDirs;

use crate::error::{IoContext, Result, ZirconError};

/// Environment variable overriding the root directory.
pub const PREFIX_ENV: &str = "ZIRCON_PREFIX";

/// Prefix shared by every scratch entry; anything carrying it is safe to delete.
pub const STAGING_PREFIX: &str = ".staging-";
pub const DOWNLOAD_PREFIX: &str = ".download-";
pub const SWAP_PREFIX: &str = ".swap-";

/// The on-disk layout under the root directory.
///
/// This is the only contract the CLI and env printing rely on:
/// `bin/` entry points, `toolchains/<version>/` installations and one `current` pointer.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Reads `ZIRCON_PREFIX`, falling back to `~/.zircon`.
    pub fn from_env() -> Result<Self> {
        if let Some(prefix) = std::env::var_os(PREFIX_ENV).filter(|p| !p.is_empty()) {
            return Ok(Self::new(PathBuf::from(prefix)));
        }
        let dirs = BaseDirs::new()
            .ok_or_else(|| ZirconError::config("could not determine the home directory"))?;
        Ok(Self::new(dirs.home_dir().join(".zircon")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn toolchains_dir(&self) -> PathBuf {
        self.root.join("toolchains")
    }

    pub fn toolchain_dir(&self, dir_name: &str) -> PathBuf {
        self.toolchains_dir().join(dir_name)
    }

    pub fn current_pointer(&self) -> PathBuf {
        self.root.join("current")
    }

    pub fn self_dir(&self) -> PathBuf {
        self.root.join("self")
    }

    pub fn sources_dir(&self) -> PathBuf {
        self.root.join("sources")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join(".lock")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Creates the directory skeleton if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.root.clone(),
            self.bin_dir(),
            self.toolchains_dir(),
            self.sources_dir(),
            self.tmp_dir(),
        ] {
            std::fs::create_dir_all(&dir)
                .io_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Appends the platform executable suffix (`.exe` on Windows).
pub fn executable_name(name: &str) -> String {
    format!("{}{}", name, std::env::consts::EXE_SUFFIX)
}
