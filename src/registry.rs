use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::activation::{ActivationBackend, Activator};
use crate::config::Product;
use crate::error::{IoContext, Result, ZirconError};
use crate::layout::{DOWNLOAD_PREFIX, Layout, STAGING_PREFIX, SWAP_PREFIX};
use crate::lock::RootLock;
use crate::util::{remove_path, scratch_path};
use crate::version::VersionRef;

/// Written into every installation before it is promoted.
pub const RECEIPT_FILE: &str = ".zircon-install.json";

/// Where an installation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallSource {
    Prebuilt,
    Source,
    Archive,
}

impl std::fmt::Display for InstallSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Prebuilt => "prebuilt",
            Self::Source => "source",
            Self::Archive => "archive",
        };
        f.write_str(name)
    }
}

/// Metadata about one installation, stored as `.zircon-install.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReceipt {
    /// The reference as requested, before sanitising.
    pub version: String,
    pub source: InstallSource,
    /// Download URL, clone URL or archive path.
    pub origin: String,
    /// Seconds since the Unix epoch.
    pub installed_at: u64,
}

impl InstallReceipt {
    pub fn new(version: &VersionRef, source: InstallSource, origin: impl Into<String>) -> Self {
        let installed_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            version: version.as_str().to_string(),
            source,
            origin: origin.into(),
            installed_at,
        }
    }

    pub fn write(&self, installation: &Path) -> Result<()> {
        let path = installation.join(RECEIPT_FILE);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ZirconError::config(format!("failed to encode receipt: {e}")))?;
        fs::write(&path, json).io_context(|| format!("failed to write {}", path.display()))
    }

    /// Missing or unreadable receipts are `None`; older installs may lack one.
    pub fn read(installation: &Path) -> Option<Self> {
        let content = fs::read_to_string(installation.join(RECEIPT_FILE)).ok()?;
        serde_json::from_str(&content).ok()
    }
}

/// The set of installed toolchains and the current pointer.
///
/// Mutations (`delete`, `prune`, activation) take the root lock themselves.
pub struct Registry {
    layout: Layout,
    binary: String,
    backend: Box<dyn ActivationBackend>,
    lock_timeout: Duration,
}

impl Registry {
    pub fn new(layout: Layout, product: &Product, backend: Box<dyn ActivationBackend>) -> Self {
        Self {
            layout,
            binary: product.binary_file_name(),
            backend,
            lock_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn backend(&self) -> &dyn ActivationBackend {
        self.backend.as_ref()
    }

    /// The Activation Switch for this registry.
    pub fn activator(&self) -> Activator<'_> {
        Activator::new(self)
    }

    pub(crate) fn lock(&self) -> Result<RootLock> {
        RootLock::acquire(&self.layout.lock_file(), self.lock_timeout)
    }

    /// Installed version names, unordered. Staging leftovers are never listed.
    pub fn list(&self) -> Result<Vec<String>> {
        let dir = self.layout.toolchains_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ZirconError::io(format!("failed to read {}", dir.display()), e)),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.io_context(|| format!("failed to read {}", dir.display()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.path().is_dir() {
                continue;
            }
            names.push(name);
        }
        Ok(names)
    }

    pub fn has(&self, version: &VersionRef) -> bool {
        self.installation_dir(version.dir_name()).is_dir()
    }

    pub fn installation_dir(&self, name: &str) -> PathBuf {
        self.layout.toolchain_dir(name)
    }

    /// `toolchains/<name>/bin/<binary>`.
    pub fn entry_point(&self, name: &str) -> PathBuf {
        self.installation_dir(name).join("bin").join(&self.binary)
    }

    /// Name of the current installation, if a pointer exists.
    pub fn current(&self) -> Option<String> {
        self.current_dir()
            .and_then(|dir| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
    }

    /// The directory the current pointer refers to.
    pub fn current_dir(&self) -> Option<PathBuf> {
        self.backend.read_pointer(&self.layout.current_pointer())
    }

    /// The current installation as a shell environment should reference it.
    pub fn current_shell_dir(&self) -> Option<PathBuf> {
        self.backend.shell_dir(&self.layout.current_pointer())
    }

    pub fn receipt(&self, name: &str) -> Option<InstallReceipt> {
        InstallReceipt::read(&self.installation_dir(name))
    }

    /// Removes one installation.
    ///
    /// # Errors
    /// - [`ZirconError::NotInstalled`] if it does not exist.
    /// - [`ZirconError::IsCurrent`] if it is the current toolchain.
    pub fn delete(&self, version: &VersionRef) -> Result<()> {
        let _lock = self.lock()?;
        sweep_orphans(&self.layout);
        let name = version.dir_name();
        if !self.has(version) {
            return Err(ZirconError::not_installed(name));
        }
        if self.current().as_deref() == Some(name) {
            return Err(ZirconError::IsCurrent {
                version: name.to_string(),
            });
        }
        self.remove_installation(name)?;
        info!("deleted {name}");
        Ok(())
    }

    /// Removes every installation except the current one and returns their names.
    pub fn prune(&self) -> Result<Vec<String>> {
        let _lock = self.lock()?;
        sweep_orphans(&self.layout);
        let current = self.current();
        let mut removed = Vec::new();
        for name in self.list()? {
            if current.as_deref() == Some(name.as_str()) {
                continue;
            }
            self.remove_installation(&name)?;
            removed.push(name);
        }
        info!(count = removed.len(), "pruned installations");
        Ok(removed)
    }

    /// Unregisters with a rename first, so an interrupted delete leaves an orphan
    /// rather than a half-removed installation.
    fn remove_installation(&self, name: &str) -> Result<()> {
        let dir = self.installation_dir(name);
        let retired = scratch_path(&self.layout.toolchains_dir(), &format!("{STAGING_PREFIX}retired-"));
        fs::rename(&dir, &retired)
            .io_context(|| format!("failed to unregister {}", dir.display()))?;
        remove_path(&retired).io_context(|| format!("failed to remove {}", retired.display()))
    }
}

/// Deletes scratch entries left behind by interrupted runs. Call with the root lock held.
pub(crate) fn sweep_orphans(layout: &Layout) {
    let targets = [
        (layout.toolchains_dir(), STAGING_PREFIX),
        (layout.sources_dir(), STAGING_PREFIX),
        (layout.root().to_path_buf(), STAGING_PREFIX),
        (layout.tmp_dir(), DOWNLOAD_PREFIX),
        (layout.root().to_path_buf(), SWAP_PREFIX),
        (layout.bin_dir(), SWAP_PREFIX),
    ];
    for (dir, prefix) in targets {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.filter_map(std::result::Result::ok) {
            if !entry.file_name().to_string_lossy().starts_with(prefix) {
                continue;
            }
            let path = entry.path();
            match remove_path(&path) {
                Ok(()) => debug!(path = %path.display(), "removed orphaned scratch entry"),
                Err(e) => warn!("failed to remove orphaned {}: {e}", path.display()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::CopyBackend;
    use tempfile::tempdir;

    fn registry(root: &Path) -> Registry {
        Registry::new(Layout::new(root), &Product::toolchain(), Box::new(CopyBackend))
    }

    fn fake_install(registry: &Registry, name: &str) {
        let bin = registry.installation_dir(name).join("bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join(crate::layout::executable_name("zrc")), "#!/bin/sh\n").unwrap();
    }

    #[test]
    fn list_skips_hidden_and_files() {
        let dir = tempdir().unwrap();
        let registry = registry(dir.path());
        assert!(registry.list().unwrap().is_empty());

        fake_install(&registry, "v0.1.0");
        fs::create_dir_all(registry.layout().toolchains_dir().join(".staging-abc")).unwrap();
        fs::write(registry.layout().toolchains_dir().join("notes.txt"), "").unwrap();
        assert_eq!(registry.list().unwrap(), vec!["v0.1.0".to_string()]);
    }

    #[test]
    fn delete_missing_is_not_installed() {
        let dir = tempdir().unwrap();
        let err = registry(dir.path())
            .delete(&VersionRef::parse("v9").unwrap())
            .unwrap_err();
        assert!(matches!(err, ZirconError::NotInstalled { .. }));
    }

    #[test]
    fn delete_current_is_refused() {
        let dir = tempdir().unwrap();
        let registry = registry(dir.path());
        fake_install(&registry, "v1");
        registry
            .backend()
            .swap_pointer(&registry.installation_dir("v1"), &registry.layout().current_pointer())
            .unwrap();

        let err = registry.delete(&VersionRef::parse("v1").unwrap()).unwrap_err();
        assert!(matches!(err, ZirconError::IsCurrent { .. }));
        assert!(registry.installation_dir("v1").is_dir());
        assert_eq!(registry.current().as_deref(), Some("v1"));
    }

    #[test]
    fn prune_keeps_only_current() {
        let dir = tempdir().unwrap();
        let registry = registry(dir.path());
        for name in ["v1", "v2", "main"] {
            fake_install(&registry, name);
        }
        registry
            .backend()
            .swap_pointer(&registry.installation_dir("v2"), &registry.layout().current_pointer())
            .unwrap();

        let mut removed = registry.prune().unwrap();
        removed.sort();
        assert_eq!(removed, vec!["main".to_string(), "v1".to_string()]);
        assert_eq!(registry.list().unwrap(), vec!["v2".to_string()]);
    }

    #[test]
    fn sweep_removes_only_scratch_entries() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        layout.ensure_dirs().unwrap();
        fs::create_dir_all(layout.toolchains_dir().join(".staging-x/bin")).unwrap();
        fs::write(layout.tmp_dir().join(".download-1.tar.gz"), "").unwrap();
        fs::write(layout.bin_dir().join(".swap-1"), "").unwrap();
        fs::create_dir_all(layout.toolchain_dir("v1")).unwrap();

        sweep_orphans(&layout);
        assert!(!layout.toolchains_dir().join(".staging-x").exists());
        assert!(!layout.tmp_dir().join(".download-1.tar.gz").exists());
        assert!(!layout.bin_dir().join(".swap-1").exists());
        assert!(layout.toolchain_dir("v1").is_dir());
    }

    #[test]
    fn receipt_round_trips() {
        let dir = tempdir().unwrap();
        let receipt = InstallReceipt::new(
            &VersionRef::parse("v0.1.0").unwrap(),
            InstallSource::Prebuilt,
            "https://example.com/zrc.tar.gz",
        );
        receipt.write(dir.path()).unwrap();
        assert_eq!(InstallReceipt::read(dir.path()), Some(receipt));
    }
}
