//! Switching the current toolchain.
//!
//! The current pointer and the `bin/` entry points are materialised by an
//! [`ActivationBackend`]. Every write goes to a `.swap-*` sibling first and is then
//! renamed into place, so a crash leaves either the old or the new pointer, never a
//! missing one.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::ActivationKind;
use crate::error::{IoContext, Result, ZirconError};
use crate::layout::SWAP_PREFIX;
use crate::registry::Registry;
use crate::util::{copy_file, is_executable, remove_path, scratch_path, set_executable};
use crate::version::VersionRef;

/// How the current pointer and entry points are written to disk.
pub trait ActivationBackend {
    fn name(&self) -> &'static str;

    /// Atomically replaces `pointer` so it refers to the installation at `target`.
    fn swap_pointer(&self, target: &Path, pointer: &Path) -> Result<()>;

    /// The installation `pointer` refers to, if any.
    fn read_pointer(&self, pointer: &Path) -> Option<PathBuf>;

    /// Path a shell environment should use for the current installation. Link-based
    /// backends return `pointer` itself so the environment follows later switches.
    fn shell_dir(&self, pointer: &Path) -> Option<PathBuf>;

    /// Makes `entry` run `actual`. `via_pointer` is the same file reached through the
    /// current pointer, which link-based backends point at instead.
    fn expose_binary(&self, via_pointer: &Path, actual: &Path, entry: &Path) -> Result<()>;
}

/// Symbolic links: `current -> toolchains/<v>`, `bin/zrc -> current/bin/zrc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymlinkBackend;

/// For hosts without usable symlinks: `current` is a file holding the installation
/// path and entry points are copies of the binaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyBackend;

impl ActivationBackend for SymlinkBackend {
    fn name(&self) -> &'static str {
        "symlink"
    }

    fn swap_pointer(&self, target: &Path, pointer: &Path) -> Result<()> {
        replace_with_link(target, pointer, true)
    }

    fn read_pointer(&self, pointer: &Path) -> Option<PathBuf> {
        fs::read_link(pointer).ok()
    }

    fn shell_dir(&self, pointer: &Path) -> Option<PathBuf> {
        self.read_pointer(pointer).map(|_| pointer.to_path_buf())
    }

    fn expose_binary(&self, via_pointer: &Path, _actual: &Path, entry: &Path) -> Result<()> {
        if fs::read_link(entry).is_ok_and(|existing| existing == via_pointer) {
            return Ok(());
        }
        replace_with_link(via_pointer, entry, false)
    }
}

impl ActivationBackend for CopyBackend {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn swap_pointer(&self, target: &Path, pointer: &Path) -> Result<()> {
        let scratch = scratch_sibling(pointer)?;
        let content = target.to_string_lossy().into_owned();
        fs::write(&scratch, content)
            .io_context(|| format!("failed to write {}", scratch.display()))?;
        rename_over(&scratch, pointer)
    }

    fn read_pointer(&self, pointer: &Path) -> Option<PathBuf> {
        let content = fs::read_to_string(pointer).ok()?;
        let content = content.trim();
        (!content.is_empty()).then(|| PathBuf::from(content))
    }

    fn shell_dir(&self, pointer: &Path) -> Option<PathBuf> {
        self.read_pointer(pointer)
    }

    fn expose_binary(&self, _via_pointer: &Path, actual: &Path, entry: &Path) -> Result<()> {
        let scratch = scratch_sibling(entry)?;
        copy_file(actual, &scratch)?;
        set_executable(&scratch)?;
        rename_over(&scratch, entry)
    }
}

/// Symlinks on Unix, copies elsewhere, unless the config forces one.
pub fn select_backend(kind: ActivationKind) -> Box<dyn ActivationBackend> {
    match kind {
        ActivationKind::Symlink => Box::new(SymlinkBackend),
        ActivationKind::Copy => Box::new(CopyBackend),
        ActivationKind::Auto if cfg!(unix) => Box::new(SymlinkBackend),
        ActivationKind::Auto => Box::new(CopyBackend),
    }
}

fn scratch_sibling(path: &Path) -> Result<PathBuf> {
    let parent = path
        .parent()
        .ok_or_else(|| ZirconError::config(format!("{} has no parent", path.display())))?;
    fs::create_dir_all(parent).io_context(|| format!("failed to create {}", parent.display()))?;
    Ok(scratch_path(parent, SWAP_PREFIX))
}

fn rename_over(scratch: &Path, dest: &Path) -> Result<()> {
    fs::rename(scratch, dest).map_err(|e| {
        let _ = remove_path(scratch);
        ZirconError::io(format!("failed to replace {}", dest.display()), e)
    })
}

fn replace_with_link(target: &Path, dest: &Path, is_dir: bool) -> Result<()> {
    let scratch = scratch_sibling(dest)?;
    make_link(target, &scratch, is_dir)
        .io_context(|| format!("failed to link {} to {}", scratch.display(), target.display()))?;
    rename_over(&scratch, dest)
}

#[cfg(unix)]
fn make_link(target: &Path, link: &Path, _is_dir: bool) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_link(target: &Path, link: &Path, is_dir: bool) -> std::io::Result<()> {
    if is_dir {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}

/// The Activation Switch. All pointer mutation goes through here.
pub struct Activator<'a> {
    registry: &'a Registry,
}

impl<'a> Activator<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Makes `version` current. Never installs.
    ///
    /// # Errors
    /// - [`ZirconError::NotInstalled`] if `version` is not registered; nothing is touched.
    /// - [`ZirconError::BrokenInstallation`] if its entry point is missing or not executable.
    pub fn activate(&self, version: &VersionRef) -> Result<()> {
        let _lock = self.registry.lock()?;
        let name = version.dir_name();
        if !self.registry.has(version) {
            return Err(ZirconError::not_installed(name));
        }

        let installation = self.registry.installation_dir(name);
        let entry_point = self.registry.entry_point(name);
        if !is_executable(&entry_point) {
            return Err(ZirconError::BrokenInstallation {
                version: name.to_string(),
                path: entry_point,
            });
        }

        let layout = self.registry.layout();
        let backend = self.registry.backend();
        let previous = self.registry.current_dir();

        backend.swap_pointer(&installation, &layout.current_pointer())?;
        debug!(backend = backend.name(), version = name, "current pointer swapped");

        let exposed = bin_entries(&installation.join("bin"))?;
        let via_pointer = layout.current_pointer().join("bin");
        for file_name in &exposed {
            backend.expose_binary(
                &via_pointer.join(file_name),
                &installation.join("bin").join(file_name),
                &layout.bin_dir().join(file_name),
            )?;
        }

        if let Some(previous) = previous.filter(|p| *p != installation) {
            for stale in bin_entries(&previous.join("bin"))?.difference(&exposed) {
                let entry = layout.bin_dir().join(stale);
                if let Err(e) = remove_path(&entry) {
                    warn!("failed to remove stale entry point {}: {e}", entry.display());
                }
            }
        }
        info!("activated {name}");
        Ok(())
    }

    /// Points `bin/<binary>` at the self installation's executable.
    pub fn expose_manager(&self, binary_file_name: &str) -> Result<()> {
        let _lock = self.registry.lock()?;
        let layout = self.registry.layout();
        let actual = layout.self_dir().join("bin").join(binary_file_name);
        if !is_executable(&actual) {
            return Err(ZirconError::MissingBinary { path: actual });
        }
        self.registry.backend().expose_binary(
            &actual,
            &actual,
            &layout.bin_dir().join(binary_file_name),
        )
    }
}

fn bin_entries(bin_dir: &Path) -> Result<HashSet<String>> {
    let mut names = HashSet::new();
    let Ok(entries) = fs::read_dir(bin_dir) else {
        return Ok(names);
    };
    for entry in entries {
        let entry = entry.io_context(|| format!("failed to read {}", bin_dir.display()))?;
        let is_file = entry.file_type().map(|t| !t.is_dir()).unwrap_or(false);
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_file && !name.starts_with('.') {
            names.insert(name);
        }
    }
    Ok(names)
}
