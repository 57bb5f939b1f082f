//! The installation transaction: prebuilt artifact first, source build as fallback,
//! assembled in a staging directory and promoted with one rename.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::archive::extract_tar_gz;
use crate::builder::{BuildOutput, SourceBuild, failure_message, spawn_message};
use crate::config::Product;
use crate::error::{IoContext, Result, ZirconError};
use crate::layout::{Layout, STAGING_PREFIX, executable_name};
use crate::lock::RootLock;
use crate::registry::{InstallReceipt, InstallSource, sweep_orphans};
use crate::repo::RepoLocation;
use crate::resolver::ArtifactResolver;
use crate::util::{
    copy_dir_recursive, copy_file, is_executable, remove_path, scratch_path, set_executable_all,
};
use crate::version::VersionRef;

/// Which install paths to try.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Prebuilt artifact, then source build.
    #[default]
    Auto,
    SourceOnly,
    /// A local `.tar.gz` laid out like a prebuilt artifact.
    Archive(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Replace an existing installation instead of returning it.
    pub reinstall: bool,
    pub strategy: Strategy,
}

/// A registered installation.
#[derive(Debug, Clone)]
pub struct InstalledToolchain {
    pub version: String,
    pub path: PathBuf,
    pub binary: PathBuf,
    /// `None` for installations that predate receipts.
    pub source: Option<InstallSource>,
    /// `false` when the installation already existed and was returned unchanged.
    pub fresh: bool,
}

pub struct Installer<'a> {
    layout: &'a Layout,
    product: &'a Product,
    resolver: &'a dyn ArtifactResolver,
    builder: &'a dyn SourceBuild,
    lock_timeout: Duration,
}

impl<'a> Installer<'a> {
    pub fn new(
        layout: &'a Layout,
        product: &'a Product,
        resolver: &'a dyn ArtifactResolver,
        builder: &'a dyn SourceBuild,
    ) -> Self {
        Self {
            layout,
            product,
            resolver,
            builder,
            lock_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Installs `version` under `toolchains/`.
    ///
    /// An existing installation is returned as is unless `options.reinstall` is set.
    /// On failure nothing is registered and the error wraps the last concrete cause.
    pub fn install(
        &self,
        version: &VersionRef,
        repo: &RepoLocation,
        options: &InstallOptions,
    ) -> Result<InstalledToolchain> {
        let slot = self.layout.toolchain_dir(version.dir_name());
        self.transact(version, repo, options, &slot, &self.layout.toolchains_dir())
    }

    /// Installs the manager itself into `self/`, always replacing what is there.
    pub fn install_self(
        &self,
        version: &VersionRef,
        repo: &RepoLocation,
        strategy: Strategy,
    ) -> Result<InstalledToolchain> {
        let options = InstallOptions {
            reinstall: true,
            strategy,
        };
        let slot = self.layout.self_dir();
        self.transact(version, repo, &options, &slot, self.layout.root())
    }

    fn transact(
        &self,
        version: &VersionRef,
        repo: &RepoLocation,
        options: &InstallOptions,
        slot: &Path,
        staging_parent: &Path,
    ) -> Result<InstalledToolchain> {
        let _lock = RootLock::acquire(&self.layout.lock_file(), self.lock_timeout)?;
        self.layout.ensure_dirs()?;
        sweep_orphans(self.layout);

        if slot.is_dir() && !options.reinstall {
            debug!(version = %version, "already installed");
            return Ok(InstalledToolchain {
                version: version.dir_name().to_string(),
                path: slot.to_path_buf(),
                binary: self.entry_point(slot),
                source: InstallReceipt::read(slot).map(|r| r.source),
                fresh: false,
            });
        }

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(staging_parent)
            .io_context(|| format!("failed to create staging directory in {}", staging_parent.display()))?;

        let (source, origin) = self
            .stage(version, repo, &options.strategy, staging.path())
            .map_err(|cause| ZirconError::install(version.as_str(), cause))?;
        InstallReceipt::new(version, source, origin).write(staging.path())?;

        promote(staging, slot)?;
        info!("installed {version} ({source})");
        Ok(InstalledToolchain {
            version: version.dir_name().to_string(),
            path: slot.to_path_buf(),
            binary: self.entry_point(slot),
            source: Some(source),
            fresh: true,
        })
    }

    fn entry_point(&self, installation: &Path) -> PathBuf {
        installation.join("bin").join(self.product.binary_file_name())
    }

    fn stage(
        &self,
        version: &VersionRef,
        repo: &RepoLocation,
        strategy: &Strategy,
        staging: &Path,
    ) -> Result<(InstallSource, String)> {
        match strategy {
            Strategy::Archive(archive) => {
                self.stage_archive(archive, staging)?;
                Ok((InstallSource::Archive, archive.display().to_string()))
            }
            Strategy::SourceOnly => {
                let origin = self.stage_source(version, repo, staging)?;
                Ok((InstallSource::Source, origin))
            }
            Strategy::Auto => match self.stage_prebuilt(version, repo, staging) {
                Ok(url) => Ok((InstallSource::Prebuilt, url)),
                Err(e) => {
                    if e.is_fallback_trigger() {
                        info!("no usable prebuilt artifact ({e}); building from source");
                    } else {
                        warn!("prebuilt install failed ({e}); building from source");
                    }
                    clear_dir(staging)?;
                    let origin = self.stage_source(version, repo, staging)?;
                    Ok((InstallSource::Source, origin))
                }
            },
        }
    }

    fn stage_prebuilt(&self, version: &VersionRef, repo: &RepoLocation, staging: &Path) -> Result<String> {
        let artifact = self.resolver.resolve(version, repo)?;
        self.stage_archive(&artifact.path, staging)?;
        Ok(artifact.url.clone())
    }

    fn stage_archive(&self, archive: &Path, staging: &Path) -> Result<()> {
        extract_tar_gz(archive, staging)?;
        let binary = self.entry_point(staging);
        if !binary.is_file() {
            return Err(ZirconError::MissingBinary { path: binary });
        }
        set_executable_all(&staging.join("bin"))
    }

    fn stage_source(&self, version: &VersionRef, repo: &RepoLocation, staging: &Path) -> Result<String> {
        let sources = self.layout.sources_dir();
        fs::create_dir_all(&sources).io_context(|| format!("failed to create {}", sources.display()))?;
        let workdir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&sources)
            .io_context(|| format!("failed to create build directory in {}", sources.display()))?;

        let url = repo.clone_url();
        let built = self.builder.build(version.as_str(), &url, workdir.path())?;

        let hook = built.checkout.join("hook").join("install.sh");
        if hook.is_file() {
            run_install_hook(&hook, &built.checkout, staging)?;
        } else {
            self.copy_build_output(&built, staging)?;
        }

        let binary = self.entry_point(staging);
        if !is_executable(&binary) {
            return Err(ZirconError::MissingBinary { path: binary });
        }
        Ok(url)
    }

    fn copy_build_output(&self, built: &BuildOutput, staging: &Path) -> Result<()> {
        let bin = staging.join("bin");
        copy_file(&built.binary, &bin.join(self.product.binary_file_name()))?;
        if let Some(output_dir) = built.binary.parent() {
            for extra in &self.product.extra_binaries {
                let file_name = executable_name(extra);
                let candidate = output_dir.join(&file_name);
                if candidate.is_file() {
                    copy_file(&candidate, &bin.join(&file_name))?;
                } else {
                    debug!("optional binary {file_name} not built; skipping");
                }
            }
        }
        let include = built.checkout.join("include");
        if include.is_dir() {
            copy_dir_recursive(&include, &staging.join("include"))?;
        }
        set_executable_all(&bin)
    }
}

fn run_install_hook(hook: &Path, checkout: &Path, staging: &Path) -> Result<()> {
    info!("running {}", hook.display());
    let output = Command::new("bash")
        .arg(hook)
        .env("TOOLCHAIN_DIR", staging)
        .current_dir(checkout)
        .output()
        .map_err(|e| ZirconError::build(format!("install hook: {}", spawn_message("bash", &e))))?;
    if !output.status.success() {
        return Err(ZirconError::build(format!(
            "install hook failed: {}",
            failure_message(&output)
        )));
    }
    set_executable_all(&staging.join("bin"))
}

fn clear_dir(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir).io_context(|| format!("failed to read {}", dir.display()))? {
        let path = entry.io_context(|| format!("failed to read {}", dir.display()))?.path();
        remove_path(&path).io_context(|| format!("failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Renames the staged tree onto `slot`. An existing installation is moved aside first and
/// restored if the promotion fails.
fn promote(staging: TempDir, slot: &Path) -> Result<()> {
    let parent = slot
        .parent()
        .ok_or_else(|| ZirconError::config(format!("{} has no parent", slot.display())))?;
    let retired = if slot.exists() {
        let retired = scratch_path(parent, &format!("{STAGING_PREFIX}retired-"));
        fs::rename(slot, &retired)
            .io_context(|| format!("failed to move aside {}", slot.display()))?;
        Some(retired)
    } else {
        None
    };

    if let Err(e) = fs::rename(staging.path(), slot) {
        return Err(match &retired {
            Some(retired) => restore_retired(retired, slot, e),
            None => ZirconError::io(format!("failed to move {} into place", slot.display()), e),
        });
    }
    // The staged path no longer exists; dropping the handle is a no-op.
    let _ = staging.close();

    if let Some(retired) = retired {
        if let Err(e) = remove_path(&retired) {
            warn!("failed to remove replaced installation {}: {e}", retired.display());
        }
    }
    Ok(())
}

/// Puts a moved-aside installation back after a failed promotion and returns the error
/// to report. If the restore fails too, the error names where the old tree was left.
fn restore_retired(retired: &Path, slot: &Path, cause: std::io::Error) -> ZirconError {
    match fs::rename(retired, slot) {
        Ok(()) => ZirconError::io(format!("failed to move {} into place", slot.display()), cause),
        Err(restore) => {
            warn!(
                "failed to restore {} from {}: {restore}",
                slot.display(),
                retired.display()
            );
            ZirconError::io(
                format!(
                    "failed to move {} into place; the previous installation was left at {}",
                    slot.display(),
                    retired.display()
                ),
                cause,
            )
        }
    }
}
