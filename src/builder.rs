//! Building a toolchain from a source checkout.
//!
//! Version control and the compiler's own build tool are external processes behind the
//! [`Cloner`] and [`Builder`] capabilities, so the install transaction can be exercised
//! with fakes.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::{debug, info};

use crate::config::Product;
use crate::error::{Result, ZirconError};
use crate::layout::executable_name;
use crate::util::is_executable;

/// Fetches sources.
pub trait Cloner {
    /// Clones `url` into `dest`, which must not exist or be empty.
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;
    /// Checks out a branch, tag or commit inside an existing clone.
    fn checkout(&self, repo_dir: &Path, reference: &str) -> Result<()>;
}

/// Runs the product's build inside a checkout.
pub trait Builder {
    fn build(&self, checkout: &Path) -> Result<()>;
}

/// What a successful source build produced.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Root of the checkout, where `include/` and `hook/` live.
    pub checkout: PathBuf,
    /// The built entry point; exists and is executable.
    pub binary: PathBuf,
}

/// The Source Builder contract used by the install transaction.
pub trait SourceBuild {
    fn build(&self, version: &str, repo_url: &str, dest_dir: &Path) -> Result<BuildOutput>;
}

/// `git` on the `PATH`.
#[derive(Debug, Clone, Default)]
pub struct GitCloner;

impl Cloner for GitCloner {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        info!("cloning {url}");
        let output = Command::new("git")
            .arg("clone")
            .arg("--quiet")
            .arg(url)
            .arg(dest)
            .output()
            .map_err(|e| ZirconError::Clone {
                url: url.to_string(),
                message: spawn_message("git", &e),
            })?;
        if !output.status.success() {
            return Err(ZirconError::Clone {
                url: url.to_string(),
                message: failure_message(&output),
            });
        }
        Ok(())
    }

    fn checkout(&self, repo_dir: &Path, reference: &str) -> Result<()> {
        info!("checking out {reference}");
        let output = Command::new("git")
            .arg("checkout")
            .arg("--quiet")
            .arg(reference)
            .arg("--")
            .current_dir(repo_dir)
            .output()
            .map_err(|e| ZirconError::Checkout {
                reference: reference.to_string(),
                message: spawn_message("git", &e),
            })?;
        if !output.status.success() {
            return Err(ZirconError::Checkout {
                reference: reference.to_string(),
                message: failure_message(&output),
            });
        }
        Ok(())
    }
}

/// Runs a configured argv (by default `cargo build --release`).
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    argv: Vec<String>,
}

impl CommandBuilder {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl Builder for CommandBuilder {
    fn build(&self, checkout: &Path) -> Result<()> {
        let Some((program, args)) = self.argv.split_first() else {
            return Err(ZirconError::build("no build command configured"));
        };
        info!("building with `{}` (this may take several minutes)", self.argv.join(" "));
        let output = Command::new(program)
            .args(args)
            .current_dir(checkout)
            .output()
            .map_err(|e| ZirconError::build(spawn_message(program, &e)))?;
        if !output.status.success() {
            return Err(ZirconError::build(failure_message(&output)));
        }
        Ok(())
    }
}

/// Clone, optional checkout, build, then locate the binary.
#[derive(Debug, Clone)]
pub struct SourceBuilder<C, B> {
    cloner: C,
    builder: B,
    checkout_name: String,
    default_ref: String,
    build_output: PathBuf,
    binary: String,
}

impl SourceBuilder<GitCloner, CommandBuilder> {
    /// Git plus the product's configured build command.
    pub fn for_product(product: &Product) -> Self {
        Self::new(
            GitCloner,
            CommandBuilder::new(product.build_command.clone()),
            product,
        )
    }
}

impl<C: Cloner, B: Builder> SourceBuilder<C, B> {
    pub fn new(cloner: C, builder: B, product: &Product) -> Self {
        Self {
            cloner,
            builder,
            checkout_name: product.name.clone(),
            default_ref: product.default_ref.clone(),
            build_output: product.build_output.clone(),
            binary: product.binary.clone(),
        }
    }
}

impl<C: Cloner, B: Builder> SourceBuild for SourceBuilder<C, B> {
    fn build(&self, version: &str, repo_url: &str, dest_dir: &Path) -> Result<BuildOutput> {
        let checkout = dest_dir.join(&self.checkout_name);
        let occupied = checkout
            .read_dir()
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false);
        if occupied {
            return Err(ZirconError::Clone {
                url: repo_url.to_string(),
                message: format!("{} already exists and is not empty", checkout.display()),
            });
        }

        self.cloner.clone_repo(repo_url, &checkout)?;
        if version != self.default_ref {
            self.cloner.checkout(&checkout, version)?;
        } else {
            debug!("building default branch {version}; no checkout needed");
        }
        self.builder.build(&checkout)?;

        let binary = checkout
            .join(&self.build_output)
            .join(executable_name(&self.binary));
        if !is_executable(&binary) {
            return Err(ZirconError::build(format!(
                "build succeeded but produced no executable at {}",
                binary.display()
            )));
        }
        Ok(BuildOutput { checkout, binary })
    }
}

pub(crate) fn spawn_message(program: &str, e: &std::io::Error) -> String {
    if e.kind() == std::io::ErrorKind::NotFound {
        format!("`{program}` not found on PATH")
    } else {
        format!("failed to run `{program}`: {e}")
    }
}

pub(crate) fn failure_message(output: &Output) -> String {
    let code = output
        .status
        .code()
        .map_or_else(|| "signal".to_string(), |c| c.to_string());
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut message = format!("exit code {code}");
    if !stderr.trim().is_empty() {
        message.push_str("\n\nstderr:\n");
        message.push_str(stderr.trim_end());
    }
    if !stdout.trim().is_empty() {
        message.push_str("\n\nstdout:\n");
        message.push_str(stdout.trim_end());
    }
    message
}
