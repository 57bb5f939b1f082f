//! # Zircon Core Library
//!
//! This crate contains the core logic of `zircon`, a version manager for the `zrc`
//! compiler toolchain. It installs toolchains from prebuilt release artifacts (falling
//! back to building from source), keeps them side by side under one root directory and
//! switches between them with a single atomic pointer swap.
//!
//! This library is built for the `zircon` CLI, but every collaborator that touches the
//! network or runs an external tool sits behind a trait, so it can be driven with fakes.
//!
//! ## Modules Overview
//! - [`platform`] – Host OS/architecture to `{os}-{arch}` platform tags
//! - [`resolver`] – Locating and downloading prebuilt artifacts
//! - [`builder`] – Cloning and building from source
//! - [`installer`] – The staged, all-or-nothing installation transaction
//! - [`registry`] – Installed versions, receipts, delete and prune
//! - [`activation`] – The current pointer and `bin/` entry points
//! - [`layout`] – The root directory layout
//! - [`config`] – `config.toml` settings
//! - [`env`] – Shell snippets exporting `PATH` and include paths
//! - [`error`] – The error type shared by all of the above

pub mod activation;
pub mod archive;
pub mod builder;
pub mod config;
pub mod env;
pub mod error;
pub mod installer;
pub mod layout;
pub mod lock;
pub mod platform;
pub mod registry;
pub mod repo;
pub mod resolver;
pub mod util;
pub mod version;

pub use activation::{ActivationBackend, Activator, CopyBackend, SymlinkBackend, select_backend};
pub use builder::{BuildOutput, Builder, Cloner, SourceBuild, SourceBuilder};
pub use config::{ActivationKind, Product, Settings};
pub use error::{Result, ZirconError};
pub use installer::{InstallOptions, InstalledToolchain, Installer, Strategy};
pub use layout::Layout;
pub use platform::{Host, Platform};
pub use registry::{InstallReceipt, InstallSource, Registry};
pub use repo::RepoLocation;
pub use resolver::{ArtifactResolver, DownloadedArtifact, HttpResolver};
pub use version::VersionRef;
