use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use zircon::env::Shell;

#[derive(Debug, Parser, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace). `ZIRCON_LOG` takes precedence
    #[clap(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub(crate) command: ZirconCommand,
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum ZirconCommand {
    /// Installs a toolchain from a prebuilt release, building from source if none fits.
    /// Defaults to the configured default branch
    Install {
        /// Tag, branch or commit
        reference: Option<String>,
        /// Remove and install again if already installed
        #[clap(long)]
        reinstall: bool,
        /// Repository as `owner/name` or a clone URL
        #[clap(long)]
        repo: Option<String>,
        /// Do not make the installed toolchain current
        #[clap(long)]
        no_switch: bool,
    },
    /// Builds a toolchain from source, skipping prebuilt releases
    Build {
        /// Tag, branch or commit to check out
        reference: String,
        /// Repository as `owner/name` or a clone URL
        #[clap(long)]
        repo: Option<String>,
        /// Remove and build again if already installed
        #[clap(long)]
        reinstall: bool,
        /// Do not make the built toolchain current
        #[clap(long)]
        no_switch: bool,
    },
    /// Installs a local `.tar.gz` laid out like a release artifact
    Import {
        /// Path to the `.tar.gz` archive
        archive: PathBuf,
        /// Name to register the toolchain under
        #[clap(long)]
        name: String,
        /// Replace an existing toolchain with the same name
        #[clap(long)]
        reinstall: bool,
        /// Do not make the imported toolchain current
        #[clap(long)]
        no_switch: bool,
    },
    /// Makes an installed toolchain the current one
    Switch {
        version: String,
    },
    /// Lists installed toolchains; the current one is marked with `*`
    List {
        /// Also show where each toolchain came from
        #[clap(short, long)]
        verbose: bool,
    },
    /// Deletes an installed toolchain. The current toolchain cannot be deleted
    Delete {
        version: String,
    },
    /// Deletes every toolchain except the current one
    Prune {
        /// Do not ask for confirmation
        #[clap(short, long)]
        yes: bool,
    },
    /// Prints shell commands that put the toolchain on `PATH`: `eval "$(zircon env)"`
    Env {
        /// bash, zsh, fish, powershell or cmd. Detected when omitted
        #[clap(long)]
        shell: Option<Shell>,
    },
    /// Manages zircon itself
    #[command(name = "self", subcommand)]
    Manager(SelfCommand),
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum SelfCommand {
    /// Reinstalls zircon from a release or from source
    Update {
        reference: Option<String>,
        #[clap(long)]
        repo: Option<String>,
        /// Skip prebuilt releases
        #[clap(long)]
        from_source: bool,
    },
    /// Prints the running version
    Version,
}
