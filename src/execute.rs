use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use zircon::env::{EnvScript, Shell};
use zircon::version::sort_versions;
use zircon::{
    HttpResolver, InstallOptions, InstalledToolchain, Installer, Layout, Product, Registry,
    RepoLocation, Settings, SourceBuilder, Strategy, VersionRef, select_backend,
};

use crate::cli::{Cli, SelfCommand, ZirconCommand};

/// Everything a command needs, resolved once at startup.
struct Session {
    layout: Layout,
    settings: Settings,
}

impl Session {
    fn load() -> Result<Self> {
        let layout = Layout::from_env()?;
        let settings = Settings::load_or_default(layout.config_file())?;
        Ok(Self { layout, settings })
    }

    fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.lock.timeout_secs)
    }

    fn registry(&self) -> Registry {
        Registry::new(
            self.layout.clone(),
            &self.settings.toolchain,
            select_backend(self.settings.activation),
        )
        .with_lock_timeout(self.lock_timeout())
    }

    fn resolver(&self, product: &Product) -> Result<HttpResolver> {
        let network = &self.settings.network;
        Ok(HttpResolver::new(
            &product.name,
            &self.layout.tmp_dir(),
            Duration::from_secs(network.timeout_secs),
        )?
        .with_checksums(network.verify_checksums))
    }
}

pub fn execute(cli: Cli) -> Result<()> {
    let ctx = Session::load()?;
    match cli.command {
        ZirconCommand::Install { reference, reinstall, repo, no_switch } => {
            let product = &ctx.settings.toolchain;
            let reference = reference.unwrap_or_else(|| product.default_ref.clone());
            execute_install(&ctx, &reference, repo, reinstall, Strategy::Auto, !no_switch)
        }
        ZirconCommand::Build { reference, repo, reinstall, no_switch } => {
            execute_install(&ctx, &reference, repo, reinstall, Strategy::SourceOnly, !no_switch)
        }
        ZirconCommand::Import { archive, name, reinstall, no_switch } => {
            execute_import(&ctx, archive, &name, reinstall, !no_switch)
        }
        ZirconCommand::Switch { version } => {
            execute_switch(&ctx, &version)
        }
        ZirconCommand::List { verbose } => {
            execute_list(&ctx, verbose)
        }
        ZirconCommand::Delete { version } => {
            execute_delete(&ctx, &version)
        }
        ZirconCommand::Prune { yes } => {
            execute_prune(&ctx, yes)
        }
        ZirconCommand::Env { shell } => {
            execute_env(&ctx, shell.unwrap_or_else(Shell::detect))
        }
        ZirconCommand::Manager(SelfCommand::Update { reference, repo, from_source }) => {
            execute_self_update(&ctx, reference, repo, from_source)
        }
        ZirconCommand::Manager(SelfCommand::Version) => {
            println!("zircon {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn repo_location(product: &Product, repo: Option<String>) -> Result<RepoLocation> {
    let repo = repo.unwrap_or_else(|| product.repo.clone());
    Ok(RepoLocation::parse(&repo)?)
}

fn report_installed(installed: &InstalledToolchain) {
    if installed.fresh {
        let source = installed.source.map(|s| s.to_string()).unwrap_or_default();
        println!(
            "{} {} ({source})",
            "Installed".green().bold(),
            installed.version
        );
    } else {
        println!(
            "{} is already installed; use --reinstall to replace it",
            installed.version.bold()
        );
    }
}

fn switch_to(ctx: &Session, version: &VersionRef) -> Result<()> {
    ctx.registry().activator().activate(version)?;
    println!("{} {}", "Now using".green().bold(), version.dir_name());
    Ok(())
}

fn execute_install(
    ctx: &Session,
    reference: &str,
    repo: Option<String>,
    reinstall: bool,
    strategy: Strategy,
    switch: bool,
) -> Result<()> {
    let product = &ctx.settings.toolchain;
    let version = VersionRef::parse(reference)?;
    let repo = repo_location(product, repo)?;
    let resolver = ctx.resolver(product)?;
    let builder = SourceBuilder::for_product(product);

    println!("Installing {} from {}", version.as_str().bold(), repo);
    let installed = Installer::new(&ctx.layout, product, &resolver, &builder)
        .with_lock_timeout(ctx.lock_timeout())
        .install(&version, &repo, &InstallOptions { reinstall, strategy })?;
    report_installed(&installed);

    if switch {
        switch_to(ctx, &version)?;
    }
    Ok(())
}

fn execute_import(
    ctx: &Session,
    archive: PathBuf,
    name: &str,
    reinstall: bool,
    switch: bool,
) -> Result<()> {
    let product = &ctx.settings.toolchain;
    let archive = std::path::absolute(&archive)
        .with_context(|| format!("invalid archive path {}", archive.display()))?;
    if !archive.is_file() {
        anyhow::bail!("archive {} does not exist", archive.display());
    }
    let version = VersionRef::parse(name)?;
    let repo = repo_location(product, None)?;
    let resolver = ctx.resolver(product)?;
    let builder = SourceBuilder::for_product(product);

    let installed = Installer::new(&ctx.layout, product, &resolver, &builder)
        .with_lock_timeout(ctx.lock_timeout())
        .install(
            &version,
            &repo,
            &InstallOptions {
                reinstall,
                strategy: Strategy::Archive(archive),
            },
        )?;
    report_installed(&installed);

    if switch {
        switch_to(ctx, &version)?;
    }
    Ok(())
}

fn execute_switch(ctx: &Session, version: &str) -> Result<()> {
    let version = VersionRef::parse(version)?;
    switch_to(ctx, &version)
}

fn execute_list(ctx: &Session, verbose: bool) -> Result<()> {
    let registry = ctx.registry();
    let mut names = registry.list()?;
    if names.is_empty() {
        println!("No toolchains installed");
        return Ok(());
    }
    sort_versions(&mut names);
    let current = registry.current();

    for name in &names {
        if current.as_deref() == Some(name.as_str()) {
            println!("{} {}", "*".green().bold(), name.green().bold());
        } else {
            println!("  {name}");
        }
        if verbose {
            match registry.receipt(name) {
                Some(receipt) => {
                    println!("    source: {}", receipt.source);
                    println!("    from:   {}", receipt.origin);
                }
                None => {
                    println!("    source: unknown");
                }
            }
        }
    }
    Ok(())
}

fn execute_delete(ctx: &Session, version: &str) -> Result<()> {
    let version = VersionRef::parse(version)?;
    ctx.registry().delete(&version)?;
    println!("{} {}", "Deleted".green().bold(), version.dir_name());
    Ok(())
}

fn execute_prune(ctx: &Session, yes: bool) -> Result<()> {
    let registry = ctx.registry();
    let current = registry.current();
    let doomed: Vec<String> = registry
        .list()?
        .into_iter()
        .filter(|name| current.as_deref() != Some(name.as_str()))
        .collect();
    if doomed.is_empty() {
        println!("Nothing to prune");
        return Ok(());
    }
    if !yes && !confirm(&format!("Delete {} toolchain(s): {}?", doomed.len(), doomed.join(", ")))? {
        println!("Aborted");
        return Ok(());
    }

    let mut removed = registry.prune()?;
    sort_versions(&mut removed);
    for name in &removed {
        println!("{} {}", "Deleted".green().bold(), name);
    }
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn execute_env(ctx: &Session, shell: Shell) -> Result<()> {
    let registry = ctx.registry();
    let current = registry.current_shell_dir();
    let script = EnvScript::new(
        ctx.layout.bin_dir(),
        ctx.settings.toolchain.include_env.as_deref(),
        current.as_deref(),
    );
    print!("{}", script.render(shell));
    Ok(())
}

fn execute_self_update(
    ctx: &Session,
    reference: Option<String>,
    repo: Option<String>,
    from_source: bool,
) -> Result<()> {
    let product = &ctx.settings.manager;
    let reference = reference.unwrap_or_else(|| product.default_ref.clone());
    let version = VersionRef::parse(&reference)?;
    let repo = repo_location(product, repo)?;
    let resolver = ctx.resolver(product)?;
    let builder = SourceBuilder::for_product(product);
    let strategy = if from_source { Strategy::SourceOnly } else { Strategy::Auto };

    println!("Updating zircon to {} from {}", version.as_str().bold(), repo);
    Installer::new(&ctx.layout, product, &resolver, &builder)
        .with_lock_timeout(ctx.lock_timeout())
        .install_self(&version, &repo, strategy)?;
    ctx.registry()
        .activator()
        .expose_manager(&product.binary_file_name())?;
    println!("{} zircon {}", "Updated".green().bold(), version.as_str());
    Ok(())
}
