use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};

use crate::error::{IoContext, Result, ZirconError};
use crate::layout::executable_name;
use crate::repo::RepoLocation;

/// Represents the contents of `<root>/config.toml`.
///
/// Every field has a default, so a missing file or a partial file is fine.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// How the current pointer and entry points are materialised.
    pub activation: ActivationKind,
    /// The compiler toolchain being managed.
    #[serde(deserialize_with = "toolchain_table")]
    pub toolchain: Product,
    /// The manager itself, used by `self update`.
    #[serde(deserialize_with = "manager_table")]
    pub manager: Product,
    pub network: Network,
    pub lock: LockSettings,
}

/// Everything needed to fetch, build and expose one product.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    /// Artifact prefix, as in `{name}-{platform}.tar.gz`.
    pub name: String,
    /// Entry point under `bin/`.
    pub binary: String,
    /// `owner/name` or a clone URL.
    pub repo: String,
    /// Reference installed when none is given; it is never checked out explicitly.
    pub default_ref: String,
    pub build_command: Vec<String>,
    /// Directory, relative to the checkout, holding the built binaries.
    pub build_output: PathBuf,
    /// Optional companion binaries copied next to the entry point when present.
    pub extra_binaries: Vec<String>,
    /// Variable exported by `env` pointing at the current `include/` directory.
    pub include_env: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Network {
    pub timeout_secs: u64,
    pub verify_checksums: bool,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LockSettings {
    pub timeout_secs: u64,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActivationKind {
    /// Symlinks where the platform has them, copies elsewhere.
    #[default]
    Auto,
    Symlink,
    Copy,
}

/// A product table as written in the file; unset keys fall back to the product's defaults.
#[derive(Deserialize, Default)]
#[serde(default)]
struct ProductTable {
    name: Option<String>,
    binary: Option<String>,
    repo: Option<String>,
    default_ref: Option<String>,
    build_command: Option<Vec<String>>,
    build_output: Option<PathBuf>,
    extra_binaries: Option<Vec<String>>,
    include_env: Option<String>,
}

impl ProductTable {
    fn over(self, base: Product) -> Product {
        Product {
            name: self.name.unwrap_or(base.name),
            binary: self.binary.unwrap_or(base.binary),
            repo: self.repo.unwrap_or(base.repo),
            default_ref: self.default_ref.unwrap_or(base.default_ref),
            build_command: self.build_command.unwrap_or(base.build_command),
            build_output: self.build_output.unwrap_or(base.build_output),
            extra_binaries: self.extra_binaries.unwrap_or(base.extra_binaries),
            include_env: self.include_env.or(base.include_env),
        }
    }
}

fn toolchain_table<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Product, D::Error> {
    ProductTable::deserialize(d).map(|table| table.over(Product::toolchain()))
}

fn manager_table<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Product, D::Error> {
    ProductTable::deserialize(d).map(|table| table.over(Product::manager()))
}

impl Product {
    /// Defaults for the `zrc` compiler.
    pub fn toolchain() -> Self {
        Self {
            name: "zrc".to_string(),
            binary: "zrc".to_string(),
            repo: "zirco-lang/zrc".to_string(),
            default_ref: "main".to_string(),
            build_command: vec!["cargo".into(), "build".into(), "--release".into()],
            build_output: PathBuf::from("target").join("release"),
            extra_binaries: vec!["zircop".to_string()],
            include_env: Some("ZIRCO_INCLUDE_PATH".to_string()),
        }
    }

    /// Defaults for the manager's own self installation.
    pub fn manager() -> Self {
        Self {
            name: "zircon".to_string(),
            binary: "zircon".to_string(),
            repo: "zirco-lang/zircon".to_string(),
            extra_binaries: Vec::new(),
            include_env: None,
            ..Self::toolchain()
        }
    }

    pub fn repo_location(&self) -> Result<RepoLocation> {
        RepoLocation::parse(&self.repo)
    }

    /// Entry point file name with the platform suffix.
    pub fn binary_file_name(&self) -> String {
        executable_name(&self.binary)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            activation: ActivationKind::Auto,
            toolchain: Product::toolchain(),
            manager: Product::manager(),
            network: Network::default(),
            lock: LockSettings::default(),
        }
    }
}

impl Default for Network {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            verify_checksums: true,
        }
    }
}

impl Default for LockSettings {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}

impl Settings {
    /// Loads settings from `path`, or the defaults when the file does not exist.
    ///
    /// # Errors
    /// Returns [`ZirconError::Config`] if the file exists but cannot be parsed.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .io_context(|| format!("failed to read {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .map_err(|e| ZirconError::config(format!("{}: {}", path.display(), e)))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        for product in [&self.toolchain, &self.manager] {
            if product.binary.is_empty() || product.name.is_empty() {
                return Err(ZirconError::config("product name and binary must not be empty"));
            }
            if product.build_command.is_empty() {
                return Err(ZirconError::config(format!(
                    "build_command for '{}' must not be empty",
                    product.name
                )));
            }
            product.repo_location()?;
        }
        Ok(())
    }
}
