//! Repository locations: either a hosting identifier (`owner/name`) or a full URL.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, ZirconError};

const GITHUB: &str = "https://github.com";

static OWNER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+$").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoLocation {
    /// A GitHub `owner/name` pair.
    Hosted { owner: String, name: String },
    /// Any clone URL (https, ssh, file or a local path given as a URL).
    Url(String),
}

impl RepoLocation {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.contains("://") || input.starts_with("git@") {
            return Ok(Self::Url(input.to_string()));
        }
        if OWNER_NAME.is_match(input) {
            let (owner, name) = input
                .split_once('/')
                .ok_or_else(|| ZirconError::InvalidRepository {
                    input: input.to_string(),
                })?;
            let name = name.strip_suffix(".git").unwrap_or(name);
            return Ok(Self::Hosted {
                owner: owner.to_string(),
                name: name.to_string(),
            });
        }
        Err(ZirconError::InvalidRepository {
            input: input.to_string(),
        })
    }

    /// URL handed to the version-control tool.
    pub fn clone_url(&self) -> String {
        match self {
            Self::Hosted { owner, name } => format!("{GITHUB}/{owner}/{name}.git"),
            Self::Url(url) => url.clone(),
        }
    }

    /// Base under which `releases/download/...` lives.
    pub fn release_base(&self) -> String {
        match self {
            Self::Hosted { owner, name } => format!("{GITHUB}/{owner}/{name}"),
            Self::Url(url) => {
                let url = url.trim_end_matches('/');
                url.strip_suffix(".git").unwrap_or(url).to_string()
            }
        }
    }

    /// `{base}/releases/download/{version}/{file_name}`
    pub fn artifact_url(&self, version: &str, file_name: &str) -> String {
        format!(
            "{}/releases/download/{}/{}",
            self.release_base(),
            version,
            file_name
        )
    }
}

impl fmt::Display for RepoLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hosted { owner, name } => write!(f, "{owner}/{name}"),
            Self::Url(url) => f.write_str(url),
        }
    }
}
