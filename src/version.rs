use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use semver::Version;

use crate::error::{Result, ZirconError};

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._+@-]").expect("static regex"));

/// A requested tag, branch or commit, together with the directory-safe name it is
/// registered under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRef {
    raw: String,
    dir_name: String,
}

impl VersionRef {
    /// Validates `reference` and derives its registry key.
    ///
    /// Characters outside `[A-Za-z0-9._+@-]` become `-`, so `feature/x` is stored as
    /// `feature-x`. Names starting with `.` are reserved for staging entries.
    pub fn parse(reference: &str) -> Result<Self> {
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Err(ZirconError::InvalidVersion {
                reference: reference.to_string(),
                reason: "empty reference".to_string(),
            });
        }
        let dir_name = UNSAFE_CHARS.replace_all(trimmed, "-").into_owned();
        if dir_name.starts_with('.') {
            return Err(ZirconError::InvalidVersion {
                reference: reference.to_string(),
                reason: "names starting with '.' are reserved".to_string(),
            });
        }
        Ok(Self {
            raw: trimmed.to_string(),
            dir_name,
        })
    }

    /// The reference as given; used for download URLs and checkouts.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The sanitized registry key.
    pub fn dir_name(&self) -> &str {
        &self.dir_name
    }
}

impl fmt::Display for VersionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn as_semver(name: &str) -> Option<Version> {
    Version::parse(name.strip_prefix('v').unwrap_or(name)).ok()
}

/// Orders installed version names: semver names ascending first, then the rest
/// (branches, commits) lexicographically.
pub fn compare(a: &str, b: &str) -> Ordering {
    match (as_semver(a), as_semver(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Sorts installed names in place with [`compare`].
pub fn sort_versions(names: &mut [String]) {
    names.sort_by(|a, b| compare(a, b));
}
