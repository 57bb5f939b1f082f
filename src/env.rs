//! Shell snippets for `zircon env`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Cmd,
}

impl Shell {
    /// Guesses from `$SHELL`, then from PowerShell's module path on Windows.
    pub fn detect() -> Self {
        let from_env = std::env::var("SHELL").ok().and_then(|shell| {
            let name = Path::new(&shell).file_name()?.to_string_lossy().into_owned();
            name.parse::<Shell>().ok()
        });
        match from_env {
            Some(shell) => shell,
            None if cfg!(windows) && std::env::var_os("PSModulePath").is_some() => Self::PowerShell,
            None if cfg!(windows) => Self::Cmd,
            None => Self::Bash,
        }
    }
}

impl FromStr for Shell {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().trim_end_matches(".exe") {
            "bash" | "sh" => Ok(Self::Bash),
            "zsh" => Ok(Self::Zsh),
            "fish" => Ok(Self::Fish),
            "powershell" | "pwsh" => Ok(Self::PowerShell),
            "cmd" => Ok(Self::Cmd),
            other => Err(format!(
                "unknown shell '{other}' (expected bash, zsh, fish, powershell or cmd)"
            )),
        }
    }
}

/// What the environment of a shell using the current toolchain needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvScript {
    pub bin_dir: PathBuf,
    /// Variable name and the current installation's `include/` directory.
    pub include: Option<(String, PathBuf)>,
    /// `hook/env.sh` of the current installation, sourced by POSIX shells and fish.
    pub hook: Option<PathBuf>,
}

impl EnvScript {
    /// Builds the script for `current`, the current installation directory if any.
    pub fn new(bin_dir: PathBuf, include_env: Option<&str>, current: Option<&Path>) -> Self {
        let include = match (include_env, current) {
            (Some(var), Some(dir)) if dir.join("include").is_dir() => {
                Some((var.to_string(), dir.join("include")))
            }
            _ => None,
        };
        let hook = current
            .map(|dir| dir.join("hook").join("env.sh"))
            .filter(|hook| hook.is_file());
        Self {
            bin_dir,
            include,
            hook,
        }
    }

    /// The script for `shell`. POSIX shells and fish source `hook/env.sh` in place of the
    /// generated exports when the installation ships one.
    pub fn render(&self, shell: Shell) -> String {
        let mut out = String::new();
        let bin = self.bin_dir.to_string_lossy();
        match (shell, &self.hook) {
            (Shell::Bash | Shell::Zsh, Some(hook)) => {
                let _ = writeln!(out, ". {}", posix_quote(&hook.to_string_lossy()));
            }
            (Shell::Fish, Some(hook)) => {
                let _ = writeln!(out, "source {};", fish_quote(&hook.to_string_lossy()));
            }
            (Shell::Bash | Shell::Zsh, None) => {
                let _ = writeln!(out, "export PATH={}:\"$PATH\"", posix_quote(&bin));
                if let Some((var, dir)) = &self.include {
                    let _ = writeln!(out, "export {var}={}", posix_quote(&dir.to_string_lossy()));
                }
            }
            (Shell::Fish, None) => {
                let _ = writeln!(out, "set -gx PATH {} $PATH;", fish_quote(&bin));
                if let Some((var, dir)) = &self.include {
                    let _ = writeln!(out, "set -gx {var} {};", fish_quote(&dir.to_string_lossy()));
                }
            }
            (Shell::PowerShell, _) => {
                let _ = writeln!(
                    out,
                    "$env:PATH = {} + [IO.Path]::PathSeparator + $env:PATH",
                    ps_quote(&bin)
                );
                if let Some((var, dir)) = &self.include {
                    let _ = writeln!(out, "$env:{var} = {}", ps_quote(&dir.to_string_lossy()));
                }
            }
            (Shell::Cmd, _) => {
                let _ = writeln!(out, "set \"PATH={bin};%PATH%\"");
                if let Some((var, dir)) = &self.include {
                    let _ = writeln!(out, "set \"{var}={}\"", dir.display());
                }
            }
        }
        out
    }
}

fn posix_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn fish_quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', r"\\").replace('\'', r"\'"))
}

fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn shell_names_parse() {
        assert_eq!("zsh".parse::<Shell>().unwrap(), Shell::Zsh);
        assert_eq!("pwsh.exe".parse::<Shell>().unwrap(), Shell::PowerShell);
        assert!("tcsh".parse::<Shell>().is_err());
    }

    #[test]
    fn posix_output_quotes_paths() {
        let script = EnvScript {
            bin_dir: PathBuf::from("/home/o'neil/.zircon/bin"),
            include: Some(("ZIRCO_INCLUDE_PATH".into(), PathBuf::from("/z/include"))),
            hook: None,
        };
        let out = script.render(Shell::Bash);
        assert!(out.contains(r#"export PATH='/home/o'\''neil/.zircon/bin':"$PATH""#));
        assert!(out.contains("export ZIRCO_INCLUDE_PATH='/z/include'"));
    }

    #[test]
    fn fish_and_powershell_syntax() {
        let script = EnvScript {
            bin_dir: PathBuf::from("/z/bin"),
            include: None,
            hook: None,
        };
        assert_eq!(script.render(Shell::Fish), "set -gx PATH '/z/bin' $PATH;\n");
        assert!(script.render(Shell::PowerShell).starts_with("$env:PATH = '/z/bin'"));
        assert_eq!(script.render(Shell::Cmd), "set \"PATH=/z/bin;%PATH%\"\n");
    }

    #[test]
    fn include_and_hook_only_when_present() {
        let dir = tempdir().unwrap();
        let current = dir.path().join("v1");
        std::fs::create_dir_all(current.join("include")).unwrap();
        std::fs::create_dir_all(current.join("hook")).unwrap();
        std::fs::write(current.join("hook/env.sh"), "").unwrap();

        let script = EnvScript::new(dir.path().join("bin"), Some("ZIRCO_INCLUDE_PATH"), Some(&current));
        assert_eq!(
            script.include,
            Some(("ZIRCO_INCLUDE_PATH".to_string(), current.join("include")))
        );
        assert!(script.hook.is_some());

        let bare = EnvScript::new(dir.path().join("bin"), Some("ZIRCO_INCLUDE_PATH"), None);
        assert!(bare.include.is_none() && bare.hook.is_none());
    }

    #[test]
    fn hook_replaces_exports_for_posix_and_fish() {
        let script = EnvScript {
            bin_dir: PathBuf::from("/z/bin"),
            include: Some(("ZIRCO_INCLUDE_PATH".into(), PathBuf::from("/z/current/include"))),
            hook: Some(PathBuf::from("/z/current/hook/env.sh")),
        };
        assert_eq!(script.render(Shell::Bash), ". '/z/current/hook/env.sh'\n");
        assert_eq!(script.render(Shell::Zsh), ". '/z/current/hook/env.sh'\n");
        assert_eq!(script.render(Shell::Fish), "source '/z/current/hook/env.sh';\n");

        let ps = script.render(Shell::PowerShell);
        assert!(ps.contains("$env:ZIRCO_INCLUDE_PATH = '/z/current/include'"));
        assert!(!ps.contains("env.sh"));
    }
}
