use assert_cmd::Command;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn zircon(prefix: &Path) -> Command {
    let mut cmd = Command::cargo_bin("zircon").unwrap();
    cmd.env("ZIRCON_PREFIX", prefix).env_remove("ZIRCON_LOG");
    cmd
}

#[test]
fn test_list_on_empty_root() {
    let dir = tempdir().unwrap();
    let output = zircon(dir.path())
        .arg("list")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("No toolchains installed"));
}

#[test]
fn test_switch_to_missing_version_fails() {
    let dir = tempdir().unwrap();
    let output = zircon(dir.path())
        .args(["switch", "v9.9.9"])
        .assert()
        .code(1)
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("'v9.9.9' is not installed"));
    assert!(!dir.path().join("current").exists());
}

#[test]
fn test_delete_missing_version_fails() {
    let dir = tempdir().unwrap();
    zircon(dir.path())
        .args(["delete", "v1"])
        .assert()
        .code(1);
}

#[test]
fn test_env_prints_bin_dir() {
    let dir = tempdir().unwrap();
    let output = zircon(dir.path())
        .args(["env", "--shell", "bash"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let expected = format!("export PATH='{}':\"$PATH\"", dir.path().join("bin").display());
    assert!(String::from_utf8_lossy(&output).contains(&expected));
}

#[test]
fn test_unknown_shell_is_rejected() {
    let dir = tempdir().unwrap();
    zircon(dir.path())
        .args(["env", "--shell", "tcsh"])
        .assert()
        .failure();
}

#[test]
fn test_malformed_config_fails() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "activation = 3").unwrap();
    let output = zircon(dir.path())
        .arg("list")
        .assert()
        .code(1)
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("configuration error"));
}

#[test]
fn test_self_version() {
    let dir = tempdir().unwrap();
    let output = zircon(dir.path())
        .args(["self", "version"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8_lossy(&output).contains(env!("CARGO_PKG_VERSION")));
}

#[cfg(unix)]
#[test]
fn test_import_switch_list_round_trip() {
    use zircon::archive::create_tar_gz;
    use zircon::util::set_executable;

    let dir = tempdir().unwrap();
    let prefix = dir.path().join("root");
    let tree = dir.path().join("tree");
    fs::create_dir_all(tree.join("bin")).unwrap();
    fs::create_dir_all(tree.join("include")).unwrap();
    fs::write(tree.join("bin/zrc"), "#!/bin/sh\necho zrc\n").unwrap();
    set_executable(&tree.join("bin/zrc")).unwrap();
    let archive = dir.path().join("zrc.tar.gz");
    create_tar_gz(&tree, &archive).unwrap();

    for name in ["local-a", "local-b"] {
        zircon(&prefix)
            .arg("import")
            .arg(&archive)
            .args(["--name", name])
            .assert()
            .success();
    }
    // Importing local-b made it current.
    zircon(&prefix).args(["switch", "local-a"]).assert().success();

    let listed = zircon(&prefix)
        .args(["list", "--verbose"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let listed = String::from_utf8_lossy(&listed);
    assert!(listed.contains("local-a"));
    assert!(listed.contains("local-b"));
    assert!(listed.contains("source: archive"));

    zircon(&prefix).args(["delete", "local-a"]).assert().code(1);
    assert!(prefix.join("toolchains/local-a").is_dir());

    let env = zircon(&prefix)
        .args(["env", "--shell", "fish"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8_lossy(&env).contains("set -gx ZIRCO_INCLUDE_PATH"));

    zircon(&prefix).args(["prune", "--yes"]).assert().success();
    assert!(!prefix.join("toolchains/local-b").exists());
    assert!(prefix.join("bin/zrc").exists());
}

#[cfg(unix)]
#[test]
fn test_env_include_path_follows_current_pointer() {
    use zircon::archive::create_tar_gz;
    use zircon::util::set_executable;

    let dir = tempdir().unwrap();
    let prefix = dir.path().join("root");
    let tree = dir.path().join("tree");
    fs::create_dir_all(tree.join("bin")).unwrap();
    fs::create_dir_all(tree.join("include")).unwrap();
    fs::write(tree.join("bin/zrc"), "#!/bin/sh\n").unwrap();
    set_executable(&tree.join("bin/zrc")).unwrap();
    let archive = dir.path().join("zrc.tar.gz");
    create_tar_gz(&tree, &archive).unwrap();

    for name in ["a", "b"] {
        zircon(&prefix)
            .arg("import")
            .arg(&archive)
            .args(["--name", name])
            .assert()
            .success();
    }
    zircon(&prefix).args(["switch", "a"]).assert().success();

    let env = zircon(&prefix)
        .args(["env", "--shell", "bash"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let env = String::from_utf8_lossy(&env);
    let expected = format!(
        "export ZIRCO_INCLUDE_PATH='{}'",
        prefix.join("current").join("include").display()
    );
    assert!(env.contains(&expected));
    assert!(!env.contains("toolchains"));

    zircon(&prefix).args(["switch", "b"]).assert().success();
    let resolved = fs::canonicalize(prefix.join("current/include")).unwrap();
    assert_eq!(resolved, fs::canonicalize(prefix.join("toolchains/b/include")).unwrap());
}

#[test]
fn test_build_and_import_flags_have_help() {
    let dir = tempdir().unwrap();
    let build = zircon(dir.path())
        .args(["build", "--help"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let build = String::from_utf8_lossy(&build);
    assert!(build.contains("Tag, branch or commit to check out"));
    assert!(build.contains("Do not make the built toolchain current"));

    let import = zircon(dir.path())
        .args(["import", "--help"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let import = String::from_utf8_lossy(&import);
    assert!(import.contains("Path to the"));
    assert!(import.contains("Replace an existing toolchain with the same name"));
}
