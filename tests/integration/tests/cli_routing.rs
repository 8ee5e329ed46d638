//! CLI binary integration tests.
//!
//! These tests exercise the compiled `oubliette` binary to verify that
//! top-level command routing, help text, and error handling work as expected.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Locate the compiled `oubliette` binary in the workspace target directory.
///
/// Cargo sets `CARGO_MANIFEST_DIR` to the manifest directory of the package
/// being tested. We navigate up to the workspace root and look inside
/// `target/debug/`. Returns `None` when the binary has not been built.
fn oubliette_bin() -> Option<PathBuf> {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    // tests/integration -> workspace root
    let workspace_root = manifest_dir.parent()?.parent()?;
    let bin = workspace_root
        .join("target")
        .join("debug")
        .join(format!("oubliette{}", std::env::consts::EXE_SUFFIX));
    if bin.exists() {
        Some(bin)
    } else {
        eprintln!(
            "skipping: oubliette binary not found at {}; run `cargo build -p oubliette-cli` first",
            bin.display()
        );
        None
    }
}

/// Run the binary against an isolated home directory and config file.
fn run(home: &Path, args: &[&str]) -> Option<Output> {
    let output = Command::new(oubliette_bin()?)
        .env("OUBLIETTE_HOME", home)
        .env("OUBLIETTE_CONFIG", home.join("oubliette.json5"))
        .env_remove("OUBLIETTE_LOG")
        .args(args)
        .output()
        .expect("failed to run oubliette");
    Some(output)
}

fn file_backed_home() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("oubliette.json5"),
        "{ store: { backend: 'file' }, hardware: { backend: 'software' } }",
    )
    .unwrap();
    dir
}

#[test]
fn test_cli_version() {
    let home = TempDir::new().unwrap();
    let Some(output) = run(home.path(), &["version"]) else {
        return;
    };
    assert!(output.status.success(), "version command should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("oubliette"),
        "version output should contain 'oubliette', got: {}",
        stdout
    );
}

#[test]
fn test_cli_help() {
    let home = TempDir::new().unwrap();
    let Some(output) = run(home.path(), &["--help"]) else {
        return;
    };
    assert!(output.status.success(), "--help should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["add", "read", "delete", "exists", "config", "doctor"] {
        assert!(
            stdout.contains(command),
            "help output should mention '{}', got: {}",
            command,
            stdout
        );
    }
}

#[test]
fn test_cli_unknown_command() {
    let home = TempDir::new().unwrap();
    let Some(output) = run(home.path(), &["nonexistent-command"]) else {
        return;
    };
    assert!(
        !output.status.success(),
        "unknown command should fail with non-zero exit"
    );
}

#[test]
fn test_cli_item_lifecycle() {
    let home = file_backed_home();
    let home = home.path();

    let Some(added) = run(
        home,
        &["add", "token", "-s", "svc", "--hardware", "--value", "secret123"],
    ) else {
        return;
    };
    assert!(added.status.success(), "{}", String::from_utf8_lossy(&added.stderr));

    let read = run(home, &["read", "token", "-s", "svc", "--hardware"]).unwrap();
    assert!(read.status.success(), "{}", String::from_utf8_lossy(&read.stderr));
    assert_eq!(String::from_utf8_lossy(&read.stdout).trim(), "secret123");

    let exists = run(home, &["exists", "token", "-s", "svc"]).unwrap();
    assert_eq!(String::from_utf8_lossy(&exists.stdout).trim(), "true");

    let deleted = run(home, &["delete", "token", "-s", "svc"]).unwrap();
    assert!(deleted.status.success());
    // Deleting again is not an error.
    let deleted = run(home, &["delete", "token", "-s", "svc"]).unwrap();
    assert!(deleted.status.success());

    let exists = run(home, &["exists", "token", "-s", "svc"]).unwrap();
    assert_eq!(String::from_utf8_lossy(&exists.stdout).trim(), "false");

    let read = run(home, &["read", "token", "-s", "svc", "--hardware"]).unwrap();
    assert!(!read.status.success(), "reading a missing item should fail");
}

#[test]
fn test_cli_config_path_and_show() {
    let home = file_backed_home();
    let Some(path) = run(home.path(), &["config", "path"]) else {
        return;
    };
    assert!(path.status.success());
    assert!(String::from_utf8_lossy(&path.stdout).contains("oubliette.json5"));

    let show = run(home.path(), &["config", "show"]).unwrap();
    assert!(show.status.success());
    let json: serde_json::Value = serde_json::from_slice(&show.stdout).unwrap();
    assert_eq!(json["store"]["backend"], "file");
    assert_eq!(json["keystore"]["label_prefix"], "oubliette");
}

#[test]
fn test_cli_doctor_full() {
    let home = file_backed_home();
    let Some(output) = run(home.path(), &["doctor", "--full"]) else {
        return;
    };
    let stdout = String::from_utf8_lossy(&output.stdout);
    // Software keys are a warning, not an error.
    assert!(output.status.success(), "{}", stdout);
    assert!(stdout.contains("Round trip") || stdout.contains("round trip"), "{}", stdout);
}
