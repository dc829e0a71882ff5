//! Integration tests for the `cbloop` binary

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos").join(name)
}

/// Run the binary with an isolated config directory
fn cbloop(
    home: &Path,
    args: &[&str],
) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cbloop"))
        .args(args)
        .env("XDG_CONFIG_HOME", home)
        .env_remove("CBLOOP_LOG")
        .output()
        .unwrap()
}

#[test]
fn test_run_prints_program_output() {
    let home = TempDir::new().unwrap();
    let file = demo("counter.ron");
    let output = cbloop(home.path(), &["run", file.to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().collect::<Vec<_>>(), ["2", "5", "count=5"]);
}

#[test]
fn test_run_reports_faults() {
    let home = TempDir::new().unwrap();
    let file = home.path().join("bad.ron");
    std::fs::write(&file, r#"(main: [Print(Var("nope"))])"#).unwrap();
    let output = cbloop(home.path(), &["run", file.to_str().unwrap()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Undefined variable: nope"));
}

#[test]
fn test_check_summarizes_program() {
    let home = TempDir::new().unwrap();
    let file = demo("interleave.ron");
    let output = cbloop(home.path(), &["check", file.to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 async"));
    assert!(stdout.contains("main statements:  3"));
}

#[test]
fn test_tasks_prints_json_table() {
    let home = TempDir::new().unwrap();
    let file = demo("interleave.ron");
    let output = cbloop(home.path(), &["tasks", file.to_str().unwrap()]);

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["tasks"].as_array().map(Vec::len), Some(2));
    assert_eq!(report["output"][6], "6");
}

#[test]
fn test_config_file_sets_log_level() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("quiet.ron");
    std::fs::write(&config, "(log: (level: error), interpreter: (echo_output: false))").unwrap();
    let file = demo("counter.ron");
    let output = cbloop(
        home.path(),
        &["--config", config.to_str().unwrap(), "run", file.to_str().unwrap()],
    );

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    assert!(output.stderr.is_empty());
}

#[test]
fn test_version() {
    let home = TempDir::new().unwrap();
    let output = cbloop(home.path(), &["version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}
