//! CLI checks that do not need a running node.

use std::process::Command;

fn semtest() -> Command {
    Command::new(env!("CARGO_BIN_EXE_semtest"))
}

#[test]
fn help_lists_the_options() {
    let output = semtest().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--input", "--rpc-url", "--accept", "--no-color", "--show-source"] {
        assert!(stdout.contains(flag), "missing {} in help output", flag);
    }
}

#[test]
fn missing_input_path_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = semtest()
        .args(["--no-color", "--input"])
        .arg(dir.path().join("nope.sol"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Input path does not exist"));
}
