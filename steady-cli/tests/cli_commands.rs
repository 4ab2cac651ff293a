use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn steady(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_steady"))
        .arg("--config-dir")
        .arg(config_dir)
        .args(args)
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to run steady")
}

fn stdout_of(output: &Output) -> String {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_split_reports_chunk_layout() {
    let temp_dir = TempDir::new().unwrap();
    let stdout = stdout_of(&steady(
        temp_dir.path(),
        &["split", "--size", "4", "abcdefghij"],
    ));

    assert!(stdout.contains("10 chars -> 3 chunks (max 4)"));
    assert!(stdout.contains("abcd"));
    assert!(stdout.contains("ij"));
}

#[test]
fn test_config_init_then_show() {
    let temp_dir = TempDir::new().unwrap();
    stdout_of(&steady(temp_dir.path(), &["config", "init"]));
    assert!(temp_dir.path().join("config.json").exists());

    let stdout = stdout_of(&steady(temp_dir.path(), &["config", "show"]));
    assert!(stdout.contains("\"max_chunk_size\": 1000"));
    assert!(stdout.contains("\"max_messages\": 150"));

    let again = stdout_of(&steady(temp_dir.path(), &["config", "init"]));
    assert!(again.contains("already exists"));
}

#[test]
fn test_run_drains_file() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.txt");
    std::fs::write(&input, "first line\n\nsecond line\n").unwrap();

    let stdout = stdout_of(&steady(
        temp_dir.path(),
        &["run", input.to_str().unwrap(), "--type", "note", "--timeout", "5"],
    ));

    assert!(stdout.contains("note_1_0"));
    assert!(stdout.contains("note_2_0"));
    assert!(stdout.contains("\"processed_messages\": 2"));
    assert!(!stdout.contains("timed out"));
}

#[test]
fn test_run_keeps_logs_off_stdout() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.txt");
    std::fs::write(&input, "only line\n").unwrap();

    let output = steady(
        temp_dir.path(),
        &["run", input.to_str().unwrap(), "--timeout", "5"],
    );
    let stdout = stdout_of(&output);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(stdout.contains("line_1_0"));
    assert!(!stdout.contains("Incremental processor started"));
    assert!(!stdout.contains("memory_usage"));
    assert!(stderr.contains("Incremental processor started"));
}

#[test]
fn test_run_rejects_unknown_preset() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.txt");
    std::fs::write(&input, "hello\n").unwrap();

    let output = steady(
        temp_dir.path(),
        &["run", input.to_str().unwrap(), "--preset", "turbo"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown preset"));
}
