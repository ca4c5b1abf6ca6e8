use std::process::Command;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "fjordle-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

#[test]
fn cli_list_scenarios_writes_output() {
    let exe = env!("CARGO_BIN_EXE_fjordle-tester");
    let output_path = temp_path("list");
    let status = Command::new(exe)
        .args(["--list-scenarios", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("Available scenarios"));
    for key in ["smoke", "random-play", "share-text"] {
        assert!(content.contains(key), "missing {key}");
    }
}

#[test]
fn cli_runs_all_scenarios_with_json_report() {
    let exe = env!("CARGO_BIN_EXE_fjordle-tester");
    let output_path = temp_path("run");
    let state_dir = temp_path("state");
    let output = Command::new(exe)
        .args([
            "--scenarios",
            "all",
            "--seeds",
            "1,42",
            "--iterations",
            "2",
            "--report",
            "json",
            "--output",
        ])
        .arg(&output_path)
        .arg("--state-dir")
        .arg(&state_dir)
        .output()
        .expect("run cli");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "{stdout}");
    assert!(stdout.contains("Fjordle Automated Tester"));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output_path).expect("read report"))
            .expect("json report");
    let runs = report.as_array().expect("array report");
    assert_eq!(runs.len(), 7 * 2);
    assert!(runs.iter().all(|run| run["passed"] == true));
    assert!(state_dir.join("smoke-seed-1-1").is_dir());
    let _ = std::fs::remove_dir_all(state_dir);
}

#[test]
fn cli_reports_unknown_scenarios_without_failing() {
    let exe = env!("CARGO_BIN_EXE_fjordle-tester");
    let output = Command::new(exe)
        .args(["--scenarios", "vehicle-system", "--report", "markdown"])
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stderr.contains("Unknown scenario"));
    assert!(stdout.contains("_No scenarios executed._"));
}

#[test]
fn cli_rejects_bad_seeds() {
    let exe = env!("CARGO_BIN_EXE_fjordle-tester");
    let output = Command::new(exe)
        .args(["--seeds", "twelve"])
        .output()
        .expect("run cli");
    assert!(!output.status.success());
}
