use runtime_launcher::supervisor::is_pid_alive;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use std::time::Duration;

fn rtl_binary() -> String {
    env!("CARGO_BIN_EXE_rtl").to_string()
}

/// Run `rtl -w <workdir> <args>` with a clean launcher environment.
fn rtl(workdir: &Path, args: &[&str]) -> Output {
    Command::new(rtl_binary())
        .arg("-w")
        .arg(workdir)
        .args(args)
        .env_remove("GITHUB_TOKEN")
        .env_remove("RTL_PROJECTS_DIR")
        .env_remove("RTL_REGISTRY_FILE")
        .env_remove("RTL_LOG_FILE")
        .env_remove("RTL_API_BASE")
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to run rtl")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn list_on_empty_registry() {
    let work = tempfile::tempdir().unwrap();
    let output = rtl(work.path(), &["list"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "No runtimes active.");
}

#[test]
fn stop_unknown_runtime() {
    let work = tempfile::tempdir().unwrap();
    let output = rtl(work.path(), &["stop", "ghost"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "ghost not found.");
    assert!(!work.path().join("registry.json").exists());
}

#[test]
fn fetch_without_token_prints_hint() {
    let work = tempfile::tempdir().unwrap();
    let output = rtl(
        work.path(),
        &["fetch", "widget", "https://github.com/acme/widget"],
    );

    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("Error: Configuration error: Missing GITHUB_TOKEN"), "{}", err);
    assert!(err.contains("Hint:"), "{}", err);
    assert!(!work.path().join("projects").exists());
}

#[test]
fn list_reads_existing_registry() {
    let work = tempfile::tempdir().unwrap();
    fs::write(
        work.path().join("registry.json"),
        r#"{
  "beta": { "pid": 2147483600, "port": 9200, "started": 1760000000000 },
  "alpha": { "pid": 2147483601, "port": 9100, "started": 1760000000000 }
}"#,
    )
    .unwrap();

    let output = rtl(work.path(), &["list"]);
    assert_eq!(
        stdout(&output),
        "• alpha — PID 2147483601 (port 9100)\n• beta — PID 2147483600 (port 9200)\n"
    );

    let output = rtl(work.path(), &["list", "--json"]);
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed[0]["name"], "alpha");
    assert_eq!(parsed[1]["port"], 9200);
}

#[test]
fn prune_removes_dead_entries() {
    let work = tempfile::tempdir().unwrap();
    fs::write(
        work.path().join("registry.json"),
        r#"{ "ghost": { "pid": 2147483602, "port": 9300, "started": 1760000000000 } }"#,
    )
    .unwrap();

    let output = rtl(work.path(), &["prune"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "Pruned 1 runtime(s): ghost");

    let output = rtl(work.path(), &["list"]);
    assert_eq!(stdout(&output).trim(), "No runtimes active.");
}

#[test]
fn detached_launch_then_stop() {
    let work = tempfile::tempdir().unwrap();
    fs::create_dir_all(work.path().join("app")).unwrap();

    let output = rtl(
        work.path(),
        &["launch", "app", "app", "--command", "sleep 30", "--detach"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).starts_with("Launched app — PID "));

    let output = rtl(work.path(), &["list"]);
    let listed = stdout(&output);
    assert!(listed.starts_with("• app — PID "), "{}", listed);

    let output = rtl(work.path(), &["stop", "app"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "Stopped app.");

    let output = rtl(work.path(), &["list"]);
    assert_eq!(stdout(&output).trim(), "No runtimes active.");
}

#[test]
fn detached_child_keeps_writing_after_rtl_exits() {
    let work = tempfile::tempdir().unwrap();
    fs::create_dir_all(work.path().join("app")).unwrap();

    let output = rtl(
        work.path(),
        &[
            "launch",
            "chatty",
            "app",
            "--command",
            "sh -c 'sleep 1; echo hi; echo there >&2; sleep 30'",
            "--detach",
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let registry: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(work.path().join("registry.json")).unwrap())
            .unwrap();
    let pid = registry["chatty"]["pid"].as_u64().unwrap() as u32;

    std::thread::sleep(Duration::from_millis(2500));
    assert!(is_pid_alive(pid), "detached child {} died", pid);

    let logs = fs::read_to_string(work.path().join("logs.txt")).unwrap();
    assert!(logs.lines().any(|l| l == "hi"), "{}", logs);
    assert!(logs.lines().any(|l| l == "there"), "{}", logs);

    let output = rtl(work.path(), &["stop", "chatty"]);
    assert_eq!(stdout(&output).trim(), "Stopped chatty.");
    assert!(!is_pid_alive(pid));
}

#[test]
fn foreground_launch_logs_exit() {
    let work = tempfile::tempdir().unwrap();
    fs::create_dir_all(work.path().join("app")).unwrap();

    let output = rtl(
        work.path(),
        &["launch", "once", "app", "--command", "echo hello from once"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("once: Process exited with code 0"));

    let output = rtl(work.path(), &["logs", "once"]);
    let logs = stdout(&output);
    assert!(logs.contains("[once] hello from once"), "{}", logs);
    assert!(logs.contains("[once] Process exited with code 0"), "{}", logs);
}

#[test]
fn logs_for_unknown_runtime_fails() {
    let work = tempfile::tempdir().unwrap();
    let output = rtl(work.path(), &["logs", "nobody"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Runtime not found: nobody"));
}

#[test]
fn settings_file_is_honoured() {
    let work = tempfile::tempdir().unwrap();
    fs::write(
        work.path().join("runtime-launcher.yaml"),
        "registry_file: state/runtimes.json\n",
    )
    .unwrap();
    fs::create_dir_all(work.path().join("app")).unwrap();

    let output = rtl(
        work.path(),
        &["launch", "app", "app", "--command", "sleep 30", "--detach"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(work.path().join("state/runtimes.json").is_file());
    assert!(!work.path().join("registry.json").exists());

    let output = rtl(work.path(), &["stop", "app"]);
    assert_eq!(stdout(&output).trim(), "Stopped app.");
}
