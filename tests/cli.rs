#![cfg(unix)]

use assert_cmd::Command;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const KRAFTKLUB: &str = r#"{"title":"Wenn ich tot bin, fang ich wieder an","artist":"Kraftklub","album":"Kargo","duration":187.5,"elapsedTime":60,"playing":true,"artworkData":"data:image/png;base64,aGVsbG8=","artworkMimeType":"image/png"}"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.toml"), "").unwrap();
        Self { dir }
    }

    fn tool(&self, body: &str) -> PathBuf {
        let path = self.dir.path().join("media-control");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn cmd(&self, tool: &Path) -> Command {
        let mut cmd = Command::cargo_bin("mediabar").unwrap();
        cmd.env_remove("MEDIABAR_COMMAND")
            .env_remove("MEDIABAR_INTERVAL")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(self.dir.path().join("config.toml"))
            .arg("--data-dir")
            .arg(self.dir.path().join("data"))
            .arg("--command-path")
            .arg(tool);
        cmd
    }
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().unwrap();
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn get_prints_current_track() {
    let fx = Fixture::new();
    let tool = fx.tool(&format!("echo '{KRAFTKLUB}'"));

    let out = stdout_of(fx.cmd(&tool).arg("get"));
    assert!(out.contains("Title:    Wenn ich tot bin, fang ich wieder an"), "{out}");
    assert!(out.contains("Artist:   Kraftklub"), "{out}");
    assert!(out.contains("Status:   Playing"), "{out}");
    assert!(out.contains("Progress: 1:00 / 3:07 (32%)"), "{out}");
}

#[test]
fn get_json_and_artwork() {
    let fx = Fixture::new();
    let tool = fx.tool(&format!("echo '{KRAFTKLUB}'"));
    let artwork = fx.dir.path().join("cover.png");

    let out = stdout_of(
        fx.cmd(&tool)
            .arg("get")
            .arg("--json")
            .arg("--artwork")
            .arg(&artwork),
    );
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["artist"], "Kraftklub");
    assert_eq!(value["elapsedTime"], 60.0);
    assert!(value.get("genre").is_none());
    assert_eq!(fs::read(&artwork).unwrap(), b"hello");

    let dir = fx.dir.path().join("covers");
    fs::create_dir(&dir).unwrap();
    fx.cmd(&tool)
        .arg("get")
        .arg("--artwork")
        .arg(&dir)
        .assert()
        .success();
    assert_eq!(fs::read(dir.join("artwork.png")).unwrap(), b"hello");
}

#[test]
fn get_no_media() {
    let fx = Fixture::new();
    let tool = fx.tool("echo 'No media currently playing'");

    fx.cmd(&tool)
        .arg("get")
        .assert()
        .success()
        .stdout("No Media Playing\n");
}

#[test]
fn get_reports_command_failure() {
    let fx = Fixture::new();
    let tool = fx.tool("echo 'device locked' >&2; exit 1");

    let output = fx.cmd(&tool).arg("get").output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("media query command failed: device locked"),
        "{stderr}"
    );
}

#[test]
fn get_reports_missing_tool() {
    let fx = Fixture::new();
    let missing = fx.dir.path().join("not-installed");

    let output = fx.cmd(&missing).arg("get").output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to launch media query command"),
        "{stderr}"
    );
}

#[test]
fn check_finds_tool() {
    let fx = Fixture::new();
    let tool = fx.tool("exit 0");

    fx.cmd(&tool).arg("check").assert().success();
    fx.cmd(&fx.dir.path().join("not-installed"))
        .arg("check")
        .assert()
        .failure();
}

#[test]
fn watch_reports_cold_start() {
    let fx = Fixture::new();
    let tool = fx.tool(&format!("echo '{KRAFTKLUB}'"));

    let out = stdout_of(
        fx.cmd(&tool)
            .arg("--interval")
            .arg("1")
            .arg("watch")
            .arg("--limit")
            .arg("3")
            .timeout(Duration::from_secs(20)),
    );
    let lines: Vec<_> = out.lines().collect();
    assert_eq!(
        lines,
        vec![
            "loading",
            "playing: Kraftklub - Wenn ich tot bin, fang ich wieder an [1:00/3:07]",
            "loaded",
        ]
    );
}

#[test]
fn status_without_daemon_fails() {
    let fx = Fixture::new();
    let tool = fx.tool("exit 0");

    let output = fx.cmd(&tool).arg("status").output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Daemon is not running"));
}

#[test]
fn daemon_lifecycle() {
    let fx = Fixture::new();
    let tool = fx.tool(&format!("echo '{KRAFTKLUB}'"));

    fx.cmd(&tool)
        .arg("daemon")
        .arg("start")
        .timeout(Duration::from_secs(20))
        .assert()
        .success();

    let mut settled = None;
    for _ in 0..100 {
        let out = stdout_of(fx.cmd(&tool).arg("status").arg("--json"));
        if let Ok(status) = serde_json::from_str::<serde_json::Value>(&out) {
            if status["current_state"]["artist"] == "Kraftklub" {
                settled = Some(status);
                break;
            }
        }
        thread::sleep(Duration::from_millis(100));
    }
    let status = settled.expect("daemon never reported the track");
    assert_eq!(status["is_loading"], false);
    assert!(status["last_error"].is_null());

    fx.cmd(&tool).arg("refresh").assert().success();

    let out = stdout_of(fx.cmd(&tool).arg("status"));
    assert!(
        out.starts_with("Kraftklub - Wenn ich tot bin, fang ich wieder an"),
        "{out}"
    );

    fx.cmd(&tool)
        .arg("daemon")
        .arg("stop")
        .timeout(Duration::from_secs(20))
        .assert()
        .success();

    let out = stdout_of(fx.cmd(&tool).arg("daemon").arg("status"));
    assert_eq!(out.trim(), "Daemon is not running");
}
