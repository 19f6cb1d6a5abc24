//! Exit statuses and output of the `boxd` and `box` binaries.

#![cfg(unix)]

use std::net::UdpSocket;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use box_core::ServerConfig;
use box_lib::platform::is_root;
use box_lib::Server;

const BOXD: &str = env!("CARGO_BIN_EXE_boxd");
const BOX: &str = env!("CARGO_BIN_EXE_box");

#[test]
fn test_boxd_version() {
    let out = Command::new(BOXD).arg("--version").output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_boxd_bad_flags_exit_2() {
    let status = Command::new(BOXD).args(["--port", "0"]).status().unwrap();
    assert_eq!(status.code(), Some(2));

    let status = Command::new(BOXD).arg("--no-such-flag").status().unwrap();
    assert_eq!(status.code(), Some(2));
}

#[test]
fn test_boxd_bad_env_port() {
    let dir = tempfile::tempdir().unwrap();
    let status = Command::new(BOXD)
        .args(["--base-dir", dir.path().to_str().unwrap()])
        .env("BOXD_PORT", "99999")
        .status()
        .unwrap();
    let expected = if is_root() { 1 } else { 2 };
    assert_eq!(status.code(), Some(expected));
}

#[test]
fn test_boxd_print_config() {
    let out = Command::new(BOXD).arg("--print-config").output().unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("port = 12567"));
}

#[test]
fn test_boxd_long_pre_shared_key() {
    let dir = tempfile::tempdir().unwrap();
    let long = "a".repeat(65);
    let status = Command::new(BOXD)
        .args(["--base-dir", dir.path().to_str().unwrap(), "--pre-share-key", long.as_str()])
        .status()
        .unwrap();
    let expected = if is_root() { 1 } else { 2 };
    assert_eq!(status.code(), Some(expected));
}

#[test]
fn test_boxd_reports_unknown_config_keys() {
    if is_root() {
        return;
    }
    let port = UdpSocket::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("boxd.toml"),
        format!("port = {}\ncolour = \"blue\"\n", port),
    )
    .unwrap();

    let mut child = Command::new(BOXD)
        .args(["--base-dir", dir.path().to_str().unwrap()])
        .env_remove("RUST_LOG")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    thread::sleep(Duration::from_millis(500));
    child.kill().unwrap();
    let out = child.wait_with_output().unwrap();
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("unknown key 'colour'"), "stderr: {}", stderr);
}

#[test]
fn test_box_ping_and_put_get() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ServerConfig::new(dir.path().join(".box"));
    config.bind_addr = "127.0.0.1".parse().unwrap();
    config.port = 0;
    config.persist = false;
    let server = Server::start(config).unwrap();
    let port = server.local_addr().port().to_string();

    let out = Command::new(BOX).args(["--port", &port, "ping"]).output().unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("pong"));

    let out = Command::new(BOX)
        .args(["--port", &port, "put", "greetings", "hi there"])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("stored"));

    let out = Command::new(BOX).args(["--port", &port, "get", "greetings"]).output().unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("hi there"));

    let out = Command::new(BOX).args(["--port", &port, "get", "missing"]).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stdout).contains("not-found"));

    server.shutdown();
}
