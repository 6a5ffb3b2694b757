#![cfg(feature = "cli")]

use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::process::{Command, Output, Stdio};

fn ojnet(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ojnet"))
        .args(["--log-level", "off"])
        .args(args)
        .output()
        .expect("ojnet should run")
}

fn free_udp_port() -> u16 {
    let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).expect("probe socket should bind");
    socket.local_addr().expect("probe address").port()
}

#[test]
fn decode_container_as_json() {
    let output = ojnet(&["--format", "json", "decode", "0c0100000568656c6c6f"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("decode should emit json");
    assert_eq!(payload["kind"], "Container");
    assert_eq!(payload["channel"], 1);
    assert_eq!(payload["payload"], "hello");
}

#[test]
fn encode_ack_prints_hex() {
    let output = ojnet(&["--format", "pretty", "encode", "ack", "7,9"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "0a020000000700000009");
}

#[test]
fn kinds_lists_all_packet_kinds() {
    let output = ojnet(&["--format", "json", "kinds"]);

    assert!(output.status.success());
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("kinds should emit json");
    let kinds = payload["kinds"].as_array().expect("kinds array");
    assert_eq!(kinds.len(), 6);
    assert!(payload["reserved"]
        .as_array()
        .expect("reserved array")
        .iter()
        .any(|id| id == "0x05"));
}

#[test]
fn invalid_hex_is_usage_error() {
    let output = ojnet(&["decode", "0c0"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn truncated_datagram_is_data_error() {
    let output = ojnet(&["decode", "0c01"]);
    assert_eq!(output.status.code(), Some(60));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("decode failed"));
}

#[test]
fn reserved_kind_is_named_in_error() {
    let output = ojnet(&["decode", "04"]);
    assert_eq!(output.status.code(), Some(60));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("reserved kind id"));
}

#[test]
fn send_times_out_without_server() {
    let port = free_udp_port();
    let output = ojnet(&[
        "send",
        &format!("127.0.0.1:{port}"),
        "--data",
        "hi",
        "--connect-timeout",
        "100ms",
        "--attempts",
        "2",
    ]);
    assert_eq!(output.status.code(), Some(124));
}

#[test]
fn send_wait_gets_echo_reply() {
    let port = free_udp_port();
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));

    let mut echo = Command::new(env!("CARGO_BIN_EXE_ojnet"))
        .args(["--log-level", "off", "echo", &addr.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("echo should start");

    let output = ojnet(&[
        "--format",
        "json",
        "send",
        &addr.to_string(),
        "--channel",
        "1",
        "--data",
        "ping",
        "--reliable",
        "--wait",
        "--wait-timeout",
        "3s",
        "--connect-timeout",
        "200ms",
        "--attempts",
        "15",
    ]);

    let _ = echo.kill();
    let _ = echo.wait();

    assert!(
        output.status.success(),
        "send failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("reply should be json");
    assert_eq!(payload["kind"], "Container");
    assert_eq!(payload["channel"], 1);
    assert_eq!(payload["payload"], "ping");
    assert_eq!(payload["sequence_id"], 0);
}
