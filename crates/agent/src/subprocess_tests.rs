// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn command_output_is_captured() {
    let output = shell_with_timeout("echo captured", INTROSPECT_TIMEOUT, "echo")
        .await
        .unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "captured\n");
}

#[tokio::test]
async fn timeout_produces_descriptive_error() {
    let err = shell_with_timeout("sleep 5", Duration::from_millis(50), "slow probe")
        .await
        .unwrap_err();
    assert!(err.contains("slow probe"), "got: {err}");
    assert!(err.contains("timed out"), "got: {err}");
}

#[tokio::test]
async fn missing_binary_is_an_error() {
    let cmd = Command::new("/nonexistent/denture");
    let err = run_with_timeout(cmd, INTROSPECT_TIMEOUT, "denture")
        .await
        .unwrap_err();
    assert!(err.contains("denture failed"), "got: {err}");
}
