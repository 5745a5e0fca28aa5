// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::streams::StreamHub;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use muster_core::wire::Request;
use muster_core::{wire, FakeClock, StatsSnapshot};
use serde_json::json;
use std::net::SocketAddr;

struct TestAgent {
    addr: SocketAddr,
    _dir: tempfile::TempDir,
}

async fn start_router(auto_install: bool) -> TestAgent {
    let dir = tempfile::tempdir().unwrap();
    let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(1_000));
    let hub = StreamHub::new(Arc::clone(&clock));
    let supervisor = TaskSupervisor::new(hub, Arc::clone(&clock));

    let latest = Arc::new(Mutex::new(StatsSnapshot {
        cpu: 12.5,
        ram_used: 2_048,
        ram_total: 16_384,
        timestamp: 999,
    }));

    let ctx = Arc::new(RouterCtx {
        supervisor,
        latest_stats: latest,
        store: crate::storage::FileStore::new(dir.path().join("storage")),
        hostname: "testhost".to_string(),
        auto_install,
        clock,
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(Router::new(listener, ctx).run());
    TestAgent { addr, _dir: dir }
}

async fn roundtrip(addr: SocketAddr, request: Request) -> serde_json::Value {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (reader, writer) = stream.into_split();
    wire::write_request(writer, &request, wire::DEFAULT_TIMEOUT)
        .await
        .unwrap();
    wire::read_response(reader, wire::DEFAULT_TIMEOUT)
        .await
        .unwrap()
}

async fn get(addr: SocketAddr, path: &str) -> serde_json::Value {
    roundtrip(addr, Request::new("GET", path)).await
}

async fn post(addr: SocketAddr, path: &str, body: serde_json::Value) -> serde_json::Value {
    roundtrip(addr, Request::json("POST", path, &body).unwrap()).await
}

#[tokio::test]
async fn hostname_and_stats() {
    let agent = start_router(false).await;

    let hostname = get(agent.addr, "/hostname").await;
    assert_eq!(hostname["hostname"], "testhost");

    let stats = get(agent.addr, "/stats").await;
    assert_eq!(stats["cpu"], 12.5);
    assert_eq!(stats["ram_total"], 16_384);
}

#[tokio::test]
async fn exec_then_tasks_then_logs() {
    let agent = start_router(false).await;

    let exec = post(agent.addr, "/exec", json!({"cmd": "echo routed"})).await;
    let task_id = exec["task_id"].as_u64().unwrap();
    assert!(task_id >= 1);

    // Poll /tasks until the task settles.
    let mut running = true;
    for _ in 0..100 {
        let tasks = get(agent.addr, "/tasks").await;
        let row = tasks
            .as_array()
            .unwrap()
            .iter()
            .find(|t| t["id"].as_u64() == Some(task_id))
            .cloned()
            .unwrap();
        assert_eq!(row["command"], "echo routed");
        running = row["running"].as_bool().unwrap();
        if !running {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(!running, "task never finished");

    let logs = roundtrip(
        agent.addr,
        Request::new("GET", "/logs").with_param("id", task_id.to_string()),
    )
    .await;
    assert_eq!(logs["logs"], "routed\n");
}

#[tokio::test]
async fn logs_for_unknown_id_is_empty_not_error() {
    let agent = start_router(false).await;
    let logs = roundtrip(
        agent.addr,
        Request::new("GET", "/logs").with_param("id", "424242"),
    )
    .await;
    assert_eq!(logs["logs"], "");
    assert!(logs.get("error").is_none());
}

#[tokio::test]
async fn exec_rejects_empty_command() {
    let agent = start_router(false).await;
    let response = post(agent.addr, "/exec", json!({"cmd": "   "})).await;
    assert_eq!(response["success"], false);
    assert!(response["error"].as_str().unwrap().contains("cmd"));
}

#[tokio::test]
async fn kill_unknown_task_is_error_envelope() {
    let agent = start_router(false).await;
    let response = roundtrip(
        agent.addr,
        Request::json("POST", "/kill", &json!({}))
            .unwrap()
            .with_param("id", "999"),
    )
    .await;
    assert_eq!(response["success"], false);
}

#[tokio::test]
async fn unknown_route_is_error_envelope_with_200() {
    let agent = start_router(false).await;
    let response = get(agent.addr, "/does/not/exist").await;
    assert_eq!(response["success"], false);
}

#[tokio::test]
async fn file_write_read_roundtrip() {
    let agent = start_router(false).await;

    let write = post(
        agent.addr,
        "/files/write",
        json!({"filename": "note.txt", "content": "plain text\n"}),
    )
    .await;
    assert_eq!(write["success"], true);

    let read = roundtrip(
        agent.addr,
        Request::new("GET", "/files/read").with_param("name", "note.txt"),
    )
    .await;
    assert_eq!(read["content"], "plain text\n");

    let list = get(agent.addr, "/files/list").await;
    let names: Vec<&str> = list["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["note.txt"]);
}

#[tokio::test]
async fn upload_download_binary_roundtrip() {
    let agent = start_router(false).await;
    let payload: Vec<u8> = (0..=255).collect();

    let upload = post(
        agent.addr,
        "/files/upload",
        json!({"filename": "blob.bin", "content": BASE64.encode(&payload)}),
    )
    .await;
    assert_eq!(upload["success"], true);
    assert_eq!(upload["auto_install"], false);

    let download = roundtrip(
        agent.addr,
        Request::new("GET", "/files/download").with_param("name", "blob.bin"),
    )
    .await;
    let bytes = BASE64
        .decode(download["content"].as_str().unwrap())
        .unwrap();
    assert_eq!(bytes, payload);
}

#[tokio::test]
async fn upload_auto_install_requires_opt_in() {
    // Agent without the gate: the request flag alone does nothing.
    let agent = start_router(false).await;
    let response = post(
        agent.addr,
        "/files/upload",
        json!({
            "filename": "setup.sh",
            "content": BASE64.encode(b"#!/bin/sh\nexit 0\n"),
            "auto_install": true,
        }),
    )
    .await;
    assert_eq!(response["success"], true);
    assert_eq!(response["auto_install"], false);
    assert!(response.get("task_id").is_none());
}

#[tokio::test]
async fn upload_auto_install_dispatches_task_when_enabled() {
    let agent = start_router(true).await;
    let response = post(
        agent.addr,
        "/files/upload",
        json!({
            "filename": "noop.sh",
            "content": BASE64.encode(b"#!/bin/sh\nexit 0\n"),
            "auto_install": true,
        }),
    )
    .await;
    assert_eq!(response["success"], true);
    assert_eq!(response["auto_install"], true);
    assert!(response["task_id"].as_u64().is_some());
}

#[tokio::test]
async fn unrecognized_extension_uploads_without_install() {
    let agent = start_router(true).await;
    let response = post(
        agent.addr,
        "/files/upload",
        json!({
            "filename": "data.csv",
            "content": BASE64.encode(b"a,b\n"),
            "auto_install": true,
        }),
    )
    .await;
    assert_eq!(response["success"], true);
    assert_eq!(response["auto_install"], false);
}

#[tokio::test]
async fn path_traversal_read_is_rejected() {
    let agent = start_router(false).await;
    let response = roundtrip(
        agent.addr,
        Request::new("GET", "/files/read").with_param("name", "../../etc/passwd"),
    )
    .await;
    // "../../etc/passwd" sanitizes to "passwd", which does not exist in
    // storage; either way nothing outside the root is opened.
    assert_eq!(response["success"], false);
}

#[tokio::test]
async fn hidden_file_write_is_rejected() {
    let agent = start_router(false).await;
    let response = post(
        agent.addr,
        "/files/write",
        json!({"filename": ".ssh_config", "content": "x"}),
    )
    .await;
    assert_eq!(response["success"], false);
    assert!(response["error"]
        .as_str()
        .unwrap()
        .contains("unsafe filename"));
}

#[tokio::test]
async fn rename_roundtrip_preserves_content() {
    let agent = start_router(false).await;
    post(
        agent.addr,
        "/files/write",
        json!({"filename": "a.txt", "content": "v1"}),
    )
    .await;

    let rename = post(
        agent.addr,
        "/files/rename",
        json!({"oldname": "a.txt", "newname": "b.txt"}),
    )
    .await;
    assert_eq!(rename["success"], true);

    let read = roundtrip(
        agent.addr,
        Request::new("GET", "/files/read").with_param("name", "b.txt"),
    )
    .await;
    assert_eq!(read["content"], "v1");

    let delete = post(agent.addr, "/files/delete", json!({"filename": "b.txt"})).await;
    assert_eq!(delete["success"], true);
}

#[tokio::test]
async fn malformed_body_is_bad_request_envelope() {
    let agent = start_router(false).await;

    let mut request = Request::new("POST", "/exec");
    request.body = b"this is not json".to_vec();
    let response = roundtrip(agent.addr, request).await;
    assert_eq!(response["success"], false);
    assert!(response["error"]
        .as_str()
        .unwrap()
        .contains("invalid request body"));
}
