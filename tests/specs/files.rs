//! Scenarios: storage confinement and file round-trips over the wire.

use crate::prelude::*;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use muster_core::wire::{self, Request};
use serde_json::json;
use tokio::net::TcpStream;

async fn roundtrip(agent: &SpecAgent, request: Request) -> serde_json::Value {
    let stream = TcpStream::connect(("127.0.0.1", agent.endpoint.port))
        .await
        .unwrap();
    let (reader, writer) = stream.into_split();
    wire::write_request(writer, &request, wire::DEFAULT_TIMEOUT)
        .await
        .unwrap();
    wire::read_response(reader, wire::DEFAULT_TIMEOUT)
        .await
        .unwrap()
}

#[tokio::test]
async fn path_traversal_is_rejected_and_nothing_leaks() {
    let agent = SpecAgent::start().await;

    let response = roundtrip(
        &agent,
        Request::new("GET", "/files/read").with_param("name", "../../etc/passwd"),
    )
    .await;
    assert_eq!(response["success"], false);
    assert!(response["error"].as_str().is_some());

    // Names that sanitize to nothing are bad requests outright.
    let response = roundtrip(
        &agent,
        Request::new("GET", "/files/read").with_param("name", ".."),
    )
    .await;
    assert_eq!(response["success"], false);
    assert!(response["error"].as_str().unwrap().contains("unsafe"));

    agent.handle.shutdown();
}

#[tokio::test]
async fn upload_then_download_is_byte_identical() {
    let agent = SpecAgent::start().await;
    let payload: Vec<u8> = (0u16..1024).map(|i| (i % 251) as u8).collect();

    let upload = roundtrip(
        &agent,
        Request::json(
            "POST",
            "/files/upload",
            &json!({"filename": "payload.bin", "content": BASE64.encode(&payload)}),
        )
        .unwrap(),
    )
    .await;
    assert_eq!(upload["success"], true);

    let download = roundtrip(
        &agent,
        Request::new("GET", "/files/download").with_param("name", "payload.bin"),
    )
    .await;
    let bytes = BASE64
        .decode(download["content"].as_str().unwrap())
        .unwrap();
    assert_eq!(bytes, payload);

    agent.handle.shutdown();
}

#[tokio::test]
async fn write_then_read_has_no_encoding_surprises() {
    let agent = SpecAgent::start().await;
    let text = "line one\nline two\ttabbed\nunicode: žluťoučký\n";

    let write = roundtrip(
        &agent,
        Request::json(
            "POST",
            "/files/write",
            &json!({"filename": "notes.txt", "content": text}),
        )
        .unwrap(),
    )
    .await;
    assert_eq!(write["success"], true);

    let read = roundtrip(
        &agent,
        Request::new("GET", "/files/read").with_param("name", "notes.txt"),
    )
    .await;
    assert_eq!(read["content"], text);

    agent.handle.shutdown();
}

#[tokio::test]
async fn rename_there_and_back_leaves_listing_unchanged() {
    let agent = SpecAgent::start().await;

    roundtrip(
        &agent,
        Request::json(
            "POST",
            "/files/write",
            &json!({"filename": "a.txt", "content": "x"}),
        )
        .unwrap(),
    )
    .await;

    let listing_names = |v: &serde_json::Value| -> Vec<String> {
        v["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["name"].as_str().unwrap().to_string())
            .collect()
    };

    let before = listing_names(&roundtrip(&agent, Request::new("GET", "/files/list")).await);

    roundtrip(
        &agent,
        Request::json(
            "POST",
            "/files/rename",
            &json!({"oldname": "a.txt", "newname": "b.txt"}),
        )
        .unwrap(),
    )
    .await;
    roundtrip(
        &agent,
        Request::json(
            "POST",
            "/files/rename",
            &json!({"oldname": "b.txt", "newname": "a.txt"}),
        )
        .unwrap(),
    )
    .await;

    let after = listing_names(&roundtrip(&agent, Request::new("GET", "/files/list")).await);
    assert_eq!(before, after);

    agent.handle.shutdown();
}
