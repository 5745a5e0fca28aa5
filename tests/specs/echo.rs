//! Scenario: a single `echo hello` flows through the whole agent.

use crate::prelude::*;
use muster_control::client::AgentApi;
use muster_control::HttpAgentApi;
use muster_core::{Channel, StreamEvent};
use std::collections::HashMap;

#[tokio::test]
async fn echo_streams_start_output_complete() {
    let agent = SpecAgent::start().await;
    let mut main = agent.subscribe(Channel::Main).await;
    let api = HttpAgentApi::new();

    let id = api
        .exec(&agent.endpoint, "echo hello", &HashMap::new())
        .await
        .unwrap();

    // task_start first, with the verbatim command.
    match next_event(&mut main, "task_start").await {
        StreamEvent::TaskStart { task_id, command } => {
            assert_eq!(task_id, id);
            assert_eq!(command, "echo hello");
        }
        other => panic!("expected task_start, got {other:?}"),
    }

    // Exactly one line of output, then a clean completion.
    let (output, exit_code) = collect_task(&mut main, id).await;
    assert_eq!(output, "hello\n");
    assert_eq!(exit_code, 0);

    // The request side agrees: listed, not running, logs verbatim.
    wait_until_finished(&api, &agent.endpoint, id).await;
    let tasks = api.tasks(&agent.endpoint).await.unwrap();
    let row = tasks.iter().find(|t| t.id == id).unwrap();
    assert_eq!(row.command, "echo hello");
    assert!(!row.running);

    let logs = api.logs(&agent.endpoint, id).await.unwrap();
    assert_eq!(logs, "hello\n");

    agent.handle.shutdown();
}

#[tokio::test]
async fn logs_for_unknown_id_are_empty() {
    let agent = SpecAgent::start().await;
    let api = HttpAgentApi::new();

    let logs = api
        .logs(&agent.endpoint, muster_core::TaskId::new(424_242))
        .await
        .unwrap();
    assert_eq!(logs, "");

    agent.handle.shutdown();
}

#[tokio::test]
async fn ping_on_a_stream_channel_yields_pong() {
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    let agent = SpecAgent::start().await;
    let url = format!("ws://127.0.0.1:{}", agent.endpoint.ws_main);
    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();

    ws.send(Message::text(r#"{"type":"ping"}"#)).await.unwrap();

    let frame = tokio::time::timeout(SPEC_TIMEOUT, ws.next())
        .await
        .expect("no pong")
        .unwrap()
        .unwrap();
    let event: StreamEvent = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert!(matches!(event, StreamEvent::Pong { .. }));

    agent.handle.shutdown();
}
