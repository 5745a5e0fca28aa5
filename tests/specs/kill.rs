//! Scenario: killing a long-running task.

use crate::prelude::*;
use muster_control::client::AgentApi;
use muster_control::HttpAgentApi;
use muster_core::{Channel, StreamEvent};
use std::collections::HashMap;
use std::time::Duration;

#[tokio::test]
async fn kill_long_runner_completes_with_nonzero_exit() {
    let agent = SpecAgent::start().await;
    let mut main = agent.subscribe(Channel::Main).await;
    let api = HttpAgentApi::new();

    let id = api
        .exec(&agent.endpoint, "sleep 60", &HashMap::new())
        .await
        .unwrap();

    // Wait for the start event so the child exists, then kill within 1s.
    match next_event(&mut main, "task_start").await {
        StreamEvent::TaskStart { task_id, .. } => assert_eq!(task_id, id),
        other => panic!("expected task_start, got {other:?}"),
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    api.kill(&agent.endpoint, id).await.unwrap();

    // task_complete with a non-zero exit within 2 seconds.
    let completion = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let StreamEvent::TaskComplete { task_id, exit_code } =
                next_event(&mut main, "task_complete").await
            {
                if task_id == id {
                    return exit_code;
                }
            }
        }
    })
    .await
    .expect("no task_complete within 2s of kill");
    assert_ne!(completion, 0);

    // /tasks agrees.
    let tasks = api.tasks(&agent.endpoint).await.unwrap();
    assert!(tasks.iter().any(|t| t.id == id && !t.running));

    agent.handle.shutdown();
}

#[tokio::test]
async fn completed_task_stays_queryable_after_kill_noise() {
    let agent = SpecAgent::start().await;
    let api = HttpAgentApi::new();

    let id = api
        .exec(&agent.endpoint, "echo survivor", &HashMap::new())
        .await
        .unwrap();
    wait_until_finished(&api, &agent.endpoint, id).await;

    // Killing an already-finished task is a harmless no-op.
    api.kill(&agent.endpoint, id).await.unwrap();
    assert_eq!(
        api.logs(&agent.endpoint, id).await.unwrap(),
        "survivor\n"
    );

    agent.handle.shutdown();
}
