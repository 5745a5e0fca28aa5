//! Scenario: one joint command partitioned across three agents.

use crate::prelude::*;
use muster_control::executor::run_joint;
use muster_control::{AgentApi, FleetModel, HttpAgentApi, TaskState};
use muster_core::SystemClock;
use std::collections::HashSet;
use std::sync::Arc;

#[tokio::test]
async fn joint_three_partitions_the_work() {
    // All three agents share this host's hostname; give them distinct
    // controller-side names the way discovery would on a real LAN.
    let mut a = SpecAgent::start().await;
    let mut b = SpecAgent::start().await;
    let mut c = SpecAgent::start().await;
    a.endpoint.name = "agent-a".to_string();
    b.endpoint.name = "agent-b".to_string();
    c.endpoint.name = "agent-c".to_string();

    let model = FleetModel::new(
        vec![
            a.endpoint.clone(),
            b.endpoint.clone(),
            c.endpoint.clone(),
        ],
        Arc::new(SystemClock),
    );
    model.toggle(0);
    model.toggle(1);
    model.toggle(2);

    let api: Arc<dyn AgentApi> = Arc::new(HttpAgentApi::new());
    let report = run_joint(&model, Arc::clone(&api), "printf %s/%s $WORKER_ID $TOTAL_WORKERS").await;

    assert_eq!(report.launched.len(), 3, "exactly N task ids");
    assert!(report.failed.is_empty());

    // Collect each agent's output; together they must cover {0,1,2}/3.
    let http = HttpAgentApi::new();
    let mut outputs = HashSet::new();
    for (agent, (name, id)) in [&a, &b, &c].iter().zip(&report.launched) {
        assert_eq!(&agent.endpoint.name, name);
        wait_until_finished(&http, &agent.endpoint, *id).await;
        outputs.insert(http.logs(&agent.endpoint, *id).await.unwrap());
    }
    assert_eq!(
        outputs,
        HashSet::from(["0/3".to_string(), "1/3".to_string(), "2/3".to_string()])
    );

    // The fleet model converges to three finished tasks.
    model.refresh(Arc::clone(&api)).await;
    let tasks = model.tasks();
    assert_eq!(tasks.len(), 3);
    assert!(tasks.iter().all(|t| t.state == TaskState::Finished));

    a.handle.shutdown();
    b.handle.shutdown();
    c.handle.shutdown();
}

#[tokio::test]
async fn dispatch_failure_is_isolated() {
    let live = SpecAgent::start().await;

    // A dead endpoint alongside a live one.
    let dead = muster_core::AgentEndpoint {
        name: "dead".to_string(),
        ip: "127.0.0.1".to_string(),
        port: 1, // nothing listens here
        ws_main: 1,
        ws_stats: 1,
        ws_files: 1,
        ws_desktop: 1,
    };

    let model = FleetModel::new(
        vec![live.endpoint.clone(), dead],
        Arc::new(SystemClock),
    );
    model.toggle(0);
    model.toggle(1);

    let api: Arc<dyn AgentApi> = Arc::new(HttpAgentApi::new());
    let report = run_joint(&model, api, "true").await;

    assert_eq!(report.launched.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "dead");

    let tasks = model.tasks();
    assert_eq!(tasks.len(), 2);
    assert!(tasks
        .iter()
        .any(|t| t.agent == "dead" && matches!(t.state, TaskState::Error(_))));

    live.handle.shutdown();
}
