//! Test helpers for behavioral specifications.
//!
//! Starts real agent services on ephemeral ports and gives the specs
//! controller-grade handles: a request API, stream subscriptions, and
//! endpoint records shaped like discovery output.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::sync::Arc;
use std::time::Duration;

use muster_agent::probe::FakeProbe;
use muster_agent::{startup_with_probe, AgentConfig, AgentHandle};
use muster_core::{AgentEndpoint, Channel, StreamEvent, SystemClock, TaskId};
use tokio::sync::mpsc::UnboundedReceiver;

/// Generous ceiling for anything the specs wait on.
pub const SPEC_TIMEOUT: Duration = Duration::from_secs(5);

/// One in-process agent plus its endpoint record.
pub struct SpecAgent {
    pub handle: AgentHandle,
    pub endpoint: AgentEndpoint,
    _dir: tempfile::TempDir,
}

impl SpecAgent {
    /// Start an agent with an idle CPU profile.
    pub async fn start() -> Self {
        Self::start_with_probe(FakeProbe::constant(5.0), Duration::from_secs(1)).await
    }

    /// Start an agent with a scripted CPU profile and sampler tick.
    pub async fn start_with_probe(probe: FakeProbe, sample_interval: Duration) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AgentConfig::ephemeral(dir.path());
        config.sample_interval = sample_interval;

        let handle = startup_with_probe(&config, Arc::new(SystemClock), probe)
            .await
            .unwrap();
        let endpoint = AgentEndpoint {
            name: handle.hostname.clone(),
            ip: "127.0.0.1".to_string(),
            port: handle.plan.request,
            ws_main: handle.plan.channels[0],
            ws_stats: handle.plan.channels[1],
            ws_files: handle.plan.channels[2],
            ws_desktop: handle.plan.channels[3],
        };
        Self {
            handle,
            endpoint,
            _dir: dir,
        }
    }

    /// Subscribe to one of this agent's stream channels.
    pub async fn subscribe(&self, channel: Channel) -> UnboundedReceiver<StreamEvent> {
        muster_control::streams::subscribe(&self.endpoint, channel)
            .await
            .unwrap()
    }
}

/// Receive the next event or panic with the context message.
pub async fn next_event(rx: &mut UnboundedReceiver<StreamEvent>, what: &str) -> StreamEvent {
    tokio::time::timeout(SPEC_TIMEOUT, rx.recv())
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
        .unwrap_or_else(|| panic!("stream closed waiting for {what}"))
}

/// Drain main-channel events for `id` until its `task_complete`,
/// returning (concatenated output, exit code).
pub async fn collect_task(
    rx: &mut UnboundedReceiver<StreamEvent>,
    id: TaskId,
) -> (String, i32) {
    let mut output = String::new();
    loop {
        match next_event(rx, "task event").await {
            StreamEvent::TaskStart { .. } => {}
            StreamEvent::TaskOutput {
                task_id,
                output: chunk,
                ..
            } if task_id == id => output.push_str(&chunk),
            StreamEvent::TaskComplete { task_id, exit_code } if task_id == id => {
                return (output, exit_code)
            }
            // Alerts and other tasks' events may interleave.
            _ => {}
        }
    }
}

/// Poll the request API until task `id` reports running=false.
pub async fn wait_until_finished(
    api: &muster_control::HttpAgentApi,
    endpoint: &AgentEndpoint,
    id: TaskId,
) {
    use muster_control::client::AgentApi;
    let deadline = tokio::time::Instant::now() + SPEC_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        let tasks = api.tasks(endpoint).await.unwrap();
        if tasks.iter().any(|t| t.id == id && !t.running) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("task {id} still running after {SPEC_TIMEOUT:?}");
}
