// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The fleet model: agents, selection, tasks, stats.
//!
//! One mutex over all controller-side state. The agent list is
//! immutable after init; the view thread mutates the selection; the
//! refreshers and the joint executor install their results under the
//! same lock.

use std::collections::HashMap;
use std::sync::Arc;

use muster_core::{AgentEndpoint, Alert, Clock, StatsSnapshot, TaskId, TaskSnapshot};
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::debug;

use crate::client::AgentApi;

/// Controller-side view of one launched task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Finished,
    /// The dispatch itself failed; the message says why.
    Error(String),
}

impl TaskState {
    pub fn label(&self) -> &str {
        match self {
            TaskState::Running => "running",
            TaskState::Finished => "finished",
            TaskState::Error(_) => "error",
        }
    }
}

/// One task the controller launched (or failed to launch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetTask {
    pub id: TaskId,
    pub agent: String,
    pub command: String,
    pub state: TaskState,
}

struct FleetInner {
    agents: Vec<AgentEndpoint>,
    selected: Vec<bool>,
    tasks: Vec<FleetTask>,
    stats: HashMap<String, StatsSnapshot>,
    alerts: Vec<Alert>,
}

/// Shared controller state.
pub struct FleetModel {
    inner: Mutex<FleetInner>,
    clock: Arc<dyn Clock>,
}

impl FleetModel {
    pub fn new(agents: Vec<AgentEndpoint>, clock: Arc<dyn Clock>) -> Arc<Self> {
        let selected = vec![false; agents.len()];
        Arc::new(Self {
            inner: Mutex::new(FleetInner {
                agents,
                selected,
                tasks: Vec::new(),
                stats: HashMap::new(),
                alerts: Vec::new(),
            }),
            clock,
        })
    }

    pub fn agents(&self) -> Vec<AgentEndpoint> {
        self.inner.lock().agents.clone()
    }

    pub fn agent_count(&self) -> usize {
        self.inner.lock().agents.len()
    }

    /// Flip selection of the agent at `index`. Out-of-range indexes are
    /// ignored.
    pub fn toggle(&self, index: usize) {
        let mut inner = self.inner.lock();
        if let Some(flag) = inner.selected.get_mut(index) {
            *flag = !*flag;
        }
    }

    pub fn selection(&self) -> Vec<bool> {
        self.inner.lock().selected.clone()
    }

    /// The selected agents, in agent-list order.
    pub fn selected_agents(&self) -> Vec<AgentEndpoint> {
        let inner = self.inner.lock();
        inner
            .agents
            .iter()
            .zip(&inner.selected)
            .filter(|(_, sel)| **sel)
            .map(|(agent, _)| agent.clone())
            .collect()
    }

    pub fn record_task(&self, task: FleetTask) {
        self.inner.lock().tasks.push(task);
    }

    pub fn tasks(&self) -> Vec<FleetTask> {
        self.inner.lock().tasks.clone()
    }

    pub fn stats_for(&self, agent_name: &str) -> Option<StatsSnapshot> {
        self.inner.lock().stats.get(agent_name).copied()
    }

    pub fn record_alert(&self, alert: Alert) {
        self.inner.lock().alerts.push(alert);
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.inner.lock().alerts.clone()
    }

    /// Reconcile one agent's task listing into the local table.
    ///
    /// Only tasks this controller launched are updated (matched by id
    /// and agent name). Tasks the agent reports that we never launched
    /// are ignored; tasks we know about that the agent no longer
    /// reports keep their last known state. Error entries are final.
    pub fn apply_task_states(&self, agent_name: &str, listing: &[TaskSnapshot]) {
        let mut inner = self.inner.lock();
        for task in inner.tasks.iter_mut() {
            if task.agent != agent_name || matches!(task.state, TaskState::Error(_)) {
                continue;
            }
            if let Some(remote) = listing.iter().find(|r| r.id == task.id) {
                task.state = if remote.running {
                    TaskState::Running
                } else {
                    TaskState::Finished
                };
            }
        }
    }

    pub fn install_stats(&self, agent_name: &str, snapshot: StatsSnapshot) {
        let mut inner = self.inner.lock();
        inner.stats.insert(agent_name.to_string(), snapshot);
    }

    /// Refresh tasks and stats for every agent, fanning out one probe
    /// task per agent and merging results under the model mutex.
    ///
    /// An unreachable agent gets the sentinel snapshot; its tasks stay
    /// in their last known state.
    pub async fn refresh(self: &Arc<Self>, api: Arc<dyn AgentApi>) {
        let agents = self.agents();
        let mut probes = JoinSet::new();

        for agent in agents {
            let api = Arc::clone(&api);
            probes.spawn(async move {
                let tasks = api.tasks(&agent).await;
                let stats = api.stats(&agent).await;
                (agent, tasks, stats)
            });
        }

        while let Some(result) = probes.join_next().await {
            let Ok((agent, tasks, stats)) = result else {
                continue;
            };
            match tasks {
                Ok(listing) => self.apply_task_states(&agent.name, &listing),
                Err(e) => debug!(agent = %agent.name, error = %e, "task refresh failed"),
            }
            match stats {
                Ok(snapshot) => self.install_stats(&agent.name, snapshot),
                Err(e) => {
                    debug!(agent = %agent.name, error = %e, "stats refresh failed");
                    self.install_stats(
                        &agent.name,
                        StatsSnapshot::unreachable(self.clock.now_ms()),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "fleet_tests.rs"]
mod tests;
