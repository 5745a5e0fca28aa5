// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Joint executor: one user command fanned out to the selected agents.
//!
//! Every selected agent gets the same command with `WORKER_ID` and
//! `TOTAL_WORKERS` in its environment, partitioning the work without a
//! central queue. Dispatches are independent: one failing agent never
//! cancels the others, it just records an error entry.

use std::collections::HashMap;
use std::sync::Arc;

use muster_core::TaskId;
use tracing::{info, warn};

use crate::client::AgentApi;
use crate::fleet::{FleetModel, FleetTask, TaskState};

/// Outcome of one joint dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JointReport {
    /// (agent name, task id) per successful dispatch, in agent-list order.
    pub launched: Vec<(String, TaskId)>,
    /// (agent name, error) per failed dispatch, in agent-list order.
    pub failed: Vec<(String, String)>,
}

impl JointReport {
    pub fn total(&self) -> usize {
        self.launched.len() + self.failed.len()
    }
}

/// Dispatch `command` to the currently selected agents.
///
/// Agent i of N receives env `{WORKER_ID: i, TOTAL_WORKERS: N}`, with
/// ids assigned in agent-list order. Results are recorded into the
/// fleet task table.
pub async fn run_joint(
    model: &Arc<FleetModel>,
    api: Arc<dyn AgentApi>,
    command: &str,
) -> JointReport {
    let selected = model.selected_agents();
    let total = selected.len();
    info!(command, workers = total, "joint dispatch");

    let mut report = JointReport {
        launched: Vec::new(),
        failed: Vec::new(),
    };

    // Dispatch in agent-list order. Each call is bounded by the client
    // timeouts, so a dead agent delays but never wedges the fan-out.
    for (worker_id, agent) in selected.into_iter().enumerate() {
        let env = HashMap::from([
            ("WORKER_ID".to_string(), worker_id.to_string()),
            ("TOTAL_WORKERS".to_string(), total.to_string()),
        ]);
        match api.exec(&agent, command, &env).await {
            Ok(task_id) => {
                model.record_task(FleetTask {
                    id: task_id,
                    agent: agent.name.clone(),
                    command: command.to_string(),
                    state: TaskState::Running,
                });
                report.launched.push((agent.name, task_id));
            }
            Err(e) => {
                warn!(agent = %agent.name, error = %e, "dispatch failed");
                model.record_task(FleetTask {
                    id: TaskId::new(0),
                    agent: agent.name.clone(),
                    command: command.to_string(),
                    state: TaskState::Error(e.to_string()),
                });
                report.failed.push((agent.name, e.to_string()));
            }
        }
    }

    report
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
