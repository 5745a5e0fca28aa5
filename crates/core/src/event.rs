// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream channel events.
//!
//! Every frame on a stream channel is a JSON object whose `type` field
//! selects the variant. The wire names are part of the protocol and must
//! not change.

use crate::task::TaskId;
use serde::{Deserialize, Serialize};

/// One event on a stream channel.
///
/// Ordering contract, per task and per client connection on the main
/// channel: `TaskStart` precedes any `TaskOutput`, and exactly one
/// `TaskComplete` is the final event for that task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A task was accepted and its child process is being spawned.
    TaskStart { task_id: TaskId, command: String },

    /// One line (or oversize fragment) of merged stdout/stderr.
    TaskOutput {
        task_id: TaskId,
        output: String,
        timestamp: u64,
    },

    /// The child exited. Spawn failure is reported as exit code -1.
    TaskComplete { task_id: TaskId, exit_code: i32 },

    /// Periodic resource sample, one per sampler tick.
    StatsUpdate {
        cpu: f64,
        ram_used: i64,
        ram_total: i64,
        timestamp: u64,
    },

    /// CPU crossed the alert threshold (rate-limited by cooldown).
    CpuAlert {
        cpu: f64,
        hostname: String,
        message: String,
        timestamp: u64,
    },

    /// Reply to an inbound `ping`, sent to that client only.
    Pong { timestamp: u64 },

    /// Inbound liveness probe from a stream client.
    Ping,
}

impl StreamEvent {
    /// The wire discriminator for this variant.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::TaskStart { .. } => "task_start",
            StreamEvent::TaskOutput { .. } => "task_output",
            StreamEvent::TaskComplete { .. } => "task_complete",
            StreamEvent::StatsUpdate { .. } => "stats_update",
            StreamEvent::CpuAlert { .. } => "cpu_alert",
            StreamEvent::Pong { .. } => "pong",
            StreamEvent::Ping => "ping",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
