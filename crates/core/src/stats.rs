// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource statistics snapshot.

use serde::{Deserialize, Serialize};

/// One CPU/memory sample.
///
/// Memory values are megabytes; `timestamp` is milliseconds since the
/// Unix epoch. Samples on one agent's stats channel are ordered by
/// `timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct StatsSnapshot {
    pub cpu: f64,
    pub ram_used: i64,
    pub ram_total: i64,
    pub timestamp: u64,
}

impl StatsSnapshot {
    /// Sentinel installed by the controller when an agent cannot be
    /// reached. Zero totals (and a negative cpu) never occur in a real
    /// sample, so views treat this as "unreachable".
    pub fn unreachable(timestamp: u64) -> Self {
        Self {
            cpu: -1.0,
            ram_used: 0,
            ram_total: 0,
            timestamp,
        }
    }

    pub fn is_unreachable(&self) -> bool {
        self.ram_total == 0
    }
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
