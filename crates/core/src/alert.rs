// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alerts raised by agents and tracked by the controller.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    Warning,
    Info,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AlertSeverity::Critical => "critical",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Info => "info",
        };
        write!(f, "{s}")
    }
}

/// One alert, attributed to the emitting agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub message: String,
    pub hostname: String,
    pub timestamp: u64,
}

impl Alert {
    /// Alert for a CPU threshold crossing.
    pub fn cpu(hostname: impl Into<String>, message: impl Into<String>, timestamp: u64) -> Self {
        Self {
            severity: AlertSeverity::Critical,
            message: message.into(),
            hostname: hostname.into(),
            timestamp,
        }
    }
}
