// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::env;
use crate::lifecycle::LifecycleError;
use muster_core::agent::DEFAULT_BASE_PORT;

/// Bind retry budget when a port from the plan is already taken.
pub const DEFAULT_BIND_ATTEMPTS: u16 = 10;

/// Agent daemon configuration.
///
/// Defaults follow the standard port plan (base 2030) and `./storage`
/// for the file area; everything is overridable through `MUSTERD_*`
/// environment variables.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Base port P: request P, discovery P+1, channels P+10..P+13.
    pub base_port: u16,
    /// How many consecutive ports to try when a bind fails.
    pub bind_attempts: u16,
    /// Root of the sandboxed file area.
    pub storage_root: PathBuf,
    /// Directory for the daemon log file.
    pub state_dir: PathBuf,
    /// Daemon log file path.
    pub log_path: PathBuf,
    /// Metrics sampler tick.
    pub sample_interval: Duration,
    /// CPU percent above which an alert fires.
    pub cpu_threshold: f64,
    /// Minimum spacing between alerts for the same condition.
    pub alert_cooldown: Duration,
    /// Whether `/files/upload` may dispatch install commands.
    pub auto_install: bool,
}

impl AgentConfig {
    /// Load the configuration with environment overrides applied.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir()?;
        Ok(Self {
            base_port: env::base_port().unwrap_or(DEFAULT_BASE_PORT),
            bind_attempts: DEFAULT_BIND_ATTEMPTS,
            storage_root: env::storage_dir().unwrap_or_else(|| PathBuf::from("./storage")),
            log_path: state_dir.join("musterd.log"),
            state_dir,
            sample_interval: env::sample_ms().unwrap_or(Duration::from_secs(1)),
            cpu_threshold: env::cpu_threshold().unwrap_or(90.0),
            alert_cooldown: Duration::from_secs(60),
            auto_install: env::auto_install(),
        })
    }

    /// Configuration for tests: ephemeral ports, storage under `root`.
    pub fn ephemeral(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            base_port: 0,
            bind_attempts: 1,
            storage_root: root.join("storage"),
            log_path: root.join("musterd.log"),
            state_dir: root,
            sample_interval: Duration::from_secs(1),
            cpu_threshold: 90.0,
            alert_cooldown: Duration::from_secs(60),
            auto_install: false,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
