// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller configuration.
//!
//! Loaded from a TOML file (`--config`, else `./muster.toml`, else
//! `~/.config/muster/config.toml`); a missing default file yields the
//! built-in defaults. CLI flags override file values.

use std::path::{Path, PathBuf};

use muster_core::agent::{CHANNEL_OFFSET, DEFAULT_BASE_PORT, DISCOVERY_OFFSET};
use muster_core::AgentEndpoint;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("failed to parse {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
}

/// One statically configured agent, used only when discovery returns
/// nothing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FallbackAgent {
    pub name: String,
    pub ip: String,
    pub port: u16,
}

impl FallbackAgent {
    /// Expand to a full endpoint assuming the standard port layout
    /// relative to the agent's request port.
    pub fn into_endpoint(self) -> AgentEndpoint {
        let base = self.port;
        AgentEndpoint {
            name: self.name,
            ip: self.ip,
            port: base,
            ws_main: base + CHANNEL_OFFSET,
            ws_stats: base + CHANNEL_OFFSET + 1,
            ws_files: base + CHANNEL_OFFSET + 2,
            ws_desktop: base + CHANNEL_OFFSET + 3,
        }
    }
}

fn default_refresh_ms() -> u64 {
    2_000
}

fn default_base_port() -> u16 {
    DEFAULT_BASE_PORT
}

fn default_discovery_port() -> u16 {
    DEFAULT_BASE_PORT + DISCOVERY_OFFSET
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    /// Comma-separated /24 prefixes to sweep during discovery
    /// (e.g. "10.125.125,192.168.1").
    #[serde(default)]
    pub subnet_prefix: Option<String>,

    /// Agents assumed when discovery comes back empty.
    #[serde(default)]
    pub fallback_agents: Vec<FallbackAgent>,

    /// How often the fleet model refreshes tasks and stats.
    #[serde(default = "default_refresh_ms")]
    pub refresh_interval_ms: u64,

    /// Base port P the fleet's agents are assumed to run on; the
    /// default discovery port is P+1.
    #[serde(default = "default_base_port")]
    pub base_port: u16,

    /// UDP port probed during discovery. Left unset (0) in the file,
    /// it is derived from `base_port`.
    #[serde(default)]
    pub discovery_port: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            subnet_prefix: None,
            fallback_agents: Vec::new(),
            refresh_interval_ms: default_refresh_ms(),
            base_port: default_base_port(),
            discovery_port: default_discovery_port(),
        }
    }
}

impl ControllerConfig {
    /// Load from `explicit` if given (must exist), else from the first
    /// default location that exists, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        for candidate in Self::default_paths() {
            if candidate.exists() {
                return Self::from_file(&candidate);
            }
        }
        Ok(Self::default())
    }

    fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./muster.toml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("muster/config.toml"));
        }
        paths
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&raw).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        Ok(config.resolved())
    }

    /// Fill in the discovery port from the base port when the file
    /// left it unset.
    fn resolved(mut self) -> Self {
        if self.discovery_port == 0 {
            self.discovery_port = self.base_port + DISCOVERY_OFFSET;
        }
        self
    }

    /// The /24 prefixes to sweep, parsed from `subnet_prefix`.
    pub fn subnet_prefixes(&self) -> Vec<String> {
        self.subnet_prefix
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.trim_end_matches('.').to_string())
            .collect()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
