// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the agent crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Resolve state directory: MUSTERD_STATE_DIR > XDG_STATE_HOME/muster > ~/.local/state/muster
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("MUSTERD_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("muster"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/muster"))
}

/// Base port override
pub fn base_port() -> Option<u16> {
    std::env::var("MUSTERD_BASE_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
}

/// Storage directory override
pub fn storage_dir() -> Option<PathBuf> {
    std::env::var("MUSTERD_STORAGE_DIR").ok().map(PathBuf::from)
}

/// Sampler interval override
pub fn sample_ms() -> Option<Duration> {
    std::env::var("MUSTERD_SAMPLE_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// CPU alert threshold override
pub fn cpu_threshold() -> Option<f64> {
    std::env::var("MUSTERD_CPU_THRESHOLD")
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
}

/// Opt-in for auto-install on upload
pub fn auto_install() -> bool {
    std::env::var("MUSTERD_AUTO_INSTALL").is_ok_and(|v| v == "1" || v == "true")
}
