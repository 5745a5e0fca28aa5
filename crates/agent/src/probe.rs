// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OS resource probes behind a trait so the sampler is testable.

use std::collections::VecDeque;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("system probe unavailable: {0}")]
    Unavailable(String),
}

/// One raw sample: (cpu percent, ram used MB, ram total MB).
pub trait StatsProbe: Send + 'static {
    fn sample(&mut self) -> Result<(f64, i64, i64), ProbeError>;
}

/// Production probe backed by `sysinfo`.
///
/// CPU usage is the differential between consecutive refreshes, so the
/// first sample reports 0.
pub struct SysinfoProbe {
    sys: sysinfo::System,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            sys: sysinfo::System::new(),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsProbe for SysinfoProbe {
    fn sample(&mut self) -> Result<(f64, i64, i64), ProbeError> {
        self.sys.refresh_cpu_usage();
        self.sys.refresh_memory();

        let cpu = f64::from(self.sys.global_cpu_info().cpu_usage());
        let total_bytes = self.sys.total_memory();
        let available_bytes = self.sys.available_memory();
        if total_bytes == 0 {
            return Err(ProbeError::Unavailable("memory report empty".to_string()));
        }

        const MB: u64 = 1024 * 1024;
        let ram_total = (total_bytes / MB) as i64;
        let ram_used = (total_bytes.saturating_sub(available_bytes) / MB) as i64;
        Ok((cpu, ram_used, ram_total))
    }
}

/// Scripted probe for tests: plays back a CPU sequence, repeating the
/// last value once the script is exhausted.
pub struct FakeProbe {
    script: VecDeque<f64>,
    last: f64,
    ram_used: i64,
    ram_total: i64,
}

impl FakeProbe {
    pub fn new(cpu_script: impl Into<Vec<f64>>, ram_used: i64, ram_total: i64) -> Self {
        let script: Vec<f64> = cpu_script.into();
        let last = script.last().copied().unwrap_or(0.0);
        Self {
            script: script.into(),
            last,
            ram_used,
            ram_total,
        }
    }

    /// Probe that reports a constant CPU value forever.
    pub fn constant(cpu: f64) -> Self {
        Self::new(vec![cpu], 1024, 8192)
    }
}

impl StatsProbe for FakeProbe {
    fn sample(&mut self) -> Result<(f64, i64, i64), ProbeError> {
        let cpu = self.script.pop_front().unwrap_or(self.last);
        Ok((cpu, self.ram_used, self.ram_total))
    }
}
