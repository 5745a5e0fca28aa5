// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Metrics sampler: periodic stats broadcast plus rate-limited alerts.
//!
//! Once per tick the sampler reads the probe, stores the snapshot in a
//! shared cell (served by `/stats`), and broadcasts `stats_update` on
//! the stats channel. When CPU crosses the threshold and the cooldown
//! has elapsed, a `cpu_alert` goes out on both the main and stats
//! channels. The cooldown state is owned by the sampler task alone.

use std::sync::Arc;
use std::time::Duration;

use muster_core::{Channel, Clock, StatsSnapshot, StreamEvent};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::probe::StatsProbe;
use crate::streams::StreamHub;

/// Handle to a started sampler; dropping it does not stop the loop.
pub struct SamplerHandle {
    latest: Arc<Mutex<StatsSnapshot>>,
    shutdown: Arc<Notify>,
}

impl SamplerHandle {
    /// Shared cell holding the most recent snapshot.
    pub fn latest(&self) -> Arc<Mutex<StatsSnapshot>> {
        Arc::clone(&self.latest)
    }

    /// Ask the sampler loop to exit at the next tick boundary.
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }
}

/// Periodic CPU/memory sampler.
pub struct MetricsSampler<P: StatsProbe> {
    probe: P,
    hub: Arc<StreamHub>,
    clock: Arc<dyn Clock>,
    hostname: String,
    interval: Duration,
    threshold: f64,
    cooldown: Duration,
}

impl<P: StatsProbe> MetricsSampler<P> {
    pub fn new(
        probe: P,
        hub: Arc<StreamHub>,
        clock: Arc<dyn Clock>,
        hostname: impl Into<String>,
        interval: Duration,
        threshold: f64,
        cooldown: Duration,
    ) -> Self {
        Self {
            probe,
            hub,
            clock,
            hostname: hostname.into(),
            interval,
            threshold,
            cooldown,
        }
    }

    /// Spawn the sampling loop and return its handle.
    pub fn start(self) -> SamplerHandle {
        let latest = Arc::new(Mutex::new(StatsSnapshot::default()));
        let shutdown = Arc::new(Notify::new());
        let handle = SamplerHandle {
            latest: Arc::clone(&latest),
            shutdown: Arc::clone(&shutdown),
        };
        tokio::spawn(self.run(latest, shutdown));
        handle
    }

    async fn run(mut self, latest: Arc<Mutex<StatsSnapshot>>, shutdown: Arc<Notify>) {
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // interval() fires immediately; consume that so the first
        // sample lands one full interval after start.
        tick.tick().await;

        let mut last_alert_ms: Option<u64> = None;

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    info!("sampler stopping");
                    break;
                }
                _ = tick.tick() => {}
            }

            let now = self.clock.now_ms();
            let (cpu, ram_used, ram_total) = match self.probe.sample() {
                Ok(sample) => sample,
                Err(e) => {
                    warn!(error = %e, "stats probe failed");
                    continue;
                }
            };
            let snapshot = StatsSnapshot {
                cpu,
                ram_used,
                ram_total,
                timestamp: now,
            };

            *latest.lock() = snapshot;
            self.hub.broadcast(
                Channel::Stats,
                &StreamEvent::StatsUpdate {
                    cpu,
                    ram_used,
                    ram_total,
                    timestamp: now,
                },
            );

            if cpu > self.threshold && alert_due(last_alert_ms, now, self.cooldown) {
                let message = format!("CPU usage exceeded {:.0}%!", self.threshold);
                info!(cpu, hostname = %self.hostname, "{message}");
                let alert = StreamEvent::CpuAlert {
                    cpu,
                    hostname: self.hostname.clone(),
                    message,
                    timestamp: now,
                };
                self.hub.broadcast(Channel::Main, &alert);
                self.hub.broadcast(Channel::Stats, &alert);
                last_alert_ms = Some(now);
            } else if cpu > self.threshold {
                debug!(cpu, "threshold crossed within cooldown, alert suppressed");
            }
        }
    }
}

/// The alert predicate: never alerted, or the cooldown has elapsed.
fn alert_due(last_alert_ms: Option<u64>, now_ms: u64, cooldown: Duration) -> bool {
    match last_alert_ms {
        None => true,
        Some(last) => now_ms.saturating_sub(last) >= cooldown.as_millis() as u64,
    }
}

#[cfg(test)]
#[path = "sampler_tests.rs"]
mod tests;
