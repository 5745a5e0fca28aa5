// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent lifecycle: bind sockets, wire the services together, tear down.
//!
//! All services are process-scoped: constructed once here, owned by the
//! returned [`AgentHandle`], and stopped through it. There is no state
//! on disk beyond the storage directory.

use std::sync::Arc;

use muster_core::{Channel, Clock, PortPlan, StatsSnapshot};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::AgentConfig;
use crate::discovery::DiscoveryResponder;
use crate::probe::{StatsProbe, SysinfoProbe};
use crate::router::{Router, RouterCtx};
use crate::sampler::{MetricsSampler, SamplerHandle};
use crate::storage::FileStore;
use crate::streams::StreamHub;
use crate::supervisor::TaskSupervisor;

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to bind {what} port: no free port in {base}..{end}")]
    BindExhausted { what: &'static str, base: u16, end: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A started agent: the actually-bound port plan plus service handles.
pub struct AgentHandle {
    pub hostname: String,
    pub plan: PortPlan,
    pub supervisor: Arc<TaskSupervisor>,
    pub hub: Arc<StreamHub>,
    pub latest_stats: Arc<Mutex<StatsSnapshot>>,
    sampler: SamplerHandle,
    tasks: Vec<JoinHandle<()>>,
}

impl AgentHandle {
    /// Stop the sampler and abort every service loop. Sockets close as
    /// their tasks drop.
    pub fn shutdown(self) {
        info!("shutting down agent services");
        self.sampler.stop();
        for task in self.tasks {
            task.abort();
        }
    }
}

/// Bind a TCP listener at `base`, auto-incrementing through `attempts`
/// consecutive ports. Port 0 binds an ephemeral port directly.
async fn bind_tcp(
    base: u16,
    attempts: u16,
    what: &'static str,
) -> Result<(TcpListener, u16), LifecycleError> {
    let attempts = attempts.max(1);
    for offset in 0..attempts {
        let port = base.saturating_add(offset);
        match TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => {
                let bound = listener.local_addr()?.port();
                if offset > 0 {
                    info!(what, wanted = base, bound, "port auto-incremented");
                }
                return Ok((listener, bound));
            }
            // An ephemeral bind (port 0) failing is a real error, not
            // an occupied port.
            Err(e) if base == 0 => return Err(e.into()),
            Err(_) => continue,
        }
    }
    Err(LifecycleError::BindExhausted {
        what,
        base,
        end: base.saturating_add(attempts),
    })
}

/// Bind the discovery UDP socket, auto-incrementing like [`bind_tcp`].
async fn bind_udp(
    base: u16,
    attempts: u16,
    what: &'static str,
) -> Result<(UdpSocket, u16), LifecycleError> {
    let attempts = attempts.max(1);
    for offset in 0..attempts {
        let port = base.saturating_add(offset);
        match UdpSocket::bind(("0.0.0.0", port)).await {
            Ok(socket) => {
                let bound = socket.local_addr()?.port();
                if offset > 0 {
                    info!(what, wanted = base, bound, "port auto-incremented");
                }
                return Ok((socket, bound));
            }
            Err(e) if base == 0 => return Err(e.into()),
            Err(_) => continue,
        }
    }
    Err(LifecycleError::BindExhausted {
        what,
        base,
        end: base.saturating_add(attempts),
    })
}

/// Start every agent service with the production probe.
pub async fn startup(
    config: &AgentConfig,
    clock: Arc<dyn Clock>,
) -> Result<AgentHandle, LifecycleError> {
    startup_with_probe(config, clock, SysinfoProbe::new()).await
}

/// Start every agent service, injecting the stats probe (tests use a
/// scripted one).
pub async fn startup_with_probe<P: StatsProbe>(
    config: &AgentConfig,
    clock: Arc<dyn Clock>,
    probe: P,
) -> Result<AgentHandle, LifecycleError> {
    std::fs::create_dir_all(&config.storage_root)?;

    let hostname = sysinfo::System::host_name().unwrap_or_else(|| "unknown".to_string());

    // Bind everything before spawning anything, so a bind failure
    // leaves no half-started services behind.
    let planned = PortPlan::from_base(config.base_port);
    let (request_listener, request_port) =
        bind_tcp(planned.request, config.bind_attempts, "request").await?;
    let (discovery_socket, discovery_port) = bind_udp(
        if config.base_port == 0 { 0 } else { planned.discovery },
        config.bind_attempts,
        "discovery",
    )
    .await?;

    let mut channel_listeners = Vec::with_capacity(4);
    let mut channel_ports = [0u16; 4];
    for channel in Channel::ALL {
        let base = if config.base_port == 0 {
            0
        } else {
            planned.channel(channel)
        };
        let (listener, port) = bind_tcp(base, config.bind_attempts, channel.name()).await?;
        channel_ports[channel.index()] = port;
        channel_listeners.push((channel, listener));
    }

    let plan = PortPlan {
        request: request_port,
        discovery: discovery_port,
        channels: channel_ports,
    };

    // Services.
    let hub = StreamHub::new(Arc::clone(&clock));
    let supervisor = TaskSupervisor::new(Arc::clone(&hub), Arc::clone(&clock));

    let sampler = MetricsSampler::new(
        probe,
        Arc::clone(&hub),
        Arc::clone(&clock),
        hostname.clone(),
        config.sample_interval,
        config.cpu_threshold,
        config.alert_cooldown,
    )
    .start();
    let latest_stats = sampler.latest();

    let ctx = Arc::new(RouterCtx {
        supervisor: Arc::clone(&supervisor),
        latest_stats: Arc::clone(&latest_stats),
        store: FileStore::new(&config.storage_root),
        hostname: hostname.clone(),
        auto_install: config.auto_install,
        clock: Arc::clone(&clock),
    });

    let mut tasks = Vec::new();
    tasks.push(tokio::spawn(Router::new(request_listener, ctx).run()));
    for (channel, listener) in channel_listeners {
        tasks.push(tokio::spawn(Arc::clone(&hub).serve(channel, listener)));
    }
    tasks.push(tokio::spawn(
        DiscoveryResponder::new(discovery_socket, hostname.clone(), &plan).run(),
    ));

    info!(
        hostname,
        request = plan.request,
        discovery = plan.discovery,
        ws_main = plan.channels[0],
        ws_stats = plan.channels[1],
        ws_files = plan.channels[2],
        ws_desktop = plan.channels[3],
        "agent services started"
    );

    Ok(AgentHandle {
        hostname,
        plan,
        supervisor,
        hub,
        latest_stats,
        sampler,
        tasks,
    })
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
