// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LAN discovery client.
//!
//! Three rounds of probing tolerate single UDP drops without reliable
//! delivery: each round sends the probe to the broadcast address (and,
//! when configured, to every host of the /24 sweep list), then polls
//! replies for a bounded window. Replies are deduplicated by source IP,
//! so running discovery twice yields the same set. An empty result
//! falls back to the statically configured agents.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use muster_core::{AgentEndpoint, DiscoveryReply, DISCOVER_PROBE};
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::FallbackAgent;

/// Knobs for one discovery run.
#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    /// UDP port agents listen on.
    pub port: u16,
    /// Probe destination; the LAN broadcast address in production,
    /// 127.0.0.1 in tests or on broadcast-filtered networks.
    pub broadcast_addr: IpAddr,
    /// /24 prefixes ("10.125.125") to sweep host-by-host.
    pub subnets: Vec<String>,
    /// Probe rounds.
    pub rounds: usize,
    /// Reply poll window per round.
    pub window: Duration,
}

impl DiscoverySettings {
    pub fn new(port: u16, subnets: Vec<String>) -> Self {
        Self {
            port,
            broadcast_addr: IpAddr::from([255, 255, 255, 255]),
            subnets,
            rounds: 3,
            window: Duration::from_millis(500),
        }
    }
}

/// Probe the LAN and collect the deduplicated agent set.
pub async fn discover(settings: &DiscoverySettings) -> std::io::Result<Vec<AgentEndpoint>> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
    socket.set_broadcast(true)?;

    let mut found = Vec::new();
    let mut seen: HashSet<IpAddr> = HashSet::new();
    let mut buf = [0u8; 2048];

    for round in 0..settings.rounds {
        send_probes(&socket, settings, round).await;

        // Absolute deadline for this round's poll window.
        let deadline = Instant::now() + settings.window;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let received = match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await
            {
                Err(_) => break,
                Ok(Err(e)) => {
                    debug!(error = %e, "discovery receive error");
                    continue;
                }
                Ok(Ok(received)) => received,
            };
            let (len, from) = received;
            if let Some(endpoint) = parse_reply(&buf[..len], from, &mut seen) {
                info!(agent = %endpoint.name, ip = %endpoint.ip, "discovered agent");
                found.push(endpoint);
            }
        }
    }

    Ok(found)
}

/// Discovery with the configured fallback applied on an empty result.
pub async fn discover_or_fallback(
    settings: &DiscoverySettings,
    fallback: &[FallbackAgent],
) -> Vec<AgentEndpoint> {
    let found = match discover(settings).await {
        Ok(found) => found,
        Err(e) => {
            warn!(error = %e, "discovery failed, using fallback agents");
            Vec::new()
        }
    };
    if !found.is_empty() {
        return found;
    }
    info!(count = fallback.len(), "no agents discovered, using fallback");
    fallback
        .iter()
        .cloned()
        .map(FallbackAgent::into_endpoint)
        .collect()
}

async fn send_probes(socket: &UdpSocket, settings: &DiscoverySettings, round: usize) {
    let probe = DISCOVER_PROBE.as_bytes();

    let broadcast = SocketAddr::new(settings.broadcast_addr, settings.port);
    if let Err(e) = socket.send_to(probe, broadcast).await {
        debug!(round, error = %e, "broadcast probe failed");
    }

    // Host-by-host sweep for networks that filter broadcast.
    for prefix in &settings.subnets {
        for host in 1..255u16 {
            let target = format!("{prefix}.{host}");
            let Ok(ip) = target.parse::<IpAddr>() else {
                warn!(prefix = %prefix, "bad subnet prefix, skipping sweep");
                break;
            };
            let _ = socket.send_to(probe, SocketAddr::new(ip, settings.port)).await;
        }
    }
}

fn parse_reply(
    payload: &[u8],
    from: SocketAddr,
    seen: &mut HashSet<IpAddr>,
) -> Option<AgentEndpoint> {
    let reply: DiscoveryReply = match serde_json::from_slice(payload) {
        Ok(reply) => reply,
        Err(e) => {
            debug!(%from, error = %e, "unparseable discovery reply");
            return None;
        }
    };
    if !reply.is_valid() {
        debug!(%from, kind = %reply.kind, "ignoring reply with foreign type");
        return None;
    }
    if !seen.insert(from.ip()) {
        debug!(%from, "duplicate discovery reply dropped");
        return None;
    }
    Some(reply.into_endpoint(from.ip().to_string()))
}

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod tests;
