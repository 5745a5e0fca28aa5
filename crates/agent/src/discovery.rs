// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! UDP discovery responder.
//!
//! Answers `DISCOVER_SERVER` probes with the agent's self-describing
//! record. Any other datagram is dropped. The socket stays open for
//! the life of the process.

use muster_core::{DiscoveryReply, PortPlan, DISCOVER_PROBE};
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

pub struct DiscoveryResponder {
    socket: UdpSocket,
    reply: DiscoveryReply,
}

impl DiscoveryResponder {
    pub fn new(socket: UdpSocket, hostname: impl Into<String>, plan: &PortPlan) -> Self {
        Self {
            socket,
            reply: DiscoveryReply::new(hostname, plan),
        }
    }

    pub async fn run(self) {
        let payload = match serde_json::to_vec(&self.reply) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "failed to encode discovery reply");
                return;
            }
        };

        info!(
            port = self.socket.local_addr().map(|a| a.port()).unwrap_or(0),
            "discovery responder listening"
        );

        let mut buf = [0u8; 256];
        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, peer)) => {
                    if &buf[..len] == DISCOVER_PROBE.as_bytes() {
                        debug!(%peer, "answering discovery probe");
                        if let Err(e) = self.socket.send_to(&payload, peer).await {
                            warn!(%peer, error = %e, "discovery reply failed");
                        }
                    } else {
                        debug!(%peer, len, "ignoring non-probe datagram");
                    }
                }
                Err(e) => {
                    error!(error = %e, "discovery receive error");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod tests;
