// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LAN discovery wire format.
//!
//! Probe: a UDP datagram whose payload is exactly [`DISCOVER_PROBE`].
//! Reply: a JSON [`DiscoveryReply`] sent back to the datagram's source.
//! The agent's IP is not carried in the reply; the controller takes it
//! from the reply's source address.

use crate::agent::{AgentEndpoint, PortPlan};
use serde::{Deserialize, Serialize};

/// Literal discovery probe payload.
pub const DISCOVER_PROBE: &str = "DISCOVER_SERVER";

/// Value of the `type` field in a valid reply.
pub const RESPONSE_KIND: &str = "SERVER_RESPONSE";

/// Self-describing record an agent sends in response to a probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryReply {
    #[serde(rename = "type")]
    pub kind: String,
    pub hostname: String,
    pub port: u16,
    pub ws_main: u16,
    pub ws_stats: u16,
    pub ws_files: u16,
    pub ws_desktop: u16,
}

impl DiscoveryReply {
    pub fn new(hostname: impl Into<String>, plan: &PortPlan) -> Self {
        Self {
            kind: RESPONSE_KIND.to_string(),
            hostname: hostname.into(),
            port: plan.request,
            ws_main: plan.channels[0],
            ws_stats: plan.channels[1],
            ws_files: plan.channels[2],
            ws_desktop: plan.channels[3],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.kind == RESPONSE_KIND
    }

    /// Build the controller-side endpoint, pairing the reply with the
    /// source address it arrived from.
    pub fn into_endpoint(self, ip: impl Into<String>) -> AgentEndpoint {
        AgentEndpoint {
            name: self.hostname,
            ip: ip.into(),
            port: self.port,
            ws_main: self.ws_main,
            ws_stats: self.ws_stats,
            ws_files: self.ws_files,
            ws_desktop: self.ws_desktop,
        }
    }
}

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod tests;
