//! Scenarios: discovery against a live agent and against an empty LAN.

use crate::prelude::*;
use muster_control::config::FallbackAgent;
use muster_control::discovery::{discover, discover_or_fallback, DiscoverySettings};
use std::net::IpAddr;
use std::time::Duration;

fn loopback_settings(port: u16) -> DiscoverySettings {
    DiscoverySettings {
        port,
        broadcast_addr: IpAddr::from([127, 0, 0, 1]),
        subnets: Vec::new(),
        rounds: 3,
        window: Duration::from_millis(100),
    }
}

#[tokio::test]
async fn discovery_finds_a_running_agent() {
    let agent = SpecAgent::start().await;
    let settings = loopback_settings(agent.handle.plan.discovery);

    let found = discover(&settings).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, agent.handle.hostname);
    assert_eq!(found[0].port, agent.endpoint.port);
    assert_eq!(found[0].ws_main, agent.endpoint.ws_main);
    assert_eq!(found[0].ip, "127.0.0.1");

    agent.handle.shutdown();
}

#[tokio::test]
async fn discovery_twice_returns_the_same_set() {
    let agent = SpecAgent::start().await;
    let settings = loopback_settings(agent.handle.plan.discovery);

    let first = discover(&settings).await.unwrap();
    let second = discover(&settings).await.unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(first, second);

    agent.handle.shutdown();
}

#[tokio::test]
async fn empty_lan_yields_exactly_the_fallback() {
    // Bind-then-drop: this port has no responder.
    let silent_port = {
        let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.local_addr().unwrap().port()
    };
    let mut settings = loopback_settings(silent_port);
    settings.rounds = 1;
    settings.window = Duration::from_millis(50);

    let fallback = vec![FallbackAgent {
        name: "server01".to_string(),
        ip: "127.0.0.1".to_string(),
        port: 2030,
    }];

    let agents = discover_or_fallback(&settings, &fallback).await;
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].name, "server01");
    assert_eq!(agents[0].ip, "127.0.0.1");
    assert_eq!(agents[0].port, 2030);
    assert_eq!(agents[0].ws_stats, 2041);
}
