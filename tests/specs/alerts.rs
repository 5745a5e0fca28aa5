//! Scenario: CPU alerts are rate-limited by the cooldown.

use crate::prelude::*;
use muster_agent::probe::FakeProbe;
use muster_core::{Channel, StreamEvent};
use std::time::Duration;

#[tokio::test]
async fn sustained_high_cpu_alerts_exactly_once() {
    // 20ms ticks, cpu pinned at 95: many samples, one alert.
    let agent =
        SpecAgent::start_with_probe(FakeProbe::constant(95.0), Duration::from_millis(20)).await;
    let mut stats = agent.subscribe(Channel::Stats).await;

    let mut stats_seen = 0;
    let mut alerts = 0;
    while stats_seen < 8 {
        match next_event(&mut stats, "stats channel event").await {
            StreamEvent::StatsUpdate { .. } => stats_seen += 1,
            StreamEvent::CpuAlert { cpu, message, .. } => {
                assert_eq!(cpu, 95.0);
                assert!(message.contains("90"));
                alerts += 1;
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(alerts, 1, "cooldown must suppress repeat alerts");

    agent.handle.shutdown();
}

#[tokio::test]
async fn stats_timestamps_never_go_backwards() {
    let agent = SpecAgent::start_with_probe(
        FakeProbe::new(vec![10.0, 20.0, 30.0, 40.0], 2048, 8192),
        Duration::from_millis(20),
    )
    .await;
    let mut stats = agent.subscribe(Channel::Stats).await;

    let mut timestamps = Vec::new();
    while timestamps.len() < 4 {
        if let StreamEvent::StatsUpdate { timestamp, .. } =
            next_event(&mut stats, "stats_update").await
        {
            timestamps.push(timestamp);
        }
    }
    assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));

    agent.handle.shutdown();
}

#[tokio::test]
async fn alert_is_mirrored_on_the_main_channel() {
    let agent =
        SpecAgent::start_with_probe(FakeProbe::constant(99.0), Duration::from_millis(20)).await;
    let mut main = agent.subscribe(Channel::Main).await;

    let event = next_event(&mut main, "cpu_alert on main").await;
    match event {
        StreamEvent::CpuAlert { cpu, hostname, .. } => {
            assert_eq!(cpu, 99.0);
            assert_eq!(hostname, agent.handle.hostname);
        }
        other => panic!("expected cpu_alert, got {other:?}"),
    }

    agent.handle.shutdown();
}

#[tokio::test]
async fn quiet_cpu_emits_stats_but_no_alerts() {
    let agent =
        SpecAgent::start_with_probe(FakeProbe::constant(10.0), Duration::from_millis(20)).await;
    let mut stats = agent.subscribe(Channel::Stats).await;

    for _ in 0..5 {
        let event = next_event(&mut stats, "stats_update").await;
        assert!(
            matches!(event, StreamEvent::StatsUpdate { .. }),
            "unexpected event: {event:?}"
        );
    }

    agent.handle.shutdown();
}
