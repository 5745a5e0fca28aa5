// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! muster — the fleet controller.
//!
//! Discovers agents on the LAN, then drops into an interactive
//! dashboard over the fleet model: toggle agents, dispatch joint
//! commands, watch tasks and stats.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use muster_control::client::HttpAgentApi;
use muster_control::discovery::{discover_or_fallback, DiscoverySettings};
use muster_control::{color, ui, AgentApi, ControllerConfig, FleetModel};
use muster_core::SystemClock;

#[derive(Parser)]
#[command(
    name = "muster",
    version,
    about = "Fleet controller: discover, select, and command muster agents",
    styles = muster_control::color::styles(),
)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Comma-separated /24 prefixes to sweep during discovery
    #[arg(long)]
    subnet: Option<String>,

    /// Fleet refresh interval in milliseconds
    #[arg(long)]
    refresh_ms: Option<u64>,

    /// Base port P agents run on (discovery defaults to P+1)
    #[arg(long)]
    base_port: Option<u16>,

    /// UDP discovery port
    #[arg(long)]
    discovery_port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout belongs to the dashboard.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ControllerConfig::load(cli.config.as_deref())?;
    if cli.subnet.is_some() {
        config.subnet_prefix = cli.subnet;
    }
    if let Some(refresh_ms) = cli.refresh_ms {
        config.refresh_interval_ms = refresh_ms;
    }
    if let Some(base) = cli.base_port {
        config.base_port = base;
        // An explicit --discovery-port still wins below.
        config.discovery_port = base + muster_core::agent::DISCOVERY_OFFSET;
    }
    if let Some(port) = cli.discovery_port {
        config.discovery_port = port;
    }

    println!("Scanning for agents on the network...");
    let settings = DiscoverySettings::new(config.discovery_port, config.subnet_prefixes());
    let agents = discover_or_fallback(&settings, &config.fallback_agents).await;

    if agents.is_empty() {
        println!("No agents found and no fallback configured.");
        println!(
            "{}",
            color::muted("Start musterd on at least one host, or add [[fallback_agents]] to muster.toml.")
        );
        return Ok(());
    }
    for agent in &agents {
        println!("  {} at {}:{}", agent.name, agent.ip, agent.port);
    }

    let model = FleetModel::new(agents, Arc::new(SystemClock));
    let api: Arc<dyn AgentApi> = Arc::new(HttpAgentApi::new());

    ui::run(
        model,
        api,
        Duration::from_millis(config.refresh_interval_ms.max(100)),
    )
    .await?;

    Ok(())
}
