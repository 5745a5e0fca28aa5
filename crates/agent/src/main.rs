// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! musterd — the per-host fleet agent.
//!
//! Long-lived daemon exposing the host over the network: command
//! execution with streamed output, resource statistics with alerts,
//! LAN discovery, a sandboxed file area, and system control.
//!
//! Architecture:
//! - Request router: one task per request-response connection
//! - Stream hub: four WebSocket broadcast channels
//! - Task supervisor: one owning task per child process
//! - Metrics sampler and UDP discovery responder

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::sync::Arc;

use muster_agent::{lifecycle, AgentConfig};
use muster_core::SystemClock;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before any socket is bound.
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("musterd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("musterd {}", env!("CARGO_PKG_VERSION"));
                println!("Muster agent - exposes this host to the muster controller");
                println!();
                println!("USAGE:");
                println!("    musterd");
                println!();
                println!("Configuration is taken from the environment:");
                println!("    MUSTERD_BASE_PORT      base port P (default 2030);");
                println!("                           P request, P+1 discovery, P+10..P+13 streams");
                println!("    MUSTERD_STORAGE_DIR    file storage root (default ./storage)");
                println!("    MUSTERD_STATE_DIR      log directory (default ~/.local/state/muster)");
                println!("    MUSTERD_SAMPLE_MS      stats sampler tick (default 1000)");
                println!("    MUSTERD_CPU_THRESHOLD  CPU alert threshold (default 90)");
                println!("    MUSTERD_AUTO_INSTALL   set to 1 to enable install-on-upload");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: musterd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = AgentConfig::load()?;

    // Rotate log file if it has grown too large
    rotate_log_if_needed(&config.log_path);

    let log_guard = setup_logging(&config)?;

    info!("starting musterd");

    let handle = match lifecycle::startup(&config, Arc::new(SystemClock)).await {
        Ok(handle) => handle,
        Err(e) => {
            error!("failed to start agent: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    println!("musterd ready on {}", handle.hostname);
    println!("  request:    0.0.0.0:{}", handle.plan.request);
    println!("  discovery:  0.0.0.0:{} (udp)", handle.plan.discovery);
    println!("  ws main:    0.0.0.0:{}", handle.plan.channels[0]);
    println!("  ws stats:   0.0.0.0:{}", handle.plan.channels[1]);
    println!("  ws files:   0.0.0.0:{}", handle.plan.channels[2]);
    println!("  ws desktop: 0.0.0.0:{}", handle.plan.channels[3]);

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("received SIGTERM, shutting down...");
        }
        _ = sigint.recv() => {
            info!("received SIGINT, shutting down...");
        }
    }

    handle.shutdown();
    info!("musterd stopped");
    Ok(())
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep (musterd.log.1, .2, .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `musterd.log` -> `musterd.log.1` -> `.2` -> `.3`, deleting the
/// oldest. Best-effort: rotation failures are silently ignored so the
/// agent still starts.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };

    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();

    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn setup_logging(
    config: &AgentConfig,
) -> Result<tracing_appender::non_blocking::WorkerGuard, muster_agent::LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_appender = tracing_appender::rolling::never(
        config
            .log_path
            .parent()
            .ok_or(muster_agent::LifecycleError::NoStateDir)?,
        config
            .log_path
            .file_name()
            .ok_or(muster_agent::LifecycleError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
