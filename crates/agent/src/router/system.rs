// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System introspection and control handlers.
//!
//! Reads go through `sysinfo` where it can answer (info, processes) and
//! shell out where it cannot (systemd units, docker, journal). Control
//! actions are validated against closed verb sets before any command
//! line is assembled from request input.

use muster_core::{wire::Request, ApiError};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::RouterCtx;
use crate::subprocess::{shell_with_timeout, CONTROL_TIMEOUT, INTROSPECT_TIMEOUT};

pub async fn dispatch(
    request: &Request,
    ctx: &RouterCtx,
) -> Result<serde_json::Value, ApiError> {
    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/system/info") => info_handler().await,
        ("GET", "/system/processes") => processes(),
        ("POST", "/system/kill-process") => kill_process(request),
        ("GET", "/system/services") => services().await,
        ("POST", "/system/service-control") => service_control(request).await,
        ("GET", "/system/docker") => docker().await,
        ("POST", "/system/docker-control") => docker_control(request).await,
        ("GET", "/system/logs") => system_logs(request).await,
        ("POST", "/system/shutdown") => power(ctx, "shutdown -h now", "shutdown"),
        ("POST", "/system/reboot") => power(ctx, "shutdown -r now", "reboot"),
        (method, path) => Err(ApiError::not_found(format!("unknown route {method} {path}"))),
    }
}

fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    format!("{days}d {hours}h {minutes}m")
}

async fn info_handler() -> Result<serde_json::Value, ApiError> {
    let os = sysinfo::System::long_os_version().unwrap_or_else(|| "Unknown".to_string());
    let kernel = sysinfo::System::kernel_version().unwrap_or_else(|| "Unknown".to_string());
    let uptime = format_uptime(sysinfo::System::uptime());

    let disk = match shell_with_timeout("df -h / | tail -1", INTROSPECT_TIMEOUT, "df").await {
        Ok(output) => String::from_utf8_lossy(&output.stdout).trim().to_string(),
        Err(e) => {
            warn!(error = %e, "disk report failed");
            "Unknown".to_string()
        }
    };

    let networks = sysinfo::Networks::new_with_refreshed_list();
    let network: Vec<String> = networks.iter().map(|(name, _)| name.clone()).collect();

    Ok(json!({
        "os": os,
        "kernel": kernel,
        "uptime": uptime,
        "disk": disk,
        "network": network,
    }))
}

/// Top processes by CPU, bounded so the response stays small.
const PROCESS_LIMIT: usize = 50;

fn processes() -> Result<serde_json::Value, ApiError> {
    let sys = sysinfo::System::new_all();
    let mut rows: Vec<_> = sys.processes().values().collect();
    rows.sort_by(|a, b| b.cpu_usage().total_cmp(&a.cpu_usage()));

    let out: Vec<serde_json::Value> = rows
        .into_iter()
        .take(PROCESS_LIMIT)
        .map(|p| {
            json!({
                "pid": p.pid().to_string(),
                "user": p.user_id().map(|u| u.to_string()).unwrap_or_default(),
                "cpu": format!("{:.1}", p.cpu_usage()),
                "mem": format!("{}", p.memory() / (1024 * 1024)),
                "command": p.name().to_string(),
            })
        })
        .collect();
    Ok(json!({ "processes": out }))
}

#[derive(Debug, Deserialize)]
struct KillProcessBody {
    pid: String,
    #[serde(default)]
    signal: Option<String>,
}

fn kill_process(request: &Request) -> Result<serde_json::Value, ApiError> {
    let body: KillProcessBody = request.body_json()?;
    let pid: i32 = body
        .pid
        .parse()
        .map_err(|_| ApiError::bad_request(format!("bad pid: {}", body.pid)))?;

    let signal = match body.signal.as_deref() {
        None | Some("TERM") | Some("SIGTERM") => nix::sys::signal::Signal::SIGTERM,
        Some("KILL") | Some("SIGKILL") => nix::sys::signal::Signal::SIGKILL,
        Some("HUP") | Some("SIGHUP") => nix::sys::signal::Signal::SIGHUP,
        Some(other) => return Err(ApiError::bad_request(format!("unsupported signal: {other}"))),
    };

    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), signal)
        .map_err(|e| ApiError::unavailable(format!("kill {pid} failed: {e}")))?;
    info!(pid, signal = %signal, "signalled process");
    Ok(json!({ "success": true }))
}

async fn services() -> Result<serde_json::Value, ApiError> {
    let output = shell_with_timeout(
        "systemctl list-units --type=service --no-pager --no-legend --plain",
        INTROSPECT_TIMEOUT,
        "systemctl list-units",
    )
    .await
    .map_err(ApiError::unavailable)?;

    let services: Vec<serde_json::Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let name = cols.next()?;
            let load = cols.next()?;
            let active = cols.next()?;
            let sub = cols.next()?;
            Some(json!({ "name": name, "load": load, "active": active, "sub": sub }))
        })
        .collect();
    Ok(json!({ "services": services }))
}

/// A systemd unit name: conservative charset, no shell metacharacters.
fn valid_unit_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@' | ':'))
}

#[derive(Debug, Deserialize)]
struct ServiceControlBody {
    service: String,
    action: String,
}

async fn service_control(request: &Request) -> Result<serde_json::Value, ApiError> {
    let body: ServiceControlBody = request.body_json()?;
    if !matches!(
        body.action.as_str(),
        "start" | "stop" | "restart" | "enable" | "disable"
    ) {
        return Err(ApiError::bad_request(format!(
            "unsupported action: {}",
            body.action
        )));
    }
    if !valid_unit_name(&body.service) {
        return Err(ApiError::bad_request(format!(
            "bad service name: {}",
            body.service
        )));
    }

    let command = format!("systemctl {} '{}'", body.action, body.service);
    let output = shell_with_timeout(&command, CONTROL_TIMEOUT, "systemctl")
        .await
        .map_err(ApiError::unavailable)?;
    if !output.status.success() {
        return Err(ApiError::unavailable(format!(
            "systemctl {} {} failed: {}",
            body.action,
            body.service,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    info!(service = %body.service, action = %body.action, "service control");
    Ok(json!({ "success": true }))
}

async fn docker() -> Result<serde_json::Value, ApiError> {
    let output = shell_with_timeout(
        "docker ps -a --format '{{.ID}}|{{.Names}}|{{.Status}}|{{.Image}}'",
        INTROSPECT_TIMEOUT,
        "docker ps",
    )
    .await
    .map_err(ApiError::unavailable)?;

    let containers: Vec<serde_json::Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| {
            let mut cols = line.split('|');
            Some(json!({
                "id": cols.next()?,
                "name": cols.next()?,
                "status": cols.next()?,
                "image": cols.next()?,
            }))
        })
        .collect();
    Ok(json!({ "containers": containers }))
}

fn valid_container_ref(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

#[derive(Debug, Deserialize)]
struct DockerControlBody {
    container: String,
    action: String,
}

async fn docker_control(request: &Request) -> Result<serde_json::Value, ApiError> {
    let body: DockerControlBody = request.body_json()?;
    if !valid_container_ref(&body.container) {
        return Err(ApiError::bad_request(format!(
            "bad container reference: {}",
            body.container
        )));
    }
    let command = match body.action.as_str() {
        "start" | "stop" | "restart" => format!("docker {} '{}'", body.action, body.container),
        "remove" => format!("docker rm -f '{}'", body.container),
        other => return Err(ApiError::bad_request(format!("unsupported action: {other}"))),
    };

    let output = shell_with_timeout(&command, CONTROL_TIMEOUT, "docker")
        .await
        .map_err(ApiError::unavailable)?;
    if !output.status.success() {
        return Err(ApiError::unavailable(format!(
            "docker {} {} failed: {}",
            body.action,
            body.container,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    info!(container = %body.container, action = %body.action, "docker control");
    Ok(json!({ "success": true }))
}

/// Cap on `/system/logs?lines=` so the response stays bounded.
const MAX_LOG_LINES: u32 = 1000;

async fn system_logs(request: &Request) -> Result<serde_json::Value, ApiError> {
    let lines: u32 = match request.param("lines") {
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::bad_request(format!("bad lines value: {raw}")))?,
        None => 100,
    };
    let lines = lines.min(MAX_LOG_LINES);

    let output = shell_with_timeout(
        &format!("journalctl -n {lines} --no-pager"),
        INTROSPECT_TIMEOUT,
        "journalctl",
    )
    .await
    .map_err(ApiError::unavailable)?;
    Ok(json!({ "logs": String::from_utf8_lossy(&output.stdout) }))
}

/// Acknowledge first, then dispatch the power command as a task so the
/// response makes it onto the wire before the host goes down.
fn power(ctx: &RouterCtx, command: &str, what: &str) -> Result<serde_json::Value, ApiError> {
    info!(command, "{what} requested");
    let delayed = format!("sleep 1 && {command}");
    ctx.supervisor.submit(&delayed, &Default::default());
    Ok(json!({ "success": true }))
}
