// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task, stats, and hostname handlers.

use std::collections::HashMap;

use muster_core::{wire::Request, ApiError, TaskId};
use serde::Deserialize;
use serde_json::json;

use super::RouterCtx;

#[derive(Debug, Deserialize)]
struct ExecBody {
    cmd: String,
    #[serde(default)]
    env: HashMap<String, String>,
}

pub fn exec(request: &Request, ctx: &RouterCtx) -> Result<serde_json::Value, ApiError> {
    let body: ExecBody = request.body_json()?;
    if body.cmd.trim().is_empty() {
        return Err(ApiError::bad_request("cmd must not be empty"));
    }
    let id = ctx.supervisor.submit(&body.cmd, &body.env);
    Ok(json!({ "task_id": id }))
}

pub fn list(ctx: &RouterCtx) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(ctx.supervisor.list())
        .map_err(|e| ApiError::internal(format!("encode tasks: {e}")))
}

fn id_param(request: &Request) -> Result<TaskId, ApiError> {
    let raw = request
        .param("id")
        .ok_or_else(|| ApiError::bad_request("missing id parameter"))?;
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("bad task id: {raw}")))
}

/// Unknown ids return empty logs rather than an error so controller
/// refresh loops survive submit/refresh races.
pub fn logs(request: &Request, ctx: &RouterCtx) -> Result<serde_json::Value, ApiError> {
    let id = id_param(request)?;
    let logs = ctx.supervisor.output(id).unwrap_or_default();
    Ok(json!({ "logs": logs }))
}

pub fn kill(request: &Request, ctx: &RouterCtx) -> Result<serde_json::Value, ApiError> {
    let id = id_param(request)?;
    ctx.supervisor.kill(id)?;
    Ok(json!({ "killed": id }))
}

pub fn stats(ctx: &RouterCtx) -> Result<serde_json::Value, ApiError> {
    let snapshot = *ctx.latest_stats.lock();
    serde_json::to_value(snapshot).map_err(|e| ApiError::internal(format!("encode stats: {e}")))
}

pub fn hostname(ctx: &RouterCtx) -> Result<serde_json::Value, ApiError> {
    Ok(json!({ "hostname": ctx.hostname }))
}
