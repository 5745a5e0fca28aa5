// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File storage handlers.
//!
//! Upload/download bodies carry base64 so binary payloads survive the
//! JSON wire. Auto-install only runs when the agent was started with
//! the opt-in enabled AND the uploader asked for it.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use muster_core::{wire::Request, ApiError};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::RouterCtx;

fn name_param(request: &Request) -> Result<&str, ApiError> {
    request
        .param("name")
        .ok_or_else(|| ApiError::bad_request("missing name parameter"))
}

pub fn list(ctx: &RouterCtx) -> Result<serde_json::Value, ApiError> {
    let files = ctx.store.list().map_err(ApiError::from)?;
    Ok(json!({ "files": files }))
}

pub fn read(request: &Request, ctx: &RouterCtx) -> Result<serde_json::Value, ApiError> {
    let content = ctx.store.read(name_param(request)?).map_err(ApiError::from)?;
    Ok(json!({ "content": content }))
}

#[derive(Debug, Deserialize)]
struct WriteBody {
    filename: String,
    content: String,
}

pub fn write(request: &Request, ctx: &RouterCtx) -> Result<serde_json::Value, ApiError> {
    let body: WriteBody = request.body_json()?;
    ctx.store
        .write(&body.filename, &body.content)
        .map_err(ApiError::from)?;
    Ok(json!({ "success": true }))
}

#[derive(Debug, Deserialize)]
struct UploadBody {
    filename: String,
    /// base64 payload
    content: String,
    #[serde(default)]
    auto_install: bool,
}

pub fn upload(request: &Request, ctx: &RouterCtx) -> Result<serde_json::Value, ApiError> {
    let body: UploadBody = request.body_json()?;
    let bytes = BASE64
        .decode(body.content.as_bytes())
        .map_err(|e| ApiError::bad_request(format!("invalid base64 content: {e}")))?;
    ctx.store
        .write_bytes(&body.filename, &bytes)
        .map_err(ApiError::from)?;

    if body.auto_install && ctx.auto_install {
        if let Some(command) = ctx.store.install_command(&body.filename) {
            let id = ctx.supervisor.submit(&command, &Default::default());
            info!(filename = %body.filename, task_id = %id, "auto-install dispatched");
            return Ok(json!({ "success": true, "auto_install": true, "task_id": id }));
        }
    }
    Ok(json!({ "success": true, "auto_install": false }))
}

pub fn download(request: &Request, ctx: &RouterCtx) -> Result<serde_json::Value, ApiError> {
    let bytes = ctx
        .store
        .read_bytes(name_param(request)?)
        .map_err(ApiError::from)?;
    Ok(json!({ "content": BASE64.encode(bytes) }))
}

#[derive(Debug, Deserialize)]
struct DeleteBody {
    filename: String,
}

pub fn delete(request: &Request, ctx: &RouterCtx) -> Result<serde_json::Value, ApiError> {
    let body: DeleteBody = request.body_json()?;
    ctx.store.delete(&body.filename).map_err(ApiError::from)?;
    Ok(json!({ "success": true }))
}

#[derive(Debug, Deserialize)]
struct RenameBody {
    oldname: String,
    newname: String,
}

pub fn rename(request: &Request, ctx: &RouterCtx) -> Result<serde_json::Value, ApiError> {
    let body: RenameBody = request.body_json()?;
    ctx.store
        .rename(&body.oldname, &body.newname)
        .map_err(ApiError::from)?;
    Ok(json!({ "success": true }))
}
