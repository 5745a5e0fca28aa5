// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request router.
//!
//! Accepts request-response connections, parses one framed request per
//! connection, dispatches it to a handler, and always answers with a
//! well-formed JSON body. Handler failures become the error envelope;
//! nothing unwinds past [`handle_connection`].

mod files;
mod system;
mod tasks;

use std::sync::Arc;

use muster_core::{wire, ApiError, Clock, StatsSnapshot, WireError};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, warn};

use crate::storage::FileStore;
use crate::supervisor::TaskSupervisor;

/// Shared agent context for all request handlers.
pub struct RouterCtx {
    pub supervisor: Arc<TaskSupervisor>,
    pub latest_stats: Arc<Mutex<StatsSnapshot>>,
    pub store: FileStore,
    pub hostname: String,
    pub auto_install: bool,
    pub clock: Arc<dyn Clock>,
}

/// Accept loop for the request-response port.
pub struct Router {
    listener: TcpListener,
    ctx: Arc<RouterCtx>,
}

impl Router {
    pub fn new(listener: TcpListener, ctx: Arc<RouterCtx>) -> Self {
        Self { listener, ctx }
    }

    /// Run until the task is aborted, spawning one task per connection.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &ctx).await {
                            match e {
                                WireError::ConnectionClosed => debug!("client disconnected"),
                                WireError::Timeout => warn!("connection timeout"),
                                _ => error!("connection error: {}", e),
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection: one request, one response, close.
async fn handle_connection(stream: TcpStream, ctx: &RouterCtx) -> Result<(), WireError> {
    let (reader, writer) = stream.into_split();

    let request = wire::read_request(reader, wire::DEFAULT_TIMEOUT).await?;

    // Log polls at debug level (frequent), mutations at info.
    if request.method == "GET" {
        debug!(method = %request.method, path = %request.path, "received request");
    } else {
        tracing::info!(method = %request.method, path = %request.path, "received request");
    }

    let body = match dispatch(&request, ctx).await {
        Ok(body) => body,
        Err(e) => {
            warn!(path = %request.path, kind = %e.kind, error = %e, "request failed");
            wire::error_body(&e)
        }
    };

    wire::write_json(writer, &body, wire::DEFAULT_TIMEOUT).await
}

/// Route one request to its handler.
async fn dispatch(request: &wire::Request, ctx: &RouterCtx) -> Result<serde_json::Value, ApiError> {
    match (request.method.as_str(), request.path.as_str()) {
        ("POST", "/exec") => tasks::exec(request, ctx),
        ("GET", "/tasks") => tasks::list(ctx),
        ("GET", "/logs") => tasks::logs(request, ctx),
        ("POST", "/kill") => tasks::kill(request, ctx),
        ("GET", "/stats") => tasks::stats(ctx),
        ("GET", "/hostname") => tasks::hostname(ctx),

        ("GET", "/files/list") => files::list(ctx),
        ("GET", "/files/read") => files::read(request, ctx),
        ("POST", "/files/write") => files::write(request, ctx),
        ("POST", "/files/upload") => files::upload(request, ctx),
        ("GET", "/files/download") => files::download(request, ctx),
        ("POST", "/files/delete") => files::delete(request, ctx),
        ("POST", "/files/rename") => files::rename(request, ctx),

        (_, path) if path.starts_with("/system/") => system::dispatch(request, ctx).await,

        (method, path) => Err(ApiError::not_found(format!("unknown route {method} {path}"))),
    }
}

#[cfg(test)]
#[path = "../router_tests.rs"]
mod tests;
