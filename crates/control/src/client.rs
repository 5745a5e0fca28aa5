// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request-response client for talking to agents.
//!
//! [`AgentApi`] is the seam the fleet model and joint executor are
//! written against; [`HttpAgentApi`] is the real transport. Every call
//! opens one connection, sends one framed request, reads one JSON
//! response, and closes — with a 2 s connect deadline and a 5 s read
//! deadline, mapped to [`ClientError::Timeout`] rather than hanging.

use std::collections::HashMap;

use async_trait::async_trait;
use muster_core::wire::{self, Request, CONNECT_TIMEOUT, DEFAULT_TIMEOUT};
use muster_core::{AgentEndpoint, StatsSnapshot, TaskId, TaskSnapshot, WireError};
use thiserror::Error;
use tokio::net::TcpStream;

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connect timeout")]
    ConnectTimeout,

    #[error("request timeout")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Wire(WireError),

    #[error("agent error: {0}")]
    Rejected(String),

    #[error("unexpected response shape: {0}")]
    UnexpectedResponse(String),
}

impl From<WireError> for ClientError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Timeout => ClientError::Timeout,
            other => ClientError::Wire(other),
        }
    }
}

/// The agent operations the controller core needs.
#[async_trait]
pub trait AgentApi: Send + Sync {
    async fn exec(
        &self,
        agent: &AgentEndpoint,
        cmd: &str,
        env: &HashMap<String, String>,
    ) -> Result<TaskId, ClientError>;

    async fn tasks(&self, agent: &AgentEndpoint) -> Result<Vec<TaskSnapshot>, ClientError>;

    async fn logs(&self, agent: &AgentEndpoint, id: TaskId) -> Result<String, ClientError>;

    async fn kill(&self, agent: &AgentEndpoint, id: TaskId) -> Result<(), ClientError>;

    async fn stats(&self, agent: &AgentEndpoint) -> Result<StatsSnapshot, ClientError>;

    async fn hostname(&self, agent: &AgentEndpoint) -> Result<String, ClientError>;
}

/// Real transport over the restricted HTTP/1.1 wire.
#[derive(Debug, Clone, Default)]
pub struct HttpAgentApi;

impl HttpAgentApi {
    pub fn new() -> Self {
        Self
    }

    /// One request-response exchange with an agent.
    async fn request(
        &self,
        agent: &AgentEndpoint,
        request: Request,
    ) -> Result<serde_json::Value, ClientError> {
        let addr = (agent.ip.as_str(), agent.port);
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| ClientError::ConnectTimeout)??;
        let (reader, writer) = stream.into_split();

        wire::write_request(writer, &request, DEFAULT_TIMEOUT).await?;
        let body = wire::read_response(reader, DEFAULT_TIMEOUT).await?;

        if body.get("success").and_then(|v| v.as_bool()) == Some(false) {
            let message = body
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error")
                .to_string();
            return Err(ClientError::Rejected(message));
        }
        Ok(body)
    }

    async fn get(
        &self,
        agent: &AgentEndpoint,
        path: &str,
    ) -> Result<serde_json::Value, ClientError> {
        self.request(agent, Request::new("GET", path)).await
    }

    async fn post(
        &self,
        agent: &AgentEndpoint,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ClientError> {
        self.request(agent, Request::json("POST", path, body)?).await
    }

    fn field<T, F>(value: &serde_json::Value, name: &str, pick: F) -> Result<T, ClientError>
    where
        F: FnOnce(&serde_json::Value) -> Option<T>,
    {
        value
            .get(name)
            .and_then(pick)
            .ok_or_else(|| ClientError::UnexpectedResponse(format!("missing field {name}")))
    }

    // File helpers used by the view layer (not part of the core seam).

    pub async fn file_list(
        &self,
        agent: &AgentEndpoint,
    ) -> Result<Vec<serde_json::Value>, ClientError> {
        let body = self.get(agent, "/files/list").await?;
        Self::field(&body, "files", |v| v.as_array().cloned())
    }

    pub async fn file_write(
        &self,
        agent: &AgentEndpoint,
        filename: &str,
        content: &str,
    ) -> Result<(), ClientError> {
        self.post(
            agent,
            "/files/write",
            &serde_json::json!({"filename": filename, "content": content}),
        )
        .await?;
        Ok(())
    }

    pub async fn file_read(
        &self,
        agent: &AgentEndpoint,
        name: &str,
    ) -> Result<String, ClientError> {
        let body = self
            .request(agent, Request::new("GET", "/files/read").with_param("name", name))
            .await?;
        Self::field(&body, "content", |v| v.as_str().map(String::from))
    }
}

#[async_trait]
impl AgentApi for HttpAgentApi {
    async fn exec(
        &self,
        agent: &AgentEndpoint,
        cmd: &str,
        env: &HashMap<String, String>,
    ) -> Result<TaskId, ClientError> {
        let body = self
            .post(agent, "/exec", &serde_json::json!({"cmd": cmd, "env": env}))
            .await?;
        let id = Self::field(&body, "task_id", |v| v.as_u64())?;
        Ok(TaskId::new(id))
    }

    async fn tasks(&self, agent: &AgentEndpoint) -> Result<Vec<TaskSnapshot>, ClientError> {
        let body = self.get(agent, "/tasks").await?;
        serde_json::from_value(body)
            .map_err(|e| ClientError::UnexpectedResponse(format!("bad task listing: {e}")))
    }

    async fn logs(&self, agent: &AgentEndpoint, id: TaskId) -> Result<String, ClientError> {
        let body = self
            .request(
                agent,
                Request::new("GET", "/logs").with_param("id", id.to_string()),
            )
            .await?;
        Self::field(&body, "logs", |v| v.as_str().map(String::from))
    }

    async fn kill(&self, agent: &AgentEndpoint, id: TaskId) -> Result<(), ClientError> {
        self.request(
            agent,
            Request::json("POST", "/kill", &serde_json::json!({}))?
                .with_param("id", id.to_string()),
        )
        .await?;
        Ok(())
    }

    async fn stats(&self, agent: &AgentEndpoint) -> Result<StatsSnapshot, ClientError> {
        let body = self.get(agent, "/stats").await?;
        serde_json::from_value(body)
            .map_err(|e| ClientError::UnexpectedResponse(format!("bad stats: {e}")))
    }

    async fn hostname(&self, agent: &AgentEndpoint) -> Result<String, ClientError> {
        let body = self.get(agent, "/hostname").await?;
        Self::field(&body, "hostname", |v| v.as_str().map(String::from))
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
