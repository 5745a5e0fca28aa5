// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request-response wire protocol.
//!
//! A restricted HTTP/1.1 subset: request line, headers including
//! `Content-Length`, blank line, body. The response is always
//! `HTTP/1.1 200 OK` with a JSON body; logical failures are carried in
//! the `{success: false, error}` envelope. No chunked encoding, no
//! keep-alive: one request per connection, then close.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::ApiError;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

/// Maximum size of the request line plus headers.
pub const MAX_HEAD_SIZE: usize = 16 * 1024;

/// Maximum body size (base64 uploads included).
pub const MAX_BODY_SIZE: usize = 32 * 1024 * 1024;

/// Default read/write timeout for one framed message.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client-side connect timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Wire-level errors.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("malformed response: {0}")]
    BadResponse(String),

    #[error("message too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("connection closed")]
    ConnectionClosed,

    #[error("timeout")]
    Timeout,
}

/// A parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query: HashMap::new(),
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Request carrying a JSON body.
    pub fn json(
        method: impl Into<String>,
        path: impl Into<String>,
        body: &serde_json::Value,
    ) -> Result<Self, WireError> {
        let mut request = Self::new(method, path);
        request.body = serde_json::to_vec(body)?;
        request
            .headers
            .insert("content-type".to_string(), "application/json".to_string());
        Ok(request)
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Query parameter by name.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Deserialize the body as JSON.
    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::bad_request(format!("invalid request body: {e}")))
    }

    fn target(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let mut pairs: Vec<_> = self.query.iter().collect();
        pairs.sort();
        let query = pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.path, query)
    }
}

/// Split a request target into path and query pairs.
///
/// Names are restricted to safe characters by the handlers, so no
/// percent-decoding is performed.
fn parse_target(target: &str) -> (String, HashMap<String, String>) {
    let mut query = HashMap::new();
    let (path, raw_query) = match target.split_once('?') {
        Some((p, q)) => (p, q),
        None => (target, ""),
    };
    for pair in raw_query.split('&').filter(|p| !p.is_empty()) {
        match pair.split_once('=') {
            Some((k, v)) => query.insert(k.to_string(), v.to_string()),
            None => query.insert(pair.to_string(), String::new()),
        };
    }
    (path.to_string(), query)
}

/// Read head lines (request/status line plus headers) up to the blank
/// separator line, enforcing [`MAX_HEAD_SIZE`].
async fn read_head<R: tokio::io::AsyncBufRead + Unpin>(
    reader: &mut R,
) -> Result<Vec<String>, WireError> {
    let mut lines = Vec::new();
    let mut total = 0usize;
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            if lines.is_empty() {
                return Err(WireError::ConnectionClosed);
            }
            return Err(WireError::BadRequest("truncated head".to_string()));
        }
        total += n;
        if total > MAX_HEAD_SIZE {
            return Err(WireError::TooLarge {
                size: total,
                max: MAX_HEAD_SIZE,
            });
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            return Ok(lines);
        }
        lines.push(trimmed.to_string());
    }
}

fn parse_headers(lines: &[String]) -> Result<HashMap<String, String>, WireError> {
    let mut headers = HashMap::new();
    for line in lines {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| WireError::BadRequest(format!("bad header line: {line}")))?;
        headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
    }
    Ok(headers)
}

fn content_length(headers: &HashMap<String, String>) -> Result<usize, WireError> {
    let Some(raw) = headers.get("content-length") else {
        return Ok(0);
    };
    let len: usize = raw
        .parse()
        .map_err(|_| WireError::BadRequest(format!("bad content-length: {raw}")))?;
    if len > MAX_BODY_SIZE {
        return Err(WireError::TooLarge {
            size: len,
            max: MAX_BODY_SIZE,
        });
    }
    Ok(len)
}

async fn read_request_inner<R: tokio::io::AsyncRead + Unpin>(
    reader: R,
) -> Result<Request, WireError> {
    let mut reader = BufReader::new(reader);
    let lines = read_head(&mut reader).await?;
    let Some(request_line) = lines.first() else {
        return Err(WireError::BadRequest("empty request".to_string()));
    };

    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| WireError::BadRequest("missing method".to_string()))?;
    let target = parts
        .next()
        .ok_or_else(|| WireError::BadRequest("missing path".to_string()))?;

    let headers = parse_headers(&lines[1..])?;
    let len = content_length(&headers)?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    let (path, query) = parse_target(target);
    Ok(Request {
        method: method.to_ascii_uppercase(),
        path,
        query,
        headers,
        body,
    })
}

/// Read one request with a deadline.
pub async fn read_request<R: tokio::io::AsyncRead + Unpin>(
    reader: R,
    timeout: Duration,
) -> Result<Request, WireError> {
    tokio::time::timeout(timeout, read_request_inner(reader))
        .await
        .map_err(|_| WireError::Timeout)?
}

/// Write one request with a deadline.
pub async fn write_request<W: tokio::io::AsyncWrite + Unpin>(
    mut writer: W,
    request: &Request,
    timeout: Duration,
) -> Result<(), WireError> {
    let head = format!(
        "{} {} HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
        request.method,
        request.target(),
        request.body.len()
    );
    tokio::time::timeout(timeout, async {
        writer.write_all(head.as_bytes()).await?;
        writer.write_all(&request.body).await?;
        writer.flush().await?;
        Ok::<(), std::io::Error>(())
    })
    .await
    .map_err(|_| WireError::Timeout)??;
    Ok(())
}

/// Write the always-200 JSON response with a deadline.
pub async fn write_json<W: tokio::io::AsyncWrite + Unpin>(
    mut writer: W,
    body: &serde_json::Value,
    timeout: Duration,
) -> Result<(), WireError> {
    let payload = serde_json::to_vec(body)?;
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
        payload.len()
    );
    tokio::time::timeout(timeout, async {
        writer.write_all(head.as_bytes()).await?;
        writer.write_all(&payload).await?;
        writer.flush().await?;
        Ok::<(), std::io::Error>(())
    })
    .await
    .map_err(|_| WireError::Timeout)??;
    Ok(())
}

async fn read_response_inner<R: tokio::io::AsyncRead + Unpin>(
    reader: R,
) -> Result<serde_json::Value, WireError> {
    let mut reader = BufReader::new(reader);
    let lines = read_head(&mut reader).await?;
    let Some(status_line) = lines.first() else {
        return Err(WireError::BadResponse("empty response".to_string()));
    };
    if !status_line.starts_with("HTTP/1.1") {
        return Err(WireError::BadResponse(format!(
            "bad status line: {status_line}"
        )));
    }

    let headers = parse_headers(&lines[1..])?;
    let len = content_length(&headers)?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Read one JSON response with a deadline.
pub async fn read_response<R: tokio::io::AsyncRead + Unpin>(
    reader: R,
    timeout: Duration,
) -> Result<serde_json::Value, WireError> {
    tokio::time::timeout(timeout, read_response_inner(reader))
        .await
        .map_err(|_| WireError::Timeout)?
}

/// The `{success: false, error}` envelope for a handler failure.
pub fn error_body(err: &ApiError) -> serde_json::Value {
    serde_json::json!({
        "success": false,
        "error": err.message,
    })
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
