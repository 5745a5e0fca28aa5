// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream channel subscriber.
//!
//! Connects to one of an agent's WebSocket channels and forwards its
//! events into an mpsc queue the view can drain. Unparseable frames are
//! dropped; the queue closes when the agent side goes away.

use muster_core::{AgentEndpoint, Channel, StreamEvent};
use futures_util::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("websocket connect failed: {0}")]
    Connect(String),
}

/// Subscribe to `channel` on `agent`; events arrive on the returned
/// queue until the connection drops.
pub async fn subscribe(
    agent: &AgentEndpoint,
    channel: Channel,
) -> Result<mpsc::UnboundedReceiver<StreamEvent>, StreamError> {
    let url = format!("ws://{}:{}", agent.ip, agent.channel_port(channel));
    let (ws, _) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| StreamError::Connect(e.to_string()))?;

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let (_sink, mut source) = ws.split();
        while let Some(frame) = source.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<StreamEvent>(text.as_ref()) {
                        Ok(event) => {
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(e) => debug!(error = %e, "dropping unparseable stream frame"),
                    }
                }
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    Ok(rx)
}
