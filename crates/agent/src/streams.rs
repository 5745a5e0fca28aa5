// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream hub: the four WebSocket broadcast channels.
//!
//! Each channel owns a set of client connections. Every accepted client
//! gets a writer task draining an unbounded queue into the WebSocket
//! sink, so [`StreamHub::broadcast`] only holds the connection-set lock
//! long enough to snapshot the senders; the actual socket writes happen
//! on the per-client writer tasks.
//!
//! Within one channel and one client, frames are delivered in broadcast
//! order. Across channels or clients there is no ordering guarantee.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use muster_core::{Channel, Clock, StreamEvent};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, warn};

struct ChannelState {
    conns: Mutex<HashMap<u64, mpsc::UnboundedSender<Message>>>,
}

/// Process-scoped hub over the four stream channels.
pub struct StreamHub {
    channels: [ChannelState; 4],
    next_conn_id: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl StreamHub {
    pub fn new(clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            channels: [
                ChannelState {
                    conns: Mutex::new(HashMap::new()),
                },
                ChannelState {
                    conns: Mutex::new(HashMap::new()),
                },
                ChannelState {
                    conns: Mutex::new(HashMap::new()),
                },
                ChannelState {
                    conns: Mutex::new(HashMap::new()),
                },
            ],
            next_conn_id: AtomicU64::new(1),
            clock,
        })
    }

    fn state(&self, channel: Channel) -> &ChannelState {
        &self.channels[channel.index()]
    }

    /// Send an event to every client of `channel`.
    ///
    /// Clients whose queue is gone are dropped from the set.
    pub fn broadcast(&self, channel: Channel, event: &StreamEvent) {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "failed to encode stream event");
                return;
            }
        };

        let senders: Vec<(u64, mpsc::UnboundedSender<Message>)> = {
            let conns = self.state(channel).conns.lock();
            conns.iter().map(|(id, tx)| (*id, tx.clone())).collect()
        };

        let mut dead = Vec::new();
        for (id, tx) in senders {
            if tx.send(Message::text(text.clone())).is_err() {
                dead.push(id);
            }
        }
        if !dead.is_empty() {
            let mut conns = self.state(channel).conns.lock();
            for id in dead {
                conns.remove(&id);
            }
        }
    }

    /// Send an event to one client of `channel` (used for pong).
    pub fn send_to(&self, channel: Channel, conn_id: u64, event: &StreamEvent) {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "failed to encode stream event");
                return;
            }
        };
        let sender = {
            let conns = self.state(channel).conns.lock();
            conns.get(&conn_id).cloned()
        };
        if let Some(tx) = sender {
            let _ = tx.send(Message::text(text));
        }
    }

    /// Register a connection, returning its id and the frame queue the
    /// writer task drains. Also used directly by tests to observe
    /// broadcasts without a real socket.
    pub fn register(&self, channel: Channel) -> (u64, mpsc::UnboundedReceiver<Message>) {
        let id = self.next_conn_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.state(channel).conns.lock().insert(id, tx);
        (id, rx)
    }

    pub fn unregister(&self, channel: Channel, conn_id: u64) {
        self.state(channel).conns.lock().remove(&conn_id);
    }

    pub fn connection_count(&self, channel: Channel) -> usize {
        self.state(channel).conns.lock().len()
    }

    /// Accept loop for one channel's listener. Runs until the listener
    /// is dropped (task aborted at shutdown).
    pub async fn serve(self: Arc<Self>, channel: Channel, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let hub = Arc::clone(&self);
                    tokio::spawn(async move {
                        handle_stream_client(hub, channel, stream, peer.to_string()).await;
                    });
                }
                Err(e) => {
                    error!(channel = %channel, error = %e, "stream accept error");
                }
            }
        }
    }
}

/// Upgrade one TCP connection to WebSocket and pump it until close.
async fn handle_stream_client(
    hub: Arc<StreamHub>,
    channel: Channel,
    stream: TcpStream,
    peer: String,
) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(channel = %channel, peer, error = %e, "websocket handshake failed");
            return;
        }
    };

    let (conn_id, mut queue) = hub.register(channel);
    debug!(
        channel = %channel,
        peer,
        clients = hub.connection_count(channel),
        "stream client connected"
    );

    let (mut sink, mut source) = ws.split();

    // Writer: drains the broadcast queue. Exits when the connection is
    // unregistered (sender dropped) or the socket write fails.
    let writer = tokio::spawn(async move {
        while let Some(frame) = queue.recv().await {
            if sink.send(frame).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Reader: answers pings, ignores everything else.
    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<StreamEvent>(text.as_ref()) {
                Ok(StreamEvent::Ping) => {
                    let pong = StreamEvent::Pong {
                        timestamp: hub.clock.now_ms(),
                    };
                    hub.send_to(channel, conn_id, &pong);
                }
                Ok(other) => debug!(channel = %channel, kind = other.kind(), "ignoring inbound event"),
                Err(_) => debug!(channel = %channel, "ignoring unparseable frame"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(channel = %channel, peer, error = %e, "stream read error");
                break;
            }
        }
    }

    hub.unregister(channel, conn_id);
    writer.abort();
    debug!(
        channel = %channel,
        peer,
        clients = hub.connection_count(channel),
        "stream client disconnected"
    );
}

#[cfg(test)]
#[path = "streams_tests.rs"]
mod tests;
