// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

async fn start_responder() -> std::net::SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let responder = DiscoveryResponder::new(socket, "testhost", &PortPlan::from_base(2030));
    tokio::spawn(responder.run());
    addr
}

#[tokio::test]
async fn probe_gets_server_response() {
    let addr = start_responder().await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    client.send_to(DISCOVER_PROBE.as_bytes(), addr).await.unwrap();

    let mut buf = [0u8; 1024];
    let (len, from) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
        .await
        .expect("no discovery reply")
        .unwrap();
    assert_eq!(from, addr);

    let reply: DiscoveryReply = serde_json::from_slice(&buf[..len]).unwrap();
    assert!(reply.is_valid());
    assert_eq!(reply.hostname, "testhost");
    assert_eq!(reply.port, 2030);
    assert_eq!(reply.ws_desktop, 2043);
}

#[tokio::test]
async fn non_probe_datagrams_are_dropped() {
    let addr = start_responder().await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    client.send_to(b"HELLO_THERE", addr).await.unwrap();
    // A prefix of the probe is still not the probe.
    client.send_to(b"DISCOVER_SERV", addr).await.unwrap();

    let mut buf = [0u8; 1024];
    let outcome =
        tokio::time::timeout(Duration::from_millis(200), client.recv_from(&mut buf)).await;
    assert!(outcome.is_err(), "responder must stay silent");

    // The socket is still alive for real probes afterwards.
    client.send_to(DISCOVER_PROBE.as_bytes(), addr).await.unwrap();
    let (len, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
        .await
        .expect("responder died after bad datagram")
        .unwrap();
    assert!(len > 0);
}
