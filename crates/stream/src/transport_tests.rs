// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::DropPolicy;
use crate::subscriber::SubscriberId;
use ctlplane_wire::{StreamEvent, StreamKind};
use tokio_tungstenite::tungstenite::protocol::Role;

#[tokio::test]
async fn serve_forwards_queued_events_as_text_frames_and_applies_pongs() {
    let (client_io, server_io) = tokio::io::duplex(8192);
    let server_socket = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
    let mut client_socket = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;

    let subscriber = Subscriber::new(SubscriberId(1), 8, DropPolicy::Close);
    subscriber.enqueue(
        StreamEvent { seq: 0, ts: "t".into(), stream: StreamKind::Out, payload: "hi".into(), dropped: None }.into(),
    );
    subscriber.send_ping();
    assert!(subscriber.missed_pong());

    let driver = tokio::spawn(serve(server_socket, subscriber.clone()));

    let first = client_socket.next().await.expect("frame").expect("ok");
    let Message::Text(text) = first else { panic!("expected text frame") };
    let parsed: serde_json::Value = serde_json::from_str(&text).expect("json");
    assert_eq!(parsed["payload"], "hi");

    let second = client_socket.next().await.expect("frame").expect("ok");
    let Message::Text(text) = second else { panic!("expected text frame") };
    assert_eq!(text, "{\"type\":\"ping\"}");

    client_socket.send(Message::Text("{\"type\":\"pong\"}".into())).await.expect("send pong");
    // Give the server loop a moment to process the inbound pong, then close.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(!subscriber.missed_pong());

    subscriber.close();
    let _ = driver.await;
}
