// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket delivery loop for one subscriber. Drains the subscriber's
//! queue to outbound text frames and forwards inbound `pong` control
//! frames back into the subscriber's heartbeat state. The HTTP/WS
//! handshake itself is out of scope here; callers hand this an already
//! accepted `WebSocketStream`.

use crate::subscriber::Subscriber;
use ctlplane_wire::ControlMessage;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// Runs until the subscriber closes or the socket errors out. Both the
/// outbound drain and the inbound pong-read happen concurrently via
/// `tokio::select!`, the same merge-two-sources idiom used for stdout and
/// stderr in `parser::pump`.
pub async fn serve<S>(mut socket: WebSocketStream<S>, subscriber: Subscriber)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            outbound = subscriber.recv() => {
                let Some(message) = outbound else { break };
                let Ok(text) = serde_json::to_string(&message) else { continue };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    subscriber.close();
                    break;
                }
            }
            inbound = socket.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => handle_inbound(&subscriber, &text),
                    Some(Ok(Message::Close(_))) | None => {
                        subscriber.close();
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "stream transport read error");
                        subscriber.close();
                        break;
                    }
                    _ => {}
                }
            }
        }
    }
    let _ = socket.close(None).await;
}

fn handle_inbound(subscriber: &Subscriber, text: &str) {
    match serde_json::from_str::<ControlMessage>(text) {
        Ok(ControlMessage::Pong) => subscriber.record_pong(),
        Ok(_) | Err(_) => {}
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
