// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line splitter: reads a child's stdout and stderr concurrently, each in
//! its own task, and merges both into one topic. Modeled on the teacher's
//! `docker/ws.rs` event bridge, which folds a WebSocket read loop and an
//! HTTP poll into a single `event_tx` — here the two producers are stdout
//! and stderr readers instead.
//!
//! Sequence numbers are assigned inside `Topic::publish_line`, not by
//! either reader: the readers only forward raw lines over an `mpsc`
//! channel, and the single task draining that channel is the one place
//! that calls `publish_line`, so the two readers can never race for a
//! sequence number.

use crate::topic::Topic;
use ctlplane_wire::StreamKind;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

struct Line {
    stream: StreamKind,
    payload: String,
}

/// Spawns the stdout/stderr reader tasks plus the merge task that drains
/// them into `topic`. Returns once both readers have hit EOF and the merge
/// task has drained the channel.
pub async fn pump<Out, Err>(topic: Arc<Topic>, stdout: Option<Out>, stderr: Option<Err>)
where
    Out: AsyncRead + Unpin + Send + 'static,
    Err: AsyncRead + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Line>(256);

    let mut readers = Vec::new();
    if let Some(stdout) = stdout {
        readers.push(tokio::spawn(read_lines(stdout, StreamKind::Out, tx.clone())));
    }
    if let Some(stderr) = stderr {
        readers.push(tokio::spawn(read_lines(stderr, StreamKind::Err, tx.clone())));
    }
    drop(tx);

    let merge = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            topic.publish_line(line.stream, line.payload, now_iso8601());
        }
    });

    for reader in readers {
        let _ = reader.await;
    }
    let _ = merge.await;
}

async fn read_lines<R: AsyncRead + Unpin>(reader: R, stream: StreamKind, tx: mpsc::Sender<Line>) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(payload)) => {
                if tx.send(Line { stream, payload }).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(?stream, error = %e, "stream reader error");
                break;
            }
        }
    }
}

fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
