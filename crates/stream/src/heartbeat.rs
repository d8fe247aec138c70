// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One heartbeat task per subscriber transport: sends `{type:"ping"}` every
//! `ping_interval` and closes the subscription if the previous ping's pong
//! never arrived within `pong_timeout`.

use crate::subscriber::Subscriber;
use ctlplane_core::Context;
use std::time::Duration;

pub async fn run(subscriber: Subscriber, ctx: Context, ping_interval: Duration, pong_timeout: Duration) {
    let token = ctx.token();
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(ping_interval) => {}
        }
        if subscriber.is_closed() {
            break;
        }
        subscriber.send_ping();
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(pong_timeout) => {
                if subscriber.missed_pong() {
                    tracing::warn!("subscriber missed pong within timeout, closing");
                    subscriber.close();
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
