// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::DropPolicy;
use crate::subscriber::SubscriberId;
use ctlplane_wire::{ControlMessage, OutboundMessage};

#[tokio::test]
async fn pings_on_schedule_and_closes_on_missed_pong() {
    let subscriber = Subscriber::new(SubscriberId(1), 8, DropPolicy::Close);
    let ctx = Context::with_timeout(Duration::from_millis(500));
    let task = tokio::spawn(run(subscriber.clone(), ctx, Duration::from_millis(20), Duration::from_millis(40)));

    let OutboundMessage::Control(ControlMessage::Ping) = subscriber.recv().await.expect("ping") else {
        panic!("expected ping")
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(subscriber.is_closed());
    let _ = task.await;
}

#[tokio::test]
async fn pong_before_timeout_keeps_subscriber_open() {
    let subscriber = Subscriber::new(SubscriberId(2), 8, DropPolicy::Close);
    let ctx = Context::with_timeout(Duration::from_millis(120));
    let task = tokio::spawn(run(subscriber.clone(), ctx, Duration::from_millis(20), Duration::from_millis(60)));

    let OutboundMessage::Control(ControlMessage::Ping) = subscriber.recv().await.expect("ping") else {
        panic!("expected ping")
    };
    subscriber.record_pong();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!subscriber.is_closed());
    task.abort();
}
