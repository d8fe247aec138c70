// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ctlplane_wire::{StreamEvent, StreamKind};

fn event(seq: u64) -> OutboundMessage {
    StreamEvent { seq, ts: "t".into(), stream: StreamKind::Out, payload: "x".into(), dropped: None }.into()
}

#[tokio::test]
async fn delivers_messages_in_order() {
    let sub = Subscriber::new(SubscriberId(1), 4, DropPolicy::Close);
    for seq in 0..3 {
        sub.enqueue(event(seq));
    }
    for seq in 0..3 {
        let OutboundMessage::Event(received) = sub.recv().await.expect("message") else { panic!("expected event") };
        assert_eq!(received.seq, seq);
    }
}

#[tokio::test]
async fn close_policy_force_closes_on_overflow() {
    let sub = Subscriber::new(SubscriberId(2), 2, DropPolicy::Close);
    sub.enqueue(event(0));
    sub.enqueue(event(1));
    let outcome = sub.enqueue(event(2));
    assert!(matches!(outcome, EnqueueOutcome::Closed));
    assert!(sub.is_closed());
}

#[tokio::test]
async fn drop_oldest_merges_dropped_count_into_next_event() {
    let sub = Subscriber::new(SubscriberId(3), 2, DropPolicy::DropOldest);
    sub.enqueue(event(0));
    sub.enqueue(event(1));
    sub.enqueue(event(2)); // queue full: evicts seq 0, merges dropped=1 into this event
    sub.enqueue(event(3)); // queue full: evicts seq 1, merges dropped=1 into this event

    let OutboundMessage::Event(first) = sub.recv().await.expect("message") else { panic!("expected event") };
    assert_eq!(first.seq, 2);
    assert_eq!(first.dropped, Some(1));

    let OutboundMessage::Event(second) = sub.recv().await.expect("message") else { panic!("expected event") };
    assert_eq!(second.seq, 3);
    assert_eq!(second.dropped, Some(1));
}

#[tokio::test]
async fn recv_returns_none_after_close_and_drain() {
    let sub = Subscriber::new(SubscriberId(4), 4, DropPolicy::Close);
    sub.enqueue(event(0));
    sub.close();
    assert!(sub.recv().await.is_some());
    assert!(sub.recv().await.is_none());
}
