// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ctlplane_wire::StreamKind;

fn event(seq: u64, payload: &str) -> Event {
    Event { seq, stream: StreamKind::Out, ts: "t".into(), payload: payload.into() }
}

#[test]
fn since_returns_events_strictly_after_seq() {
    let mut ring = RingBuffer::new(100, 1_000_000);
    for seq in 0..5 {
        ring.push(event(seq, "x"));
    }
    let tail = ring.since(3);
    assert_eq!(tail.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![4]);
}

#[test]
fn evicts_oldest_once_event_count_exceeds_capacity() {
    let mut ring = RingBuffer::new(3, 1_000_000);
    for seq in 0..5 {
        ring.push(event(seq, "x"));
    }
    assert_eq!(ring.len(), 3);
    assert_eq!(ring.oldest_seq(), Some(2));
}

#[test]
fn evicts_oldest_once_byte_budget_exceeded() {
    // Each event's approx_size is payload.len() + ts.len() + 16; "x" -> 18 bytes.
    let mut ring = RingBuffer::new(1_000, 40);
    for seq in 0..5 {
        ring.push(event(seq, "x"));
    }
    assert_eq!(ring.len(), 2);
    assert_eq!(ring.oldest_seq(), Some(3));
}
