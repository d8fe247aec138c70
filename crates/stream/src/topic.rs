// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One topic per task: owns the replay ring and the fan-out set of
//! subscribers. Both live behind a single `parking_lot::Mutex` so the
//! three-step subscribe protocol (lock, seed from the ring, register) is
//! atomic with respect to concurrently published events.

use crate::config::HubConfig;
use crate::event::Event;
use crate::ring::RingBuffer;
use crate::subscriber::{EnqueueOutcome, Subscriber, SubscriberId};
use ctlplane_core::TaskId;
use ctlplane_wire::{ControlMessage, OutboundMessage, StreamKind, TerminalStatus};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

struct Inner {
    ring: RingBuffer,
    subscribers: Vec<Subscriber>,
    closed: bool,
    terminal: Option<OutboundMessage>,
}

pub struct Topic {
    pub id: TaskId,
    config: HubConfig,
    next_seq: AtomicU64,
    next_subscriber_id: AtomicU64,
    inner: Mutex<Inner>,
}

impl Topic {
    pub fn new(id: TaskId, config: HubConfig) -> Self {
        Self {
            id,
            config,
            next_seq: AtomicU64::new(1),
            next_subscriber_id: AtomicU64::new(0),
            inner: Mutex::new(Inner {
                ring: RingBuffer::new(config.ring_capacity, config.ring_byte_limit),
                subscribers: Vec::new(),
                closed: false,
                terminal: None,
            }),
        }
    }

    /// Assigns the next sequence number and fans the line out to every
    /// registered subscriber. The single caller that drains the merged
    /// stdout/stderr ingest channel is the only writer, so sequence
    /// assignment here is race-free even though two reader tasks feed it.
    pub fn publish_line(&self, stream: StreamKind, payload: String, ts: String) {
        let seq = self.next_seq.fetch_add(1, Ordering::AcqRel);
        let event = Event { seq, stream, ts, payload };
        let message: OutboundMessage = event.to_wire(None).into();
        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }
        inner.ring.push(event);
        inner.subscribers.retain(|sub| !matches!(sub.enqueue(message.clone()), EnqueueOutcome::Closed));
    }

    pub fn subscribe(&self, since_seq: Option<u64>) -> Subscriber {
        let mut inner = self.inner.lock();
        let id = SubscriberId(self.next_subscriber_id.fetch_add(1, Ordering::AcqRel));
        let subscriber = Subscriber::new(id, self.config.subscriber_queue, self.config.drop_policy);
        // Sequence numbers are 1-based and `since` is exclusive, so 0 means
        // "replay everything still held" without needing `oldest_seq`.
        let from = since_seq.unwrap_or(0);
        for event in inner.ring.since(from) {
            subscriber.enqueue(event.to_wire(None).into());
        }
        if let Some(terminal) = inner.terminal.clone() {
            subscriber.enqueue(terminal);
        } else {
            inner.subscribers.push(subscriber.clone());
        }
        subscriber
    }

    pub fn close(&self, status: TerminalStatus, exit_code: Option<i32>, reason: Option<String>) {
        let terminal: OutboundMessage = ControlMessage::Terminal { status, exit_code, reason }.into();
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.terminal = Some(terminal.clone());
        for subscriber in inner.subscribers.drain(..) {
            subscriber.enqueue(terminal.clone());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

#[cfg(test)]
#[path = "topic_tests.rs"]
mod tests;
