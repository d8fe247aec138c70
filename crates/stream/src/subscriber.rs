// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A subscriber's outbound queue. Plain `VecDeque` behind a `parking_lot::Mutex`
//! plus a `tokio::sync::Notify`, not a `tokio::sync::mpsc::Sender` — `drop_oldest`
//! needs to evict from the front of an already-full queue, which an mpsc channel
//! cannot do.

use crate::config::DropPolicy;
use ctlplane_wire::{ControlMessage, OutboundMessage};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

struct Inner {
    queue: Mutex<VecDeque<OutboundMessage>>,
    notify: Notify,
    closed: AtomicBool,
    pending_drops: AtomicU64,
    capacity: usize,
    drop_policy: DropPolicy,
    awaiting_pong: AtomicBool,
}

/// Handle shared between the hub (enqueue side) and the transport (drain side).
#[derive(Clone)]
pub struct Subscriber {
    pub id: SubscriberId,
    inner: Arc<Inner>,
}

pub enum EnqueueOutcome {
    Delivered,
    Closed,
}

impl Subscriber {
    pub fn new(id: SubscriberId, capacity: usize, drop_policy: DropPolicy) -> Self {
        Self {
            id,
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                closed: AtomicBool::new(false),
                pending_drops: AtomicU64::new(0),
                capacity,
                drop_policy,
                awaiting_pong: AtomicBool::new(false),
            }),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Non-blocking enqueue. Never blocks the producer: on overflow it either
    /// evicts the oldest queued message (merging the count into the next
    /// event it delivers) or force-closes the subscriber.
    pub fn enqueue(&self, message: OutboundMessage) -> EnqueueOutcome {
        if self.is_closed() {
            return EnqueueOutcome::Closed;
        }
        let mut queue = self.inner.queue.lock();
        if queue.len() >= self.inner.capacity {
            match self.inner.drop_policy {
                DropPolicy::DropOldest => {
                    queue.pop_front();
                    self.inner.pending_drops.fetch_add(1, Ordering::AcqRel);
                }
                DropPolicy::Close => {
                    drop(queue);
                    self.close();
                    return EnqueueOutcome::Closed;
                }
            }
        }
        let message = self.merge_pending_drops(message);
        queue.push_back(message);
        drop(queue);
        self.inner.notify.notify_one();
        EnqueueOutcome::Delivered
    }

    fn merge_pending_drops(&self, message: OutboundMessage) -> OutboundMessage {
        let pending = self.inner.pending_drops.swap(0, Ordering::AcqRel);
        if pending == 0 {
            return message;
        }
        match message {
            OutboundMessage::Event(mut event) => {
                event.dropped = Some(event.dropped.unwrap_or(0) + pending);
                OutboundMessage::Event(event)
            }
            // Control messages carry no dropped count; restore the pending
            // total so the next event still reports it.
            other => {
                self.inner.pending_drops.fetch_add(pending, Ordering::AcqRel);
                other
            }
        }
    }

    pub async fn recv(&self) -> Option<OutboundMessage> {
        loop {
            {
                let mut queue = self.inner.queue.lock();
                if let Some(message) = queue.pop_front() {
                    return Some(message);
                }
                if self.is_closed() {
                    return None;
                }
            }
            self.inner.notify.notified().await;
        }
    }

    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn send_ping(&self) {
        self.inner.awaiting_pong.store(true, Ordering::Release);
        self.enqueue(OutboundMessage::Control(ControlMessage::Ping));
    }

    pub fn record_pong(&self) {
        self.inner.awaiting_pong.store(false, Ordering::Release);
    }

    pub fn missed_pong(&self) -> bool {
        self.inner.awaiting_pong.load(Ordering::Acquire)
    }
}

#[cfg(test)]
#[path = "subscriber_tests.rs"]
mod tests;
