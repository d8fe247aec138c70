// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Victim selection when the pool is full and a new slot is needed: which
//! busy slot to wait on for release. Mirrors the teacher's routing pattern
//! of recording one decision per call against the current candidate set.

use crate::config::LoadBalancingStrategy;
use crate::slot::{Slot, SlotId};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Picks a victim slot from `candidates` (all currently busy, all bound to
/// the requested workspace) to wait on for release.
pub trait LoadBalancer: Send + Sync {
    fn select<'a>(&self, candidates: &'a [&'a Slot]) -> Option<&'a Slot>;
}

#[derive(Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl LoadBalancer for RoundRobin {
    fn select<'a>(&self, candidates: &'a [&'a Slot]) -> Option<&'a Slot> {
        if candidates.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
        Some(candidates[index])
    }
}

#[derive(Default)]
pub struct LeastConnections;

impl LoadBalancer for LeastConnections {
    fn select<'a>(&self, candidates: &'a [&'a Slot]) -> Option<&'a Slot> {
        candidates.iter().copied().min_by_key(|slot| slot.busy_count_since_start)
    }
}

/// Weighted round robin where the weight is the inverse of lifetime busy
/// count plus one, so lightly used slots are favored without starving
/// heavily used ones entirely.
#[derive(Default)]
pub struct WeightedRoundRobin {
    cursor: AtomicUsize,
}

impl LoadBalancer for WeightedRoundRobin {
    fn select<'a>(&self, candidates: &'a [&'a Slot]) -> Option<&'a Slot> {
        if candidates.is_empty() {
            return None;
        }
        let weights: Vec<u64> = candidates.iter().map(|s| 1 + 1_000 / (1 + s.busy_count_since_start)).collect();
        let total: u64 = weights.iter().sum();
        if total == 0 {
            return candidates.first().copied();
        }
        let offset = self.cursor.fetch_add(1, Ordering::Relaxed) as u64 % total;
        let mut acc = 0u64;
        for (slot, weight) in candidates.iter().zip(weights.iter()) {
            acc += weight;
            if offset < acc {
                return Some(slot);
            }
        }
        candidates.last().copied()
    }
}

pub fn build(strategy: LoadBalancingStrategy) -> Box<dyn LoadBalancer> {
    match strategy {
        LoadBalancingStrategy::RoundRobin => Box::new(RoundRobin::default()),
        LoadBalancingStrategy::LeastConnections => Box::new(LeastConnections),
        LoadBalancingStrategy::WeightedRoundRobin => Box::new(WeightedRoundRobin::default()),
    }
}

/// Find the least-recently-used idle slot among `slots` matching `predicate`.
pub fn least_recently_used_idle<'a>(
    slots: impl Iterator<Item = &'a Slot>,
) -> Option<SlotId> {
    slots.min_by_key(|slot| slot.last_used).map(|slot| slot.id)
}

#[cfg(test)]
#[path = "balancer_tests.rs"]
mod tests;
