// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::{Duration, Instant};

fn config() -> BreakerConfig {
    BreakerConfig { failure_threshold: 3, window: Duration::from_secs(10), cool_off: Duration::from_secs(5) }
}

#[test]
fn opens_after_threshold_failures_within_window() {
    let mut breaker = Breaker::new(config());
    let now = Instant::now();
    assert!(breaker.allow(now));
    breaker.record_failure(now);
    breaker.record_failure(now);
    assert_eq!(breaker.state(), BreakerState::Closed);
    breaker.record_failure(now);
    assert_eq!(breaker.state(), BreakerState::Open);
    assert!(!breaker.allow(now));
}

#[test]
fn old_failures_fall_outside_window() {
    let mut breaker = Breaker::new(config());
    let t0 = Instant::now();
    breaker.record_failure(t0);
    breaker.record_failure(t0);
    let t1 = t0 + Duration::from_secs(11);
    breaker.record_failure(t1);
    assert_eq!(breaker.state(), BreakerState::Closed);
}

#[test]
fn half_open_probe_allows_one_attempt_then_closes_on_success() {
    let mut breaker = Breaker::new(config());
    let t0 = Instant::now();
    for _ in 0..3 {
        breaker.record_failure(t0);
    }
    assert_eq!(breaker.state(), BreakerState::Open);

    let after_cool_off = t0 + Duration::from_secs(6);
    assert!(breaker.allow(after_cool_off));
    assert_eq!(breaker.state(), BreakerState::HalfOpen);
    assert!(!breaker.allow(after_cool_off), "second concurrent probe must be rejected");

    breaker.record_success();
    assert_eq!(breaker.state(), BreakerState::Closed);
    assert!(breaker.allow(after_cool_off));
}

#[test]
fn half_open_failure_reopens_breaker() {
    let mut breaker = Breaker::new(config());
    let t0 = Instant::now();
    for _ in 0..3 {
        breaker.record_failure(t0);
    }
    let after_cool_off = t0 + Duration::from_secs(6);
    assert!(breaker.allow(after_cool_off));
    breaker.record_failure(after_cool_off);
    assert_eq!(breaker.state(), BreakerState::Open);
}
