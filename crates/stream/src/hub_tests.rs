// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ctlplane_core::TaskId;
use ctlplane_wire::OutboundMessage;

#[test]
fn subscribe_without_a_topic_fails_not_found() {
    let hub = Hub::new(HubConfig::default());
    let err = hub.subscribe(TaskId::new(), None).unwrap_err();
    assert_eq!(err.kind, ctlplane_core::ErrorKind::NotFound);
}

#[tokio::test]
async fn publish_and_subscribe_round_trip_through_the_hub() {
    let hub = Hub::new(HubConfig::default());
    let task_id = TaskId::new();
    hub.create_topic(task_id);
    let sub = hub.subscribe(task_id, None).expect("subscribed");
    hub.publish_line(task_id, StreamKind::Out, "hi".into(), "t".into());

    let OutboundMessage::Event(event) = sub.recv().await.expect("event") else { panic!("expected event") };
    assert_eq!(event.payload, "hi");
}

#[tokio::test]
async fn close_topic_still_allows_late_subscribe_until_evicted() {
    let hub = Hub::new(HubConfig::default());
    let task_id = TaskId::new();
    hub.create_topic(task_id);
    hub.publish_line(task_id, StreamKind::Out, "hi".into(), "t".into());
    hub.close_topic(task_id, TerminalStatus::Completed, Some(0), None);

    let late = hub.subscribe(task_id, None).expect("subscribe after close");
    assert!(late.recv().await.is_some());

    hub.evict_topic(task_id);
    let err = hub.subscribe(task_id, None).unwrap_err();
    assert_eq!(err.kind, ctlplane_core::ErrorKind::NotFound);
}
