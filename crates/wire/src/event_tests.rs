// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn stream_event_serializes_without_type_tag() {
    let event = StreamEvent { seq: 1, ts: "2026-01-01T00:00:00Z".into(), stream: StreamKind::Out, payload: "hello\n".into(), dropped: None };
    let json = serde_json::to_value(&event).expect("serialize");
    assert_eq!(json["seq"], 1);
    assert_eq!(json["stream"], "out");
    assert!(json.get("type").is_none());
    assert!(json.get("dropped").is_none());
}

#[test]
fn dropped_marker_is_included_when_present() {
    let event = StreamEvent { seq: 5, ts: "2026-01-01T00:00:01Z".into(), stream: StreamKind::Err, payload: "x".into(), dropped: Some(3) };
    let json = serde_json::to_value(&event).expect("serialize");
    assert_eq!(json["dropped"], 3);
}

#[test]
fn terminal_message_round_trips() {
    let message = ControlMessage::Terminal { status: TerminalStatus::Completed, exit_code: Some(0), reason: None };
    let json = serde_json::to_value(&message).expect("serialize");
    assert_eq!(json["type"], "terminal");
    assert_eq!(json["status"], "completed");
    assert_eq!(json["exit_code"], 0);
    assert!(json.get("reason").is_none());

    let parsed: ControlMessage = serde_json::from_value(json).expect("deserialize");
    assert_eq!(parsed, message);
}

#[test]
fn ping_and_pong_serialize_as_bare_type_tag() {
    let ping = serde_json::to_value(ControlMessage::Ping).expect("serialize");
    assert_eq!(ping, serde_json::json!({"type": "ping"}));
    let pong = serde_json::to_value(ControlMessage::Pong).expect("serialize");
    assert_eq!(pong, serde_json::json!({"type": "pong"}));
}

#[test]
fn outbound_message_untagged_picks_matching_shape() {
    let event: OutboundMessage = StreamEvent { seq: 1, ts: "t".into(), stream: StreamKind::Out, payload: "p".into(), dropped: None }.into();
    let control: OutboundMessage = ControlMessage::Ping.into();

    let event_json = serde_json::to_value(&event).expect("serialize");
    let control_json = serde_json::to_value(&control).expect("serialize");
    assert!(event_json.get("type").is_none());
    assert_eq!(control_json["type"], "ping");

    let reparsed_event: OutboundMessage = serde_json::from_value(event_json).expect("deserialize");
    assert_eq!(reparsed_event, event);
    let reparsed_control: OutboundMessage = serde_json::from_value(control_json).expect("deserialize");
    assert_eq!(reparsed_control, control);
}
